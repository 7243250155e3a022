use std::env;
use std::process;

use inventario_tools::commands::{import_ops, migration_ops, reference_ops, EXIT_FATAL};
use inventario_tools::{logging, Settings};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        help();
        process::exit(EXIT_FATAL);
    }

    let command = args[1].as_str();
    match command {
        "help" | "--help" | "-h" => {
            help();
            return;
        }
        "version" | "--version" | "-V" => {
            version();
            return;
        }
        _ => {}
    }

    logging::init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("❌ {}", err);
            process::exit(EXIT_FATAL);
        }
    };

    let result = match command {
        "normalize" => reference_ops::normalize(&settings),
        "dry-run" => migration_ops::dry_run(&args, &settings),
        "migrate" => migration_ops::migrate(&args, &settings),
        "import" => import_ops::import(&args, &settings),
        "pending" => import_ops::pending(&settings),
        "recover" => import_ops::recover(&args, &settings),
        "discard" => import_ops::discard(&args, &settings),
        _ => {
            eprintln!("❌ Comando desconocido: {}", command);
            eprintln!();
            help();
            process::exit(EXIT_FATAL);
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("❌ Error fatal: {}", err);
            process::exit(EXIT_FATAL);
        }
    }
}

fn version() {
    println!(
        "inventario_tools {} (build {}, {})",
        env!("INVENTARIO_TOOLS_VERSION"),
        env!("BUILD_DATE"),
        env!("TARGET")
    );
}

fn help() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Inventario Tools - Importación y Migración de Catálogo      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("  v{} ({})", env!("INVENTARIO_TOOLS_VERSION"), env!("BUILD_DATE"));
    println!();
    println!("Import Commands:");
    println!("  import <rows.csv>");
    println!("    Append rows (sku, nombre, cantidad) to a new import session");
    println!("    - Reference data is normalized first");
    println!("    - Invalid rows are reported and skipped, the session stays open");
    println!("    - Output: <output_dir>/import_productos_<timestamp>.csv");
    println!();
    println!("  pending");
    println!("    List orphaned *.inprogress.csv staging files");
    println!();
    println!("  recover <staging.csv>");
    println!("    Promote a staging file to its final name (never overwrites)");
    println!();
    println!("  discard <staging.csv>");
    println!("    Delete a staging file");
    println!();
    println!("Reference Data Commands:");
    println!("  normalize");
    println!("    Drop ID, rename Subcaregoría, fill Rastrear Inventario in every");
    println!("    top-level CSV of the reference directory (rewrites only on change)");
    println!();
    println!("  dry-run");
    println!("    Plan the migration of Inventario(<categoria>).csv files, no writes");
    println!();
    println!("  migrate [--delete-source]");
    println!("    Back up, rewrite and verify every category file");
    println!("    - Mismatches go to <reference_dir>/_migration_reports/");
    println!("    - --delete-source removes only sources that verified clean");
    println!();
    println!("CONFIGURATION:");
    println!("  INVENTARIO_CONFIG         JSON settings file (default ./inventario.json)");
    println!("  INVENTARIO_OUTPUT_DIR     Import output directory");
    println!("  INVENTARIO_REFERENCE_DIR  Reference (info_products) directory");
    println!("  INVENTARIO_SOURCE_DIR     Migration source directory");
    println!("  RUST_LOG                  Log filter (default: info)");
    println!();
    println!("EXIT CODES:");
    println!("  0  success");
    println!("  1  a file or row failed, or verification found mismatches");
    println!("  2  bad arguments or whole-run failure");
    println!();
    println!("EXAMPLES:");
    println!();
    println!("  # Preview the migration");
    println!("  inventario_tools dry-run");
    println!();
    println!("  # Migrate and remove verified sources");
    println!("  inventario_tools migrate --delete-source");
    println!();
    println!("  # Import a batch of rows");
    println!("  inventario_tools import nuevos.csv");
}
