use std::error::Error;
use std::path::Path;

use crate::commands::EXIT_FATAL;
use crate::config::Settings;
use crate::error::SessionError;
use crate::file_utils;
use crate::models::template_header;
use crate::normalizer::{ReferenceContext, TracingObserver};
use crate::progress::ProgressTracker;
use crate::session::ImportSessionManager;

const PROGRESS_INTERVAL: u64 = 1000;

fn manager(settings: &Settings) -> ImportSessionManager {
    ImportSessionManager::new(&settings.output_dir, settings.import_filename_stem.clone())
}

/// `import <rows.csv>`: agrega las filas a una sesión nueva y la finaliza
pub fn import(args: &[String], settings: &Settings) -> Result<i32, Box<dyn Error>> {
    if args.len() != 3 {
        eprintln!("Usage: inventario_tools import <rows.csv>");
        return Ok(EXIT_FATAL);
    }
    let input_path = Path::new(&args[2]);
    file_utils::validate_file_exists(input_path)?;

    let mut context = ReferenceContext::new(&settings.reference_dir);
    context.ensure_initialized(&mut TracingObserver)?;

    let source = file_utils::read_csv_file(input_path)?;
    let size = std::fs::metadata(input_path)?.len();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Importación de productos                                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("📄 Entrada: {} ({}, {})", input_path.display(), file_utils::format_bytes(size), source.encoding);
    println!("🧾 Filas:   {}", source.table.len());
    println!();

    let mut session = manager(settings).start(template_header())?;
    println!("📝 Staging: {}", session.staging_path().display());

    let mut progress = ProgressTracker::new(PROGRESS_INTERVAL);
    let mut rejected = Vec::new();
    for index in 0..source.table.len() {
        let Some(record) = source.table.record(index) else {
            break;
        };
        match session.append(&record) {
            Ok(()) => progress.row_appended(),
            Err(SessionError::Validation(err)) => {
                progress.row_rejected();
                // +2: header line plus 1-based numbering
                rejected.push((index + 2, err));
            }
            Err(err) => {
                progress.finish();
                eprintln!("❌ {}", err);
                eprintln!("   El staging se conserva: {}", session.staging_path().display());
                return Ok(1);
            }
        }
    }
    progress.finish();

    for (line, err) in &rejected {
        println!("⚠️  Línea {}: {}", line, err);
    }

    match session.finalize() {
        Ok(final_path) => println!("✅ Archivo generado: {}", final_path.display()),
        Err(err) => {
            eprintln!("❌ {}", err);
            eprintln!(
                "   Use `inventario_tools recover {0}` para reintentar o `inventario_tools discard {0}` para descartarlo",
                session.staging_path().display()
            );
            return Ok(1);
        }
    }

    Ok(if rejected.is_empty() { 0 } else { 1 })
}

/// `pending`: lista los staging huérfanos del directorio de salida
pub fn pending(settings: &Settings) -> Result<i32, Box<dyn Error>> {
    let pending = manager(settings).pending_sessions()?;
    if pending.is_empty() {
        println!("✅ Sin sesiones pendientes en {}", settings.output_dir.display());
        return Ok(0);
    }
    println!("📋 Sesiones pendientes ({}):", pending.len());
    for path in &pending {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("  {} ({})", path.display(), file_utils::format_bytes(size));
    }
    Ok(0)
}

/// `recover <staging.csv>`
pub fn recover(args: &[String], settings: &Settings) -> Result<i32, Box<dyn Error>> {
    if args.len() != 3 {
        eprintln!("Usage: inventario_tools recover <staging.csv>");
        return Ok(EXIT_FATAL);
    }
    match manager(settings).recover_staging(Path::new(&args[2])) {
        Ok(final_path) => {
            println!("✅ Staging promovido a {}", final_path.display());
            Ok(0)
        }
        Err(err) => {
            eprintln!("❌ {}", err);
            Ok(1)
        }
    }
}

/// `discard <staging.csv>`
pub fn discard(args: &[String], settings: &Settings) -> Result<i32, Box<dyn Error>> {
    if args.len() != 3 {
        eprintln!("Usage: inventario_tools discard <staging.csv>");
        return Ok(EXIT_FATAL);
    }
    match manager(settings).discard_staging(Path::new(&args[2])) {
        Ok(()) => {
            println!("🗑️  Staging eliminado: {}", args[2]);
            Ok(0)
        }
        Err(err) => {
            eprintln!("❌ {}", err);
            Ok(1)
        }
    }
}
