use std::error::Error;

use crate::commands::EXIT_FATAL;
use crate::config::Settings;
use crate::migration::{FileStatus, MigrationMode, MigrationPipeline, MigrationSummary};

/// `dry-run`: muestra el plan de migración sin escribir nada
pub fn dry_run(args: &[String], settings: &Settings) -> Result<i32, Box<dyn Error>> {
    if args.len() != 2 {
        eprintln!("Usage: inventario_tools dry-run");
        return Ok(EXIT_FATAL);
    }
    run(settings, MigrationMode::DryRun)
}

/// `migrate [--delete-source]`
pub fn migrate(args: &[String], settings: &Settings) -> Result<i32, Box<dyn Error>> {
    let delete_source = match &args[2..] {
        [] => false,
        [flag] if flag == "--delete-source" => true,
        _ => {
            eprintln!("Usage: inventario_tools migrate [--delete-source]");
            return Ok(EXIT_FATAL);
        }
    };
    run(settings, MigrationMode::Migrate { delete_source })
}

fn run(settings: &Settings, mode: MigrationMode) -> Result<i32, Box<dyn Error>> {
    let title = match mode {
        MigrationMode::DryRun => "Migración de inventario (DRY-RUN)",
        MigrationMode::Migrate { delete_source: true } => "Migración de inventario (--delete-source)",
        MigrationMode::Migrate { delete_source: false } => "Migración de inventario",
    };
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  {:<60}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("📂 Fuente:     {}", settings.source_dir.display());
    println!("📁 Referencia: {}", settings.reference_dir.display());
    println!();

    let summary = MigrationPipeline::new(settings).run(mode)?;
    print_summary(&summary);
    Ok(summary.exit_code())
}

fn print_summary(summary: &MigrationSummary) {
    if summary.outcomes.is_empty() {
        println!("⚠️  No se encontraron archivos Inventario(<categoria>).csv");
        return;
    }

    for outcome in &summary.outcomes {
        match &outcome.status {
            FileStatus::Planned {
                rows,
                missing_columns,
                dropped_columns,
                rules,
            } => {
                println!("📋 {} → {}", outcome.category, outcome.destination_path.display());
                println!("   Filas: {}", rows);
                println!("   Faltantes ({}): {}", missing_columns.len(), missing_columns.join(", "));
                println!("   Descartadas ({}): {}", dropped_columns.len(), dropped_columns.join(", "));
                println!("   Reglas: {}", rules.join(", "));
            }
            FileStatus::Verified { source_deleted } => {
                let deleted = if *source_deleted { " (fuente eliminada)" } else { "" };
                println!("✅ {} verificado{}", outcome.category, deleted);
            }
            FileStatus::Flagged {
                report_path,
                mismatches,
            } => {
                println!(
                    "⚠️  {} con {} diferencias → {}",
                    outcome.category,
                    mismatches,
                    report_path.display()
                );
            }
            FileStatus::Failed { step, message } => {
                println!("❌ {} falló en '{}': {}", outcome.category, step, message);
            }
        }
        if let Some(backup) = &outcome.backup_path {
            println!("   Respaldo: {}", backup.display());
        }
    }

    println!();
    if let Some(backup_dir) = &summary.backup_dir {
        println!("🗄️  Respaldo de la corrida: {}", backup_dir.display());
    }
    if summary.mode != MigrationMode::DryRun {
        println!(
            "📊 Verificados: {} | Con diferencias: {} | Fallidos: {}",
            summary.verified(),
            summary.flagged(),
            summary.failed()
        );
    }
    if summary.source_dir_removed {
        println!("🧹 Directorio fuente eliminado");
    }
}
