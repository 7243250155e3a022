use std::error::Error;

use crate::config::Settings;
use crate::normalizer::{ReferenceContext, TraceLog};

/// `normalize`: corre el normalizador de referencia e imprime la traza
pub fn normalize(settings: &Settings) -> Result<i32, Box<dyn Error>> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Normalización de datos de referencia                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("📁 Directorio: {}", settings.reference_dir.display());
    println!();

    let mut context = ReferenceContext::new(&settings.reference_dir);
    let mut trace = TraceLog::new();
    let summary = context.ensure_initialized(&mut trace)?;

    for entry in &trace.entries {
        let icon = match (entry.modified, entry.rule.as_str()) {
            (_, "failed") => "❌",
            (true, _) => "✏️ ",
            (false, _) => "✔️ ",
        };
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.path.display().to_string());
        println!("  {} {:<40} {}", icon, name, entry.rule);
    }

    println!();
    println!("📊 Archivos revisados: {}", summary.scanned);
    println!("   Modificados:        {}", summary.modified);
    println!("   Con error:          {}", summary.failed);

    Ok(if summary.failed > 0 { 1 } else { 0 })
}
