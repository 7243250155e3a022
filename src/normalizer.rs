// ==========================================
// Normalizador de datos de referencia (arranque)
// ==========================================
// Recorre los CSV del nivel superior del directorio de referencia y
// reescribe (atómicamente) solo los que cambian tras reconciliarlos
// contra su propio header. Los subdirectorios (_backup_*, reportes)
// nunca se visitan.
// ==========================================

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::atomic;
use crate::error::InventoryError;
use crate::file_utils;
use crate::reconcile::{normalization_target, reconcile};

/// Recibe una entrada por cada (archivo, regla) que toca el normalizador
pub trait NormalizationObserver {
    fn record(&mut self, path: &Path, modified: bool, rule: &str);
}

/// Reenvía la traza a `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl NormalizationObserver for TracingObserver {
    fn record(&mut self, path: &Path, modified: bool, rule: &str) {
        info!(path = %path.display(), modified, rule, "normalización de referencia");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub path: PathBuf,
    pub modified: bool,
    pub rule: String,
}

/// Acumula la traza en memoria
#[derive(Debug, Default, Clone)]
pub struct TraceLog {
    pub entries: Vec<TraceEntry>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules_for(&self, path: &Path) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.path == path)
            .map(|entry| entry.rule.as_str())
            .collect()
    }

    pub fn modified_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self
            .entries
            .iter()
            .filter(|entry| entry.modified)
            .map(|entry| entry.path.as_path())
            .collect();
        paths.dedup();
        paths
    }
}

impl NormalizationObserver for TraceLog {
    fn record(&mut self, path: &Path, modified: bool, rule: &str) {
        self.entries.push(TraceEntry {
            path: path.to_path_buf(),
            modified,
            rule: rule.to_string(),
        });
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationSummary {
    pub scanned: usize,
    pub modified: usize,
    pub failed: usize,
}

/// Estado del normalizador por proceso: se recuerda el primer
/// [`ensure_initialized`](ReferenceContext::ensure_initialized) exitoso y las
/// llamadas siguientes devuelven su resumen sin tocar el disco.
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    reference_dir: PathBuf,
    summary: Option<NormalizationSummary>,
}

impl ReferenceContext {
    pub fn new(reference_dir: impl Into<PathBuf>) -> Self {
        Self {
            reference_dir: reference_dir.into(),
            summary: None,
        }
    }

    pub fn reference_dir(&self) -> &Path {
        &self.reference_dir
    }

    pub fn is_initialized(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<NormalizationSummary> {
        self.summary
    }

    /// Normaliza una vez por contexto cada archivo de referencia del nivel
    /// superior.
    ///
    /// Solo falla si el directorio no se puede crear o listar; los fallos por
    /// archivo se trazan y se cuentan.
    pub fn ensure_initialized(
        &mut self,
        observer: &mut dyn NormalizationObserver,
    ) -> Result<NormalizationSummary, InventoryError> {
        if let Some(summary) = self.summary {
            return Ok(summary);
        }

        file_utils::ensure_directory_exists(&self.reference_dir)
            .map_err(|source| InventoryError::io(&self.reference_dir, source))?;
        let files = file_utils::list_csv_files(&self.reference_dir)
            .map_err(|source| InventoryError::io(&self.reference_dir, source))?;

        let mut summary = NormalizationSummary::default();
        for path in &files {
            summary.scanned += 1;
            match normalize_file(path, observer) {
                Ok(true) => summary.modified += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "no fue posible normalizar el archivo de referencia");
                    observer.record(path, false, "failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            dir = %self.reference_dir.display(),
            scanned = summary.scanned,
            modified = summary.modified,
            failed = summary.failed,
            "normalización de referencia completada"
        );
        self.summary = Some(summary);
        Ok(summary)
    }
}

/// Reconcilia un archivo contra su propio header; indica si fue reescrito
pub fn normalize_file(
    path: &Path,
    observer: &mut dyn NormalizationObserver,
) -> Result<bool, InventoryError> {
    let table = file_utils::read_table(path)?;
    if table.header().is_empty() {
        observer.record(path, false, "empty-file");
        return Ok(false);
    }

    let target = normalization_target(table.header());
    let reconciled = reconcile(&table, &target);
    if reconciled.table == table {
        observer.record(path, false, "unchanged");
        return Ok(false);
    }

    atomic::write_atomic(path, |out| file_utils::write_table(out, &reconciled.table))?;

    let rules = reconciled.fired_rules();
    if rules.is_empty() {
        observer.record(path, true, "rewrite");
    }
    for rule in rules {
        observer.record(path, true, rule);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reference_file_is_rewritten_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("luces.csv");
        fs::write(&path, "ID,Subcaregoría,Nombre\n1,X,Widget\n").expect("seed");

        let mut trace = TraceLog::new();
        let mut context = ReferenceContext::new(dir.path());
        let summary = context.ensure_initialized(&mut trace).expect("normalize");

        assert_eq!(summary, NormalizationSummary { scanned: 1, modified: 1, failed: 0 });
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "Subcategoría,Nombre,Rastrear Inventario\nX,Widget,1\n"
        );
        assert_eq!(trace.rules_for(&path), vec!["alias", "drop-id", "fill-missing"]);

        let mut second = TraceLog::new();
        let summary = ReferenceContext::new(dir.path())
            .ensure_initialized(&mut second)
            .expect("second run");
        assert_eq!(summary.modified, 0);
        assert_eq!(second.rules_for(&path), vec!["unchanged"]);
    }

    #[test]
    fn second_call_on_same_context_is_a_no_op() {
        let dir = tempdir().expect("tempdir");
        let mut context = ReferenceContext::new(dir.path());
        let mut trace = TraceLog::new();
        context.ensure_initialized(&mut trace).expect("first");
        assert!(context.is_initialized());

        fs::write(dir.path().join("nuevo.csv"), "ID,Nombre\n1,a\n").expect("seed");
        let summary = context.ensure_initialized(&mut trace).expect("second");

        assert_eq!(summary.scanned, 0);
        assert!(trace.entries.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("nuevo.csv")).unwrap(),
            "ID,Nombre\n1,a\n"
        );
    }

    #[test]
    fn blank_track_inventory_values_are_defaulted() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cascos.csv");
        fs::write(&path, "Producto,Rastrear Inventario\nCasco,\nGuante,0\n").expect("seed");

        let mut trace = TraceLog::new();
        assert!(normalize_file(&path, &mut trace).expect("normalize"));

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Producto,Rastrear Inventario\nCasco,1\nGuante,0\n"
        );
        assert_eq!(trace.rules_for(&path), vec!["track-inventory-default"]);
    }

    #[test]
    fn empty_file_is_left_untouched() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vacio.csv");
        fs::write(&path, "").expect("seed");

        let mut trace = TraceLog::new();
        assert!(!normalize_file(&path, &mut trace).expect("normalize"));
        assert_eq!(trace.rules_for(&path), vec!["empty-file"]);
        assert_eq!(fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn one_bad_file_does_not_stop_the_rest() {
        let dir = tempdir().expect("tempdir");
        let bad = dir.path().join("a_roto.csv");
        let good = dir.path().join("b_luces.csv");
        fs::write(&bad, "ID,Nombre\n1,a,extra\n").expect("seed");
        fs::write(&good, "ID,Nombre\n1,a\n").expect("seed");

        let mut trace = TraceLog::new();
        let summary = ReferenceContext::new(dir.path())
            .ensure_initialized(&mut trace)
            .expect("normalize");

        assert_eq!(summary, NormalizationSummary { scanned: 2, modified: 1, failed: 1 });
        assert_eq!(trace.rules_for(&bad), vec!["failed"]);
        assert_eq!(fs::read_to_string(&bad).unwrap(), "ID,Nombre\n1,a,extra\n");
        assert_eq!(trace.modified_paths(), vec![good.as_path()]);
    }

    #[test]
    fn missing_reference_dir_is_created() {
        let dir = tempdir().expect("tempdir");
        let reference = dir.path().join("utilities").join("info_products");

        let summary = ReferenceContext::new(&reference)
            .ensure_initialized(&mut TraceLog::new())
            .expect("normalize");

        assert!(reference.is_dir());
        assert_eq!(summary, NormalizationSummary::default());
    }
}
