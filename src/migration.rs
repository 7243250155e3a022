// ==========================================
// Pipeline de migración de Inventario(<categoria>).csv
// ==========================================
// Por corrida: un timestamp compartido y (en modo migrate) un único
// directorio de respaldo creado antes de cualquier escritura.
// Por archivo: leer → respaldar destino → reconciliar → escritura
// atómica → verificar → reporte de diferencias → borrar fuente.
// Un error en un archivo se registra y no detiene al resto.
// ==========================================

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::atomic;
use crate::config::Settings;
use crate::error::{BackupError, InventoryError};
use crate::file_utils;
use crate::models::{info_products_header, Header, Table};
use crate::reconcile::reconcile;

lazy_static! {
    static ref SOURCE_FILENAME: Regex =
        Regex::new(r"^Inventario\((?P<category>.+)\)\.csv$").unwrap();
}

pub const REPORT_HEADERS: [&str; 4] = ["row_index", "column", "expected_value", "actual_value"];
fn report_header() -> Header {
    Header::from_trusted(REPORT_HEADERS.iter().map(|c| c.to_string()).collect())
}

pub const HEADER_MISMATCH_COLUMN: &str = "__header__";
pub const ROW_COUNT_MISMATCH_COLUMN: &str = "__row_count__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    DryRun,
    Migrate { delete_source: bool },
}

impl MigrationMode {
    fn deletes_source(self) -> bool {
        matches!(self, MigrationMode::Migrate { delete_source: true })
    }
}

/// Un `Inventario(<categoria>).csv` encontrado en el directorio fuente
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub category: String,
    pub path: PathBuf,
}

/// Categoría codificada en el nombre de un archivo fuente, si coincide
pub fn category_of(file_name: &str) -> Option<&str> {
    SOURCE_FILENAME
        .captures(file_name)
        .and_then(|caps| caps.name("category"))
        .map(|category| category.as_str())
}

/// Archivos fuente ordenados por nombre. Sin directorio fuente es fatal
pub fn discover_source_files(source_dir: &Path) -> Result<Vec<SourceFile>, InventoryError> {
    if !source_dir.is_dir() {
        return Err(InventoryError::SourceDirMissing(source_dir.to_path_buf()));
    }

    let entries = fs::read_dir(source_dir).map_err(|e| InventoryError::io(source_dir, e))?;
    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| InventoryError::io(source_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(category) = category_of(name) {
            sources.push(SourceFile {
                category: category.to_string(),
                path: path.clone(),
            });
        }
    }
    sources.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(sources)
}

/// Una diferencia de verificación. `row_index` es la fila de datos (base 1),
/// o 0 para header y cantidad de filas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub row_index: usize,
    pub column: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MismatchReport {
    pub category: String,
    pub entries: Vec<Mismatch>,
}

impl MismatchReport {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_name(&self) -> String {
        format!("{}_mismatches.csv", self.category)
    }

    pub fn to_table(&self) -> Table {
        let rows = self
            .entries
            .iter()
            .map(|m| {
                vec![
                    m.row_index.to_string(),
                    m.column.clone(),
                    m.expected.clone(),
                    m.actual.clone(),
                ]
            })
            .collect();
        Table::from_trusted(report_header(), rows)
    }

    /// Escribe el reporte con escritura atómica
    pub fn write_to(&self, path: &Path) -> Result<(), InventoryError> {
        if let Some(parent) = path.parent() {
            file_utils::ensure_directory_exists(parent)
                .map_err(|e| InventoryError::io(parent, e))?;
        }
        let table = self.to_table();
        atomic::write_atomic(path, |out| file_utils::write_table(out, &table))?;
        Ok(())
    }
}

/// Compara lo que se quiso escribir con lo que se volvió a leer
pub fn compare_tables(expected: &Table, actual: &Table) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if expected.header() != actual.header() {
        mismatches.push(Mismatch {
            row_index: 0,
            column: HEADER_MISMATCH_COLUMN.to_string(),
            expected: expected.header().columns().join(","),
            actual: actual.header().columns().join(","),
        });
    }
    if expected.len() != actual.len() {
        mismatches.push(Mismatch {
            row_index: 0,
            column: ROW_COUNT_MISMATCH_COLUMN.to_string(),
            expected: expected.len().to_string(),
            actual: actual.len().to_string(),
        });
    }

    let positions: Vec<Option<usize>> = expected
        .header()
        .iter()
        .map(|column| actual.header().position(column))
        .collect();

    for (offset, (want, got)) in expected.rows().iter().zip(actual.rows()).enumerate() {
        for ((column, expected_value), position) in
            expected.header().iter().zip(want).zip(&positions)
        {
            let actual_value = position.map(|i| got[i].as_str()).unwrap_or("");
            if expected_value != actual_value {
                mismatches.push(Mismatch {
                    row_index: offset + 1,
                    column: column.to_string(),
                    expected: expected_value.clone(),
                    actual: actual_value.to_string(),
                });
            }
        }
    }
    mismatches
}

/// Paso en que falló la migración de un archivo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    Read,
    Backup,
    Write,
    Verify,
    Report,
    DeleteSource,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationStep::Read => "read",
            MigrationStep::Backup => "backup",
            MigrationStep::Write => "write",
            MigrationStep::Verify => "verify",
            MigrationStep::Report => "report",
            MigrationStep::DeleteSource => "delete-source",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Plan de dry-run; no se escribió nada
    Planned {
        rows: usize,
        missing_columns: Vec<String>,
        dropped_columns: Vec<String>,
        rules: Vec<&'static str>,
    },
    Verified {
        source_deleted: bool,
    },
    /// Escrito, pero la verificación difiere. La fuente se conserva
    Flagged {
        report_path: PathBuf,
        mismatches: usize,
    },
    Failed {
        step: MigrationStep,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub category: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(
            self.status,
            FileStatus::Planned { .. } | FileStatus::Verified { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    pub mode: MigrationMode,
    pub timestamp: String,
    pub backup_dir: Option<PathBuf>,
    pub outcomes: Vec<FileOutcome>,
    pub source_dir_removed: bool,
}

impl MigrationSummary {
    pub fn verified(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Verified { .. }))
    }

    pub fn flagged(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Flagged { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    /// 0 si todo salió bien, 1 si algún archivo falló o quedó marcado
    pub fn exit_code(&self) -> i32 {
        if self.outcomes.iter().all(FileOutcome::is_ok) {
            0
        } else {
            1
        }
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

struct StepFailure {
    step: MigrationStep,
    message: String,
}

impl StepFailure {
    fn at(step: MigrationStep, err: impl fmt::Display) -> Self {
        Self {
            step,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrationPipeline {
    settings: Settings,
    target: Header,
}

impl MigrationPipeline {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            target: info_products_header(),
        }
    }

    /// Reemplaza el esquema destino declarado
    pub fn with_target(mut self, target: Header) -> Self {
        self.target = target;
        self
    }

    pub fn target(&self) -> &Header {
        &self.target
    }

    pub fn destination_for(&self, category: &str) -> PathBuf {
        self.settings.reference_dir.join(format!("{category}.csv"))
    }

    pub fn run(&self, mode: MigrationMode) -> Result<MigrationSummary, InventoryError> {
        self.run_at(mode, &file_utils::run_timestamp())
    }

    /// Corre el pipeline con un timestamp explícito.
    ///
    /// `Err` queda para fallos de corrida completa: directorio fuente
    /// ausente o directorio de respaldo que no se puede crear.
    pub fn run_at(&self, mode: MigrationMode, timestamp: &str) -> Result<MigrationSummary, InventoryError> {
        let sources = discover_source_files(&self.settings.source_dir)?;
        let mut summary = MigrationSummary {
            mode,
            timestamp: timestamp.to_string(),
            backup_dir: None,
            outcomes: Vec::with_capacity(sources.len()),
            source_dir_removed: false,
        };

        if sources.is_empty() {
            warn!(dir = %self.settings.source_dir.display(), "no se encontraron archivos fuente");
            return Ok(summary);
        }
        info!(
            categories = %sources.iter().map(|s| s.category.as_str()).collect::<Vec<_>>().join(", "),
            "categorías detectadas para migración"
        );

        if mode == MigrationMode::DryRun {
            summary.outcomes = sources.iter().map(|source| self.plan_file(source)).collect();
            return Ok(summary);
        }

        let backup_dir = self.create_backup_root(timestamp)?;
        for source in &sources {
            let outcome = self.migrate_file(source, &backup_dir, mode.deletes_source());
            summary.outcomes.push(outcome);
        }
        summary.backup_dir = Some(backup_dir);

        if mode.deletes_source() {
            summary.source_dir_removed = self.remove_source_dir_if_empty();
        }

        info!(
            verified = summary.verified(),
            flagged = summary.flagged(),
            failed = summary.failed(),
            "migración finalizada"
        );
        Ok(summary)
    }

    fn create_backup_root(&self, timestamp: &str) -> Result<PathBuf, InventoryError> {
        let backup_dir = self.settings.backup_dir(timestamp);
        let backup_root = |source| InventoryError::BackupRoot {
            path: backup_dir.clone(),
            source,
        };
        file_utils::ensure_directory_exists(&self.settings.reference_dir).map_err(backup_root)?;
        fs::create_dir(&backup_dir).map_err(backup_root)?;
        info!(path = %backup_dir.display(), "directorio de respaldo creado");
        Ok(backup_dir)
    }

    fn plan_file(&self, source: &SourceFile) -> FileOutcome {
        let destination_path = self.destination_for(&source.category);
        let status = match file_utils::read_table(&source.path) {
            Ok(table) => {
                let reconciled = reconcile(&table, &self.target);
                let plan = &reconciled.plan;
                let status = FileStatus::Planned {
                    rows: table.len(),
                    missing_columns: plan.missing_columns().into_iter().map(String::from).collect(),
                    dropped_columns: plan.dropped_columns().into_iter().map(String::from).collect(),
                    rules: reconciled.fired_rules(),
                };
                info!(
                    source = %source.path.display(),
                    destination = %destination_path.display(),
                    rows = table.len(),
                    missing = ?plan.missing_columns(),
                    dropped = ?plan.dropped_columns(),
                    rules = ?reconciled.fired_rules(),
                    "DRY-RUN"
                );
                status
            }
            Err(err) => {
                error!(source = %source.path.display(), error = %err, "fallo en dry-run");
                FileStatus::Failed {
                    step: MigrationStep::Read,
                    message: err.to_string(),
                }
            }
        };
        FileOutcome {
            category: source.category.clone(),
            source_path: source.path.clone(),
            destination_path,
            backup_path: None,
            status,
        }
    }

    fn migrate_file(&self, source: &SourceFile, backup_dir: &Path, delete_source: bool) -> FileOutcome {
        let mut outcome = FileOutcome {
            category: source.category.clone(),
            source_path: source.path.clone(),
            destination_path: self.destination_for(&source.category),
            backup_path: None,
            status: FileStatus::Verified {
                source_deleted: false,
            },
        };

        match self.migrate_steps(source, backup_dir, delete_source, &mut outcome) {
            Ok(status) => outcome.status = status,
            Err(failure) => {
                error!(
                    source = %source.path.display(),
                    step = %failure.step,
                    error = %failure.message,
                    "fallo migrando archivo"
                );
                outcome.status = FileStatus::Failed {
                    step: failure.step,
                    message: failure.message,
                };
            }
        }
        outcome
    }

    fn migrate_steps(
        &self,
        source: &SourceFile,
        backup_dir: &Path,
        delete_source: bool,
        outcome: &mut FileOutcome,
    ) -> Result<FileStatus, StepFailure> {
        let destination = outcome.destination_path.clone();
        let table = file_utils::read_table(&source.path).map_err(|e| StepFailure::at(MigrationStep::Read, e))?;
        let reconciled = reconcile(&table, &self.target);

        if destination.exists() {
            let backup_path = backup_file(&destination, backup_dir).map_err(|e| StepFailure::at(MigrationStep::Backup, e))?;
            outcome.backup_path = Some(backup_path);
        }

        atomic::write_atomic(&destination, |out| file_utils::write_table(out, &reconciled.table))
            .map_err(|e| StepFailure::at(MigrationStep::Write, e))?;

        let written = file_utils::read_table(&destination).map_err(|e| StepFailure::at(MigrationStep::Verify, e))?;
        let report = MismatchReport {
            category: source.category.clone(),
            entries: compare_tables(&reconciled.table, &written),
        };
        let report_path = self.settings.reports_dir().join(report.file_name());

        info!(
            source = %source.path.display(),
            destination = %destination.display(),
            rows = table.len(),
            missing = ?reconciled.plan.missing_columns(),
            dropped = ?reconciled.plan.dropped_columns(),
            verified = report.is_clean(),
            "MIGRATE"
        );

        if !report.is_clean() {
            report.write_to(&report_path).map_err(|e| StepFailure::at(MigrationStep::Report, e))?;
            warn!(
                path = %report_path.display(),
                mismatches = report.entries.len(),
                "reporte de diferencias generado; la fuente se conserva"
            );
            return Ok(FileStatus::Flagged {
                report_path,
                mismatches: report.entries.len(),
            });
        }

        if report_path.exists() {
            fs::remove_file(&report_path).map_err(|e| StepFailure::at(MigrationStep::Report, e))?;
            info!(path = %report_path.display(), "reporte anterior eliminado tras verificación limpia");
        }

        if delete_source {
            fs::remove_file(&source.path).map_err(|e| StepFailure::at(MigrationStep::DeleteSource, e))?;
            info!(path = %source.path.display(), "archivo fuente eliminado");
        }
        Ok(FileStatus::Verified {
            source_deleted: delete_source,
        })
    }

    fn remove_source_dir_if_empty(&self) -> bool {
        let is_empty = fs::read_dir(&self.settings.source_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            return false;
        }
        match fs::remove_dir(&self.settings.source_dir) {
            Ok(()) => {
                info!(path = %self.settings.source_dir.display(), "directorio fuente eliminado");
                true
            }
            Err(err) => {
                warn!(path = %self.settings.source_dir.display(), error = %err, "no fue posible eliminar el directorio fuente");
                false
            }
        }
    }
}

/// Copia `file` sin cambios dentro de `backup_dir`
fn backup_file(file: &Path, backup_dir: &Path) -> Result<PathBuf, BackupError> {
    let fail = |source| BackupError {
        file: file.to_path_buf(),
        backup_dir: backup_dir.to_path_buf(),
        source,
    };
    let name = file.file_name().ok_or_else(|| {
        fail(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "ruta sin nombre de archivo",
        ))
    })?;
    let target = backup_dir.join(name);
    fs::copy(file, &target).map_err(fail)?;
    Ok(target)
}
