//! Herramientas CSV de inventario: sesiones de importación atómicas,
//! reconciliación de columnas, normalización de referencia y migración
//! por categoría.

pub mod atomic;
pub mod commands;
pub mod config;
pub mod error;
pub mod file_utils;
pub mod logging;
pub mod migration;
pub mod models;
pub mod normalizer;
pub mod progress;
pub mod reconcile;
pub mod session;

pub use atomic::{write_atomic, Promote};
pub use config::Settings;
pub use error::{
    AtomicWriteError, BackupError, ConfigError, InventoryError, SchemaError, SessionError,
    SessionInitError, TableError, ValidationError, WriteStep,
};
pub use migration::{MigrationMode, MigrationPipeline, MigrationSummary};
pub use models::{Header, Record, Table};
pub use normalizer::{NormalizationObserver, NormalizationSummary, ReferenceContext, TraceLog, TracingObserver};
pub use reconcile::{reconcile, ReconciliationPlan};
pub use session::{ImportSession, ImportSessionManager, SessionState};
