// ==========================================
// Tipos de error del pipeline de inventario
// ==========================================
// Herramienta: thiserror
// Política: errores por fila / por archivo se capturan en su propio
// límite; solo los errores de corrida completa abortan la ejecución.
// ==========================================

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Valor inválido en una fila importada. Recuperable: la sesión sigue abierta
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("campo '{field}' inválido: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Paso de la escritura atómica que falló
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CreateStaging,
    Write,
    Flush,
    Sync,
    TargetExists,
    Rename,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteStep::CreateStaging => "create-staging",
            WriteStep::Write => "write",
            WriteStep::Flush => "flush",
            WriteStep::Sync => "sync",
            WriteStep::TargetExists => "target-exists",
            WriteStep::Rename => "rename",
        };
        f.write_str(label)
    }
}

/// Fallo de I/O antes o durante la promoción. El staging queda en disco para
/// reintento o diagnóstico.
#[derive(Error, Debug)]
#[error("escritura atómica de {} falló en el paso '{step}' (staging: {}): {source}", .path.display(), .staging_path.display())]
pub struct AtomicWriteError {
    pub path: PathBuf,
    pub staging_path: PathBuf,
    pub step: WriteStep,
    #[source]
    pub source: io::Error,
}

/// Problemas de header o de forma de filas al construir una tabla
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("columna duplicada en el header: '{0}'")]
    DuplicateColumn(String),

    #[error("fila {row}: se esperaban {expected} columnas, se encontraron {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Errores al cargar un archivo delimitado desde disco
#[derive(Error, Debug)]
pub enum TableError {
    #[error("no fue posible leer {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV mal formado en {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("esquema inválido en {}: {source}", .path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
}

/// Fallo al abrir una sesión de importación
#[derive(Error, Debug)]
pub enum SessionInitError {
    #[error("el archivo de staging ya existe (sesión activa?): {}", .path.display())]
    StagingOccupied { path: PathBuf },

    #[error("header de plantilla inválido: {0}")]
    InvalidTemplate(String),

    #[error("no fue posible iniciar la sesión en {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errores de una sesión de importación ya iniciada
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Init(#[from] SessionInitError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("operación '{operation}' no permitida en estado {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("no fue posible agregar la fila a {} (cambios parciales revertidos): {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Finalize(#[from] AtomicWriteError),

    #[error("{} no es un archivo de staging de importación", .path.display())]
    NotStaging { path: PathBuf },

    #[error("no fue posible eliminar el staging {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// No se pudo respaldar un archivo de referencia antes de sobrescribirlo
#[derive(Error, Debug)]
#[error("no fue posible respaldar {} en {}: {source}", .file.display(), .backup_dir.display())]
pub struct BackupError {
    pub file: PathBuf,
    pub backup_dir: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no fue posible leer la configuración {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuración inválida en {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Error general de los puntos de entrada de la librería
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    AtomicWrite(#[from] AtomicWriteError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no existe el directorio fuente: {}", .0.display())]
    SourceDirMissing(PathBuf),

    #[error("no fue posible crear el directorio de respaldo {}: {source}", .path.display())]
    BackupRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error de I/O en {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InventoryError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        InventoryError::Io {
            path: path.into(),
            source,
        }
    }
}
