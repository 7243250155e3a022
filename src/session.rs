// ==========================================
// Sesiones de importación (append incremental + finalize atómico)
// ==========================================
// Estados: OPEN → FINALIZING → {COMMITTED, FAILED}
// Archivo staging: <stem>_<timestamp>.inprogress.csv
// Archivo final:   <stem>_<timestamp>.csv
// ==========================================

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::atomic::{self, Promote};
use crate::error::{AtomicWriteError, SessionError, SessionInitError, ValidationError, WriteStep};
use crate::file_utils;
use crate::models::{Header, Record, REQUIRED_IMPORT_FIELDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Finalizing,
    Committed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Open => "OPEN",
            SessionState::Finalizing => "FINALIZING",
            SessionState::Committed => "COMMITTED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Crea sesiones de importación en un directorio de salida
#[derive(Debug, Clone)]
pub struct ImportSessionManager {
    output_dir: PathBuf,
    filename_stem: String,
}

impl ImportSessionManager {
    pub fn new(output_dir: impl Into<PathBuf>, filename_stem: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename_stem: filename_stem.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Abre una sesión con la hora local actual
    pub fn start(&self, template_header: Header) -> Result<ImportSession, SessionInitError> {
        self.start_at(template_header, &file_utils::run_timestamp())
    }

    /// Abre una sesión cuyos nombres de archivo llevan `timestamp`
    pub fn start_at(
        &self,
        template_header: Header,
        timestamp: &str,
    ) -> Result<ImportSession, SessionInitError> {
        let stem = self.filename_stem.trim();
        if stem.is_empty() {
            return Err(SessionInitError::InvalidTemplate(
                "el prefijo de archivo de importación no puede estar vacío".to_string(),
            ));
        }
        if template_header.is_empty() || template_header.iter().any(str::is_empty) {
            return Err(SessionInitError::InvalidTemplate(
                "el header debe tener al menos una columna y ningún nombre vacío".to_string(),
            ));
        }

        file_utils::ensure_directory_exists(&self.output_dir).map_err(|source| {
            SessionInitError::Io {
                path: self.output_dir.clone(),
                source,
            }
        })?;

        let final_path = self.free_final_path(stem, timestamp);
        let staging_path = atomic::staging_path_for(&final_path);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                warn!(path = %staging_path.display(), "staging ocupado por otra sesión");
                return Err(SessionInitError::StagingOccupied { path: staging_path });
            }
            Err(source) => {
                return Err(SessionInitError::Io {
                    path: staging_path,
                    source,
                })
            }
        };

        file_utils::encode_row(template_header.iter())
            .and_then(|bytes| {
                file.write_all(&bytes)?;
                file.flush()?;
                file.sync_all()
            })
            .map_err(|source| {
                error!(path = %staging_path.display(), error = %source, "no fue posible escribir el header de la sesión");
                SessionInitError::Io {
                    path: staging_path.clone(),
                    source,
                }
            })?;

        info!(
            staging = %staging_path.display(),
            columns = template_header.len(),
            "sesión de importación iniciada"
        );

        Ok(ImportSession {
            header: template_header,
            staging_path,
            final_path,
            state: SessionState::Open,
            file: Some(file),
            rows_written: 0,
        })
    }

    /// Staging dejados por sesiones caídas o abandonadas
    pub fn pending_sessions(&self) -> io::Result<Vec<PathBuf>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }
        let mut pending = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && self.owns_staging(&path) {
                pending.push(path);
            }
        }
        pending.sort();
        Ok(pending)
    }

    /// Promueve un staging huérfano a su nombre final (sin pisar)
    pub fn recover_staging(&self, staging_path: &Path) -> Result<PathBuf, SessionError> {
        let final_path = self.final_for(staging_path)?;
        atomic::sync_staging(staging_path, &final_path)?;
        atomic::promote(staging_path, &final_path, Promote::NoClobber)?;
        info!(path = %final_path.display(), "staging recuperado como archivo final");
        Ok(final_path)
    }

    /// Borra un staging huérfano
    pub fn discard_staging(&self, staging_path: &Path) -> Result<(), SessionError> {
        self.final_for(staging_path)?;
        fs::remove_file(staging_path).map_err(|source| SessionError::Cleanup {
            path: staging_path.to_path_buf(),
            source,
        })?;
        info!(path = %staging_path.display(), "staging descartado");
        Ok(())
    }

    /// `<stem>_<timestamp>.csv`, o `<stem>_<timestamp>_<n>.csv` si ese nombre
    /// ya fue confirmado por otra sesión.
    fn free_final_path(&self, stem: &str, timestamp: &str) -> PathBuf {
        let mut candidate = self.output_dir.join(format!("{stem}_{timestamp}.csv"));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = self.output_dir.join(format!("{stem}_{timestamp}_{suffix}.csv"));
            suffix += 1;
        }
        if suffix > 1 {
            debug!(path = %candidate.display(), "nombre final ocupado, se usa sufijo");
        }
        candidate
    }

    fn owns_staging(&self, path: &Path) -> bool {
        let prefix = format!("{}_", self.filename_stem.trim());
        let named_like_session = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&prefix))
            .unwrap_or(false);
        named_like_session && atomic::is_staging_path(path)
    }

    fn final_for(&self, staging_path: &Path) -> Result<PathBuf, SessionError> {
        if !self.owns_staging(staging_path) {
            return Err(SessionError::NotStaging {
                path: staging_path.to_path_buf(),
            });
        }
        atomic::final_path_for(staging_path).ok_or_else(|| SessionError::NotStaging {
            path: staging_path.to_path_buf(),
        })
    }
}

/// Una operación de append masivo seguida de finalize
#[derive(Debug)]
pub struct ImportSession {
    header: Header,
    staging_path: PathBuf,
    final_path: PathBuf,
    state: SessionState,
    file: Option<File>,
    rows_written: usize,
}

impl ImportSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Valida `record` y lo agrega al staging.
    ///
    /// Los errores de validación o de I/O dejan la sesión OPEN; una fila que
    /// no se pudo escribir se trunca.
    pub fn append(&mut self, record: &Record) -> Result<(), SessionError> {
        self.require_state("append", &[SessionState::Open])?;
        let row = self.validate(record)?;

        let Some(file) = self.file.as_mut() else {
            return Err(SessionError::InvalidState {
                operation: "append",
                state: self.state,
            });
        };

        file_utils::encode_row(&row)
            .and_then(|bytes| {
                append_or_rollback(file, &self.staging_path, |file| {
                    file.write_all(&bytes)?;
                    file.flush()
                })
            })
            .map_err(|source| SessionError::Append {
                path: self.staging_path.clone(),
                source,
            })?;

        self.rows_written += 1;
        debug!(path = %self.staging_path.display(), rows = self.rows_written, "fila agregada");
        Ok(())
    }

    /// Flush, fsync y promoción del staging al archivo final.
    ///
    /// También se acepta desde FAILED para reintentar.
    pub fn finalize(&mut self) -> Result<&Path, SessionError> {
        self.require_state("finalize", &[SessionState::Open, SessionState::Failed])?;
        self.state = SessionState::Finalizing;
        info!(
            staging = %self.staging_path.display(),
            path = %self.final_path.display(),
            "finalizando sesión de importación"
        );

        let result = match self.file.take() {
            Some(file) => file
                .sync_all()
                .map_err(|source| AtomicWriteError {
                    path: self.final_path.clone(),
                    staging_path: self.staging_path.clone(),
                    step: WriteStep::Sync,
                    source,
                }),
            None => atomic::sync_staging(&self.staging_path, &self.final_path),
        }
        .and_then(|_| atomic::promote(&self.staging_path, &self.final_path, Promote::NoClobber));

        match result {
            Ok(()) => {
                self.state = SessionState::Committed;
                info!(path = %self.final_path.display(), rows = self.rows_written, "sesión de importación confirmada");
                Ok(self.final_path.as_path())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                error!(
                    staging = %self.staging_path.display(),
                    error = %err,
                    "finalize falló; el staging se conserva"
                );
                Err(err.into())
            }
        }
    }

    /// Borra el staging de una sesión OPEN
    pub fn abort(mut self) -> Result<(), SessionError> {
        self.require_state("abort", &[SessionState::Open])?;
        self.file.take();
        self.remove_staging()
    }

    /// Borra el staging de una sesión FAILED
    pub fn discard(self) -> Result<(), SessionError> {
        self.require_state("discard", &[SessionState::Failed])?;
        self.remove_staging()
    }

    fn remove_staging(&self) -> Result<(), SessionError> {
        fs::remove_file(&self.staging_path).map_err(|source| SessionError::Cleanup {
            path: self.staging_path.clone(),
            source,
        })?;
        info!(path = %self.staging_path.display(), "sesión descartada");
        Ok(())
    }

    fn require_state(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn validate(&self, record: &Record) -> Result<Vec<String>, ValidationError> {
        for field in REQUIRED_IMPORT_FIELDS {
            let value = record.get(field).map(str::trim).unwrap_or("");
            if value.is_empty() {
                return Err(ValidationError::new(field, "campo obligatorio ausente o vacío"));
            }
        }

        let cantidad = record.get("cantidad").map(str::trim).unwrap_or("");
        if !is_non_negative_integer(cantidad) {
            return Err(ValidationError::new(
                "cantidad",
                format!("debe ser un entero no negativo, se recibió '{cantidad}'"),
            ));
        }

        if let Some(unknown) = record.columns().find(|column| !self.header.contains(column)) {
            return Err(ValidationError::new(unknown, "columna no existe en el header de la sesión"));
        }

        Ok(self
            .header
            .iter()
            .map(|column| clean_single_line(record.get(column).unwrap_or("")))
            .collect())
    }
}

/// Agrega una fila al final de `file`. Si `write` falla, el archivo se trunca
/// al largo previo para no dejar filas parciales.
fn append_or_rollback<F>(file: &mut File, path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let offset = file.seek(SeekFrom::End(0))?;
    if let Err(err) = write(file) {
        let rolled_back = file
            .set_len(offset)
            .and_then(|_| file.seek(SeekFrom::Start(offset)));
        if let Err(rollback) = rolled_back {
            error!(
                path = %path.display(),
                error = %rollback,
                "no fue posible revertir la escritura parcial"
            );
        }
        return Err(err);
    }
    Ok(())
}

/// Solo dígitos ASCII: sin signo, sin límite de magnitud.
fn is_non_negative_integer(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Convierte saltos de línea en espacios y elimina NULs
fn clean_single_line(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "")
        .replace('\n', " ")
        .trim()
        .to_string()
}
