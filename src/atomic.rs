// ==========================================
// Escritura atómica: staging + fsync + rename
// ==========================================
// Garantía: el destino final queda intacto (contenido previo o ausente)
// ante cualquier fallo previo al rename; después del rename contiene el
// contenido nuevo completo. El staging nunca se borra en caso de error.
// ==========================================

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{AtomicWriteError, WriteStep};

/// Marca de los nombres staging: `report.csv` → `report.inprogress.csv`
pub const STAGING_MARKER: &str = "inprogress";

/// Si la promoción puede reemplazar un archivo final existente
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promote {
    Replace,
    NoClobber,
}

/// Ruta staging junto a `final_path`
pub fn staging_path_for(final_path: &Path) -> PathBuf {
    let stem = final_path.file_stem().map(|s| s.to_string_lossy().into_owned());
    let extension = final_path.extension().map(|e| e.to_string_lossy().into_owned());
    let name = match (stem, extension) {
        (Some(stem), Some(ext)) => format!("{stem}.{STAGING_MARKER}.{ext}"),
        (Some(stem), None) => format!("{stem}.{STAGING_MARKER}"),
        _ => format!(".{STAGING_MARKER}"),
    };
    final_path.with_file_name(name)
}

/// Inversa de [`staging_path_for`]; `None` si no es un nombre staging
pub fn final_path_for(staging_path: &Path) -> Option<PathBuf> {
    let name = staging_path.file_name()?.to_str()?;
    let marker = format!(".{STAGING_MARKER}");
    if let Some(stem) = name.strip_suffix(&marker) {
        return (!stem.is_empty()).then(|| staging_path.with_file_name(stem));
    }
    let (head, ext) = name.rsplit_once('.')?;
    let stem = head.strip_suffix(&marker)?;
    if stem.is_empty() {
        return None;
    }
    Some(staging_path.with_file_name(format!("{stem}.{ext}")))
}

pub fn is_staging_path(path: &Path) -> bool {
    final_path_for(path).is_some()
}

/// Escribe lo que emite `produce` en el staging, hace flush y fsync, y lo
/// renombra sobre `final_path`.
///
/// Se puede reintentar tras un fallo: el staging se trunca.
pub fn write_atomic<F>(final_path: &Path, produce: F) -> Result<(), AtomicWriteError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let staging_path = staging_path_for(final_path);
    let fail = |step, source| AtomicWriteError {
        path: final_path.to_path_buf(),
        staging_path: staging_path.clone(),
        step,
        source,
    };

    let file = File::create(&staging_path).map_err(|e| fail(WriteStep::CreateStaging, e))?;
    let mut writer = BufWriter::new(file);
    produce(&mut writer).map_err(|e| fail(WriteStep::Write, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| fail(WriteStep::Flush, e.into_error()))?;
    file.sync_all().map_err(|e| fail(WriteStep::Sync, e))?;
    drop(file);

    promote(&staging_path, final_path, Promote::Replace)
}

/// Fsync de un staging ya escrito (antes de reintentar la promoción)
pub fn sync_staging(staging_path: &Path, final_path: &Path) -> Result<(), AtomicWriteError> {
    OpenOptions::new()
        .write(true)
        .open(staging_path)
        .and_then(|file| file.sync_all())
        .map_err(|source| AtomicWriteError {
            path: final_path.to_path_buf(),
            staging_path: staging_path.to_path_buf(),
            step: WriteStep::Sync,
            source,
        })
}

/// Promueve `staging_path` a `final_path` en un solo paso atómico.
///
/// `Replace` usa `rename`. `NoClobber` enlaza y luego borra el staging: si el
/// archivo final ya existe (aunque aparezca en ese instante) es una colisión
/// y no se toca nada.
pub fn promote(staging_path: &Path, final_path: &Path, mode: Promote) -> Result<(), AtomicWriteError> {
    let fail = |step, source| AtomicWriteError {
        path: final_path.to_path_buf(),
        staging_path: staging_path.to_path_buf(),
        step,
        source,
    };

    match mode {
        Promote::Replace => {
            fs::rename(staging_path, final_path).map_err(|e| fail(WriteStep::Rename, e))?
        }
        Promote::NoClobber => {
            // hard_link falla con AlreadyExists si el destino aparece entre
            // medio; rename lo pisaría.
            fs::hard_link(staging_path, final_path).map_err(|e| {
                let step = if e.kind() == io::ErrorKind::AlreadyExists {
                    WriteStep::TargetExists
                } else {
                    WriteStep::Rename
                };
                fail(step, e)
            })?;
            if let Err(err) = fs::remove_file(staging_path) {
                warn!(
                    staging = %staging_path.display(),
                    error = %err,
                    "archivo final creado pero el staging no pudo eliminarse"
                );
            }
        }
    }
    debug!(
        staging = %staging_path.display(),
        path = %final_path.display(),
        "staging promovido"
    );

    // El archivo final ya está en su lugar; un fallo acá solo afecta la
    // durabilidad de la entrada de directorio.
    if let Err(err) = sync_parent_dir(final_path) {
        warn!(path = %final_path.display(), error = %err, "no fue posible sincronizar el directorio padre");
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
