// ==========================================
// Configuración: directorios y nombres de artefactos
// ==========================================
// Orden de carga:
//   1. valores por defecto
//   2. archivo JSON (INVENTARIO_CONFIG o ./inventario.json si existe)
//   3. variables de entorno INVENTARIO_*_DIR
// ==========================================

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "INVENTARIO_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "inventario.json";
pub const OUTPUT_DIR_ENV: &str = "INVENTARIO_OUTPUT_DIR";
pub const REFERENCE_DIR_ENV: &str = "INVENTARIO_REFERENCE_DIR";
pub const SOURCE_DIR_ENV: &str = "INVENTARIO_SOURCE_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub source_dir: PathBuf,
    pub import_filename_stem: String,
    pub reports_dir_name: String,
    pub backup_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/output"),
            reference_dir: PathBuf::from("data/utilities/info_products"),
            source_dir: PathBuf::from("infor_prodcts_aux"),
            import_filename_stem: "import_productos".to_string(),
            reports_dir_name: "_migration_reports".to_string(),
            backup_prefix: "_backup_".to_string(),
        }
    }
}

impl Settings {
    /// Carga defaults, el JSON opcional y las variables de entorno
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| env::var_os(key).map(PathBuf::from));
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "configuración cargada");
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Aplica overrides de directorios; `lookup` resuelve una variable
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV) {
            self.output_dir = dir;
        }
        if let Some(dir) = lookup(REFERENCE_DIR_ENV) {
            self.reference_dir = dir;
        }
        if let Some(dir) = lookup(SOURCE_DIR_ENV) {
            self.source_dir = dir;
        }
    }

    /// `<reference_dir>/<reports_dir_name>`
    pub fn reports_dir(&self) -> PathBuf {
        self.reference_dir.join(&self.reports_dir_name)
    }

    /// `<reference_dir>/<backup_prefix><timestamp>`
    pub fn backup_dir(&self, timestamp: &str) -> PathBuf {
        self.reference_dir
            .join(format!("{}{}", self.backup_prefix, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "output_dir": "/srv/out" }"#).expect("parse");
        assert_eq!(settings.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(settings.import_filename_stem, "import_productos");
        assert_eq!(settings.reference_dir, PathBuf::from("data/utilities/info_products"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            REFERENCE_DIR_ENV => Some(PathBuf::from("/tmp/ref")),
            _ => None,
        });
        assert_eq!(settings.reference_dir, PathBuf::from("/tmp/ref"));
        assert_eq!(settings.output_dir, PathBuf::from("data/output"));
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("inventario.json");
        fs::write(&path, "{ no es json").unwrap();

        assert!(matches!(Settings::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Settings::from_file(&dir.path().join("falta.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn derived_directories() {
        let settings = Settings::default();
        assert_eq!(
            settings.reports_dir(),
            PathBuf::from("data/utilities/info_products/_migration_reports")
        );
        assert_eq!(
            settings.backup_dir("20260101_000000"),
            PathBuf::from("data/utilities/info_products/_backup_20260101_000000")
        );
    }
}
