// ==========================================
// Utilidades compartidas por los tests de integración
// ==========================================

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use inventario_tools::Settings;

/// Settings bajo `root`, con los nombres de directorio por defecto
pub fn settings_in(root: &Path) -> Settings {
    Settings {
        output_dir: root.join("data").join("output"),
        reference_dir: root.join("data").join("utilities").join("info_products"),
        source_dir: root.join("infor_prodcts_aux"),
        ..Settings::default()
    }
}

/// Escribe `content`, creando los directorios padre
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, content).expect("write fixture");
}

/// Nombres de archivo ordenados directamente bajo `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn source_file(settings: &Settings, category: &str) -> PathBuf {
    settings.source_dir.join(format!("Inventario({category}).csv"))
}
