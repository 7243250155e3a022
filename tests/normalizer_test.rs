// ==========================================
// Normalizador de referencia sobre un directorio real
// ==========================================

mod test_helpers;

use std::fs;

use inventario_tools::logging;
use inventario_tools::{ReferenceContext, TraceLog};
use tempfile::tempdir;
use test_helpers::{settings_in, write_file};

#[test]
fn test_normalizes_top_level_files_only() {
    logging::init_test();
    let root = tempdir().expect("tempdir");
    let reference = settings_in(root.path()).reference_dir;

    write_file(&reference.join("Luces.csv"), "ID,Subcaregoría,Nombre\n1,X,Widget\n");
    let backup_copy = "ID,Subcaregoría,Nombre\n1,X,Viejo\n";
    write_file(&reference.join("_backup_20260101_000000").join("Luces.csv"), backup_copy);
    let report = "row_index,column,expected_value,actual_value\n";
    write_file(&reference.join("_migration_reports").join("Luces_mismatches.csv"), report);

    let mut trace = TraceLog::new();
    let summary = ReferenceContext::new(&reference)
        .ensure_initialized(&mut trace)
        .expect("normalize");

    assert_eq!(summary.scanned, 1);
    assert_eq!(
        fs::read_to_string(reference.join("Luces.csv")).expect("read"),
        "Subcategoría,Nombre,Rastrear Inventario\nX,Widget,1\n"
    );
    assert_eq!(
        fs::read_to_string(reference.join("_backup_20260101_000000").join("Luces.csv")).unwrap(),
        backup_copy
    );
    assert_eq!(
        fs::read_to_string(reference.join("_migration_reports").join("Luces_mismatches.csv")).unwrap(),
        report
    );
    assert!(trace.entries.iter().all(|e| e.path == reference.join("Luces.csv")));
}

#[test]
fn test_second_process_start_rewrites_nothing() {
    let root = tempdir().expect("tempdir");
    let reference = settings_in(root.path()).reference_dir;
    write_file(&reference.join("Cascos.csv"), "id;Producto;ID Externo;Rastrear Inventario\n1;Casco;E-9;\n");
    write_file(&reference.join("Pedales.csv"), "Producto,Rastrear Inventario\nPedal,0\n");

    let first = ReferenceContext::new(&reference)
        .ensure_initialized(&mut TraceLog::new())
        .expect("first start");
    assert_eq!(first.modified, 1);
    let after_first = fs::read_to_string(reference.join("Cascos.csv")).expect("read");
    assert_eq!(after_first, "Producto,ID Externo,Rastrear Inventario\nCasco,E-9,1\n");

    let mut trace = TraceLog::new();
    let second = ReferenceContext::new(&reference)
        .ensure_initialized(&mut trace)
        .expect("second start");

    assert_eq!(second.modified, 0);
    assert!(trace.entries.iter().all(|e| !e.modified && e.rule == "unchanged"));
    assert_eq!(fs::read_to_string(reference.join("Cascos.csv")).unwrap(), after_first);
}

#[test]
fn test_cp1252_file_is_rewritten_as_utf8() {
    let root = tempdir().expect("tempdir");
    let reference = settings_in(root.path()).reference_dir;
    // "Categoría" y "Sillín" en cp1252 (í = 0xED)
    write_file(&reference.join("Sillines.csv"), b"ID,Categor\xEDa,Producto\n3,Ruta,Sill\xEDn\n");

    let summary = ReferenceContext::new(&reference)
        .ensure_initialized(&mut TraceLog::new())
        .expect("normalize");

    assert_eq!(summary.modified, 1);
    assert_eq!(
        fs::read_to_string(reference.join("Sillines.csv")).expect("valid utf-8"),
        "Categoría,Producto,Rastrear Inventario\nRuta,Sillín,1\n"
    );
}
