// ==========================================
// Pipeline de migración: respaldo, verificación, reportes y borrado
// ==========================================

mod test_helpers;

use std::fs;

use inventario_tools::file_utils::read_table;
use inventario_tools::migration::{FileStatus, MigrationStep};
use inventario_tools::models::{info_products_header, Header};
use inventario_tools::{InventoryError, MigrationMode, MigrationPipeline};
use tempfile::tempdir;
use test_helpers::{file_names, settings_in, source_file, write_file};

const TS: &str = "20260401_120000";
const LUCES: &str = "ID;Producto;Subcaregoría;Marca\n7;Luz LED;Delantera;Acme\n8;Luz Roja;Trasera;\n";

#[test]
fn test_clean_migration_with_delete_source() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);

    let summary = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: true }, TS)
        .expect("run");

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.outcomes[0].status, FileStatus::Verified { source_deleted: true });

    let destination = settings.reference_dir.join("Luces.csv");
    let table = read_table(&destination).expect("read destination");
    assert_eq!(table.header(), &info_products_header());
    assert_eq!(table.len(), 2);
    assert_eq!(table.value(0, "Subcategoría"), Some("Delantera"));
    assert_eq!(table.value(0, "Producto"), Some("Luz LED"));
    assert_eq!(table.value(0, "Rastrear Inventario"), Some("1"));
    assert_eq!(table.value(1, "Marca"), Some(""));
    assert!(!table.header().contains("ID"));

    assert!(!settings.reports_dir().join("Luces_mismatches.csv").exists());
    assert!(!settings.source_dir.exists(), "emptied source dir is removed");
    assert!(summary.source_dir_removed);
    assert_eq!(summary.backup_dir, Some(settings.backup_dir(TS)));
}

#[test]
fn test_existing_destination_is_backed_up_unchanged() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);
    let destination = settings.reference_dir.join("Luces.csv");
    let previous = "ID,Producto\n1,Luz vieja\n";
    write_file(&destination, previous);

    let summary = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: false }, TS)
        .expect("run");

    let backup = settings.backup_dir(TS).join("Luces.csv");
    assert_eq!(summary.outcomes[0].backup_path.as_deref(), Some(backup.as_path()));
    assert_eq!(fs::read_to_string(&backup).expect("read backup"), previous);
    assert_ne!(fs::read_to_string(&destination).expect("read"), previous);
    assert!(source_file(&settings, "Luces").exists(), "source kept without --delete-source");
}

#[test]
fn test_mismatch_writes_report_and_keeps_source() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);

    // Un nombre con espacio final no sobrevive al trim del header al releer.
    let target = Header::new(["Producto", "Marca "]).expect("header");
    let summary = MigrationPipeline::new(&settings)
        .with_target(target)
        .run_at(MigrationMode::Migrate { delete_source: true }, TS)
        .expect("run");

    let report_path = settings.reports_dir().join("Luces_mismatches.csv");
    assert_eq!(
        summary.outcomes[0].status,
        FileStatus::Flagged {
            report_path: report_path.clone(),
            mismatches: 1
        }
    );
    assert_eq!(summary.exit_code(), 1);
    assert!(source_file(&settings, "Luces").exists());
    assert!(!summary.source_dir_removed);

    let report = read_table(&report_path).expect("read report");
    assert_eq!(
        report.header().columns(),
        ["row_index", "column", "expected_value", "actual_value"]
    );
    assert_eq!(report.value(0, "row_index"), Some("0"));
    assert_eq!(report.value(0, "column"), Some("__header__"));
}

#[test]
fn test_stale_report_is_removed_after_clean_run() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);
    let stale = settings.reports_dir().join("Luces_mismatches.csv");
    write_file(&stale, "row_index,column,expected_value,actual_value\n1,Marca,a,b\n");

    MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: false }, TS)
        .expect("run");

    assert!(!stale.exists());
}

#[test]
fn test_dry_run_plans_without_writing() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);

    let summary = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::DryRun, TS)
        .expect("run");

    match &summary.outcomes[0].status {
        FileStatus::Planned {
            rows,
            missing_columns,
            dropped_columns,
            rules,
        } => {
            assert_eq!(*rows, 2);
            assert!(missing_columns.contains(&"Rastrear Inventario".to_string()));
            assert_eq!(dropped_columns, &vec!["ID".to_string()]);
            assert!(rules.contains(&"alias"));
            assert!(rules.contains(&"drop-id"));
        }
        other => panic!("expected a plan, got {other:?}"),
    }
    assert_eq!(summary.exit_code(), 0);
    assert!(summary.backup_dir.is_none());
    assert!(!settings.reference_dir.exists(), "dry-run must not touch the reference dir");
}

#[test]
fn test_one_broken_file_does_not_stop_the_batch() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);
    write_file(&source_file(&settings, "Roto"), "ID,Producto\n1,a,b\n");
    write_file(&settings.source_dir.join("notas.txt"), "no es una categoría");

    let summary = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: true }, TS)
        .expect("run");

    let categories: Vec<_> = summary.outcomes.iter().map(|o| o.category.as_str()).collect();
    assert_eq!(categories, vec!["Luces", "Roto"]);
    assert!(matches!(summary.outcomes[0].status, FileStatus::Verified { .. }));
    assert!(matches!(
        summary.outcomes[1].status,
        FileStatus::Failed {
            step: MigrationStep::Read,
            ..
        }
    ));
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(
        file_names(&settings.source_dir),
        vec!["Inventario(Roto).csv", "notas.txt"]
    );
    assert!(!settings.reference_dir.join("Roto.csv").exists());
}

#[test]
fn test_missing_source_dir_is_fatal() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());

    let err = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: false }, TS)
        .unwrap_err();

    assert!(matches!(err, InventoryError::SourceDirMissing(_)));
    assert!(!settings.backup_dir(TS).exists());
}

#[test]
fn test_existing_backup_dir_aborts_the_run() {
    let root = tempdir().expect("tempdir");
    let settings = settings_in(root.path());
    write_file(&source_file(&settings, "Luces"), LUCES);
    fs::create_dir_all(settings.backup_dir(TS)).expect("pre-create backup dir");

    let err = MigrationPipeline::new(&settings)
        .run_at(MigrationMode::Migrate { delete_source: true }, TS)
        .unwrap_err();

    assert!(matches!(err, InventoryError::BackupRoot { .. }));
    assert!(source_file(&settings, "Luces").exists());
    assert!(!settings.reference_dir.join("Luces.csv").exists());
}

#[test]
fn test_configured_artifact_names_are_honoured() {
    let root = tempdir().expect("tempdir");
    let settings = inventario_tools::Settings {
        backup_prefix: "_respaldo_".to_string(),
        reports_dir_name: "_reportes".to_string(),
        ..settings_in(root.path())
    };
    write_file(&source_file(&settings, "Luces"), LUCES);

    let summary = MigrationPipeline::new(&settings)
        .with_target(Header::new(["Producto", "Marca "]).expect("header"))
        .run_at(MigrationMode::Migrate { delete_source: false }, TS)
        .expect("run");

    let backup_dir = settings.reference_dir.join(format!("_respaldo_{TS}"));
    assert_eq!(summary.backup_dir, Some(backup_dir.clone()));
    assert!(backup_dir.is_dir());
    assert!(settings
        .reference_dir
        .join("_reportes")
        .join("Luces_mismatches.csv")
        .exists());
}
