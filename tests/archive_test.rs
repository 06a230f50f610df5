//! Integration tests for archive export/import
//!
//! Exports a populated backend, imports into a freshly initialized
//! empty backend, and checks the namespace survives intact — within a
//! medium and across media.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use serde_json::json;

use confstore::{ConfigRecord, ConfigStorage, Database, DatabaseStorage, FileStorage};

fn sample_records() -> Vec<(String, ConfigRecord)> {
    let mut site = ConfigRecord::new();
    site.insert("name".to_string(), json!("Test Site"));
    site.insert("slogan".to_string(), json!("configuration that travels"));

    let mut theme = ConfigRecord::new();
    theme.insert("theme".to_string(), json!("basis"));
    theme.insert("dark".to_string(), json!(false));

    let mut core = ConfigRecord::new();
    core.insert("modules".to_string(), json!(["node", "search"]));

    vec![
        ("site.settings".to_string(), site),
        ("site.theme".to_string(), theme),
        ("system.core".to_string(), core),
    ]
}

fn populate(storage: &dyn ConfigStorage) {
    for (name, record) in sample_records() {
        storage.write(&name, &record).unwrap();
    }
}

fn snapshot(storage: &dyn ConfigStorage) -> HashMap<String, ConfigRecord> {
    let names = storage.list_all("").unwrap();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    storage.read_multiple(&names).unwrap()
}

fn file_storage(dir: &tempfile::TempDir, sub: &str) -> FileStorage {
    let storage = FileStorage::new(dir.path().join(sub));
    storage.initialize_storage().unwrap();
    storage
}

fn database_storage(table: &str) -> DatabaseStorage {
    let storage = DatabaseStorage::new(Database::open_in_memory().unwrap(), table);
    storage.initialize_storage().unwrap();
    storage
}

#[test]
fn test_file_export_import_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = file_storage(&dir, "source");
    populate(&source);
    let before = snapshot(&source);

    let archive = dir.path().join("export.tar");
    source.export_archive(&archive).unwrap();

    let target = file_storage(&dir, "target");
    target.import_archive(&archive).unwrap();

    assert_eq!(snapshot(&target), before);
}

#[test]
fn test_database_export_import_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = database_storage("config");
    populate(&source);
    let before = snapshot(&source);

    let archive = dir.path().join("export.tar");
    source.export_archive(&archive).unwrap();

    let target = database_storage("config_restore");
    target.import_archive(&archive).unwrap();

    assert_eq!(snapshot(&target), before);
}

#[test]
fn test_archive_travels_across_media() {
    let dir = tempfile::tempdir().unwrap();
    let source = file_storage(&dir, "source");
    populate(&source);
    let before = snapshot(&source);

    let archive = dir.path().join("export.tar");
    source.export_archive(&archive).unwrap();

    let target = database_storage("config");
    target.import_archive(&archive).unwrap();

    assert_eq!(snapshot(&target), before);
}

#[test]
fn test_import_overwrites_same_names() {
    let dir = tempfile::tempdir().unwrap();
    let source = file_storage(&dir, "source");
    populate(&source);

    let archive = dir.path().join("export.tar");
    source.export_archive(&archive).unwrap();

    let target = file_storage(&dir, "target");
    let mut stale = ConfigRecord::new();
    stale.insert("name".to_string(), json!("Stale Site"));
    target.write("site.settings", &stale).unwrap();

    target.import_archive(&archive).unwrap();

    assert_eq!(
        target.read("site.settings").unwrap().unwrap()["name"],
        json!("Test Site")
    );
}

#[test]
fn test_import_missing_archive_fails_for_both_backends() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.tar");

    let file = file_storage(&dir, "file");
    assert!(file.import_archive(&missing).is_err());

    let db = database_storage("config");
    assert!(db.import_archive(&missing).is_err());
}

#[test]
fn test_export_of_empty_namespace_imports_clean() {
    let dir = tempfile::tempdir().unwrap();
    let source = file_storage(&dir, "source");

    let archive = dir.path().join("empty.tar");
    source.export_archive(&archive).unwrap();

    let target = database_storage("config");
    target.import_archive(&archive).unwrap();
    assert_eq!(target.list_all("").unwrap().len(), 0);
}
