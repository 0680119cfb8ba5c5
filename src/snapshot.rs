use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::args::DbType;

/// Directory holding the query fixtures, one per (database type, scenario)
/// pair. The database type is the snapshot suffix, the scenario its name.
fn snapshot_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("snapshots")
}

/// Compare rows against the stored fixture for this database and scenario,
/// panicking on mismatch. A missing fixture goes through insta's pending
/// snapshot flow, which records it for review on first run.
pub fn assert_rows_snapshot(db_type: DbType, scenario: &str, rows: &[Map<String, Value>]) {
    let mut settings = insta::Settings::clone_current();
    settings.set_snapshot_path(snapshot_dir());
    settings.set_snapshot_suffix(db_type.as_str());
    settings.set_prepend_module_to_snapshot(false);
    settings.bind(|| {
        insta::assert_json_snapshot!(scenario, rows);
    });
}
