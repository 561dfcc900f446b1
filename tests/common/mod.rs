//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

pub use shardb::{Collection, Database, DatabaseConfig, Error, SyncReport};
use tempfile::TempDir;
use tracing_subscriber::filter::LevelFilter;

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness output
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(LevelFilter::DEBUG)
            .try_init();
    });
}

/// Database rooted in a temporary directory
pub struct TestDb {
    pub db: Database,
    pub dir: TempDir,
}

impl TestDb {
    /// Create an empty database named `testdb`
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new("testdb", DatabaseConfig::for_testing(dir.path())).unwrap();
        TestDb { db, dir }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory of a collection
    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.root().join("collections").join(name)
    }

    /// Load the database from this directory
    pub fn reload(&self) -> shardb::Result<Database> {
        Database::load_with_config(DatabaseConfig::for_testing(self.root()))
    }

    /// Sync and assert every collection succeeded
    pub fn sync_clean(&self) -> SyncReport {
        let report = self.db.sync().unwrap();
        assert!(report.is_clean(), "sync failures: {:?}", report.failed);
        report
    }
}

/// File name to contents for every file directly under `dir`
pub fn snapshot_files(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_file() {
            files.insert(
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path()).unwrap(),
            );
        }
    }
    files
}

/// Fill a collection with `count` payloads of `len` bytes
pub fn fill(collection: &Collection, count: usize, len: usize) -> Vec<u64> {
    (0..count)
        .map(|i| collection.insert(vec![(i % 251) as u8; len]).unwrap())
        .collect()
}
