#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use recordkit::prelude::*;
use recordkit::sqlite_db;

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// A fresh named in-memory database, private to the calling test.
pub fn memory_db(properties: Properties) -> DbConfig {
    let n = NEXT_DB.fetch_add(1, Ordering::Relaxed);
    let name = format!("recordkit_it_{}_{}", std::process::id(), n);
    let source = SqliteDataSource::memory(&name).unwrap();
    sqlite_db(name, source, properties).unwrap()
}

pub fn count(db: &DbConfig, table: &str) -> i32 {
    db.query()
        .add(format!("SELECT COUNT(*) AS n FROM {}", table), ())
        .result()
        .unwrap()
        .unwrap()
        .get_int("n", -1)
        .unwrap()
}
