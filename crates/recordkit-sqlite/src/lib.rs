//! SQLite driver for recordkit.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements `recordkit_core::Connection` on top of `libsqlite3-sys`, with the
//! SQLite library compiled in.
//!
//! # Features
//!
//! - Positional `?` binding with a parameter-count check
//! - Multi-statement scripts returning one row set per `SELECT`
//! - In-memory (private or shared by name) and file-based databases
//! - Configurable open flags and busy timeout
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Float`, `Double` | REAL |
//! | `Text`, `Decimal` | TEXT |
//! | `Bytes` | BLOB |
//! | `Date`, `Timestamp` | TEXT (`YYYY-MM-DD[ HH:MM:SS]`) |
//! | `Json` | TEXT |

pub mod connection;
pub mod source;
pub mod types;

use std::ffi::CStr;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use source::SqliteDataSource;

/// The SQLite library version.
pub fn sqlite_version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static string
    unsafe { CStr::from_ptr(libsqlite3_sys::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

/// The SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    // SAFETY: sqlite3_libversion_number is always safe to call
    unsafe { libsqlite3_sys::sqlite3_libversion_number() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(
            version.starts_with('3'),
            "Expected SQLite 3.x, got {}",
            version
        );
    }

    #[test]
    fn test_sqlite_version_number() {
        let num = sqlite_version_number();
        assert!(
            num >= 3_000_000,
            "Expected SQLite 3.x.x (>= 3000000), got {}",
            num
        );
    }
}
