//! Read-only access to the installed-package database.
//!
//! The database is written by the package installer; it is never modified
//! here.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::validate_table;
use crate::error::Result;
use crate::runtime::Runtime;

/// Default location of the installed-package database.
pub const DEFAULT_PACKAGE_DB: &str = "/var/ypkg/db/package.db";
pub const DEFAULT_PACKAGE_TABLE: &str = "world";

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    pub name: String,
    pub version: String,
    pub repo: String,
    /// Seconds since the Unix epoch.
    pub install_time: i64,
}

impl InstalledRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            version: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            repo: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            install_time: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
        })
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait InstalledStore {
    /// The installed record for `name`, if the package is installed.
    fn find(&self, name: &str) -> Result<Option<InstalledRecord>>;

    /// Every installed package, in database order.
    fn all(&self) -> Result<Vec<InstalledRecord>>;
}

/// The installer's SQLite database, opened read-only.
pub struct WorldDb {
    // None when the database does not exist yet.
    conn: Option<Connection>,
    table: String,
    path: PathBuf,
}

impl WorldDb {
    /// Open the database at `path`.
    ///
    /// A missing database means nothing is installed.
    #[tracing::instrument(skip(runtime))]
    pub fn open<R: Runtime>(runtime: &R, path: &Path, table: &str) -> Result<Self> {
        let table = validate_table(table)?.to_string();
        let conn = if runtime.is_file(path) {
            debug!("Opening installed-package database {:?}", path);
            Some(Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?)
        } else {
            warn!(
                "Installed-package database {:?} not found, assuming nothing is installed",
                path
            );
            None
        };
        Ok(Self {
            conn,
            table,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstalledStore for WorldDb {
    fn find(&self, name: &str) -> Result<Option<InstalledRecord>> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };
        let record = conn
            .query_row(
                &format!(
                    "SELECT name, version, repo, install_time FROM {} WHERE name = ?1",
                    self.table
                ),
                params![name],
                InstalledRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn all(&self) -> Result<Vec<InstalledRecord>> {
        let Some(conn) = &self.conn else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT name, version, repo, install_time FROM {}",
            self.table
        ))?;
        let records = stmt
            .query_map([], InstalledRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
