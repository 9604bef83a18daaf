//! Dependency store
//!
//! One SQLite table with a row per package name holding the raw dependency
//! tokens of its highest-version descriptor:
//!
//! ```text
//! name TEXT, version TEXT, rdep TEXT, bdep TEXT, redep TEXT, cdep TEXT
//! ```

mod builder;
mod installed;

pub use builder::{DEFAULT_JOBS, DependencyDatabaseBuilder};
pub use installed::{
    DEFAULT_PACKAGE_DB, DEFAULT_PACKAGE_TABLE, InstalledRecord, InstalledStore, WorldDb,
};

#[cfg(test)]
pub use installed::MockInstalledStore;

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use crate::error::{Error, Result};
use crate::evaluator::Fields;
use crate::runtime::Runtime;

/// Default location of the dependency store.
pub const DEFAULT_DEPEND_DB: &str = "/var/ybs/db/depend.db";
pub const DEFAULT_DEPEND_TABLE: &str = "universe";

/// Kind of dependency relation between two packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Runtime,
    Build,
    Recommended,
    Conflict,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::Runtime,
        EdgeType::Build,
        EdgeType::Recommended,
        EdgeType::Conflict,
    ];

    /// Store column holding this edge list.
    pub fn column(&self) -> &'static str {
        match self {
            EdgeType::Runtime => "rdep",
            EdgeType::Build => "bdep",
            EdgeType::Recommended => "redep",
            EdgeType::Conflict => "cdep",
        }
    }

    /// Descriptor field the edge list is read from.
    pub fn field(&self) -> &'static str {
        match self {
            EdgeType::Runtime => "RDEPEND",
            EdgeType::Build => "BDEPEND",
            EdgeType::Recommended => "RECOMMENDED",
            EdgeType::Conflict => "CONFLICT",
        }
    }

    /// One-letter tag used in reverse dependency reports.
    pub fn flag(&self) -> char {
        match self {
            EdgeType::Runtime => 'R',
            EdgeType::Build => 'B',
            EdgeType::Recommended => 'A',
            EdgeType::Conflict => 'C',
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Drop a parenthesized version constraint: `libarchive(>=3.0.4)` -> `libarchive`.
pub fn strip_constraint(token: &str) -> &str {
    token.split('(').next().unwrap_or(token)
}

/// Dependency edges of one package, as raw tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    pub rdep: Vec<String>,
    pub bdep: Vec<String>,
    pub redep: Vec<String>,
    pub cdep: Vec<String>,
}

impl DependencyRecord {
    /// Build a record from the fields printed by the descriptor evaluator.
    pub fn from_fields(name: impl Into<String>, version: impl Into<String>, fields: &Fields) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rdep: fields.get(EdgeType::Runtime.field()).to_vec(),
            bdep: fields.get(EdgeType::Build.field()).to_vec(),
            redep: fields.get(EdgeType::Recommended.field()).to_vec(),
            cdep: fields.get(EdgeType::Conflict.field()).to_vec(),
        }
    }

    /// Raw tokens of one edge list, constraints included.
    pub fn tokens(&self, edge: EdgeType) -> &[String] {
        match edge {
            EdgeType::Runtime => &self.rdep,
            EdgeType::Build => &self.bdep,
            EdgeType::Recommended => &self.redep,
            EdgeType::Conflict => &self.cdep,
        }
    }

    /// Bare package names of one edge list, in order, without duplicates.
    pub fn edges(&self, edge: EdgeType) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.tokens(edge).iter().map(|t| strip_constraint(t)) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Whether `name` appears in the given edge list once constraints are stripped.
    pub fn requires(&self, edge: EdgeType, name: &str) -> bool {
        self.tokens(edge).iter().any(|t| strip_constraint(t) == name)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tokens = |i: usize| -> rusqlite::Result<Vec<String>> {
            let text: Option<String> = row.get(i)?;
            Ok(text
                .unwrap_or_default()
                .split_whitespace()
                .map(String::from)
                .collect())
        };
        Ok(Self {
            name: row.get(0)?,
            version: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            rdep: tokens(2)?,
            bdep: tokens(3)?,
            redep: tokens(4)?,
            cdep: tokens(5)?,
        })
    }
}

/// Check that a table name is a plain SQL identifier, since it cannot be
/// bound as a parameter.
pub(crate) fn validate_table(table: &str) -> Result<&str> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(Error::InvalidTable(table.to_string()))
    }
}

/// Path the store is staged to before being renamed into place.
pub fn partial_path(store: &Path) -> PathBuf {
    let mut partial = store.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

/// A dependency table in a SQLite database.
pub struct DependencyStore {
    conn: Connection,
    table: String,
    location: PathBuf,
}

impl DependencyStore {
    /// Open an existing store read-only.
    #[tracing::instrument(skip(runtime))]
    pub fn open<R: Runtime>(runtime: &R, path: &Path, table: &str) -> Result<Self> {
        let table = validate_table(table)?;
        if !runtime.is_file(path) {
            return Err(Error::StoreUnavailable(path.to_path_buf()));
        }
        debug!("Opening dependency store {:?} (table {})", path, table);
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            table: table.to_string(),
            location: path.to_path_buf(),
        })
    }

    /// Create an empty transient store.
    pub fn in_memory(table: &str) -> Result<Self> {
        let table = validate_table(table)?;
        let store = Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
            location: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(&schema(&self.table))?;
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Where the store lives, `:memory:` for a transient one.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Insert or replace records in a single transaction.
    pub fn insert_all(&mut self, records: &[DependencyRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_records(&tx, &self.table, records)?;
        tx.commit()?;
        Ok(())
    }

    /// The record stored for `name`, if any.
    pub fn record(&self, name: &str) -> Result<Option<DependencyRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT name, version, rdep, bdep, redep, cdep FROM {} WHERE name = ?1",
                    self.table
                ),
                params![name],
                DependencyRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Bare dependency names of `name` for one edge type.
    ///
    /// Fails with [`Error::UnknownPackage`] when `name` has no record.
    pub fn edges(&self, name: &str, edge: EdgeType) -> Result<Vec<String>> {
        match self.record(name)? {
            Some(record) => Ok(record.edges(edge)),
            None => Err(Error::unknown_in(name, &self.location)),
        }
    }

    /// Every record, in insertion order.
    pub fn records(&self) -> Result<Vec<DependencyRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, version, rdep, bdep, redep, cdep FROM {} ORDER BY rowid",
            self.table
        ))?;
        let records = stmt
            .query_map([], DependencyRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write the full content of this store into a new database file at
    /// `path`, in one transaction.
    ///
    /// The file must not exist yet; on failure it may be left half-written
    /// and is the caller's to discard.
    #[tracing::instrument(skip(self))]
    pub fn copy_into(&self, path: &Path) -> Result<()> {
        let records = self.records()?;
        debug!("Replaying {} record(s) into {:?}", records.len(), path);

        let mut conn = Connection::open(path)?;
        let tx = conn.transaction()?;
        tx.execute_batch(&schema(&self.table))?;
        write_records(&tx, &self.table, &records)?;
        tx.commit()?;
        Ok(())
    }
}

fn schema(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            name TEXT PRIMARY KEY,
            version TEXT,
            rdep TEXT,
            bdep TEXT,
            redep TEXT,
            cdep TEXT
        );",
        table
    )
}

fn write_records(conn: &Connection, table: &str, records: &[DependencyRecord]) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO {} (name, version, rdep, bdep, redep, cdep)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        table
    ))?;
    for record in records {
        stmt.execute(params![
            record.name,
            record.version,
            record.rdep.join(" "),
            record.bdep.join(" "),
            record.redep.join(" "),
            record.cdep.join(" "),
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;

    fn record(name: &str, version: &str, rdep: &str, bdep: &str) -> DependencyRecord {
        DependencyRecord {
            name: name.into(),
            version: version.into(),
            rdep: rdep.split_whitespace().map(String::from).collect(),
            bdep: bdep.split_whitespace().map(String::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_constraint() {
        assert_eq!(strip_constraint("libarchive(>=3.0.4)"), "libarchive");
        assert_eq!(strip_constraint("curl"), "curl");
        assert_eq!(strip_constraint("(>=1)"), "");
    }

    #[test]
    fn test_record_from_fields() {
        let fields = Fields::parse(
            "RDEPEND=gtk2(>=2.24) menu-cache\nBDEPEND=pkg-config\nCONFLICT=lxpanel-old\n",
        );
        let record = DependencyRecord::from_fields("lxpanel", "0.5.12", &fields);
        assert_eq!(record.rdep, vec!["gtk2(>=2.24)", "menu-cache"]);
        assert_eq!(record.bdep, vec!["pkg-config"]);
        assert!(record.redep.is_empty());
        assert_eq!(record.cdep, vec!["lxpanel-old"]);
        assert_eq!(record.edges(EdgeType::Runtime), vec!["gtk2", "menu-cache"]);
        assert!(record.requires(EdgeType::Runtime, "gtk2"));
        assert!(!record.requires(EdgeType::Build, "gtk2"));
    }

    #[test]
    fn test_edges_deduplicates() {
        let record = record("a", "1", "b(>=1) c b(<2)", "");
        assert_eq!(record.edges(EdgeType::Runtime), vec!["b", "c"]);
    }

    #[test]
    fn test_validate_table() {
        assert!(validate_table("universe").is_ok());
        assert!(validate_table("_world2").is_ok());
        assert!(matches!(validate_table(""), Err(Error::InvalidTable(_))));
        assert!(matches!(
            validate_table("world; DROP TABLE x"),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(validate_table("2x"), Err(Error::InvalidTable(_))));
    }

    #[test]
    fn test_in_memory_insert_and_query() {
        let mut store = DependencyStore::in_memory("universe").unwrap();
        store
            .insert_all(&[
                record("curl", "7.29.0", "openssl zlib(>=1.2)", "perl"),
                record("zlib", "1.2.7", "", ""),
            ])
            .unwrap();

        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(
            store.edges("curl", EdgeType::Runtime).unwrap(),
            vec!["openssl", "zlib"]
        );
        assert!(store.edges("zlib", EdgeType::Build).unwrap().is_empty());
        assert!(store.record("wget").unwrap().is_none());
        assert!(matches!(
            store.edges("wget", EdgeType::Runtime),
            Err(Error::UnknownPackage { .. })
        ));
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut store = DependencyStore::in_memory("universe").unwrap();
        store.insert_all(&[record("zlib", "1.2.6", "", "")]).unwrap();
        store.insert_all(&[record("zlib", "1.2.7", "glibc", "")]).unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "1.2.7");
        assert_eq!(records[0].rdep, vec!["glibc"]);
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let mut store = DependencyStore::in_memory("universe").unwrap();
        store
            .insert_all(&[record("b", "1", "", ""), record("a", "1", "", "")])
            .unwrap();
        let names: Vec<_> = store.records().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_copy_into_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depend.db");

        let mut staging = DependencyStore::in_memory("universe").unwrap();
        staging
            .insert_all(&[record("curl", "7.29.0", "openssl", "perl")])
            .unwrap();
        staging.copy_into(&path).unwrap();

        let store = DependencyStore::open(&RealRuntime, &path, "universe").unwrap();
        assert_eq!(store.records().unwrap(), staging.records().unwrap());
        assert_eq!(store.location(), path.as_path());
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depend.db");
        let result = DependencyStore::open(&RealRuntime, &path, "universe");
        assert!(matches!(result, Err(Error::StoreUnavailable(p)) if p == path));
    }

    #[test]
    fn test_open_checks_through_runtime() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_file()
            .with(eq(PathBuf::from("/var/ybs/db/depend.db")))
            .times(1)
            .returning(|_| false);

        let result = DependencyStore::open(&runtime, Path::new("/var/ybs/db/depend.db"), "universe");
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_open_rejects_table_before_touching_disk() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_file().never();

        let result = DependencyStore::open(&runtime, Path::new("depend.db"), "universe;");
        assert!(matches!(result, Err(Error::InvalidTable(_))));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/var/ybs/db/depend.db")),
            PathBuf::from("/var/ybs/db/depend.db.partial")
        );
    }

    #[test]
    fn test_edge_type_tags() {
        let flags: String = EdgeType::ALL.iter().map(EdgeType::flag).collect();
        assert_eq!(flags, "RBAC");
        assert_eq!(EdgeType::Recommended.column(), "redep");
        assert_eq!(EdgeType::Conflict.field(), "CONFLICT");
    }
}
