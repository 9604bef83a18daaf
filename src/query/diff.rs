use std::cmp::Ordering;

use crate::error::Result;
use crate::package::VersionOrder;
use crate::store::{InstalledRecord, InstalledStore};

/// How an available version relates to the installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    New,
    Upgrade,
    Downgrade,
    Equal,
}

impl Status {
    /// Compare an available version against an installed one, if any.
    pub fn of(installed: Option<&str>, available: &str) -> Self {
        match installed {
            None => Status::New,
            Some(installed) => match VersionOrder::compare(available, installed) {
                Ordering::Greater => Status::Upgrade,
                Ordering::Less => Status::Downgrade,
                Ordering::Equal => Status::Equal,
            },
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Status::New => 'N',
            Status::Upgrade => 'U',
            Status::Downgrade => 'D',
            Status::Equal => 'E',
        }
    }
}

/// Classification of one package.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub name: String,
    pub available: String,
    pub installed: Option<InstalledRecord>,
    pub status: Status,
}

impl Diff {
    pub fn installed_version(&self) -> Option<&str> {
        self.installed.as_ref().map(|r| r.version.as_str())
    }

    /// `[U]`, or `[UF]` when forced.
    pub fn flag(&self, force: bool) -> String {
        if force {
            format!("[{}F]", self.status.letter())
        } else {
            format!("[{}]", self.status.letter())
        }
    }

    /// Report line: `[U] name 1.0 -> 1.1` for version changes,
    /// `[N] name 1.1` otherwise.
    pub fn line(&self, force: bool) -> String {
        match (self.status, self.installed_version()) {
            (Status::Upgrade | Status::Downgrade, Some(installed)) => format!(
                "{} {} {} -> {}",
                self.flag(force),
                self.name,
                installed,
                self.available
            ),
            _ => format!("{} {} {}", self.flag(force), self.name, self.available),
        }
    }
}

/// Classifies available packages against the installed-package store.
pub struct InstalledDiff<'a, S: InstalledStore + ?Sized> {
    installed: &'a S,
}

impl<'a, S: InstalledStore + ?Sized> InstalledDiff<'a, S> {
    pub fn new(installed: &'a S) -> Self {
        Self { installed }
    }

    pub fn classify(&self, name: &str, available: &str) -> Result<Diff> {
        let installed = self.installed.find(name)?;
        let status = Status::of(installed.as_ref().map(|r| r.version.as_str()), available);
        Ok(Diff {
            name: name.to_string(),
            available: available.to_string(),
            installed,
            status,
        })
    }
}
