use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{
    error::Error,
    evaluator::DEFAULT_EVALUATOR,
    package::DEFAULT_SUFFIX,
    runtime::Runtime,
    store::{
        DEFAULT_DEPEND_DB, DEFAULT_DEPEND_TABLE, DEFAULT_JOBS, DEFAULT_PACKAGE_DB,
        DEFAULT_PACKAGE_TABLE,
    },
};

/// System-wide configuration file.
pub const DEFAULT_CONFIG: &str = "/etc/ybs.conf";

/// `KEY=value` pairs read from the configuration file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile(HashMap<String, String>);

impl ConfigFile {
    /// Parse configuration text. Blank lines and `#` comments are skipped,
    /// values are trimmed and unquoted, and the first occurrence of a key
    /// wins.
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.split('#').next().unwrap_or_default();
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            values
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().trim_matches('"').to_string());
        }
        ConfigFile(values)
    }

    /// Read the file at `path`; a missing file is an empty configuration.
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Values given on the command line or through the environment. They take
/// precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub pbslib: Option<PathBuf>,
    pub depend_db: Option<PathBuf>,
    pub depend_table: Option<String>,
    pub package_db: Option<PathBuf>,
    pub package_table: Option<String>,
    pub evaluator: Option<PathBuf>,
    pub jobs: Option<usize>,
}

/// Fully resolved settings, threaded through every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub config: PathBuf,
    pub pbslib: Option<PathBuf>,
    pub arch: Option<String>,
    pub depend_db: PathBuf,
    pub depend_table: String,
    pub package_db: PathBuf,
    pub package_table: String,
    pub evaluator: PathBuf,
    pub jobs: usize,
    pub suffix: String,
}

impl Settings {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, overrides: Overrides) -> Result<Self> {
        let config = overrides
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        let file = ConfigFile::load(runtime, &config)?;

        let jobs = match (overrides.jobs, file.get("JOBS")) {
            (Some(jobs), _) => jobs,
            (None, Some(text)) => text.parse().map_err(|_| {
                Error::Config(format!("JOBS in {} is not a number: '{}'", config.display(), text))
            })?,
            (None, None) => DEFAULT_JOBS,
        };

        let settings = Settings {
            pbslib: overrides
                .pbslib
                .or_else(|| file.get("PBSLIB_PATH").map(PathBuf::from)),
            arch: file.get("ARCH").map(String::from),
            depend_db: overrides
                .depend_db
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPEND_DB)),
            depend_table: overrides
                .depend_table
                .unwrap_or_else(|| DEFAULT_DEPEND_TABLE.to_string()),
            package_db: overrides
                .package_db
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PACKAGE_DB)),
            package_table: overrides
                .package_table
                .unwrap_or_else(|| DEFAULT_PACKAGE_TABLE.to_string()),
            evaluator: overrides
                .evaluator
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVALUATOR)),
            jobs: jobs.max(1),
            suffix: DEFAULT_SUFFIX.to_string(),
            config,
        };
        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    /// Settings as `KEY`, value pairs, named like the configuration file keys.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let optional = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());
        vec![
            ("CONFIG", self.config.display().to_string()),
            (
                "PBSLIB_PATH",
                optional(self.pbslib.as_ref().map(|p| p.display().to_string())),
            ),
            ("ARCH", optional(self.arch.clone())),
            ("DEPEND_DB", self.depend_db.display().to_string()),
            ("DEPEND_DB_TABLE", self.depend_table.clone()),
            ("PACKAGE_DB", self.package_db.display().to_string()),
            ("PACKAGE_DB_TABLE", self.package_table.clone()),
            ("EVALUATOR", self.evaluator.display().to_string()),
            ("JOBS", self.jobs.to_string()),
        ]
    }

    /// Root of the package library.
    pub fn library(&self) -> Result<&Path> {
        self.pbslib.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "package library is not set; add PBSLIB_PATH to {} or pass --pbslib",
                self.config.display()
            ))
            .into()
        })
    }
}

/// Print the resolved settings
pub fn show(settings: &Settings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        for (key, value) in settings.entries() {
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

/// Report switches shared by listing, search and pretend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub force: bool,
    pub verbose: bool,
}

/// Which packages a listing shows, by install state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InstallFilter {
    #[default]
    All,
    InstalledOnly,
    UninstalledOnly,
}

impl InstallFilter {
    pub fn from_flags(installed_only: bool, uninstalled_only: bool) -> Self {
        match (installed_only, uninstalled_only) {
            (true, false) => InstallFilter::InstalledOnly,
            (false, true) => InstallFilter::UninstalledOnly,
            _ => InstallFilter::All,
        }
    }

    pub fn admits(&self, installed: bool) -> bool {
        match self {
            InstallFilter::All => true,
            InstallFilter::InstalledOnly => installed,
            InstallFilter::UninstalledOnly => !installed,
        }
    }
}
