//! Descriptor evaluation.
//!
//! Package descriptors are shell fragments; the only way to learn their
//! fields is to source them with an external helper (`dosource`) that prints
//! `KEY=value` lines. [`Evaluator`] is the seam for that helper so the
//! engine can run against a fake in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// Default helper used to source a descriptor.
pub const DEFAULT_EVALUATOR: &str = "dosource";

/// Whitespace-tokenized fields printed by an evaluator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(HashMap<String, Vec<String>>);

impl Fields {
    /// Parse `KEY=value` lines. The first occurrence of a key wins; lines
    /// without `=` are ignored.
    pub fn parse(output: &str) -> Self {
        let mut fields = HashMap::new();
        for line in output.lines() {
            let line = line.trim();
            if let Some((key, value)) = line.split_once('=') {
                fields
                    .entry(key.to_string())
                    .or_insert_with(|| value.split_whitespace().map(String::from).collect());
            }
        }
        Fields(fields)
    }

    /// Tokens of `key`, or an empty slice when the field is absent.
    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = HashMap::new();
        for (key, value) in iter {
            let value: String = value.into();
            fields
                .entry(key.into())
                .or_insert_with(|| value.split_whitespace().map(String::from).collect());
        }
        Fields(fields)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Evaluator: Send + Sync {
    /// Evaluate the descriptor at `path` for package `name`, version
    /// `major[-release]`.
    fn evaluate(&self, path: &Path, name: &str, major: &str, release: &str) -> Result<Fields>;
}

/// Runs an external program as `<program> <path> <name> <major> <release>`
/// and parses its standard output.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: PathBuf,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for CommandEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_EVALUATOR)
    }
}

impl Evaluator for CommandEvaluator {
    #[tracing::instrument(skip(self))]
    fn evaluate(&self, path: &Path, name: &str, major: &str, release: &str) -> Result<Fields> {
        debug!("Evaluating {:?} with {:?}", path, self.program);
        let output = Command::new(&self.program)
            .arg(path)
            .arg(name)
            .arg(major)
            .arg(release)
            .output()
            .map_err(|e| Error::Evaluator {
                path: path.to_path_buf(),
                reason: format!("cannot run {:?}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(Error::Evaluator {
                path: path.to_path_buf(),
                reason: format!(
                    "{:?} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(Fields::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}
