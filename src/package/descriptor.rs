//! Package descriptor identification.
//!
//! Descriptor files are named `name_version[-rel...][-arch].ext`, e.g.
//! `mysql_5.5.29-1-rc1-x86_64.ypk`. The name may itself contain `_`; the
//! version is everything after the last `_`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, Fields};

use super::version::split_version;

/// File extensions recognized as package descriptors or their artifacts.
pub const DESCRIPTOR_SUFFIXES: [&str; 4] = [".pbs", ".ypk", ".xml", ".filelist"];

/// Target architecture encoded in a descriptor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    I686,
    X86_64,
    Any,
    #[default]
    Unspecified,
}

impl Arch {
    /// Parse an arch name segment; `None` if it is not an arch.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "i686" => Some(Arch::I686),
            "x86_64" => Some(Arch::X86_64),
            "any" => Some(Arch::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::I686 => "i686",
            Arch::X86_64 => "x86_64",
            Arch::Any => "any",
            Arch::Unspecified => "",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, version and arch of a package, derived from a descriptor file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub arch: Arch,
}

impl PackageRef {
    /// Identify a package from the basename of `path`.
    pub fn parse(path: &Path) -> Result<Self> {
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::MalformedName(path.display().to_string()))?;
        basename.parse()
    }

    /// Version without release qualifiers (`5.5.29` for `5.5.29-1-rc1`).
    pub fn major(&self) -> &str {
        split_version(&self.version).0
    }

    /// Release qualifiers joined with `-` (`1-rc1` for `5.5.29-1-rc1`).
    pub fn release(&self) -> String {
        split_version(&self.version).1.join("-")
    }

    /// Reassemble the descriptor file name with the given suffix.
    pub fn file_name(&self, suffix: &str) -> String {
        match self.arch {
            Arch::Unspecified => format!("{}_{}{}", self.name, self.version, suffix),
            arch => format!("{}_{}-{}{}", self.name, self.version, arch, suffix),
        }
    }
}

impl FromStr for PackageRef {
    type Err = Error;

    fn from_str(basename: &str) -> Result<Self> {
        let malformed = || Error::MalformedName(basename.to_string());

        let (stem, arch) = split_arch(strip_suffix(basename));
        let (name, version) = stem.rsplit_once('_').ok_or_else(malformed)?;
        if name.is_empty() || split_version(version).0.is_empty() {
            return Err(malformed());
        }

        Ok(PackageRef {
            name: name.to_string(),
            version: version.to_string(),
            arch,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

fn strip_suffix(basename: &str) -> &str {
    DESCRIPTOR_SUFFIXES
        .iter()
        .find_map(|suffix| basename.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(basename)
}

fn split_arch(stem: &str) -> (&str, Arch) {
    match stem.rsplit_once('-') {
        Some((rest, segment)) => match Arch::from_segment(segment) {
            Some(arch) => (rest, arch),
            None => (stem, Arch::Unspecified),
        },
        None => (stem, Arch::Unspecified),
    }
}

/// Whether `path` looks like a descriptor: a recognized suffix and a `_`.
pub fn is_descriptor_like(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            DESCRIPTOR_SUFFIXES.iter().any(|s| name.ends_with(s)) && name.contains('_')
        })
}

/// Extract a version from either a bare version string or a descriptor name.
///
/// `"2.0"` stays `"2.0"`, `"mysql_5.5.29-x86_64.ypk"` becomes `"5.5.29"`.
pub fn loose_version(text: &str) -> String {
    let (stem, _) = split_arch(strip_suffix(text));
    match stem.rsplit_once('_') {
        Some((_, version)) => version.to_string(),
        None => stem.to_string(),
    }
}

/// A descriptor file in the package library.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    path: PathBuf,
    package: PackageRef,
}

impl Descriptor {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let package = PackageRef::parse(&path)?;
        Ok(Self { path, package })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn package(&self) -> &PackageRef {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn version(&self) -> &str {
        &self.package.version
    }

    /// First directory below `library` that contains this descriptor.
    ///
    /// `<library>/app-editors/leafpad/leafpad_0.8.18.1.pbs` is in
    /// `app-editors`.
    pub fn category(&self, library: &Path) -> Option<String> {
        let relative = self.path.strip_prefix(library).ok()?;
        let mut components = relative.components();
        let first = components.next()?;
        // A descriptor directly under the library root has no category.
        components.next()?;
        first.as_os_str().to_str().map(String::from)
    }

    /// Run the evaluator once and return every field it printed.
    pub fn fields<E: Evaluator + ?Sized>(&self, evaluator: &E) -> Result<Fields> {
        evaluator.evaluate(
            &self.path,
            &self.package.name,
            self.package.major(),
            &self.package.release(),
        )
    }

    /// Tokens of a single field, or an empty list when it is absent.
    pub fn get<E: Evaluator + ?Sized>(&self, evaluator: &E, field: &str) -> Result<Vec<String>> {
        Ok(self.fields(evaluator)?.get(field).to_vec())
    }
}
