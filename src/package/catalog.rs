//! In-memory view of the package library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Descriptor, VersionOrder};

/// Every descriptor found in the library, grouped by package name.
///
/// All versions stay visible for listing and searching; only the highest
/// version of each name feeds the dependency store (see
/// [`Catalog::highest_only`]).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    root: PathBuf,
    // Descriptors per name, in discovery order.
    packages: BTreeMap<String, Vec<Descriptor>>,
}

impl Catalog {
    pub fn from_descriptors(
        root: impl Into<PathBuf>,
        descriptors: impl IntoIterator<Item = Descriptor>,
    ) -> Self {
        let mut packages: BTreeMap<String, Vec<Descriptor>> = BTreeMap::new();
        for descriptor in descriptors {
            packages
                .entry(descriptor.name().to_string())
                .or_default()
                .push(descriptor);
        }
        Self {
            root: root.into(),
            packages,
        }
    }

    /// Library root the catalog was scanned from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Package names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Known versions of `name`, ascending. Empty if the name is unknown.
    pub fn versions(&self, name: &str) -> Vec<String> {
        let versions: Vec<String> = self
            .packages
            .get(name)
            .map(|all| all.iter().map(|d| d.version().to_string()).collect())
            .unwrap_or_default();
        VersionOrder::sorted(&versions)
    }

    /// Version of the descriptor [`Catalog::highest`] selects for `name`.
    pub fn latest(&self, name: &str) -> Option<String> {
        self.highest(name).map(|d| d.version().to_string())
    }

    /// Descriptor holding the highest version of `name`; the first one
    /// discovered wins among equal versions.
    pub fn highest(&self, name: &str) -> Option<&Descriptor> {
        let all = self.packages.get(name)?;
        let versions: Vec<&str> = all.iter().map(|d| d.version()).collect();
        VersionOrder::maximum_index(&versions).map(|i| &all[i])
    }

    /// Path of the highest-version descriptor of `name`.
    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.highest(name).map(Descriptor::path)
    }

    /// One descriptor path per package name, the highest version of each.
    pub fn highest_only(&self) -> BTreeMap<String, PathBuf> {
        self.packages
            .keys()
            .filter_map(|name| {
                self.highest(name)
                    .map(|d| (name.clone(), d.path().to_path_buf()))
            })
            .collect()
    }

    /// Names matching a search pattern, ascending.
    ///
    /// Matching is a case-insensitive substring test; a leading `^` anchors
    /// the pattern to the start of the name and a trailing `$` to its end.
    pub fn search(&self, pattern: &str) -> Vec<&str> {
        let pattern = pattern.to_lowercase();
        let anchored_end = pattern.ends_with('$');
        let needle = pattern.trim_end_matches('$');
        let anchored_start = needle.starts_with('^');
        let needle = needle.trim_start_matches('^');

        self.names()
            .filter(|name| {
                let name = name.to_lowercase();
                name.contains(needle)
                    && (!anchored_start || name.starts_with(needle))
                    && (!anchored_end || name.ends_with(needle))
            })
            .collect()
    }
}
