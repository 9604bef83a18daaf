use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::runtime::Runtime;

use super::{Catalog, Descriptor};

/// Suffix of the descriptors that make up the package library.
pub const DEFAULT_SUFFIX: &str = ".pbs";

/// Find all files under `root` whose name ends with `suffix`.
///
/// Directories are walked depth-first in sorted order, so the result is
/// stable for a given tree. A missing root yields an empty list.
#[tracing::instrument(skip(runtime))]
pub fn find_descriptors<R: Runtime>(runtime: &R, root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    if !runtime.exists(root) {
        return Ok(found);
    }

    walk(runtime, root, suffix, &mut found)?;
    Ok(found)
}

fn walk<R: Runtime>(runtime: &R, dir: &Path, suffix: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in runtime.read_dir(dir)? {
        if runtime.is_dir(&entry) {
            walk(runtime, &entry, suffix, found)?;
        } else if entry
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
        {
            found.push(entry);
        }
    }
    Ok(())
}

/// Builds a [`Catalog`] from the package library on disk.
pub struct CatalogScanner<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> CatalogScanner<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Scan `root` for descriptors ending in `suffix` and group them by name.
    ///
    /// Files whose names do not follow the descriptor convention are skipped
    /// with a warning.
    #[tracing::instrument(skip(self))]
    pub fn scan(&self, root: &Path, suffix: &str) -> Result<Catalog> {
        let files = find_descriptors(self.runtime, root, suffix)?;
        debug!("Found {} descriptor file(s) under {:?}", files.len(), root);

        let descriptors = files.into_iter().filter_map(|path| match Descriptor::open(&path) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                None
            }
        });

        Ok(Catalog::from_descriptors(root, descriptors))
    }
}
