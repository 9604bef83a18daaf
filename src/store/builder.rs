use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::package::{CatalogScanner, DEFAULT_SUFFIX, Descriptor};
use crate::runtime::Runtime;

use super::{DEFAULT_DEPEND_TABLE, DependencyRecord, DependencyStore, partial_path};

/// Default width of the extraction pool.
pub const DEFAULT_JOBS: usize = 4;

/// Builds the dependency store from the package library.
///
/// The store goes from absent to fully populated in one step: records are
/// collected in memory, replayed into `<store>.partial` in one transaction
/// and the file is then renamed onto `<store>`.
pub struct DependencyDatabaseBuilder<'a, R: Runtime> {
    runtime: &'a R,
    evaluator: Arc<dyn Evaluator>,
    library: PathBuf,
    suffix: String,
    store: PathBuf,
    table: String,
    jobs: usize,
}

impl<'a, R: Runtime> DependencyDatabaseBuilder<'a, R> {
    pub fn new(
        runtime: &'a R,
        evaluator: Arc<dyn Evaluator>,
        library: impl Into<PathBuf>,
        store: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            evaluator,
            library: library.into(),
            suffix: DEFAULT_SUFFIX.to_string(),
            store: store.into(),
            table: DEFAULT_DEPEND_TABLE.to_string(),
            jobs: DEFAULT_JOBS,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Width of the extraction pool; at least one worker always runs.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn store_path(&self) -> &Path {
        &self.store
    }

    /// Build the store unless it already exists.
    ///
    /// Returns `true` when a new store was written.
    #[tracing::instrument(skip(self))]
    pub async fn build(&self) -> Result<bool> {
        if self.runtime.exists(&self.store) {
            debug!("Dependency store {:?} already exists", self.store);
            return Ok(false);
        }

        if let Some(dir) = self.store.parent()
            && !dir.as_os_str().is_empty()
            && !self.runtime.is_dir(dir)
        {
            self.runtime.create_dir_all(dir)?;
        }

        eprintln!(
            "Parsing dependency tree of '{}' to '{}'...",
            self.library.display(),
            self.store.display()
        );

        let catalog = CatalogScanner::new(self.runtime).scan(&self.library, &self.suffix)?;
        let files = catalog.highest_only();
        let records = self.extract(files).await?;

        let mut staging = DependencyStore::in_memory(&self.table)?;
        staging.insert_all(&records)?;
        self.commit(&staging)?;

        info!(
            "Wrote {} dependency record(s) to {:?}",
            records.len(),
            self.store
        );
        Ok(true)
    }

    /// Delete the store and build it again.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<bool> {
        if self.runtime.exists(&self.store) {
            info!("Removing dependency store {:?}", self.store);
            self.runtime.remove_file(&self.store)?;
        }
        self.build().await
    }

    /// Run the evaluator over every file on a bounded pool of blocking
    /// workers. Records come back in the order of `files`.
    async fn extract(&self, files: BTreeMap<String, PathBuf>) -> Result<Vec<DependencyRecord>> {
        let found = files.len();
        let semaphore = Arc::new(Semaphore::new(self.jobs.max(1)));
        let mut workers = JoinSet::new();

        debug!("Extracting {} descriptor(s) with {} job(s)", found, self.jobs);

        for (index, path) in files.into_values().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(anyhow::Error::from)?;
            let evaluator = Arc::clone(&self.evaluator);
            workers.spawn_blocking(move || {
                let _permit = permit;
                let result = extract_record(evaluator.as_ref(), &path);
                (index, path, result)
            });
        }

        let mut extracted = Vec::with_capacity(found);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, _, Ok(record))) => extracted.push((index, record)),
                Ok((_, path, Err(e))) => warn!("Failed to extract {:?}: {}", path, e),
                Err(e) => warn!("Extraction worker failed: {}", e),
            }
        }

        if extracted.len() != found {
            return Err(Error::IncompleteExtraction {
                found,
                handled: extracted.len(),
            });
        }

        extracted.sort_by_key(|(index, _)| *index);
        Ok(extracted.into_iter().map(|(_, record)| record).collect())
    }

    fn commit(&self, staging: &DependencyStore) -> Result<()> {
        let partial = partial_path(&self.store);
        if self.runtime.exists(&partial) {
            warn!("Removing stale {:?}", partial);
            self.runtime.remove_file(&partial)?;
        }

        if let Err(e) = staging.copy_into(&partial) {
            if self.runtime.exists(&partial)
                && let Err(cleanup) = self.runtime.remove_file(&partial)
            {
                warn!("Failed to remove {:?}: {}", partial, cleanup);
            }
            return Err(e);
        }

        self.runtime.rename(&partial, &self.store)?;
        Ok(())
    }
}

fn extract_record(evaluator: &dyn Evaluator, path: &Path) -> Result<DependencyRecord> {
    let descriptor = Descriptor::open(path)?;
    let fields = descriptor.fields(evaluator)?;
    Ok(DependencyRecord::from_fields(
        descriptor.name(),
        descriptor.version(),
        &fields,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Fields, MockEvaluator};
    use crate::runtime::RealRuntime;
    use crate::store::EdgeType;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn library(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
    }

    fn evaluator_from(deps: &'static [(&'static str, &'static str)]) -> MockEvaluator {
        let mut evaluator = MockEvaluator::new();
        evaluator.expect_evaluate().returning(move |_, name, _, _| {
            let output = deps
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, output)| *output)
                .unwrap_or("");
            Ok(Fields::parse(output))
        });
        evaluator
    }

    #[tokio::test]
    async fn test_build_writes_highest_versions() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("db").join("depend.db");
        library(
            &lib,
            &[
                "app-editors/leafpad/leafpad_0.8.18.1.pbs",
                "app-editors/leafpad/leafpad_0.8.19.pbs",
                "x11-libs/gtk2/gtk2_2.24.10.pbs",
                "sys-libs/zlib/zlib_1.2.7.pbs",
            ],
        );
        let evaluator = evaluator_from(&[
            ("leafpad", "RDEPEND=gtk2(>=2.20)\nBDEPEND=gtk2 intltool\n"),
            ("gtk2", "RDEPEND=zlib\n"),
        ]);

        let runtime = RealRuntime;
        let builder =
            DependencyDatabaseBuilder::new(&runtime, Arc::new(evaluator), &lib, &store_path).jobs(2);
        assert!(builder.build().await.unwrap());

        assert!(!partial_path(&store_path).exists());
        let store = DependencyStore::open(&runtime, &store_path, "universe").unwrap();
        let records = store.records().unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["gtk2", "leafpad", "zlib"]);
        assert_eq!(records[1].version, "0.8.19");
        assert_eq!(records[1].rdep, vec!["gtk2(>=2.20)"]);
        assert_eq!(
            store.edges("leafpad", EdgeType::Build).unwrap(),
            vec!["gtk2", "intltool"]
        );
    }

    #[tokio::test]
    async fn test_build_is_noop_when_store_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("depend.db");
        fs::write(&store_path, "").unwrap();

        let mut evaluator = MockEvaluator::new();
        evaluator.expect_evaluate().never();

        let runtime = RealRuntime;
        let builder = DependencyDatabaseBuilder::new(
            &runtime,
            Arc::new(evaluator),
            dir.path().join("pbslib"),
            &store_path,
        );
        assert!(!builder.build().await.unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_extraction_leaves_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("depend.db");
        library(&lib, &["a/curl_7.29.0.pbs", "a/zlib_1.2.7.pbs", "a/bash_4.2.pbs"]);

        let mut failing = MockEvaluator::new();
        failing.expect_evaluate().returning(|path, name, _, _| {
            if name == "zlib" {
                Err(Error::Evaluator {
                    path: path.to_path_buf(),
                    reason: "interrupted".into(),
                })
            } else {
                Ok(Fields::default())
            }
        });

        let runtime = RealRuntime;
        let builder = DependencyDatabaseBuilder::new(&runtime, Arc::new(failing), &lib, &store_path);
        let err = builder.build().await.unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteExtraction {
                found: 3,
                handled: 2
            }
        ));
        assert!(!store_path.exists());
        assert!(!partial_path(&store_path).exists());

        // A later attempt starts from scratch.
        let builder = DependencyDatabaseBuilder::new(
            &runtime,
            Arc::new(evaluator_from(&[("curl", "RDEPEND=zlib\n")])),
            &lib,
            &store_path,
        );
        assert!(builder.build().await.unwrap());
        let store = DependencyStore::open(&runtime, &store_path, "universe").unwrap();
        assert_eq!(store.len().unwrap(), 3);
    }

    /// Records how many evaluations run at once.
    #[derive(Default)]
    struct CountingEvaluator {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Evaluator for CountingEvaluator {
        fn evaluate(&self, _: &Path, _: &str, _: &str, _: &str) -> Result<Fields> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Fields::default())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_extraction_respects_job_limit() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("depend.db");
        let files: Vec<String> = (0..8).map(|i| format!("a/pkg{i}_1.0.pbs")).collect();
        library(&lib, &files.iter().map(String::as_str).collect::<Vec<_>>());

        let counting = Arc::new(CountingEvaluator::default());
        let runtime = RealRuntime;
        let builder = DependencyDatabaseBuilder::new(
            &runtime,
            Arc::clone(&counting) as Arc<dyn Evaluator>,
            &lib,
            &store_path,
        )
        .jobs(2);
        assert!(builder.build().await.unwrap());

        let peak = counting.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
        let store = DependencyStore::open(&runtime, &store_path, "universe").unwrap();
        assert_eq!(store.len().unwrap(), 8);
    }

    /// Panics while evaluating `zlib`.
    struct PanickingEvaluator;

    impl Evaluator for PanickingEvaluator {
        fn evaluate(&self, _: &Path, name: &str, _: &str, _: &str) -> Result<Fields> {
            if name == "zlib" {
                panic!("evaluator crashed on {name}");
            }
            Ok(Fields::default())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_worker_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("depend.db");
        library(&lib, &["a/curl_7.29.0.pbs", "a/zlib_1.2.7.pbs", "a/bash_4.2.pbs"]);

        let runtime = RealRuntime;
        let builder =
            DependencyDatabaseBuilder::new(&runtime, Arc::new(PanickingEvaluator), &lib, &store_path)
                .jobs(1);
        let err = builder.build().await.unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteExtraction {
                found: 3,
                handled: 2
            }
        ));
        assert!(!store_path.exists());
        assert!(!partial_path(&store_path).exists());
    }

    #[tokio::test]
    async fn test_stale_partial_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("depend.db");
        library(&lib, &["zlib_1.2.7.pbs"]);
        fs::write(partial_path(&store_path), "garbage").unwrap();

        let runtime = RealRuntime;
        let builder =
            DependencyDatabaseBuilder::new(&runtime, Arc::new(evaluator_from(&[])), &lib, &store_path);
        assert!(builder.build().await.unwrap());

        let store = DependencyStore::open(&runtime, &store_path, "universe").unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_refreshes_store() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("pbslib");
        let store_path = dir.path().join("depend.db");
        library(&lib, &["zlib_1.2.7.pbs"]);

        let runtime = RealRuntime;
        let builder =
            DependencyDatabaseBuilder::new(&runtime, Arc::new(evaluator_from(&[])), &lib, &store_path)
                .table("testing");
        assert!(builder.build().await.unwrap());

        library(&lib, &["curl_7.29.0.pbs"]);
        assert!(!builder.build().await.unwrap());
        assert!(builder.rebuild().await.unwrap());

        let store = DependencyStore::open(&runtime, &store_path, "testing").unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }
}
