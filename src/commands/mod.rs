use anyhow::{Context as _, Result};
use log::debug;
use std::sync::Arc;

use crate::{
    error::Error,
    evaluator::{CommandEvaluator, Evaluator},
    package::{Catalog, CatalogScanner},
    runtime::Runtime,
    store::{DependencyDatabaseBuilder, DependencyStore, WorldDb},
};

pub mod config;
mod deps;
mod list;
mod pretend;
mod search;

pub use deps::{cycles, deps, update_db, what_requires};
pub use list::{installed, list, status};
pub use pretend::{compare, pretend};
pub use search::{search, which};

use config::Settings;

/// Everything a command needs: file-system access, resolved settings and
/// the descriptor evaluator.
pub struct Context<R: Runtime> {
    pub runtime: R,
    pub settings: Settings,
    pub evaluator: Arc<dyn Evaluator>,
}

impl<R: Runtime> Context<R> {
    /// Use the evaluator program named in `settings`.
    pub fn new(runtime: R, settings: Settings) -> Self {
        let evaluator = Arc::new(CommandEvaluator::new(&settings.evaluator));
        Self::with_evaluator(runtime, settings, evaluator)
    }

    pub fn with_evaluator(runtime: R, settings: Settings, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            runtime,
            settings,
            evaluator,
        }
    }

    /// Scan the package library.
    #[tracing::instrument(skip(self))]
    pub fn catalog(&self) -> Result<Catalog> {
        let library = self.settings.library()?;
        debug!("Scanning package library {:?}", library);
        let catalog = CatalogScanner::new(&self.runtime)
            .scan(library, &self.settings.suffix)
            .with_context(|| format!("Failed to scan package library {:?}", library))?;
        Ok(catalog)
    }

    pub fn builder(&self) -> Result<DependencyDatabaseBuilder<'_, R>> {
        let library = self.settings.library()?;
        Ok(DependencyDatabaseBuilder::new(
            &self.runtime,
            Arc::clone(&self.evaluator),
            library,
            &self.settings.depend_db,
        )
        .table(&self.settings.depend_table)
        .suffix(&self.settings.suffix)
        .jobs(self.settings.jobs))
    }

    /// Build the dependency store if needed and open it.
    #[tracing::instrument(skip(self))]
    pub async fn dependency_store(&self) -> Result<DependencyStore> {
        self.builder()?.build().await?;
        let store = DependencyStore::open(
            &self.runtime,
            &self.settings.depend_db,
            &self.settings.depend_table,
        )?;
        Ok(store)
    }

    pub fn installed(&self) -> Result<WorldDb> {
        let db = WorldDb::open(
            &self.runtime,
            &self.settings.package_db,
            &self.settings.package_table,
        )?;
        Ok(db)
    }
}

/// Run `f` for every name, reporting failures on stderr as they happen.
///
/// Fails after all names were processed if any of them failed.
pub(crate) fn for_each_name<F>(names: &[String], mut f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut failed = 0;
    for name in names {
        if let Err(e) = f(name) {
            report(&e);
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} package(s) failed", failed, names.len());
    }
    Ok(())
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<Error>() {
        Some(err) if err.suggests_rebuild() => {
            eprintln!("{}, run 'pybs update-db' and retry.", err)
        }
        _ => eprintln!("{}", e),
    }
}
