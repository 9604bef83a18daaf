use anyhow::Result;
use log::{debug, info};

use crate::{
    query::{ClosureResolver, ReverseLookup},
    runtime::Runtime,
    store::{EdgeType, InstalledStore},
};

use super::config::InstallFilter;
use super::{Context, for_each_name};

/// Show the dependencies of each package
///
/// Direct edges by default; with `deep` the whole closure in build order.
#[tracing::instrument(skip(ctx))]
pub async fn deps<R: Runtime>(ctx: &Context<R>, names: &[String], build: bool, deep: bool) -> Result<()> {
    let edge = if build { EdgeType::Build } else { EdgeType::Runtime };
    let store = ctx.dependency_store().await?;
    let resolver = ClosureResolver::new(&store);

    for_each_name(names, |name| {
        let deps = if deep {
            resolver.closure(name, edge)?
        } else {
            store.edges(name, edge)?
        };
        println!("{}", deps.join(" "));
        Ok(())
    })
}

/// Show which packages refer to each package
#[tracing::instrument(skip(ctx))]
pub async fn what_requires<R: Runtime>(
    ctx: &Context<R>,
    names: &[String],
    filter: InstallFilter,
) -> Result<()> {
    let store = ctx.dependency_store().await?;
    let installed = ctx.installed()?;
    let lookup = ReverseLookup::new(&store);

    for_each_name(names, |name| {
        println!("{} is related with:\n", name);
        for dependent in lookup.what_requires(name)? {
            if filter == InstallFilter::All
                || filter.admits(installed.find(&dependent.name)?.is_some())
            {
                println!("{} {} {}", dependent.flag(), dependent.name, dependent.version);
            }
        }
        Ok(())
    })
}

/// Delete and rebuild the dependency store
#[tracing::instrument(skip(ctx))]
pub async fn update_db<R: Runtime>(ctx: &Context<R>) -> Result<()> {
    let builder = ctx.builder()?;
    builder.rebuild().await?;
    info!("Dependency store {:?} rebuilt", builder.store_path());
    Ok(())
}

/// Report dependency cycles reachable from each package
#[tracing::instrument(skip(ctx))]
pub async fn cycles<R: Runtime>(ctx: &Context<R>, names: &[String], build: bool) -> Result<()> {
    let edge = if build { EdgeType::Build } else { EdgeType::Runtime };
    let store = ctx.dependency_store().await?;
    let resolver = ClosureResolver::new(&store);

    for_each_name(names, |name| {
        let cycles = resolver.cycles(name, edge)?;
        debug!("{} cycle(s) reachable from {}", cycles.len(), name);
        for line in cycle_lines(&cycles) {
            println!("{}", line);
        }
        Ok(())
    })
}

/// `a -> b -> a` per cycle, or `no cycles`.
pub(crate) fn cycle_lines(cycles: &[Vec<String>]) -> Vec<String> {
    if cycles.is_empty() {
        return vec!["no cycles".to_string()];
    }
    cycles
        .iter()
        .map(|cycle| {
            let mut members: Vec<&str> = cycle.iter().map(String::as_str).collect();
            if let Some(first) = cycle.first() {
                members.push(first);
            }
            members.join(" -> ")
        })
        .collect()
}
