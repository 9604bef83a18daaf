use anyhow::Result;

use crate::{
    error::Error,
    package::{Catalog, VersionOrder, loose_version},
    query::{ClosureResolver, InstalledDiff, Status},
    runtime::Runtime,
    store::{EdgeType, InstalledStore},
};

use super::config::ReportOptions;
use super::{Context, for_each_name};

/// Show what building each package would do, without building anything
///
/// Every package in the build-time closure is reported in build order as
/// new, upgraded, downgraded or (with verbose or force) reinstalled.
#[tracing::instrument(skip(ctx))]
pub async fn pretend<R: Runtime>(ctx: &Context<R>, names: &[String], options: ReportOptions) -> Result<()> {
    let catalog = ctx.catalog()?;
    let store = ctx.dependency_store().await?;
    let installed = ctx.installed()?;
    let resolver = ClosureResolver::new(&store);

    for_each_name(names, |name| {
        let order = resolver.closure(name, EdgeType::Build)?;
        for line in pretend_lines(&catalog, &installed, &order, options)? {
            println!("{}", line);
        }
        Ok(())
    })
}

/// Report lines for a build order.
pub(crate) fn pretend_lines<S: InstalledStore + ?Sized>(
    catalog: &Catalog,
    installed: &S,
    order: &[String],
    options: ReportOptions,
) -> Result<Vec<String>> {
    let diff = InstalledDiff::new(installed);
    let mut lines = Vec::with_capacity(order.len());
    for name in order {
        let available = catalog
            .latest(name)
            .ok_or_else(|| Error::unknown_in(name.as_str(), catalog.root()))?;
        let entry = diff.classify(name, &available)?;
        if entry.status == Status::Equal && !(options.verbose || options.force) {
            continue;
        }
        lines.push(entry.line(options.force));
    }
    Ok(lines)
}

/// Compare two versions, or the versions in two descriptor names
pub fn compare(v1: &str, v2: &str) -> Result<()> {
    println!("{}", compare_symbol(v1, v2));
    Ok(())
}

pub(crate) fn compare_symbol(v1: &str, v2: &str) -> &'static str {
    VersionOrder::symbol(VersionOrder::compare(&loose_version(v1), &loose_version(v2)))
}
