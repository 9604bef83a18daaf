use anyhow::{Context as _, Result};
use chrono::Local;
use log::debug;

use crate::{
    evaluator::Fields,
    package::Catalog,
    query::{Diff, InstalledDiff},
    runtime::Runtime,
};

use super::config::InstallFilter;
use super::list::format_time;
use super::{Context, for_each_name};

/// Search the library by name
///
/// `^gtk` matches names starting with `gtk`, `gtk$` names ending with it and
/// plain `gtk` any name containing it. Matching ignores case.
#[tracing::instrument(skip(ctx))]
pub fn search<R: Runtime>(ctx: &Context<R>, patterns: &[String], filter: InstallFilter) -> Result<()> {
    let catalog = ctx.catalog()?;
    let installed = ctx.installed()?;
    let diff = InstalledDiff::new(&installed);

    for_each_name(patterns, |pattern| {
        let matches = catalog.search(pattern);
        debug!("'{}' matched {} package(s)", pattern, matches.len());

        for name in matches {
            let Some(latest) = catalog.latest(name) else {
                continue;
            };
            let entry = diff.classify(name, &latest)?;
            if !filter.admits(entry.installed.is_some()) {
                continue;
            }
            let Some(descriptor) = catalog.highest(name) else {
                continue;
            };
            let fields = descriptor
                .fields(ctx.evaluator.as_ref())
                .with_context(|| format!("Failed to read {:?}", descriptor.path()))?;
            let category = descriptor.category(catalog.root());
            println!(
                "{}",
                search_block(&catalog, &entry, category.as_deref(), &fields)
            );
        }
        Ok(())
    })
}

/// Human-readable description of one search hit.
pub(crate) fn search_block(
    catalog: &Catalog,
    entry: &Diff,
    category: Option<&str>,
    fields: &Fields,
) -> String {
    let title = match category {
        Some(category) => format!("{}/{}", category, entry.name),
        None => entry.name.clone(),
    };
    let installed = match &entry.installed {
        Some(record) => format!(
            "{} {}",
            record.version,
            format_time(record.install_time, &Local)
        ),
        None => "None".to_string(),
    };
    format!(
        "{} {}\n      Installed: {}\n      Available: {}\n      Homepage: {}\n      Description: {}\n",
        entry.flag(false),
        title,
        installed,
        catalog.versions(&entry.name).join(", "),
        fields.get("HOMEPAGE").join(" "),
        fields.get("DESCRIPTION").join(" "),
    )
}

/// Show the path of the newest descriptor of each package
#[tracing::instrument(skip(ctx))]
pub fn which<R: Runtime>(ctx: &Context<R>, names: &[String]) -> Result<()> {
    let catalog = ctx.catalog()?;
    for_each_name(names, |name| match catalog.path_of(name) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => anyhow::bail!("'{}' not found in {}.", name, catalog.root().display()),
    })
}
