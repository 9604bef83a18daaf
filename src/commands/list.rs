use anyhow::Result;
use chrono::{Local, TimeZone};
use log::debug;
use std::fmt::Display;

use crate::{
    package::Catalog,
    query::InstalledDiff,
    runtime::Runtime,
    store::{InstalledRecord, InstalledStore},
};

use super::config::InstallFilter;
use super::{Context, for_each_name};

/// List every package in the library with its newest version
#[tracing::instrument(skip(ctx))]
pub fn list<R: Runtime>(ctx: &Context<R>, filter: InstallFilter) -> Result<()> {
    let catalog = ctx.catalog()?;
    let installed = ctx.installed()?;
    debug!("Listing {} package(s)", catalog.len());

    for line in available_lines(&catalog, &installed, filter)? {
        println!("{}", line);
    }
    Ok(())
}

/// `[N]`, `[U]`, `[D]` or `[E]` line per catalog name, ascending.
pub(crate) fn available_lines<S: InstalledStore + ?Sized>(
    catalog: &Catalog,
    installed: &S,
    filter: InstallFilter,
) -> Result<Vec<String>> {
    let diff = InstalledDiff::new(installed);
    let mut lines = Vec::new();
    for name in catalog.names() {
        let Some(latest) = catalog.latest(name) else {
            continue;
        };
        let entry = diff.classify(name, &latest)?;
        if filter.admits(entry.installed.is_some()) {
            lines.push(entry.line(false));
        }
    }
    Ok(lines)
}

/// List installed packages
#[tracing::instrument(skip(ctx))]
pub fn installed<R: Runtime>(ctx: &Context<R>) -> Result<()> {
    let db = ctx.installed()?;
    for record in db.all()? {
        println!("{} {}", record.name, record.version);
    }
    Ok(())
}

/// Show the installed record of each package
#[tracing::instrument(skip(ctx))]
pub fn status<R: Runtime>(ctx: &Context<R>, names: &[String]) -> Result<()> {
    let db = ctx.installed()?;
    for_each_name(names, |name| match db.find(name)? {
        Some(record) => {
            println!("{}", status_line(&record, &Local));
            Ok(())
        }
        None => anyhow::bail!("'{}' not found. Be sure it is installed.", name),
    })
}

/// `name version repo YYYY-MM-DD,HH:MM:SS`
pub(crate) fn status_line<Tz: TimeZone>(record: &InstalledRecord, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{} {} {} {}",
        record.name,
        record.version,
        record.repo,
        format_time(record.install_time, tz)
    )
}

/// Format seconds since the epoch as `YYYY-MM-DD,HH:MM:SS` in `tz`.
pub(crate) fn format_time<Tz: TimeZone>(seconds: i64, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    match tz.timestamp_opt(seconds, 0).single() {
        Some(time) => time.format("%Y-%m-%d,%H:%M:%S").to_string(),
        None => seconds.to_string(),
    }
}
