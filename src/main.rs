use anyhow::Result;
use clap::Parser;
use pybs::commands::{
    self, Context,
    config::{InstallFilter, Overrides, ReportOptions, Settings},
};
use pybs::runtime::RealRuntime;
use std::path::PathBuf;

/// pybs - package query tool for a pbs package library
///
/// Lists, searches and compares the package descriptors of a library
/// against the installed packages, and answers dependency questions from a
/// dependency store that is built on first use.
///
/// Examples:
///   pybs deps --deep leafpad     # Everything leafpad needs at run time, in order
///   pybs pretend gtk2            # What building gtk2 would install or upgrade
#[derive(Parser, Debug)]
#[command(author, version = env!("PYBS_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show packages whose installed version equals the available one
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report every package as if it would be rebuilt
    #[arg(short = 'F', long, global = true)]
    pub force: bool,

    /// Only show installed packages
    #[arg(short = 'I', long, global = true, conflicts_with = "uninstalled")]
    pub installed: bool,

    /// Only show packages that are not installed
    #[arg(short = 'N', long, global = true)]
    pub uninstalled: bool,

    /// Configuration file (defaults to /etc/ybs.conf)
    #[arg(long, env = "PYBS_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Package library root (overrides PBSLIB_PATH from the config file)
    #[arg(long, env = "PBSLIB_PATH", value_name = "PATH", global = true)]
    pub pbslib: Option<PathBuf>,

    /// Dependency store (defaults to /var/ybs/db/depend.db)
    #[arg(long = "depend-db", env = "PYBS_DEPEND_DB", value_name = "PATH", global = true)]
    pub depend_db: Option<PathBuf>,

    /// Table inside the dependency store (defaults to universe)
    #[arg(long = "depend-table", value_name = "TABLE", global = true)]
    pub depend_table: Option<String>,

    /// Installed package store (defaults to /var/ypkg/db/package.db)
    #[arg(long = "package-db", env = "PYBS_PACKAGE_DB", value_name = "PATH", global = true)]
    pub package_db: Option<PathBuf>,

    /// Table inside the installed package store (defaults to world)
    #[arg(long = "package-table", value_name = "TABLE", global = true)]
    pub package_table: Option<String>,

    /// Program that prints the fields of a descriptor (defaults to dosource)
    #[arg(long, env = "PYBS_EVALUATOR", value_name = "PROGRAM", global = true)]
    pub evaluator: Option<PathBuf>,

    /// Descriptors evaluated in parallel while building the dependency store
    #[arg(long, short = 'j', value_name = "N", global = true)]
    pub jobs: Option<usize>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            pbslib: self.pbslib.clone(),
            depend_db: self.depend_db.clone(),
            depend_table: self.depend_table.clone(),
            package_db: self.package_db.clone(),
            package_table: self.package_table.clone(),
            evaluator: self.evaluator.clone(),
            jobs: self.jobs,
        }
    }

    fn filter(&self) -> InstallFilter {
        InstallFilter::from_flags(self.installed, self.uninstalled)
    }

    fn report_options(&self) -> ReportOptions {
        ReportOptions {
            force: self.force,
            verbose: self.verbose,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List every package in the library with its newest version
    List,

    /// List installed packages
    Installed,

    /// Show the installed record of packages
    Status(NamesArgs),

    /// Search the library by name (`^` anchors the start, `$` the end)
    Search(SearchArgs),

    /// Show the descriptor path of packages
    Which(NamesArgs),

    /// Show the dependencies of packages
    Deps(DepsArgs),

    /// Show which packages refer to packages
    WhatRequires(NamesArgs),

    /// Delete and rebuild the dependency store
    UpdateDb,

    /// Compare two versions
    Compare(CompareArgs),

    /// Show what building packages would do
    Pretend(NamesArgs),

    /// Report dependency cycles reachable from packages
    Cycles(CyclesArgs),

    /// Show the resolved settings
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct NamesArgs {
    /// Package names
    #[arg(value_name = "PACKAGE", required = true)]
    pub names: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Name patterns
    #[arg(value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct DepsArgs {
    /// Package names
    #[arg(value_name = "PACKAGE", required = true)]
    pub names: Vec<String>,

    /// Follow build-time instead of run-time dependencies
    #[arg(long, short)]
    pub build: bool,

    /// Show the whole closure in build order
    #[arg(long, short)]
    pub deep: bool,
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// A version or descriptor file name
    pub v1: String,

    /// A version or descriptor file name
    pub v2: String,
}

#[derive(clap::Args, Debug)]
pub struct CyclesArgs {
    /// Package names
    #[arg(value_name = "PACKAGE", required = true)]
    pub names: Vec<String>,

    /// Follow build-time instead of run-time dependencies
    #[arg(long, short)]
    pub build: bool,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Commands::Compare(args) = &cli.command {
        return commands::compare(&args.v1, &args.v2);
    }

    let settings = Settings::load(&RealRuntime, cli.overrides())?;
    let filter = cli.filter();
    let options = cli.report_options();
    let ctx = Context::new(RealRuntime, settings);

    match cli.command {
        Commands::List => commands::list(&ctx, filter)?,
        Commands::Installed => commands::installed(&ctx)?,
        Commands::Status(args) => commands::status(&ctx, &args.names)?,
        Commands::Search(args) => commands::search(&ctx, &args.patterns, filter)?,
        Commands::Which(args) => commands::which(&ctx, &args.names)?,
        Commands::Deps(args) => commands::deps(&ctx, &args.names, args.build, args.deep).await?,
        Commands::WhatRequires(args) => commands::what_requires(&ctx, &args.names, filter).await?,
        Commands::UpdateDb => commands::update_db(&ctx).await?,
        Commands::Compare(args) => commands::compare(&args.v1, &args.v2)?,
        Commands::Pretend(args) => commands::pretend(&ctx, &args.names, options).await?,
        Commands::Cycles(args) => commands::cycles(&ctx, &args.names, args.build).await?,
        Commands::Config(args) => commands::config::show(&ctx.settings, args.json)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_deps_parsing() {
        let cli = Cli::try_parse_from(["pybs", "deps", "--deep", "leafpad", "gtk2"]).unwrap();
        match cli.command {
            Commands::Deps(args) => {
                assert_eq!(args.names, vec!["leafpad", "gtk2"]);
                assert!(args.deep);
                assert!(!args.build);
            }
            _ => panic!("Expected Deps command"),
        }
    }

    #[test]
    fn test_cli_global_flags_parsing() {
        let cli = Cli::try_parse_from([
            "pybs",
            "pretend",
            "gtk2",
            "-F",
            "--pbslib",
            "/var/ybs/pbslib",
            "--jobs",
            "8",
        ])
        .unwrap();
        assert!(cli.force);
        assert!(!cli.verbose);
        let overrides = cli.overrides();
        assert_eq!(overrides.pbslib, Some(PathBuf::from("/var/ybs/pbslib")));
        assert_eq!(overrides.jobs, Some(8));
        assert_eq!(cli.report_options(), ReportOptions { force: true, verbose: false });
    }

    #[test]
    fn test_cli_install_filter_parsing() {
        let cli = Cli::try_parse_from(["pybs", "list", "-N"]).unwrap();
        assert_eq!(cli.filter(), InstallFilter::UninstalledOnly);

        let cli = Cli::try_parse_from(["pybs", "-I", "search", "gtk"]).unwrap();
        assert_eq!(cli.filter(), InstallFilter::InstalledOnly);
    }

    #[test]
    fn test_cli_installed_conflicts_with_uninstalled() {
        let result = Cli::try_parse_from(["pybs", "list", "-I", "-N"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_compare_parsing() {
        let cli = Cli::try_parse_from(["pybs", "compare", "2.0", "2.0-alpha"]).unwrap();
        match cli.command {
            Commands::Compare(args) => {
                assert_eq!(args.v1, "2.0");
                assert_eq!(args.v2, "2.0-alpha");
            }
            _ => panic!("Expected Compare command"),
        }
    }

    #[test]
    fn test_cli_names_required() {
        assert!(Cli::try_parse_from(["pybs", "which"]).is_err());
        assert!(Cli::try_parse_from(["pybs"]).is_err());
    }
}
