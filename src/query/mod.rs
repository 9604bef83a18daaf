//! Queries over the dependency store and the installed-package database.

mod closure;
mod diff;
mod reverse;

pub use closure::ClosureResolver;
pub use diff::{Diff, InstalledDiff, Status};
pub use reverse::{Dependent, ReverseLookup};
