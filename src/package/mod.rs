//! Package library module
//!
//! This module identifies package descriptors, orders their versions and
//! discovers them in the package library.

mod catalog;
mod descriptor;
mod discovery;
mod version;

pub use catalog::Catalog;
pub use descriptor::{
    Arch, DESCRIPTOR_SUFFIXES, Descriptor, PackageRef, is_descriptor_like, loose_version,
};
pub use discovery::{CatalogScanner, DEFAULT_SUFFIX, find_descriptors};
pub use version::VersionOrder;
