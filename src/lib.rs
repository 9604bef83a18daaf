pub mod commands;
pub mod error;
pub mod evaluator;
pub mod package;
pub mod query;
pub mod runtime;
pub mod store;

pub use error::{Error, Result};
