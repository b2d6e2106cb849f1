// Shared modules
pub(crate) mod cli;
pub(crate) mod logging;
mod metadata;

// Entry point
pub mod run;

pub use metadata::short_version_info;
