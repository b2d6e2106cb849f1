//! Speed Limit Finder - Application Library
//!
//! This is the runner crate that integrates the speed limit library with location sources,
//! command line settings and logging to report the speed limit for a stream of GPS fixes.

mod app;
mod entrypoints;

pub use app::SpeedLimitApp;
pub use app::display::{OutputFormat, format_text, render};
pub use app::feed::{
    FeedError, LocationFeed, LocationPublisher, LocationSource, channel, parse_point,
};
pub use app::settings::Settings;
pub use app::state::SessionStats;
pub use entrypoints::run::run_native;
pub use entrypoints::short_version_info;
