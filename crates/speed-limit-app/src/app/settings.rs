use crate::app::display::OutputFormat;
use crate::app::feed::{LocationSource, STDIN_PATH, parse_point};
use crate::entrypoints::cli::{get_env, parse_args};
use clap::Parser;
use speed_limit_lib::{LoaderConfig, LocationSample, MatcherConfig};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATASET: &str = "SPEED_LIMIT_DATASET";
pub const ENV_THRESHOLD_M: &str = "SPEED_LIMIT_THRESHOLD_M";
pub const ENV_NO_MATCH_KMH: &str = "SPEED_LIMIT_NO_MATCH_KMH";
pub const ENV_FALLBACK_KMH: &str = "SPEED_LIMIT_FALLBACK_KMH";

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Speed Limit Finder - Report the legal speed limit for a stream of GPS fixes
pub struct Settings {
    /// Road segment dataset, a JSON array of records [env: SPEED_LIMIT_DATASET]
    #[clap(short, long, value_name = "FILE")]
    pub dataset: Option<PathBuf>,

    /// Maximum distance in meters between a fix and a road to trust the match
    /// [env: SPEED_LIMIT_THRESHOLD_M] [default: 50]
    #[clap(short, long, value_name = "METERS")]
    pub threshold_m: Option<f64>,

    /// Speed limit in km/h reported when no road matches
    /// [env: SPEED_LIMIT_NO_MATCH_KMH] [default: 60]
    #[clap(long, value_name = "KMH")]
    pub no_match_kmh: Option<f64>,

    /// Speed limit in km/h for dataset records without any speed information
    /// [env: SPEED_LIMIT_FALLBACK_KMH] [default: 60]
    #[clap(long, value_name = "KMH")]
    pub fallback_kmh: Option<f64>,

    /// How far above the limit (km/h) a reading may go before it is flagged
    #[clap(long, value_name = "KMH", default_value = "0.0")]
    pub tolerance_kmh: f64,

    /// JSON lines file of location samples, `-` for stdin
    #[clap(short, long, value_name = "FILE")]
    pub samples: Vec<PathBuf>,

    /// GPX files whose track points are replayed as location samples
    #[clap(short, long, value_name = "FILE")]
    pub gpx: Vec<PathBuf>,

    /// Fixed location to look up
    #[clap(
        short,
        long = "point",
        value_name = "LAT,LON[,SPEED_MPS]",
        value_parser = parse_point,
        allow_hyphen_values = true
    )]
    pub points: Vec<LocationSample>,

    /// Delay between replayed samples in milliseconds
    #[clap(long, value_name = "MS", default_value = "0")]
    pub interval_ms: u64,

    /// Write readings as JSON lines instead of text
    #[clap(long)]
    pub json: bool,

    /// Number of samples buffered between sources and the matcher
    #[clap(long, default_value = "64")]
    pub channel_capacity: usize,
}

impl Settings {
    /// Parse settings from the command line, exiting on invalid arguments
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Dataset path, from the flag or the environment
    pub fn dataset(&self) -> Option<PathBuf> {
        self.dataset.clone().or_else(|| get_env(ENV_DATASET))
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        let defaults = MatcherConfig::default();
        let threshold_m = resolve(
            "threshold",
            self.threshold_m,
            ENV_THRESHOLD_M,
            defaults.max_distance_km * 1000.0,
            |m| m >= 0.0,
        );
        let no_match_kmh = resolve(
            "no-match speed limit",
            self.no_match_kmh,
            ENV_NO_MATCH_KMH,
            defaults.default_speed_limit_kmh,
            |kmh| kmh > 0.0,
        );
        MatcherConfig {
            max_distance_km: threshold_m / 1000.0,
            default_speed_limit_kmh: no_match_kmh,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        let defaults = LoaderConfig::default();
        let fallback_kmh = resolve(
            "fallback speed limit",
            self.fallback_kmh,
            ENV_FALLBACK_KMH,
            defaults.default_speed_limit_kmh,
            |kmh| kmh > 0.0,
        );
        LoaderConfig {
            default_speed_limit_kmh: fallback_kmh,
            ..defaults
        }
    }

    /// Configured location sources; standard input when none is given
    pub fn sources(&self) -> Vec<LocationSource> {
        let mut sources = Vec::new();
        if !self.points.is_empty() {
            sources.push(LocationSource::Points(self.points.clone()));
        }
        sources.extend(self.samples.iter().cloned().map(LocationSource::JsonLines));
        sources.extend(self.gpx.iter().cloned().map(LocationSource::Gpx));
        if sources.is_empty() {
            tracing::info!("No location source given, reading samples from stdin");
            sources.push(LocationSource::JsonLines(PathBuf::from(STDIN_PATH)));
        }
        sources
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Pick the flag, then the environment variable, then the default
///
/// Values rejected by `valid` are logged and replaced by the default.
fn resolve(
    what: &str,
    flag: Option<f64>,
    env_key: &str,
    default: f64,
    valid: impl Fn(f64) -> bool,
) -> f64 {
    match flag.or_else(|| get_env(env_key)) {
        Some(value) if value.is_finite() && valid(value) => value,
        Some(value) => {
            tracing::warn!("Invalid {what} {value}, using {default}");
            default
        }
        None => default,
    }
}
