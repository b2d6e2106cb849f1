//! Application module
//!
//! This module wires the library into a headless runner:
//! - Loads the segment store once at startup (with built-in fallback)
//! - Spawns the configured location sources feeding a bounded channel
//! - Looks up every sample in arrival order and writes one reading per line
//! - Logs session statistics when the feed ends

pub mod display;
pub mod feed;
pub mod settings;
pub mod state;

use crate::app::display::OutputFormat;
use crate::app::feed::{FeedError, LocationFeed};
use crate::app::settings::Settings;
use crate::app::state::SessionStats;
use speed_limit_lib::{
    LocationSample, SegmentLoader, SegmentStore, SpeedLimitMatcher, SpeedReading, StoreCell,
};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Main application structure
pub struct SpeedLimitApp {
    /// Settings resolved from the command line and environment
    settings: Settings,

    /// Segment store, loaded on first use
    store: StoreCell,
}

impl SpeedLimitApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            store: StoreCell::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Load the segment store unless that already happened
    ///
    /// A missing or unreadable dataset is not fatal: the built-in segments are used instead.
    pub async fn load_store(&self) -> Arc<SegmentStore> {
        if let Some(store) = self.store.get() {
            return store;
        }

        let loader = SegmentLoader::new(self.settings.loader_config());
        let loaded = match self.settings.dataset() {
            Some(path) => {
                tracing::info!("Loading road segments from {}", path.display());
                match tokio::fs::read_to_string(&path).await {
                    Ok(json) => loader.load_str(&json),
                    Err(e) => {
                        loader.load_builtin(format!("cannot read dataset {}: {e}", path.display()))
                    }
                }
            }
            None => loader.load_builtin("no dataset configured"),
        };

        let store = self.store.initialize(|| loaded);
        let info = store.info();
        tracing::info!(
            "Segment store ready: {} segments, {} points, {:.1} km of road",
            info.segment_count,
            info.total_points,
            info.total_length_km
        );
        store
    }

    /// Create a matcher over the (loaded) store
    pub async fn matcher(&self) -> SpeedLimitMatcher {
        let store = self.load_store().await;
        SpeedLimitMatcher::new(store, self.settings.matcher_config())
    }

    /// Run every configured source to completion, writing readings to `out`
    pub async fn run<W>(&self, out: &mut W) -> Result<SessionStats, FeedError>
    where
        W: AsyncWrite + Unpin,
    {
        let matcher = self.matcher().await;
        let (publisher, feed) = feed::channel(self.settings.channel_capacity);

        let interval = self.settings.interval();
        let handles: Vec<_> = self
            .settings
            .sources()
            .into_iter()
            .map(|source| {
                tracing::debug!("Starting location source {}", source.describe());
                source.spawn(publisher.clone(), interval)
            })
            .collect();
        // The feed ends once every source has dropped its clone
        drop(publisher);

        let stats = self.process_feed(&matcher, feed, out).await?;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Location source task failed: {e}");
            }
        }

        tracing::info!("Session finished: {}", stats.summary());
        Ok(stats)
    }

    /// Look up every sample of `feed` in arrival order
    pub async fn process_feed<W>(
        &self,
        matcher: &SpeedLimitMatcher,
        mut feed: LocationFeed,
        out: &mut W,
    ) -> Result<SessionStats, FeedError>
    where
        W: AsyncWrite + Unpin,
    {
        let format = self.settings.output_format();
        let mut stats = SessionStats::default();
        while let Some(sample) = feed.next().await {
            let (reading, line) =
                evaluate_sample(matcher, &sample, self.settings.tolerance_kmh, format)?;
            if reading.is_over_limit() {
                tracing::debug!(
                    "Over the limit: {:?} km/h in a {} km/h zone",
                    reading.speed_kmh,
                    reading.speed_limit_kmh
                );
            }
            stats.record(&reading);
            out.write_all(line.as_bytes()).await?;
        }
        out.flush().await?;
        Ok(stats)
    }
}

/// Evaluate one sample and render its output line
fn evaluate_sample(
    matcher: &SpeedLimitMatcher,
    sample: &LocationSample,
    tolerance_kmh: f64,
    format: OutputFormat,
) -> Result<(SpeedReading, String), FeedError> {
    profiling::scope!("evaluate_sample");

    let result = matcher.lookup_sample(sample);
    let reading = SpeedReading::evaluate(sample, &result, tolerance_kmh);
    let mut line = display::render(&reading, format)?;
    line.push('\n');
    Ok((reading, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use speed_limit_lib::builtin_segments;

    const DATASET: &str = r#"[
        {"id": 1, "name": "Main Street", "speedLimit": 50,
         "geometry": [[0.0, 0.0], [0.01, 0.0]]},
        {"id": 2, "name": "Side Road", "tags": {"maxspeed": "20 mph"},
         "geometry": [[0.0, 0.005], [0.01, 0.005]]}
    ]"#;

    fn app(args: &[&str]) -> SpeedLimitApp {
        let settings =
            Settings::try_parse_from(std::iter::once("speed-limit-app").chain(args.iter().copied()))
                .unwrap();
        SpeedLimitApp::new(settings)
    }

    fn write_dataset(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("segments.json");
        std::fs::write(&path, DATASET).unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_load_store_from_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let app = app(&["--dataset", &dataset, "--point", "0,0"]);

        let store = app.load_store().await;
        assert_eq!(store.len(), 2);
        assert!(!store.report().used_fallback());
        // 20 mph
        let side = store.get(1).unwrap();
        assert!((side.speed_limit_kmh() - 32.18688).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_load_store_once() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let app = app(&["--dataset", &dataset, "--point", "0,0"]);

        let first = app.load_store().await;
        std::fs::remove_file(&dataset).unwrap();
        let second = app.load_store().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_dataset_uses_builtin_segments() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let app = app(&["--dataset", &missing.to_string_lossy(), "--point", "0,0"]);

        let store = app.load_store().await;
        assert!(store.report().used_fallback());
        assert_eq!(store.len(), builtin_segments().len());
    }

    #[tokio::test]
    async fn test_run_text_output() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let app = app(&[
            "--dataset",
            &dataset,
            // On Main Street at 62 km/h
            "--point",
            "0.0001,0.005,17.2",
            // Far from every road, no speed
            "--point",
            "1,1",
        ]);

        let mut out = Vec::new();
        let stats = app.run(&mut out).await.unwrap();
        let output = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "62 km/h | limit 50 km/h | Main Street (11 m) | OVER");
        assert!(lines[1].starts_with("-- km/h | limit 60 km/h | no road (nearest "));
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.over_limit, 1);
        assert_eq!(stats.unknown_speed, 1);
    }

    #[tokio::test]
    async fn test_run_json_output_from_samples_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let samples = dir.path().join("samples.jsonl");
        std::fs::write(
            &samples,
            "{\"latitude\": 0.0049, \"longitude\": 0.005, \"speedOverGround\": 8.0, \"timestamp\": \"t1\"}\n\
             garbage\n\
             {\"latitude\": 0.0, \"longitude\": 0.005, \"speed\": 10.0}\n",
        )
        .unwrap();
        let app = app(&[
            "--dataset",
            &dataset,
            "--samples",
            &samples.to_string_lossy(),
            "--json",
            "--tolerance-kmh",
            "5",
        ]);

        let mut out = Vec::new();
        let stats = app.run(&mut out).await.unwrap();
        let output = String::from_utf8(out).unwrap();
        let readings: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0]["timestamp"], "t1");
        assert_eq!(readings[0]["road_name"], "Side Road");
        assert_eq!(readings[0]["speed_kmh"], 29);
        assert_eq!(readings[0]["status"], "within_limit");
        assert_eq!(readings[1]["segment_id"], 1);
        assert_eq!(readings[1]["speed_kmh"], 36);
        assert_eq!(stats.segment_changes, 1);
    }

    #[tokio::test]
    async fn test_run_with_failing_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.gpx");
        let app = app(&["--gpx", &missing.to_string_lossy(), "--point", "37.4220,-122.0841"]);

        let mut out = Vec::new();
        let stats = app.run(&mut out).await.unwrap();
        assert_eq!(stats.samples, 1);
        // Built-in segments cover the emulator default location
        assert_eq!(stats.matched, 1);
    }
}
