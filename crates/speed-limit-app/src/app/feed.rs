//! Location feed
//!
//! Location updates reach the runner through a bounded channel. Each source (fixed points,
//! a JSON lines stream, a GPX replay) runs as its own task holding a [`LocationPublisher`];
//! the runner drains the [`LocationFeed`] until every publisher is gone.

use speed_limit_lib::LocationSample;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Path that selects standard input for JSON lines sources
pub const STDIN_PATH: &str = "-";

/// Error types for location sources and output
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid point {0:?}: expected LAT,LON[,SPEED_MPS]")]
    InvalidPoint(String),
}

/// Create a connected publisher and feed
pub fn channel(capacity: usize) -> (LocationPublisher, LocationFeed) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (LocationPublisher { tx }, LocationFeed { rx })
}

/// Sending half of the feed, cloned once per source
#[derive(Debug, Clone)]
pub struct LocationPublisher {
    tx: mpsc::Sender<LocationSample>,
}

impl LocationPublisher {
    /// Publish a sample, waiting for room in the channel
    ///
    /// Returns `false` once the feed has been dropped, so sources can stop early.
    pub async fn publish(&self, sample: LocationSample) -> bool {
        self.tx.send(sample).await.is_ok()
    }
}

/// Receiving half of the feed
#[derive(Debug)]
pub struct LocationFeed {
    rx: mpsc::Receiver<LocationSample>,
}

impl LocationFeed {
    /// Next sample in arrival order, `None` when all publishers are gone
    pub async fn next(&mut self) -> Option<LocationSample> {
        self.rx.recv().await
    }
}

/// Where location samples come from
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSource {
    /// Fixed samples given on the command line
    Points(Vec<LocationSample>),
    /// One JSON sample per line, [`STDIN_PATH`] for standard input
    JsonLines(PathBuf),
    /// Track points of a GPX file
    Gpx(PathBuf),
}

impl LocationSource {
    /// Short human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Points(points) => format!("{} fixed point(s)", points.len()),
            Self::JsonLines(path) if path.as_os_str() == STDIN_PATH => "stdin".to_string(),
            Self::JsonLines(path) => format!("samples {}", path.display()),
            Self::Gpx(path) => format!("GPX {}", path.display()),
        }
    }

    /// Publish every sample of this source, pausing `interval` between samples
    ///
    /// Returns the number of samples published.
    pub async fn publish_all(
        self,
        publisher: &LocationPublisher,
        interval: Duration,
    ) -> Result<usize, FeedError> {
        match self {
            Self::Points(points) => Ok(publish_samples(points, publisher, interval).await),
            Self::JsonLines(path) if path.as_os_str() == STDIN_PATH => {
                publish_json_lines(BufReader::new(tokio::io::stdin()), publisher, interval).await
            }
            Self::JsonLines(path) => {
                let file = tokio::fs::File::open(&path).await?;
                publish_json_lines(BufReader::new(file), publisher, interval).await
            }
            Self::Gpx(path) => {
                let samples = read_gpx_samples(&path).await?;
                Ok(publish_samples(samples, publisher, interval).await)
            }
        }
    }

    /// Run this source on its own task
    ///
    /// Failures are logged; the publisher is dropped when the task ends either way.
    pub fn spawn(self, publisher: LocationPublisher, interval: Duration) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let description = self.describe();
            match self.publish_all(&publisher, interval).await {
                Ok(count) => {
                    tracing::info!("Location source {description} finished: {count} sample(s)");
                    count
                }
                Err(e) => {
                    tracing::error!("Location source {description} failed: {e}");
                    0
                }
            }
        })
    }
}

/// Parse a `LAT,LON[,SPEED_MPS]` command line point
pub fn parse_point(value: &str) -> Result<LocationSample, FeedError> {
    let invalid = || FeedError::InvalidPoint(value.to_string());

    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    let sample = match parts.as_slice() {
        [lat, lon] => LocationSample::new(*lat, *lon, None),
        [lat, lon, speed] => LocationSample::new(*lat, *lon, Some(*speed)),
        _ => return Err(invalid()),
    };
    match sample.query_point() {
        Some(point) if point.is_valid() => Ok(sample),
        _ => Err(invalid()),
    }
}

/// Wait between consecutive samples
async fn pace(interval: Duration, published: usize) {
    if published > 0 && !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}

async fn publish_samples(
    samples: Vec<LocationSample>,
    publisher: &LocationPublisher,
    interval: Duration,
) -> usize {
    let mut published = 0;
    for sample in samples {
        pace(interval, published).await;
        if !publisher.publish(sample).await {
            tracing::debug!("Location feed closed, stopping source");
            break;
        }
        published += 1;
    }
    published
}

/// Publish one sample per line, skipping blank and malformed lines
pub async fn publish_json_lines<R>(
    reader: R,
    publisher: &LocationPublisher,
    interval: Duration,
) -> Result<usize, FeedError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0;
    let mut published = 0;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample = match serde_json::from_str::<LocationSample>(line) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!("Skipping malformed sample on line {line_number}: {e}");
                continue;
            }
        };
        pace(interval, published).await;
        if !publisher.publish(sample).await {
            tracing::debug!("Location feed closed, stopping source");
            break;
        }
        published += 1;
    }
    Ok(published)
}

/// Read every track point of every track segment, in order
pub async fn read_gpx_samples(path: &Path) -> Result<Vec<LocationSample>, FeedError> {
    let bytes = tokio::fs::read(path).await?;
    let samples = gpx_samples(&bytes)?;
    tracing::debug!("Read {} track points from {}", samples.len(), path.display());
    Ok(samples)
}

fn gpx_samples(bytes: &[u8]) -> Result<Vec<LocationSample>, FeedError> {
    profiling::scope!("gpx_samples");

    let gpx = gpx::read(bytes)?;
    Ok(gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|waypoint| {
            let point = waypoint.point();
            LocationSample::new(point.y(), point.x(), waypoint.speed)
        })
        .collect())
}
