//! Session state
//!
//! Running statistics about the readings produced during one run, logged when the
//! feed ends.

use speed_limit_lib::{SegmentId, SpeedReading, SpeedStatus};

/// Statistics about processed samples
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    /// Number of samples processed
    pub samples: usize,

    /// Samples matched to a road segment
    pub matched: usize,

    /// Samples flagged as over the limit
    pub over_limit: usize,

    /// Samples without a device speed
    pub unknown_speed: usize,

    /// Highest reported speed in km/h
    pub max_speed_kmh: Option<u32>,

    /// Number of times the matched segment changed between consecutive matches
    pub segment_changes: usize,

    /// Last matched segment
    pub last_segment: Option<SegmentId>,
}

impl SessionStats {
    /// Account for one reading
    pub fn record(&mut self, reading: &SpeedReading) {
        self.samples += 1;
        match reading.status {
            SpeedStatus::Unknown => self.unknown_speed += 1,
            SpeedStatus::OverLimit => self.over_limit += 1,
            SpeedStatus::WithinLimit => {}
        }
        if let Some(speed) = reading.speed_kmh {
            self.max_speed_kmh = Some(self.max_speed_kmh.map_or(speed, |max| max.max(speed)));
        }
        if let Some(id) = &reading.segment_id {
            self.matched += 1;
            if self.last_segment.as_ref().is_some_and(|last| last != id) {
                self.segment_changes += 1;
            }
            self.last_segment = Some(id.clone());
        }
    }

    /// Share of samples matched to a road, in percent
    pub fn match_rate(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.matched as f64 * 100.0 / self.samples as f64
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let max_speed = self
            .max_speed_kmh
            .map_or_else(|| "--".to_string(), |speed| speed.to_string());
        format!(
            "{} samples, {} matched ({:.0}%), {} over limit, {} without speed, max {} km/h, {} road changes",
            self.samples,
            self.matched,
            self.match_rate(),
            self.over_limit,
            self.unknown_speed,
            max_speed,
            self.segment_changes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(speed_kmh: Option<u32>, segment: Option<i64>, status: SpeedStatus) -> SpeedReading {
        SpeedReading {
            timestamp: None,
            speed_kmh,
            speed_limit_kmh: 50.0,
            road_name: segment.map(|id| format!("Road {id}")),
            segment_id: segment.map(SegmentId::Numeric),
            distance_km: 0.01,
            status,
        }
    }

    #[test]
    fn test_record() {
        let mut stats = SessionStats::default();
        stats.record(&reading(Some(40), Some(1), SpeedStatus::WithinLimit));
        stats.record(&reading(Some(70), Some(1), SpeedStatus::OverLimit));
        stats.record(&reading(None, None, SpeedStatus::Unknown));
        stats.record(&reading(Some(30), Some(2), SpeedStatus::WithinLimit));

        assert_eq!(stats.samples, 4);
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.over_limit, 1);
        assert_eq!(stats.unknown_speed, 1);
        assert_eq!(stats.max_speed_kmh, Some(70));
        assert_eq!(stats.segment_changes, 1);
        assert_eq!(stats.last_segment, Some(SegmentId::Numeric(2)));
        assert!((stats.match_rate() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty() {
        let stats = SessionStats::default();
        assert_eq!(stats.match_rate(), 0.0);
        assert_eq!(
            stats.summary(),
            "0 samples, 0 matched (0%), 0 over limit, 0 without speed, max -- km/h, 0 road changes"
        );
    }
}
