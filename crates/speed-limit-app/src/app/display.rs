//! Rendering of speed readings, one line per sample

use speed_limit_lib::{SpeedReading, SpeedStatus};

/// How readings are written to stdout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `62 km/h | limit 50 km/h | Main Street (12 m) | OVER`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Render a reading in the given format, without trailing newline
pub fn render(reading: &SpeedReading, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(format_text(reading)),
        OutputFormat::Json => serde_json::to_string(reading),
    }
}

/// Human-readable single line
pub fn format_text(reading: &SpeedReading) -> String {
    let speed = match reading.speed_kmh {
        Some(speed) => format!("{speed} km/h"),
        None => "-- km/h".to_string(),
    };
    let road = match &reading.road_name {
        Some(name) => format!("{name} ({})", format_distance(reading.distance_km)),
        None if reading.distance_km.is_finite() => {
            format!("no road (nearest {})", format_distance(reading.distance_km))
        }
        None => "no road".to_string(),
    };
    let status = match reading.status {
        SpeedStatus::Unknown => "?",
        SpeedStatus::WithinLimit => "OK",
        SpeedStatus::OverLimit => "OVER",
    };

    let mut line = format!(
        "{speed} | limit {:.0} km/h | {road} | {status}",
        reading.speed_limit_kmh
    );
    if let Some(timestamp) = &reading.timestamp {
        line = format!("{timestamp} | {line}");
    }
    line
}

/// Format a distance in km as meters or kilometers
pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        format!("{:.0} m", distance_km * 1000.0)
    } else {
        format!("{:.1} km", distance_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speed_limit_lib::SegmentId;

    fn reading() -> SpeedReading {
        SpeedReading {
            timestamp: None,
            speed_kmh: Some(62),
            speed_limit_kmh: 50.0,
            road_name: Some("Main Street".to_string()),
            segment_id: Some(SegmentId::Numeric(3)),
            distance_km: 0.012,
            status: SpeedStatus::OverLimit,
        }
    }

    #[test]
    fn test_format_text() {
        assert_eq!(
            format_text(&reading()),
            "62 km/h | limit 50 km/h | Main Street (12 m) | OVER"
        );
    }

    #[test]
    fn test_format_text_without_match_or_speed() {
        let mut reading = SpeedReading {
            speed_kmh: None,
            road_name: None,
            segment_id: None,
            speed_limit_kmh: 60.0,
            distance_km: 2.345,
            status: SpeedStatus::Unknown,
            timestamp: Some("12:00:01".to_string()),
        };
        assert_eq!(
            format_text(&reading),
            "12:00:01 | -- km/h | limit 60 km/h | no road (nearest 2.3 km) | ?"
        );

        reading.distance_km = f64::INFINITY;
        reading.timestamp = None;
        assert_eq!(format_text(&reading), "-- km/h | limit 60 km/h | no road | ?");
    }

    #[test]
    fn test_render_json() {
        let line = render(&reading(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["speed_kmh"], 62);
        assert_eq!(value["road_name"], "Main Street");
        assert_eq!(value["segment_id"], 3);
        assert_eq!(value["status"], "over_limit");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0 m");
        assert_eq!(format_distance(0.0494), "49 m");
        assert_eq!(format_distance(12.0), "12.0 km");
    }
}
