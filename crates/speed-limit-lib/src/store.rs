//! SegmentStore - Immutable collection of road segments
//!
//! This module provides the read-only store the matcher scans, together with the
//! once-only initialization holder applications use to build it at startup.

use crate::{RoadSegment, SegmentId};
use geo::Rect;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// How a store was built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Number of records found in the dataset
    pub total_records: usize,
    /// Number of records accepted as segments
    pub accepted: usize,
    /// Number of records skipped as invalid or duplicate
    pub skipped: usize,
    /// Why the built-in segments were used instead of the dataset, if they were
    pub fallback_reason: Option<String>,
}

impl LoadReport {
    #[inline]
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Information about the segment store
#[derive(Debug, Clone, Default)]
pub struct StoreInfo {
    /// Number of segments
    pub segment_count: usize,
    /// Total number of polyline points
    pub total_points: usize,
    /// Total length in kilometers
    pub total_length_km: f64,
    /// Combined bounding box in (lon, lat) degrees, `None` if empty
    pub bounding_box: Option<Rect<f64>>,
}

/// Ordered, immutable collection of road segments
///
/// Iteration order is insertion order, which the matcher relies on to break ties.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    segments: Vec<Arc<RoadSegment>>,
    report: LoadReport,
    /// Computed once during construction
    info: StoreInfo,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SegmentStore {
    /// Create a store from validated segments and the report describing how they were loaded
    pub fn new(segments: Vec<RoadSegment>, report: LoadReport) -> Self {
        let segments: Vec<Arc<RoadSegment>> = segments.into_iter().map(Arc::new).collect();
        let info = Self::compute_info(&segments);
        Self {
            segments,
            report,
            info,
        }
    }

    /// Create a store directly from segments
    pub fn from_segments(segments: Vec<RoadSegment>) -> Self {
        let report = LoadReport {
            total_records: segments.len(),
            accepted: segments.len(),
            ..LoadReport::default()
        };
        Self::new(segments, report)
    }

    /// Compute all statistics in a single pass over the segments
    fn compute_info(segments: &[Arc<RoadSegment>]) -> StoreInfo {
        let mut info = StoreInfo {
            segment_count: segments.len(),
            ..StoreInfo::default()
        };

        for segment in segments {
            info.total_points += segment.point_count();
            info.total_length_km += segment.length_km();

            let segment_bbox = segment.bounding_box();
            info.bounding_box = Some(match info.bounding_box {
                Some(bbox) => Rect::new(
                    geo::Coord {
                        x: bbox.min().x.min(segment_bbox.min().x),
                        y: bbox.min().y.min(segment_bbox.min().y),
                    },
                    geo::Coord {
                        x: bbox.max().x.max(segment_bbox.max().x),
                        y: bbox.max().y.max(segment_bbox.max().y),
                    },
                ),
                None => segment_bbox,
            });
        }

        info
    }

    /// Get total number of segments
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if the store is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate over segments in store order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RoadSegment>> {
        self.segments.iter()
    }

    /// Get all segments
    #[inline]
    pub fn segments(&self) -> &[Arc<RoadSegment>] {
        &self.segments
    }

    /// Get a reference to a specific segment by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Arc<RoadSegment>> {
        self.segments.get(index)
    }

    /// Find a segment by id
    pub fn find(&self, id: &SegmentId) -> Option<&Arc<RoadSegment>> {
        self.segments.iter().find(|s| s.id() == id)
    }

    /// Get the report describing how the store was loaded
    #[inline]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Get store information
    ///
    /// This is O(1) as all values are cached.
    #[inline]
    pub fn info(&self) -> &StoreInfo {
        &self.info
    }

    /// Serialize the store as a dataset the loader reads back unchanged
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.segments.iter().map(|s| s.to_record()).collect())
    }
}

/// Holds the segment store once it has been initialized
///
/// Applications create one cell at startup and hand it (or the store it yields) to every
/// consumer. Initialization runs at most once; later calls return the existing store.
#[derive(Debug, Default)]
pub struct StoreCell {
    cell: OnceCell<Arc<SegmentStore>>,
}

impl StoreCell {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Initialize the store with `load` unless that already happened
    ///
    /// `load` is not called when the cell is populated, so repeated initialization neither
    /// reloads the dataset nor changes the store.
    pub fn initialize<F>(&self, load: F) -> Arc<SegmentStore>
    where
        F: FnOnce() -> SegmentStore,
    {
        let mut initialized_now = false;
        let store = self.cell.get_or_init(|| {
            initialized_now = true;
            Arc::new(load())
        });
        if !initialized_now {
            tracing::debug!("Segment store already initialized, ignoring");
        }
        store.clone()
    }

    /// Get the store if it has been initialized
    #[inline]
    pub fn get(&self) -> Option<Arc<SegmentStore>> {
        self.cell.get().cloned()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoaderConfig, SegmentLoader};
    use geo::LineString;

    fn create_test_segment(id: i64, lon: f64) -> RoadSegment {
        RoadSegment::new(
            id,
            Some(format!("Road {id}")),
            50.0,
            LineString::from(vec![(lon, 51.5), (lon + 0.001, 51.501)]),
        )
        .unwrap()
    }

    fn create_test_store() -> SegmentStore {
        SegmentStore::from_segments(vec![
            create_test_segment(1, -0.13),
            create_test_segment(2, -0.12),
            create_test_segment(3, -0.11),
        ])
    }

    #[test]
    fn test_store_creation() {
        let store = create_test_store();
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
        assert_eq!(store.report().accepted, 3);
        assert!(!store.report().used_fallback());
    }

    #[test]
    fn test_store_preserves_order() {
        let store = create_test_store();
        let ids: Vec<_> = store.iter().map(|s| s.id().clone()).collect();
        assert_eq!(
            ids,
            vec![
                SegmentId::Numeric(1),
                SegmentId::Numeric(2),
                SegmentId::Numeric(3)
            ]
        );
    }

    #[test]
    fn test_get_and_find() {
        let store = create_test_store();
        assert!(store.get(0).is_some());
        assert!(store.get(3).is_none());
        assert_eq!(store.find(&SegmentId::Numeric(2)).unwrap().name(), "Road 2");
        assert!(store.find(&SegmentId::Numeric(9)).is_none());
    }

    #[test]
    fn test_info() {
        let store = create_test_store();
        let info = store.info();
        assert_eq!(info.segment_count, 3);
        assert_eq!(info.total_points, 6);
        assert!(info.total_length_km > 0.0);

        let bbox = info.bounding_box.unwrap();
        assert!((bbox.min().x - -0.13).abs() < 1e-12);
        assert!((bbox.max().x - -0.109).abs() < 1e-12);
        assert!((bbox.min().y - 51.5).abs() < 1e-12);
        assert!((bbox.max().y - 51.501).abs() < 1e-12);
    }

    #[test]
    fn test_info_empty() {
        let store = SegmentStore::from_segments(Vec::new());
        assert!(store.is_empty());
        assert_eq!(store.info().segment_count, 0);
        assert!(store.info().bounding_box.is_none());
    }

    #[test]
    fn test_to_json_reloads_identically() {
        let store = create_test_store();
        let json = store.to_json();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);

        let reloaded = SegmentLoader::new(LoaderConfig::default()).load_records(records);
        assert_eq!(reloaded.len(), store.len());
        for (a, b) in store.iter().zip(reloaded.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_cell_initializes_once() {
        let cell = StoreCell::new();
        assert!(!cell.is_initialized());
        assert!(cell.get().is_none());

        let first = cell.initialize(create_test_store);
        assert!(cell.is_initialized());
        assert_eq!(first.len(), 3);

        let mut called = false;
        let second = cell.initialize(|| {
            called = true;
            SegmentStore::from_segments(vec![create_test_segment(9, 0.0)])
        });
        assert!(!called);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 3);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_store_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SegmentStore>();
        assert_send_sync::<StoreCell>();
    }
}
