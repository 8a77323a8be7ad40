//! # Reference Track
//!
//! A reference track is the common distance frame other tracks are aligned to.
//! It is built from a chosen track by dropping points closer than a minimum
//! separation, so that nearest-point lookups land on well spaced anchors
//! instead of clusters of 10 Hz fixes.

use chrono::{DateTime, Utc};
use log::info;

use crate::error::Result;
use crate::geo_utils::haversine_distance;
use crate::stats::SeriesStats;
use crate::track::Track;
use crate::TrackPoint;

/// Configuration for reference track construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferenceConfig {
    /// Minimum separation between kept points (km).
    /// Default: 0.005 (5 m)
    pub distance_threshold_km: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            distance_threshold_km: 0.005,
        }
    }
}

/// Greedy forward downsampling.
///
/// The first point is the initial anchor. A point is kept, and becomes the new
/// anchor, when it lies farther than `distance_threshold_km` from the current
/// anchor. The result is never empty for non-empty input.
///
/// ```rust
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use track_compare::{build_sparse_points, TrackPoint};
///
/// let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
/// // 10 Hz fixes about 1.1 m apart
/// let points: Vec<TrackPoint> = (0..100)
///     .map(|i| TrackPoint::new(start + TimeDelta::milliseconds(i * 100), 45.0 + i as f64 * 0.00001, 7.0))
///     .collect();
///
/// let sparse = build_sparse_points(&points, 0.005);
/// assert_eq!(sparse[0], points[0]);
/// assert!(sparse.len() < 25);
/// ```
pub fn build_sparse_points(points: &[TrackPoint], distance_threshold_km: f64) -> Vec<TrackPoint> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut anchor = first;
    let mut sparse = vec![*first];

    for point in &points[1..] {
        if haversine_distance(point, anchor) > distance_threshold_km {
            sparse.push(*point);
            anchor = point;
        }
    }

    sparse
}

/// A sparsified track used as the coordinate frame for alignment.
#[derive(Debug, Clone)]
pub struct ReferenceTrack {
    track: Track,
}

impl ReferenceTrack {
    /// Sparsify `track` and rebuild statistics for the kept points.
    ///
    /// # Errors
    ///
    /// Fails when the sparse points no longer span any time, for example a
    /// track that never moved farther than the threshold.
    pub fn new(track: &Track, config: &ReferenceConfig) -> Result<Self> {
        let sparse = build_sparse_points(track.points(), config.distance_threshold_km);

        info!(
            "[Reference] '{}': kept {} of {} points",
            track.name(),
            sparse.len(),
            track.len()
        );

        let track = Track::from_prepared(track.name().to_string(), sparse, track.config().clone())?;
        Ok(Self { track })
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn name(&self) -> &str {
        self.track.name()
    }

    pub fn points(&self) -> &[TrackPoint] {
        self.track.points()
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }

    /// Cumulative distance of each reference point, km.
    pub fn dist_from_start(&self) -> &[f64] {
        self.track.dist_from_start()
    }

    pub fn start_point(&self) -> &TrackPoint {
        &self.track.points()[0]
    }

    pub fn finish_point(&self) -> &TrackPoint {
        &self.track.points()[self.track.len() - 1]
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.track.start_time()
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.track.end_time()
    }

    /// Distance between consecutive reference points (km), zeros skipped.
    pub fn spacing_stats(&self) -> Option<SeriesStats> {
        SeriesStats::without_zeros(self.track.dist())
    }

    /// Time between consecutive reference points (microseconds), zeros skipped.
    pub fn time_spacing_stats(&self) -> Option<SeriesStats> {
        let deltas: Vec<f64> = self
            .track
            .micros_from_start()
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64)
            .collect();
        SeriesStats::without_zeros(&deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackConfig;
    use chrono::{TimeDelta, TimeZone};

    fn dense_line(n: usize) -> Vec<TrackPoint> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                TrackPoint::new(
                    start + TimeDelta::milliseconds(i as i64 * 100),
                    45.0 + i as f64 * 0.00001,
                    7.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_sparse_keeps_first_point() {
        let points = dense_line(50);
        let sparse = build_sparse_points(&points, 0.005);
        assert_eq!(sparse[0], points[0]);
    }

    #[test]
    fn test_sparse_spacing_exceeds_threshold() {
        let points = dense_line(300);
        let threshold = 0.005;
        let sparse = build_sparse_points(&points, threshold);

        assert!(sparse.len() > 1);
        for w in sparse.windows(2) {
            assert!(haversine_distance(&w[0], &w[1]) > threshold);
        }
        // 1.11 m steps, so every fifth point is kept
        assert_eq!(sparse[1], points[5]);
    }

    #[test]
    fn test_sparse_edge_cases() {
        assert!(build_sparse_points(&[], 0.005).is_empty());

        let single = dense_line(1);
        assert_eq!(build_sparse_points(&single, 0.005), single);

        // Nothing moves far enough
        let points = dense_line(4);
        assert_eq!(build_sparse_points(&points, 1.0).len(), 1);
    }

    #[test]
    fn test_reference_track() {
        let track = Track::new("ref", dense_line(300), &TrackConfig::default()).unwrap();
        let reference = ReferenceTrack::new(&track, &ReferenceConfig::default()).unwrap();

        assert!(reference.len() < track.len());
        assert_eq!(reference.name(), "ref");
        assert_eq!(reference.start_point(), &track.points()[0]);
        assert_eq!(reference.dist_from_start()[0], 0.0);
        assert!(reference.dist_from_start().windows(2).all(|w| w[0] <= w[1]));

        let spacing = reference.spacing_stats().unwrap();
        assert!(spacing.min > 0.005);
        assert!(spacing.max < 0.006);

        let timing = reference.time_spacing_stats().unwrap();
        assert_eq!(timing.min, 500_000.0);
    }

    #[test]
    fn test_reference_from_stationary_track_fails() {
        let track = Track::new("still", dense_line(4), &TrackConfig::default()).unwrap();
        let config = ReferenceConfig { distance_threshold_km: 1.0 };
        assert!(ReferenceTrack::new(&track, &config).is_err());
    }
}
