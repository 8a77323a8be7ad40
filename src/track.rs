//! # Track
//!
//! An immutable GPS track: repaired points plus index-aligned derived arrays
//! (coordinates, elapsed time, distances, smoothed speed) and aggregates.
//!
//! Every transformation (cropping, sparsification) builds a new [`Track`].

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

use crate::activity::ActivitySegment;
use crate::error::{OptionExt, Result, TrackError};
use crate::geo_utils::haversine_distance;
use crate::normalization::NormalizationConfig;
use crate::repair::repair_points;
use crate::speed::{self, SpeedConfig};
use crate::stats::TrackStats;
use crate::TrackPoint;

/// Configuration for building tracks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackConfig {
    /// Speed smoothing and strategy selection
    pub speed: SpeedConfig,
    /// Optional point normalization, applied after timestamp repair
    pub normalization: NormalizationConfig,
    /// Run timestamp precision repair on input points.
    /// Default: true
    pub repair_timestamps: bool,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            speed: SpeedConfig::default(),
            normalization: NormalizationConfig::default(),
            repair_timestamps: true,
        }
    }
}

/// A GPS track with derived per-point statistics.
///
/// Invariants: every per-point array has `len()` entries, cumulative distance
/// is non-decreasing, elapsed microseconds start at zero and never decrease.
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    points: Vec<TrackPoint>,
    stats: TrackStats,
    speed: Vec<f64>,
    subsecond_precision: bool,
    avg_speed: f64,
    max_speed: f64,
    config: TrackConfig,
}

impl Track {
    /// Build a track from raw points: repair, normalize, then derive statistics.
    ///
    /// # Errors
    ///
    /// Fails on empty input, coordinates outside WGS84 bounds, backwards
    /// timestamps, zero total duration and oversized whole-second groups
    /// during repair.
    pub fn new(name: impl Into<String>, points: Vec<TrackPoint>, config: &TrackConfig) -> Result<Self> {
        if points.is_empty() {
            return Err(TrackError::EmptyTrack);
        }
        if let Some(index) = points.iter().position(|p| !p.is_valid()) {
            let p = points[index];
            return Err(TrackError::InvalidCoordinates {
                index,
                lat: p.lat,
                lon: p.lon,
            });
        }

        let points = if config.repair_timestamps {
            repair_points(&points)?
        } else {
            points
        };
        let points = config.normalization.apply(points)?;

        Self::from_prepared(name.into(), points, config.clone())
    }

    /// Build from points that are already repaired and normalized.
    pub(crate) fn from_prepared(name: String, points: Vec<TrackPoint>, config: TrackConfig) -> Result<Self> {
        let stats = TrackStats::from_points(&points)?;
        let subsecond_precision = points.iter().any(|p| p.micros() > 0);
        let speed = speed::calculate_speed(&points, subsecond_precision, &config.speed)?;

        let max_speed = speed.iter().copied().fold(0.0, f64::max);
        let avg_speed = speed.iter().sum::<f64>() / speed.len() as f64;

        debug!(
            "[Track] Built '{}': {} points, {:.3} km, max {:.1} kph",
            name,
            points.len(),
            stats.total_distance,
            max_speed
        );

        Ok(Self {
            name,
            points,
            stats,
            speed,
            subsecond_precision,
            avg_speed,
            max_speed,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: tracks cannot be built from an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Per-point arrays
    // ------------------------------------------------------------------------

    pub fn lat(&self) -> &[f64] {
        &self.stats.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.stats.lon
    }

    pub fn time(&self) -> &[DateTime<Utc>] {
        &self.stats.time
    }

    pub fn micros_from_start(&self) -> &[i64] {
        &self.stats.micros_from_start
    }

    /// Distance from the previous point, km.
    pub fn dist(&self) -> &[f64] {
        &self.stats.dist
    }

    /// Cumulative distance from the first point, km.
    pub fn dist_from_start(&self) -> &[f64] {
        &self.stats.dist_from_start
    }

    /// Smoothed speed, kph.
    pub fn speed(&self) -> &[f64] {
        &self.speed
    }

    // ------------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------------

    pub fn start_time(&self) -> DateTime<Utc> {
        self.points[0].time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1].time
    }

    pub fn total_time(&self) -> TimeDelta {
        self.stats.total_time
    }

    /// Kilometers.
    pub fn total_distance(&self) -> f64 {
        self.stats.total_distance
    }

    /// Total distance over total elapsed time, kph.
    pub fn total_avg_speed(&self) -> f64 {
        self.stats.total_avg_speed
    }

    /// Mean of the smoothed speed series, kph.
    pub fn avg_speed(&self) -> f64 {
        self.avg_speed
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// True when timestamps carry real subsecond values (10 Hz and faster recorders).
    pub fn subsecond_precision(&self) -> bool {
        self.subsecond_precision
    }

    pub fn has_speed_data(&self) -> bool {
        speed::has_speed_data(&self.points)
    }

    pub fn has_bearing_data(&self) -> bool {
        self.points.iter().all(|p| p.bearing.is_some())
    }

    // ------------------------------------------------------------------------
    // Point lookup
    // ------------------------------------------------------------------------

    /// Index of the first point within `threshold_km` of `target`.
    pub fn find_point_index(&self, target: &TrackPoint, threshold_km: f64) -> Option<usize> {
        self.find_point_index_from(target, threshold_km, 0)
    }

    fn find_point_index_from(&self, target: &TrackPoint, threshold_km: f64, from: usize) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, p)| haversine_distance(p, target) < threshold_km)
            .map(|(i, _)| i)
    }

    /// Index of the point closest to `target` within the first run of points
    /// that stay inside `threshold_km` of it.
    pub fn find_nearest_point_index(&self, target: &TrackPoint, threshold_km: f64) -> Option<usize> {
        self.find_nearest_point_index_from(target, threshold_km, 0)
    }

    fn find_nearest_point_index_from(&self, target: &TrackPoint, threshold_km: f64, from: usize) -> Option<usize> {
        let first = self.find_point_index_from(target, threshold_km, from)?;

        let mut best = (first, haversine_distance(&self.points[first], target));
        for (i, p) in self.points.iter().enumerate().skip(first + 1) {
            let dist = haversine_distance(p, target);
            if dist >= threshold_km {
                break;
            }
            if dist < best.1 {
                best = (i, dist);
            }
        }

        Some(best.0)
    }

    /// Like [`Track::find_nearest_point_index`], but only counts arrivals.
    ///
    /// When the track starts inside the zone around `target` (a circuit whose
    /// start and finish coincide), the search begins once the track has left
    /// the zone. `None` when the track never leaves it or never comes back.
    pub fn find_arrival_point_index(&self, target: &TrackPoint, threshold_km: f64) -> Option<usize> {
        let departure = self
            .points
            .iter()
            .position(|p| haversine_distance(p, target) >= threshold_km)?;
        self.find_nearest_point_index_from(target, threshold_km, departure)
    }

    // ------------------------------------------------------------------------
    // Cropping
    // ------------------------------------------------------------------------

    /// New track with points `[0, index]`.
    pub fn crop_to_point_idx(&self, index: usize) -> Result<Self> {
        let points = self
            .points
            .get(..=index)
            .ok_or_out_of_range(index, self.len())?;
        Self::from_prepared(self.name.clone(), points.to_vec(), self.config.clone())
    }

    /// New track with points `[index, len)`.
    pub fn crop_from_point_idx(&self, index: usize) -> Result<Self> {
        if index >= self.len() {
            return Err(TrackError::IndexOutOfRange { index, len: self.len() });
        }
        Self::from_prepared(self.name.clone(), self.points[index..].to_vec(), self.config.clone())
    }

    /// New track restricted to the segment, both ends included.
    pub fn crop_to_activity_segment(&self, segment: &ActivitySegment, name: impl Into<String>) -> Result<Self> {
        let points = self
            .points
            .get(segment.start_idx..=segment.end_idx)
            .ok_or_out_of_range(segment.end_idx, self.len())?;
        Self::from_prepared(name.into(), points.to_vec(), self.config.clone())
    }

    /// New track from the segment start to the end of the track.
    ///
    /// Used when a run may contain stops longer than the allowed pause
    /// (a red flag on a stage) but should still be compared as a whole.
    pub fn crop_to_activity_segment_start(&self, segment: &ActivitySegment, name: impl Into<String>) -> Result<Self> {
        let points = self
            .points
            .get(segment.start_idx..)
            .filter(|points| !points.is_empty())
            .ok_or_out_of_range(segment.start_idx, self.len())?;
        Self::from_prepared(name.into(), points.to_vec(), self.config.clone())
    }
}
