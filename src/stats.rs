//! # Track Statistics
//!
//! Per-point arrays and whole-track aggregates derived from a point sequence.
//! All arrays are index-aligned with the input points.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{Result, TrackError};
use crate::geo_utils::haversine_distance;
use crate::{micros_between, TrackPoint};

/// Per-point kinematic arrays plus aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackStats {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub time: Vec<DateTime<Utc>>,
    /// Microseconds since the first point
    pub micros_from_start: Vec<i64>,
    /// Distance from the previous point in km (0 for the first point)
    pub dist: Vec<f64>,
    /// Running sum of `dist` in km
    pub dist_from_start: Vec<f64>,
    /// Kilometers
    pub total_distance: f64,
    pub total_time: TimeDelta,
    /// Whole-track average in kph: total distance over total elapsed hours
    pub total_avg_speed: f64,
}

impl TrackStats {
    /// Compute statistics for an ordered point sequence.
    ///
    /// # Errors
    ///
    /// - [`TrackError::EmptyTrack`] for an empty sequence
    /// - [`TrackError::NonMonotonicTime`] when a timestamp goes backwards
    /// - [`TrackError::ZeroDuration`] when first and last point share a timestamp
    pub fn from_points(points: &[TrackPoint]) -> Result<Self> {
        let first = points.first().ok_or(TrackError::EmptyTrack)?;
        let start_time = first.time;

        let n = points.len();
        let mut stats = Self {
            lat: Vec::with_capacity(n),
            lon: Vec::with_capacity(n),
            time: Vec::with_capacity(n),
            micros_from_start: Vec::with_capacity(n),
            dist: Vec::with_capacity(n),
            dist_from_start: Vec::with_capacity(n),
            total_distance: 0.0,
            total_time: TimeDelta::zero(),
            total_avg_speed: 0.0,
        };

        let mut prev = first;
        let mut dist_from_start = 0.0;

        for (i, point) in points.iter().enumerate() {
            if point.time < prev.time {
                return Err(TrackError::NonMonotonicTime { index: i });
            }

            let point_dist = if i == 0 { 0.0 } else { haversine_distance(prev, point) };
            dist_from_start += point_dist;

            stats.lat.push(point.lat);
            stats.lon.push(point.lon);
            stats.time.push(point.time);
            stats.micros_from_start.push(micros_between(point.time, start_time));
            stats.dist.push(point_dist);
            stats.dist_from_start.push(dist_from_start);

            prev = point;
        }

        stats.total_time = prev.time - start_time;
        stats.total_distance = dist_from_start;

        let total_micros = micros_between(prev.time, start_time);
        if total_micros <= 0 {
            return Err(TrackError::ZeroDuration { point_count: n });
        }
        stats.total_avg_speed = stats.total_distance / (total_micros as f64 / 3_600_000_000.0);

        Ok(stats)
    }
}

/// Min / max / average of a series with zero values filtered out.
///
/// Used for spacing diagnostics where zero entries (the first point, repeated
/// fixes) would drown the interesting values.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl SeriesStats {
    /// Returns `None` when every value is zero (or the series is empty).
    pub fn without_zeros(values: &[f64]) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for &v in values.iter().filter(|v| **v != 0.0) {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }

        Some(Self { min, max, avg: sum / count as f64 })
    }
}

impl std::fmt::Display for SeriesStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Min: {:.5}, Max: {:.5}, Avg: {:.5}", self.min, self.max, self.avg)
    }
}
