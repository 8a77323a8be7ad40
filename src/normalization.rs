//! Optional point normalization applied after repair and before statistics.

use chrono::Timelike;

use crate::error::{Result, TrackError};
use crate::TrackPoint;

/// Configuration for point normalization.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizationConfig {
    /// Prepend a point at the start of the first point's minute.
    /// Rally special stages start on whole minutes, so elapsed time lines up
    /// with official timing.
    pub align_to_minutes: bool,
    /// Weights for (previous, current, next) point when smoothing coordinates.
    /// `None` disables smoothing.
    pub neighbor_weights: Option<[f64; 3]>,
}

impl NormalizationConfig {
    /// Apply the configured normalizations in order: minute alignment, then smoothing.
    pub fn apply(&self, points: Vec<TrackPoint>) -> Result<Vec<TrackPoint>> {
        let points = if self.align_to_minutes {
            normalize_minute_starts(points)?
        } else {
            points
        };

        match self.neighbor_weights {
            Some(weights) => Ok(normalize_by_neighbor_weights(&points, weights)),
            None => Ok(points),
        }
    }
}

/// Prepend a copy of the first point stamped at the start of its minute.
///
/// Nothing changes when the first point already sits on a whole minute.
pub fn normalize_minute_starts(mut points: Vec<TrackPoint>) -> Result<Vec<TrackPoint>> {
    let Some(first) = points.first().copied() else {
        return Ok(points);
    };

    if first.time.second() == 0 && first.time.nanosecond() == 0 {
        return Ok(points);
    }

    let minute_start = first
        .time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .ok_or(TrackError::InvalidTimestamp { index: 0, micros: 0 })?;

    points.insert(0, first.with_time(minute_start));
    Ok(points)
}

/// Smooth latitude, longitude and altitude with the neighbouring points.
///
/// Edge points use themselves in place of the missing neighbour. Time, speed
/// and bearing are kept as recorded.
pub fn normalize_by_neighbor_weights(points: &[TrackPoint], weights: [f64; 3]) -> Vec<TrackPoint> {
    let [w_prev, w_cur, w_next] = weights;
    let last = points.len().saturating_sub(1);

    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let prev = &points[i.saturating_sub(1)];
            let next = &points[(i + 1).min(last)];
            TrackPoint {
                lat: w_prev * prev.lat + w_cur * point.lat + w_next * next.lat,
                lon: w_prev * prev.lon + w_cur * point.lon + w_next * next.lon,
                altitude: w_prev * prev.altitude + w_cur * point.altitude + w_next * next.altitude,
                ..*point
            }
        })
        .collect()
}
