//! # Track Alignment
//!
//! Re-expresses a candidate track in the distance frame of a reference track,
//! so that speed curves of different runs can share one x-axis.
//!
//! ## Algorithm
//!
//! For each candidate point, in order:
//! 1. Search the reference points in a bounded window around a cursor
//!    (`saved_ref_idx`, starting at 0)
//! 2. Pick the reference point with the smallest haversine distance
//! 3. Assign that point's cumulative distance to the candidate point
//! 4. Move the cursor to the picked index
//!
//! The bounded window keeps the search O(window) per point and stops a
//! candidate from snapping onto a distant part of the course that happens to
//! pass nearby (hairpins, figure-of-eight layouts).
//!
//! Alignment never fails. Points far from every reference point in the window
//! still get the closest value, and are counted as off-track.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::geo_utils::haversine_distance;
use crate::reference::ReferenceTrack;
use crate::track::Track;

/// Which reference points the window covers relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchDirection {
    /// `[cursor - window, cursor + window)`: tolerates short reversals of the
    /// candidate (a spin, reversing out of a runoff).
    Symmetric,
    /// `[cursor, cursor + window)`: never moves backwards, so loops and spins
    /// cannot drag the cursor back, at the cost of under-aligning reversals.
    ForwardOnly,
}

/// Configuration for alignment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentConfig {
    /// Number of reference points searched on each side of the cursor.
    /// Default: 50
    pub search_window: usize,
    /// Default: Symmetric
    pub search_direction: SearchDirection,
    /// Nearest reference point farther than this (km) marks the candidate
    /// point as off-track.
    /// Default: 0.02 (20 m)
    pub off_track_threshold_km: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            search_window: 50,
            search_direction: SearchDirection::Symmetric,
            off_track_threshold_km: 0.02,
        }
    }
}

/// One candidate point in the reference distance frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignedPoint {
    /// Index in the candidate track
    pub idx: usize,
    pub lat: f64,
    pub lon: f64,
    /// Smoothed candidate speed, kph
    pub speed: f64,
    /// Reference cumulative distance at the closest reference point, km
    pub dist: f64,
    /// Candidate elapsed time since its first point
    pub micros: i64,
}

/// Raw result of aligning one track.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    pub points: Vec<AlignedPoint>,
    /// Points whose closest reference point was beyond the off-track threshold
    pub off_track_points: usize,
    /// Points that did not move the cursor (same distance as the previous point)
    pub duplicate_points: usize,
}

/// A track aligned to a reference, with the stats needed for comparison reports.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignedTrack {
    pub name: String,
    pub points: Vec<AlignedPoint>,
    pub subsecond_precision: bool,
    /// The candidate reached the reference finish
    pub is_finished: bool,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub off_track_points: usize,
}

impl AlignedTrack {
    /// Aligned distance of the last point, km.
    pub fn total_distance(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.dist)
    }

    /// Elapsed time of the last point in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.micros as f64 / 1_000_000.0)
    }
}

/// Search window `[lo, hi)` around the cursor.
fn search_bounds(cursor: usize, len: usize, config: &AlignmentConfig) -> (usize, usize) {
    let lo = match config.search_direction {
        SearchDirection::Symmetric => cursor.saturating_sub(config.search_window),
        SearchDirection::ForwardOnly => cursor,
    };
    let hi = cursor.saturating_add(config.search_window).min(len);
    (lo, hi)
}

/// Map every candidate point onto the reference distance frame.
///
/// One aligned point is produced per candidate point. A window of zero
/// degrades to searching only the cursor position.
pub fn align_distances(reference: &ReferenceTrack, track: &Track, config: &AlignmentConfig) -> AlignmentOutcome {
    let ref_points = reference.points();
    let ref_dist = reference.dist_from_start();

    let lat = track.lat();
    let lon = track.lon();
    let speed = track.speed();
    let micros = track.micros_from_start();

    let mut saved_ref_idx = 0usize;
    let mut off_track_points = 0usize;
    let mut duplicate_points = 0usize;
    let mut aligned = Vec::with_capacity(track.len());

    for (i, point) in track.points().iter().enumerate() {
        let (lo, hi) = search_bounds(saved_ref_idx, ref_points.len(), config);
        let hi = hi.max(saved_ref_idx + 1);

        let mut closest_idx = saved_ref_idx;
        let mut min_dist = f64::INFINITY;
        for (ref_idx, ref_point) in ref_points.iter().enumerate().take(hi).skip(lo) {
            let dist = haversine_distance(point, ref_point);
            if dist < min_dist {
                min_dist = dist;
                closest_idx = ref_idx;
            }
        }

        if min_dist > config.off_track_threshold_km {
            off_track_points += 1;
        }
        if i > 0 && closest_idx == saved_ref_idx {
            duplicate_points += 1;
        }
        saved_ref_idx = closest_idx;

        aligned.push(AlignedPoint {
            idx: i,
            lat: lat[i],
            lon: lon[i],
            speed: speed[i],
            dist: ref_dist[closest_idx],
            micros: micros[i],
        });
    }

    if off_track_points > 0 {
        warn!(
            "[Alignment] '{}': {} of {} points are off the reference track",
            track.name(),
            off_track_points,
            track.len()
        );
    }
    debug!(
        "[Alignment] '{}' aligned to '{}': {} duplicate distance points",
        track.name(),
        reference.name(),
        duplicate_points
    );

    AlignmentOutcome {
        points: aligned,
        off_track_points,
        duplicate_points,
    }
}

/// Align a track and package it with its comparison stats.
pub fn align_track(
    reference: &ReferenceTrack,
    track: &Track,
    is_finished: bool,
    config: &AlignmentConfig,
) -> AlignedTrack {
    let outcome = align_distances(reference, track, config);

    AlignedTrack {
        name: track.name().to_string(),
        points: outcome.points,
        subsecond_precision: track.subsecond_precision(),
        is_finished,
        max_speed: track.max_speed(),
        avg_speed: track.avg_speed(),
        start_time: track.start_time(),
        end_time: track.end_time(),
        off_track_points: outcome.off_track_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceConfig;
    use crate::track::TrackConfig;
    use crate::TrackPoint;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    /// Track along a line of latitudes, one point per `step_ms`.
    fn track_along(name: &str, lats: &[f64], lon: f64, step_ms: i64) -> Track {
        let points = lats
            .iter()
            .enumerate()
            .map(|(i, lat)| TrackPoint::new(t0() + TimeDelta::milliseconds(i as i64 * step_ms), *lat, lon))
            .collect();
        Track::new(name, points, &TrackConfig::default()).unwrap()
    }

    fn reference_line(n: usize) -> ReferenceTrack {
        let lats: Vec<f64> = (0..n).map(|i| 45.0 + i as f64 * 0.0001).collect();
        let track = track_along("reference", &lats, 7.0, 1000);
        ReferenceTrack::new(&track, &ReferenceConfig::default()).unwrap()
    }

    #[test]
    fn test_one_aligned_point_per_candidate_point() {
        let reference = reference_line(100);
        let lats: Vec<f64> = (0..300).map(|i| 45.0 + i as f64 * 0.00003).collect();
        let candidate = track_along("candidate", &lats, 7.00001, 100);

        let outcome = align_distances(&reference, &candidate, &AlignmentConfig::default());
        assert_eq!(outcome.points.len(), candidate.len());
        assert_eq!(outcome.off_track_points, 0);
        assert_eq!(outcome.points[0].dist, 0.0);
        assert_eq!(outcome.points[10].idx, 10);
        assert_eq!(outcome.points[10].micros, 1_000_000);
    }

    #[test]
    fn test_forward_motion_is_monotonic() {
        let reference = reference_line(200);
        // Denser than the reference, so consecutive points often share a reference point
        let lats: Vec<f64> = (0..600).map(|i| 45.0 + i as f64 * 0.00003).collect();
        let candidate = track_along("candidate", &lats, 7.00002, 100);

        for direction in [SearchDirection::Symmetric, SearchDirection::ForwardOnly] {
            let config = AlignmentConfig {
                search_direction: direction,
                ..AlignmentConfig::default()
            };
            let outcome = align_distances(&reference, &candidate, &config);
            assert!(outcome.points.windows(2).all(|w| w[0].dist <= w[1].dist));
            assert!(outcome.duplicate_points > 0);
        }
    }

    #[test]
    fn test_aligned_distance_matches_reference_frame() {
        let reference = reference_line(100);
        // Candidate point exactly on reference point 40
        let candidate = track_along("candidate", &[45.0, 45.0020, 45.0040], 7.0, 1000);

        let outcome = align_distances(&reference, &candidate, &AlignmentConfig::default());
        assert_eq!(outcome.points[2].dist, reference.dist_from_start()[40]);
    }

    #[test]
    fn test_window_limits_search() {
        let reference = reference_line(200);
        // Jumps straight to the far end of the reference
        let candidate = track_along("candidate", &[45.0, 45.0199], 7.0, 1000);

        let config = AlignmentConfig {
            search_window: 10,
            ..AlignmentConfig::default()
        };
        let outcome = align_distances(&reference, &candidate, &config);
        // Cursor can only reach index 9
        assert_eq!(outcome.points[1].dist, reference.dist_from_start()[9]);
        assert_eq!(outcome.off_track_points, 1);
    }

    #[test]
    fn test_reversal_handling_depends_on_direction() {
        let reference = reference_line(100);
        // Forward to reference point 30, then back to point 20
        let candidate = track_along("candidate", &[45.0, 45.0015, 45.0030, 45.0020], 7.0, 1000);

        let symmetric = align_distances(&reference, &candidate, &AlignmentConfig::default());
        assert_eq!(symmetric.points[3].dist, reference.dist_from_start()[20]);

        let forward = AlignmentConfig {
            search_direction: SearchDirection::ForwardOnly,
            ..AlignmentConfig::default()
        };
        let forward = align_distances(&reference, &candidate, &forward);
        // Cursor stays on point 30, value repeated
        assert_eq!(forward.points[3].dist, reference.dist_from_start()[30]);
        assert_eq!(forward.duplicate_points, 1);
    }

    #[test]
    fn test_align_track_carries_stats() {
        let reference = reference_line(100);
        let lats: Vec<f64> = (0..50).map(|i| 45.0 + i as f64 * 0.0002).collect();
        let candidate = track_along("run-2", &lats, 7.0, 1000);

        let aligned = align_track(&reference, &candidate, false, &AlignmentConfig::default());
        assert_eq!(aligned.name, "run-2");
        assert!(!aligned.is_finished);
        assert_eq!(aligned.max_speed, candidate.max_speed());
        assert_eq!(aligned.start_time, candidate.start_time());
        assert_eq!(aligned.duration_secs(), 49.0);
        assert!((aligned.total_distance() - reference.dist_from_start()[98]).abs() < 1e-12);
    }
}
