//! # Geographic Utilities
//!
//! Core geographic computation utilities for GPS track analysis.
//!
//! All distances in this crate are kilometers, matching the units used for
//! cumulative distance and speed (kph) everywhere else.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two track points (km) |
//! | [`bearing`] | Initial compass bearing from one point to another |
//! | [`bearing_diff`] | Signed minimal angle between two bearings |
//! | [`polyline_length`] | Total length of a point sequence (km) |
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use track_compare::{TrackPoint, geo_utils};
//!
//! let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let london = TrackPoint::new(t, 51.5074, -0.1278);
//! let paris = TrackPoint::new(t, 48.8566, 2.3522);
//!
//! let dist = geo_utils::haversine_distance(&london, &paris);
//! assert!((dist - 343.56).abs() < 5.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere with the mean Earth radius
//! (6371.0088 km), as implemented by [`geo::Haversine`]. Coordinates are WGS84
//! degrees.

use geo::{Bearing, Distance, Haversine, Point};
use crate::TrackPoint;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points in kilometers.
///
/// Symmetric, and zero for coincident points.
#[inline]
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    Haversine::distance(to_geo(p1), to_geo(p2)) / 1000.0
}

/// Calculate the total length of a point sequence in kilometers.
///
/// Empty or single-point sequences return 0.0.
pub fn polyline_length(points: &[TrackPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bearing Functions
// =============================================================================

/// Initial compass bearing in degrees `[0, 360)` from `from` to `to`.
///
/// For coincident points the value is whatever the great-circle formula yields
/// for a zero-length arc; it is stable for the same input.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use track_compare::{TrackPoint, geo_utils};
///
/// let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
/// let origin = TrackPoint::new(t, 0.0, 0.0);
/// let east = TrackPoint::new(t, 0.0, 1.0);
///
/// assert!((geo_utils::bearing(&origin, &east) - 90.0).abs() < 1e-6);
/// ```
#[inline]
pub fn bearing(from: &TrackPoint, to: &TrackPoint) -> f64 {
    let degrees = Haversine::bearing(to_geo(from), to_geo(to)).rem_euclid(360.0);
    // rem_euclid can round a tiny negative value up to exactly 360.0
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Signed minimal angular difference from `b1` to `b2`, in degrees.
///
/// Picks the smallest-magnitude candidate among the direct difference and the
/// two wrap-around paths across 0°/360°.
///
/// ```rust
/// use track_compare::geo_utils::bearing_diff;
///
/// assert_eq!(bearing_diff(350.0, 10.0), 20.0);
/// assert_eq!(bearing_diff(10.0, 350.0), -20.0);
/// assert_eq!(bearing_diff(90.0, 45.0), -45.0);
/// ```
pub fn bearing_diff(b1: f64, b2: f64) -> f64 {
    let direct = b2 - b1;
    [direct, direct + 360.0, direct - 360.0]
        .into_iter()
        .fold(direct, |best, candidate| {
            if candidate.abs() < best.abs() {
                candidate
            } else {
                best
            }
        })
}

/// Sign of a value as -1.0, 0.0 or 1.0 (zero stays zero, unlike `f64::signum`).
#[inline]
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[inline]
fn to_geo(p: &TrackPoint) -> Point {
    Point::new(p.lon, p.lat)
}

// =============================================================================
// Unit Tests
// =============================================================================
