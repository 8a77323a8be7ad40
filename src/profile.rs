//! # Track Profile
//!
//! Splits a track into straights and turns from device-reported bearing.
//!
//! A sliding window of the last `window_size_min_points` bearings is
//! classified at every point. A window is straight when every bearing in it
//! stays within `straight_degrees_bounds` of the window's mean heading;
//! otherwise it is a turn, rotating in the direction from the first to the
//! last bearing. Consecutive points with the same classification form one
//! segment.

use std::collections::VecDeque;

use log::debug;

use crate::error::{Result, TrackError};
use crate::geo_utils::{bearing_diff, sign};
use crate::track::Track;

/// Configuration for profile building.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileConfig {
    /// Maximum deviation (degrees) from the mean heading for a straight.
    /// Default: 1.5
    pub straight_degrees_bounds: f64,
    /// Number of points in the sliding window.
    /// Default: 5
    pub window_size_min_points: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            straight_degrees_bounds: 1.5,
            window_size_min_points: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentKind {
    /// Heading held, mean bearing of the window that opened the segment
    Straight { bearing: f64 },
    /// Heading changing; 1.0 clockwise (right), -1.0 counter-clockwise (left)
    Turn { rotation: f64 },
}

impl SegmentKind {
    fn same_kind(&self, other: &SegmentKind) -> bool {
        matches!(
            (self, other),
            (SegmentKind::Straight { .. }, SegmentKind::Straight { .. })
                | (SegmentKind::Turn { .. }, SegmentKind::Turn { .. })
        )
    }
}

/// Points `[start_idx, end_idx]` of a track sharing one classification.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileSegment {
    pub start_idx: usize,
    pub end_idx: usize,
    pub kind: SegmentKind,
}

/// Circular mean of bearings in degrees, `[0, 360)`.
fn mean_bearing(bearings: &VecDeque<f64>) -> f64 {
    let (sin, cos) = bearings.iter().fold((0.0, 0.0), |(sin, cos), b| {
        let rad = b.to_radians();
        (sin + rad.sin(), cos + rad.cos())
    });
    let mean = sin.atan2(cos).to_degrees().rem_euclid(360.0);
    if mean >= 360.0 {
        0.0
    } else {
        mean
    }
}

fn classify(window: &VecDeque<f64>, config: &ProfileConfig) -> SegmentKind {
    let mean = mean_bearing(window);
    let straight = window
        .iter()
        .all(|b| bearing_diff(mean, *b).abs() < config.straight_degrees_bounds);

    match (window.front(), window.back()) {
        (Some(first), Some(last)) if !straight => SegmentKind::Turn {
            rotation: sign(bearing_diff(*first, *last)),
        },
        _ => SegmentKind::Straight { bearing: mean },
    }
}

/// Build the straight / turn profile of a track.
///
/// Segments are contiguous: the first starts at point 0, each one starts right
/// after the previous one ends, and the last ends at the final point.
///
/// # Errors
///
/// - [`TrackError::MissingBearing`] when any point lacks bearing
/// - [`TrackError::InvalidConfig`] for a zero window
pub fn build_track_profile(track: &Track, config: &ProfileConfig) -> Result<Vec<ProfileSegment>> {
    if config.window_size_min_points == 0 {
        return Err(TrackError::InvalidConfig {
            message: "profile window must hold at least one point".to_string(),
        });
    }
    if !track.has_bearing_data() {
        return Err(TrackError::MissingBearing {
            track: track.name().to_string(),
        });
    }

    let mut window = VecDeque::with_capacity(config.window_size_min_points + 1);
    let mut segments = Vec::new();
    let mut current: Option<(usize, SegmentKind)> = None;

    for (i, point) in track.points().iter().enumerate() {
        window.push_back(point.bearing.unwrap_or_default());
        if window.len() > config.window_size_min_points {
            window.pop_front();
        }

        let kind = classify(&window, config);
        current = match current {
            None => Some((i, kind)),
            Some((start, open)) if !open.same_kind(&kind) => {
                segments.push(ProfileSegment {
                    start_idx: start,
                    end_idx: i - 1,
                    kind: open,
                });
                Some((i, kind))
            }
            open => open,
        };
    }

    if let Some((start, kind)) = current {
        segments.push(ProfileSegment {
            start_idx: start,
            end_idx: track.len() - 1,
            kind,
        });
    }

    debug!(
        "[Profile] '{}': {} segments from {} points",
        track.name(),
        segments.len(),
        track.len()
    );
    Ok(segments)
}
