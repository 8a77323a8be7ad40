//! # Track Compare
//!
//! GPS telemetry cleanup, activity segmentation and track alignment for
//! comparing runs over the same course (lap timers, rally special stages).
//!
//! This library provides:
//! - Repair of broken subsecond timestamp precision
//! - Per-point distance, elapsed time and smoothed speed
//! - Detection of activity segments (sustained motion between pauses)
//! - Alignment of candidate tracks onto a sparse reference track
//!
//! Parsing GPX / vendor CSV files and rendering reports are left to the caller:
//! the crate consumes [`TrackPoint`] sequences and produces plain data.
//!
//! ## Features
//!
//! - **`parallel`** - Align many tracks concurrently with rayon
//! - **`serde`** - Serialize configs and results for report generation
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use track_compare::{
//!     align_track, AlignmentConfig, ReferenceConfig, ReferenceTrack, Track, TrackConfig,
//!     TrackPoint,
//! };
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let points: Vec<TrackPoint> = (0..120)
//!     .map(|i| {
//!         TrackPoint::new(start + TimeDelta::seconds(i), 45.0 + i as f64 * 0.0002, 7.0)
//!             .with_speed(22.0)
//!     })
//!     .collect();
//!
//! let track = Track::new("lap-1", points, &TrackConfig::default()).unwrap();
//! let reference = ReferenceTrack::new(&track, &ReferenceConfig::default()).unwrap();
//!
//! let aligned = align_track(&reference, &track, true, &AlignmentConfig::default());
//! assert_eq!(aligned.points.len(), track.len());
//! println!("{:.2} km, max {:.1} kph", track.total_distance(), track.max_speed());
//! ```

use chrono::{DateTime, Utc};

pub mod error;
pub use error::{Result, TrackError};

pub mod geo_utils;

// Timestamp precision repair
pub mod repair;
pub use repair::{fix_leading_zero_millis, repair_points, restore_subsecond_precision};

pub mod normalization;
pub use normalization::NormalizationConfig;

pub mod stats;
pub use stats::{SeriesStats, TrackStats};

pub mod speed;
pub use speed::SpeedConfig;

pub mod track;
pub use track::{Track, TrackConfig};

// Activity segment detection
pub mod activity;
pub use activity::{
    detect_activity_segments, find_common_start, ActivityConfig, ActivitySegment,
    ActivitySeries, StartAlignment,
};

pub mod reference;
pub use reference::{build_sparse_points, ReferenceConfig, ReferenceTrack};

// Alignment against a reference track
pub mod alignment;
pub use alignment::{
    align_distances, align_track, AlignedPoint, AlignedTrack, AlignmentConfig,
    AlignmentOutcome, SearchDirection,
};

pub mod comparison;
pub use comparison::{compare_tracks, ComparisonConfig};
#[cfg(feature = "parallel")]
pub use comparison::compare_tracks_parallel;

pub mod profile;
pub use profile::{build_track_profile, ProfileConfig, ProfileSegment, SegmentKind};

// ============================================================================
// Core Types
// ============================================================================

/// One GPS fix.
///
/// Speed is in meters per second, bearing in degrees `[0, 360)`. Both are
/// optional because several recorders omit them.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use track_compare::TrackPoint;
///
/// let time = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
/// let point = TrackPoint::new(time, 51.5074, -0.1278).with_speed(12.5);
/// assert_eq!(point.speed, Some(12.5));
/// assert!(point.bearing.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Meters
    pub altitude: f64,
    /// Device-reported speed in m/s
    pub speed: Option<f64>,
    /// Device-reported heading in degrees
    pub bearing: Option<f64>,
}

impl TrackPoint {
    /// Create a point with zero altitude and no speed or bearing.
    pub fn new(time: DateTime<Utc>, lat: f64, lon: f64) -> Self {
        Self {
            time,
            lat,
            lon,
            altitude: 0.0,
            speed: None,
            bearing: None,
        }
    }

    pub fn with_altitude(self, altitude: f64) -> Self {
        Self { altitude, ..self }
    }

    pub fn with_speed(self, speed: f64) -> Self {
        Self { speed: Some(speed), ..self }
    }

    pub fn with_bearing(self, bearing: f64) -> Self {
        Self { bearing: Some(bearing), ..self }
    }

    /// Copy of this point recorded at another time.
    pub fn with_time(self, time: DateTime<Utc>) -> Self {
        Self { time, ..self }
    }

    /// Microsecond component of the timestamp.
    #[inline]
    pub fn micros(&self) -> u32 {
        self.time.timestamp_subsec_micros()
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lon >= -180.0
            && self.lon <= 180.0
    }
}

/// Signed microseconds from `earlier` to `later`.
pub(crate) fn micros_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_microseconds().unwrap_or(i64::MAX)
}
