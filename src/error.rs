//! Unified error handling for track construction and analysis.
//!
//! Every failure the core can produce is a deterministic function of the input
//! points, so errors carry enough context to point at the offending data.
//! Alignment never fails: poor alignment is reported through counters instead.

use std::fmt;

/// Unified error type for track operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    /// Track has no points
    EmptyTrack,
    /// First and last point share the same timestamp, average speed is undefined
    ZeroDuration { point_count: usize },
    /// Point timestamp is earlier than the one before it
    NonMonotonicTime { index: usize },
    /// Latitude or longitude is not finite or outside WGS84 bounds
    InvalidCoordinates { index: usize, lat: f64, lon: f64 },
    /// Run of points sharing one second without subsecond data is too long to spread
    SubsecondGroupTooLarge { second: i64, size: usize },
    /// Timestamp could not be rebuilt with the requested subsecond value
    InvalidTimestamp { index: usize, micros: u32 },
    /// Point index is outside of the track
    IndexOutOfRange { index: usize, len: usize },
    /// Operation needs bearing on every point
    MissingBearing { track: String },
    /// Configuration error
    InvalidConfig { message: String },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::EmptyTrack => write!(f, "Track has no points"),
            TrackError::ZeroDuration { point_count } => {
                write!(f, "Track of {} points has zero duration", point_count)
            }
            TrackError::NonMonotonicTime { index } => {
                write!(f, "Point {} is earlier than the previous point", index)
            }
            TrackError::InvalidCoordinates { index, lat, lon } => {
                write!(f, "Point {} has invalid coordinates ({}, {})", index, lat, lon)
            }
            TrackError::SubsecondGroupTooLarge { second, size } => {
                write!(
                    f,
                    "{} points share second {} without subsecond precision, at most 10 supported",
                    size, second
                )
            }
            TrackError::InvalidTimestamp { index, micros } => {
                write!(f, "Cannot set {} microseconds on point {}", micros, index)
            }
            TrackError::IndexOutOfRange { index, len } => {
                write!(f, "Point index {} is out of range for track of {} points", index, len)
            }
            TrackError::MissingBearing { track } => {
                write!(f, "Track '{}' has points without bearing data", track)
            }
            TrackError::InvalidConfig { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackError {}

/// Result type alias for track operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an index out of range error.
    fn ok_or_out_of_range(self, index: usize, len: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_out_of_range(self, index: usize, len: usize) -> Result<T> {
        self.ok_or(TrackError::IndexOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::SubsecondGroupTooLarge { second: 42, size: 12 };
        assert!(err.to_string().contains("12 points"));
        assert!(err.to_string().contains("second 42"));

        let err = TrackError::MissingBearing { track: "lap-3".to_string() };
        assert!(err.to_string().contains("lap-3"));
    }

    #[test]
    fn test_option_ext() {
        let points = [1, 2, 3];
        let result = points.get(5).ok_or_out_of_range(5, points.len());
        assert_eq!(result, Err(TrackError::IndexOutOfRange { index: 5, len: 3 }));
        assert_eq!(points.get(1).ok_or_out_of_range(1, 3), Ok(&2));
    }
}
