//! # Speed Calculation
//!
//! Smoothed per-point speed in kph. Two strategies share one smoothing window:
//!
//! - **Device speed**: the receiver's own Doppler speed, converted from m/s.
//!   Much more accurate than anything derived from positions.
//! - **Distance derived**: point-to-point distance over time delta. Fallback
//!   for tracks where any point lacks device speed.
//!
//! The window is a trailing moving average that skips zero samples, so a
//! single dropped sample does not pull the curve down.

use std::collections::VecDeque;

use log::debug;

use crate::error::{Result, TrackError};
use crate::geo_utils::haversine_distance;
use crate::{micros_between, TrackPoint};

const MPS_TO_KPH: f64 = 3.6;
const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Configuration for speed calculation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedConfig {
    /// Prefer device-reported speed when every point carries it.
    /// Default: true
    pub use_provided_speed: bool,
    /// Smoothing window for 1 Hz tracks (no subsecond precision).
    /// Default: 1
    pub smoothing_1hz: usize,
    /// Smoothing window for 10 Hz and faster tracks.
    /// Default: 3
    pub smoothing_10hz: usize,
    /// Window used regardless of sampling rate when set.
    pub window_override: Option<usize>,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            use_provided_speed: true,
            smoothing_1hz: 1,
            smoothing_10hz: 3,
            window_override: None,
        }
    }
}

impl SpeedConfig {
    /// Window size for a track with or without subsecond precision.
    pub fn window_size(&self, subsecond_precision: bool) -> usize {
        match self.window_override {
            Some(window) => window,
            None if subsecond_precision => self.smoothing_10hz,
            None => self.smoothing_1hz,
        }
    }
}

/// Trailing moving average over the last `size` samples, ignoring zeros.
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    size: usize,
    samples: VecDeque<f64>,
}

impl SpeedWindow {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(TrackError::InvalidConfig {
                message: "speed smoothing window must be at least 1".to_string(),
            });
        }
        Ok(Self {
            size,
            samples: VecDeque::with_capacity(size + 1),
        })
    }

    /// Add a sample and return the current average of the nonzero samples.
    pub fn push(&mut self, sample: f64) -> f64 {
        self.samples.push_back(sample);
        if self.samples.len() > self.size {
            self.samples.pop_front();
        }

        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| **s != 0.0)
            .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Smoothed speed from device-reported values. Points without speed count as zero.
pub fn speed_from_device(points: &[TrackPoint], window_size: usize) -> Result<Vec<f64>> {
    let mut window = SpeedWindow::new(window_size)?;
    Ok(points
        .iter()
        .map(|p| window.push(p.speed.unwrap_or(0.0) * MPS_TO_KPH))
        .collect())
}

/// Smoothed speed derived from distance and time between consecutive points.
pub fn speed_from_distance(points: &[TrackPoint], window_size: usize) -> Result<Vec<f64>> {
    let mut window = SpeedWindow::new(window_size)?;
    let Some(mut prev) = points.first() else {
        return Ok(Vec::new());
    };

    let mut speed = Vec::with_capacity(points.len());
    for point in points {
        let delta_micros = micros_between(point.time, prev.time);
        let instant = if delta_micros == 0 {
            0.0
        } else {
            haversine_distance(prev, point) / delta_micros as f64 * MICROS_PER_HOUR
        };
        speed.push(window.push(instant));
        prev = point;
    }

    Ok(speed)
}

/// True when every point carries device speed.
pub fn has_speed_data(points: &[TrackPoint]) -> bool {
    points.iter().all(|p| p.speed.is_some())
}

/// Compute the smoothed speed series for a track, one value per point.
///
/// Device speed is used when the config prefers it and every point has it;
/// otherwise speed is derived from distance. The choice is made once for the
/// whole track.
pub fn calculate_speed(
    points: &[TrackPoint],
    subsecond_precision: bool,
    config: &SpeedConfig,
) -> Result<Vec<f64>> {
    let window = config.window_size(subsecond_precision);

    if config.use_provided_speed && has_speed_data(points) {
        debug!("[Speed] Using device speed, window {}", window);
        speed_from_device(points, window)
    } else {
        debug!("[Speed] Deriving speed from distance, window {}", window);
        speed_from_distance(points, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn points_with_speed(speeds: &[Option<f64>]) -> Vec<TrackPoint> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        speeds
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let p = TrackPoint::new(start + TimeDelta::seconds(i as i64), 45.0 + i as f64 * 0.0001, 7.0);
                match s {
                    Some(v) => p.with_speed(*v),
                    None => p,
                }
            })
            .collect()
    }

    #[test]
    fn test_window_excludes_zeros() {
        let mut window = SpeedWindow::new(3).unwrap();
        assert_eq!(window.push(0.0), 0.0);
        assert_eq!(window.push(0.0), 0.0);
        assert_eq!(window.push(36.0), 36.0);
    }

    #[test]
    fn test_window_is_trailing() {
        let mut window = SpeedWindow::new(2).unwrap();
        assert_eq!(window.push(10.0), 10.0);
        assert_eq!(window.push(20.0), 15.0);
        assert_eq!(window.push(40.0), 30.0);
        assert_eq!(window.push(0.0), 40.0);
        assert_eq!(window.push(0.0), 0.0);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(SpeedWindow::new(0), Err(TrackError::InvalidConfig { .. })));
    }

    #[test]
    fn test_device_speed_converted_to_kph() {
        let points = points_with_speed(&[Some(0.0), Some(0.0), Some(10.0)]);
        let speed = speed_from_device(&points, 3).unwrap();
        assert_eq!(speed.len(), 3);
        assert_eq!(speed[0], 0.0);
        assert!(approx_eq(speed[2], 36.0, 1e-9));
    }

    #[test]
    fn test_distance_speed() {
        // 0.0001 deg latitude per second is about 11.12 m/s, 40.03 kph
        let points = points_with_speed(&[None, None, None]);
        let speed = speed_from_distance(&points, 1).unwrap();
        assert_eq!(speed[0], 0.0);
        assert!(approx_eq(speed[1], 40.03, 0.05));
        assert!(approx_eq(speed[2], 40.03, 0.05));
    }

    #[test]
    fn test_distance_speed_zero_time_delta() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let points = vec![
            TrackPoint::new(start, 45.0, 7.0),
            TrackPoint::new(start, 45.001, 7.0),
        ];
        assert_eq!(speed_from_distance(&points, 1).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fallback_when_any_point_lacks_speed() {
        let points = points_with_speed(&[Some(50.0), None, Some(50.0)]);
        let speed = calculate_speed(&points, false, &SpeedConfig::default()).unwrap();
        // Derived from distance, not the 180 kph device value
        assert!(approx_eq(speed[2], 40.03, 0.05));
    }

    #[test]
    fn test_device_speed_can_be_disabled() {
        let points = points_with_speed(&[Some(50.0), Some(50.0), Some(50.0)]);
        let config = SpeedConfig {
            use_provided_speed: false,
            ..SpeedConfig::default()
        };
        let speed = calculate_speed(&points, false, &config).unwrap();
        assert!(approx_eq(speed[1], 40.03, 0.05));

        let speed = calculate_speed(&points, false, &SpeedConfig::default()).unwrap();
        assert!(approx_eq(speed[1], 180.0, 1e-9));
    }

    #[test]
    fn test_window_size_selection() {
        let config = SpeedConfig::default();
        assert_eq!(config.window_size(false), 1);
        assert_eq!(config.window_size(true), 3);

        let config = SpeedConfig {
            window_override: Some(5),
            ..SpeedConfig::default()
        };
        assert_eq!(config.window_size(false), 5);
        assert_eq!(config.window_size(true), 5);
    }
}
