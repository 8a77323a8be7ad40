//! # Activity Segment Detection
//!
//! Splits a track into activity segments: stretches of sustained motion
//! bounded by pauses longer than an allowed threshold. A stage run recorded
//! together with the drive to the start line and the wait at the control
//! produces one segment per actual run.
//!
//! ## Algorithm
//!
//! A single left-to-right scan drives a small state machine:
//!
//! | State | Still point | Moving point |
//! |-------|-------------|--------------|
//! | `Searching` | slide start to this point | become `Active` |
//! | `Active` | record end candidate | stay |
//! | `ActiveWithEndCandidate` | close segment if pause exceeded | drop candidate, `Active` |
//!
//! A point is "moving" when its distance from the previous point (or its
//! smoothed speed, see [`ActivitySeries`]) reaches the configured epsilon.
//! Closed segments shorter than the minimum duration are discarded.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

use crate::geo_utils::haversine_distance;
use crate::track::Track;
use crate::{micros_between, TrackPoint};

/// Which per-point series decides whether a point is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivitySeries {
    /// Distance from the previous point against `distance_eps` (km)
    Distance,
    /// Smoothed speed against `speed_eps` (kph)
    Speed,
}

/// How a segment start is adjusted once motion is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StartAlignment {
    /// Keep the last still point before motion
    None,
    /// Walk back while speed keeps decreasing towards a nonzero minimum
    MinimalSpeed,
    /// Walk back to the first point of the same wall-clock minute (rally stages)
    MinuteStart,
}

/// Configuration for activity detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivityConfig {
    /// Series compared against the epsilon.
    /// Default: Distance
    pub series: ActivitySeries,
    /// Movement threshold for the distance series (km).
    /// Default: 0.00005 (5 cm)
    pub distance_eps: f64,
    /// Movement threshold for the speed series (kph).
    /// Default: 2.0
    pub speed_eps: f64,
    /// Longest stop (seconds) that does not end a segment.
    /// Default: 5.0
    pub segment_max_allow_pause: f64,
    /// Shortest segment (seconds) that is reported.
    /// Default: 100.0
    pub segment_min_duration: f64,
    /// Default: None
    pub start_alignment: StartAlignment,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            series: ActivitySeries::Distance,
            distance_eps: 0.00005,
            speed_eps: 2.0,
            segment_max_allow_pause: 5.0,
            segment_min_duration: 100.0,
            start_alignment: StartAlignment::None,
        }
    }
}

/// A period of sustained motion: points `start_idx..=end_idx` of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySegment {
    /// Ordinal among the segments of one track, from 0
    pub idx: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_point: TrackPoint,
    pub end_point: TrackPoint,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: TimeDelta,
}

impl ActivitySegment {
    /// Duration in seconds, including the fractional part.
    pub fn duration_secs(&self) -> f64 {
        micros_between(self.end_time, self.start_time) as f64 / 1_000_000.0
    }
}

/// Scan state between points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No motion yet. `start` is the latest still point, the candidate start.
    Searching { start: Option<usize> },
    /// Motion observed since `start`.
    Active { start: usize },
    /// Motion observed, then a stop beginning at `end_candidate`.
    ActiveWithEndCandidate { start: usize, end_candidate: usize },
}

struct ActivityScanner<'a> {
    track: &'a Track,
    config: &'a ActivityConfig,
    series: &'a [f64],
    eps: f64,
    state: ScanState,
    /// Segment starts never move back past this index
    floor: usize,
    segments: Vec<ActivitySegment>,
}

impl<'a> ActivityScanner<'a> {
    fn new(track: &'a Track, config: &'a ActivityConfig) -> Self {
        let (series, eps) = match config.series {
            ActivitySeries::Distance => (track.dist(), config.distance_eps),
            ActivitySeries::Speed => (track.speed(), config.speed_eps),
        };

        Self {
            track,
            config,
            series,
            eps,
            state: ScanState::Searching { start: None },
            floor: 0,
            segments: Vec::new(),
        }
    }

    fn step(&mut self, i: usize) {
        let moving = self.series[i] >= self.eps;
        let state = self.state;

        self.state = match state {
            ScanState::Searching { start: None } => ScanState::Searching { start: Some(i) },
            ScanState::Searching { start: Some(_) } if !moving => ScanState::Searching { start: Some(i) },
            ScanState::Searching { start: Some(start) } => ScanState::Active {
                start: self.align_start(start),
            },
            ScanState::Active { start } if !moving => ScanState::ActiveWithEndCandidate {
                start,
                end_candidate: i,
            },
            ScanState::Active { start } => ScanState::Active { start },
            ScanState::ActiveWithEndCandidate { start, end_candidate } if !moving => {
                if self.pause_secs(end_candidate, i) > self.config.segment_max_allow_pause {
                    self.try_add_segment(start, end_candidate);
                    self.floor = i + 1;
                    ScanState::Searching { start: None }
                } else {
                    ScanState::ActiveWithEndCandidate { start, end_candidate }
                }
            }
            ScanState::ActiveWithEndCandidate { start, .. } => ScanState::Active { start },
        };
    }

    fn finish(mut self) -> Vec<ActivitySegment> {
        let last = self.track.len() - 1;
        match self.state {
            ScanState::Active { start } => self.try_add_segment(start, last),
            ScanState::ActiveWithEndCandidate { start, end_candidate } => {
                self.try_add_segment(start, end_candidate)
            }
            // Never moved: nothing to close
            ScanState::Searching { .. } => {}
        }
        self.segments
    }

    fn pause_secs(&self, from: usize, to: usize) -> f64 {
        let time = self.track.time();
        micros_between(time[to], time[from]) as f64 / 1_000_000.0
    }

    fn try_add_segment(&mut self, start_idx: usize, end_idx: usize) {
        let points = self.track.points();
        let start_point = points[start_idx];
        let end_point = points[end_idx];

        let segment = ActivitySegment {
            idx: self.segments.len(),
            start_idx,
            end_idx,
            start_point,
            end_point,
            start_time: start_point.time,
            end_time: end_point.time,
            duration: end_point.time - start_point.time,
        };

        if segment.duration_secs() >= self.config.segment_min_duration {
            debug!(
                "[Activity] Segment #{} in '{}': points {}..={}, {:.1}s",
                segment.idx,
                self.track.name(),
                start_idx,
                end_idx,
                segment.duration_secs()
            );
            self.segments.push(segment);
        } else {
            debug!(
                "[Activity] Dropped short segment {}..={} in '{}' ({:.1}s)",
                start_idx,
                end_idx,
                self.track.name(),
                segment.duration_secs()
            );
        }
    }

    fn align_start(&self, start: usize) -> usize {
        let mut start = start;
        match self.config.start_alignment {
            StartAlignment::None => {}
            StartAlignment::MinimalSpeed => {
                let speed = self.track.speed();
                while start > self.floor && 0.0 < speed[start - 1] && speed[start - 1] < speed[start] {
                    start -= 1;
                }
            }
            StartAlignment::MinuteStart => {
                let time = self.track.time();
                let minute = time[start].timestamp().div_euclid(60);
                while start > self.floor && time[start - 1].timestamp().div_euclid(60) == minute {
                    start -= 1;
                }
            }
        }
        start
    }
}

/// Detect activity segments in a track.
///
/// Segments are returned in increasing start order, numbered from 0.
///
/// ```rust
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use track_compare::{detect_activity_segments, ActivityConfig, Track, TrackConfig, TrackPoint};
///
/// let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
/// // 150 s of driving north, then 30 s parked
/// let points: Vec<TrackPoint> = (0..180)
///     .map(|i| {
///         let lat = 45.0 + (i.min(150) as f64) * 0.0001;
///         TrackPoint::new(start + TimeDelta::seconds(i), lat, 7.0)
///     })
///     .collect();
///
/// let track = Track::new("drive", points, &TrackConfig::default()).unwrap();
/// let segments = detect_activity_segments(&track, &ActivityConfig::default());
///
/// assert_eq!(segments.len(), 1);
/// assert_eq!(segments[0].start_idx, 0);
/// assert_eq!(segments[0].end_idx, 151);
/// ```
pub fn detect_activity_segments(track: &Track, config: &ActivityConfig) -> Vec<ActivitySegment> {
    let mut scanner = ActivityScanner::new(track, config);
    for i in 0..track.len() {
        scanner.step(i);
    }
    let segments = scanner.finish();

    debug!(
        "[Activity] Found {} segments in '{}'",
        segments.len(),
        track.name()
    );
    segments
}

/// Find the start location shared by the most activity segments.
///
/// Every distinct start becomes a candidate; each start counts towards every
/// candidate within `radius_km`. Returns the winning candidate and its count,
/// the earliest candidate on ties.
pub fn find_common_start(starts: &[TrackPoint], radius_km: f64) -> Option<(TrackPoint, usize)> {
    let mut candidates: Vec<(TrackPoint, usize)> = Vec::new();

    for start in starts {
        if !candidates
            .iter()
            .any(|(c, _)| c.lat == start.lat && c.lon == start.lon)
        {
            candidates.push((*start, 0));
        }

        for (candidate, count) in candidates.iter_mut() {
            if haversine_distance(start, candidate) < radius_km {
                *count += 1;
            }
        }
    }

    candidates
        .into_iter()
        .fold(None, |best: Option<(TrackPoint, usize)>, (candidate, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((candidate, count)),
        })
}
