//! # Track Comparison
//!
//! Picks the runs of a course out of raw recordings and aligns each of them
//! to a reference track.
//!
//! A recording may hold several runs (repeated laps, a stage driven twice) or
//! the drive to the start. Every activity segment that starts at the reference
//! start becomes one candidate, cropped at the reference finish when it gets
//! there.

use log::{debug, info, warn};

use crate::activity::{detect_activity_segments, ActivityConfig};
use crate::alignment::{align_track, AlignedTrack, AlignmentConfig};
use crate::geo_utils::haversine_distance;
use crate::reference::ReferenceTrack;
use crate::track::Track;
use crate::TrackPoint;

/// Configuration for comparing tracks against a reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonConfig {
    pub activity: ActivityConfig,
    pub alignment: AlignmentConfig,
    /// Maximum distance (km) between a segment start and the reference start,
    /// and between the finish crop point and the reference finish.
    /// Default: 0.02 (20 m)
    pub point_distance_threshold_km: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig::default(),
            alignment: AlignmentConfig::default(),
            point_distance_threshold_km: 0.02,
        }
    }
}

/// A candidate run cut out of a recording.
struct Candidate {
    track: Track,
    is_finished: bool,
}

/// Name of the n-th run (1-based) taken from one recording.
fn run_name(track_name: &str, run: usize) -> String {
    if run > 1 {
        format!("{}_#{}", track_name, run)
    } else {
        track_name.to_string()
    }
}

/// Crop a run at the reference finish, or keep it whole as unfinished.
///
/// The finish is looked up as an arrival, so a lap that starts inside the
/// finish zone is not cut at its own start.
fn crop_at_finish(from_start: Track, finish: &TrackPoint, threshold: f64) -> Candidate {
    let Some(finish_idx) = from_start.find_arrival_point_index(finish, threshold) else {
        debug!("[Compare] '{}' never reaches the finish", from_start.name());
        return Candidate {
            track: from_start,
            is_finished: false,
        };
    };

    match from_start.crop_to_point_idx(finish_idx) {
        Ok(track) => Candidate {
            track,
            is_finished: true,
        },
        Err(e) => {
            warn!(
                "[Compare] Cannot crop '{}' at the finish, keeping it unfinished: {}",
                from_start.name(),
                e
            );
            Candidate {
                track: from_start,
                is_finished: false,
            }
        }
    }
}

/// Cut every run that starts at the reference start out of `track`.
///
/// A segment that cannot be cropped is logged and skipped; the other runs of
/// the recording are kept.
fn select_runs(reference: &ReferenceTrack, track: &Track, config: &ComparisonConfig) -> Vec<Candidate> {
    let threshold = config.point_distance_threshold_km;
    let start = reference.start_point();
    let finish = reference.finish_point();

    let mut candidates = Vec::new();
    for segment in detect_activity_segments(track, &config.activity) {
        if haversine_distance(&segment.start_point, start) >= threshold {
            continue;
        }

        let name = run_name(track.name(), candidates.len() + 1);
        match track.crop_to_activity_segment_start(&segment, name) {
            Ok(from_start) => candidates.push(crop_at_finish(from_start, finish, threshold)),
            Err(e) => warn!(
                "[Compare] Skipping segment #{} of '{}': {}",
                segment.idx,
                track.name(),
                e
            ),
        }
    }

    candidates
}

/// Select and align the runs of one recording.
fn compare_track(reference: &ReferenceTrack, track: &Track, config: &ComparisonConfig) -> Vec<AlignedTrack> {
    select_runs(reference, track, config)
        .iter()
        .map(|c| align_track(reference, &c.track, c.is_finished, &config.alignment))
        .collect()
}

/// Align every run found in `tracks` to the reference.
///
/// Runs are returned in input order, runs of one recording in time order.
/// Segments that fail to crop are logged and skipped; they never abort the
/// whole comparison. Runs that never arrive at the finish are aligned in full
/// and marked unfinished.
pub fn compare_tracks(reference: &ReferenceTrack, tracks: &[Track], config: &ComparisonConfig) -> Vec<AlignedTrack> {
    let aligned: Vec<AlignedTrack> = tracks
        .iter()
        .flat_map(|track| compare_track(reference, track, config))
        .collect();

    info!(
        "[Compare] Found {} runs in {} tracks against '{}'",
        aligned.len(),
        tracks.len(),
        reference.name()
    );
    aligned
}

/// Parallel version of [`compare_tracks`], same output order.
///
/// The reference is shared read-only across rayon workers.
#[cfg(feature = "parallel")]
pub fn compare_tracks_parallel(
    reference: &ReferenceTrack,
    tracks: &[Track],
    config: &ComparisonConfig,
) -> Vec<AlignedTrack> {
    use rayon::prelude::*;

    let aligned: Vec<AlignedTrack> = tracks
        .par_iter()
        .flat_map_iter(|track| compare_track(reference, track, config))
        .collect();

    info!(
        "[Compare] Found {} runs in {} tracks against '{}' (parallel)",
        aligned.len(),
        tracks.len(),
        reference.name()
    );
    aligned
}
