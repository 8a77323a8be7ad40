//! # Timestamp Precision Repair
//!
//! Lap timers and phone apps write subsecond timestamps in a few broken ways.
//! Speed derivation divides by time deltas, so these defects must be fixed
//! before any statistics are computed.
//!
//! Two passes, always run in this order by [`repair_points`]:
//!
//! 1. [`fix_leading_zero_millis`] - some recorders (Harry's Lap Timer) write the
//!    decisecond digit as if it were padded microseconds: `.05` instead of `.5`.
//! 2. [`restore_subsecond_precision`] - 10 Hz receivers exported with whole-second
//!    timestamps produce runs of points sharing one second. The points inside
//!    such a run get evenly spaced decisecond offsets.
//!
//! Both passes return new point vectors and leave the input untouched.

use chrono::Timelike;
use log::{debug, info};

use crate::error::{Result, TrackError};
use crate::TrackPoint;

/// Microseconds in one decisecond slot.
const SLOT_MICROS: u32 = 100_000;

/// Number of decisecond slots in one second. Also the largest run that can be spread.
const SLOTS_PER_SECOND: usize = 10;

/// Run both repair passes.
///
/// ```rust
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use track_compare::{repair_points, TrackPoint};
///
/// let second = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
/// let points = vec![
///     TrackPoint::new(second, 45.0, 7.0),
///     TrackPoint::new(second, 45.0001, 7.0),
///     TrackPoint::new(second + TimeDelta::seconds(1), 45.0002, 7.0),
/// ];
///
/// let repaired = repair_points(&points).unwrap();
/// assert_eq!(repaired[0].micros(), 800_000);
/// assert_eq!(repaired[1].micros(), 900_000);
/// assert_eq!(repaired[2].micros(), 0);
/// ```
pub fn repair_points(points: &[TrackPoint]) -> Result<Vec<TrackPoint>> {
    let fixed = fix_leading_zero_millis(points)?;
    restore_subsecond_precision(&fixed)
}

/// Scale microseconds up when the track never reaches a full decisecond value.
///
/// The decision is made for the whole sequence: if any point has a nonzero
/// microsecond component and none has 100 000 or more, every point is
/// multiplied by the smallest power of ten that lifts the largest value to at
/// least 100 000. For millisecond values written without their leading zero
/// (`"…:05.05"` for 500 ms) that factor is 10. Otherwise the points are
/// returned unchanged, so a second pass never scales again.
pub fn fix_leading_zero_millis(points: &[TrackPoint]) -> Result<Vec<TrackPoint>> {
    let max_micros = points.iter().map(TrackPoint::micros).max().unwrap_or(0);

    if max_micros == 0 || max_micros >= SLOT_MICROS {
        return Ok(points.to_vec());
    }

    let mut factor = 10;
    while max_micros * factor < SLOT_MICROS {
        factor *= 10;
    }

    info!(
        "[Repair] Track of {} points has leading-zero millisecond format, scaling subseconds by {}",
        points.len(),
        factor
    );

    points
        .iter()
        .enumerate()
        .map(|(i, p)| with_micros(p, i, p.micros() * factor))
        .collect()
}

/// Spread runs of points sharing one whole second over decisecond slots.
///
/// A run of consecutive points with the same integer second, more than one
/// point long and without any subsecond data, receives offsets of
/// `slot * 100 000` microseconds. Slots start at 0, except for the first run of
/// the track which is assumed to be the tail of a second and starts at
/// `10 - run length`.
///
/// # Errors
///
/// [`TrackError::SubsecondGroupTooLarge`] when such a run has more than 10 points.
pub fn restore_subsecond_precision(points: &[TrackPoint]) -> Result<Vec<TrackPoint>> {
    let mut repaired = Vec::with_capacity(points.len());
    let mut restored_groups = 0usize;
    let mut group_start = 0;

    while group_start < points.len() {
        let second = points[group_start].time.timestamp();
        let group_end = points[group_start..]
            .iter()
            .position(|p| p.time.timestamp() != second)
            .map_or(points.len(), |offset| group_start + offset);
        let group = &points[group_start..group_end];

        if group.len() > 1 && group.iter().all(|p| p.micros() == 0) {
            if group.len() > SLOTS_PER_SECOND {
                return Err(TrackError::SubsecondGroupTooLarge {
                    second,
                    size: group.len(),
                });
            }

            let first_slot = if group_start == 0 {
                SLOTS_PER_SECOND - group.len()
            } else {
                0
            };

            for (k, p) in group.iter().enumerate() {
                let micros = (first_slot + k) as u32 * SLOT_MICROS;
                repaired.push(with_micros(p, group_start + k, micros)?);
            }
            restored_groups += 1;
        } else {
            repaired.extend_from_slice(group);
        }

        group_start = group_end;
    }

    if restored_groups > 0 {
        info!("[Repair] Restored subsecond precision in {} groups", restored_groups);
    } else {
        debug!("[Repair] No groups needed subsecond restoration");
    }

    Ok(repaired)
}

fn with_micros(point: &TrackPoint, index: usize, micros: u32) -> Result<TrackPoint> {
    point
        .time
        .with_nanosecond(micros * 1_000)
        .map(|time| point.with_time(time))
        .ok_or(TrackError::InvalidTimestamp { index, micros })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 10).unwrap()
    }

    fn at(seconds: i64, micros: i64) -> TrackPoint {
        let time = base() + TimeDelta::seconds(seconds) + TimeDelta::microseconds(micros);
        TrackPoint::new(time, 45.0 + seconds as f64 * 0.0001, 7.0)
    }

    fn micros(points: &[TrackPoint]) -> Vec<u32> {
        points.iter().map(|p| p.micros()).collect()
    }

    #[test]
    fn test_leading_zero_fix_scales_all_points() {
        let points = vec![at(0, 50_000), at(1, 0), at(2, 30_000)];
        let fixed = fix_leading_zero_millis(&points).unwrap();
        assert_eq!(micros(&fixed), vec![500_000, 0, 300_000]);
        // Whole seconds untouched
        assert_eq!(fixed[1].time, points[1].time);
        assert_eq!(fixed[2].time.timestamp(), points[2].time.timestamp());
    }

    #[test]
    fn test_leading_zero_fix_leaves_full_fractions() {
        let points = vec![at(0, 50_000), at(0, 150_000), at(1, 30_000)];
        let fixed = fix_leading_zero_millis(&points).unwrap();
        assert_eq!(fixed, points);
    }

    #[test]
    fn test_leading_zero_fix_ignores_whole_seconds() {
        let points = vec![at(0, 0), at(1, 0), at(2, 0)];
        assert_eq!(fix_leading_zero_millis(&points).unwrap(), points);
    }

    #[test]
    fn test_first_group_is_tail_of_second() {
        let points = vec![at(0, 0), at(0, 0), at(0, 0), at(1, 0)];
        let restored = restore_subsecond_precision(&points).unwrap();
        assert_eq!(micros(&restored), vec![700_000, 800_000, 900_000, 0]);
    }

    #[test]
    fn test_later_groups_start_at_zero() {
        let points = vec![
            at(0, 0),
            at(1, 0),
            at(1, 0),
            at(1, 0),
            at(1, 0),
            at(2, 0),
        ];
        let restored = restore_subsecond_precision(&points).unwrap();
        assert_eq!(
            micros(&restored),
            vec![0, 0, 100_000, 200_000, 300_000, 0]
        );
        assert!(restored.iter().zip(&points).all(|(r, p)| r.time.timestamp() == p.time.timestamp()));
    }

    #[test]
    fn test_groups_with_precision_pass_through() {
        let points = vec![at(0, 0), at(0, 500_000), at(1, 0), at(1, 0)];
        let restored = restore_subsecond_precision(&points).unwrap();
        assert_eq!(micros(&restored), vec![0, 500_000, 0, 100_000]);
    }

    #[test]
    fn test_full_first_group() {
        let points: Vec<TrackPoint> = (0..10).map(|_| at(0, 0)).collect();
        let restored = restore_subsecond_precision(&points).unwrap();
        let expected: Vec<u32> = (0..10).map(|k| k * 100_000).collect();
        assert_eq!(micros(&restored), expected);
    }

    #[test]
    fn test_oversized_group_fails() {
        let mut points = vec![at(0, 0)];
        points.extend((0..11).map(|_| at(1, 0)));
        let err = restore_subsecond_precision(&points).unwrap_err();
        assert_eq!(
            err,
            TrackError::SubsecondGroupTooLarge {
                second: base().timestamp() + 1,
                size: 11
            }
        );
    }

    #[test]
    fn test_repair_is_idempotent() {
        let inputs = vec![
            vec![at(0, 50_000), at(1, 0), at(2, 30_000)],
            vec![at(0, 0), at(0, 0), at(0, 0), at(1, 0), at(1, 0), at(2, 0)],
            vec![at(0, 0), at(1, 0), at(2, 0)],
            vec![at(0, 100_000), at(0, 200_000), at(1, 0), at(1, 0)],
            vec![at(0, 5_000), at(1, 0), at(2, 3_000)],
            vec![at(0, 0), at(0, 7), at(1, 0)],
        ];

        for points in inputs {
            let once = repair_points(&points).unwrap();
            let twice = repair_points(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_tiny_fractions_scaled_in_one_pass() {
        let points = vec![at(0, 5_000), at(1, 0), at(2, 3_000)];

        let once = repair_points(&points).unwrap();
        assert_eq!(micros(&once), vec![500_000, 0, 300_000]);

        let twice = repair_points(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(repair_points(&[]).unwrap().is_empty());
    }
}
