//! Mapping encoder packet timestamps onto container decode/composition times.
//!
//! Encoder timestamps count frames in the encoder timebase and may start below
//! zero when the encoder reorders. Container times are unsigned media-timescale
//! ticks. [`TimestampPolicy`] bridges the two; [`PtsTracker`] remembers the two
//! largest presentation timestamps so the last sample can be given a duration.

use anyhow::Result;

use crate::config::TimingMode;

/// Decode and composition time of one sample, in media timescale ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTiming {
    pub dts: u64,
    pub cts: u64,
}

/// Assigns container timestamps to packets in the order they are written.
#[derive(Debug, Clone)]
pub struct TimestampPolicy {
    mode: TimingMode,
    time_inc: i64,
    start_offset: i64,
    first_cts: u64,
    init_delta: i64,
    /// Packets timed so far.
    numframe: u64,
}

impl TimestampPolicy {
    /// Create a policy. `time_inc` is the number of media ticks per encoder
    /// timestamp unit.
    pub fn new(mode: TimingMode, time_inc: u32) -> Self {
        Self {
            mode,
            time_inc: i64::from(time_inc),
            start_offset: 0,
            first_cts: 0,
            init_delta: 0,
            numframe: 0,
        }
    }

    /// Compute decode and composition times for the next packet.
    ///
    /// The first call fixes the start offset to the negated packet dts and
    /// the presentation start to that packet's composition time.
    pub fn assign(&mut self, dts: i64, pts: i64) -> Result<SampleTiming> {
        if self.numframe == 0 {
            self.start_offset = -dts;
        }

        let timing = match self.mode {
            TimingMode::Direct => SampleTiming {
                dts: to_ticks((dts + self.start_offset) * self.time_inc, "dts")?,
                cts: to_ticks((pts + self.start_offset) * self.time_inc, "cts")?,
            },
            TimingMode::CompressedDts {
                delay_frames,
                multiplier,
            } => {
                if self.numframe == 1 {
                    self.init_delta = (dts + self.start_offset) * self.time_inc;
                }
                let raw_dts = if self.numframe > u64::from(delay_frames) {
                    dts * self.time_inc
                } else {
                    self.numframe as i64 * (self.init_delta / i64::from(multiplier.max(1)))
                };
                SampleTiming {
                    dts: to_ticks(raw_dts, "dts")?,
                    cts: to_ticks(pts * self.time_inc, "cts")?,
                }
            }
        };

        if self.numframe == 0 {
            self.first_cts = match self.mode {
                TimingMode::Direct => timing.cts,
                TimingMode::CompressedDts { .. } => 0,
            };
        }
        self.numframe += 1;
        Ok(timing)
    }

    /// Offset added to packet timestamps, fixed by the first packet.
    pub fn start_offset(&self) -> i64 {
        self.start_offset
    }

    /// Composition time the presentation starts at.
    pub fn first_cts(&self) -> u64 {
        self.first_cts
    }

    /// Media ticks per encoder timestamp unit.
    pub fn time_inc(&self) -> u64 {
        self.time_inc as u64
    }

    /// Number of packets timed so far.
    pub fn packets(&self) -> u64 {
        self.numframe
    }
}

fn to_ticks(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| anyhow::anyhow!("{} {} is negative after offsetting", what, value))
}

/// Running largest and second-largest presentation timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtsTracker {
    extent: Option<(i64, i64)>,
}

impl PtsTracker {
    /// Record the pts of a written packet.
    pub fn observe(&mut self, pts: i64) {
        self.extent = Some(match self.extent {
            None => (pts, pts),
            Some((largest, _)) if pts > largest => (pts, largest),
            Some((largest, second)) if pts > second || largest == second => (largest, pts),
            Some(extent) => extent,
        });
    }

    /// `(largest, second_largest)`, `None` before any packet.
    pub fn extent(&self) -> Option<(i64, i64)> {
        self.extent
    }

    /// Distance between the two largest timestamps, at least one.
    pub fn last_delta(&self) -> i64 {
        match self.extent {
            Some((largest, second)) => last_delta(largest, second),
            None => 1,
        }
    }
}

/// Duration of the final sample in encoder timestamp units.
pub fn last_delta(largest_pts: i64, second_largest_pts: i64) -> i64 {
    (largest_pts - second_largest_pts).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_mode_offsets_by_first_dts() {
        let mut policy = TimestampPolicy::new(TimingMode::Direct, 2);
        let first = policy.assign(-1, 0).unwrap();
        assert_eq!(policy.start_offset(), 1);
        assert_eq!(policy.first_cts(), 2);
        assert_eq!(first, SampleTiming { dts: 0, cts: 2 });

        let second = policy.assign(0, 2).unwrap();
        assert_eq!(second, SampleTiming { dts: 2, cts: 6 });
        let third = policy.assign(1, 1).unwrap();
        assert_eq!(third, SampleTiming { dts: 4, cts: 4 });
    }

    #[test]
    fn test_direct_mode_without_reordering() {
        let mut policy = TimestampPolicy::new(TimingMode::Direct, 1);
        for i in 0..5 {
            let t = policy.assign(i, i).unwrap();
            assert_eq!((t.dts, t.cts), (i as u64, i as u64));
        }
        assert_eq!(policy.first_cts(), 0);
        assert_eq!(policy.packets(), 5);
    }

    #[test]
    fn test_direct_mode_rejects_dts_below_first() {
        let mut policy = TimestampPolicy::new(TimingMode::Direct, 1);
        policy.assign(3, 3).unwrap();
        assert!(policy.assign(1, 4).is_err());
    }

    #[test]
    fn test_compressed_dts_ramp() {
        let mode = TimingMode::CompressedDts {
            delay_frames: 2,
            multiplier: 2,
        };
        let mut policy = TimestampPolicy::new(mode, 10);
        assert_eq!(policy.assign(-2, 0).unwrap(), SampleTiming { dts: 0, cts: 0 });
        assert_eq!(policy.first_cts(), 0);
        // init_delta = (-1 + 2) * 10 = 10, ramp step 10 / 2 = 5
        assert_eq!(policy.assign(-1, 3).unwrap(), SampleTiming { dts: 5, cts: 30 });
        assert_eq!(policy.assign(0, 1).unwrap(), SampleTiming { dts: 10, cts: 10 });
        // past the delay the packet dts is used unshifted
        assert_eq!(policy.assign(1, 2).unwrap(), SampleTiming { dts: 10, cts: 20 });
    }

    #[test]
    fn test_compressed_dts_defaults_follow_packet_dts() {
        let mut policy = TimestampPolicy::new(TimingMode::compressed_dts(), 1);
        assert_eq!(policy.assign(0, 0).unwrap().dts, 0);
        assert_eq!(policy.assign(1, 1).unwrap().dts, 1);
        assert_eq!(policy.assign(2, 2).unwrap().dts, 2);
    }

    #[test]
    fn test_pts_tracker_keeps_top_two() {
        let mut tracker = PtsTracker::default();
        assert_eq!(tracker.extent(), None);
        assert_eq!(tracker.last_delta(), 1);

        tracker.observe(0);
        assert_eq!(tracker.extent(), Some((0, 0)));
        for pts in [2, 1, 4, 3] {
            tracker.observe(pts);
        }
        assert_eq!(tracker.extent(), Some((4, 3)));
        assert_eq!(tracker.last_delta(), 1);
    }

    #[test]
    fn test_single_pts_gives_unit_delta() {
        let mut tracker = PtsTracker::default();
        tracker.observe(7);
        assert_eq!(tracker.last_delta(), 1);
        assert_eq!(last_delta(10, 7), 3);
    }
}
