//! Turns compressed packets into container samples.
//!
//! [`ContainerWriter`] owns the track and sample-entry lifecycle on top of a
//! [`ContainerMuxer`]: it assigns timestamps, prefixes the SEI to the very
//! first sample, cuts fragments at keyframes and writes the edit list once the
//! final sample duration is known.

use anyhow::{Context, Result};
use raw2mp4_codec::{CompressedPacket, ParameterSet};

use crate::config::SessionConfig;
use crate::mp4::{
    ContainerMuxer, Edit, MediaParams, Sample, TrackGeometry, TrackKind, EDIT_DURATION_UNKNOWN32,
};
use crate::timestamp::{last_delta, TimestampPolicy};

/// Handler name written into the track's `hdlr` box.
pub const VIDEO_HANDLER_NAME: &str = "Video Media Handler";

/// Lifecycle of a [`ContainerWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing written yet.
    Empty,
    /// Track and sample entry exist.
    HeaderWritten,
    /// At least one sample appended.
    Writing,
    /// Movie finished. Terminal.
    Finalized,
}

/// Outcome of [`ContainerWriter::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Samples appended over the writer's lifetime.
    pub frames_written: u64,
    /// Duration given to the final sample, in media timescale.
    pub last_sample_duration: u32,
    /// Duration of the edit, in movie timescale.
    pub movie_duration: u64,
    /// Start of the edit on the media time-line.
    pub first_cts: u64,
}

/// Persists compressed packets as samples of a single video track.
pub struct ContainerWriter<M: ContainerMuxer> {
    muxer: M,
    state: WriterState,
    fragmented: bool,
    geometry: TrackGeometry,
    media_timescale: u32,
    policy: TimestampPolicy,
    track: u32,
    entry: u32,
    /// Length-prefixed SEI, taken by the first sample.
    sei: Option<Vec<u8>>,
    prev_dts: u64,
    frames_written: u64,
}

impl<M: ContainerMuxer> ContainerWriter<M> {
    /// Wrap a muxer. Nothing is written until [`Self::write_header`].
    pub fn new(muxer: M, config: &SessionConfig) -> Self {
        let encoder = &config.encoder;
        Self {
            muxer,
            state: WriterState::Empty,
            fragmented: config.fragmented,
            geometry: TrackGeometry::new(encoder.width, encoder.height, encoder.sar, encoder.color),
            media_timescale: config.media_timescale(),
            policy: TimestampPolicy::new(config.timing, config.time_inc()),
            track: 0,
            entry: 0,
            sei: None,
            prev_dts: 0,
            frames_written: 0,
        }
    }

    /// Create the video track and its sample entry from the parameter sets.
    pub fn write_header(&mut self, params: &ParameterSet) -> Result<()> {
        if self.state != WriterState::Empty {
            anyhow::bail!("header already written (state {:?})", self.state);
        }

        let media = MediaParams {
            timescale: self.media_timescale,
            handler_name: VIDEO_HANDLER_NAME.to_string(),
        };
        self.track = self
            .muxer
            .create_track(TrackKind::Video, &media)
            .context("failed to create a video track")?;
        self.muxer
            .set_track_geometry(self.track, &self.geometry)
            .context("failed to set video track parameters")?;
        self.entry = self
            .muxer
            .add_sample_entry(self.track, params, true)
            .context("failed to add a video sample entry")?;
        self.sei = (!params.sei.is_empty()).then(|| params.sei.clone());

        tracing::info!(
            "Video track {} created: {}x{}, timescale {}",
            self.track,
            self.geometry.width,
            self.geometry.height,
            self.media_timescale
        );
        self.state = WriterState::HeaderWritten;
        Ok(())
    }

    /// Append one packet as a sample.
    pub fn write_sample(&mut self, packet: &CompressedPacket) -> Result<()> {
        match self.state {
            WriterState::HeaderWritten | WriterState::Writing => {}
            state => anyhow::bail!("cannot write a sample in state {:?}", state),
        }

        let timing = self
            .policy
            .assign(packet.dts, packet.pts)
            .context("failed to compute sample timestamps")?;

        if self.frames_written == 0 && self.fragmented {
            let edit = Edit {
                start_time: self.policy.first_cts(),
                duration: EDIT_DURATION_UNKNOWN32,
            };
            self.muxer
                .set_edit(self.track, edit)
                .context("failed to set timeline map for video")?;
        }

        let data = match self.sei.take() {
            Some(mut sei) => {
                sei.extend_from_slice(&packet.data);
                sei
            }
            None => packet.data.clone(),
        };

        if self.fragmented && packet.is_keyframe && self.frames_written > 0 {
            let duration = timing
                .dts
                .checked_sub(self.prev_dts)
                .and_then(|d| u32::try_from(d).ok())
                .with_context(|| {
                    format!("dts {} cannot follow {}", timing.dts, self.prev_dts)
                })?;
            self.muxer
                .flush_pooled(self.track, duration)
                .context("failed to flush a fragment")?;
            self.muxer
                .begin_fragment()
                .context("failed to create a movie fragment")?;
            tracing::info!("Fragment started at frame {}", self.frames_written);
        }

        tracing::debug!(
            "Sample {}: dts={} cts={} size={} key={}",
            self.frames_written,
            timing.dts,
            timing.cts,
            data.len(),
            packet.is_keyframe
        );
        let sample = Sample {
            data,
            dts: timing.dts,
            cts: timing.cts,
            entry: self.entry,
            sync: packet.is_keyframe,
        };
        self.muxer
            .append_sample(self.track, sample)
            .context("failed to append a video frame")?;

        self.prev_dts = timing.dts;
        self.frames_written += 1;
        self.state = WriterState::Writing;
        Ok(())
    }

    /// Flush the last samples, write the edit list and finish the movie.
    ///
    /// `largest_pts` and `second_largest_pts` are the two largest packet
    /// presentation timestamps written, in encoder timebase units.
    pub fn finalize(&mut self, largest_pts: i64, second_largest_pts: i64) -> Result<FinalizeReport> {
        match self.state {
            WriterState::HeaderWritten | WriterState::Writing => {}
            state => anyhow::bail!("cannot finalize in state {:?}", state),
        }

        let mut report = FinalizeReport {
            frames_written: self.frames_written,
            last_sample_duration: 0,
            movie_duration: 0,
            first_cts: self.policy.first_cts(),
        };

        if self.frames_written == 0 {
            tracing::warn!("Finishing a movie without samples");
        } else {
            let delta = last_delta(largest_pts, second_largest_pts);
            let time_inc = self.policy.time_inc();
            let last_duration = u32::try_from(delta as u64 * time_inc)
                .context("final sample duration does not fit 32 bits")?;
            self.muxer
                .flush_pooled(self.track, last_duration)
                .context("failed to flush the rest of samples")?;

            let media_timescale = self
                .muxer
                .media_timescale(self.track)
                .filter(|&ts| ts != 0)
                .context("timescale is broken")?;
            let movie_timescale = self.muxer.movie_timescale();
            if movie_timescale == 0 {
                anyhow::bail!("timescale is broken");
            }
            let media_end = ((largest_pts + delta) as f64) * time_inc as f64;
            let movie_duration =
                (media_end / f64::from(media_timescale) * f64::from(movie_timescale)).round() as u64;

            let edit = Edit {
                start_time: self.policy.first_cts(),
                duration: movie_duration,
            };
            if self.fragmented {
                self.muxer
                    .update_edit(self.track, 1, edit)
                    .context("failed to update timeline map for video")?;
            } else {
                self.muxer
                    .set_edit(self.track, edit)
                    .context("failed to set timeline map for video")?;
            }

            report.last_sample_duration = last_duration;
            report.movie_duration = movie_duration;
        }

        self.muxer.finish().context("failed to finish movie")?;
        self.state = WriterState::Finalized;
        tracing::info!(
            "Movie finalized: {} frames, duration {} (movie timescale {})",
            report.frames_written,
            report.movie_duration,
            self.muxer.movie_timescale()
        );
        Ok(report)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Samples appended so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Timestamp policy, for the offsets fixed by the first packet.
    pub fn policy(&self) -> &TimestampPolicy {
        &self.policy
    }

    /// The underlying muxer.
    pub fn muxer(&self) -> &M {
        &self.muxer
    }

    /// Consume the writer and return the muxer.
    pub fn into_muxer(self) -> M {
        self.muxer
    }
}
