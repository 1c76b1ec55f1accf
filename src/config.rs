//! Session configuration: encoder settings plus container policy.

use anyhow::{Context, Result};
use raw2mp4_codec::EncoderConfig;

use crate::mp4::FileParams;

/// Default movie timescale, in ticks per second.
pub const DEFAULT_MOVIE_TIMESCALE: u32 = 600;

/// How container decode/composition timestamps are derived from packet
/// timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingMode {
    /// Shift every timestamp so the first decode time lands on zero.
    #[default]
    Direct,
    /// Synthesize a linear decode ramp for the first `delay_frames` packets,
    /// then follow the packet's own decode time. Composition times are taken
    /// unshifted.
    CompressedDts {
        delay_frames: u32,
        multiplier: u32,
    },
}

impl TimingMode {
    /// Compressed-dts mode with no delay frames and a multiplier of one.
    pub const fn compressed_dts() -> Self {
        Self::CompressedDts {
            delay_frames: 0,
            multiplier: 1,
        }
    }
}

/// Configuration for an encoding session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Encoder settings. The media timescale follows its frame rate.
    pub encoder: EncoderConfig,
    /// Write a fragmented file (moov up front, one moof per keyframe group).
    pub fragmented: bool,
    /// Timestamp derivation.
    pub timing: TimingMode,
    /// Movie header timescale.
    pub movie_timescale: u32,
    /// Major brand of the `ftyp` box.
    pub major_brand: [u8; 4],
    /// Compatible brands of the `ftyp` box, before fragment brands are added.
    pub compatible_brands: Vec<[u8; 4]>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            fragmented: false,
            timing: TimingMode::Direct,
            movie_timescale: DEFAULT_MOVIE_TIMESCALE,
            major_brand: *b"mp42",
            compatible_brands: vec![*b"mp42", *b"mp41", *b"isom"],
        }
    }
}

impl SessionConfig {
    /// Create a session configuration for `width` x `height` frames.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            encoder: EncoderConfig::new(width, height),
            ..Default::default()
        }
    }

    /// Set the input frame rate.
    #[must_use]
    pub fn framerate(mut self, num: u32, den: u32) -> Self {
        self.encoder = self.encoder.framerate(num, den);
        self
    }

    /// Enable or disable fragmented output.
    #[must_use]
    pub fn fragmented(mut self, fragmented: bool) -> Self {
        self.fragmented = fragmented;
        self
    }

    /// Set the timing mode.
    #[must_use]
    pub fn timing(mut self, timing: TimingMode) -> Self {
        self.timing = timing;
        self
    }

    /// Force a keyframe every `frames` frames.
    #[must_use]
    pub fn keyframe_interval(mut self, frames: u32) -> Self {
        self.encoder = self.encoder.keyframe_interval(frames);
        self
    }

    /// Set the movie timescale.
    #[must_use]
    pub fn movie_timescale(mut self, timescale: u32) -> Self {
        self.movie_timescale = timescale;
        self
    }

    /// Media timescale: the encoder timebase denominator.
    pub fn media_timescale(&self) -> u32 {
        self.encoder.timebase().1
    }

    /// Media ticks per encoder timestamp unit: the timebase numerator.
    pub fn time_inc(&self) -> u32 {
        self.encoder.timebase().0
    }

    /// Compatible brands as written, `iso6` appended for fragmented output.
    pub fn brands(&self) -> Vec<[u8; 4]> {
        let mut brands = self.compatible_brands.clone();
        if self.fragmented && !brands.contains(b"iso6") {
            brands.push(*b"iso6");
        }
        brands
    }

    /// File-level parameters for the muxer.
    pub fn file_params(&self) -> FileParams {
        FileParams {
            major_brand: self.major_brand,
            minor_version: 0,
            compatible_brands: self.brands(),
            movie_timescale: self.movie_timescale,
            fragmented: self.fragmented,
        }
    }

    /// Check the configuration before any resource is opened.
    pub fn validate(&self) -> Result<()> {
        self.encoder
            .validate()
            .context("invalid encoder configuration")?;
        if self.movie_timescale == 0 {
            anyhow::bail!("movie timescale must be non-zero");
        }
        if let TimingMode::CompressedDts { multiplier, .. } = self.timing {
            if multiplier == 0 {
                anyhow::bail!("dts compression multiplier must be non-zero");
            }
        }
        Ok(())
    }
}
