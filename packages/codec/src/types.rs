//! Encoder configuration types.

use crate::CodecError;

/// H.264 profile.
///
/// Only the baseline compatibility profile is produced: no B-frames, no CABAC,
/// 8-bit 4:2:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    /// Constrained baseline profile.
    #[default]
    Baseline,
}

impl Profile {
    /// `profile_idc` as signalled in the SPS.
    #[must_use]
    pub fn profile_idc(&self) -> u8 {
        match self {
            Self::Baseline => 66,
        }
    }
}

/// Rate control mode for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateControlMode {
    /// Quality driven, bitrate floats.
    #[default]
    Quality,
    /// Target an average bitrate.
    Bitrate,
}

/// Encoder preset controlling speed/quality tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncoderPreset {
    /// Fastest encoding, lowest complexity.
    #[default]
    Ultrafast,
    /// Balanced.
    Medium,
    /// Slowest encoding, highest quality.
    Slow,
}

/// Sample aspect ratio (VUI `sar_width:sar_height`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleAspectRatio {
    pub width: u32,
    pub height: u32,
}

impl SampleAspectRatio {
    /// Ratio as a float; `None` when either side is zero.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }
}

/// Colour description carried in the VUI and mirrored into the sample entry.
///
/// Indices follow ISO/IEC 23091-2; `2` means unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorDescription {
    pub primaries: u16,
    pub transfer: u16,
    pub matrix: u16,
    pub full_range: bool,
}

impl ColorDescription {
    /// Index value meaning "unspecified".
    pub const UNSPECIFIED: u16 = 2;

    /// Returns true if no field carries information.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.primaries == Self::UNSPECIFIED
            && self.transfer == Self::UNSPECIFIED
            && self.matrix == Self::UNSPECIFIED
            && !self.full_range
    }
}

impl Default for ColorDescription {
    fn default() -> Self {
        Self {
            primaries: Self::UNSPECIFIED,
            transfer: Self::UNSPECIFIED,
            matrix: Self::UNSPECIFIED,
            full_range: false,
        }
    }
}

/// Configuration for creating a video encoder.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Framerate as (numerator, denominator).
    pub framerate: (u32, u32),
    /// H.264 profile.
    pub profile: Profile,
    /// Encoder preset (speed/quality tradeoff).
    pub preset: EncoderPreset,
    /// Rate control mode.
    pub rate_control: RateControlMode,
    /// Target bitrate in bits per second (for `RateControlMode::Bitrate`).
    pub bitrate: u32,
    /// Distance between forced keyframes. 0 for only the first frame.
    pub keyframe_interval: u32,
    /// Bits per sample. Only 8 is supported.
    pub bit_depth: u8,
    /// Repeat SPS/PPS in front of every keyframe.
    pub repeat_headers: bool,
    /// Optional sample aspect ratio.
    pub sar: Option<SampleAspectRatio>,
    /// Colour description.
    pub color: ColorDescription,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            framerate: (15, 1),
            profile: Profile::Baseline,
            preset: EncoderPreset::Ultrafast,
            rate_control: RateControlMode::Quality,
            bitrate: 2_000_000,
            keyframe_interval: 0,
            bit_depth: 8,
            repeat_headers: false,
            sar: None,
            color: ColorDescription::default(),
        }
    }
}

impl EncoderConfig {
    /// Create a new encoder configuration with the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the framerate.
    #[must_use]
    pub fn framerate(mut self, num: u32, den: u32) -> Self {
        self.framerate = (num, den);
        self
    }

    /// Set the encoder preset.
    #[must_use]
    pub fn preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Set the rate control mode.
    #[must_use]
    pub fn rate_control(mut self, mode: RateControlMode) -> Self {
        self.rate_control = mode;
        self
    }

    /// Set the target bitrate in bits per second.
    #[must_use]
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Force a keyframe every `frames` frames.
    #[must_use]
    pub fn keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames;
        self
    }

    /// Set the sample aspect ratio.
    #[must_use]
    pub fn sample_aspect_ratio(mut self, width: u32, height: u32) -> Self {
        self.sar = Some(SampleAspectRatio { width, height });
        self
    }

    /// Set the colour description.
    #[must_use]
    pub fn color(mut self, color: ColorDescription) -> Self {
        self.color = color;
        self
    }

    /// Timebase of the encoder timestamps as (numerator, denominator).
    ///
    /// One tick is one frame at the configured constant rate.
    #[must_use]
    pub fn timebase(&self) -> (u32, u32) {
        (self.framerate.1, self.framerate.0)
    }

    /// Frames per second as a float.
    #[must_use]
    pub fn fps(&self) -> f32 {
        self.framerate.0 as f32 / self.framerate.1.max(1) as f32
    }

    /// Check the configuration against what the encoders support.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.width == 0 || self.height == 0 || self.width > 16384 || self.height > 16384 {
            return Err(CodecError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.framerate.0 == 0 || self.framerate.1 == 0 {
            return Err(CodecError::invalid_param(format!(
                "framerate {}/{} must be non-zero",
                self.framerate.0, self.framerate.1
            )));
        }
        if self.bit_depth != 8 {
            return Err(CodecError::invalid_param(format!(
                "bit depth {} is not supported",
                self.bit_depth
            )));
        }
        if self.profile == Profile::Baseline && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(CodecError::ProfileRejected(format!(
                "baseline 4:2:0 needs even dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        if self.rate_control == RateControlMode::Bitrate && self.bitrate == 0 {
            return Err(CodecError::invalid_param("bitrate rate control needs a bitrate"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.framerate, (15, 1));
        assert_eq!(config.timebase(), (1, 15));
        assert_eq!(config.bit_depth, 8);
        assert!(!config.repeat_headers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_odd_dimensions() {
        let err = EncoderConfig::new(641, 480).validate().unwrap_err();
        assert!(matches!(err, CodecError::ProfileRejected(_)));
    }

    #[test]
    fn test_validate_rejects_bad_bit_depth() {
        let mut config = EncoderConfig::new(64, 64);
        config.bit_depth = 10;
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidParam(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_framerate() {
        let config = EncoderConfig::new(64, 64).framerate(0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sar_ratio() {
        let sar = SampleAspectRatio { width: 4, height: 3 };
        assert!((sar.ratio().unwrap() - 4.0 / 3.0).abs() < 1e-9);
        assert!(SampleAspectRatio { width: 0, height: 1 }.ratio().is_none());
    }
}
