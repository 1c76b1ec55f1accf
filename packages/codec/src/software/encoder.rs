//! OpenH264 encoder implementation.

use openh264::encoder::{
    Encoder, EncoderConfig as OpenH264Config, RateControlMode as OpenH264RateControl,
    SpsPpsStrategy,
};
use openh264::formats::YUVSlices;
use openh264::OpenH264API;

use crate::nal::{parse_annex_b, to_length_prefixed, NalUnit};
use crate::{
    nal_unit_type, CodecError, CompressedPacket, EncoderConfig, EncoderPreset, ParameterSet,
    PlanarImage, Profile, RateControlMode, VideoEncoder,
};

/// OpenH264 software encoder.
pub struct OpenH264Encoder {
    /// `None` once closed.
    encoder: Option<Encoder>,
    config: EncoderConfig,
    /// Number of pictures submitted so far.
    frame_index: u64,
}

impl OpenH264Encoder {
    /// Create a new encoder with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or OpenH264 refuses to
    /// initialise with it.
    pub fn new(config: EncoderConfig) -> Result<Self, CodecError> {
        config.validate()?;
        let encoder = open_encoder(&config)?;
        tracing::debug!(
            "OpenH264 encoder opened: {}x{} @ {}/{} fps",
            config.width,
            config.height,
            config.framerate.0,
            config.framerate.1
        );
        Ok(Self {
            encoder: Some(encoder),
            config,
            frame_index: 0,
        })
    }

    fn encoder_mut(&mut self) -> Result<&mut Encoder, CodecError> {
        self.encoder.as_mut().ok_or(CodecError::EncoderClosed)
    }

    fn check_geometry(&self, image: &PlanarImage) -> Result<(), CodecError> {
        if image.width() != self.config.width || image.height() != self.config.height {
            return Err(CodecError::GeometryMismatch {
                expected_width: self.config.width,
                expected_height: self.config.height,
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(())
    }
}

/// Map our configuration onto OpenH264's.
///
/// OpenH264 has no speed preset; slower presets pin it to one thread, which
/// keeps each picture in a single slice.
fn openh264_config(config: &EncoderConfig) -> OpenH264Config {
    let threads = match config.preset {
        EncoderPreset::Ultrafast => 0,
        EncoderPreset::Medium | EncoderPreset::Slow => 1,
    };
    let rate_control = match config.rate_control {
        RateControlMode::Quality => OpenH264RateControl::Quality,
        RateControlMode::Bitrate => OpenH264RateControl::Bitrate,
    };

    OpenH264Config::new()
        .max_frame_rate(config.fps())
        .set_bitrate_bps(config.bitrate)
        .rate_control_mode(rate_control)
        .sps_pps_strategy(SpsPpsStrategy::ConstantId)
        .set_multiple_thread_idc(threads)
        .enable_skip_frame(false)
}

fn open_encoder(config: &EncoderConfig) -> Result<Encoder, CodecError> {
    Encoder::with_api_config(OpenH264API::from_source(), openh264_config(config))
        .map_err(|e| CodecError::backend(format!("failed to open encoder: {e}")))
}

fn encode_image(encoder: &mut Encoder, image: &PlanarImage) -> Result<Vec<NalUnit>, CodecError> {
    let source = YUVSlices::new(
        (image.y(), image.u(), image.v()),
        (image.width() as usize, image.height() as usize),
        image.strides(),
    );
    let bitstream = encoder
        .encode(&source)
        .map_err(|e| CodecError::backend(format!("encode failed: {e}")))?;
    Ok(parse_annex_b(&bitstream.to_vec()))
}

impl VideoEncoder for OpenH264Encoder {
    /// OpenH264 only emits parameter sets in front of an IDR, so they are taken
    /// from a throwaway encoder with the same configuration. OpenH264 keeps the
    /// SPS/PPS ids constant, so they match what the real encoder references.
    fn headers(&mut self) -> Result<ParameterSet, CodecError> {
        if self.encoder.is_none() {
            return Err(CodecError::EncoderClosed);
        }
        let mut probe = open_encoder(&self.config)?;
        let nals = encode_image(
            &mut probe,
            &PlanarImage::new(self.config.width, self.config.height),
        )?;

        let mut sps = None;
        let mut pps = None;
        let mut sei = Vec::new();
        for nal in nals {
            match nal.nal_type {
                nal_unit_type::SPS if sps.is_none() => sps = Some(nal.data),
                nal_unit_type::PPS if pps.is_none() => pps = Some(nal.data),
                nal_unit_type::SEI => nal.write_length_prefixed(&mut sei),
                _ => {}
            }
        }
        let params = ParameterSet {
            sps: sps.ok_or(CodecError::MissingParameterSet("sps"))?,
            pps: pps.ok_or(CodecError::MissingParameterSet("pps"))?,
            sei,
        };
        params.validate()?;

        let expected = Profile::Baseline.profile_idc();
        match params.profile_level() {
            Some((profile, _, _)) if profile == expected => Ok(params),
            other => Err(CodecError::ProfileRejected(format!(
                "encoder produced profile_idc {:?}, expected {}",
                other.map(|(p, _, _)| p),
                expected
            ))),
        }
    }

    fn encode(
        &mut self,
        image: &PlanarImage,
        pts: i64,
    ) -> Result<Option<CompressedPacket>, CodecError> {
        self.check_geometry(image)?;
        if self.encoder.is_none() {
            return Err(CodecError::EncoderClosed);
        }
        let interval = u64::from(self.config.keyframe_interval);
        let force_keyframe =
            interval > 0 && self.frame_index > 0 && self.frame_index % interval == 0;
        self.frame_index += 1;

        let strip = !self.config.repeat_headers;
        let encoder = self.encoder_mut()?;
        if force_keyframe {
            encoder.force_intra_frame();
        }
        let nals = encode_image(encoder, image)?;
        if nals.iter().all(|n| n.is_parameter_set()) {
            tracing::warn!("OpenH264 produced no picture for pts {}", pts);
            return Ok(None);
        }

        let is_keyframe = nals.iter().any(NalUnit::is_idr);
        let data = to_length_prefixed(&nals, strip);
        Ok(Some(CompressedPacket::new(data, pts, pts, is_keyframe)))
    }

    fn drain(&mut self) -> Result<Option<CompressedPacket>, CodecError> {
        if self.encoder.is_none() {
            return Err(CodecError::EncoderClosed);
        }
        Ok(None)
    }

    fn delayed_frames(&self) -> usize {
        0
    }

    fn close(&mut self) -> Result<(), CodecError> {
        if self.encoder.take().is_none() {
            return Err(CodecError::EncoderClosed);
        }
        tracing::debug!("OpenH264 encoder closed after {} frames", self.frame_index);
        Ok(())
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }
}
