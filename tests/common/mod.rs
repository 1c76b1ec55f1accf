//! Shared fixtures: a reordering fake encoder, a call-recording fake muxer
//! and a bouncing-circle frame generator.

#![allow(dead_code)]

use anyhow::Result;
use raw2mp4::{
    ContainerMuxer, Edit, MediaParams, Sample, TrackGeometry, TrackKind,
};
use raw2mp4_codec::{
    CodecError, CompressedPacket, EncoderConfig, ParameterSet, PlanarImage, VideoEncoder,
};

pub const SPS: [u8; 5] = [0x67, 0x42, 0xC0, 0x1E, 0xDA];
pub const PPS: [u8; 4] = [0x68, 0xCE, 0x3C, 0x80];
/// One length-prefixed SEI NAL.
pub const SEI: [u8; 7] = [0, 0, 0, 3, 0x06, 0x05, 0x80];

/// Encoder with one frame of reordering latency.
///
/// Presentation indices come out in the order `0, 2, 1, 4, 3, ...` with decode
/// timestamps starting at -1, like an encoder with B-frames. Keyframes are
/// index 0 and every `keyint`th index.
pub struct ReorderingEncoder {
    config: EncoderConfig,
    keyint: i64,
    held: Option<i64>,
    emitted: i64,
    closed: bool,
}

impl ReorderingEncoder {
    pub fn new(config: EncoderConfig, keyint: i64) -> Self {
        Self {
            config,
            keyint,
            held: None,
            emitted: 0,
            closed: false,
        }
    }

    fn packet(&mut self, pts: i64) -> CompressedPacket {
        let is_keyframe = pts == 0 || (self.keyint > 0 && pts % self.keyint == 0);
        let nal_type = if is_keyframe { 0x65 } else { 0x41 };
        let dts = self.emitted - 1;
        self.emitted += 1;
        CompressedPacket::new(vec![0, 0, 0, 2, nal_type, pts as u8], dts, pts, is_keyframe)
    }
}

impl VideoEncoder for ReorderingEncoder {
    fn headers(&mut self) -> Result<ParameterSet, CodecError> {
        Ok(ParameterSet {
            sps: SPS.to_vec(),
            pps: PPS.to_vec(),
            sei: SEI.to_vec(),
        })
    }

    fn encode(
        &mut self,
        image: &PlanarImage,
        pts: i64,
    ) -> Result<Option<CompressedPacket>, CodecError> {
        if self.closed {
            return Err(CodecError::EncoderClosed);
        }
        if (image.width(), image.height()) != (self.config.width, self.config.height) {
            return Err(CodecError::GeometryMismatch {
                expected_width: self.config.width,
                expected_height: self.config.height,
                width: image.width(),
                height: image.height(),
            });
        }
        let out = match (pts, self.held) {
            (0, _) => {
                self.held = Some(0);
                None
            }
            (1, Some(held)) => {
                self.held = Some(1);
                Some(held)
            }
            (p, _) if p % 2 == 0 => Some(p),
            (p, held) => {
                self.held = Some(p);
                held
            }
        };
        Ok(out.map(|pts| self.packet(pts)))
    }

    fn drain(&mut self) -> Result<Option<CompressedPacket>, CodecError> {
        if self.closed {
            return Err(CodecError::EncoderClosed);
        }
        Ok(self.held.take().map(|pts| self.packet(pts)))
    }

    fn delayed_frames(&self) -> usize {
        usize::from(self.held.is_some())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::EncoderClosed);
        }
        self.closed = true;
        Ok(())
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

/// One call made on a [`RecordingMuxer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTrack(u32),
    SetGeometry(TrackGeometry),
    AddSampleEntry { bitrate_info: bool },
    Append(Sample),
    FlushPooled(u32),
    BeginFragment,
    SetEdit(Edit),
    UpdateEdit(u32, Edit),
    Finish,
}

/// Muxer that records every call and writes nothing.
#[derive(Debug, Default)]
pub struct RecordingMuxer {
    pub calls: Vec<Call>,
    /// Reject every append once this many samples were accepted.
    pub fail_after: Option<usize>,
    media_timescale: Option<u32>,
}

impl RecordingMuxer {
    /// A muxer that rejects every append after `samples` were accepted.
    pub fn failing_after(samples: usize) -> Self {
        Self {
            fail_after: Some(samples),
            ..Default::default()
        }
    }

    pub fn samples(&self) -> Vec<&Sample> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Append(sample) => Some(sample),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }
}

impl ContainerMuxer for RecordingMuxer {
    fn create_track(&mut self, _kind: TrackKind, media: &MediaParams) -> Result<u32> {
        self.media_timescale = Some(media.timescale);
        self.calls.push(Call::CreateTrack(media.timescale));
        Ok(1)
    }

    fn set_track_geometry(&mut self, _track: u32, geometry: &TrackGeometry) -> Result<()> {
        self.calls.push(Call::SetGeometry(*geometry));
        Ok(())
    }

    fn add_sample_entry(
        &mut self,
        _track: u32,
        params: &ParameterSet,
        bitrate_info: bool,
    ) -> Result<u32> {
        params.validate()?;
        self.calls.push(Call::AddSampleEntry { bitrate_info });
        Ok(1)
    }

    fn append_sample(&mut self, _track: u32, sample: Sample) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.samples().len() >= n) {
            anyhow::bail!("disk full");
        }
        self.calls.push(Call::Append(sample));
        Ok(())
    }

    fn flush_pooled(&mut self, _track: u32, last_duration: u32) -> Result<()> {
        self.calls.push(Call::FlushPooled(last_duration));
        Ok(())
    }

    fn begin_fragment(&mut self) -> Result<()> {
        self.calls.push(Call::BeginFragment);
        Ok(())
    }

    fn set_edit(&mut self, _track: u32, edit: Edit) -> Result<()> {
        self.calls.push(Call::SetEdit(edit));
        Ok(())
    }

    fn update_edit(&mut self, _track: u32, index: u32, edit: Edit) -> Result<()> {
        self.calls.push(Call::UpdateEdit(index, edit));
        Ok(())
    }

    fn movie_timescale(&self) -> u32 {
        600
    }

    fn media_timescale(&self, _track: u32) -> Option<u32> {
        self.media_timescale
    }

    fn finish(&mut self) -> Result<()> {
        self.calls.push(Call::Finish);
        Ok(())
    }
}

/// RGBA frames of a black circle bouncing on a white background.
pub struct BouncingCircle {
    width: u32,
    height: u32,
    radius: f64,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

impl BouncingCircle {
    pub fn new(width: u32, height: u32) -> Self {
        let radius = 32.0;
        Self {
            width,
            height,
            radius,
            x: f64::from(width) / 2.0 - radius,
            y: f64::from(height) / 2.0 - radius,
            vx: 10.0,
            vy: 10.0,
        }
    }

    /// Draw the current frame and advance the circle.
    pub fn next_frame(&mut self) -> Vec<u8> {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let diameter = self.radius * 2.0;
        let (cx, cy) = (self.x + self.radius, self.y + self.radius);

        let mut frame = vec![255u8; self.width as usize * self.height as usize * 4];
        for (i, pixel) in frame.chunks_exact_mut(4).enumerate() {
            let px = (i % self.width as usize) as f64 + 0.5;
            let py = (i / self.width as usize) as f64 + 0.5;
            if (px - cx).powi(2) + (py - cy).powi(2) <= self.radius.powi(2) {
                pixel[..3].fill(0);
            }
        }

        self.x += self.vx;
        self.y += self.vy;
        if self.x + diameter >= w || self.x <= 0.0 {
            self.vx = -self.vx;
        }
        if self.y + diameter >= h || self.y <= 0.0 {
            self.vy = -self.vy;
        }
        self.x = self.x.max(0.0).min(w - diameter);
        self.y = self.y.max(0.0).min(h - diameter);
        frame
    }
}

/// A uniform RGBA frame.
pub fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat(width as usize * height as usize)
}
