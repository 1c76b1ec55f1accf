//! Encoding session: frames in, finished MP4 out.
//!
//! [`EncodingSession`] owns the encoder, the colour converter scratch image
//! and the [`ContainerWriter`]. It assigns presentation indices, routes every
//! emitted packet to the writer, drains encoder latency on [`finish`] and
//! triggers finalization with the two largest presentation timestamps seen.
//!
//! [`finish`]: EncodingSession::finish

use anyhow::{Context, Result};
use raw2mp4_codec::{ColorConverter, CompressedPacket, RawFrame, VideoEncoder};

use crate::config::SessionConfig;
use crate::mp4::ContainerMuxer;
use crate::timestamp::PtsTracker;
use crate::writer::{ContainerWriter, FinalizeReport};

#[cfg(feature = "openh264")]
use {
    crate::mp4::Mp4Muxer,
    raw2mp4_codec::OpenH264Encoder,
    std::{fs::File, io::BufWriter, path::Path},
};

/// Lifecycle of an [`EncodingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting frames.
    Open,
    /// Pulling buffered packets out of the encoder.
    Draining,
    /// Finalized or failed. Terminal.
    Closed,
}

/// What a finished session produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    /// Frames passed to [`EncodingSession::add_frame`].
    pub frames_submitted: u64,
    /// Samples written to the container.
    pub frames_written: u64,
    /// Presentation duration in movie timescale.
    pub movie_duration: u64,
    /// Movie timescale the duration is expressed in.
    pub movie_timescale: u32,
}

impl SessionSummary {
    /// Presentation duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.movie_timescale == 0 {
            return 0.0;
        }
        self.movie_duration as f64 / f64::from(self.movie_timescale)
    }
}

/// One encode from raw frames to a finished container.
pub struct EncodingSession<E: VideoEncoder, M: ContainerMuxer> {
    encoder: E,
    writer: ContainerWriter<M>,
    converter: ColorConverter,
    width: u32,
    height: u32,
    state: SessionState,
    frames_submitted: u64,
    pts: PtsTracker,
}

#[cfg(feature = "openh264")]
impl EncodingSession<OpenH264Encoder, Mp4Muxer<BufWriter<File>>> {
    /// Open an OpenH264 encoder and an MP4 file at `path`.
    pub fn open(path: impl AsRef<Path>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let encoder =
            OpenH264Encoder::new(config.encoder.clone()).context("failed to open the encoder")?;
        let muxer = Mp4Muxer::create(path, config.file_params())
            .context("failed to create the output file")?;
        Self::with_parts(encoder, muxer, &config)
    }
}

impl<E: VideoEncoder, M: ContainerMuxer> EncodingSession<E, M> {
    /// Build a session from an opened encoder and muxer and write the track
    /// header from the encoder's parameter sets.
    pub fn with_parts(mut encoder: E, muxer: M, config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let (width, height) = (config.encoder.width, config.encoder.height);
        let opened = encoder.config();
        if (opened.width, opened.height) != (width, height) {
            anyhow::bail!(
                "encoder is {}x{} but the session is {}x{}",
                opened.width,
                opened.height,
                width,
                height
            );
        }

        let headers = encoder
            .headers()
            .context("failed to get the encoder headers")?;
        let mut writer = ContainerWriter::new(muxer, config);
        writer.write_header(&headers)?;

        tracing::info!(
            "Session opened: {}x{} @ {}/{} fps{}",
            width,
            height,
            config.encoder.framerate.0,
            config.encoder.framerate.1,
            if config.fragmented { ", fragmented" } else { "" }
        );

        Ok(Self {
            encoder,
            writer,
            converter: ColorConverter::new(width, height),
            width,
            height,
            state: SessionState::Open,
            frames_submitted: 0,
            pts: PtsTracker::default(),
        })
    }

    /// Convert and encode one RGBA frame.
    ///
    /// Returns `true` if the encoder emitted a packet that was written, `false`
    /// if the frame is buffered inside the encoder.
    pub fn add_frame(&mut self, rgba: &[u8]) -> Result<bool> {
        if self.state != SessionState::Open {
            anyhow::bail!("session is not accepting frames (state {:?})", self.state);
        }
        let frame = RawFrame::new(self.width, self.height, rgba).context("invalid input frame")?;

        let pts = self.frames_submitted as i64;
        let image = self.converter.convert(&frame);
        let packet = match self.encoder.encode(image, pts) {
            Ok(packet) => packet,
            Err(err) => {
                self.state = SessionState::Closed;
                return Err(err).context("failed to encode a frame");
            }
        };
        self.frames_submitted += 1;

        match packet {
            Some(packet) => {
                self.write_packet(&packet)?;
                Ok(true)
            }
            None => {
                tracing::debug!(
                    "Frame {} buffered ({} delayed)",
                    pts,
                    self.encoder.delayed_frames()
                );
                Ok(false)
            }
        }
    }

    /// Drain the encoder, close it and finalize the container.
    pub fn finish(&mut self) -> Result<SessionSummary> {
        if self.state != SessionState::Open {
            anyhow::bail!("session already finished (state {:?})", self.state);
        }
        self.state = SessionState::Draining;

        while self.encoder.delayed_frames() > 0 {
            let packet = match self.encoder.drain() {
                Ok(packet) => packet,
                Err(err) => {
                    self.state = SessionState::Closed;
                    return Err(err).context("failed to drain the encoder");
                }
            };
            match packet {
                Some(packet) => self.write_packet(&packet)?,
                None => {
                    tracing::warn!(
                        "Encoder reports {} delayed frames but returned none",
                        self.encoder.delayed_frames()
                    );
                    break;
                }
            }
        }

        self.state = SessionState::Closed;
        self.encoder
            .close()
            .context("failed to close the encoder")?;

        let (largest, second) = self.pts.extent().unwrap_or((0, 0));
        let report: FinalizeReport = self.writer.finalize(largest, second)?;

        Ok(SessionSummary {
            frames_submitted: self.frames_submitted,
            frames_written: report.frames_written,
            movie_duration: report.movie_duration,
            movie_timescale: self.writer.muxer().movie_timescale(),
        })
    }

    fn write_packet(&mut self, packet: &CompressedPacket) -> Result<()> {
        if let Err(err) = self.writer.write_sample(packet) {
            self.state = SessionState::Closed;
            return Err(err);
        }
        self.pts.observe(packet.pts);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames passed to [`Self::add_frame`].
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Samples written to the container.
    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    /// The container writer.
    pub fn writer(&self) -> &ContainerWriter<M> {
        &self.writer
    }

    /// Consume the session and return the muxer.
    pub fn into_muxer(self) -> M {
        self.writer.into_muxer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::summarize;
    use crate::mp4::{FileParams, Mp4Muxer};
    use raw2mp4_codec::{
        expected_frame_size, CodecError, EncoderConfig, ParameterSet, PlanarImage,
    };
    use std::io::Cursor;

    /// Emits one intra packet per frame, no delay.
    struct PassthroughEncoder {
        config: EncoderConfig,
        closed: bool,
    }

    impl VideoEncoder for PassthroughEncoder {
        fn headers(&mut self) -> Result<ParameterSet, CodecError> {
            Ok(ParameterSet {
                sps: vec![0x67, 0x42, 0xC0, 0x1E],
                pps: vec![0x68, 0xCE, 0x3C, 0x80],
                sei: Vec::new(),
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
            let luma = image.y()[0];
            Ok(Some(CompressedPacket::new(
                vec![0, 0, 0, 2, 0x65, luma],
                pts,
                pts,
                true,
            )))
        }

        fn drain(&mut self) -> Result<Option<CompressedPacket>, CodecError> {
            Ok(None)
        }

        fn delayed_frames(&self) -> usize {
            0
        }

        fn close(&mut self) -> Result<(), CodecError> {
            self.closed = true;
            Ok(())
        }

        fn config(&self) -> &EncoderConfig {
            &self.config
        }
    }

    fn session(
        config: &SessionConfig,
    ) -> Result<EncodingSession<PassthroughEncoder, Mp4Muxer<Cursor<Vec<u8>>>>> {
        let encoder = PassthroughEncoder {
            config: config.encoder.clone(),
            closed: false,
        };
        let muxer = Mp4Muxer::new(Cursor::new(Vec::new()), config.file_params())?;
        EncodingSession::with_parts(encoder, muxer, config)
    }

    #[test]
    fn test_rejects_geometry_mismatch() {
        let config = SessionConfig::new(64, 48);
        let encoder = PassthroughEncoder {
            config: EncoderConfig::new(32, 32),
            closed: false,
        };
        let params: FileParams = config.file_params();
        let muxer = Mp4Muxer::new(Cursor::new(Vec::new()), params).unwrap();
        assert!(EncodingSession::with_parts(encoder, muxer, &config).is_err());
    }

    #[test]
    fn test_rejects_short_frame() {
        let config = SessionConfig::new(64, 48);
        let mut session = session(&config).unwrap();
        assert!(session.add_frame(&[0u8; 16]).is_err());
        assert_eq!(session.frames_submitted(), 0);
    }

    #[test]
    fn test_frames_become_samples() {
        let config = SessionConfig::new(64, 48);
        let mut session = session(&config).unwrap();
        let frame = vec![0u8; expected_frame_size(64, 48)];
        for _ in 0..15 {
            assert!(session.add_frame(&frame).unwrap());
        }
        let summary = session.finish().unwrap();
        assert_eq!(summary.frames_submitted, 15);
        assert_eq!(summary.frames_written, 15);
        assert_eq!(summary.movie_duration, 600);
        assert!((summary.duration_secs() - 1.0).abs() < 1e-9);
        assert_eq!(session.state(), SessionState::Closed);

        let data = session.into_muxer().into_inner().into_inner();
        let file = summarize(&data).unwrap();
        assert_eq!(file.sample_count, 15);
        // black RGBA converts to luma 16
        assert_eq!(file.first_sample, vec![0, 0, 0, 2, 0x65, 16]);
    }

    #[test]
    fn test_finish_twice_fails() {
        let config = SessionConfig::new(64, 48);
        let mut session = session(&config).unwrap();
        session.finish().unwrap();
        assert!(session.finish().is_err());
        let frame = vec![0u8; expected_frame_size(64, 48)];
        assert!(session.add_frame(&frame).is_err());
    }
}
