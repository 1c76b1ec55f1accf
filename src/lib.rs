//! raw2mp4 - encode raw RGBA frames into an H.264 MP4 file.
//!
//! The pipeline runs on a single thread, one frame at a time:
//!
//! ```text
//! RGBA frame -> ColorConverter -> I420 image -> VideoEncoder -> CompressedPacket
//!     -> TimestampPolicy (dts/cts) -> ContainerWriter -> ContainerMuxer (Mp4Muxer)
//! ```
//!
//! - [`EncodingSession`] owns the encoder and the writer, drains encoder
//!   latency and finalizes the file.
//! - [`ContainerWriter`] turns packets into samples, cuts fragments at
//!   keyframes and writes the edit list.
//! - [`Mp4Muxer`] writes progressive or fragmented ISO BMFF.
//! - [`inspect`] reads the written structure back.
//!
//! # Quick Start
//!
//! ```ignore
//! use raw2mp4::{EncodingSession, SessionConfig};
//!
//! let config = SessionConfig::new(640, 480).framerate(15, 1);
//! let mut session = EncodingSession::open("out.mp4", config)?;
//! for frame in frames {
//!     session.add_frame(&frame)?;
//! }
//! let summary = session.finish()?;
//! println!("{} frames, {:.2}s", summary.frames_written, summary.duration_secs());
//! ```
//!
//! # Feature Flags
//!
//! - `openh264` - OpenH264 software encoder, [`EncodingSession::open`] and the
//!   `raw2mp4` binary

pub mod config;
pub mod inspect;
pub mod mp4;
pub mod session;
pub mod timestamp;
pub mod writer;

pub use config::{SessionConfig, TimingMode, DEFAULT_MOVIE_TIMESCALE};
pub use mp4::{
    ContainerMuxer, Edit, FileParams, MediaParams, Mp4Muxer, Sample, TrackGeometry, TrackKind,
    EDIT_DURATION_UNKNOWN32,
};
pub use session::{EncodingSession, SessionState, SessionSummary};
pub use timestamp::{PtsTracker, SampleTiming, TimestampPolicy};
pub use writer::{ContainerWriter, FinalizeReport, WriterState};

// Encoder side
pub use raw2mp4_codec::{
    expected_frame_size, CodecError, ColorConverter, ColorDescription, CompressedPacket,
    EncoderConfig, EncoderPreset, ParameterSet, PlanarImage, Profile, RateControlMode, RawFrame,
    SampleAspectRatio, VideoEncoder,
};

#[cfg(feature = "openh264")]
pub use raw2mp4_codec::OpenH264Encoder;
