//! H.264 encoding front end for raw2mp4.
//!
//! This crate turns raw RGBA frames into H.264 baseline access units. It holds
//! everything that sits in front of the container:
//!
//! - **Frames**: [`RawFrame`] validation and RGBA to I420 conversion through a
//!   reusable [`ColorConverter`]
//! - **NAL framing**: Annex B parsing and 4-byte length-prefix re-framing
//! - **Encoders**: the [`VideoEncoder`] trait and, with the `openh264`
//!   feature, the [`OpenH264Encoder`] software backend
//!
//! # Quick Start
//!
//! ```ignore
//! use raw2mp4_codec::{ColorConverter, EncoderConfig, OpenH264Encoder, RawFrame, VideoEncoder};
//!
//! let config = EncoderConfig::new(640, 480).framerate(15, 1);
//! let mut encoder = OpenH264Encoder::new(config)?;
//! let headers = encoder.headers()?;
//!
//! let mut converter = ColorConverter::new(640, 480);
//! let frame = RawFrame::new(640, 480, &rgba)?;
//! if let Some(packet) = encoder.encode(converter.convert(&frame), 0)? {
//!     // packet.data holds length-prefixed slice NAL units
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `openh264` - Enable the OpenH264 software encoder (built from source)

mod error;
mod frame;
pub mod nal;
mod traits;
mod types;

pub use error::CodecError;
pub use frame::{expected_frame_size, ColorConverter, PlanarImage, RawFrame, RGBA_BYTES_PER_PIXEL};
pub use nal::{nal_unit_type, NalUnit};
pub use traits::{CompressedPacket, ParameterSet, VideoEncoder};
pub use types::{
    ColorDescription, EncoderConfig, EncoderPreset, Profile, RateControlMode, SampleAspectRatio,
};

// OpenH264 backend
#[cfg(feature = "openh264")]
pub mod software;

#[cfg(feature = "openh264")]
pub use software::OpenH264Encoder;
