//! Software H.264 encoding through OpenH264.
//!
//! Cisco's OpenH264 is built from source by the `openh264` crate, so no system
//! library or GPU is needed. It only produces the constrained baseline
//! profile and never reorders frames: every submitted picture yields exactly
//! one packet whose decode and presentation timestamps are equal.
//!
//! # Example
//!
//! ```ignore
//! use raw2mp4_codec::{EncoderConfig, OpenH264Encoder, VideoEncoder};
//!
//! let mut encoder = OpenH264Encoder::new(EncoderConfig::new(640, 480))?;
//! let headers = encoder.headers()?;
//! let packet = encoder.encode(&image, 0)?;
//! ```

mod encoder;

pub use encoder::OpenH264Encoder;
