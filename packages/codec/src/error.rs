//! Error types for frame conversion and video encoding.

use thiserror::Error;

/// Errors that can occur while converting or encoding video frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Invalid frame dimensions.
    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The raw frame buffer does not match the configured geometry.
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// Invalid parameter passed to the encoder configuration.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The requested profile cannot be applied to the configuration.
    #[error("profile rejected: {0}")]
    ProfileRejected(String),

    /// The encoder's header output did not contain the expected parameter sets.
    #[error("missing parameter set: {0}")]
    MissingParameterSet(&'static str),

    /// A planar image does not match the encoder geometry.
    #[error("image geometry mismatch: encoder is {expected_width}x{expected_height}, image is {width}x{height}")]
    GeometryMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The encoder was used after `close`.
    #[error("encoder is closed")]
    EncoderClosed,

    /// Error reported by the encoder backend.
    #[error("encoder backend error: {0}")]
    Backend(String),
}

impl CodecError {
    /// Create an InvalidParam error with a message.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }

    /// Create a Backend error with a message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
