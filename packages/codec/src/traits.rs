//! The encoder capability and the data it produces.

use crate::{CodecError, EncoderConfig, PlanarImage};

/// Parameter sets taken once from the encoder's header output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    /// Sequence parameter set NAL (no start code, no length prefix).
    pub sps: Vec<u8>,
    /// Picture parameter set NAL (no start code, no length prefix).
    pub pps: Vec<u8>,
    /// SEI NAL units, already 4-byte length-prefixed so they can be prepended
    /// to a sample verbatim. Empty when the encoder emits none.
    pub sei: Vec<u8>,
}

impl ParameterSet {
    /// `(profile_idc, profile_compatibility, level_idc)` read from the SPS.
    pub fn profile_level(&self) -> Option<(u8, u8, u8)> {
        match self.sps.as_slice() {
            [_, profile, compat, level, ..] => Some((*profile, *compat, *level)),
            _ => None,
        }
    }

    /// Check that both mandatory parameter sets are present and typed correctly.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.sps.len() < 4 || self.sps[0] & 0x1F != crate::nal_unit_type::SPS {
            return Err(CodecError::MissingParameterSet("sps"));
        }
        if self.pps.is_empty() || self.pps[0] & 0x1F != crate::nal_unit_type::PPS {
            return Err(CodecError::MissingParameterSet("pps"));
        }
        Ok(())
    }
}

/// One compressed access unit emitted by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPacket {
    /// Slice NAL units, 4-byte length-prefixed.
    pub data: Vec<u8>,
    /// Decode timestamp in encoder timebase ticks. May be negative when the
    /// encoder reorders frames.
    pub dts: i64,
    /// Presentation timestamp in encoder timebase ticks.
    pub pts: i64,
    /// Whether this packet is decodable on its own.
    pub is_keyframe: bool,
}

impl CompressedPacket {
    /// Create a new compressed packet.
    #[must_use]
    pub fn new(data: Vec<u8>, dts: i64, pts: i64, is_keyframe: bool) -> Self {
        Self {
            data,
            dts,
            pts,
            is_keyframe,
        }
    }
}

/// Trait for H.264 encoders driven one frame at a time.
///
/// An encoder may hold frames back for reordering: `encode` then returns
/// `Ok(None)` and the packet surfaces later, either from a subsequent `encode`
/// or from `drain`. Packets come out in decode order.
///
/// # Example
///
/// ```ignore
/// let mut encoder = OpenH264Encoder::new(EncoderConfig::new(640, 480))?;
/// let headers = encoder.headers()?;
/// if let Some(packet) = encoder.encode(&image, 0)? {
///     // packet.data holds length-prefixed slice NALs
/// }
/// while encoder.delayed_frames() > 0 {
///     let Some(packet) = encoder.drain()? else { break };
/// }
/// encoder.close()?;
/// ```
pub trait VideoEncoder {
    /// Return the SPS, PPS and SEI the encoder will reference.
    fn headers(&mut self) -> Result<ParameterSet, CodecError>;

    /// Submit one picture with its presentation index.
    fn encode(
        &mut self,
        image: &PlanarImage,
        pts: i64,
    ) -> Result<Option<CompressedPacket>, CodecError>;

    /// Retrieve one buffered packet without submitting new input.
    fn drain(&mut self) -> Result<Option<CompressedPacket>, CodecError>;

    /// Number of submitted frames that have not produced a packet yet.
    fn delayed_frames(&self) -> usize;

    /// Release encoder resources. Further calls fail with
    /// `CodecError::EncoderClosed`.
    fn close(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    /// The configuration the encoder was opened with.
    fn config(&self) -> &EncoderConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_set_profile_level() {
        let params = ParameterSet {
            sps: vec![0x67, 0x42, 0xC0, 0x1E],
            pps: vec![0x68, 0xCE, 0x3C, 0x80],
            sei: Vec::new(),
        };
        assert_eq!(params.profile_level(), Some((0x42, 0xC0, 0x1E)));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_parameter_set_validate_rejects_swapped_sets() {
        let params = ParameterSet {
            sps: vec![0x68, 0xCE, 0x3C, 0x80],
            pps: vec![0x67, 0x42, 0xC0, 0x1E],
            sei: Vec::new(),
        };
        assert!(matches!(
            params.validate(),
            Err(CodecError::MissingParameterSet("sps"))
        ));
    }
}
