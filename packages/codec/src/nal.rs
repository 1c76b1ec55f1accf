//! H.264 NAL unit helpers: Annex B parsing and 4-byte length-prefix framing.

/// Size of the big-endian NAL length prefix used in ISO media samples.
pub const NAL_LENGTH_SIZE: usize = 4;

/// H.264 NAL unit type constants.
pub mod nal_unit_type {
    /// Non-IDR slice (P/B frame)
    pub const NON_IDR_SLICE: u8 = 1;
    /// IDR slice (keyframe)
    pub const IDR_SLICE: u8 = 5;
    /// Supplemental enhancement information
    pub const SEI: u8 = 6;
    /// Sequence parameter set
    pub const SPS: u8 = 7;
    /// Picture parameter set
    pub const PPS: u8 = 8;
}

/// A single H.264 NAL unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// The raw NAL unit data (without length prefix, without start code).
    pub data: Vec<u8>,
    /// NAL unit type (from first byte & 0x1F).
    pub nal_type: u8,
}

impl NalUnit {
    /// Wrap raw NAL bytes, reading the type from the header byte.
    pub fn new(data: Vec<u8>) -> Self {
        let nal_type = data.first().map_or(0, |b| b & 0x1F);
        Self { data, nal_type }
    }

    /// Returns true if this NAL unit is an IDR (keyframe) slice.
    pub fn is_idr(&self) -> bool {
        self.nal_type == nal_unit_type::IDR_SLICE
    }

    /// Returns true if this NAL unit is an SPS or PPS.
    pub fn is_parameter_set(&self) -> bool {
        self.nal_type == nal_unit_type::SPS || self.nal_type == nal_unit_type::PPS
    }

    /// Append this unit to `buf` with a 4-byte big-endian length prefix.
    pub fn write_length_prefixed(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
    }
}

/// Split raw Annex B H.264 data into NAL units.
///
/// Splits on 3-byte (0x000001) and 4-byte (0x00000001) start codes.
pub fn parse_annex_b(data: &[u8]) -> Vec<NalUnit> {
    // (start of start code, start of payload)
    let mut marks = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                marks.push((i, i + 3));
                i += 3;
                continue;
            }
            if i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                marks.push((i, i + 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    let mut nals = Vec::with_capacity(marks.len());
    for (idx, &(_, start)) in marks.iter().enumerate() {
        let end = marks.get(idx + 1).map_or(data.len(), |&(next, _)| next);
        if start < end {
            nals.push(NalUnit::new(data[start..end].to_vec()));
        }
    }
    nals
}

/// Split a 4-byte length-prefixed buffer into NAL units.
///
/// Returns `None` if a length prefix runs past the end of the buffer.
pub fn parse_length_prefixed(data: &[u8]) -> Option<Vec<NalUnit>> {
    let mut nals = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let header = data.get(offset..offset + NAL_LENGTH_SIZE)?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let start = offset + NAL_LENGTH_SIZE;
        let body = data.get(start..start + len)?;
        nals.push(NalUnit::new(body.to_vec()));
        offset = start + len;
    }
    Some(nals)
}

/// Re-frame NAL units as a 4-byte length-prefixed buffer, skipping parameter
/// sets when `strip_parameter_sets` is set.
pub fn to_length_prefixed(nals: &[NalUnit], strip_parameter_sets: bool) -> Vec<u8> {
    let total: usize = nals
        .iter()
        .filter(|n| !(strip_parameter_sets && n.is_parameter_set()))
        .map(|n| NAL_LENGTH_SIZE + n.data.len())
        .sum();
    let mut buf = Vec::with_capacity(total);
    for nal in nals
        .iter()
        .filter(|n| !(strip_parameter_sets && n.is_parameter_set()))
    {
        nal.write_length_prefixed(&mut buf);
    }
    buf
}
