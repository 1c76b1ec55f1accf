//! Read-only ISO BMFF box walker and file summary.
//!
//! Used by the CLI to report what was written, by the muxer to locate fields it
//! patches in place, and by the tests to check container output.

use anyhow::{Context, Result};

/// Parsed box header from an ISO BMFF byte stream.
#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    pub offset: usize,
    pub size: usize,
    pub header_size: usize,
}

impl BoxHeader {
    /// Returns the content bytes (after the header) within the given data slice.
    pub fn content<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let start = self.offset + self.header_size;
        let end = (self.offset + self.size).min(data.len());
        if start >= end {
            &[]
        } else {
            &data[start..end]
        }
    }
}

/// Iterate over the boxes at one nesting level of a byte slice.
///
/// Handles 64-bit `largesize` headers and a zero size meaning "to the end".
pub fn iter_boxes(data: &[u8]) -> Vec<BoxHeader> {
    let mut boxes = Vec::new();
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let size32 = read_u32(data, offset).unwrap_or(0);
        let box_type: [u8; 4] = [
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ];
        let (size, header_size) = match size32 {
            0 => (data.len() - offset, 8),
            1 => match read_u64(data, offset + 8) {
                Some(large) => (large as usize, 16),
                None => break,
            },
            n => (n as usize, 8),
        };
        if size < header_size {
            break;
        }
        boxes.push(BoxHeader {
            box_type,
            offset,
            size: size.min(data.len() - offset),
            header_size,
        });
        offset = match offset.checked_add(size) {
            Some(next) => next,
            None => break,
        };
    }
    boxes
}

/// Find a specific box by type (non-recursive, searches top-level only).
pub fn find_box(data: &[u8], box_type: &[u8; 4]) -> Option<BoxHeader> {
    iter_boxes(data)
        .into_iter()
        .find(|b| &b.box_type == box_type)
}

/// Find a box by navigating a path of nested container boxes.
/// Returns the content bytes of the final box in the path.
pub fn find_box_path<'a>(data: &'a [u8], path: &[&[u8; 4]]) -> Option<&'a [u8]> {
    let (start, len) = find_box_offset(data, path)?;
    Some(&data[start..start + len])
}

/// Like [`find_box_path`], but returns `(offset, length)` of the final box's
/// content relative to the start of `data`.
pub fn find_box_offset(data: &[u8], path: &[&[u8; 4]]) -> Option<(usize, usize)> {
    let mut base = 0;
    let mut len = data.len();
    for box_type in path {
        let scope = &data[base..base + len];
        let header = find_box(scope, box_type)?;
        let content = header.content(scope);
        base += header.offset + header.header_size;
        len = content.len();
    }
    Some((base, len))
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let b = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let b = data.get(at..at + 8)?;
    Some(u64::from_be_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

/// One `elst` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEntry {
    /// Segment duration in movie timescale.
    pub segment_duration: u64,
    /// Start of the segment on the media time-line, in media timescale.
    pub media_time: i64,
}

/// What a written file contains, as far as this crate writes it.
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
    pub major_brand: [u8; 4],
    pub compatible_brands: Vec<[u8; 4]>,
    pub movie_timescale: u32,
    pub movie_duration: u64,
    pub track_duration: u64,
    pub media_timescale: u32,
    pub width: u16,
    pub height: u16,
    /// `(profile_idc, profile_compatibility, level_idc)` from `avcC`.
    pub profile: (u8, u8, u8),
    pub edits: Vec<EditEntry>,
    pub sample_count: u32,
    pub sample_sizes: Vec<u32>,
    pub sample_durations: Vec<u32>,
    /// 1-based indices of sync samples.
    pub sync_samples: Vec<u32>,
    /// Bytes of the first sample.
    pub first_sample: Vec<u8>,
    /// Number of `moof` boxes.
    pub fragment_count: u32,
}

impl FileSummary {
    /// Presentation duration in seconds, from the first edit when present.
    pub fn duration_secs(&self) -> f64 {
        if self.movie_timescale == 0 {
            return 0.0;
        }
        let ticks = self
            .edits
            .first()
            .map_or(self.movie_duration, |e| e.segment_duration);
        ticks as f64 / f64::from(self.movie_timescale)
    }
}

/// Summarize a complete file produced by [`crate::Mp4Muxer`].
pub fn summarize(data: &[u8]) -> Result<FileSummary> {
    let mut summary = FileSummary::default();

    let ftyp = find_box_path(data, &[b"ftyp"]).context("missing ftyp box")?;
    if ftyp.len() < 8 {
        anyhow::bail!("ftyp content too short");
    }
    summary.major_brand = [ftyp[0], ftyp[1], ftyp[2], ftyp[3]];
    summary.compatible_brands = ftyp[8..]
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();

    let mvhd = find_box_path(data, &[b"moov", b"mvhd"]).context("missing mvhd box")?;
    let (timescale, duration) = versioned_time(mvhd).context("mvhd content too short")?;
    summary.movie_timescale = timescale;
    summary.movie_duration = duration;

    let tkhd = find_box_path(data, &[b"moov", b"trak", b"tkhd"]).context("missing tkhd box")?;
    summary.track_duration = tkhd_duration(tkhd).context("tkhd content too short")?;

    let mdhd = find_box_path(data, &[b"moov", b"trak", b"mdia", b"mdhd"])
        .context("missing mdhd box")?;
    summary.media_timescale = versioned_time(mdhd).context("mdhd content too short")?.0;

    if let Some(elst) = find_box_path(data, &[b"moov", b"trak", b"edts", b"elst"]) {
        summary.edits = parse_elst(elst).context("malformed elst box")?;
    }

    let stbl = find_box_path(data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl"])
        .context("missing stbl box")?;
    parse_sample_entry(stbl, &mut summary)?;
    parse_sample_tables(data, stbl, &mut summary)?;
    parse_fragments(data, &mut summary)?;

    Ok(summary)
}

/// `(timescale, duration)` of an `mvhd` or `mdhd` payload.
fn versioned_time(content: &[u8]) -> Option<(u32, u64)> {
    if content.first()? == &1 {
        Some((read_u32(content, 20)?, read_u64(content, 24)?))
    } else {
        Some((read_u32(content, 12)?, u64::from(read_u32(content, 16)?)))
    }
}

fn tkhd_duration(content: &[u8]) -> Option<u64> {
    if content.first()? == &1 {
        read_u64(content, 28)
    } else {
        read_u32(content, 20).map(u64::from)
    }
}

fn parse_elst(content: &[u8]) -> Option<Vec<EditEntry>> {
    let version = *content.first()?;
    let count = read_u32(content, 4)? as usize;
    let entry_size = if version == 1 { 20 } else { 12 };
    let mut edits = Vec::with_capacity(count);
    for i in 0..count {
        let at = 8 + i * entry_size;
        let edit = if version == 1 {
            EditEntry {
                segment_duration: read_u64(content, at)?,
                media_time: read_u64(content, at + 8)? as i64,
            }
        } else {
            EditEntry {
                segment_duration: u64::from(read_u32(content, at)?),
                media_time: i64::from(read_u32(content, at + 4)? as i32),
            }
        };
        edits.push(edit);
    }
    Some(edits)
}

fn parse_sample_entry(stbl: &[u8], summary: &mut FileSummary) -> Result<()> {
    let stsd = find_box_path(stbl, &[b"stsd"]).context("missing stsd box")?;
    if stsd.len() < 8 {
        anyhow::bail!("stsd content too short");
    }
    let entries = &stsd[8..];
    let avc1 = find_box(entries, b"avc1").context("missing avc1 sample entry")?;
    let avc1 = avc1.content(entries);
    // 6 reserved + 2 data_reference_index + 16 pre_defined/reserved, then
    // width and height; the fixed part is 78 bytes long.
    if avc1.len() < 78 {
        anyhow::bail!("avc1 content too short: {} bytes", avc1.len());
    }
    summary.width = read_u16(avc1, 24).unwrap_or(0);
    summary.height = read_u16(avc1, 26).unwrap_or(0);

    let avcc = find_box_path(&avc1[78..], &[b"avcC"]).context("missing avcC box")?;
    if avcc.len() < 4 {
        anyhow::bail!("avcC content too short");
    }
    summary.profile = (avcc[1], avcc[2], avcc[3]);
    Ok(())
}

fn parse_sample_tables(data: &[u8], stbl: &[u8], summary: &mut FileSummary) -> Result<()> {
    let stsz = find_box_path(stbl, &[b"stsz"]).context("missing stsz box")?;
    let default_size = read_u32(stsz, 4).context("stsz content too short")?;
    let count = read_u32(stsz, 8).context("stsz content too short")?;
    summary.sample_count = count;
    summary.sample_sizes = (0..count as usize)
        .map(|i| {
            if default_size != 0 {
                Some(default_size)
            } else {
                read_u32(stsz, 12 + i * 4)
            }
        })
        .collect::<Option<_>>()
        .context("stsz entries truncated")?;

    if let Some(stts) = find_box_path(stbl, &[b"stts"]) {
        let entries = read_u32(stts, 4).context("stts content too short")? as usize;
        for i in 0..entries {
            let run = read_u32(stts, 8 + i * 8).context("stts entries truncated")?;
            let delta = read_u32(stts, 12 + i * 8).context("stts entries truncated")?;
            summary
                .sample_durations
                .extend(std::iter::repeat(delta).take(run as usize));
        }
    }

    match find_box_path(stbl, &[b"stss"]) {
        Some(stss) => {
            let entries = read_u32(stss, 4).context("stss content too short")? as usize;
            summary.sync_samples = (0..entries)
                .map(|i| read_u32(stss, 8 + i * 4))
                .collect::<Option<_>>()
                .context("stss entries truncated")?;
        }
        None => summary.sync_samples = (1..=count).collect(),
    }

    if count > 0 {
        let first_chunk = if let Some(stco) = find_box_path(stbl, &[b"stco"]) {
            read_u32(stco, 8).map(u64::from)
        } else {
            find_box_path(stbl, &[b"co64"]).and_then(|co64| read_u64(co64, 8))
        }
        .context("missing chunk offset for the first sample")?;
        let start = first_chunk as usize;
        let end = start + summary.sample_sizes[0] as usize;
        summary.first_sample = data
            .get(start..end)
            .context("first sample lies outside the file")?
            .to_vec();
    }
    Ok(())
}

fn parse_fragments(data: &[u8], summary: &mut FileSummary) -> Result<()> {
    for moof in iter_boxes(data).iter().filter(|b| &b.box_type == b"moof") {
        summary.fragment_count += 1;
        let content = moof.content(data);
        let trun = find_box_path(content, &[b"traf", b"trun"]).context("moof without trun")?;

        let flags = read_u32(trun, 0).context("trun content too short")? & 0x00FF_FFFF;
        let count = read_u32(trun, 4).context("trun content too short")?;
        let mut at = 8;
        let mut data_offset = 0i64;
        if flags & 0x1 != 0 {
            data_offset = i64::from(read_u32(trun, at).context("trun truncated")? as i32);
            at += 4;
        }
        if flags & 0x4 != 0 {
            at += 4;
        }

        let mut offset = (moof.offset as i64 + data_offset) as usize;
        for _ in 0..count {
            let mut duration = 0;
            let mut size = 0;
            let mut sample_flags = 0;
            if flags & 0x100 != 0 {
                duration = read_u32(trun, at).context("trun truncated")?;
                at += 4;
            }
            if flags & 0x200 != 0 {
                size = read_u32(trun, at).context("trun truncated")?;
                at += 4;
            }
            if flags & 0x400 != 0 {
                sample_flags = read_u32(trun, at).context("trun truncated")?;
                at += 4;
            }
            if flags & 0x800 != 0 {
                at += 4;
            }

            summary.sample_count += 1;
            summary.sample_sizes.push(size);
            summary.sample_durations.push(duration);
            // sample_is_non_sync_sample
            if sample_flags & 0x0001_0000 == 0 {
                summary.sync_samples.push(summary.sample_count);
            }
            if summary.sample_count == 1 {
                summary.first_sample = data
                    .get(offset..offset + size as usize)
                    .context("first sample lies outside the file")?
                    .to_vec();
            }
            offset += size as usize;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((8 + content.len()) as u32).to_be_bytes());
        buf.extend_from_slice(box_type);
        buf.extend_from_slice(content);
        buf
    }

    #[test]
    fn test_iter_boxes_handles_largesize() {
        let mut data = boxed(b"ftyp", b"isom\0\0\0\0");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&20u64.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3, 4]);

        let boxes = iter_boxes(&data);
        assert_eq!(boxes.len(), 2);
        assert_eq!(&boxes[1].box_type, b"mdat");
        assert_eq!(boxes[1].header_size, 16);
        assert_eq!(boxes[1].content(&data), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_find_box_offset_nested() {
        let mvhd = boxed(b"mvhd", &[7, 7, 7]);
        let moov = boxed(b"moov", &mvhd);
        let mut data = boxed(b"ftyp", b"isom\0\0\0\0");
        data.extend_from_slice(&moov);

        let (start, len) = find_box_offset(&data, &[b"moov", b"mvhd"]).unwrap();
        assert_eq!(len, 3);
        assert_eq!(&data[start..start + len], &[7, 7, 7]);
        assert_eq!(find_box_path(&data, &[b"moov", b"mvhd"]), Some(&[7u8, 7, 7][..]));
        assert!(find_box_path(&data, &[b"moov", b"trak"]).is_none());
    }

    #[test]
    fn test_parse_elst_versions() {
        let mut v0 = vec![0, 0, 0, 0];
        v0.extend_from_slice(&1u32.to_be_bytes());
        v0.extend_from_slice(&2400u32.to_be_bytes());
        v0.extend_from_slice(&1u32.to_be_bytes());
        v0.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        assert_eq!(
            parse_elst(&v0).unwrap(),
            vec![EditEntry {
                segment_duration: 2400,
                media_time: 1
            }]
        );
    }

    #[test]
    fn test_summarize_rejects_garbage() {
        assert!(summarize(b"not an mp4 file").is_err());
    }
}
