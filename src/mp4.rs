//! ISO base media (MP4) muxer for a single H.264 video track.
//!
//! The [`ContainerMuxer`] trait is the capability the [`crate::ContainerWriter`]
//! drives; [`Mp4Muxer`] implements it over any seekable sink.
//!
//! # File Structure
//!
//! ```text
//! Progressive:
//!   ftyp
//!   mdat (64-bit size, patched on finish; samples stream in as appended)
//!   moov (mvhd, trak{tkhd, edts/elst, mdia{mdhd, hdlr, minf{vmhd, dinf, stbl}}})
//!
//! Fragmented:
//!   ftyp
//!   moov (empty sample tables, mvex/trex; elst and durations patched on finish)
//!   moof (mfhd, traf{tfhd, tfdt, trun}) + mdat, one pair per flushed fragment
//! ```

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use raw2mp4_codec::nal::NAL_LENGTH_SIZE;
use raw2mp4_codec::{ColorDescription, ParameterSet, SampleAspectRatio};

use crate::inspect::find_box_offset;

/// Edit duration written while the real duration is not known yet.
pub const EDIT_DURATION_UNKNOWN32: u64 = 0xFFFF_FFFF;

const TRACK_ID: u32 = 1;
const SAMPLE_ENTRY_INDEX: u32 = 1;
const MDAT_HEADER_SIZE: u64 = 16;

/// Identity transformation matrix for `mvhd` and `tkhd`.
const MATRIX: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

/// File-level parameters fixed at creation.
#[derive(Debug, Clone)]
pub struct FileParams {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
    pub movie_timescale: u32,
    pub fragmented: bool,
}

/// Kind of track to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
}

/// Media-level parameters of a track.
#[derive(Debug, Clone)]
pub struct MediaParams {
    pub timescale: u32,
    pub handler_name: String,
}

/// Coded size, display size and VUI mirrored into the track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGeometry {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Display width, 16.16 fixed point.
    pub display_width: u32,
    /// Display height, 16.16 fixed point.
    pub display_height: u32,
    pub sar: Option<SampleAspectRatio>,
    pub color: ColorDescription,
}

impl TrackGeometry {
    /// Geometry for a `width` x `height` picture, stretching the display size
    /// by the sample aspect ratio: wider when it exceeds one, taller otherwise.
    pub fn new(
        width: u32,
        height: u32,
        sar: Option<SampleAspectRatio>,
        color: ColorDescription,
    ) -> Self {
        let mut display_width = width << 16;
        let mut display_height = height << 16;
        let sar = sar.filter(|s| s.ratio().is_some());
        if let Some(ratio) = sar.and_then(|s| s.ratio()) {
            if ratio > 1.0 {
                display_width = (f64::from(display_width) * ratio) as u32;
            } else {
                display_height = (f64::from(display_height) / ratio) as u32;
            }
        }
        Self {
            width,
            height,
            display_width,
            display_height,
            sar,
            color,
        }
    }
}

/// One sample handed to the muxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Length-prefixed NAL units.
    pub data: Vec<u8>,
    /// Decode time in media timescale.
    pub dts: u64,
    /// Composition time in media timescale.
    pub cts: u64,
    /// Sample description index the sample refers to.
    pub entry: u32,
    /// Random access (sync) sample.
    pub sync: bool,
}

/// One timeline edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    /// Start on the media time-line, in media timescale.
    pub start_time: u64,
    /// Segment duration in movie timescale, or [`EDIT_DURATION_UNKNOWN32`].
    pub duration: u64,
}

/// Container backend capability.
///
/// Samples must be appended in non-decreasing decode order. A sample's
/// duration is the distance to the next sample's decode time; the last pooled
/// sample gets its duration from [`ContainerMuxer::flush_pooled`].
pub trait ContainerMuxer {
    /// Create a track and return its id.
    fn create_track(&mut self, kind: TrackKind, media: &MediaParams) -> Result<u32>;

    /// Set coded/display size and colour information of a track.
    fn set_track_geometry(&mut self, track: u32, geometry: &TrackGeometry) -> Result<()>;

    /// Add an `avc1` sample entry built from the parameter sets and return its
    /// index. `bitrate_info` requests a `btrt` extension.
    fn add_sample_entry(
        &mut self,
        track: u32,
        params: &ParameterSet,
        bitrate_info: bool,
    ) -> Result<u32>;

    /// Append one sample.
    fn append_sample(&mut self, track: u32, sample: Sample) -> Result<()>;

    /// Close the pending samples, giving the last one `last_duration` media
    /// ticks. In fragmented mode this writes them out as a fragment.
    fn flush_pooled(&mut self, track: u32, last_duration: u32) -> Result<()>;

    /// Start a new movie fragment. The pool must have been flushed.
    fn begin_fragment(&mut self) -> Result<()>;

    /// Add an edit to the track's edit list.
    fn set_edit(&mut self, track: u32, edit: Edit) -> Result<()>;

    /// Replace the 1-based `index`th edit of the track.
    fn update_edit(&mut self, track: u32, index: u32, edit: Edit) -> Result<()>;

    /// Movie header timescale.
    fn movie_timescale(&self) -> u32;

    /// Media timescale of a track, `None` if the track does not exist.
    fn media_timescale(&self, track: u32) -> Option<u32>;

    /// Write the remaining structure and flush the sink.
    fn finish(&mut self) -> Result<()>;
}

/// Sample bookkeeping kept for the sample tables or the current fragment.
#[derive(Debug, Clone)]
struct SampleRecord {
    size: u32,
    dts: u64,
    /// `None` until the next sample or a flush fixes it.
    duration: Option<u32>,
    cts_offset: i64,
    sync: bool,
}

#[derive(Debug, Clone)]
struct SampleEntry {
    sps: Vec<u8>,
    pps: Vec<u8>,
    bitrate_info: bool,
}

#[derive(Debug)]
struct Track {
    media: MediaParams,
    geometry: Option<TrackGeometry>,
    entry: Option<SampleEntry>,
    edits: Vec<Edit>,
    /// Progressive: every sample. Fragmented: the current pool.
    samples: Vec<SampleRecord>,
    /// Fragmented: payload of the pooled samples.
    pool: Vec<u8>,
    last_dts: Option<u64>,
    /// Sum of resolved sample durations, in media timescale.
    media_duration: u64,
    sample_count: u64,
}

impl Track {
    fn new(media: MediaParams) -> Self {
        Self {
            media,
            geometry: None,
            entry: None,
            edits: Vec::new(),
            samples: Vec::new(),
            pool: Vec::new(),
            last_dts: None,
            media_duration: 0,
            sample_count: 0,
        }
    }

    /// Track duration in movie timescale.
    fn movie_duration(&self, movie_timescale: u32) -> u64 {
        let known: Vec<u64> = self
            .edits
            .iter()
            .map(|e| e.duration)
            .filter(|&d| d != EDIT_DURATION_UNKNOWN32)
            .collect();
        if !self.edits.is_empty() {
            return known.iter().sum();
        }
        if self.media.timescale == 0 {
            return 0;
        }
        self.media_duration * u64::from(movie_timescale) / u64::from(self.media.timescale)
    }
}

/// Byte positions in the written `moov` that are patched on finish.
#[derive(Debug, Clone, Copy)]
struct MoovPatches {
    mvhd_duration: u64,
    tkhd_duration: u64,
    elst_entries: Option<u64>,
}

/// MP4 muxer writing to any seekable sink.
pub struct Mp4Muxer<W: Write + Seek> {
    writer: W,
    params: FileParams,
    track: Option<Track>,
    /// Progressive: absolute position of the `mdat` header.
    mdat_start: u64,
    /// Progressive: payload bytes written into `mdat`.
    mdat_payload: u64,
    /// Fragmented: set once the `moov` has been written.
    moov_patches: Option<MoovPatches>,
    fragment_sequence: u32,
    finished: bool,
}

impl Mp4Muxer<BufWriter<File>> {
    /// Create `path` and write the file header.
    pub fn create(path: impl AsRef<Path>, params: FileParams) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Unable to open file {}", path.display()))?;
        Self::new(BufWriter::new(file), params)
    }
}

impl<W: Write + Seek> Mp4Muxer<W> {
    /// Wrap `writer` and write the file header.
    pub fn new(mut writer: W, params: FileParams) -> Result<Self> {
        if params.movie_timescale == 0 {
            anyhow::bail!("movie timescale must be non-zero");
        }
        let mut buf = Vec::new();
        write_ftyp(&mut buf, &params);
        let mut mdat_start = buf.len() as u64;
        if !params.fragmented {
            // size 1: the real size follows as a 64-bit largesize
            buf.extend_from_slice(&1u32.to_be_bytes());
            buf.extend_from_slice(b"mdat");
            buf.extend_from_slice(&MDAT_HEADER_SIZE.to_be_bytes());
        } else {
            mdat_start = 0;
        }
        writer
            .write_all(&buf)
            .context("failed to write the file header")?;

        Ok(Self {
            writer,
            params,
            track: None,
            mdat_start,
            mdat_payload: 0,
            moov_patches: None,
            fragment_sequence: 0,
            finished: false,
        })
    }

    /// Consume the muxer and return the sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Number of movie fragments written so far.
    pub fn fragments_written(&self) -> u32 {
        self.fragment_sequence
    }

    fn track_mut(&mut self, track: u32) -> Result<&mut Track> {
        if track != TRACK_ID {
            anyhow::bail!("unknown track {}", track);
        }
        self.track.as_mut().context("no track has been created")
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            anyhow::bail!("movie is already finished");
        }
        Ok(())
    }

    /// Write the fragmented-mode `moov` and remember where its durations live.
    fn write_fragmented_moov(&mut self) -> Result<()> {
        let track = self.track.as_ref().context("no track has been created")?;
        let moov = build_moov(&self.params, track, None)?;

        let position = self
            .writer
            .stream_position()
            .context("failed to query file position")?;
        let locate = |path: &[&[u8; 4]]| -> Option<u64> {
            find_box_offset(&moov, path).map(|(at, _)| position + at as u64)
        };
        let patches = MoovPatches {
            mvhd_duration: locate(&[b"moov", b"mvhd"]).context("moov has no mvhd")? + 16,
            tkhd_duration: locate(&[b"moov", b"trak", b"tkhd"]).context("moov has no tkhd")? + 20,
            elst_entries: locate(&[b"moov", b"trak", b"edts", b"elst"]).map(|at| at + 8),
        };

        self.writer
            .write_all(&moov)
            .context("failed to write the movie header")?;
        self.moov_patches = Some(patches);
        Ok(())
    }

    fn write_fragment(&mut self) -> Result<()> {
        if self.moov_patches.is_none() {
            self.write_fragmented_moov()?;
        }
        let track = self.track.as_mut().context("no track has been created")?;
        if track.samples.is_empty() {
            return Ok(());
        }
        self.fragment_sequence += 1;
        let sequence = self.fragment_sequence;

        let moof = build_moof(sequence, &track.samples)?;
        let mut buf = moof;
        buf.extend_from_slice(&((8 + track.pool.len()) as u32).to_be_bytes());
        buf.extend_from_slice(b"mdat");
        buf.extend_from_slice(&track.pool);
        track.samples.clear();
        track.pool.clear();

        tracing::debug!("Wrote fragment {} ({} bytes)", sequence, buf.len());
        self.writer
            .write_all(&buf)
            .context("failed to write a movie fragment")?;
        Ok(())
    }

    fn patch_fragmented_durations(&mut self) -> Result<()> {
        let Some(patches) = self.moov_patches else {
            return Ok(());
        };
        let movie_timescale = self.params.movie_timescale;
        let track = self.track.as_ref().context("no track has been created")?;
        let duration = track.movie_duration(movie_timescale);
        let duration = u32::try_from(duration).context("movie duration does not fit 32 bits")?;
        let mut elst = Vec::new();
        for edit in &track.edits {
            write_elst_entry_v0(&mut elst, edit)?;
        }

        let end = self
            .writer
            .stream_position()
            .context("failed to query file position")?;
        let mut writes = vec![
            (patches.mvhd_duration, duration.to_be_bytes().to_vec()),
            (patches.tkhd_duration, duration.to_be_bytes().to_vec()),
        ];
        if let Some(at) = patches.elst_entries {
            writes.push((at, elst));
        }
        for (at, bytes) in writes {
            self.writer
                .seek(SeekFrom::Start(at))
                .context("failed to seek in the output file")?;
            self.writer
                .write_all(&bytes)
                .context("failed to update the movie header")?;
        }
        self.writer
            .seek(SeekFrom::Start(end))
            .context("failed to seek in the output file")?;
        Ok(())
    }
}

impl<W: Write + Seek> ContainerMuxer for Mp4Muxer<W> {
    fn create_track(&mut self, kind: TrackKind, media: &MediaParams) -> Result<u32> {
        self.ensure_open()?;
        if self.track.is_some() {
            anyhow::bail!("only one track per file is supported");
        }
        match kind {
            TrackKind::Video => {}
        }
        if media.timescale == 0 {
            anyhow::bail!("media timescale must be non-zero");
        }
        self.track = Some(Track::new(media.clone()));
        Ok(TRACK_ID)
    }

    fn set_track_geometry(&mut self, track: u32, geometry: &TrackGeometry) -> Result<()> {
        if geometry.width == 0
            || geometry.height == 0
            || geometry.width > u32::from(u16::MAX)
            || geometry.height > u32::from(u16::MAX)
        {
            anyhow::bail!(
                "track geometry {}x{} does not fit a visual sample entry",
                geometry.width,
                geometry.height
            );
        }
        self.track_mut(track)?.geometry = Some(*geometry);
        Ok(())
    }

    fn add_sample_entry(
        &mut self,
        track: u32,
        params: &ParameterSet,
        bitrate_info: bool,
    ) -> Result<u32> {
        params.validate().context("malformed parameter sets")?;
        let track = self.track_mut(track)?;
        if track.geometry.is_none() {
            anyhow::bail!("track geometry must be set before adding a sample entry");
        }
        if track.entry.is_some() {
            anyhow::bail!("track already has a sample entry");
        }
        track.entry = Some(SampleEntry {
            sps: params.sps.clone(),
            pps: params.pps.clone(),
            bitrate_info,
        });
        Ok(SAMPLE_ENTRY_INDEX)
    }

    fn append_sample(&mut self, track: u32, sample: Sample) -> Result<()> {
        self.ensure_open()?;
        let fragmented = self.params.fragmented;
        let track = self.track_mut(track)?;
        if track.entry.is_none() {
            anyhow::bail!("sample appended before the sample entry exists");
        }
        if sample.entry != SAMPLE_ENTRY_INDEX {
            anyhow::bail!("unknown sample description index {}", sample.entry);
        }
        if let Some(last) = track.last_dts {
            if sample.dts < last {
                anyhow::bail!("dts {} is smaller than the previous {}", sample.dts, last);
            }
        }
        let size = u32::try_from(sample.data.len()).context("sample is larger than 4 GiB")?;

        // The previous sample's duration is now known.
        if let (Some(prev), Some(last)) = (track.samples.last_mut(), track.last_dts) {
            if prev.duration.is_none() {
                let delta = u32::try_from(sample.dts - last).context("sample delta overflow")?;
                prev.duration = Some(delta);
                track.media_duration += u64::from(delta);
            }
        }

        track.samples.push(SampleRecord {
            size,
            dts: sample.dts,
            duration: None,
            cts_offset: sample.cts as i64 - sample.dts as i64,
            sync: sample.sync,
        });
        track.last_dts = Some(sample.dts);
        track.sample_count += 1;

        if fragmented {
            track.pool.extend_from_slice(&sample.data);
        } else {
            self.writer
                .write_all(&sample.data)
                .context("failed to write sample data")?;
            self.mdat_payload += u64::from(size);
        }
        Ok(())
    }

    fn flush_pooled(&mut self, track: u32, last_duration: u32) -> Result<()> {
        self.ensure_open()?;
        let fragmented = self.params.fragmented;
        let track = self.track_mut(track)?;
        if let Some(last) = track.samples.last_mut() {
            if last.duration.is_none() {
                last.duration = Some(last_duration);
                track.media_duration += u64::from(last_duration);
            }
        }
        if fragmented {
            self.write_fragment()?;
        }
        Ok(())
    }

    fn begin_fragment(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.params.fragmented {
            anyhow::bail!("movie fragments need fragmented output");
        }
        let track = self.track.as_ref().context("no track has been created")?;
        if !track.samples.is_empty() {
            anyhow::bail!("pooled samples must be flushed before a new fragment");
        }
        Ok(())
    }

    fn set_edit(&mut self, track: u32, edit: Edit) -> Result<()> {
        self.ensure_open()?;
        let patched = self.moov_patches.is_some();
        let track = self.track_mut(track)?;
        if patched {
            anyhow::bail!("edits cannot be added after the movie header is written");
        }
        track.edits.push(edit);
        Ok(())
    }

    fn update_edit(&mut self, track: u32, index: u32, edit: Edit) -> Result<()> {
        self.ensure_open()?;
        let track = self.track_mut(track)?;
        let slot = index
            .checked_sub(1)
            .and_then(|i| track.edits.get_mut(i as usize))
            .with_context(|| format!("no edit with index {}", index))?;
        *slot = edit;
        Ok(())
    }

    fn movie_timescale(&self) -> u32 {
        self.params.movie_timescale
    }

    fn media_timescale(&self, track: u32) -> Option<u32> {
        if track != TRACK_ID {
            return None;
        }
        self.track.as_ref().map(|t| t.media.timescale)
    }

    fn finish(&mut self) -> Result<()> {
        self.ensure_open()?;
        let track = self.track.as_ref().context("no track has been created")?;
        if track.samples.iter().any(|s| s.duration.is_none()) {
            anyhow::bail!("the last sample has no duration, flush pooled samples first");
        }

        if self.params.fragmented {
            if self.track.as_ref().is_some_and(|t| !t.samples.is_empty()) {
                self.write_fragment()?;
            }
            if self.moov_patches.is_none() {
                self.write_fragmented_moov()?;
            }
            self.patch_fragmented_durations()?;
        } else {
            let chunk_offset = self.mdat_start + MDAT_HEADER_SIZE;
            let moov = build_moov(&self.params, track, Some(chunk_offset))?;

            let end = self
                .writer
                .stream_position()
                .context("failed to query file position")?;
            self.writer
                .seek(SeekFrom::Start(self.mdat_start + 8))
                .context("failed to seek in the output file")?;
            self.writer
                .write_all(&(MDAT_HEADER_SIZE + self.mdat_payload).to_be_bytes())
                .context("failed to update the media data size")?;
            self.writer
                .seek(SeekFrom::Start(end))
                .context("failed to seek in the output file")?;
            self.writer
                .write_all(&moov)
                .context("failed to write the movie header")?;
        }

        self.writer.flush().context("failed to flush the output file")?;
        self.finished = true;
        tracing::debug!("Movie finished");
        Ok(())
    }
}

// ========================================
// Box writing helpers
// ========================================

fn write_box(buf: &mut Vec<u8>, box_type: &[u8; 4], content: &[u8]) {
    buf.extend_from_slice(&((8 + content.len()) as u32).to_be_bytes());
    buf.extend_from_slice(box_type);
    buf.extend_from_slice(content);
}

fn write_full_box(buf: &mut Vec<u8>, box_type: &[u8; 4], version: u8, flags: u32, content: &[u8]) {
    let mut full = Vec::with_capacity(4 + content.len());
    full.push(version);
    full.extend_from_slice(&flags.to_be_bytes()[1..]);
    full.extend_from_slice(content);
    write_box(buf, box_type, &full);
}

fn write_ftyp(buf: &mut Vec<u8>, params: &FileParams) {
    let mut content = Vec::new();
    content.extend_from_slice(&params.major_brand);
    content.extend_from_slice(&params.minor_version.to_be_bytes());
    for brand in &params.compatible_brands {
        content.extend_from_slice(brand);
    }
    write_box(buf, b"ftyp", &content);
}

/// Build the `moov`. `chunk_offset` is the position of the first sample for
/// progressive files; `None` writes empty sample tables plus `mvex`.
fn build_moov(params: &FileParams, track: &Track, chunk_offset: Option<u64>) -> Result<Vec<u8>> {
    let fragmented = chunk_offset.is_none();
    let duration = if fragmented {
        0
    } else {
        track.movie_duration(params.movie_timescale)
    };

    let mut content = Vec::new();
    write_mvhd(&mut content, params.movie_timescale, duration);
    write_trak(&mut content, params, track, duration, chunk_offset)?;
    if fragmented {
        let mut trex = Vec::new();
        trex.extend_from_slice(&TRACK_ID.to_be_bytes());
        trex.extend_from_slice(&SAMPLE_ENTRY_INDEX.to_be_bytes()); // default_sample_description_index
        trex.extend_from_slice(&0u32.to_be_bytes()); // default_sample_duration
        trex.extend_from_slice(&0u32.to_be_bytes()); // default_sample_size
        trex.extend_from_slice(&0u32.to_be_bytes()); // default_sample_flags
        let mut mvex = Vec::new();
        write_full_box(&mut mvex, b"trex", 0, 0, &trex);
        write_box(&mut content, b"mvex", &mvex);
    }

    let mut buf = Vec::new();
    write_box(&mut buf, b"moov", &content);
    Ok(buf)
}

fn write_mvhd(buf: &mut Vec<u8>, timescale: u32, duration: u64) {
    let mut content = Vec::new();
    let version = if duration > u64::from(u32::MAX) { 1 } else { 0 };
    if version == 1 {
        content.extend_from_slice(&0u64.to_be_bytes()); // creation time
        content.extend_from_slice(&0u64.to_be_bytes()); // modification time
        content.extend_from_slice(&timescale.to_be_bytes());
        content.extend_from_slice(&duration.to_be_bytes());
    } else {
        content.extend_from_slice(&0u32.to_be_bytes()); // creation time
        content.extend_from_slice(&0u32.to_be_bytes()); // modification time
        content.extend_from_slice(&timescale.to_be_bytes());
        content.extend_from_slice(&(duration as u32).to_be_bytes());
    }
    content.extend_from_slice(&0x00010000u32.to_be_bytes()); // rate (1.0)
    content.extend_from_slice(&0x0100u16.to_be_bytes()); // volume (1.0)
    content.extend_from_slice(&[0; 10]); // reserved
    for m in &MATRIX {
        content.extend_from_slice(&m.to_be_bytes());
    }
    content.extend_from_slice(&[0; 24]); // pre_defined
    content.extend_from_slice(&(TRACK_ID + 1).to_be_bytes()); // next_track_id
    write_full_box(buf, b"mvhd", version, 0, &content);
}

fn write_trak(
    buf: &mut Vec<u8>,
    params: &FileParams,
    track: &Track,
    duration: u64,
    chunk_offset: Option<u64>,
) -> Result<()> {
    let geometry = track.geometry.context("track geometry was never set")?;
    let entry = track.entry.as_ref().context("track has no sample entry")?;

    let mut content = Vec::new();
    write_tkhd(&mut content, &geometry, duration);
    if !track.edits.is_empty() {
        write_edts(&mut content, &track.edits, chunk_offset.is_none())?;
    }

    let mut mdia = Vec::new();
    write_mdhd(&mut mdia, track, chunk_offset.is_none());
    write_hdlr(&mut mdia, &track.media.handler_name);

    let mut minf = Vec::new();
    // vmhd: graphics_mode + opcolor, flags 1
    write_full_box(&mut minf, b"vmhd", 0, 1, &[0; 8]);
    write_dinf(&mut minf);
    write_stbl(&mut minf, params, track, &geometry, entry, chunk_offset)?;
    write_box(&mut mdia, b"minf", &minf);

    write_box(&mut content, b"mdia", &mdia);
    write_box(buf, b"trak", &content);
    Ok(())
}

fn write_tkhd(buf: &mut Vec<u8>, geometry: &TrackGeometry, duration: u64) {
    let mut content = Vec::new();
    let version = if duration > u64::from(u32::MAX) { 1 } else { 0 };
    if version == 1 {
        content.extend_from_slice(&[0; 16]); // creation/modification time
        content.extend_from_slice(&TRACK_ID.to_be_bytes());
        content.extend_from_slice(&0u32.to_be_bytes()); // reserved
        content.extend_from_slice(&duration.to_be_bytes());
    } else {
        content.extend_from_slice(&[0; 8]); // creation/modification time
        content.extend_from_slice(&TRACK_ID.to_be_bytes());
        content.extend_from_slice(&0u32.to_be_bytes()); // reserved
        content.extend_from_slice(&(duration as u32).to_be_bytes());
    }
    content.extend_from_slice(&[0; 8]); // reserved
    content.extend_from_slice(&0i16.to_be_bytes()); // layer
    content.extend_from_slice(&0i16.to_be_bytes()); // alternate_group
    content.extend_from_slice(&0i16.to_be_bytes()); // volume (video = 0)
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    for m in &MATRIX {
        content.extend_from_slice(&m.to_be_bytes());
    }
    content.extend_from_slice(&geometry.display_width.to_be_bytes());
    content.extend_from_slice(&geometry.display_height.to_be_bytes());
    // flags: enabled | in movie | in preview
    write_full_box(buf, b"tkhd", version, 0x7, &content);
}

fn write_elst_entry_v0(buf: &mut Vec<u8>, edit: &Edit) -> Result<()> {
    let duration = u32::try_from(edit.duration).context("edit duration does not fit 32 bits")?;
    let media_time = i32::try_from(edit.start_time).context("edit start does not fit 32 bits")?;
    buf.extend_from_slice(&duration.to_be_bytes());
    buf.extend_from_slice(&media_time.to_be_bytes());
    buf.extend_from_slice(&0x00010000u32.to_be_bytes()); // media_rate 1.0
    Ok(())
}

fn write_edts(buf: &mut Vec<u8>, edits: &[Edit], fixed_layout: bool) -> Result<()> {
    let wide = !fixed_layout
        && edits
            .iter()
            .any(|e| e.duration > u64::from(u32::MAX) || e.start_time > i32::MAX as u64);

    let mut content = Vec::new();
    content.extend_from_slice(&(edits.len() as u32).to_be_bytes());
    for edit in edits {
        if wide {
            content.extend_from_slice(&edit.duration.to_be_bytes());
            content.extend_from_slice(&(edit.start_time as i64).to_be_bytes());
            content.extend_from_slice(&0x00010000u32.to_be_bytes()); // media_rate 1.0
        } else {
            write_elst_entry_v0(&mut content, edit)?;
        }
    }
    let mut edts = Vec::new();
    write_full_box(&mut edts, b"elst", u8::from(wide), 0, &content);
    write_box(buf, b"edts", &edts);
    Ok(())
}

fn write_mdhd(buf: &mut Vec<u8>, track: &Track, fragmented: bool) {
    let duration = if fragmented { 0 } else { track.media_duration };
    let mut content = Vec::new();
    let version = if duration > u64::from(u32::MAX) { 1 } else { 0 };
    if version == 1 {
        content.extend_from_slice(&[0; 16]); // creation/modification time
        content.extend_from_slice(&track.media.timescale.to_be_bytes());
        content.extend_from_slice(&duration.to_be_bytes());
    } else {
        content.extend_from_slice(&[0; 8]); // creation/modification time
        content.extend_from_slice(&track.media.timescale.to_be_bytes());
        content.extend_from_slice(&(duration as u32).to_be_bytes());
    }
    content.extend_from_slice(&0x55c4u16.to_be_bytes()); // language (und)
    content.extend_from_slice(&0u16.to_be_bytes()); // pre_defined
    write_full_box(buf, b"mdhd", version, 0, &content);
}

fn write_hdlr(buf: &mut Vec<u8>, name: &str) {
    let mut content = Vec::new();
    content.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    content.extend_from_slice(b"vide"); // handler_type
    content.extend_from_slice(&[0; 12]); // reserved
    content.extend_from_slice(name.as_bytes());
    content.push(0);
    write_full_box(buf, b"hdlr", 0, 0, &content);
}

fn write_dinf(buf: &mut Vec<u8>) {
    let mut dref = Vec::new();
    dref.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    // url entry, flags 1: media data is in this file
    write_full_box(&mut dref, b"url ", 0, 1, &[]);
    let mut dinf = Vec::new();
    write_full_box(&mut dinf, b"dref", 0, 0, &dref);
    write_box(buf, b"dinf", &dinf);
}

fn write_stbl(
    buf: &mut Vec<u8>,
    params: &FileParams,
    track: &Track,
    geometry: &TrackGeometry,
    entry: &SampleEntry,
    chunk_offset: Option<u64>,
) -> Result<()> {
    let samples: &[SampleRecord] = if chunk_offset.is_some() {
        &track.samples
    } else {
        &[]
    };
    let btrt = (entry.bitrate_info && !params.fragmented)
        .then(|| BitrateInfo::from_samples(samples, track.media.timescale));

    let mut content = Vec::new();
    let mut stsd = Vec::new();
    stsd.extend_from_slice(&1u32.to_be_bytes()); // entry_count
    write_avc1(&mut stsd, geometry, entry, btrt.as_ref());
    write_full_box(&mut content, b"stsd", 0, 0, &stsd);

    write_stts(&mut content, samples);
    write_ctts(&mut content, samples)?;
    write_stss(&mut content, samples);

    // All samples are contiguous in mdat: one chunk holds them all.
    let mut stsc = Vec::new();
    if samples.is_empty() {
        stsc.extend_from_slice(&0u32.to_be_bytes());
    } else {
        stsc.extend_from_slice(&1u32.to_be_bytes()); // entry_count
        stsc.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
        stsc.extend_from_slice(&(samples.len() as u32).to_be_bytes());
        stsc.extend_from_slice(&SAMPLE_ENTRY_INDEX.to_be_bytes());
    }
    write_full_box(&mut content, b"stsc", 0, 0, &stsc);

    let mut stsz = Vec::new();
    stsz.extend_from_slice(&0u32.to_be_bytes()); // sample_size (per-sample table follows)
    stsz.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    for sample in samples {
        stsz.extend_from_slice(&sample.size.to_be_bytes());
    }
    write_full_box(&mut content, b"stsz", 0, 0, &stsz);

    match chunk_offset.filter(|_| !samples.is_empty()) {
        Some(offset) if offset > u64::from(u32::MAX) => {
            let mut co64 = Vec::new();
            co64.extend_from_slice(&1u32.to_be_bytes());
            co64.extend_from_slice(&offset.to_be_bytes());
            write_full_box(&mut content, b"co64", 0, 0, &co64);
        }
        Some(offset) => {
            let mut stco = Vec::new();
            stco.extend_from_slice(&1u32.to_be_bytes());
            stco.extend_from_slice(&(offset as u32).to_be_bytes());
            write_full_box(&mut content, b"stco", 0, 0, &stco);
        }
        None => write_full_box(&mut content, b"stco", 0, 0, &0u32.to_be_bytes()),
    }

    write_box(buf, b"stbl", &content);
    Ok(())
}

fn write_avc1(
    buf: &mut Vec<u8>,
    geometry: &TrackGeometry,
    entry: &SampleEntry,
    btrt: Option<&BitrateInfo>,
) {
    let mut content = Vec::new();
    content.extend_from_slice(&[0; 6]); // reserved
    content.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    content.extend_from_slice(&[0; 16]); // pre_defined + reserved
    content.extend_from_slice(&(geometry.width as u16).to_be_bytes());
    content.extend_from_slice(&(geometry.height as u16).to_be_bytes());
    content.extend_from_slice(&0x00480000u32.to_be_bytes()); // horiz resolution 72 dpi
    content.extend_from_slice(&0x00480000u32.to_be_bytes()); // vert resolution 72 dpi
    content.extend_from_slice(&0u32.to_be_bytes()); // reserved
    content.extend_from_slice(&1u16.to_be_bytes()); // frame_count

    // Compressor name (32 bytes, Pascal string)
    let mut compressor = [0u8; 32];
    let name = b"AVC Coding";
    compressor[0] = name.len() as u8;
    compressor[1..1 + name.len()].copy_from_slice(name);
    content.extend_from_slice(&compressor);

    content.extend_from_slice(&0x0018u16.to_be_bytes()); // depth (24-bit)
    content.extend_from_slice(&(-1i16).to_be_bytes()); // pre_defined

    write_avcc(&mut content, entry);
    if let Some(btrt) = btrt {
        let mut b = Vec::new();
        b.extend_from_slice(&btrt.buffer_size.to_be_bytes());
        b.extend_from_slice(&btrt.max_bitrate.to_be_bytes());
        b.extend_from_slice(&btrt.avg_bitrate.to_be_bytes());
        write_box(&mut content, b"btrt", &b);
    }
    if let Some(sar) = geometry.sar {
        let mut pasp = Vec::new();
        pasp.extend_from_slice(&sar.width.to_be_bytes());
        pasp.extend_from_slice(&sar.height.to_be_bytes());
        write_box(&mut content, b"pasp", &pasp);
    }
    if !geometry.color.is_unspecified() {
        let mut colr = Vec::new();
        colr.extend_from_slice(b"nclx");
        colr.extend_from_slice(&geometry.color.primaries.to_be_bytes());
        colr.extend_from_slice(&geometry.color.transfer.to_be_bytes());
        colr.extend_from_slice(&geometry.color.matrix.to_be_bytes());
        colr.push(if geometry.color.full_range { 0x80 } else { 0 });
        write_box(&mut content, b"colr", &colr);
    }

    write_box(buf, b"avc1", &content);
}

fn write_avcc(buf: &mut Vec<u8>, entry: &SampleEntry) {
    let mut content = Vec::new();
    content.push(1); // configuration_version
    content.push(entry.sps[1]); // profile_idc
    content.push(entry.sps[2]); // profile_compatibility
    content.push(entry.sps[3]); // level_idc
    content.push(0xFC | (NAL_LENGTH_SIZE as u8 - 1)); // reserved | length_size_minus_one

    content.push(0xE1); // reserved | num_sps (1)
    content.extend_from_slice(&(entry.sps.len() as u16).to_be_bytes());
    content.extend_from_slice(&entry.sps);

    content.push(1); // num_pps
    content.extend_from_slice(&(entry.pps.len() as u16).to_be_bytes());
    content.extend_from_slice(&entry.pps);

    write_box(buf, b"avcC", &content);
}

fn write_stts(buf: &mut Vec<u8>, samples: &[SampleRecord]) {
    let mut entries: Vec<(u32, u32)> = Vec::new();
    for duration in samples.iter().map(|s| s.duration.unwrap_or(0)) {
        if let Some(last) = entries.last_mut() {
            if last.1 == duration {
                last.0 += 1;
                continue;
            }
        }
        entries.push((1, duration));
    }

    let mut content = Vec::new();
    content.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (count, delta) in entries {
        content.extend_from_slice(&count.to_be_bytes());
        content.extend_from_slice(&delta.to_be_bytes());
    }
    write_full_box(buf, b"stts", 0, 0, &content);
}

/// Written only when some composition time differs from its decode time.
fn write_ctts(buf: &mut Vec<u8>, samples: &[SampleRecord]) -> Result<()> {
    if samples.iter().all(|s| s.cts_offset == 0) {
        return Ok(());
    }
    let mut entries: Vec<(u32, i32)> = Vec::new();
    for sample in samples {
        let offset = i32::try_from(sample.cts_offset).context("composition offset overflow")?;
        if let Some(last) = entries.last_mut() {
            if last.1 == offset {
                last.0 += 1;
                continue;
            }
        }
        entries.push((1, offset));
    }
    // version 1 carries signed offsets
    let version = u8::from(entries.iter().any(|e| e.1 < 0));

    let mut content = Vec::new();
    content.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (count, offset) in entries {
        content.extend_from_slice(&count.to_be_bytes());
        content.extend_from_slice(&offset.to_be_bytes());
    }
    write_full_box(buf, b"ctts", version, 0, &content);
    Ok(())
}

/// Written only when not every sample is a sync sample.
fn write_stss(buf: &mut Vec<u8>, samples: &[SampleRecord]) {
    if samples.iter().all(|s| s.sync) {
        return;
    }
    let keyframes: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.sync)
        .map(|(i, _)| i as u32 + 1)
        .collect();
    let mut content = Vec::new();
    content.extend_from_slice(&(keyframes.len() as u32).to_be_bytes());
    for index in keyframes {
        content.extend_from_slice(&index.to_be_bytes());
    }
    write_full_box(buf, b"stss", 0, 0, &content);
}

fn build_moof(sequence: u32, samples: &[SampleRecord]) -> Result<Vec<u8>> {
    let base_dts = samples.first().map_or(0, |s| s.dts);
    let signed = samples.iter().any(|s| s.cts_offset < 0);

    let mut mfhd = Vec::new();
    write_full_box(&mut mfhd, b"mfhd", 0, 0, &sequence.to_be_bytes());

    let mut traf = Vec::new();
    // tfhd: default-base-is-moof
    write_full_box(&mut traf, b"tfhd", 0, 0x020000, &TRACK_ID.to_be_bytes());
    write_full_box(&mut traf, b"tfdt", 1, 0, &base_dts.to_be_bytes());

    // trun: data-offset, sample duration, size, flags, composition offset
    let trun_size = 8 + 4 + 4 + 4 + samples.len() * 16;
    let traf_size = 8 + traf.len() + trun_size;
    let moof_size = 8 + mfhd.len() + traf_size;
    let data_offset = (moof_size + 8) as u32;

    let mut trun = Vec::new();
    trun.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    trun.extend_from_slice(&data_offset.to_be_bytes());
    for sample in samples {
        let duration = sample.duration.context("pooled sample has no duration")?;
        trun.extend_from_slice(&duration.to_be_bytes());
        trun.extend_from_slice(&sample.size.to_be_bytes());
        let flags = if sample.sync {
            0x02000000u32 // depends_on=2 (no other)
        } else {
            0x01010000u32 // depends_on=1 (yes), non-sync
        };
        trun.extend_from_slice(&flags.to_be_bytes());
        let offset = i32::try_from(sample.cts_offset).context("composition offset overflow")?;
        trun.extend_from_slice(&offset.to_be_bytes());
    }
    write_full_box(&mut traf, b"trun", u8::from(signed), 0x000F01, &trun);

    let mut content = mfhd;
    write_box(&mut content, b"traf", &traf);
    let mut buf = Vec::new();
    write_box(&mut buf, b"moof", &content);
    Ok(buf)
}

/// Contents of a `btrt` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BitrateInfo {
    buffer_size: u32,
    max_bitrate: u32,
    avg_bitrate: u32,
}

impl BitrateInfo {
    /// Largest sample, peak bitrate over one-second windows of decode time,
    /// and average bitrate over the whole track.
    fn from_samples(samples: &[SampleRecord], timescale: u32) -> Self {
        let buffer_size = samples.iter().map(|s| s.size).max().unwrap_or(0);
        if samples.is_empty() || timescale == 0 {
            return Self {
                buffer_size,
                max_bitrate: 0,
                avg_bitrate: 0,
            };
        }

        let timescale = u64::from(timescale);
        let mut max_window = 0u64;
        let mut window = 0u64;
        let mut window_start = samples[0].dts / timescale;
        for sample in samples {
            let second = sample.dts / timescale;
            if second != window_start {
                max_window = max_window.max(window);
                window = 0;
                window_start = second;
            }
            window += u64::from(sample.size);
        }
        max_window = max_window.max(window);

        let total: u64 = samples.iter().map(|s| u64::from(s.size)).sum();
        let duration: u64 = samples.iter().map(|s| u64::from(s.duration.unwrap_or(0))).sum();
        let avg = if duration == 0 {
            0
        } else {
            total * 8 * timescale / duration
        };

        Self {
            buffer_size,
            max_bitrate: u32::try_from(max_window * 8).unwrap_or(u32::MAX),
            avg_bitrate: u32::try_from(avg).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{find_box_path, summarize};
    use std::io::Cursor;

    fn params(fragmented: bool) -> FileParams {
        FileParams {
            major_brand: *b"mp42",
            minor_version: 0,
            compatible_brands: vec![*b"mp42", *b"isom"],
            movie_timescale: 600,
            fragmented,
        }
    }

    fn parameter_set() -> ParameterSet {
        ParameterSet {
            sps: vec![0x67, 0x42, 0xC0, 0x1E, 0xDA],
            pps: vec![0x68, 0xCE, 0x3C, 0x80],
            sei: Vec::new(),
        }
    }

    fn setup(fragmented: bool) -> (Mp4Muxer<Cursor<Vec<u8>>>, u32) {
        let mut muxer = Mp4Muxer::new(Cursor::new(Vec::new()), params(fragmented)).unwrap();
        let track = muxer
            .create_track(
                TrackKind::Video,
                &MediaParams {
                    timescale: 15,
                    handler_name: "Video Media Handler".to_string(),
                },
            )
            .unwrap();
        muxer
            .set_track_geometry(
                track,
                &TrackGeometry::new(64, 48, None, ColorDescription::default()),
            )
            .unwrap();
        muxer
            .add_sample_entry(track, &parameter_set(), !fragmented)
            .unwrap();
        (muxer, track)
    }

    fn sample(dts: u64, sync: bool, byte: u8) -> Sample {
        Sample {
            data: vec![0, 0, 0, 2, 0x65, byte],
            dts,
            cts: dts,
            entry: 1,
            sync,
        }
    }

    #[test]
    fn test_ftyp_box() {
        let mut buf = Vec::new();
        write_ftyp(&mut buf, &params(false));
        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(&buf[4..8], b"ftyp");
        assert_eq!(size as usize, buf.len());
        assert_eq!(&buf[8..12], b"mp42");
    }

    #[test]
    fn test_display_size_follows_sar() {
        let wide = TrackGeometry::new(
            100,
            100,
            Some(SampleAspectRatio {
                width: 2,
                height: 1,
            }),
            ColorDescription::default(),
        );
        assert_eq!(wide.display_width, 200 << 16);
        assert_eq!(wide.display_height, 100 << 16);

        let tall = TrackGeometry::new(
            100,
            100,
            Some(SampleAspectRatio {
                width: 1,
                height: 2,
            }),
            ColorDescription::default(),
        );
        assert_eq!(tall.display_width, 100 << 16);
        assert_eq!(tall.display_height, 200 << 16);
    }

    #[test]
    fn test_progressive_file_layout() {
        let (mut muxer, track) = setup(false);
        muxer.append_sample(track, sample(0, true, 1)).unwrap();
        muxer.append_sample(track, sample(1, false, 2)).unwrap();
        muxer.append_sample(track, sample(2, false, 3)).unwrap();
        muxer.flush_pooled(track, 1).unwrap();
        muxer
            .set_edit(
                track,
                Edit {
                    start_time: 0,
                    duration: 120,
                },
            )
            .unwrap();
        muxer.finish().unwrap();

        let data = muxer.into_inner().into_inner();
        assert_eq!(&data[4..8], b"ftyp");
        assert!(find_box_path(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stss"])
            .is_some());
        assert!(find_box_path(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"ctts"])
            .is_none());

        let summary = summarize(&data).unwrap();
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.sample_durations, vec![1, 1, 1]);
        assert_eq!(summary.sync_samples, vec![1]);
        assert_eq!(summary.first_sample, vec![0, 0, 0, 2, 0x65, 1]);
        assert_eq!(summary.movie_duration, 120);
        assert_eq!(summary.media_timescale, 15);
        assert_eq!((summary.width, summary.height), (64, 48));
        assert_eq!(summary.profile, (0x42, 0xC0, 0x1E));
        assert_eq!(summary.fragment_count, 0);
    }

    #[test]
    fn test_progressive_writes_btrt() {
        let (mut muxer, track) = setup(false);
        muxer.append_sample(track, sample(0, true, 1)).unwrap();
        muxer.flush_pooled(track, 1).unwrap();
        muxer.finish().unwrap();
        let data = muxer.into_inner().into_inner();

        let stsd = find_box_path(&data, &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"stsd"])
            .unwrap();
        assert!(stsd.windows(4).any(|w| w == b"btrt"));
        assert!(!stsd.windows(4).any(|w| w == b"colr"));
    }

    #[test]
    fn test_fragmented_file_layout() {
        let (mut muxer, track) = setup(true);
        muxer
            .set_edit(
                track,
                Edit {
                    start_time: 0,
                    duration: EDIT_DURATION_UNKNOWN32,
                },
            )
            .unwrap();
        muxer.append_sample(track, sample(0, true, 1)).unwrap();
        muxer.append_sample(track, sample(1, false, 2)).unwrap();
        muxer.flush_pooled(track, 1).unwrap();
        muxer.begin_fragment().unwrap();
        muxer.append_sample(track, sample(2, true, 3)).unwrap();
        muxer.flush_pooled(track, 1).unwrap();
        muxer
            .update_edit(
                track,
                1,
                Edit {
                    start_time: 0,
                    duration: 120,
                },
            )
            .unwrap();
        muxer.finish().unwrap();
        assert_eq!(muxer.fragments_written(), 2);

        let data = muxer.into_inner().into_inner();
        assert!(find_box_path(&data, &[b"moov", b"mvex", b"trex"]).is_some());

        let summary = summarize(&data).unwrap();
        assert_eq!(summary.fragment_count, 2);
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.sync_samples, vec![1, 3]);
        assert_eq!(summary.first_sample, vec![0, 0, 0, 2, 0x65, 1]);
        assert_eq!(summary.edits[0].segment_duration, 120);
        assert_eq!(summary.movie_duration, 120);
        assert_eq!(summary.track_duration, 120);
    }

    #[test]
    fn test_rejects_sample_before_entry() {
        let mut muxer = Mp4Muxer::new(Cursor::new(Vec::new()), params(false)).unwrap();
        let track = muxer
            .create_track(
                TrackKind::Video,
                &MediaParams {
                    timescale: 15,
                    handler_name: String::new(),
                },
            )
            .unwrap();
        assert!(muxer.append_sample(track, sample(0, true, 1)).is_err());
    }

    #[test]
    fn test_rejects_decreasing_dts() {
        let (mut muxer, track) = setup(false);
        muxer.append_sample(track, sample(5, true, 1)).unwrap();
        assert!(muxer.append_sample(track, sample(4, false, 2)).is_err());
    }

    #[test]
    fn test_finish_requires_last_duration() {
        let (mut muxer, track) = setup(false);
        muxer.append_sample(track, sample(0, true, 1)).unwrap();
        assert!(muxer.finish().is_err());
    }

    #[test]
    fn test_begin_fragment_requires_flush() {
        let (mut muxer, track) = setup(true);
        muxer.append_sample(track, sample(0, true, 1)).unwrap();
        assert!(muxer.begin_fragment().is_err());

        let (mut progressive, _) = setup(false);
        assert!(progressive.begin_fragment().is_err());
    }

    #[test]
    fn test_bitrate_info() {
        let samples: Vec<SampleRecord> = (0..30)
            .map(|i| SampleRecord {
                size: 1000,
                dts: i,
                duration: Some(1),
                cts_offset: 0,
                sync: i == 0,
            })
            .collect();
        let info = BitrateInfo::from_samples(&samples, 15);
        assert_eq!(info.buffer_size, 1000);
        assert_eq!(info.max_bitrate, 15 * 1000 * 8);
        assert_eq!(info.avg_bitrate, 15 * 1000 * 8);
    }
}
