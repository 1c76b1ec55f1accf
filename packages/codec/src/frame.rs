//! Raw RGBA frames, planar 4:2:0 images and the colour conversion between them.

use crate::CodecError;

/// Bytes per RGBA8888 pixel.
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// A borrowed RGBA8888 frame: row-major, tightly packed, no header.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Wrap `data` as a `width` x `height` RGBA frame.
    ///
    /// Fails when the buffer length is not exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions { width, height });
        }
        let expected = expected_frame_size(width, height);
        if data.len() != expected {
            return Err(CodecError::InvalidFrameSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Byte length of a `width` x `height` RGBA8888 frame.
#[must_use]
pub fn expected_frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGBA_BYTES_PER_PIXEL
}

/// A planar YUV 4:2:0 image (I420): full resolution luma, chroma planes at
/// half resolution in each dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl PlanarImage {
    /// Allocate a black image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let luma = width as usize * height as usize;
        let chroma = chroma_dim(width) * chroma_dim(height);
        Self {
            width,
            height,
            y: vec![16; luma],
            u: vec![128; chroma],
            v: vec![128; chroma],
        }
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width of the chroma planes.
    pub fn chroma_width(&self) -> usize {
        chroma_dim(self.width)
    }

    /// Height of the chroma planes.
    pub fn chroma_height(&self) -> usize {
        chroma_dim(self.height)
    }

    /// Row strides of the (Y, U, V) planes in bytes.
    pub fn strides(&self) -> (usize, usize, usize) {
        let c = self.chroma_width();
        (self.width as usize, c, c)
    }

    /// Luma plane.
    pub fn y(&self) -> &[u8] {
        &self.y
    }

    /// First chroma plane.
    pub fn u(&self) -> &[u8] {
        &self.u
    }

    /// Second chroma plane.
    pub fn v(&self) -> &[u8] {
        &self.v
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::new(width, height);
    }
}

fn chroma_dim(n: u32) -> usize {
    (n as usize).div_ceil(2)
}

/// Converts RGBA frames to planar 4:2:0 into a reused scratch image.
///
/// Luma is computed for every pixel; the two chroma samples of each 2x2 block
/// are taken from its top-left pixel. Results are rounded and clamped to
/// `[0, 255]`.
#[derive(Debug)]
pub struct ColorConverter {
    scratch: PlanarImage,
}

impl ColorConverter {
    /// Create a converter whose scratch image is sized for `width` x `height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scratch: PlanarImage::new(width, height),
        }
    }

    /// Convert `frame` into the scratch image and return it.
    ///
    /// The scratch buffer is only reallocated if the frame geometry changes.
    pub fn convert(&mut self, frame: &RawFrame<'_>) -> &PlanarImage {
        self.scratch.resize(frame.width(), frame.height());
        rgba_to_i420(frame, &mut self.scratch);
        &self.scratch
    }

    /// The most recently converted image.
    pub fn image(&self) -> &PlanarImage {
        &self.scratch
    }
}

fn luma(r: f32, g: f32, b: f32) -> u8 {
    narrow(16.0 + 0.257 * r + 0.504 * g + 0.098 * b)
}

fn chroma_u(r: f32, g: f32, b: f32) -> u8 {
    narrow(128.0 + 0.439 * r - 0.368 * g - 0.071 * b)
}

fn chroma_v(r: f32, g: f32, b: f32) -> u8 {
    narrow(128.0 - 0.148 * r - 0.291 * g + 0.439 * b)
}

fn narrow(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Convert an RGBA frame into `out`, which must already match its geometry.
fn rgba_to_i420(frame: &RawFrame<'_>, out: &mut PlanarImage) {
    let w = frame.width() as usize;
    let cw = out.chroma_width();
    let row_bytes = w * RGBA_BYTES_PER_PIXEL;

    for (row, (src, dst)) in frame
        .data()
        .chunks_exact(row_bytes)
        .zip(out.y.chunks_exact_mut(w))
        .enumerate()
    {
        let chroma_row = row % 2 == 0;
        let crow = row / 2;
        for (col, (px, y)) in src.chunks_exact(RGBA_BYTES_PER_PIXEL).zip(dst).enumerate() {
            let (r, g, b) = (f32::from(px[0]), f32::from(px[1]), f32::from(px[2]));
            *y = luma(r, g, b);
            if chroma_row && col % 2 == 0 {
                let idx = crow * cw + col / 2;
                out.u[idx] = chroma_u(r, g, b);
                out.v[idx] = chroma_v(r, g, b);
            }
        }
    }
}
