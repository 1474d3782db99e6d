//! Image handle and primitive operations
//!
//! `ImageHandle` is an owning wrapper around decoded RGBA pixels plus
//! stacked-frame metadata. Animated sources decode to a single tall buffer
//! of vertically stacked frames: `height == n_pages * page_height`. Every
//! primitive consumes the handle and returns a new one, so the pipeline's
//! "current" binding frees its predecessor exactly once.
//!
//! Operations with a neighborhood kernel (resize, blur, sharpen) and
//! geometry changes (rotate, flip) are applied per frame for stacked
//! handles; pointwise operations run over the whole buffer.

use std::io::Cursor;
use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image as FirImage, PixelType, ResizeAlg, Resizer};
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{imageops, AnimationDecoder, ImageFormat, RgbaImage};

use super::error::ImageError;
use crate::constants::MAX_DIMENSION;

/// Default frame delay when the source does not specify one (10 fps)
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// How the thumbnail primitive may change scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    /// Shrink only, never enlarge
    Down,
    /// Enlarge only, never shrink
    Up,
    /// Stretch to the exact target, ignoring aspect ratio
    Force,
    /// Scale freely in both directions (cover path)
    Both,
}

/// Crop strategy applied during a cover-style thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    Centre,
    /// Variance-driven region scan (content-aware)
    Entropy,
    /// Salience-driven region scan; same scan as Entropy here
    Attention,
}

/// Bounding box returned by `find_trim`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Owning handle to a decoded image with stacked-frame metadata
#[derive(Debug, Clone)]
pub struct ImageHandle {
    image: RgbaImage,
    n_pages: u32,
    page_height: u32,
    delays_ms: Vec<u32>,
    has_alpha: bool,
}

impl ImageHandle {
    /// Decode only the first frame. `n_pages` still reports the frame count
    /// of the container so callers can decide whether to reload all frames.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let mut frames = decode_frame_list(bytes, Some(1))?;
        let total = count_frames(bytes)?;
        let (image, _) = frames.remove(0);
        let page_height = image.height();
        let has_alpha = buffer_has_alpha(&image);
        Ok(Self {
            image,
            n_pages: total,
            page_height,
            delays_ms: Vec::new(),
            has_alpha,
        })
    }

    /// Decode all frames, vertically stacked
    pub fn decode_all(bytes: &[u8]) -> Result<Self, ImageError> {
        Self::decode_limited(bytes, None)
    }

    /// Decode the first `n` frames, vertically stacked
    pub fn decode_frames(bytes: &[u8], n: u32) -> Result<Self, ImageError> {
        Self::decode_limited(bytes, Some(n as usize))
    }

    fn decode_limited(bytes: &[u8], limit: Option<usize>) -> Result<Self, ImageError> {
        let frames = decode_frame_list(bytes, limit)?;
        let (first, _) = &frames[0];
        let (width, page_height) = (first.width(), first.height());

        if frames.len() == 1 {
            let (image, _) = frames.into_iter().next().expect("one frame");
            let has_alpha = buffer_has_alpha(&image);
            return Ok(Self {
                image,
                n_pages: 1,
                page_height,
                delays_ms: Vec::new(),
                has_alpha,
            });
        }

        let mut stacked = RgbaImage::new(width, page_height * frames.len() as u32);
        let mut delays = Vec::with_capacity(frames.len());
        for (index, (frame, delay)) in frames.iter().enumerate() {
            imageops::overlay(&mut stacked, frame, 0, (index as u32 * page_height) as i64);
            delays.push(*delay);
        }
        let has_alpha = buffer_has_alpha(&stacked);
        Ok(Self {
            image: stacked,
            n_pages: frames.len() as u32,
            page_height,
            delays_ms: delays,
            has_alpha,
        })
    }

    /// Build a handle from raw pixels (single static page)
    pub fn from_rgba(image: RgbaImage) -> Self {
        let page_height = image.height();
        let has_alpha = buffer_has_alpha(&image);
        Self {
            image,
            n_pages: 1,
            page_height,
            delays_ms: Vec::new(),
            has_alpha,
        }
    }

    /// Reassemble a frame stack from equally sized frames
    pub fn arrayjoin_vertical(
        frames: Vec<RgbaImage>,
        delays_ms: Vec<u32>,
    ) -> Result<Self, ImageError> {
        let first = frames
            .first()
            .ok_or_else(|| ImageError::operation_failed("arrayjoin", "no frames"))?;
        let (width, page_height) = (first.width(), first.height());
        if frames
            .iter()
            .any(|f| f.width() != width || f.height() != page_height)
        {
            return Err(ImageError::operation_failed(
                "arrayjoin",
                "frames differ in size",
            ));
        }

        let mut stacked = RgbaImage::new(width, page_height * frames.len() as u32);
        for (index, frame) in frames.iter().enumerate() {
            imageops::overlay(&mut stacked, frame, 0, (index as u32 * page_height) as i64);
        }
        let n_pages = frames.len() as u32;
        let has_alpha = buffer_has_alpha(&stacked);
        Ok(Self {
            image: stacked,
            n_pages,
            page_height,
            delays_ms,
            has_alpha,
        })
    }

    // === Metadata accessors ===

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Total buffer height (all pages)
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn n_pages(&self) -> u32 {
        self.n_pages
    }

    pub fn page_height(&self) -> u32 {
        self.page_height
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn is_animated(&self) -> bool {
        self.n_pages > 1
    }

    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }

    /// Delay for frame `index`, falling back to the default cadence
    pub fn delay_ms(&self, index: usize) -> u32 {
        match self.delays_ms.get(index) {
            Some(&d) if d > 0 => d,
            _ => DEFAULT_FRAME_DELAY_MS,
        }
    }

    /// Overwrite the per-frame height metadata
    pub fn set_page_height(&mut self, page_height: u32) {
        self.page_height = page_height;
    }

    /// Overwrite the frame count metadata
    pub fn set_n_pages(&mut self, n_pages: u32) {
        self.n_pages = n_pages;
        if n_pages <= 1 {
            self.delays_ms.clear();
        }
    }

    /// Replace the per-frame delays (used when stack metadata is rebuilt
    /// after a whole-stack crop)
    pub fn set_delays_ms(&mut self, delays_ms: Vec<u32>) {
        self.delays_ms = delays_ms;
    }

    /// True when the stacked-frame invariant holds for an animated encode
    pub fn page_geometry_valid(&self) -> bool {
        self.page_height > 0
            && self.page_height <= self.height()
            && self.height() % self.page_height == 0
            && self.n_pages == self.height() / self.page_height
    }

    /// Raw RGBA bytes of the full buffer
    pub fn raw_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy out the frames of this handle (page-sized slices of the stack)
    pub fn frames(&self) -> Vec<RgbaImage> {
        let pages = self.loaded_pages();
        (0..pages)
            .map(|i| {
                imageops::crop_imm(
                    &self.image,
                    0,
                    i * self.page_height,
                    self.width(),
                    self.page_height,
                )
                .to_image()
            })
            .collect()
    }

    /// Number of pages actually present in the pixel buffer. Differs from
    /// `n_pages` only for a first-frame probe of an animated source.
    fn loaded_pages(&self) -> u32 {
        if self.page_height == 0 {
            return 1;
        }
        (self.height() / self.page_height).max(1)
    }

    // === Geometry ===

    /// Crop a region out of the raw buffer. The result is a single page;
    /// callers re-establish stack metadata with `set_n_pages` and
    /// `set_page_height` when cropping a whole stack.
    pub fn crop(self, left: u32, top: u32, width: u32, height: u32) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::operation_failed("crop", "zero-size region"));
        }
        if left + width > self.width() || top + height > self.height() {
            return Err(ImageError::operation_failed("crop", "region out of bounds"));
        }
        let cropped = imageops::crop_imm(&self.image, left, top, width, height).to_image();
        let has_alpha = self.has_alpha;
        Ok(Self {
            image: cropped,
            n_pages: 1,
            page_height: height,
            delays_ms: Vec::new(),
            has_alpha,
        })
    }

    /// Rotate by a multiple of 90 degrees (frame-aware for stacks)
    pub fn rotate(self, degrees: u16) -> Result<Self, ImageError> {
        match degrees {
            0 => Ok(self),
            90 => self.map_frames(|f| Ok(imageops::rotate90(&f))),
            180 => self.map_frames(|f| Ok(imageops::rotate180(&f))),
            270 => self.map_frames(|f| Ok(imageops::rotate270(&f))),
            other => Err(ImageError::operation_failed(
                "rotate",
                format!("unsupported angle: {}", other),
            )),
        }
    }

    /// Mirror horizontally and/or vertically (frame-aware for stacks)
    pub fn flip(self, horizontal: bool, vertical: bool) -> Result<Self, ImageError> {
        self.map_frames(|mut f| {
            if horizontal {
                f = imageops::flip_horizontal(&f);
            }
            if vertical {
                f = imageops::flip_vertical(&f);
            }
            Ok(f)
        })
    }

    /// Apply `op` to every frame and restack, preserving delays.
    /// All produced frames must share dimensions.
    pub fn map_frames<F>(self, op: F) -> Result<Self, ImageError>
    where
        F: Fn(RgbaImage) -> Result<RgbaImage, ImageError>,
    {
        if !self.is_animated() || self.loaded_pages() <= 1 {
            let delays = self.delays_ms.clone();
            let n_pages = self.n_pages;
            let image = op(self.image)?;
            let mut handle = Self::from_rgba(image);
            handle.n_pages = n_pages;
            handle.page_height = handle.image.height();
            handle.delays_ms = delays;
            return Ok(handle);
        }

        let delays = self.delays_ms.clone();
        let mut out = Vec::with_capacity(self.loaded_pages() as usize);
        for frame in self.frames() {
            out.push(op(frame)?);
        }
        Self::arrayjoin_vertical(out, delays)
    }

    // === Resize ===

    /// Single-call resize driven by a target width and optional height.
    ///
    /// The missing axis is derived from the frame aspect ratio. Stacked
    /// handles are resized frame by frame so the page invariant holds
    /// exactly afterwards. Crop modes are only valid for single-page
    /// handles; the animated cover path does its own crop-and-rejoin.
    pub fn thumbnail(
        self,
        target_width: u32,
        target_height: Option<u32>,
        size: SizeMode,
        crop: Option<CropMode>,
    ) -> Result<Self, ImageError> {
        let frame_w = self.width();
        let frame_h = self.page_height.max(1);

        let target_h =
            target_height.unwrap_or_else(|| derive_axis(frame_w, frame_h, target_width));
        let target_w = if target_width == 0 {
            derive_axis(frame_h, frame_w, target_h)
        } else {
            target_width
        };

        if let Some(mode) = crop {
            if self.is_animated() {
                return Err(ImageError::operation_failed(
                    "thumbnail",
                    "crop over stacked frames crosses page boundaries",
                ));
            }
            return self.cover_crop(target_w, target_h, mode);
        }

        let (new_w, new_h) = scaled_frame_size(frame_w, frame_h, target_w, target_h, size);
        if new_w == frame_w && new_h == frame_h {
            return Ok(self);
        }
        self.map_frames(|f| resize_rgba(&f, new_w, new_h))
    }

    /// Scale to cover the target box, then crop at the given mode
    fn cover_crop(self, target_w: u32, target_h: u32, mode: CropMode) -> Result<Self, ImageError> {
        let (frame_w, frame_h) = (self.width(), self.height());
        let scale = (target_w as f64 / frame_w as f64).max(target_h as f64 / frame_h as f64);
        let scaled_w = ((frame_w as f64 * scale).ceil() as u32).max(target_w);
        let scaled_h = ((frame_h as f64 * scale).ceil() as u32).max(target_h);

        let scaled = if scaled_w == frame_w && scaled_h == frame_h {
            self
        } else {
            self.map_frames(|f| resize_rgba(&f, scaled_w, scaled_h))?
        };

        let (left, top) = match mode {
            CropMode::Centre => (
                (scaled_w - target_w) / 2,
                (scaled_h - target_h) / 2,
            ),
            CropMode::Entropy | CropMode::Attention => {
                best_region_offset(&scaled.image, target_w, target_h)
            }
        };
        scaled.crop(left, top, target_w, target_h)
    }

    // === Effects (pointwise unless noted) ===

    /// Unsharp-mask sharpening; kernel-based, applied per frame
    pub fn sharpen(self, sigma: f32) -> Result<Self, ImageError> {
        self.map_frames(|f| Ok(imageops::unsharpen(&f, sigma, 1)))
    }

    /// Gaussian blur; kernel-based, applied per frame
    pub fn blur(self, sigma: f32) -> Result<Self, ImageError> {
        self.map_frames(|f| Ok(imageops::blur(&f, sigma)))
    }

    /// Per-channel linear transform `a*x + b` (alpha untouched)
    pub fn linear(mut self, a: f32, b: f32) -> Self {
        for pixel in self.image.pixels_mut() {
            for channel in 0..3 {
                pixel[channel] = (a * pixel[channel] as f32 + b).clamp(0.0, 255.0) as u8;
            }
        }
        self
    }

    /// Gamma adjustment with exponent `1/gamma`
    pub fn gamma(mut self, gamma: f32) -> Self {
        let exponent = 1.0 / gamma;
        let mut table = [0u8; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = ((i as f32 / 255.0).powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        for pixel in self.image.pixels_mut() {
            for channel in 0..3 {
                pixel[channel] = table[pixel[channel] as usize];
            }
        }
        self
    }

    /// Scale chroma about luma: 0 = grayscale, 1 = identity, 2 = doubled
    pub fn saturate(mut self, factor: f32) -> Self {
        for pixel in self.image.pixels_mut() {
            let luma = 0.2126 * pixel[0] as f32
                + 0.7152 * pixel[1] as f32
                + 0.0722 * pixel[2] as f32;
            for channel in 0..3 {
                let value = luma + (pixel[channel] as f32 - luma) * factor;
                pixel[channel] = value.clamp(0.0, 255.0) as u8;
            }
        }
        self
    }

    /// Composite onto an opaque background, discarding alpha
    pub fn flatten(mut self, background: [u8; 3]) -> Self {
        for pixel in self.image.pixels_mut() {
            let alpha = pixel[3] as f32 / 255.0;
            for channel in 0..3 {
                let blended =
                    alpha * pixel[channel] as f32 + (1.0 - alpha) * background[channel] as f32;
                pixel[channel] = blended.clamp(0.0, 255.0) as u8;
            }
            pixel[3] = 255;
        }
        self.has_alpha = false;
        self
    }

    /// Place this image at `(left, top)` on a `width`x`height` canvas
    /// filled with the background colour
    pub fn embed(
        self,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        background: [u8; 3],
    ) -> Result<Self, ImageError> {
        if left + self.width() > width || top + self.height() > height {
            return Err(ImageError::operation_failed("embed", "image exceeds canvas"));
        }
        let bg = image::Rgba([background[0], background[1], background[2], 255]);
        let mut canvas = RgbaImage::from_pixel(width, height, bg);
        imageops::overlay(&mut canvas, &self.image, left as i64, top as i64);
        let mut handle = Self::from_rgba(canvas);
        handle.has_alpha = self.has_alpha;
        Ok(handle)
    }

    /// Find the bounding box of non-border content.
    ///
    /// The border colour is sampled from the top-left pixel; pixels whose
    /// maximum channel difference from it exceeds the threshold (1-100,
    /// scaled to 0-255) count as content. Returns a zero-sized box when the
    /// image is entirely border.
    pub fn find_trim(&self, threshold: u32) -> TrimBox {
        let bg = *self.image.get_pixel(0, 0);
        let cutoff = (threshold.min(100) * 255 / 100) as i16;

        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for (x, y, pixel) in self.image.enumerate_pixels() {
            let diff = (0..4)
                .map(|c| (pixel[c] as i16 - bg[c] as i16).abs())
                .max()
                .unwrap_or(0);
            if diff > cutoff {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if !found {
            return TrimBox {
                left: 0,
                top: 0,
                width: 0,
                height: 0,
            };
        }
        TrimBox {
            left: min_x,
            top: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }
}

/// Derive the missing axis from the aspect ratio of `(known_src, other_src)`,
/// clamped to the same dimension cap as declared axes
fn derive_axis(known_src: u32, other_src: u32, known_target: u32) -> u32 {
    let derived = (known_target as f64 * other_src as f64 / known_src as f64).round() as u32;
    derived.clamp(1, MAX_DIMENSION)
}

/// Compute the resized frame size for a size mode
fn scaled_frame_size(
    frame_w: u32,
    frame_h: u32,
    target_w: u32,
    target_h: u32,
    size: SizeMode,
) -> (u32, u32) {
    match size {
        SizeMode::Force => (target_w.max(1), target_h.max(1)),
        SizeMode::Down | SizeMode::Up | SizeMode::Both => {
            let ratio_w = target_w as f64 / frame_w as f64;
            let ratio_h = target_h as f64 / frame_h as f64;
            let mut scale = match size {
                // contain: fit within the box
                SizeMode::Down | SizeMode::Both => ratio_w.min(ratio_h),
                // outside: smallest scale covering the box
                SizeMode::Up => ratio_w.max(ratio_h),
                SizeMode::Force => unreachable!(),
            };
            match size {
                SizeMode::Down => scale = scale.min(1.0),
                SizeMode::Up => scale = scale.max(1.0),
                _ => {}
            }
            (
                ((frame_w as f64 * scale).round() as u32).max(1),
                ((frame_h as f64 * scale).round() as u32).max(1),
            )
        }
    }
}

/// Lanczos3 resample of an RGBA buffer
pub(crate) fn resize_rgba(
    img: &RgbaImage,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage, ImageError> {
    let src_w = NonZeroU32::new(img.width())
        .ok_or_else(|| ImageError::operation_failed("resize", "source width is 0"))?;
    let src_h = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::operation_failed("resize", "source height is 0"))?;
    let dst_w = NonZeroU32::new(target_w)
        .ok_or_else(|| ImageError::operation_failed("resize", "target width is 0"))?;
    let dst_h = NonZeroU32::new(target_h)
        .ok_or_else(|| ImageError::operation_failed("resize", "target height is 0"))?;

    let src = FirImage::from_vec_u8(src_w, src_h, img.as_raw().clone(), PixelType::U8x4)
        .map_err(|e| ImageError::operation_failed("resize", format!("{:?}", e)))?;
    let mut dst = FirImage::new(dst_w, dst_h, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src.view(), &mut dst.view_mut())
        .map_err(|e| ImageError::operation_failed("resize", format!("{:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst.into_vec())
        .ok_or_else(|| ImageError::operation_failed("resize", "output buffer mismatch"))
}

/// Offset of the highest-variance region of the given size (content-aware
/// crop). Samples a coarse grid of candidate positions.
fn best_region_offset(img: &RgbaImage, width: u32, height: u32) -> (u32, u32) {
    let max_x = img.width().saturating_sub(width);
    let max_y = img.height().saturating_sub(height);
    if max_x == 0 && max_y == 0 {
        return (0, 0);
    }

    let step_x = (max_x / 5).max(1);
    let step_y = (max_y / 5).max(1);

    let mut best = (max_x / 2, max_y / 2);
    let mut best_score = 0.0f32;

    let mut x = 0;
    while x <= max_x {
        let mut y = 0;
        while y <= max_y {
            let score = region_variance(img, x, y, width, height);
            if score > best_score {
                best_score = score;
                best = (x, y);
            }
            y += step_y;
        }
        x += step_x;
    }

    best
}

/// Channel variance of a region, sampled every 4th pixel
fn region_variance(img: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> f32 {
    const SAMPLE_STEP: u32 = 4;
    let mut sum = [0u64; 3];
    let mut sum_sq = [0u64; 3];
    let mut count = 0u64;

    let mut py = y;
    while py < (y + height).min(img.height()) {
        let mut px = x;
        while px < (x + width).min(img.width()) {
            let pixel = img.get_pixel(px, py);
            for c in 0..3 {
                let v = pixel[c] as u64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
            count += 1;
            px += SAMPLE_STEP;
        }
        py += SAMPLE_STEP;
    }

    if count == 0 {
        return 0.0;
    }
    (0..3)
        .map(|c| {
            let mean = sum[c] as f32 / count as f32;
            (sum_sq[c] as f32 / count as f32) - mean * mean
        })
        .sum()
}

fn buffer_has_alpha(img: &RgbaImage) -> bool {
    img.pixels().any(|p| p[3] < 255)
}

/// Decode up to `limit` frames as (buffer, delay) pairs. Static formats
/// produce a single frame.
fn decode_frame_list(
    bytes: &[u8],
    limit: Option<usize>,
) -> Result<Vec<(RgbaImage, u32)>, ImageError> {
    let format = image::guess_format(bytes).map_err(|e| ImageError::decode_failed(e.to_string()))?;

    let frames = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes))
                .map_err(|e| ImageError::decode_failed(e.to_string()))?;
            collect_animation_frames(decoder.into_frames(), limit)?
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))
                .map_err(|e| ImageError::decode_failed(e.to_string()))?;
            if decoder.has_animation() {
                collect_animation_frames(decoder.into_frames(), limit)?
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    };

    if !frames.is_empty() {
        return Ok(frames);
    }

    // Static path (or single-frame container)
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ImageError::decode_failed(e.to_string()))?;
    Ok(vec![(decoded.to_rgba8(), 0)])
}

fn collect_animation_frames(
    frames: image::Frames<'_>,
    limit: Option<usize>,
) -> Result<Vec<(RgbaImage, u32)>, ImageError> {
    let mut out = Vec::new();
    for frame in frames {
        let frame = frame.map_err(|e| ImageError::decode_failed(e.to_string()))?;
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay_ms = if denom == 0 { 0 } else { numer / denom };
        out.push((frame.into_buffer(), delay_ms));
        if let Some(limit) = limit {
            if out.len() >= limit {
                break;
            }
        }
    }
    if out.is_empty() {
        return Err(ImageError::decode_failed("no frames in animation"));
    }
    Ok(out)
}

/// Number of frames in the container without keeping their buffers
fn count_frames(bytes: &[u8]) -> Result<u32, ImageError> {
    let format = image::guess_format(bytes).map_err(|e| ImageError::decode_failed(e.to_string()))?;
    let count = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes))
                .map_err(|e| ImageError::decode_failed(e.to_string()))?;
            decoder.into_frames().count()
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))
                .map_err(|e| ImageError::decode_failed(e.to_string()))?;
            if decoder.has_animation() {
                decoder.into_frames().count()
            } else {
                1
            }
        }
        _ => 1,
    };
    Ok(count.max(1) as u32)
}
