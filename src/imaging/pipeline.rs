//! The transform pipeline
//!
//! A fixed sequence of stages over a single current handle:
//! probe → budget → decide → reload → extract → trim → rotate/flip →
//! resize → effects → background → encode.
//!
//! Animated sources decode to vertically stacked frames; the stages that
//! would corrupt frame boundaries (trim, cover-crop) are either skipped for
//! stacks or replaced with the frame-safe two-step procedure. Every resize
//! of a stack re-establishes `page_height` before an animated encoder runs.

use super::encoder::{carry_metadata, EncoderFactory, EncoderQuality};
use super::error::ImageError;
use super::format::{negotiate_animated_format, negotiate_format};
use super::handle::{CropMode, ImageHandle, SizeMode};
use super::params::{
    AnimMode, FitMode, Flip, Gravity, MetadataPolicy, OutputFormat, TransformParams,
};
use crate::constants::{
    DEFAULT_MAX_ANIMATED_PIXELS, DEFAULT_MAX_FRAMES, DEFAULT_MAX_PIXELS, DEFAULT_QUALITY,
};

/// Animation and safety limits for a pipeline run, derived from server config
#[derive(Debug, Clone)]
pub struct AnimConfig {
    /// Upper bound on frames decoded for an animated output
    pub max_frames: u32,
    /// Budget for width * page height * frames before the animation is
    /// collapsed to a single frame
    pub max_animated_pixels: u64,
    /// Upper bound on single-frame pixels (decompression bomb guard)
    pub max_pixels: u64,
}

impl Default for AnimConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            max_animated_pixels: DEFAULT_MAX_ANIMATED_PIXELS,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Result of a pipeline run
#[derive(Debug)]
pub struct TransformOutput {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Per-frame height equals `height` unless the output is animated
    pub frame_count: u32,
    pub animated: bool,
}

/// Run the full transform pipeline over raw source bytes
pub fn transform(
    bytes: &[u8],
    params: &TransformParams,
    accept: Option<&str>,
    config: &AnimConfig,
) -> Result<TransformOutput, ImageError> {
    // Stage 1: probe - first frame only, animation metadata from the container
    let probe = ImageHandle::decode(bytes)?;
    let source_pages = probe.n_pages();
    let source_page_height = probe.page_height();
    let source_has_alpha = probe.has_alpha();
    let is_animated = source_pages > 1;

    let frame_pixels = probe.width() as u64 * source_page_height as u64;
    if frame_pixels > config.max_pixels {
        return Err(ImageError::TooManyPixels {
            pixels: frame_pixels,
            max_pixels: config.max_pixels,
        });
    }

    // Stage 2: budget
    let total_pixels = frame_pixels * source_pages as u64;
    let over_budget = is_animated && total_pixels > config.max_animated_pixels;
    let effective_pages = if is_animated && !over_budget {
        source_pages.min(config.max_frames)
    } else {
        source_pages
    };

    // Stage 3: decide output shape. The animated format (if any) replaces
    // the still-image negotiation result.
    let still_format = negotiate_format(accept, source_has_alpha, params.format);
    let animated_format = if is_animated
        && !over_budget
        && params.anim != AnimMode::Static
        && params.frame.is_none()
    {
        negotiate_animated_format(accept, params.format)
    } else {
        None
    };

    // Stage 4: reload with the frames the output actually needs
    let mut current = if animated_format.is_some() {
        drop(probe);
        if effective_pages < source_pages {
            ImageHandle::decode_frames(bytes, effective_pages)?
        } else {
            ImageHandle::decode_all(bytes)?
        }
    } else if params.frame.is_some() && is_animated {
        drop(probe);
        ImageHandle::decode_all(bytes)?
    } else {
        let mut handle = probe;
        handle.set_n_pages(1);
        handle
    };

    // Stage 5: single-frame extraction demotes the request to static
    if let (Some(frame), true) = (params.frame, is_animated) {
        let index = frame.min(source_pages - 1);
        let crop_width = current.width();
        current = current.crop(
            0,
            index * source_page_height,
            crop_width,
            source_page_height,
        )?;
    }
    let animated_output = animated_format.is_some();

    // Stage 6: trim, static only (find_trim over a stack crosses frames)
    if let (Some(threshold), false) = (params.trim, animated_output) {
        let bbox = current.find_trim(threshold);
        if bbox.width > 0 && bbox.height > 0 {
            current = current.crop(bbox.left, bbox.top, bbox.width, bbox.height)?;
        }
    }

    // Stage 7: rotate / flip
    if let Some(degrees) = params.rotate {
        if degrees != 0 {
            current = current.rotate(degrees)?;
        }
    }
    if let Some(flip) = params.flip {
        let (h, v) = match flip {
            Flip::Horizontal => (true, false),
            Flip::Vertical => (false, true),
            Flip::Both => (true, true),
        };
        current = current.flip(h, v)?;
    }

    // Stage 8: resize
    current = resize_stage(current, params, animated_output)?;

    // Stage 9: effects
    if let Some(sigma) = params.sharpen {
        if sigma > 0.0 {
            current = current.sharpen(sigma)?;
        }
    }
    if let Some(sigma) = params.blur {
        current = current.blur(sigma)?;
    }
    if params.brightness.is_some() || params.contrast.is_some() {
        let a = params.contrast.unwrap_or(1.0);
        let b = (params.brightness.unwrap_or(1.0) - 1.0) * 128.0;
        current = current.linear(a, b);
    }
    if let Some(gamma) = params.gamma {
        current = current.gamma(gamma);
    }
    if let Some(saturation) = params.saturation {
        current = current.saturate(saturation);
    }

    // Stage 10: background flatten (pad already consumed the colour)
    if let Some(background) = params.background {
        if params.fit != FitMode::Pad && current.has_alpha() {
            current = current.flatten(background);
        }
    }

    // Stage 11: encode
    let format = animated_format.unwrap_or(still_format);
    let quality =
        EncoderQuality::with_quality(params.quality.unwrap_or(DEFAULT_QUALITY as u32) as u8);
    let encoder = EncoderFactory::create(format, animated_output);
    let encoded = encoder.encode(&current, quality)?;

    // Encoders emit bare containers; keep/copyright re-attach the source's
    // EXIF and ICC chunks
    let mut data = encoded.data;
    if params.metadata != MetadataPolicy::Strip {
        data = carry_metadata(bytes, data);
    }

    let frame_count = if animated_output { current.n_pages() } else { 1 };
    Ok(TransformOutput {
        data,
        content_type: encoded.content_type,
        format: encoded.format,
        width: current.width(),
        height: current.height(),
        frame_count,
        animated: animated_output && frame_count > 1,
    })
}

/// Stage 8: resize, pad and the animated-cover exception
fn resize_stage(
    mut current: ImageHandle,
    params: &TransformParams,
    animated_output: bool,
) -> Result<ImageHandle, ImageError> {
    let (eff_w, eff_h) = params.effective_dimensions();

    if eff_w.is_none() && eff_h.is_none() {
        // A fit that targets an exact canvas cannot work without dimensions
        if matches!(params.fit, FitMode::Fill | FitMode::Pad) {
            return Err(ImageError::NoResizeDimensions);
        }
        return Ok(current);
    }

    let effective_fit = if params.fit == FitMode::Pad {
        FitMode::Contain
    } else {
        params.fit
    };

    let cover_both_axes =
        effective_fit == FitMode::Cover && eff_w.is_some() && eff_h.is_some();

    if cover_both_axes && animated_output {
        current = animated_cover(current, eff_w.unwrap(), eff_h.unwrap())?;
    } else if cover_both_axes {
        let crop = match params.gravity {
            Gravity::Smart => CropMode::Entropy,
            Gravity::Attention => CropMode::Attention,
            // compass gravities fall back to a centred crop
            _ => CropMode::Centre,
        };
        current = current.thumbnail(eff_w.unwrap(), eff_h, SizeMode::Both, Some(crop))?;
    } else {
        let size = match effective_fit {
            FitMode::Contain | FitMode::Inside => SizeMode::Down,
            FitMode::Fill => SizeMode::Force,
            FitMode::Outside => SizeMode::Up,
            // cover with a single axis degrades to aspect-preserving resize
            FitMode::Cover => SizeMode::Down,
            FitMode::Pad => unreachable!("pad maps to contain"),
        };
        current = current.thumbnail(eff_w.unwrap_or(0), eff_h, size, None)?;
    }

    if animated_output {
        // A stale page height from the source resolution would make the
        // animated encoder read past frame boundaries.
        let pages = current.n_pages().max(1);
        current.set_page_height(current.height() / pages);
    }

    if params.fit == FitMode::Pad && !animated_output {
        let canvas_w = eff_w.unwrap_or(current.width());
        let canvas_h = eff_h.unwrap_or(current.height());
        if current.width() < canvas_w || current.height() < canvas_h {
            let left = (canvas_w - current.width()) / 2;
            let top = (canvas_h - current.height()) / 2;
            let background = params.background.unwrap_or([255, 255, 255]);
            current = current.embed(left, top, canvas_w, canvas_h, background)?;
        }
    }

    Ok(current)
}

/// The animated-cover exception: a single-call crop-during-resize would
/// operate over the concatenated frame buffer and corrupt frame boundaries,
/// so scale first, then crop frame-safely.
fn animated_cover(
    current: ImageHandle,
    target_w: u32,
    target_h: u32,
) -> Result<ImageHandle, ImageError> {
    let src_w = current.width();
    let page_h = current.page_height().max(1);
    let pages = current.n_pages();

    let scale = (target_w as f64 / src_w as f64).max(target_h as f64 / page_h as f64);
    let scaled_w = ((src_w as f64 * scale).ceil() as u32).max(target_w);
    let scaled_page_h = ((page_h as f64 * scale).ceil() as u32).max(target_h);

    let scaled = current.map_frames(|f| super::handle::resize_rgba(&f, scaled_w, scaled_page_h))?;

    let crop_left = (scaled_w - target_w) / 2;
    let crop_top = (scaled_page_h - target_h) / 2;

    if crop_top == 0 && crop_left == 0 && scaled_w == target_w && scaled_page_h == target_h {
        return Ok(scaled);
    }

    if crop_top == 0 {
        // Only a horizontal crop: one crop over the full stack is safe
        let delays = scaled.delays_ms().to_vec();
        let full_height = scaled.height();
        let mut cropped = scaled.crop(crop_left, 0, target_w, full_height)?;
        cropped.set_n_pages(pages);
        cropped.set_page_height(target_h);
        cropped.set_delays_ms(delays);
        Ok(cropped)
    } else {
        // Vertical crop must not cross frame boundaries: crop each frame
        // and join them back into a stack
        let delays = scaled.delays_ms().to_vec();
        let frames = scaled
            .frames()
            .into_iter()
            .map(|frame| {
                image::imageops::crop_imm(&frame, crop_left, crop_top, target_w, target_h)
                    .to_image()
            })
            .collect();
        let mut joined = ImageHandle::arrayjoin_vertical(frames, delays)?;
        joined.set_page_height(target_h);
        Ok(joined)
    }
}
