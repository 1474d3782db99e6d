//! Image encoder abstraction
//!
//! Trait-based encoder family dispatched by output format. Animated output
//! (WebP, GIF) re-plays the per-frame delays carried by the handle; the GIF
//! encoder validates the stacked-frame geometry one last time and falls
//! back to a static encode when an earlier stage invalidated it.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::gif::{GifEncoder as ImageGifEncoder, Repeat};
use image::{Delay, Frame};

use super::error::ImageError;
use super::handle::ImageHandle;
use super::params::OutputFormat;

/// Quality settings for image encoding
#[derive(Debug, Clone, Copy)]
pub struct EncoderQuality {
    /// Quality value (1-100, where 100 is best quality)
    pub quality: u8,
    /// AVIF speed preset (1-10, where 10 is fastest)
    pub avif_speed: u8,
}

impl Default for EncoderQuality {
    fn default() -> Self {
        Self {
            quality: 80,
            avif_speed: 6,
        }
    }
}

impl EncoderQuality {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            ..Default::default()
        }
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>, format: OutputFormat) -> Self {
        let content_type = format.content_type();
        Self {
            data,
            format,
            content_type,
        }
    }
}

/// Trait for image encoders. Implementations read the handle's full pixel
/// buffer (and frame metadata, for animated formats).
pub trait ImageEncoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn encode(
        &self,
        handle: &ImageHandle,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError>;

    fn supports_transparency(&self) -> bool;
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    /// Create an encoder for the format; `animated` selects the animated
    /// variant for formats that have one.
    pub fn create(format: OutputFormat, animated: bool) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP if animated => Box::new(AnimatedWebPEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
            OutputFormat::Avif => Box::new(AvifEncoder),
            OutputFormat::Gif => Box::new(GifEncoder),
            // Auto must be resolved by negotiation before encoding
            OutputFormat::Auto => Box::new(JpegEncoder),
        }
    }
}

/// JPEG encoder using the image crate
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;

        // JPEG has no alpha channel
        let rgb = rgba_to_rgb(handle.raw_rgba());

        let mut output = Cursor::new(Vec::new());
        let encoder = ImageJpegEncoder::new_with_quality(&mut output, quality.quality);
        encoder
            .write_image(
                &rgb,
                handle.width(),
                handle.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;

        Ok(EncodedImage::new(output.into_inner(), OutputFormat::Jpeg))
    }

    fn supports_transparency(&self) -> bool {
        false
    }
}

/// PNG encoder using the image crate
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        _quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;
        use image::ImageEncoder as _;

        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new(&mut output);
        encoder
            .write_image(
                handle.raw_rgba(),
                handle.width(),
                handle.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;

        Ok(EncodedImage::new(output.into_inner(), OutputFormat::Png))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Lossy static WebP encoder using the webp crate
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let encoder =
            webp::Encoder::from_rgba(handle.raw_rgba(), handle.width(), handle.height());
        let output = encoder.encode(quality.quality as f32);
        Ok(EncodedImage::new(output.to_vec(), OutputFormat::WebP))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Animated WebP encoder using the webp-animation crate
pub struct AnimatedWebPEncoder;

impl ImageEncoder for AnimatedWebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        _quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        if !handle.page_geometry_valid() {
            return Err(ImageError::encode_failed(
                "webp",
                "stacked frame geometry is invalid",
            ));
        }

        let frame_size = (handle.width(), handle.page_height());
        let mut encoder = webp_animation::Encoder::new(frame_size)
            .map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;

        let mut timestamp_ms: i32 = 0;
        for (index, frame) in handle.frames().into_iter().enumerate() {
            encoder
                .add_frame(frame.as_raw(), timestamp_ms)
                .map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;
            timestamp_ms += handle.delay_ms(index) as i32;
        }

        let data = encoder
            .finalize(timestamp_ms)
            .map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;
        Ok(EncodedImage::new(data.to_vec(), OutputFormat::WebP))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// AVIF encoder using the ravif crate
pub struct AvifEncoder;

impl ImageEncoder for AvifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Avif
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let pixels: Vec<rgb::RGBA<u8>> = handle
            .raw_rgba()
            .chunks_exact(4)
            .map(|c| rgb::RGBA::new(c[0], c[1], c[2], c[3]))
            .collect();

        let img = imgref::Img::new(
            pixels.as_slice(),
            handle.width() as usize,
            handle.height() as usize,
        );

        let encoder = ravif::Encoder::new()
            .with_quality(quality.quality as f32)
            .with_speed(quality.avif_speed);

        let result = encoder
            .encode_rgba(img)
            .map_err(|e| ImageError::encode_failed("avif", e.to_string()))?;

        Ok(EncodedImage::new(result.avif_file, OutputFormat::Avif))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// GIF encoder using the image crate; handles both static and animated
/// output. Invalid stacked-frame geometry degrades to a static encode of
/// the full buffer rather than erroring.
pub struct GifEncoder;

impl ImageEncoder for GifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Gif
    }

    fn encode(
        &self,
        handle: &ImageHandle,
        _quality: EncoderQuality,
    ) -> Result<EncodedImage, ImageError> {
        let animated = handle.n_pages() > 1 && handle.page_geometry_valid();

        let mut output = Vec::new();
        {
            let mut encoder = ImageGifEncoder::new_with_speed(&mut output, 10);
            if animated {
                encoder
                    .set_repeat(Repeat::Infinite)
                    .map_err(|e| ImageError::encode_failed("gif", e.to_string()))?;
                for (index, frame) in handle.frames().into_iter().enumerate() {
                    let delay = Delay::from_numer_denom_ms(handle.delay_ms(index), 1);
                    encoder
                        .encode_frame(Frame::from_parts(frame, 0, 0, delay))
                        .map_err(|e| ImageError::encode_failed("gif", e.to_string()))?;
                }
            } else {
                // Animation invalidated upstream: emit the buffer as one frame
                let frame = Frame::new(image::RgbaImage::from_raw(
                    handle.width(),
                    handle.height(),
                    handle.raw_rgba().to_vec(),
                )
                .ok_or_else(|| ImageError::encode_failed("gif", "buffer size mismatch"))?);
                encoder
                    .encode_frame(frame)
                    .map_err(|e| ImageError::encode_failed("gif", e.to_string()))?;
            }
        }

        Ok(EncodedImage::new(output, OutputFormat::Gif))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Copy EXIF and ICC profile chunks from the source container into the
/// encoded output.
///
/// The pixel pipeline works on raw RGBA buffers, so encoders emit bare
/// containers; this re-attaches the metadata segments afterwards for the
/// keep/copyright policies. JPEG, PNG and WebP carry the chunks on both
/// sides; a source or output img-parts cannot parse (GIF, AVIF) passes
/// through unchanged.
pub fn carry_metadata(source: &[u8], encoded: Vec<u8>) -> Vec<u8> {
    use img_parts::{DynImage, ImageEXIF, ImageICC};

    let parsed = match DynImage::from_bytes(Bytes::copy_from_slice(source)) {
        Ok(Some(img)) => img,
        _ => return encoded,
    };
    let exif = parsed.exif();
    let icc = parsed.icc_profile();
    if exif.is_none() && icc.is_none() {
        return encoded;
    }

    let encoded_bytes = Bytes::from(encoded);
    match DynImage::from_bytes(encoded_bytes.clone()) {
        Ok(Some(mut out)) => {
            out.set_exif(exif);
            out.set_icc_profile(icc);
            out.encoder().bytes().to_vec()
        }
        _ => encoded_bytes.to_vec(),
    }
}

/// Convert RGBA to RGB by discarding the alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn checkerboard(width: u32, height: u32) -> ImageHandle {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        ImageHandle::from_rgba(img)
    }

    #[test]
    fn test_jpeg_encode_magic_bytes() {
        let handle = checkerboard(8, 8);
        let encoded = JpegEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();
        assert_eq!(encoded.content_type, "image/jpeg");
        assert_eq!(&encoded.data[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_png_encode_magic_bytes() {
        let handle = checkerboard(8, 8);
        let encoded = PngEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();
        assert_eq!(encoded.content_type, "image/png");
        assert_eq!(&encoded.data[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_webp_encode_magic_bytes() {
        let handle = checkerboard(8, 8);
        let encoded = WebPEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();
        assert_eq!(encoded.content_type, "image/webp");
        assert_eq!(&encoded.data[0..4], b"RIFF");
        assert_eq!(&encoded.data[8..12], b"WEBP");
    }

    #[test]
    fn test_gif_static_encode() {
        let handle = checkerboard(8, 8);
        let encoded = GifEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();
        assert_eq!(&encoded.data[0..4], b"GIF8");
    }

    #[test]
    fn test_gif_animated_round_trip() {
        let frames: Vec<RgbaImage> = (0..3)
            .map(|i| {
                RgbaImage::from_pixel(8, 8, image::Rgba([(i * 80) as u8, 0, 0, 255]))
            })
            .collect();
        let handle = ImageHandle::arrayjoin_vertical(frames, vec![100, 100, 100]).unwrap();
        let encoded = GifEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();

        let decoded = ImageHandle::decode_all(&encoded.data).unwrap();
        assert_eq!(decoded.n_pages(), 3);
        assert_eq!(decoded.page_height(), 8);
    }

    #[test]
    fn test_gif_invalid_geometry_degrades_to_static() {
        let frames: Vec<RgbaImage> =
            (0..2).map(|_| RgbaImage::new(8, 8)).collect();
        let mut handle = ImageHandle::arrayjoin_vertical(frames, vec![100, 100]).unwrap();
        // corrupt the page metadata: 7 does not divide 16
        handle.set_page_height(7);
        let encoded = GifEncoder
            .encode(&handle, EncoderQuality::default())
            .unwrap();
        let decoded = ImageHandle::decode_all(&encoded.data).unwrap();
        assert_eq!(decoded.n_pages(), 1);
    }

    #[test]
    fn test_factory_picks_animated_webp() {
        let encoder = EncoderFactory::create(OutputFormat::WebP, true);
        assert_eq!(encoder.format(), OutputFormat::WebP);
        let encoder = EncoderFactory::create(OutputFormat::Gif, true);
        assert_eq!(encoder.format(), OutputFormat::Gif);
    }

    #[test]
    fn test_quality_clamped() {
        let q = EncoderQuality::with_quality(0);
        assert_eq!(q.quality, 1);
        let q = EncoderQuality::with_quality(255);
        assert_eq!(q.quality, 100);
    }

    #[test]
    fn test_rgba_to_rgb_drops_alpha() {
        let rgb = rgba_to_rgb(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(rgb, vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn test_carry_metadata_copies_exif_between_jpegs() {
        use img_parts::{jpeg::Jpeg, ImageEXIF};

        let plain = JpegEncoder
            .encode(&checkerboard(8, 8), EncoderQuality::default())
            .unwrap()
            .data;
        let mut source = Jpeg::from_bytes(plain.clone().into()).unwrap();
        source.set_exif(Some(Bytes::from_static(b"exif-payload")));
        let source_bytes = source.encoder().bytes();

        let carried = carry_metadata(&source_bytes, plain);
        let out = Jpeg::from_bytes(carried.into()).unwrap();
        assert_eq!(out.exif(), Some(Bytes::from_static(b"exif-payload")));
    }

    #[test]
    fn test_carry_metadata_without_source_metadata_is_passthrough() {
        let source = JpegEncoder
            .encode(&checkerboard(8, 8), EncoderQuality::default())
            .unwrap()
            .data;
        let encoded = PngEncoder
            .encode(&checkerboard(8, 8), EncoderQuality::default())
            .unwrap()
            .data;
        let carried = carry_metadata(&source, encoded.clone());
        assert_eq!(carried, encoded);
    }

    #[test]
    fn test_carry_metadata_unparseable_output_is_passthrough() {
        use img_parts::{jpeg::Jpeg, ImageEXIF};

        let plain = JpegEncoder
            .encode(&checkerboard(8, 8), EncoderQuality::default())
            .unwrap()
            .data;
        let mut source = Jpeg::from_bytes(plain.into()).unwrap();
        source.set_exif(Some(Bytes::from_static(b"exif-payload")));
        let source_bytes = source.encoder().bytes();

        // GIF output has no EXIF slot; the bytes must come back unchanged
        let gif = GifEncoder
            .encode(&checkerboard(8, 8), EncoderQuality::default())
            .unwrap()
            .data;
        let carried = carry_metadata(&source_bytes, gif.clone());
        assert_eq!(carried, gif);
    }
}
