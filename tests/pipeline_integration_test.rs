//! Pipeline integration tests
//!
//! End-to-end pipeline scenarios over real encoded fixtures: animated GIF
//! handling, format negotiation, budget degradation and conditional
//! behaviors that do not need a socket.

use std::io::Cursor;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use zimgx::imaging::{transform, AnimConfig, ImageHandle, TransformParams};

fn spinner_gif(width: u32, height: u32, frames: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, 10);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for i in 0..frames {
            let angle = i as f32 / frames as f32;
            let img = RgbaImage::from_fn(width, height, |x, y| {
                let shade = ((x + y) as f32 * angle) as u8;
                image::Rgba([shade, 255 - shade, (i * 16 % 256) as u8, 255])
            });
            let frame = Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(80, 1));
            encoder.encode_frame(frame).unwrap();
        }
    }
    buffer
}

fn photo_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([
            ((x * 255) / width.max(1)) as u8,
            ((y * 255) / height.max(1)) as u8,
            64,
            255,
        ])
    });
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn params(s: &str) -> TransformParams {
    let parsed = TransformParams::parse(s).unwrap();
    parsed.validate().unwrap();
    parsed
}

#[test]
fn test_spinner_resize_keeps_all_frames() {
    // GET /spinner.gif/w=64 with Accept: image/gif on a 128x128 12-frame GIF
    let source = spinner_gif(128, 128, 12);
    let output = transform(
        &source,
        &params("w=64"),
        Some("image/gif"),
        &AnimConfig::default(),
    )
    .unwrap();

    assert_eq!(output.content_type, "image/gif");
    assert!(output.animated);
    assert_eq!(output.frame_count, 12);
    assert_eq!(output.width, 64);

    let decoded = ImageHandle::decode_all(&output.data).unwrap();
    assert_eq!(decoded.n_pages(), 12);
    assert_eq!(decoded.page_height(), 64);
    assert!(decoded.page_geometry_valid());
}

#[test]
fn test_spinner_static_png_is_single_frame() {
    // GET /spinner.gif/anim=static&f=png
    let source = spinner_gif(128, 128, 12);
    let output = transform(
        &source,
        &params("anim=static,f=png"),
        Some("image/gif"),
        &AnimConfig::default(),
    )
    .unwrap();

    assert_eq!(output.content_type, "image/png");
    assert!(!output.animated);
    assert_eq!(output.height, 128);
}

#[test]
fn test_spinner_frame_extraction() {
    // GET /spinner.gif/frame=1&f=png yields the 128x128 second frame
    let source = spinner_gif(128, 128, 12);
    let output = transform(
        &source,
        &params("frame=1,f=png"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();

    assert_eq!(output.content_type, "image/png");
    assert_eq!((output.width, output.height), (128, 128));
    assert!(!output.animated);
}

#[test]
fn test_spinner_both_axes_gif_reencode() {
    // GET /spinner.gif/w=32,h=32&f=gif reloads and re-encodes cleanly
    let source = spinner_gif(128, 128, 12);
    let output = transform(
        &source,
        &params("w=32,h=32,f=gif"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();

    assert!(output.animated);
    let decoded = ImageHandle::decode_all(&output.data).unwrap();
    assert_eq!(decoded.n_pages(), 12);
    assert_eq!(decoded.width(), 32);
    assert_eq!(decoded.page_height(), 32);
    assert!(decoded.page_geometry_valid());
}

#[test]
fn test_photo_cover_to_avif() {
    // GET /photo.png/w=800,h=600,fit=cover with Accept: image/avif,image/webp
    let source = photo_png(1024, 768);
    let output = transform(
        &source,
        &params("w=800,h=600,fit=cover"),
        Some("image/avif,image/webp"),
        &AnimConfig::default(),
    )
    .unwrap();

    assert_eq!(output.content_type, "image/avif");
    assert_eq!((output.width, output.height), (800, 600));
}

#[test]
fn test_animated_pixel_budget_forces_static() {
    // maxAnimatedPixels = 1000 with the 12-frame 128x128 GIF: static output
    let source = spinner_gif(128, 128, 12);
    let config = AnimConfig {
        max_animated_pixels: 1000,
        ..Default::default()
    };
    let output = transform(&source, &params("w=128"), Some("image/gif"), &config).unwrap();

    assert!(!output.animated);
    assert_eq!(output.height, 128);
}

#[test]
fn test_webp_negotiated_for_animated_when_accepted() {
    let source = spinner_gif(64, 64, 4);
    let output = transform(
        &source,
        &params("w=32"),
        Some("image/webp,image/gif"),
        &AnimConfig::default(),
    )
    .unwrap();

    assert_eq!(output.content_type, "image/webp");
    assert!(output.animated);
    assert_eq!(&output.data[0..4], b"RIFF");
    assert_eq!(&output.data[8..12], b"WEBP");
}

#[test]
fn test_gif_source_without_gif_accept_degrades_to_static() {
    // client accepts only jpeg: no animated format, first frame wins
    let source = spinner_gif(64, 64, 4);
    let output = transform(
        &source,
        &params("w=32"),
        Some("image/jpeg"),
        &AnimConfig::default(),
    )
    .unwrap();

    assert!(!output.animated);
    assert_eq!(output.content_type, "image/jpeg");
}

#[test]
fn test_dpr_scales_target() {
    let source = photo_png(400, 400);
    let output = transform(
        &source,
        &params("w=100,dpr=2,f=png"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();
    assert_eq!(output.width, 200);
}

#[test]
fn test_metadata_keep_preserves_exif() {
    use img_parts::{jpeg::Jpeg, ImageEXIF};

    let img = RgbaImage::from_fn(16, 16, |x, y| image::Rgba([(x * 16) as u8, (y * 16) as u8, 0, 255]));
    let mut plain = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut plain, ImageFormat::Jpeg)
        .unwrap();

    let mut source = Jpeg::from_bytes(plain.into_inner().into()).unwrap();
    source.set_exif(Some(bytes::Bytes::from_static(b"camera-metadata")));
    let source_bytes = source.encoder().bytes();

    let kept = transform(
        &source_bytes,
        &params("metadata=keep,f=jpeg"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();
    let parsed = Jpeg::from_bytes(kept.data.into()).unwrap();
    assert!(parsed.exif().is_some());

    let copyright = transform(
        &source_bytes,
        &params("metadata=copyright,f=jpeg"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();
    let parsed = Jpeg::from_bytes(copyright.data.into()).unwrap();
    assert!(parsed.exif().is_some());
}

#[test]
fn test_metadata_strip_drops_exif() {
    use img_parts::{jpeg::Jpeg, ImageEXIF};

    let img = RgbaImage::from_fn(16, 16, |x, y| image::Rgba([(x * 16) as u8, (y * 16) as u8, 0, 255]));
    let mut plain = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut plain, ImageFormat::Jpeg)
        .unwrap();

    let mut source = Jpeg::from_bytes(plain.into_inner().into()).unwrap();
    source.set_exif(Some(bytes::Bytes::from_static(b"camera-metadata")));
    let source_bytes = source.encoder().bytes();

    // strip is the default policy
    let stripped = transform(
        &source_bytes,
        &params("f=jpeg"),
        None,
        &AnimConfig::default(),
    )
    .unwrap();
    let parsed = Jpeg::from_bytes(stripped.data.into()).unwrap();
    assert!(parsed.exif().is_none());
}

#[test]
fn test_identity_transform_still_reencodes() {
    let source = photo_png(32, 32);
    let output = transform(
        &source,
        &TransformParams::default(),
        Some("image/webp"),
        &AnimConfig::default(),
    )
    .unwrap();
    assert_eq!(output.content_type, "image/webp");
    assert_eq!((output.width, output.height), (32, 32));
}
