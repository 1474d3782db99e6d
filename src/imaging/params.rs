//! Transform parameter parsing
//!
//! Transform strings are the last URL path segment, a comma-separated list
//! of `key=value` pairs: `/photo.png/w=800,h=600,fit=cover,f=webp`.
//!
//! Parsing and validation are separate passes: `parse` rejects unknown keys,
//! empty values and unparseable numbers, while `validate` enforces the
//! per-field ranges. The canonical serialisation (`cache_key_into`) is the
//! cache identity of a parameter set: fields in a fixed order, defaults
//! omitted.

use std::fmt::Write as _;
use std::str::FromStr;

use super::error::ImageError;
use crate::constants::{DEFAULT_QUALITY, MAX_DIMENSION};

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    /// Auto-select based on Accept header
    #[default]
    Auto,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Auto => "auto",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Gif => "image/gif",
            Self::Auto => "application/octet-stream",
        }
    }

    /// Whether this format can carry an animation
    pub fn supports_animation(&self) -> bool {
        matches!(self, Self::WebP | Self::Gif)
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "gif" => Ok(OutputFormat::Gif),
            "auto" => Ok(OutputFormat::Auto),
            _ => Err(ImageError::invalid_field(
                "format",
                format!("unknown format: {}", s),
            )),
        }
    }
}

/// How to fit the image within target dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scale to fit within dimensions, preserving aspect ratio (default)
    #[default]
    Contain,
    /// Crop to fill target dimensions
    Cover,
    /// Stretch to fill exactly (may distort)
    Fill,
    /// Scale down only, never up
    Inside,
    /// Scale up only, never down
    Outside,
    /// Center on a padded canvas of exactly the target size
    Pad,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contain => "contain",
            Self::Cover => "cover",
            Self::Fill => "fill",
            Self::Inside => "inside",
            Self::Outside => "outside",
            Self::Pad => "pad",
        }
    }
}

impl FromStr for FitMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            "fill" => Ok(FitMode::Fill),
            "inside" => Ok(FitMode::Inside),
            "outside" => Ok(FitMode::Outside),
            "pad" => Ok(FitMode::Pad),
            _ => Err(ImageError::invalid_field(
                "fit",
                format!("unknown fit mode: {}", s),
            )),
        }
    }
}

/// Gravity/anchor point for crop operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Center,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
    /// Content-aware crop favoring high-entropy regions
    Smart,
    /// Content-aware crop favoring salient regions
    Attention,
}

impl Gravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::North => "n",
            Self::South => "s",
            Self::East => "e",
            Self::West => "w",
            Self::NorthEast => "ne",
            Self::NorthWest => "nw",
            Self::SouthEast => "se",
            Self::SouthWest => "sw",
            Self::Smart => "smart",
            Self::Attention => "attention",
        }
    }
}

impl FromStr for Gravity {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" | "centre" => Ok(Gravity::Center),
            "n" => Ok(Gravity::North),
            "s" => Ok(Gravity::South),
            "e" => Ok(Gravity::East),
            "w" => Ok(Gravity::West),
            "ne" => Ok(Gravity::NorthEast),
            "nw" => Ok(Gravity::NorthWest),
            "se" => Ok(Gravity::SouthEast),
            "sw" => Ok(Gravity::SouthWest),
            "smart" => Ok(Gravity::Smart),
            "att" | "attention" => Ok(Gravity::Attention),
            _ => Err(ImageError::invalid_field(
                "gravity",
                format!("unknown gravity: {}", s),
            )),
        }
    }
}

/// Mirror direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "h",
            Self::Vertical => "v",
            Self::Both => "hv",
        }
    }
}

impl FromStr for Flip {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h" => Ok(Flip::Horizontal),
            "v" => Ok(Flip::Vertical),
            "hv" | "vh" => Ok(Flip::Both),
            _ => Err(ImageError::invalid_field(
                "flip",
                format!("must be h, v, or hv, got: {}", s),
            )),
        }
    }
}

/// What to do with embedded metadata (EXIF, ICC, XMP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataPolicy {
    #[default]
    Strip,
    Keep,
    /// Keep copyright-related metadata only (currently identical to Keep)
    Copyright,
}

impl MetadataPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strip => "strip",
            Self::Keep => "keep",
            Self::Copyright => "copyright",
        }
    }
}

impl FromStr for MetadataPolicy {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strip" | "none" => Ok(MetadataPolicy::Strip),
            "keep" | "all" => Ok(MetadataPolicy::Keep),
            "copyright" => Ok(MetadataPolicy::Copyright),
            _ => Err(ImageError::invalid_field(
                "metadata",
                format!("unknown metadata policy: {}", s),
            )),
        }
    }
}

/// Animation handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimMode {
    /// Animate when the source is animated and the client accepts it
    #[default]
    Auto,
    /// Always collapse to the first frame
    Static,
    /// Request animated output explicitly
    Animate,
}

impl AnimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Static => "static",
            Self::Animate => "animate",
        }
    }
}

impl FromStr for AnimMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" | "true" => Ok(AnimMode::Auto),
            "static" | "false" => Ok(AnimMode::Static),
            "animate" => Ok(AnimMode::Animate),
            _ => Err(ImageError::invalid_field(
                "anim",
                format!("unknown animation mode: {}", s),
            )),
        }
    }
}

/// Parsed and immutable transform parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// None means "server default" (80 unless configured otherwise)
    pub quality: Option<u32>,
    pub format: OutputFormat,
    pub fit: FitMode,
    pub gravity: Gravity,
    pub sharpen: Option<f32>,
    pub blur: Option<f32>,
    pub dpr: f32,
    pub rotate: Option<u16>,
    pub flip: Option<Flip>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub gamma: Option<f32>,
    pub background: Option<[u8; 3]>,
    pub metadata: MetadataPolicy,
    pub trim: Option<u32>,
    pub anim: AnimMode,
    pub frame: Option<u32>,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: None,
            format: OutputFormat::Auto,
            fit: FitMode::Contain,
            gravity: Gravity::Center,
            sharpen: None,
            blur: None,
            dpr: 1.0,
            rotate: None,
            flip: None,
            brightness: None,
            contrast: None,
            saturation: None,
            gamma: None,
            background: None,
            metadata: MetadataPolicy::Strip,
            trim: None,
            anim: AnimMode::Auto,
            frame: None,
        }
    }
}

impl TransformParams {
    /// Parse a transform string (`w=800,h=600,fit=cover`).
    ///
    /// Unknown keys fail with `InvalidParameter`, empty values with
    /// `EmptyValue`. Number parsing failures are parse errors too; range
    /// enforcement is `validate`'s job.
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        let mut params = Self::default();

        for pair in s.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (pair, ""),
            };
            if value.is_empty() {
                return Err(ImageError::EmptyValue {
                    param: key.to_string(),
                });
            }

            match key {
                "w" | "width" => params.width = Some(parse_num(value, "width")?),
                "h" | "height" => params.height = Some(parse_num(value, "height")?),
                "q" | "quality" => params.quality = Some(parse_num(value, "quality")?),
                "f" | "fmt" | "format" => params.format = value.parse()?,
                "fit" => params.fit = value.parse()?,
                "g" | "gravity" => params.gravity = value.parse()?,
                "sharpen" => params.sharpen = Some(parse_float(value, "sharpen")?),
                "blur" => params.blur = Some(parse_float(value, "blur")?),
                "dpr" => params.dpr = parse_float(value, "dpr")?,
                "rotate" => params.rotate = Some(parse_num(value, "rotate")?),
                "flip" => params.flip = Some(value.parse()?),
                "brightness" => params.brightness = Some(parse_float(value, "brightness")?),
                "contrast" => params.contrast = Some(parse_float(value, "contrast")?),
                "saturation" => params.saturation = Some(parse_float(value, "saturation")?),
                "gamma" => params.gamma = Some(parse_float(value, "gamma")?),
                "bg" | "background" => params.background = Some(parse_rgb(value)?),
                "metadata" => params.metadata = value.parse()?,
                "trim" => params.trim = Some(parse_num(value, "trim")?),
                "anim" => params.anim = value.parse()?,
                "frame" => params.frame = Some(parse_num(value, "frame")?),
                _ => {
                    return Err(ImageError::InvalidParameter {
                        param: key.to_string(),
                    })
                }
            }
        }

        Ok(params)
    }

    /// Enforce the declared range of every field
    pub fn validate(&self) -> Result<(), ImageError> {
        if let Some(w) = self.width {
            if !(1..=MAX_DIMENSION).contains(&w) {
                return Err(ImageError::invalid_field("width", "must be 1-8192"));
            }
        }
        if let Some(h) = self.height {
            if !(1..=MAX_DIMENSION).contains(&h) {
                return Err(ImageError::invalid_field("height", "must be 1-8192"));
            }
        }
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(ImageError::invalid_field("quality", "must be 1-100"));
            }
        }
        if let Some(sigma) = self.sharpen {
            if !(0.0..=10.0).contains(&sigma) {
                return Err(ImageError::invalid_field("sharpen", "sigma must be 0-10"));
            }
        }
        if let Some(sigma) = self.blur {
            if !(0.1..=250.0).contains(&sigma) {
                return Err(ImageError::invalid_field("blur", "sigma must be 0.1-250"));
            }
        }
        if !(1.0..=5.0).contains(&self.dpr) {
            return Err(ImageError::invalid_field("dpr", "must be 1-5"));
        }
        if let Some(r) = self.rotate {
            if ![0, 90, 180, 270].contains(&r) {
                return Err(ImageError::invalid_field(
                    "rotate",
                    "must be 0, 90, 180, or 270",
                ));
            }
        }
        for (field, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ] {
            if let Some(v) = value {
                if !(0.0..=2.0).contains(&v) {
                    return Err(ImageError::invalid_field(field, "must be 0-2"));
                }
            }
        }
        if let Some(g) = self.gamma {
            if !(0.1..=10.0).contains(&g) {
                return Err(ImageError::invalid_field("gamma", "must be 0.1-10"));
            }
        }
        if let Some(t) = self.trim {
            if !(1..=100).contains(&t) {
                return Err(ImageError::invalid_field("trim", "must be 1-100"));
            }
        }
        if let Some(frame) = self.frame {
            if frame > 999 {
                return Err(ImageError::invalid_field("frame", "must be 0-999"));
            }
        }
        Ok(())
    }

    /// Effective target dimensions: declared * DPR, clamped to the maximum
    pub fn effective_dimensions(&self) -> (Option<u32>, Option<u32>) {
        let scale = |v: u32| ((v as f32 * self.dpr).round() as u32).min(MAX_DIMENSION);
        (self.width.map(scale), self.height.map(scale))
    }

    /// Append the canonical serialisation of this parameter set to `buf`.
    ///
    /// Fields are emitted in a fixed order with defaults omitted, so two
    /// parameter sets are cache-equal iff the output is byte-identical.
    pub fn cache_key_into(&self, buf: &mut String) {
        let mut first = true;
        let mut push = |buf: &mut String, key: &str, value: &str| {
            if !first {
                buf.push(',');
            }
            first = false;
            buf.push_str(key);
            buf.push('=');
            buf.push_str(value);
        };

        if let Some(w) = self.width {
            push(buf, "w", &w.to_string());
        }
        if let Some(h) = self.height {
            push(buf, "h", &h.to_string());
        }
        if let Some(q) = self.quality {
            if q != DEFAULT_QUALITY as u32 {
                push(buf, "q", &q.to_string());
            }
        }
        if self.format != OutputFormat::Auto {
            push(buf, "f", self.format.as_str());
        }
        if self.fit != FitMode::Contain {
            push(buf, "fit", self.fit.as_str());
        }
        if self.gravity != Gravity::Center {
            push(buf, "g", self.gravity.as_str());
        }
        if let Some(sigma) = self.sharpen {
            push(buf, "sharpen", &format!("{:.2}", sigma));
        }
        if let Some(sigma) = self.blur {
            push(buf, "blur", &format!("{:.2}", sigma));
        }
        if self.dpr != 1.0 {
            push(buf, "dpr", &format!("{:.1}", self.dpr));
        }
        if let Some(r) = self.rotate {
            if r != 0 {
                push(buf, "rotate", &r.to_string());
            }
        }
        if let Some(flip) = self.flip {
            push(buf, "flip", flip.as_str());
        }
        if let Some(v) = self.brightness {
            push(buf, "brightness", &format!("{:.2}", v));
        }
        if let Some(v) = self.contrast {
            push(buf, "contrast", &format!("{:.2}", v));
        }
        if let Some(v) = self.saturation {
            push(buf, "saturation", &format!("{:.2}", v));
        }
        if let Some(v) = self.gamma {
            push(buf, "gamma", &format!("{:.2}", v));
        }
        if let Some([r, g, b]) = self.background {
            let mut hex = String::with_capacity(6);
            let _ = write!(hex, "{:02X}{:02X}{:02X}", r, g, b);
            push(buf, "bg", &hex);
        }
        if self.metadata != MetadataPolicy::Strip {
            push(buf, "metadata", self.metadata.as_str());
        }
        if let Some(t) = self.trim {
            push(buf, "trim", &t.to_string());
        }
        if self.anim != AnimMode::Auto {
            push(buf, "anim", self.anim.as_str());
        }
        if let Some(frame) = self.frame {
            push(buf, "frame", &frame.to_string());
        }
    }

    /// Canonical serialisation as an owned string
    pub fn to_cache_key(&self) -> String {
        let mut buf = String::new();
        self.cache_key_into(&mut buf);
        buf
    }
}

fn parse_num<T: FromStr>(value: &str, field: &'static str) -> Result<T, ImageError> {
    value
        .parse()
        .map_err(|_| ImageError::invalid_field(field, format!("not a number: {}", value)))
}

fn parse_float(value: &str, field: &'static str) -> Result<f32, ImageError> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| ImageError::invalid_field(field, format!("not a number: {}", value)))?;
    if !parsed.is_finite() {
        return Err(ImageError::invalid_field(field, "must be finite"));
    }
    Ok(parsed)
}

fn parse_rgb(value: &str) -> Result<[u8; 3], ImageError> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ImageError::invalid_field(
            "background",
            format!("expected 6 hex digits, got: {}", value),
        ));
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
    Ok([channel(0..2), channel(2..4), channel(4..6)])
}
