//! Output format negotiation based on the Accept header
//!
//! Balances client capability (Accept media ranges with q-values),
//! compression efficiency (AVIF > WebP > classic formats) and source
//! characteristics (alpha needs a format that can carry it; animation needs
//! WebP or GIF). Explicit format overrides always win.

use super::params::OutputFormat;

/// Client capability set parsed from an Accept header
#[derive(Debug, Clone, Copy, Default)]
struct AcceptSet {
    avif: bool,
    webp: bool,
    jpeg: bool,
    png: bool,
    gif: bool,
}

impl AcceptSet {
    fn accepts(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Avif => self.avif,
            OutputFormat::WebP => self.webp,
            OutputFormat::Jpeg => self.jpeg,
            OutputFormat::Png => self.png,
            OutputFormat::Gif => self.gif,
            OutputFormat::Auto => false,
        }
    }

    fn enable(&mut self, format: OutputFormat, enabled: bool) {
        match format {
            OutputFormat::Avif => self.avif = enabled,
            OutputFormat::WebP => self.webp = enabled,
            OutputFormat::Jpeg => self.jpeg = enabled,
            OutputFormat::Png => self.png = enabled,
            OutputFormat::Gif => self.gif = enabled,
            OutputFormat::Auto => {}
        }
    }

    fn enable_all(&mut self) {
        self.avif = true;
        self.webp = true;
        self.jpeg = true;
        self.png = true;
        self.gif = true;
    }
}

/// Choose the output format for a still image.
///
/// An explicit `requested` format (anything but `Auto`) is returned as-is.
/// Otherwise the best accepted format wins: AVIF > WebP > JPEG > PNG for
/// opaque sources, AVIF > WebP > PNG > JPEG when alpha must survive. With
/// no usable Accept header the answer is JPEG.
pub fn negotiate_format(
    accept: Option<&str>,
    source_has_alpha: bool,
    requested: OutputFormat,
) -> OutputFormat {
    if requested != OutputFormat::Auto {
        return requested;
    }

    let set = parse_accept(accept);

    let candidates: [OutputFormat; 4] = if source_has_alpha {
        [
            OutputFormat::Avif,
            OutputFormat::WebP,
            OutputFormat::Png,
            OutputFormat::Jpeg,
        ]
    } else {
        [
            OutputFormat::Avif,
            OutputFormat::WebP,
            OutputFormat::Jpeg,
            OutputFormat::Png,
        ]
    };

    for candidate in candidates {
        if set.accepts(candidate) {
            return candidate;
        }
    }

    OutputFormat::Jpeg
}

/// Choose the output format for an animated image, or `None` when no
/// animated output is possible and the caller must degrade to static.
///
/// An explicit request for an animation-capable format (WebP, GIF) wins;
/// an explicit request for anything else returns `None`. Otherwise WebP is
/// preferred over GIF from the accept set.
pub fn negotiate_animated_format(
    accept: Option<&str>,
    requested: OutputFormat,
) -> Option<OutputFormat> {
    if requested != OutputFormat::Auto {
        return requested.supports_animation().then_some(requested);
    }

    let set = parse_accept(accept);
    if set.webp {
        Some(OutputFormat::WebP)
    } else if set.gif {
        Some(OutputFormat::Gif)
    } else {
        None
    }
}

/// Parse an Accept header into the capability set.
///
/// Recognises `*/*`, `image/*` and the named image types; unknown media
/// types are ignored. A `q=0` parameter explicitly disables its media
/// range; malformed q-values default to 1.
fn parse_accept(accept: Option<&str>) -> AcceptSet {
    let mut set = AcceptSet::default();
    let header = match accept {
        Some(h) if !h.trim().is_empty() => h,
        _ => return set,
    };

    for part in header.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (media_type, q) = match part.split_once(';') {
            Some((mt, rest)) => (mt.trim(), parse_q(rest)),
            None => (part, 1.0),
        };
        let enabled = q > 0.0;

        match media_type.to_lowercase().as_str() {
            "*/*" | "image/*" => {
                if enabled {
                    set.enable_all();
                } else {
                    set = AcceptSet::default();
                }
            }
            "image/avif" => set.enable(OutputFormat::Avif, enabled),
            "image/webp" => set.enable(OutputFormat::WebP, enabled),
            "image/jpeg" | "image/jpg" => set.enable(OutputFormat::Jpeg, enabled),
            "image/png" => set.enable(OutputFormat::Png, enabled),
            "image/gif" => set.enable(OutputFormat::Gif, enabled),
            _ => {}
        }
    }

    set
}

/// Parse a q-value from media range parameters (e.g. `q=0.8`).
/// Parse failures default to 1.
fn parse_q(params: &str) -> f32 {
    for param in params.split(';') {
        let param = param.trim();
        if let Some(q) = param.strip_prefix("q=") {
            return q.trim().parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
        }
    }
    1.0
}
