//! Color and font normalization for filter graph nodes
//!
//! Colors arrive CSS-flavored (`#rgb`, `#rrggbbaa`, `rgb(…)`, named) and
//! leave as FFmpeg tokens: `0xRRGGBB`, `0xRRGGBB@A.AAA`, or the name with an
//! optional `@A.AAA` suffix. Fonts resolve to a `fontfile='…'` option when a
//! usable file is found, else a `font='family'` hint.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn rgb_func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)",
        )
        .expect("rgb() regex is valid")
    })
}

/// Escape a literal for use inside a drawtext `text='…'` option.
pub fn esc_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Escape a filesystem path for use inside a quoted filter option.
pub fn esc_path(s: &str) -> String {
    s.replace(':', "\\:").replace('\'', "\\'")
}

/// Parse `#rgb` / `#rgba` / `#rrggbb` / `#rrggbbaa` (also accepting an `0x`
/// prefix and an `@alpha` suffix so canonical output re-parses).
fn parse_hex_color(input: &str) -> Option<(String, Option<f64>)> {
    let s = input.trim();
    let (body, suffix_alpha) = match s.split_once('@') {
        Some((body, alpha)) => (body, alpha.parse::<f64>().ok()),
        None => (s, None),
    };
    let hex = body
        .strip_prefix('#')
        .or_else(|| body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")))?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = if hex.len() == 3 || hex.len() == 4 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex.to_string()
    };
    let (rgb, alpha) = match expanded.len() {
        6 => (expanded, None),
        8 => {
            let alpha = u8::from_str_radix(&expanded[6..8], 16)
                .ok()
                .map(|v| v as f64 / 255.0);
            (expanded[..6].to_string(), alpha)
        }
        _ => return None,
    };
    Some((format!("0x{}", rgb), suffix_alpha.or(alpha)))
}

/// Parse `rgb(r,g,b)` / `rgba(r,g,b,a)` with channels clamped to 0..=255.
fn parse_rgb_func(input: &str) -> Option<(String, Option<f64>)> {
    let caps = rgb_func_re().captures(input.trim())?;
    let channel = |i: usize| -> u8 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map(|v| v.min(255) as u8)
            .unwrap_or(0)
    };
    let (r, g, b) = (channel(1), channel(2), channel(3));
    let alpha = caps.get(4).and_then(|m| m.as_str().parse::<f64>().ok());
    Some((format!("0x{:02X}{:02X}{:02X}", r, g, b), alpha))
}

/// Parse any supported color syntax into `(0xRRGGBB, alpha)`.
///
/// Returns `None` for named colors, which pass through untouched.
pub fn parse_color(input: &str) -> Option<(String, Option<f64>)> {
    parse_hex_color(input).or_else(|| parse_rgb_func(input))
}

/// Normalize a CSS-like color to an FFmpeg-friendly token.
///
/// An explicit `alpha_override` (clamped to 0..1) replaces any alpha parsed
/// from the color itself. Empty/missing input falls back to `white`.
pub fn ff_color(color: Option<&str>, alpha_override: Option<f64>) -> String {
    let c = match color.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => "white",
    };

    if let Some((rgb, parsed_alpha)) = parse_color(c) {
        let alpha = alpha_override.map(|a| a.clamp(0.0, 1.0)).or(parsed_alpha);
        return match alpha {
            Some(a) => format!("{}@{:.3}", rgb, a),
            None => rgb,
        };
    }

    match alpha_override {
        Some(a) => format!("{}@{:.3}", c, a.clamp(0.0, 1.0)),
        None => c.to_string(),
    }
}

#[cfg(windows)]
const SYSTEM_FONT: &str = r"C:\Windows\Fonts\arial.ttf";
#[cfg(not(windows))]
const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Build the drawtext font option for a track.
///
/// Probes, in order: the explicit `fontPath` when it exists on disk, the
/// platform's conventional sans file, and finally the family name as a hint
/// for fontconfig.
pub fn font_opt(font_path: Option<&str>, font_family: Option<&str>) -> String {
    if let Some(path) = font_path {
        if !path.is_empty() && Path::new(path).is_file() {
            return format!("fontfile='{}'", esc_path(path));
        }
    }
    if Path::new(SYSTEM_FONT).is_file() {
        return format!("fontfile='{}'", esc_path(SYSTEM_FONT));
    }
    let family = match font_family {
        Some(f) if !f.is_empty() => f,
        _ => "Arial",
    };
    format!("font='{}'", family)
}
