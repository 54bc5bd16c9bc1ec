//! Vector primitives and composite panels
//!
//! Every shape is synthesized as an independent RGBA clip of its exact
//! bounding box: a solid color source whose alpha channel is carved by a
//! per-pixel `geq` expression over local coordinates, overlaid at its pixel
//! anchor. Borders are the outer mask minus a shifted inner mask.

pub mod circle;
pub mod ellipse;
pub mod line;
pub mod rectangle;
pub mod sign;
pub mod triangle;
pub mod weather;

use super::color::ff_color;

/// Wrap a 0/1 mask expression into a full clip statement.
///
/// The clip is `w`×`h`, filled with `color` (alpha applied via `@`), and its
/// alpha channel is 255 exactly where the mask holds.
pub(crate) fn masked_clip(
    label: &str,
    w: i64,
    h: i64,
    color: Option<&str>,
    alpha: f64,
    fps: u32,
    mask: &str,
) -> String {
    let col = ff_color(color, Some(alpha));
    format!(
        "color=c={col}:s={w}x{h}:r={fps},format=rgba,\
         geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='if({mask},255,0)'[{label}]"
    )
}

/// Re-express a mask written in inner-clip coordinates in the outer clip's
/// coordinate system, shifted by `offset` on both axes.
pub(crate) fn shift_into_outer(mask: &str, offset: i64) -> String {
    mask.replace('X', &format!("(X-{offset})"))
        .replace('Y', &format!("(Y-{offset})"))
}

/// Effective fill color: explicit fill, then the legacy `color` field, then
/// black.
pub(crate) fn fill_or_default<'a>(fill: Option<&'a str>, color: Option<&'a str>) -> &'a str {
    non_empty(fill).or_else(|| non_empty(color)).unwrap_or("#000000")
}

/// Outline color only when a usable (non-blank) value was given.
pub(crate) fn outline_color(outline: Option<&str>) -> Option<&str> {
    non_empty(outline)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_clip_shape() {
        let clip = masked_clip("m0", 40, 20, Some("#ff0000"), 0.5, 30, "gt(X,0)");
        assert_eq!(
            clip,
            "color=c=0xff0000@0.500:s=40x20:r=30,format=rgba,\
             geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='if(gt(X,0),255,0)'[m0]"
        );
    }

    #[test]
    fn test_shift_into_outer() {
        assert_eq!(shift_into_outer("lte(X+Y,4)", 3), "lte((X-3)+(Y-3),4)");
    }

    #[test]
    fn test_fill_fallback_chain() {
        assert_eq!(fill_or_default(Some("#111111"), Some("#222222")), "#111111");
        assert_eq!(fill_or_default(None, Some("#222222")), "#222222");
        assert_eq!(fill_or_default(Some("  "), None), "#000000");
    }

    #[test]
    fn test_outline_color_blank_is_none() {
        assert_eq!(outline_color(Some(" ")), None);
        assert_eq!(outline_color(Some("#333")), Some("#333"));
        assert_eq!(outline_color(None), None);
    }
}
