//! Circle primitive

use super::{fill_or_default, masked_clip, outline_color};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::CircleTrack;

/// Clip of diameter `d` whose alpha is 255 inside the radius-`r` disk.
pub(crate) fn circle_clip(
    label: &str,
    d: i64,
    r: i64,
    color: Option<&str>,
    alpha: f64,
    fps: u32,
) -> String {
    let mask = format!("lte((X-{r})*(X-{r})+(Y-{r})*(Y-{r}),{})", r * r);
    masked_clip(label, d, d, color, alpha, fps, &mask)
}

/// Emit an optional stroke ring (as a larger disk below) and the fill disk.
pub(crate) fn emit_circle(g: &mut GraphBuilder, t: &CircleTrack) {
    let cx = t.x.round() as i64;
    let cy = t.y.round() as i64;
    let r = (t.radius.round() as i64).max(1);
    let d = r * 2;
    let enable = enable_window(t.timing.start, t.timing.end);

    let stroke_w = (t.outline_width.round() as i64).max(0);
    let stroke = outline_color(t.outline.as_deref());
    let has_stroke = stroke_w > 0 && stroke.is_some();

    if has_stroke {
        let n = g.vcount();
        let label = format!("circ_stroke_{n}");
        g.add(circle_clip(&label, d, r, stroke, t.opacity, g.fps()));
        let out = format!("[v{n}_circ_s]");
        g.add(format!(
            "{}[{label}]overlay={}:{}:{enable}{out}",
            g.last(),
            cx - r,
            cy - r
        ));
        g.set_last(out);
        g.bump();
    }

    let fill = fill_or_default(t.fill.as_deref(), None);
    let r_fill = if has_stroke { (r - stroke_w).max(0) } else { r };
    let d_fill = r_fill * 2;
    let n = g.vcount();
    let label = format!("circ_fill_{n}");
    g.add(circle_clip(&label, d_fill, r_fill, Some(fill), t.opacity, g.fps()));
    let out = format!("[v{n}_circ_f]");
    g.add(format!(
        "{}[{label}]overlay={}:{}:{enable}{out}",
        g.last(),
        cx - r_fill,
        cy - r_fill
    ));
    g.set_last(out);
    g.bump();
}
