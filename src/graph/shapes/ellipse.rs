//! Ellipse primitive

use super::{fill_or_default, masked_clip, outline_color, shift_into_outer};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::EllipseTrack;

/// 0/1 expression for an axis-aligned ellipse filling a w×h box.
///
/// Center `(a,b) = (w/2, h/2)`; the inside test is the multiplied-out form
/// `((X-a)²)·b² + ((Y-b)²)·a² ≤ a²·b²`, which keeps geq happy without
/// divisions.
fn ellipse_inside_expr(w: i64, h: i64) -> String {
    let a = w as f64 / 2.0;
    let b = h as f64 / 2.0;
    let a2 = a * a;
    let b2 = b * b;
    let rhs = a2 * b2;
    format!("lte(((X-{a})*(X-{a}))*{b2}+((Y-{b})*(Y-{b}))*{a2},{rhs})")
}

/// Filled ellipse (or ring, when `only_border`) clip.
pub(crate) fn ellipse_clip(
    label: &str,
    w: i64,
    h: i64,
    color: Option<&str>,
    alpha: f64,
    fps: u32,
    inner_offset: i64,
    only_border: bool,
) -> String {
    let inside_outer = ellipse_inside_expr(w, h);

    let inner_shifted = if inner_offset > 0 {
        let w_in = (w - 2 * inner_offset).max(1);
        let h_in = (h - 2 * inner_offset).max(1);
        shift_into_outer(&ellipse_inside_expr(w_in, h_in), inner_offset)
    } else {
        inside_outer.clone()
    };

    let mask = if only_border && inner_offset > 0 {
        format!("(({inside_outer})*(1-({inner_shifted})))")
    } else {
        format!("({inner_shifted})")
    };

    masked_clip(label, w, h, color, alpha, fps, &mask)
}

/// Emit the optional border ring (below) then the fill.
pub(crate) fn emit_ellipse(g: &mut GraphBuilder, t: &EllipseTrack) {
    let x = t.x.round() as i64;
    let y = t.y.round() as i64;
    let w = (t.width.round() as i64).max(1);
    let h = (t.height.round() as i64).max(1);
    let enable = enable_window(t.timing.start, t.timing.end);

    let stroke_w = (t.outline_width.round() as i64).max(0);
    let stroke = outline_color(t.outline.as_deref());
    let has_stroke = stroke_w > 0 && stroke.is_some();
    let fill = fill_or_default(t.fill.as_deref(), t.color.as_deref());

    if has_stroke {
        let n = g.vcount();
        let label = format!("ell_border_{n}");
        g.add(ellipse_clip(
            &label,
            w,
            h,
            stroke,
            t.opacity,
            g.fps(),
            stroke_w.max(1),
            true,
        ));
        let out = format!("[v{n}_ell_b]");
        g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
        g.set_last(out);
        g.bump();
    }

    let inner_off = if has_stroke { stroke_w.max(1) } else { 0 };
    let n = g.vcount();
    let label = format!("ell_fill_{n}");
    g.add(ellipse_clip(
        &label,
        w,
        h,
        Some(fill),
        t.opacity,
        g.fps(),
        inner_off,
        false,
    ));
    let out = format!("[v{n}_ell_f]");
    g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
    g.set_last(out);
    g.bump();
}
