//! Rounded rectangle primitive

use super::{fill_or_default, masked_clip, outline_color, shift_into_outer};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::RectangleTrack;

/// 0/1 expression for a rounded rectangle of size w×h with corner radius r.
///
/// Union of the horizontal band, the vertical band, and the four corner
/// disks; OR is encoded as a sum of 0/1 terms compared against zero.
pub(crate) fn rounded_rect_inside_expr(w: i64, h: i64, r: i64) -> String {
    let r = r.clamp(0, (w.min(h)) / 2);
    let in_x_mid = format!("(gte(X,{r})*lte(X,{}))", w - r);
    let in_y_mid = format!("(gte(Y,0)*lte(Y,{h}))");
    let in_y_mid2 = format!("(gte(Y,{r})*lte(Y,{}))", h - r);
    let in_x_full = format!("(gte(X,0)*lte(X,{w}))");

    let rr = r * r;
    let tl = format!("lte((X-{r})*(X-{r})+(Y-{r})*(Y-{r}),{rr})");
    let tr = format!(
        "lte((X-{wr})*(X-{wr})+(Y-{r})*(Y-{r}),{rr})",
        wr = w - r
    );
    let bl = format!(
        "lte((X-{r})*(X-{r})+(Y-{hr})*(Y-{hr}),{rr})",
        hr = h - r
    );
    let br = format!(
        "lte((X-{wr})*(X-{wr})+(Y-{hr})*(Y-{hr}),{rr})",
        wr = w - r,
        hr = h - r
    );

    let term1 = format!("({in_x_mid}*{in_y_mid})");
    let term2 = format!("({in_y_mid2}*{in_x_full})");
    let term_corners = format!("({tl}+{tr}+{bl}+{br})");
    format!("gt({term1}+{term2}+{term_corners},0)")
}

/// Filled rounded rectangle (or border frame, when `only_border`) clip.
pub(crate) fn rectangle_clip(
    label: &str,
    w: i64,
    h: i64,
    color: Option<&str>,
    alpha: f64,
    fps: u32,
    radius: i64,
    inner_offset: i64,
    only_border: bool,
) -> String {
    let radius = radius.max(0);
    let offset = inner_offset.max(0);
    let w_in = (w - 2 * offset).max(1);
    let h_in = (h - 2 * offset).max(1);
    let r_in = (radius - offset).clamp(0, (w_in.min(h_in)) / 2);

    let inside_outer = rounded_rect_inside_expr(w, h, radius);
    let inside_inner = rounded_rect_inside_expr(w_in, h_in, r_in);

    let mask = if only_border && offset > 0 {
        let inner_shifted = shift_into_outer(&inside_inner, offset);
        format!("(({inside_outer})*(1-({inner_shifted})))")
    } else if offset > 0 {
        format!("({})", shift_into_outer(&inside_inner, offset))
    } else {
        format!("({inside_outer})")
    };

    masked_clip(label, w, h, color, alpha, fps, &mask)
}

/// Emit the optional border frame (below) then the fill.
pub(crate) fn emit_rectangle(g: &mut GraphBuilder, t: &RectangleTrack) {
    let x = t.x.round() as i64;
    let y = t.y.round() as i64;
    let w = (t.width.round() as i64).max(1);
    let h = (t.height.round() as i64).max(1);
    let radius = (t.border_radius.round() as i64).max(0);
    let enable = enable_window(t.timing.start, t.timing.end);

    let stroke_w = (t.outline_width.round() as i64).max(0);
    let stroke = outline_color(t.outline.as_deref());
    let has_stroke = stroke_w > 0 && stroke.is_some();
    let fill = fill_or_default(t.fill.as_deref(), t.color.as_deref());

    if has_stroke {
        let n = g.vcount();
        let label = format!("rect_border_{n}");
        g.add(rectangle_clip(
            &label,
            w,
            h,
            stroke,
            t.opacity,
            g.fps(),
            radius,
            stroke_w.max(1),
            true,
        ));
        let out = format!("[v{n}_rect_b]");
        g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
        g.set_last(out);
        g.bump();
    }

    let inner_off = if has_stroke { stroke_w.max(1) } else { 0 };
    let n = g.vcount();
    let label = format!("rect_fill_{n}");
    g.add(rectangle_clip(
        &label,
        w,
        h,
        Some(fill),
        t.opacity,
        g.fps(),
        radius,
        inner_off,
        false,
    ));
    let out = format!("[v{n}_rect_f]");
    g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
    g.set_last(out);
    g.bump();
}
