//! Triangle primitive

use super::{fill_or_default, masked_clip, outline_color};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::{TriangleDirection, TriangleTrack};

type Vertex = (i64, i64);

/// Outer vertices for a triangle filling a w×h box, pointing `direction`.
fn vertices(w: i64, h: i64, direction: TriangleDirection) -> (Vertex, Vertex, Vertex) {
    match direction {
        TriangleDirection::Down => ((0, 0), (w, 0), (w / 2, h)),
        TriangleDirection::Left => ((0, h / 2), (w, 0), (w, h)),
        TriangleDirection::Right => ((0, 0), (w, h / 2), (0, h)),
        TriangleDirection::Up => ((w / 2, 0), (0, h), (w, h)),
    }
}

/// Vertices inset by `off` pixels, used for the border's inner cutout.
fn inset_vertices(
    w: i64,
    h: i64,
    direction: TriangleDirection,
    off: i64,
) -> (Vertex, Vertex, Vertex) {
    match direction {
        TriangleDirection::Up => ((w / 2, off), (off, h - off), (w - off, h - off)),
        TriangleDirection::Down => ((off, off), (w - off, off), (w / 2, h - off)),
        TriangleDirection::Left => ((off, h / 2), (w - off, off), (w - off, h - off)),
        TriangleDirection::Right => ((off, off), (w - off, h / 2), (off, h - off)),
    }
}

/// Same-sign barycentric inside test: the point is inside when the three
/// edge cross-products share a sign (either all ≥ 0 or all ≤ 0).
fn inside_tri_expr(v0: Vertex, v1: Vertex, v2: Vertex) -> String {
    let (v0x, v0y) = v0;
    let (v1x, v1y) = v1;
    let (v2x, v2y) = v2;

    let s1 = format!("((X-{v2x})*({v1y}-{v2y})-(Y-{v2y})*({v1x}-{v2x}))");
    let s2 = format!("((X-{v0x})*({v2y}-{v0y})-(Y-{v0y})*({v2x}-{v0x}))");
    let s3 = format!("((X-{v1x})*({v0y}-{v1y})-(Y-{v1y})*({v0x}-{v1x}))");

    let pos = format!("(gte({s1},0)*gte({s2},0)*gte({s3},0))");
    let neg = format!("(lte({s1},0)*lte({s2},0)*lte({s3},0))");
    format!("gt({pos}+{neg},0)")
}

/// Filled triangle (or border, when `only_border`) clip.
#[allow(clippy::too_many_arguments)]
pub(crate) fn triangle_clip(
    label: &str,
    w: i64,
    h: i64,
    color: Option<&str>,
    alpha: f64,
    direction: TriangleDirection,
    fps: u32,
    inner_offset: i64,
    only_border: bool,
) -> String {
    let (v0, v1, v2) = vertices(w, h, direction);
    let (vi0, vi1, vi2) = if inner_offset > 0 {
        inset_vertices(w, h, direction, inner_offset)
    } else {
        (v0, v1, v2)
    };

    let inside_outer = inside_tri_expr(v0, v1, v2);
    let inside_inner = inside_tri_expr(vi0, vi1, vi2);

    let mask = if only_border && inner_offset > 0 {
        format!("(({inside_outer})*(1-({inside_inner})))")
    } else {
        format!("({inside_inner})")
    };

    masked_clip(label, w, h, color, alpha, fps, &mask)
}

/// Emit the optional border (below) then the fill triangle.
pub(crate) fn emit_triangle(g: &mut GraphBuilder, t: &TriangleTrack) {
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
        let label = format!("tri_border_{n}");
        g.add(triangle_clip(
            &label,
            w,
            h,
            stroke,
            t.opacity,
            t.direction,
            g.fps(),
            stroke_w.max(1),
            true,
        ));
        let out = format!("[v{n}_tri_b]");
        g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
        g.set_last(out);
        g.bump();
    }

    let inner_off = if has_stroke { stroke_w.max(1) } else { 0 };
    let n = g.vcount();
    let label = format!("tri_fill_{n}");
    g.add(triangle_clip(
        &label,
        w,
        h,
        Some(fill),
        t.opacity,
        t.direction,
        g.fps(),
        inner_off,
        false,
    ));
    let out = format!("[v{n}_tri_f]");
    g.add(format!("{}[{label}]overlay={x}:{y}:{enable}{out}", g.last()));
    g.set_last(out);
    g.bump();
}
