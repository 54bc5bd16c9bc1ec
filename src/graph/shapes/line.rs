//! Line primitive
//!
//! A line is a solid bar rotated about its start anchor: the L×T bar is
//! padded into a 2L×2L transparent canvas so the bar's left-midpoint sits at
//! the canvas center, rotated there, then overlaid so the center lands on
//! the anchor.

use std::f64::consts::PI;

use crate::graph::color::ff_color;
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::LineTrack;

pub(crate) fn emit_line(g: &mut GraphBuilder, t: &LineTrack) {
    let x = t.x.round() as i64;
    let y = t.y.round() as i64;
    let length = (t.length.round() as i64).max(1);
    let thickness = (t.thickness.round() as i64).max(1);
    let radians = t.rotation * PI / 180.0;
    let enable = enable_window(t.timing.start, t.timing.end);
    let colspec = ff_color(Some(&t.color), Some(t.opacity));
    let fps = g.fps();
    let n = g.vcount();

    // Solid RGBA bar of size L x T.
    let body = format!("line_body_{n}");
    g.add(format!(
        "color=c={colspec}:s={length}x{thickness}:r={fps},format=rgba[{body}]"
    ));

    // Pad so the bar's left-middle sits at the 2L x 2L canvas center.
    let padded = format!("line_pad_{n}");
    let pad_x = length;
    let pad_y = length - thickness / 2;
    g.add(format!(
        "[{body}]pad=width={}:height={}:x={pad_x}:y={pad_y}:color=black@0[{padded}]",
        2 * length,
        2 * length
    ));

    // Rotate around the canvas center, which is the start anchor.
    let rotated = format!("line_rot_{n}");
    g.add(format!(
        "[{padded}]rotate={radians}:ow=rotw(iw):oh=roth(ih):c=black@0[{rotated}]"
    ));

    // Overlay so the canvas center lands at (x, y).
    let out = format!("[v{n}_line]");
    g.add(format!(
        "{}[{rotated}]overlay={}:{}:{enable}{out}",
        g.last(),
        x - length,
        y - length
    ));
    g.set_last(out);
    g.bump();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;
    use crate::timeline::TrackTiming;

    fn builder() -> GraphBuilder {
        let mut g = GraphBuilder::new_for_tests(30, GraphOptions::default());
        g.add("color=c=black:s=400x400:r=30[base]".to_string());
        g.set_last("[base]".to_string());
        g
    }

    fn line() -> LineTrack {
        LineTrack {
            timing: TrackTiming {
                id: "l1".to_string(),
                start: 0.0,
                end: 1.0,
                z: 0,
            },
            x: 200.0,
            y: 200.0,
            length: 100.0,
            thickness: 4.0,
            rotation: 45.0,
            color: "#000".to_string(),
            opacity: 1.0,
        }
    }

    #[test]
    fn test_bar_pad_rotate_overlay() {
        let mut g = builder();
        emit_line(&mut g, &line());
        let filters = g.filters_for_tests();
        assert_eq!(
            filters[1],
            "color=c=0x000000@1.000:s=100x4:r=30,format=rgba[line_body_0]"
        );
        // 2L = 200 canvas; bar's top-left at (L, L - T/2) = (100, 98)
        assert_eq!(
            filters[2],
            "[line_body_0]pad=width=200:height=200:x=100:y=98:color=black@0[line_pad_0]"
        );
        assert_eq!(
            filters[3],
            format!(
                "[line_pad_0]rotate={}:ow=rotw(iw):oh=roth(ih):c=black@0[line_rot_0]",
                45.0_f64 * PI / 180.0
            )
        );
        // start anchor (200,200) lands on the canvas center: top-left (100,100)
        assert_eq!(
            filters[4],
            "[base][line_rot_0]overlay=100:100:enable='between(t,0,1)'[v0_line]"
        );
        assert_eq!(g.last(), "[v0_line]");
    }

    #[test]
    fn test_zero_rotation() {
        let mut g = builder();
        let mut l = line();
        l.rotation = 0.0;
        emit_line(&mut g, &l);
        assert!(g.filters_for_tests()[3].contains("rotate=0:"));
    }

    #[test]
    fn test_opacity_in_bar_color() {
        let mut g = builder();
        let mut l = line();
        l.opacity = 0.5;
        emit_line(&mut g, &l);
        assert!(g.filters_for_tests()[1].contains("@0.500"));
    }
}
