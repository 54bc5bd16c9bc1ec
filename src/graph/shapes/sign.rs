//! Sign composite panel
//!
//! The panel is composed off-screen on a transparent canvas of its own size,
//! piece by piece (rounded background, border, icon circle, arrow triangle,
//! centered symbol/text stack), then faded by the panel opacity, rotated
//! about its center, and overlaid so the center lands at the track's
//! geometric center.

use std::f64::consts::PI;

use super::circle::circle_clip;
use super::rectangle::rectangle_clip;
use super::triangle::triangle_clip;
use crate::graph::color::{esc_text, ff_color, font_opt};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::{SignTrack, TriangleDirection};

const BORDER_WIDTH: i64 = 2;

/// Map a symbol type to its glyph; an explicit custom symbol wins.
fn symbol_char<'a>(symbol_type: Option<&str>, custom: Option<&'a str>) -> &'a str {
    if let Some(c) = custom.filter(|c| !c.is_empty()) {
        return c;
    }
    match symbol_type.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("registered") => "®",
        Some("trademark") => "™",
        Some("service") => "℠",
        Some("paragraph") => "§",
        Some("sound") => "℗",
        Some("info") => "ℹ",
        _ => "©",
    }
}

pub(crate) fn emit_sign(g: &mut GraphBuilder, t: &SignTrack) {
    let x = t.x.round() as i64;
    let y = t.y.round() as i64;
    let w = (t.width.round() as i64).max(1);
    let h = (t.height.round() as i64).max(1);
    let rot_rad = t.rotation * PI / 180.0;
    let enable = enable_window(t.timing.start, t.timing.end);
    let opacity = t.opacity.clamp(0.0, 1.0);
    let fps = g.fps();
    let hf = h as f64;

    let sc = &t.show_components;
    let cols = &t.colors;
    let col_text = cols.text.as_deref().unwrap_or("#000000");
    let col_border = cols.border.as_deref().unwrap_or("#000000");
    let col_icon = cols.icon.as_deref().unwrap_or(col_text);
    let col_arrow = cols.arrow.as_deref().unwrap_or(col_text);
    let col_symbol = cols.symbol.as_deref().unwrap_or(col_text);

    let fs_text = t
        .font_sizes
        .text
        .map(|v| v as f64)
        .unwrap_or((hf * 0.35).min(48.0))
        .round()
        .max(1.0) as i64;
    let fs_symbol = t
        .font_sizes
        .symbol
        .map(|v| v as f64)
        .unwrap_or((hf * 0.40).min(56.0))
        .round()
        .max(1.0) as i64;
    let icon_size = t
        .icon_size
        .map(|v| v as f64)
        .unwrap_or((hf * 0.40).min(36.0))
        .round()
        .max(1.0) as i64;

    let margin = ((hf * 0.08).round() as i64).max(4);
    let bg_radius = (hf * 0.12).round() as i64;
    let font = font_opt(t.font_path.as_deref(), t.font_family.as_deref());

    // Transparent canvas of the panel's own size.
    let n = g.vcount();
    let base = format!("sign_base_{n}");
    g.add(format!("color=c=black@0:s={w}x{h}:r={fps},format=rgba[{base}]"));
    let mut vo = format!("[v{n}_sign_0]");
    g.add(format!("[{base}]copy{vo}"));
    g.bump();

    // Rounded background.
    if sc.background {
        if let Some(col_bg) = cols.background.as_deref().filter(|c| !c.is_empty()) {
            let n = g.vcount();
            let label = format!("sign_bg_{n}");
            g.add(rectangle_clip(&label, w, h, Some(col_bg), 1.0, fps, bg_radius, 0, false));
            let out = format!("[v{n}_sign_bg]");
            g.add(format!("{vo}[{label}]overlay=0:0{out}"));
            vo = out;
            g.bump();
        }
    }

    // Rounded border frame.
    if sc.border {
        let n = g.vcount();
        let label = format!("sign_bor_{n}");
        g.add(rectangle_clip(
            &label,
            w,
            h,
            Some(col_border),
            1.0,
            fps,
            bg_radius,
            BORDER_WIDTH.max(1),
            true,
        ));
        let out = format!("[v{n}_sign_bor]");
        g.add(format!("{vo}[{label}]overlay=0:0{out}"));
        vo = out;
        g.bump();
    }

    // Icon: filled circle at the left, vertically centered.
    if sc.icon {
        let r = (icon_size / 2).max(1);
        let d = r * 2;
        let n = g.vcount();
        let label = format!("sign_icon_{n}");
        g.add(circle_clip(&label, d, r, Some(col_icon), 1.0, fps));
        let cx = margin + r;
        let cy = h / 2;
        let out = format!("[v{n}_sign_icon]");
        g.add(format!("{vo}[{label}]overlay={}:{}{out}", cx - r, cy - r));
        vo = out;
        g.bump();
    }

    // Arrow: right-pointing triangle at the right, vertically centered.
    if sc.arrow {
        let tw = ((hf * 0.35).round() as i64).max(6);
        let th = ((hf * 0.35).round() as i64).max(6);
        let n = g.vcount();
        let label = format!("sign_arrow_{n}");
        g.add(triangle_clip(
            &label,
            tw,
            th,
            Some(col_arrow),
            1.0,
            TriangleDirection::Right,
            fps,
            0,
            false,
        ));
        let ax = w - margin - tw;
        let ay = (h - th) / 2;
        let out = format!("[v{n}_sign_arrow]");
        g.add(format!("{vo}[{label}]overlay={ax}:{ay}{out}"));
        vo = out;
        g.bump();
    }

    // Symbol and text: centered stack (two lines) or single centered line.
    if sc.symbol || sc.text {
        let gap = (hf * 0.05).round() as i64;
        if sc.symbol && sc.text {
            let sym = esc_text(symbol_char(t.symbol_type.as_deref(), t.custom_symbol.as_deref()));
            let n = g.vcount();
            let out = format!("[v{n}_sign_sym]");
            g.add(format!(
                "{vo}drawtext={font}:text='{sym}':fontsize={fs_symbol}:fontcolor={}:\
                 x=(w-text_w)/2:y=(h/2 - {gap})-text_h{out}",
                ff_color(Some(col_symbol), None)
            ));
            vo = out;
            g.bump();

            let text = esc_text(t.text.as_deref().unwrap_or(""));
            let n = g.vcount();
            let out = format!("[v{n}_sign_txt]");
            g.add(format!(
                "{vo}drawtext={font}:text='{text}':fontsize={fs_text}:fontcolor={}:\
                 x=(w-text_w)/2:y=(h/2 + {gap}){out}",
                ff_color(Some(col_text), None)
            ));
            vo = out;
            g.bump();
        } else if sc.symbol {
            let sym = esc_text(symbol_char(t.symbol_type.as_deref(), t.custom_symbol.as_deref()));
            let n = g.vcount();
            let out = format!("[v{n}_sign_sym2]");
            g.add(format!(
                "{vo}drawtext={font}:text='{sym}':fontsize={fs_symbol}:fontcolor={}:\
                 x=(w-text_w)/2:y=(h-text_h)/2{out}",
                ff_color(Some(col_symbol), None)
            ));
            vo = out;
            g.bump();
        } else {
            let text = esc_text(t.text.as_deref().unwrap_or(""));
            let n = g.vcount();
            let out = format!("[v{n}_sign_txt2]");
            g.add(format!(
                "{vo}drawtext={font}:text='{text}':fontsize={fs_text}:fontcolor={}:\
                 x=(w-text_w)/2:y=(h-text_h)/2{out}",
                ff_color(Some(col_text), None)
            ));
            vo = out;
            g.bump();
        }
    }

    // Panel-wide opacity.
    let n = g.vcount();
    let alpha_out = format!("[v{n}_sign_alpha]");
    g.add(format!(
        "{vo}format=rgba,colorchannelmixer=aa={opacity:.3}{alpha_out}"
    ));
    vo = alpha_out;
    g.bump();

    // Rotate around the panel center.
    let n = g.vcount();
    let rot_out = format!("[v{n}_sign_rot]");
    g.add(format!(
        "{vo}rotate={rot_rad}:ow=rotw(iw):oh=roth(ih):c=black@0{rot_out}"
    ));
    g.bump();

    // Land the rotated panel's center at (x + w/2, y + h/2). The overlay's
    // own w/h variables refer to the overlaid clip, whose size grew with the
    // rotation.
    let cx = x as f64 + w as f64 / 2.0;
    let cy = y as f64 + h as f64 / 2.0;
    let n = g.vcount();
    let out = format!("[v{n}_sign_out]");
    g.add(format!(
        "{}{rot_out}overlay={cx}-w/2:{cy}-h/2:{enable}{out}",
        g.last()
    ));
    g.set_last(out);
    g.bump();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;
    use crate::timeline::{SignColors, SignComponents, SignFontSizes, TrackTiming};

    fn builder() -> GraphBuilder {
        let mut g = GraphBuilder::new_for_tests(30, GraphOptions::default());
        g.add("color=c=black:s=640x360:r=30[base]".to_string());
        g.set_last("[base]".to_string());
        g
    }

    fn sign() -> SignTrack {
        SignTrack {
            timing: TrackTiming {
                id: "s1".to_string(),
                start: 0.0,
                end: 2.0,
                z: 0,
            },
            x: 50.0,
            y: 60.0,
            width: 200.0,
            height: 100.0,
            rotation: 0.0,
            opacity: 1.0,
            text: Some("STOP".to_string()),
            symbol_type: None,
            custom_symbol: None,
            show_components: SignComponents::default(),
            colors: SignColors::default(),
            font_sizes: SignFontSizes::default(),
            icon_size: None,
            font_family: None,
            font_path: None,
            image: None,
        }
    }

    #[test]
    fn test_symbol_char_map() {
        assert_eq!(symbol_char(Some("copyright"), None), "©");
        assert_eq!(symbol_char(Some("Registered "), None), "®");
        assert_eq!(symbol_char(Some("unknown"), None), "©");
        assert_eq!(symbol_char(None, Some("☂")), "☂");
    }

    #[test]
    fn test_minimal_sign_is_canvas_opacity_rotate_overlay() {
        let mut g = builder();
        emit_sign(&mut g, &sign());
        let filters = g.filters_for_tests();
        assert!(filters[1].starts_with("color=c=black@0:s=200x100:r=30,format=rgba[sign_base_0]"));
        assert_eq!(filters[2], "[sign_base_0]copy[v0_sign_0]");
        assert!(filters[3].contains("colorchannelmixer=aa=1.000"));
        assert!(filters[4].contains("rotate=0:"));
        // center (150, 110) minus half the rotated clip size
        assert!(filters[5].contains("overlay=150-w/2:110-h/2:enable='between(t,0,2)'"));
        assert_eq!(g.last(), "[v3_sign_out]");
    }

    #[test]
    fn test_background_and_border_pieces() {
        let mut g = builder();
        let mut s = sign();
        s.show_components.background = true;
        s.show_components.border = true;
        s.colors.background = Some("#ffcc00".to_string());
        s.colors.border = Some("#000000".to_string());
        emit_sign(&mut g, &s);
        let joined = g.filters_for_tests().join(";");
        assert!(joined.contains("[sign_bg_1]"));
        assert!(joined.contains("0xffcc00"));
        assert!(joined.contains("[sign_bor_2]"));
        // border frame keeps the background radius (h*0.12 = 12)
        assert!(joined.contains("(gte(X,12)"));
    }

    #[test]
    fn test_icon_and_arrow_positions() {
        let mut g = builder();
        let mut s = sign();
        s.show_components.icon = true;
        s.show_components.arrow = true;
        s.icon_size = Some(40);
        emit_sign(&mut g, &s);
        let joined = g.filters_for_tests().join(";");
        // margin = 8, r = 20: icon overlay at (8, 30)
        assert!(joined.contains("[sign_icon_1]overlay=8:30"));
        // arrow 35x35 at (200-8-35, (100-35)/2)
        assert!(joined.contains("[sign_arrow_2]overlay=157:32"));
    }

    #[test]
    fn test_two_line_stack_when_symbol_and_text() {
        let mut g = builder();
        let mut s = sign();
        s.show_components.symbol = true;
        s.show_components.text = true;
        s.symbol_type = Some("trademark".to_string());
        emit_sign(&mut g, &s);
        let joined = g.filters_for_tests().join(";");
        assert!(joined.contains("text='™'"));
        assert!(joined.contains("y=(h/2 - 5)-text_h"));
        assert!(joined.contains("text='STOP'"));
        assert!(joined.contains("y=(h/2 + 5)"));
    }

    #[test]
    fn test_single_text_centered() {
        let mut g = builder();
        let mut s = sign();
        s.show_components.text = true;
        emit_sign(&mut g, &s);
        let joined = g.filters_for_tests().join(";");
        assert!(joined.contains("x=(w-text_w)/2:y=(h-text_h)/2"));
    }

    #[test]
    fn test_opacity_applied_before_rotation() {
        let mut g = builder();
        let mut s = sign();
        s.opacity = 0.4;
        s.rotation = 90.0;
        emit_sign(&mut g, &s);
        let filters = g.filters_for_tests();
        let alpha_pos = filters.iter().position(|f| f.contains("aa=0.400")).unwrap();
        let rot_pos = filters.iter().position(|f| f.contains("rotate=")).unwrap();
        assert!(alpha_pos < rot_pos);
    }
}
