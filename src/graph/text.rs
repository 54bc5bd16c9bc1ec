//! Text and datetime overlays
//!
//! Each track becomes a single drawtext node with optional stroke and
//! background box. Datetime tracks substitute a per-frame clock expansion
//! for the literal text.

use super::color::{esc_text, ff_color, font_opt};
use super::{enable_window, GraphBuilder};
use crate::timeline::{DateTimeTrack, TextStyle, TextTrack};

const DEFAULT_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M";

pub(crate) fn emit_text(g: &mut GraphBuilder, track: &TextTrack) {
    let literal = esc_text(track.style.text.as_deref().unwrap_or(""));
    emit_drawtext(
        g,
        &track.style,
        &literal,
        track.x as i64,
        track.y as i64,
        track.timing.start,
        track.timing.end,
    );
}

pub(crate) fn emit_datetime(g: &mut GraphBuilder, track: &DateTimeTrack) {
    let has_literal = track
        .style
        .text
        .as_deref()
        .map(|t| !t.is_empty())
        .unwrap_or(false);

    let text = if track.is_live || !has_literal {
        clock_expansion(track, g.opts().datetime_use_utc)
    } else {
        esc_text(track.style.text.as_deref().unwrap_or(""))
    };

    emit_drawtext(
        g,
        &track.style,
        &text,
        track.x as i64,
        track.y as i64,
        track.timing.start,
        track.timing.end,
    );
}

/// drawtext `%{localtime:…}` / `%{gmtime:…}` expansion, colons escaped.
fn clock_expansion(track: &DateTimeTrack, server_default_utc: bool) -> String {
    let func = if track.use_utc || server_default_utc {
        "gmtime"
    } else {
        "localtime"
    };
    let format = track
        .ff_format
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_CLOCK_FORMAT)
        .replace(':', "\\:");
    format!("%{{{}\\:{}}}", func, format)
}

fn emit_drawtext(
    g: &mut GraphBuilder,
    style: &TextStyle,
    text: &str,
    x: i64,
    y: i64,
    start: f64,
    end: f64,
) {
    let n = g.vcount();
    let out = format!("[vtxt{n}]");
    let enable = enable_window(start, end);
    let font = font_opt(style.font_path.as_deref(), style.font_family.as_deref());
    let fontcolor = ff_color(style.color.as_deref().or(Some("white")), None);
    let fontsize = style.font_size;

    let mut stroke = String::new();
    if style.stroke_width > 0.0 {
        if let Some(stroke_color) = style.stroke_color.as_deref().filter(|c| !c.is_empty()) {
            stroke = format!(
                ":borderw={}:bordercolor={}",
                style.stroke_width,
                ff_color(Some(stroke_color), None)
            );
        }
    }

    let mut box_part = String::new();
    if let Some(bg) = style
        .bg_color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        box_part = format!(
            ":box=1:boxcolor={}:boxborderw={}",
            ff_color(Some(bg), None),
            style.padding
        );
    }

    g.add(format!(
        "{}drawtext={font}:text='{text}':x={x}:y={y}:fontsize={fontsize}\
         :fontcolor={fontcolor}{stroke}{box_part}:{enable}{out}",
        g.last()
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
        g.add("color=c=black:s=320x240:r=30[base]".to_string());
        g.set_last("[base]".to_string());
        g
    }

    fn style(text: &str) -> TextStyle {
        TextStyle {
            text: Some(text.to_string()),
            font_family: None,
            font_path: None,
            font_size: 48,
            color: Some("#ff0000".to_string()),
            stroke_color: None,
            stroke_width: 0.0,
            bg_color: None,
            padding: 6,
        }
    }

    fn text_track(text: &str) -> TextTrack {
        TextTrack {
            timing: TrackTiming {
                id: "t1".to_string(),
                start: 0.0,
                end: 1.0,
                z: 0,
            },
            style: style(text),
            x: 40.0,
            y: 100.0,
        }
    }

    #[test]
    fn test_basic_drawtext() {
        let mut g = builder();
        emit_text(&mut g, &text_track("hello"));
        let f = &g.filters_for_tests()[1];
        assert!(f.starts_with("[base]drawtext="));
        assert!(f.contains("text='hello'"));
        assert!(f.contains("x=40:y=100:fontsize=48"));
        assert!(f.contains("fontcolor=0xff0000"));
        assert!(f.contains("enable='between(t,0,1)'"));
        assert!(f.ends_with("[vtxt0]"));
        assert_eq!(g.last(), "[vtxt0]");
    }

    #[test]
    fn test_special_characters_escaped() {
        let mut g = builder();
        emit_text(&mut g, &text_track("it's 10:00"));
        let f = &g.filters_for_tests()[1];
        assert!(f.contains(r"text='it\'s 10\:00'"));
    }

    #[test]
    fn test_stroke_and_box() {
        let mut g = builder();
        let mut t = text_track("hi");
        t.style.stroke_color = Some("#000000".to_string());
        t.style.stroke_width = 2.0;
        t.style.bg_color = Some("#ffffff80".to_string());
        t.style.padding = 8;
        emit_text(&mut g, &t);
        let f = &g.filters_for_tests()[1];
        assert!(f.contains(":borderw=2:bordercolor=0x000000"));
        assert!(f.contains(":box=1:boxcolor=0xffffff@0.502:boxborderw=8"));
    }

    #[test]
    fn test_zero_stroke_width_omits_border() {
        let mut g = builder();
        let mut t = text_track("hi");
        t.style.stroke_color = Some("#000000".to_string());
        t.style.stroke_width = 0.0;
        emit_text(&mut g, &t);
        assert!(!g.filters_for_tests()[1].contains("borderw"));
    }

    fn datetime_track() -> DateTimeTrack {
        DateTimeTrack {
            timing: TrackTiming {
                id: "d1".to_string(),
                start: 0.0,
                end: 1.0,
                z: 0,
            },
            style: style(""),
            x: 0.0,
            y: 0.0,
            is_live: true,
            use_utc: false,
            ff_format: None,
        }
    }

    #[test]
    fn test_datetime_local_clock() {
        let mut g = builder();
        emit_datetime(&mut g, &datetime_track());
        let f = &g.filters_for_tests()[1];
        assert!(f.contains(r"text='%{localtime\:%Y-%m-%d %H\:%M}'"));
    }

    #[test]
    fn test_datetime_utc_flag() {
        let mut g = builder();
        let mut t = datetime_track();
        t.use_utc = true;
        emit_datetime(&mut g, &t);
        assert!(g.filters_for_tests()[1].contains(r"%{gmtime\:"));
    }

    #[test]
    fn test_datetime_server_default_utc() {
        let mut g = GraphBuilder::new_for_tests(
            30,
            GraphOptions {
                datetime_use_utc: true,
                ..Default::default()
            },
        );
        g.add("color=c=black:s=16x16:r=30[base]".to_string());
        g.set_last("[base]".to_string());
        emit_datetime(&mut g, &datetime_track());
        assert!(g.filters_for_tests()[1].contains(r"%{gmtime\:"));
    }

    #[test]
    fn test_datetime_custom_format() {
        let mut g = builder();
        let mut t = datetime_track();
        t.ff_format = Some("%H:%M:%S".to_string());
        emit_datetime(&mut g, &t);
        assert!(g.filters_for_tests()[1].contains(r"%{localtime\:%H\:%M\:%S}"));
    }

    #[test]
    fn test_datetime_literal_when_not_live() {
        let mut g = builder();
        let mut t = datetime_track();
        t.is_live = false;
        t.style.text = Some("2026-01-01".to_string());
        emit_datetime(&mut g, &t);
        assert!(g.filters_for_tests()[1].contains("text='2026-01-01'"));
    }
}
