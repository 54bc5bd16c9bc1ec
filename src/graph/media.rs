//! Media overlay and audio tap emission
//!
//! Video and image inputs are scaled to their placement size, optionally
//! trimmed in source time, and overlaid with the track's enable window.
//! Audio chains are only attached for inputs the probe confirmed carry an
//! audio stream, so the graph never references a missing `[idx:a]` pad.

use super::{enable_window, GraphBuilder};
use crate::timeline::Track;

/// Emit the video overlay and/or audio tap for one media track.
pub(crate) fn emit_media(g: &mut GraphBuilder, track: &Track, input_idx: usize, has_audio: bool) {
    match track {
        Track::Video(t) => {
            let trim = source_trim(t.src_in, t.src_out);
            emit_visual(
                g,
                input_idx,
                t.place.w as i64,
                t.place.h as i64,
                t.place.x as i64,
                t.place.y as i64,
                t.timing.start,
                t.timing.end,
                &trim,
            );
            if has_audio {
                emit_audio_tap(
                    g,
                    input_idx,
                    t.timing.start,
                    t.volume,
                    t.muted,
                    t.src_in,
                    t.src_out,
                );
            }
        }
        Track::Image(t) => {
            emit_visual(
                g,
                input_idx,
                t.place.w as i64,
                t.place.h as i64,
                t.place.x as i64,
                t.place.y as i64,
                t.timing.start,
                t.timing.end,
                "setpts=PTS-STARTPTS",
            );
        }
        Track::Audio(t) => {
            if has_audio {
                emit_audio_tap(
                    g,
                    input_idx,
                    t.timing.start,
                    t.volume,
                    t.muted,
                    t.src_in,
                    t.src_out,
                );
            }
        }
        _ => {}
    }
}

/// Video-side trim with a timebase reset; ignores windows that do not move
/// forward (the validator rejects those anyway on typed input).
fn source_trim(src_in: Option<f64>, src_out: Option<f64>) -> String {
    if src_in.is_some() || src_out.is_some() {
        let si = src_in.unwrap_or(0.0);
        if let Some(so) = src_out {
            if so > si {
                return format!("trim=start={}:end={},setpts=PTS-STARTPTS", si, so);
            }
        }
    }
    "setpts=PTS-STARTPTS".to_string()
}

#[allow(clippy::too_many_arguments)]
fn emit_visual(
    g: &mut GraphBuilder,
    input_idx: usize,
    w: i64,
    h: i64,
    x: i64,
    y: i64,
    start: f64,
    end: f64,
    trim: &str,
) {
    let n = g.vcount();
    let scaled = format!("[v{n}s]");
    let out = format!("[v{n}o]");
    g.add(format!(
        "[{input_idx}:v]scale={w}:{h},format=rgba,{trim}{scaled}"
    ));
    let enable = enable_window(start, end);
    g.add(format!(
        "{}{scaled}overlay={x}:{y}:{enable}{out}",
        g.last()
    ));
    g.set_last(out);
    g.bump();
}

fn emit_audio_tap(
    g: &mut GraphBuilder,
    input_idx: usize,
    start: f64,
    volume: f64,
    muted: bool,
    src_in: Option<f64>,
    src_out: Option<f64>,
) {
    let gain = if muted { 0.0 } else { volume.clamp(0.0, 1.0) };

    let atrim = if src_in.is_some() || src_out.is_some() {
        let si = src_in.unwrap_or(0.0);
        match src_out {
            Some(so) if so > si => {
                format!("atrim=start={}:end={},asetpts=PTS-STARTPTS", si, so)
            }
            _ => "asetpts=PTS-STARTPTS".to_string(),
        }
    } else {
        "asetpts=PTS-STARTPTS".to_string()
    };

    // Align audio onset with the track's timeline start.
    let delay_ms = ((start * 1000.0).round() as i64).max(0);

    let out = format!("[a{input_idx}]");
    let mut chain = format!("[{input_idx}:a]{atrim},adelay={delay_ms}:all=1");
    if gain != 1.0 {
        chain.push_str(&format!(",volume={:.3}", gain));
    }
    chain.push_str(&out);
    g.add(chain);
    g.add_audio_tap(out);
}
