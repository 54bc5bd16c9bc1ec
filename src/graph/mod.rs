//! Filter graph translation
//!
//! Turns a validated timeline into the deterministic `-filter_complex`
//! program handed to FFmpeg, plus the ordered input list the program's
//! stream indices refer to. Assembly is a pure function of its arguments:
//! the same timeline always yields byte-identical graph text.
//!
//! Phases, in order: base color → background image → media (video/image
//! overlays + audio taps) → text/datetime → circle → triangle → rectangle →
//! line → ellipse → sign → weather. Within each phase tracks are taken in
//! `z` order (stable tie-break on submission order).

pub mod audio;
pub mod background;
pub mod color;
pub mod media;
pub mod shapes;
pub mod text;

use std::collections::HashMap;

use crate::error::{RenderError, Result};
use crate::timeline::{Timeline, Track};

/// One engine input: per-input flags (e.g. `-loop 1 -t 2`) and the source.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInput {
    pub flags: Vec<String>,
    pub src: String,
}

/// The assembled program: filter text plus everything the dispatcher needs
/// to put a command line around it.
#[derive(Debug, Clone)]
pub struct GraphProgram {
    pub filter_complex: String,
    /// Final video label, brackets included (e.g. `[v3o]` or `[base]`).
    pub video_out: String,
    pub inputs: Vec<EngineInput>,
    /// One labeled tap per audible track, in emission order.
    pub audio_taps: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Duration used for looped inputs and `-t`, clamped to one frame.
    pub duration: f64,
}

/// Assembly options that come from the server, not the timeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOptions {
    /// Render live datetime tracks in UTC when the track does not say.
    pub datetime_use_utc: bool,
    /// Still mode: the same graph over a one-frame duration.
    pub still: bool,
}

/// Which media inputs actually carry an audio stream, keyed by track id.
///
/// Populated by the ffprobe pass before assembly; a missing entry means no
/// audio, so the graph never references a pad that does not exist.
#[derive(Debug, Clone, Default)]
pub struct AudioPresence(HashMap<String, bool>);

impl AudioPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, track_id: &str, has_audio: bool) {
        self.0.insert(track_id.to_string(), has_audio);
    }

    pub fn has_audio(&self, track_id: &str) -> bool {
        self.0.get(track_id).copied().unwrap_or(false)
    }
}

/// Mutable assembly state threaded through the emitters.
pub struct GraphBuilder {
    filters: Vec<String>,
    last_v: String,
    vcount: usize,
    audio_taps: Vec<String>,
    fps: u32,
    opts: GraphOptions,
}

impl GraphBuilder {
    fn new(fps: u32, opts: GraphOptions) -> Self {
        Self {
            filters: Vec::new(),
            last_v: String::new(),
            vcount: 0,
            audio_taps: Vec::new(),
            fps,
            opts,
        }
    }

    /// Append one raw filter statement.
    pub(crate) fn add(&mut self, filter: String) {
        self.filters.push(filter);
    }

    /// Current tail label of the video chain (brackets included).
    pub(crate) fn last(&self) -> &str {
        &self.last_v
    }

    pub(crate) fn set_last(&mut self, label: String) {
        self.last_v = label;
    }

    /// Current clip counter; callers bump it after minting labels from it.
    pub(crate) fn vcount(&self) -> usize {
        self.vcount
    }

    pub(crate) fn bump(&mut self) {
        self.vcount += 1;
    }

    pub(crate) fn fps(&self) -> u32 {
        self.fps
    }

    pub(crate) fn opts(&self) -> GraphOptions {
        self.opts
    }

    pub(crate) fn add_audio_tap(&mut self, label: String) {
        self.audio_taps.push(label);
    }
}

#[cfg(test)]
impl GraphBuilder {
    pub(crate) fn new_for_tests(fps: u32, opts: GraphOptions) -> Self {
        Self::new(fps, opts)
    }

    pub(crate) fn filters_for_tests(&self) -> &[String] {
        &self.filters
    }

    pub(crate) fn audio_taps_for_tests(&self) -> &[String] {
        &self.audio_taps
    }
}

/// Overlay enable window: the interval during which a track contributes.
pub(crate) fn enable_window(start: f64, end: f64) -> String {
    format!("enable='between(t,{},{})'", start, end)
}

/// Assemble the full program for a validated timeline.
pub fn assemble(
    timeline: &Timeline,
    audio: &AudioPresence,
    opts: GraphOptions,
) -> Result<GraphProgram> {
    let width = timeline.width;
    let height = timeline.height;
    let fps = timeline.fps;
    let duration = if opts.still {
        timeline.one_frame_duration()
    } else {
        timeline.positive_duration()
    };
    let sorted = timeline.tracks_by_z();

    // Input list: background image first, then media tracks in z order.
    let mut inputs: Vec<EngineInput> = Vec::new();
    let mut input_idx: Vec<Option<usize>> = vec![None; sorted.len()];

    let bg_image_idx = timeline.background_image.as_ref().map(|src| {
        inputs.push(EngineInput {
            flags: loop_flags(duration),
            src: src.clone(),
        });
        0usize
    });

    for (pos, track) in sorted.iter().enumerate() {
        match track {
            Track::Image(t) => {
                inputs.push(EngineInput {
                    flags: loop_flags(duration),
                    src: t.src.clone(),
                });
                input_idx[pos] = Some(inputs.len() - 1);
            }
            Track::Video(t) => {
                inputs.push(EngineInput {
                    flags: Vec::new(),
                    src: t.src.clone(),
                });
                input_idx[pos] = Some(inputs.len() - 1);
            }
            Track::Audio(t) => {
                inputs.push(EngineInput {
                    flags: Vec::new(),
                    src: t.src.clone(),
                });
                input_idx[pos] = Some(inputs.len() - 1);
            }
            _ => {}
        }
    }

    let mut g = GraphBuilder::new(fps, opts);

    // Base color, then the optional background image.
    background::emit_base(&mut g, width, height, timeline.background.as_deref());
    if let Some(idx) = bg_image_idx {
        background::emit_background_image(
            &mut g,
            idx,
            width,
            height,
            timeline.background_fit,
            timeline.background_opacity,
        );
    }

    // Media: video/image overlays plus audio taps.
    for (pos, track) in sorted.iter().enumerate() {
        if track.is_media() {
            let idx = input_idx[pos].ok_or_else(|| {
                RenderError::GraphBuild(format!(
                    "media track '{}' was not assigned an input index",
                    track.timing().id
                ))
            })?;
            media::emit_media(&mut g, track, idx, audio.has_audio(&track.timing().id));
        }
    }

    // Text and datetime overlays.
    for track in &sorted {
        match track {
            Track::Text(t) => text::emit_text(&mut g, t),
            Track::Datetime(t) => text::emit_datetime(&mut g, t),
            _ => {}
        }
    }

    // Vector shapes, one phase per primitive.
    for track in &sorted {
        if let Track::Circle(t) = track {
            shapes::circle::emit_circle(&mut g, t);
        }
    }
    for track in &sorted {
        if let Track::Triangle(t) = track {
            shapes::triangle::emit_triangle(&mut g, t);
        }
    }
    for track in &sorted {
        if let Track::Rectangle(t) = track {
            shapes::rectangle::emit_rectangle(&mut g, t);
        }
    }
    for track in &sorted {
        if let Track::Line(t) = track {
            shapes::line::emit_line(&mut g, t);
        }
    }
    for track in &sorted {
        if let Track::Ellipse(t) = track {
            shapes::ellipse::emit_ellipse(&mut g, t);
        }
    }

    // Composites last, above everything the phases below produced.
    for track in &sorted {
        if let Track::Sign(t) = track {
            shapes::sign::emit_sign(&mut g, t);
        }
    }
    for track in &sorted {
        if let Track::Weather(t) = track {
            shapes::weather::emit_weather(&mut g, t);
        }
    }

    Ok(GraphProgram {
        filter_complex: g.filters.join(";"),
        video_out: g.last_v,
        inputs,
        audio_taps: g.audio_taps,
        width,
        height,
        fps,
        duration,
    })
}

fn loop_flags(duration: f64) -> Vec<String> {
    vec![
        "-loop".to_string(),
        "1".to_string(),
        "-t".to_string(),
        format!("{}", duration),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timeline(value: serde_json::Value) -> Timeline {
        let tl = Timeline::from_json(value).unwrap();
        tl.validate().unwrap();
        tl
    }

    fn assemble_simple(value: serde_json::Value) -> GraphProgram {
        assemble(&timeline(value), &AudioPresence::new(), GraphOptions::default()).unwrap()
    }

    #[test]
    fn test_empty_timeline_is_just_the_base() {
        let prog = assemble_simple(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 1.0,
            "background": "#000000",
        }));
        assert_eq!(prog.filter_complex, "color=c=0x000000:s=320x240:r=30[base]");
        assert_eq!(prog.video_out, "[base]");
        assert!(prog.inputs.is_empty());
        assert!(prog.audio_taps.is_empty());
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let value = json!({
            "width": 640, "height": 360, "fps": 30, "duration": 2.0,
            "background": "#101010",
            "tracks": [
                {"id": "r1", "type": "rectangle", "start": 0, "end": 2, "z": 1,
                 "x": 100, "y": 100, "width": 200, "height": 100,
                 "borderRadius": 20, "fill": "#00ff00", "opacity": 0.5},
                {"id": "t1", "type": "text", "start": 0, "end": 2, "z": 0,
                 "x": 10, "y": 10, "text": "hi"}
            ]
        });
        let a = assemble_simple(value.clone());
        let b = assemble_simple(value);
        assert_eq!(a.filter_complex, b.filter_complex);
        assert_eq!(a.video_out, b.video_out);
        assert_eq!(a.inputs, b.inputs);
    }

    #[test]
    fn test_every_label_is_defined_before_use() {
        // No dangling labels: each consumed label is a source pad or was
        // produced by an earlier statement.
        let prog = assemble_simple(json!({
            "width": 640, "height": 360, "fps": 30, "duration": 2.0,
            "backgroundImage": "/tmp/bg.png",
            "tracks": [
                {"id": "i1", "type": "image", "start": 0, "end": 2, "z": 0,
                 "src": "/tmp/a.png", "x": 0, "y": 0, "w": 640, "h": 360},
                {"id": "c1", "type": "circle", "start": 0, "end": 1, "z": 1,
                 "x": 50, "y": 50, "radius": 20, "fill": "#ff0000"},
                {"id": "t1", "type": "text", "start": 0, "end": 2, "z": 2,
                 "x": 10, "y": 10, "text": "hi"}
            ]
        }));

        let mut defined: Vec<String> = Vec::new();
        for stmt in prog.filter_complex.split(';') {
            // Consumed labels are the leading [..] groups before the filter name.
            let mut rest = stmt;
            while rest.starts_with('[') {
                let close = rest.find(']').expect("unterminated label");
                let label = &rest[..=close];
                let is_source = label
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(':')
                    .next()
                    .map(|s| s.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
                    && label.contains(':');
                if !is_source {
                    assert!(
                        defined.contains(&label.to_string()),
                        "label {} consumed before definition in: {}",
                        label,
                        stmt
                    );
                }
                rest = &rest[close + 1..];
            }
            // Produced label is the trailing [..] group.
            if let Some(open) = stmt.rfind('[') {
                if stmt.ends_with(']') {
                    defined.push(stmt[open..].to_string());
                }
            }
        }
        assert!(defined.contains(&prog.video_out));
    }

    #[test]
    fn test_input_order_background_image_first() {
        let prog = assemble_simple(json!({
            "width": 640, "height": 360, "fps": 30, "duration": 2.0,
            "backgroundImage": "/tmp/bg.png",
            "tracks": [
                {"id": "v1", "type": "video", "start": 0, "end": 2, "z": 5,
                 "src": "/tmp/a.mp4", "x": 0, "y": 0, "w": 320, "h": 180},
                {"id": "i1", "type": "image", "start": 0, "end": 2, "z": 0,
                 "src": "/tmp/b.png", "x": 0, "y": 0, "w": 64, "h": 64}
            ]
        }));
        assert_eq!(prog.inputs.len(), 3);
        assert_eq!(prog.inputs[0].src, "/tmp/bg.png");
        // z order puts the image (z=0) before the video (z=5)
        assert_eq!(prog.inputs[1].src, "/tmp/b.png");
        assert_eq!(prog.inputs[2].src, "/tmp/a.mp4");
        // looped inputs get -loop/-t flags, videos none
        assert_eq!(prog.inputs[1].flags[0], "-loop");
        assert!(prog.inputs[2].flags.is_empty());
    }

    #[test]
    fn test_enable_window_emitted_once_per_track() {
        let prog = assemble_simple(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 3.0,
            "tracks": [
                {"id": "t1", "type": "text", "start": 0.5, "end": 2.5, "z": 0,
                 "x": 10, "y": 10, "text": "hi"}
            ]
        }));
        let needle = "enable='between(t,0.5,2.5)'";
        assert_eq!(prog.filter_complex.matches(needle).count(), 1);
    }

    #[test]
    fn test_no_audio_pad_without_probe_result() {
        let prog = assemble_simple(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 2.0,
            "tracks": [
                {"id": "v1", "type": "video", "start": 0, "end": 2, "z": 0,
                 "src": "/tmp/a.mp4", "x": 0, "y": 0, "w": 320, "h": 240}
            ]
        }));
        assert!(!prog.filter_complex.contains(":a]"));
        assert!(prog.audio_taps.is_empty());
    }

    #[test]
    fn test_audio_tap_when_probed() {
        let tl = timeline(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 2.0,
            "tracks": [
                {"id": "v1", "type": "video", "start": 1.0, "end": 2.0, "z": 0,
                 "src": "/tmp/a.mp4", "x": 0, "y": 0, "w": 320, "h": 240,
                 "volume": 0.4}
            ]
        }));
        let mut audio = AudioPresence::new();
        audio.set("v1", true);
        let prog = assemble(&tl, &audio, GraphOptions::default()).unwrap();
        assert_eq!(prog.audio_taps, vec!["[a0]".to_string()]);
        assert!(prog.filter_complex.contains("[0:a]"));
        assert!(prog.filter_complex.contains("adelay=1000:all=1"));
        assert!(prog.filter_complex.contains("volume=0.400"));
    }
}
