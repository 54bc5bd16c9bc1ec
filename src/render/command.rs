//! FFmpeg command assembly
//!
//! Wraps a `GraphProgram` into the full argument list for each render mode.
//! Final renders favor quality, previews favor speed (faster preset, higher
//! CRF, optional downscale), stills emit exactly one frame from the same
//! graph.

use std::path::Path;

use crate::graph::{audio, GraphProgram};

/// Preview renders are downscaled to fit within this box.
pub const PREVIEW_MAX_DIM: (u32, u32) = (1280, 720);

/// Video render mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Final,
    Preview,
}

/// Still output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillFormat {
    Png,
    Jpg,
}

impl StillFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpg => "jpg",
        }
    }
}

struct EncodeSettings {
    preset: &'static str,
    crf: &'static str,
    extra: &'static [&'static str],
}

fn encode_settings(mode: RenderMode) -> EncodeSettings {
    match mode {
        RenderMode::Preview => EncodeSettings {
            preset: "ultrafast",
            crf: "28",
            extra: &["-tune", "zerolatency"],
        },
        RenderMode::Final => EncodeSettings {
            preset: "veryfast",
            crf: "20",
            extra: &[],
        },
    }
}

/// Global flags: quiet logging plus conservative filter parallelism.
pub(crate) fn threading_flags() -> Vec<String> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let filter_threads = (cpus / 2).max(2).to_string();
    vec![
        "-threads".to_string(),
        "0".to_string(),
        "-filter_threads".to_string(),
        filter_threads.clone(),
        "-filter_complex_threads".to_string(),
        filter_threads,
        "-nostdin".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

/// Append a fit-within downscale for oversized canvases, keeping aspect.
///
/// Returns the (possibly extended) filter text and the final video label.
fn maybe_preview_downscale(
    filter_complex: &str,
    last_v: &str,
    width: u32,
    height: u32,
) -> (String, String) {
    let (max_w, max_h) = PREVIEW_MAX_DIM;
    if width <= max_w && height <= max_h {
        return (filter_complex.to_string(), last_v.to_string());
    }
    let out = "[v_preview]";
    let scale = format!(
        "{last_v}scale='if(gt(a,{max_w}/{max_h}),{max_w},-2)':'if(gt(a,{max_w}/{max_h}),-2,{max_h})':flags=fast_bilinear{out}"
    );
    (format!("{filter_complex};{scale}"), out.to_string())
}

/// Build the full MP4 render argument list (binary not included).
pub fn build_video_args(program: &GraphProgram, mode: RenderMode, output: &Path) -> Vec<String> {
    let (mut filter_complex, last_v) = match mode {
        RenderMode::Preview => maybe_preview_downscale(
            &program.filter_complex,
            &program.video_out,
            program.width,
            program.height,
        ),
        RenderMode::Final => (program.filter_complex.clone(), program.video_out.clone()),
    };

    let mut args: Vec<String> = Vec::new();
    for input in &program.inputs {
        args.extend(input.flags.iter().cloned());
        args.push("-i".to_string());
        args.push(input.src.clone());
    }

    args.extend(threading_flags());

    // Mapping: always the composited video, plus mixed audio when any track
    // contributed a tap.
    let mut map_args: Vec<String> = Vec::new();
    map_args.push("-map".to_string());
    map_args.push(last_v.clone());
    if !program.audio_taps.is_empty() {
        let (mix, audio_out) = audio::mix_filters(&program.audio_taps);
        if !mix.is_empty() {
            filter_complex = format!("{};{}", filter_complex, mix.join(";"));
        }
        map_args.push("-map".to_string());
        map_args.push(audio_out);
        map_args.push("-c:a".to_string());
        map_args.push("aac".to_string());
    } else if mode == RenderMode::Preview {
        map_args.push("-an".to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(filter_complex);
    args.extend(map_args);

    let enc = encode_settings(mode);
    args.extend([
        "-r".to_string(),
        program.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        enc.preset.to_string(),
        "-crf".to_string(),
        enc.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    args.extend(enc.extra.iter().map(|s| s.to_string()));
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-t".to_string(),
        format!("{}", program.duration),
        "-shortest".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Build the single-frame (PNG/JPG) argument list.
///
/// Stills keep parity with the preview look, so the downscale cap applies.
pub fn build_still_args(program: &GraphProgram, format: StillFormat, output: &Path) -> Vec<String> {
    let (filter_complex, last_v) = maybe_preview_downscale(
        &program.filter_complex,
        &program.video_out,
        program.width,
        program.height,
    );

    let mut args: Vec<String> = Vec::new();
    for input in &program.inputs {
        args.extend(input.flags.iter().cloned());
        args.push("-i".to_string());
        args.push(input.src.clone());
    }

    args.extend(threading_flags());

    args.extend([
        "-filter_complex".to_string(),
        filter_complex,
        "-map".to_string(),
        last_v,
        "-frames:v".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "image2".to_string(),
        "-y".to_string(),
    ]);

    match format {
        StillFormat::Png => args.extend(["-vcodec".to_string(), "png".to_string()]),
        StillFormat::Jpg => args.extend(["-q:v".to_string(), "2".to_string()]),
    }
    args.push(output.to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{assemble, AudioPresence, GraphOptions};
    use crate::timeline::Timeline;
    use serde_json::json;
    use std::path::PathBuf;

    fn program(taps: bool) -> GraphProgram {
        let tl = Timeline::from_json(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 1.0,
            "tracks": if taps {
                json!([{"id": "v1", "type": "video", "start": 0, "end": 1, "z": 0,
                        "src": "/tmp/a.mp4", "x": 0, "y": 0, "w": 320, "h": 240}])
            } else {
                json!([])
            }
        }))
        .unwrap();
        let mut audio = AudioPresence::new();
        if taps {
            audio.set("v1", true);
        }
        assemble(&tl, &audio, GraphOptions::default()).unwrap()
    }

    #[test]
    fn test_final_video_args() {
        let args = build_video_args(&program(false), RenderMode::Final, &PathBuf::from("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-hide_banner -loglevel error"));
        assert!(joined.contains("-nostdin"));
        assert!(joined.contains("-threads 0"));
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 20 -pix_fmt yuv420p"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-t 1 -shortest -y /tmp/out.mp4"));
        // no audio taps: no AAC, and final mode does not force -an
        assert!(!joined.contains("-c:a"));
        assert!(!joined.contains("-an"));
    }

    #[test]
    fn test_preview_video_args() {
        let args = build_video_args(&program(false), RenderMode::Preview, &PathBuf::from("/tmp/p.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-preset ultrafast -crf 28"));
        assert!(joined.contains("-tune zerolatency"));
        assert!(joined.contains("-an"));
    }

    #[test]
    fn test_audio_mapped_when_taps_exist() {
        let args = build_video_args(&program(true), RenderMode::Final, &PathBuf::from("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-map [a0]"));
        assert!(joined.contains("-c:a aac"));
    }

    #[test]
    fn test_small_canvas_not_downscaled() {
        let args = build_video_args(&program(false), RenderMode::Preview, &PathBuf::from("/tmp/p.mp4"));
        assert!(!args.join(" ").contains("v_preview"));
    }

    #[test]
    fn test_oversized_preview_downscaled() {
        let tl = Timeline::from_json(json!({
            "width": 3840, "height": 2160, "fps": 30, "duration": 1.0
        }))
        .unwrap();
        let prog = assemble(&tl, &AudioPresence::new(), GraphOptions::default()).unwrap();
        let args = build_video_args(&prog, RenderMode::Preview, &PathBuf::from("/tmp/p.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("[v_preview]"));
        assert!(joined.contains("flags=fast_bilinear"));
        assert!(joined.contains("-map [v_preview]"));
    }

    #[test]
    fn test_still_args_single_frame() {
        let args = build_still_args(&program(false), StillFormat::Png, &PathBuf::from("/tmp/s.png"));
        let joined = args.join(" ");
        assert!(joined.contains("-frames:v 1"));
        assert!(joined.contains("-f image2"));
        assert!(joined.contains("-vcodec png /tmp/s.png"));
        // stills never carry audio
        assert!(!joined.contains("-map [a"));
    }

    #[test]
    fn test_still_jpg_quality() {
        let args = build_still_args(&program(false), StillFormat::Jpg, &PathBuf::from("/tmp/s.jpg"));
        assert!(args.join(" ").contains("-q:v 2 /tmp/s.jpg"));
    }

    #[test]
    fn test_looped_input_flags_precede_input() {
        let tl = Timeline::from_json(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 2.0,
            "tracks": [{"id": "i1", "type": "image", "start": 0, "end": 2, "z": 0,
                        "src": "/tmp/a.png", "x": 0, "y": 0, "w": 10, "h": 10}]
        }))
        .unwrap();
        let prog = assemble(&tl, &AudioPresence::new(), GraphOptions::default()).unwrap();
        let args = build_video_args(&prog, RenderMode::Final, &PathBuf::from("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-loop 1 -t 2 -i /tmp/a.png"));
    }
}
