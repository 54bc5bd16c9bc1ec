//! Audio stream probing
//!
//! Runs ffprobe against each media input before graph assembly so audio
//! chains are only attached to inputs that really carry an audio stream.
//! Probe failures are treated as "no audio", so the render still succeeds,
//! just silent for that input.

use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

use crate::graph::AudioPresence;
use crate::timeline::{Timeline, Track};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[allow(dead_code)]
    index: Option<i64>,
}

/// Whether the input has at least one audio stream.
pub async fn input_has_audio(ffprobe: &Path, src: &str) -> bool {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=index",
            "-of",
            "json",
            src,
        ])
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            serde_json::from_slice::<ProbeOutput>(&out.stdout)
                .map(|p| !p.streams.is_empty())
                .unwrap_or(false)
        }
        Ok(out) => {
            tracing::debug!(
                "ffprobe failed for {}: {}",
                src,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::debug!("ffprobe could not run for {}: {}", src, e);
            false
        }
    }
}

/// Probe every video/audio track of a localized timeline.
pub async fn probe_audio_presence(ffprobe: &Path, timeline: &Timeline) -> AudioPresence {
    let mut presence = AudioPresence::new();
    for track in &timeline.tracks {
        match track {
            Track::Video(t) => {
                presence.set(&t.timing.id, input_has_audio(ffprobe, &t.src).await);
            }
            Track::Audio(t) => {
                presence.set(&t.timing.id, input_has_audio(ffprobe, &t.src).await);
            }
            _ => {}
        }
    }
    presence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_probe(dir: &Path, stdout: &str, exit: i32) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("ffprobe");
        std::fs::write(
            &path,
            format!("#!/bin/sh\nprintf '%s' '{}'\nexit {}\n", stdout, exit),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_audio_stream_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), r#"{"streams": [{"index": 1}]}"#, 0);
        assert!(input_has_audio(&probe, "/tmp/a.mp4").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_streams_means_no_audio() {
        let dir = tempfile::TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), r#"{"streams": []}"#, 0);
        assert!(!input_has_audio(&probe, "/tmp/a.mp4").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_recovers_as_silent() {
        let dir = tempfile::TempDir::new().unwrap();
        let probe = fake_probe(dir.path(), "", 1);
        assert!(!input_has_audio(&probe, "/tmp/a.mp4").await);
    }

    #[tokio::test]
    async fn test_missing_binary_recovers_as_silent() {
        assert!(!input_has_audio(Path::new("/definitely/not/ffprobe"), "/tmp/a.mp4").await);
    }
}
