//! Render dispatching
//!
//! Owns the engine binaries (resolved once, at construction), the render
//! semaphore bounding concurrent FFmpeg invocations, and the wall-clock
//! timeouts. The expensive work happens in the engine subprocess; request
//! handlers only await it.

pub mod command;
pub mod probe;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::EngineConfig;
use crate::error::{RenderError, Result};
use crate::graph::{AudioPresence, GraphProgram};
use crate::timeline::Timeline;

pub use command::{RenderMode, StillFormat};

/// Longest stderr tail surfaced in an engine error.
const STDERR_TAIL_BYTES: usize = 4000;

/// Located engine binaries. Construction fails when a binary is missing,
/// so a misconfigured server refuses to start instead of failing per
/// request.
#[derive(Debug, Clone)]
pub struct Engine {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Engine {
    pub fn locate(config: &EngineConfig) -> Result<Self> {
        let ffmpeg = resolve_binary(&config.ffmpeg_bin).ok_or_else(|| {
            RenderError::Config(format!(
                "ffmpeg not found ('{}'); set FFMPEG_BIN or fix PATH",
                config.ffmpeg_bin
            ))
        })?;
        let ffprobe = resolve_binary(&config.ffprobe_bin).ok_or_else(|| {
            RenderError::Config(format!(
                "ffprobe not found ('{}'); set FFPROBE_BIN or fix PATH",
                config.ffprobe_bin
            ))
        })?;
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Resolve a binary name: explicit paths are checked directly, bare names
/// are searched on PATH.
fn resolve_binary(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Drives FFmpeg under bounded concurrency.
pub struct Renderer {
    engine: Engine,
    render_slots: Semaphore,
    final_timeout: Duration,
    preview_timeout: Duration,
}

impl Renderer {
    pub fn new(engine: Engine, config: &EngineConfig) -> Self {
        Self {
            engine,
            render_slots: Semaphore::new(config.render_concurrency.max(1)),
            final_timeout: Duration::from_secs(config.final_timeout_secs),
            preview_timeout: Duration::from_secs(config.preview_timeout_secs),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// ffprobe pass: which media inputs carry audio.
    pub async fn probe_timeline(&self, timeline: &Timeline) -> AudioPresence {
        probe::probe_audio_presence(&self.engine.ffprobe, timeline).await
    }

    /// Render an MP4 in the given mode.
    pub async fn render_video(
        &self,
        program: &GraphProgram,
        mode: RenderMode,
        output: &Path,
    ) -> Result<()> {
        let args = command::build_video_args(program, mode, output);
        let timeout = match mode {
            RenderMode::Final => self.final_timeout,
            RenderMode::Preview => self.preview_timeout,
        };
        self.run_engine(&args, timeout).await
    }

    /// Render a single frame.
    pub async fn render_still(
        &self,
        program: &GraphProgram,
        format: StillFormat,
        output: &Path,
    ) -> Result<()> {
        let args = command::build_still_args(program, format, output);
        self.run_engine(&args, self.preview_timeout).await
    }

    /// Acquire a render slot, spawn the engine, and wait with a wall-clock
    /// timeout. The child is killed when the future is dropped (client
    /// disconnect) or the timeout fires.
    async fn run_engine(&self, args: &[String], timeout: Duration) -> Result<()> {
        let _slot = self
            .render_slots
            .acquire()
            .await
            .map_err(|_| RenderError::GraphBuild("render semaphore closed".into()))?;

        tracing::debug!("Spawning {} {}", self.engine.ffmpeg.display(), args.join(" "));
        let child = Command::new(&self.engine.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(())
                } else {
                    Err(RenderError::Engine {
                        status: output.status.code().unwrap_or(-1),
                        stderr_tail: stderr_tail(&output.stderr),
                    })
                }
            }
            Ok(Err(e)) => Err(e.into()),
            // Dropping the in-flight wait kills the child (kill_on_drop).
            Err(_) => Err(RenderError::EngineTimeout(timeout.as_secs())),
        }
    }
}

/// Bounded tail of the engine's stderr, valid UTF-8 or lossy.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        trimmed.to_string()
    } else {
        let start = trimmed.len() - STDERR_TAIL_BYTES;
        // keep the tail on a char boundary
        let start = trimmed
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= start)
            .unwrap_or(start);
        trimmed[start..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{assemble, GraphOptions};
    use crate::timeline::Timeline;
    use serde_json::json;

    fn engine_config(concurrency: usize) -> EngineConfig {
        EngineConfig {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            render_concurrency: concurrency,
            final_timeout_secs: 600,
            preview_timeout_secs: 120,
        }
    }

    #[test]
    fn test_locate_missing_binary_fails() {
        let config = EngineConfig {
            ffmpeg_bin: "/definitely/not/ffmpeg".to_string(),
            ..engine_config(1)
        };
        let err = Engine::locate(&config).unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
        assert!(err.to_string().contains("/definitely/not/ffmpeg"));
    }

    #[test]
    fn test_resolve_binary_on_path() {
        // `sh` exists on any unix PATH
        #[cfg(unix)]
        assert!(resolve_binary("sh").is_some());
        assert!(resolve_binary("definitely-not-a-binary-xyz").is_none());
    }

    #[test]
    fn test_stderr_tail_bounds() {
        let short = stderr_tail(b"  error: something\n");
        assert_eq!(short, "error: something");
        let long = "x".repeat(10_000);
        assert_eq!(stderr_tail(long.as_bytes()).len(), STDERR_TAIL_BYTES);
    }

    #[cfg(unix)]
    fn fake_engine(dir: &Path, script: &str) -> Engine {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Engine {
            ffmpeg: path.clone(),
            ffprobe: path,
        }
    }

    fn program() -> GraphProgram {
        let tl = Timeline::from_json(json!({
            "width": 320, "height": 240, "fps": 30, "duration": 1.0
        }))
        .unwrap();
        assemble(&tl, &AudioPresence::new(), GraphOptions::default()).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_success() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = fake_engine(dir.path(), "exit 0");
        let renderer = Renderer::new(engine, &engine_config(1));
        renderer
            .render_video(&program(), RenderMode::Final, Path::new("/tmp/out.mp4"))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_failure_surfaces_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = fake_engine(dir.path(), "echo 'No such filter: bogus' >&2; exit 1");
        let renderer = Renderer::new(engine, &engine_config(1));
        let err = renderer
            .render_video(&program(), RenderMode::Final, Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        match err {
            RenderError::Engine {
                status,
                stderr_tail,
            } => {
                assert_eq!(status, 1);
                assert!(stderr_tail.contains("No such filter: bogus"));
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = fake_engine(dir.path(), "sleep 30");
        let mut config = engine_config(1);
        config.preview_timeout_secs = 1;
        let renderer = Renderer::new(engine, &config);
        let err = renderer
            .render_video(&program(), RenderMode::Preview, Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::EngineTimeout(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bounded_concurrency() {
        use std::sync::Arc;

        // The fake engine flags any overlapping invocation via a marker file.
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let overlap = dir.path().join("overlap");
        let engine = fake_engine(
            dir.path(),
            &format!(
                "if [ -e {m} ]; then touch {o}; fi\ntouch {m}\nsleep 0.2\nrm -f {m}",
                m = marker.display(),
                o = overlap.display()
            ),
        );
        let renderer = Arc::new(Renderer::new(engine, &engine_config(1)));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let renderer = renderer.clone();
            handles.push(tokio::spawn(async move {
                renderer
                    .render_video(&program(), RenderMode::Final, Path::new("/tmp/out.mp4"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // one slot: the engine never saw itself already running
        assert!(!overlap.exists());
    }
}
