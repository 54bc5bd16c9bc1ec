//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine (FFmpeg) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// ffmpeg binary: absolute path or a name resolved on PATH
    pub ffmpeg_bin: String,

    /// ffprobe binary: absolute path or a name resolved on PATH
    pub ffprobe_bin: String,

    /// Maximum concurrent ffmpeg invocations
    pub render_concurrency: usize,

    /// Wall-clock timeout for final renders in seconds
    pub final_timeout_secs: u64,

    /// Wall-clock timeout for preview and still renders in seconds
    pub preview_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            render_concurrency: default_render_concurrency(),
            final_timeout_secs: 600,
            preview_timeout_secs: 120,
        }
    }
}

/// Default render slots: half the CPUs, at least one.
pub fn default_render_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus / 2).max(1)
}

/// Media storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Filesystem root for persisted artifacts
    pub media_root: PathBuf,

    /// Public URL prefix corresponding to media_root
    pub media_url: String,

    /// Extra roots probed when a timeline references a bare relative path
    pub asset_fallback_dirs: Vec<PathBuf>,

    /// Timeout for a single remote asset download in seconds
    pub asset_fetch_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            asset_fallback_dirs: Vec::new(),
            asset_fetch_timeout_secs: 30,
        }
    }
}

impl MediaConfig {
    /// media_url normalized to end with a slash
    pub fn media_url_prefix(&self) -> String {
        if self.media_url.ends_with('/') {
            self.media_url.clone()
        } else {
            format!("{}/", self.media_url)
        }
    }
}

/// One API token and the owner it authenticates as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub owner: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accepted bearer tokens
    pub tokens: Vec<AuthToken>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Engine configuration
    pub engine: EngineConfig,

    /// Media storage configuration
    pub media: MediaConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Render live datetime tracks in UTC instead of server-local time
    pub datetime_use_utc: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            engine: EngineConfig::default(),
            media: MediaConfig::default(),
            auth: AuthConfig::default(),
            cors_enabled: true,
            datetime_use_utc: false,
        }
    }
}

impl RenderConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
