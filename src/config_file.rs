//! Configuration file support
//!
//! Loads server configuration from TOML files and applies the environment
//! overrides recognized by the service (FFMPEG_BIN, FFPROBE_BIN, MEDIA_ROOT,
//! MEDIA_URL, RENDER_CONCURRENCY, RENDER_TIMEOUT_FINAL,
//! RENDER_TIMEOUT_PREVIEW, ASSET_FETCH_TIMEOUT).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{AuthConfig, EngineConfig, MediaConfig, RenderConfig};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// Engine settings
    pub engine: Option<EngineSettings>,
    /// Media settings
    pub media: Option<MediaSettings>,
    /// Authentication settings
    pub auth: Option<AuthConfig>,
    /// Render behavior settings
    pub render: Option<RenderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub ffmpeg_bin: Option<String>,
    pub ffprobe_bin: Option<String>,
    pub render_concurrency: Option<usize>,
    pub final_timeout_secs: Option<u64>,
    pub preview_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    pub media_root: Option<PathBuf>,
    pub media_url: Option<String>,
    pub asset_fallback_dirs: Option<Vec<PathBuf>>,
    pub asset_fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Render live datetime tracks in UTC instead of server-local time
    pub datetime_use_utc: Option<bool>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Convert to RenderConfig, then apply environment overrides on top.
    pub fn into_render_config(self) -> RenderConfig {
        let defaults = RenderConfig::default();
        let server = self.server;
        let engine = self.engine;
        let media = self.media;

        let mut config = RenderConfig {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(defaults.host),
            port: server.as_ref().and_then(|s| s.port).unwrap_or(defaults.port),
            cors_enabled: server
                .as_ref()
                .and_then(|s| s.cors_enabled)
                .unwrap_or(defaults.cors_enabled),
            engine: EngineConfig {
                ffmpeg_bin: engine
                    .as_ref()
                    .and_then(|e| e.ffmpeg_bin.clone())
                    .unwrap_or(defaults.engine.ffmpeg_bin),
                ffprobe_bin: engine
                    .as_ref()
                    .and_then(|e| e.ffprobe_bin.clone())
                    .unwrap_or(defaults.engine.ffprobe_bin),
                render_concurrency: engine
                    .as_ref()
                    .and_then(|e| e.render_concurrency)
                    .unwrap_or(defaults.engine.render_concurrency),
                final_timeout_secs: engine
                    .as_ref()
                    .and_then(|e| e.final_timeout_secs)
                    .unwrap_or(defaults.engine.final_timeout_secs),
                preview_timeout_secs: engine
                    .as_ref()
                    .and_then(|e| e.preview_timeout_secs)
                    .unwrap_or(defaults.engine.preview_timeout_secs),
            },
            media: MediaConfig {
                media_root: media
                    .as_ref()
                    .and_then(|m| m.media_root.clone())
                    .unwrap_or(defaults.media.media_root),
                media_url: media
                    .as_ref()
                    .and_then(|m| m.media_url.clone())
                    .unwrap_or(defaults.media.media_url),
                asset_fallback_dirs: media
                    .as_ref()
                    .and_then(|m| m.asset_fallback_dirs.clone())
                    .unwrap_or(defaults.media.asset_fallback_dirs),
                asset_fetch_timeout_secs: media
                    .as_ref()
                    .and_then(|m| m.asset_fetch_timeout_secs)
                    .unwrap_or(defaults.media.asset_fetch_timeout_secs),
            },
            auth: self.auth.unwrap_or(defaults.auth),
            datetime_use_utc: self
                .render
                .and_then(|r| r.datetime_use_utc)
                .unwrap_or(defaults.datetime_use_utc),
        };

        apply_env_overrides(&mut config);
        config
    }
}

/// Apply the recognized environment variables over a loaded config.
pub fn apply_env_overrides(config: &mut RenderConfig) {
    if let Ok(v) = std::env::var("FFMPEG_BIN") {
        if !v.is_empty() {
            config.engine.ffmpeg_bin = v;
        }
    }
    if let Ok(v) = std::env::var("FFPROBE_BIN") {
        if !v.is_empty() {
            config.engine.ffprobe_bin = v;
        }
    }
    if let Ok(v) = std::env::var("MEDIA_ROOT") {
        if !v.is_empty() {
            config.media.media_root = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("MEDIA_URL") {
        if !v.is_empty() {
            config.media.media_url = v;
        }
    }
    if let Some(n) = env_parse::<usize>("RENDER_CONCURRENCY") {
        if n > 0 {
            config.engine.render_concurrency = n;
        }
    }
    if let Some(n) = env_parse::<u64>("RENDER_TIMEOUT_FINAL") {
        config.engine.final_timeout_secs = n;
    }
    if let Some(n) = env_parse::<u64>("RENDER_TIMEOUT_PREVIEW") {
        config.engine.preview_timeout_secs = n;
    }
    if let Some(n) = env_parse::<u64>("ASSET_FETCH_TIMEOUT") {
        config.media.asset_fetch_timeout_secs = n;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(v) => match v.trim().parse::<T>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!("Ignoring unparseable {}={}", name, v);
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        let rc = config.into_render_config();
        assert_eq!(rc.port, 3000);
        assert_eq!(rc.engine.ffmpeg_bin, "ffmpeg");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let toml_src = r#"
            [server]
            port = 8080

            [engine]
            render_concurrency = 2

            [media]
            media_root = "/srv/media"

            [[auth.tokens]]
            token = "secret"
            owner = "alice"
        "#;
        let config: ConfigFile = toml::from_str(toml_src).unwrap();
        let rc = config.into_render_config();
        assert_eq!(rc.port, 8080);
        assert_eq!(rc.engine.render_concurrency, 2);
        assert_eq!(rc.media.media_root, PathBuf::from("/srv/media"));
        assert_eq!(rc.media.asset_fetch_timeout_secs, 30);
        assert_eq!(rc.auth.tokens.len(), 1);
        assert_eq!(rc.auth.tokens[0].owner, "alice");
    }

    #[test]
    fn test_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nhost = \"127.0.0.1\"\nport = 9000\n")
            .unwrap();
        let config = ConfigFile::from_file(temp_file.path()).unwrap();
        let rc = config.into_render_config();
        assert_eq!(rc.host, "127.0.0.1");
        assert_eq!(rc.port, 9000);
    }
}
