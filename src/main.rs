//! Timeline render server
//!
//! Accepts declarative timelines over HTTP, compiles them into FFmpeg
//! filter-graph programs, renders MP4s and PNG stills under bounded
//! concurrency, and serves the persisted artifacts back with byte-range
//! support.

#![allow(dead_code)]

mod assets;
mod config;
mod config_file;
mod error;
mod graph;
mod http;
mod integration;
mod render;
mod state;
mod store;
mod timeline;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::RenderConfig;
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "render-server";

#[tokio::main]
async fn main() {
    init_logging();

    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    // Load configuration: optional TOML file, then environment overrides.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        match crate::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => cf.into_render_config(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load config file {}: {}. Using defaults.",
                    config_path,
                    e
                );
                let mut config = RenderConfig::default();
                crate::config_file::apply_env_overrides(&mut config);
                config
            }
        }
    } else {
        let mut config = RenderConfig::default();
        crate::config_file::apply_env_overrides(&mut config);
        config
    };
    tracing::info!("Configuration loaded: {:?}", config);

    // Engine binaries are located once, here; a missing ffmpeg is fatal.
    let state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Engine: {} / {}",
        state.renderer.engine().ffmpeg.display(),
        state.renderer.engine().ffprobe.display()
    );

    let app = create_router(state);

    let addr: SocketAddr = match config.socket_addr().parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {}: {}", config.socket_addr(), e);
            std::process::exit(1);
        }
    };
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "render_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
