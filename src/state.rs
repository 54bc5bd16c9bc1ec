//! Application state management
//!
//! AppState bundles everything handlers share: configuration, the artifact
//! store, the asset localizer (with its process-wide download cache), the
//! render dispatcher, and the auth token table.

use dashmap::DashMap;

use crate::assets::AssetLocalizer;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::graph::GraphOptions;
use crate::render::{Engine, Renderer};
use crate::store::ArtifactStore;

/// Application state shared across all handlers
pub struct AppState {
    /// Server configuration
    pub config: RenderConfig,

    /// Artifact records and their on-disk index
    pub store: ArtifactStore,

    /// Timeline asset localization and download cache
    pub assets: AssetLocalizer,

    /// Engine dispatcher (semaphore, timeouts)
    pub renderer: Renderer,

    /// Bearer token -> owner
    tokens: DashMap<String, String>,
}

impl AppState {
    /// Create state, locating the engine binaries up front.
    pub fn new(config: RenderConfig) -> Result<Self> {
        let engine = Engine::locate(&config.engine)?;
        Self::with_engine(config, engine)
    }

    /// Create state with pre-located engine binaries.
    pub fn with_engine(config: RenderConfig, engine: Engine) -> Result<Self> {
        let store = ArtifactStore::open(&config.media.media_root)?;
        let assets = AssetLocalizer::new(config.media.clone());
        let renderer = Renderer::new(engine, &config.engine);
        let tokens = DashMap::new();
        for token in &config.auth.tokens {
            tokens.insert(token.token.clone(), token.owner.clone());
        }
        Ok(Self {
            config,
            store,
            assets,
            renderer,
            tokens,
        })
    }

    /// Resolve a bearer token to its owner.
    pub fn owner_for_token(&self, token: &str) -> Option<String> {
        self.tokens.get(token).map(|o| o.clone())
    }

    /// Register a token at runtime (tests and tooling).
    pub fn register_token(&self, token: &str, owner: &str) {
        self.tokens.insert(token.to_string(), owner.to_string());
    }

    /// Graph assembly options derived from configuration.
    pub fn graph_options(&self, still: bool) -> GraphOptions {
        GraphOptions {
            datetime_use_utc: self.config.datetime_use_utc,
            still,
        }
    }

    /// Public URL for a path relative to the media root.
    pub fn media_url_for(&self, rel_path: &str) -> String {
        format!("{}{}", self.config.media.media_url_prefix(), rel_path)
    }
}
