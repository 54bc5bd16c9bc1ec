//! Asset localization
//!
//! Every source reference in a timeline (media srcs, background image,
//! weather icons) must be a file the engine can open. Resolution order:
//! existing local path, media-URL mapping onto the media root, configured
//! fallback roots, and finally a download-once cache for remote http(s)
//! URLs. The cache is process-wide and keyed by absolute URL; a per-URL
//! single-flight gate makes concurrent renders share one download.

use dashmap::DashMap;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use crate::config::MediaConfig;
use crate::error::{RenderError, Result};
use crate::timeline::{Timeline, Track};

/// Resolves timeline references to engine-openable files.
pub struct AssetLocalizer {
    config: MediaConfig,
    client: reqwest::Client,
    /// Download cache: absolute URL -> completed local path, with a
    /// single-flight cell per URL.
    cache: DashMap<String, Arc<OnceCell<PathBuf>>>,
    /// Downloads actually performed (not served from cache).
    fetch_count: AtomicUsize,
}

impl AssetLocalizer {
    pub fn new(config: MediaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.asset_fetch_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            cache: DashMap::new(),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Number of remote fetches performed over the process lifetime.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Localize every reference in the timeline, returning a new value whose
    /// srcs all point at local files.
    pub async fn localize_timeline(&self, timeline: &Timeline) -> Result<Timeline> {
        let mut localized = timeline.clone();

        if let Some(bg) = &localized.background_image {
            localized.background_image = Some(self.to_local_path(bg).await?);
        }

        for track in &mut localized.tracks {
            match track {
                Track::Video(t) => t.src = self.to_local_path(&t.src).await?,
                Track::Audio(t) => t.src = self.to_local_path(&t.src).await?,
                Track::Image(t) => t.src = self.to_local_path(&t.src).await?,
                Track::Weather(t) => {
                    if !t.show_components.icon {
                        continue;
                    }
                    let explicit = t
                        .image
                        .as_mut()
                        .and_then(|i| i.url.take().filter(|u| !u.is_empty()));
                    let reference = explicit.or_else(|| {
                        t.data.icon.as_deref().filter(|c| !c.is_empty()).map(|c| {
                            format!("https://openweathermap.org/img/wn/{c}@2x.png")
                        })
                    });
                    if let Some(reference) = reference {
                        let local = self.to_local_path(&reference).await?;
                        t.image.get_or_insert_with(Default::default).url = Some(local);
                    }
                }
                _ => {}
            }
        }

        Ok(localized)
    }

    /// Resolve one reference to a local path the engine can open.
    pub async fn to_local_path(&self, reference: &str) -> Result<String> {
        if let Some(local) = self.try_map_to_local_file(reference) {
            return Ok(local.to_string_lossy().to_string());
        }

        if let Ok(url) = reqwest::Url::parse(reference) {
            return match url.scheme() {
                "http" | "https" => {
                    let local = self.download_once(url.as_str()).await?;
                    Ok(local.to_string_lossy().to_string())
                }
                scheme => Err(RenderError::asset(
                    reference,
                    format!("unsupported scheme '{scheme}'"),
                )),
            };
        }

        Err(RenderError::asset(reference, "no local file found"))
    }

    /// Probe local resolutions: the path itself, the media-URL mapping, and
    /// the configured fallback roots.
    fn try_map_to_local_file(&self, reference: &str) -> Option<PathBuf> {
        let path = Path::new(reference);
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let rel_path = if let Ok(url) = reqwest::Url::parse(reference) {
            if url.scheme() != "http" && url.scheme() != "https" {
                return None;
            }
            url.path().trim_start_matches('/').to_string()
        } else {
            reference.trim_start_matches('/').to_string()
        };
        if rel_path.is_empty() {
            return None;
        }

        // /media/<rel> maps straight onto the media root.
        let media_prefix = self.config.media_url_prefix();
        let media_prefix = media_prefix.trim_start_matches('/');
        if let Some(rel) = rel_path.strip_prefix(media_prefix) {
            let candidate = self.config.media_root.join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        // Fallback roots, also trying with a leading "videos/" stripped.
        let mut candidates = vec![rel_path.clone()];
        if let Some(stripped) = rel_path.strip_prefix("videos/") {
            candidates.push(stripped.to_string());
        }
        for base in &self.config.asset_fallback_dirs {
            for rel in &candidates {
                let candidate = base.join(rel);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Download a remote asset exactly once per URL; concurrent callers wait
    /// on the same in-flight fetch. A failed fetch leaves the slot empty so
    /// a later request can retry.
    async fn download_once(&self, url: &str) -> Result<PathBuf> {
        let cell = self
            .cache
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let path = cell
            .get_or_try_init(|| async {
                self.fetch_count.fetch_add(1, Ordering::Relaxed);
                self.fetch_to_temp(url).await
            })
            .await?;
        Ok(path.clone())
    }

    async fn fetch_to_temp(&self, url: &str) -> Result<PathBuf> {
        let ext = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| {
                Path::new(u.path())
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
            })
            .unwrap_or_default();
        let tmp_path = std::env::temp_dir().join(format!(
            "render_asset_{}{}",
            uuid::Uuid::new_v4().simple(),
            ext
        ));

        let result = self.fetch_into(url, &tmp_path).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result.map(|_| tmp_path)
    }

    async fn fetch_into(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::asset(url, e))?
            .error_for_status()
            .map_err(|e| RenderError::asset(url, e))?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk.map_err(|e| RenderError::asset(url, e))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        tracing::debug!("Localized {} -> {}", url, dest.display());
        Ok(())
    }
}
