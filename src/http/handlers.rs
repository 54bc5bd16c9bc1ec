//! HTTP request handlers
//!
//! Implements the render endpoints. Every handler follows the same phase
//! order: validate the abstract timeline, localize assets, probe audio,
//! assemble the graph, dispatch the engine, record/serve the artifact. No
//! phase depends on a later one.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::error::RenderError;
use crate::graph;
use crate::render::{RenderMode, StillFormat};
use crate::state::AppState;
use crate::store::{ArtifactKind, ArtifactStore, LockedContent, Orientation, RollbackGuard};
use crate::timeline::Timeline;

/// HTTP wrapper carrying the error taxonomy to a status code and JSON body.
#[derive(Debug)]
pub struct ApiError(pub RenderError);

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RenderError::Validation(_) => StatusCode::BAD_REQUEST,
            RenderError::Unauthorized => StatusCode::UNAUTHORIZED,
            RenderError::NotFound(_) | RenderError::PermissionDenied(_) => StatusCode::NOT_FOUND,
            RenderError::EngineTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RenderError::Asset { .. }
            | RenderError::GraphBuild(_)
            | RenderError::Engine { .. }
            | RenderError::Storage(_)
            | RenderError::Config(_)
            | RenderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::debug!("request rejected: {}", self.0);
        }

        let body = match &self.0 {
            RenderError::Engine {
                status: code,
                stderr_tail,
            } => json!({"error": "ffmpeg failed", "exit_status": code, "stderr": stderr_tail}),
            other => json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("render-server v", env!("CARGO_PKG_VERSION"))
}

/// Validate the raw body and run the shared pre-render phases, yielding the
/// localized timeline and its graph program.
async fn prepare_program(
    state: &AppState,
    body: serde_json::Value,
    still: bool,
) -> Result<(Timeline, graph::GraphProgram), ApiError> {
    let timeline = Timeline::from_json(body)?;
    timeline.validate()?;

    let localized = state.assets.localize_timeline(&timeline).await?;
    let audio = state.renderer.probe_timeline(&localized).await;
    let program = graph::assemble(&localized, &audio, state.graph_options(still))?;
    Ok((localized, program))
}

fn artifact_response(state: &AppState, record: &LockedContent) -> serde_json::Value {
    json!({
        "id": record.id,
        "name": record.name,
        "type": record.kind.as_str(),
        "duration_seconds": record.duration_seconds,
        "status": record.status,
        "orientation": record.orientation,
        "created_at": record.created_at,
        "file": record.file,
        "file_url": record.file.as_deref().map(|f| state.media_url_for(f)),
    })
}

fn artifact_name(timeline: &Timeline) -> String {
    match timeline.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Untitled {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
    }
}

/// POST /render/preview: fast MP4 preview, not recorded as an artifact.
pub async fn render_preview(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let (_timeline, program) = prepare_program(&state, body, false).await?;

    let render_id = Uuid::new_v4().simple().to_string();
    let out_dir = state.store.ensure_subdir("previews")?;
    let filename = format!("{render_id}.mp4");
    let output = out_dir.join(&filename);

    state
        .renderer
        .render_video(&program, RenderMode::Preview, &output)
        .await?;

    let rel_path = format!("previews/{filename}");
    Ok((
        StatusCode::OK,
        Json(json!({
            "preview_url": state.media_url_for(&rel_path),
            "render_id": render_id,
        })),
    )
        .into_response())
}

/// POST /render: final MP4 recorded as a locked-then-saved artifact.
pub async fn render_save(
    State(state): State<Arc<AppState>>,
    CurrentUser(owner): CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let (timeline, program) = prepare_program(&state, body, false).await?;

    let name = artifact_name(&timeline);
    let duration_seconds = timeline.duration.round().max(1.0) as u32;
    let orientation = Orientation::from_canvas(timeline.width, timeline.height);
    let record = state.store.create_locked(
        &owner,
        &name,
        ArtifactKind::Video,
        duration_seconds,
        orientation,
    )?;

    let out_dir = state.store.ensure_subdir("locked")?;
    let output_rel = ArtifactStore::relative_locked_path(&record.id, "mp4");
    let output_abs = out_dir.join(format!("{}.mp4", record.id));
    let output_tmp = out_dir.join(format!(".tmp-{}.mp4", record.id));

    // Failure or disconnect past this point deletes the record and file.
    let guard = RollbackGuard::new(&state.store, &record.id, output_tmp.clone());

    state
        .renderer
        .render_video(&program, RenderMode::Final, &output_tmp)
        .await?;
    tokio::fs::rename(&output_tmp, &output_abs)
        .await
        .map_err(|e| RenderError::Storage(e.to_string()))?;

    let saved = state.store.mark_saved(&record.id, &output_rel)?;
    guard.defuse();

    Ok((StatusCode::OK, Json(artifact_response(&state, &saved))).into_response())
}

/// POST /render/image/preview: one PNG frame from the full graph.
pub async fn render_image_preview(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let (_timeline, program) = prepare_program(&state, body, true).await?;

    let render_id = Uuid::new_v4().simple().to_string();
    let out_dir = state.store.ensure_subdir("previews")?;
    let filename = format!("{render_id}.png");
    let output = out_dir.join(&filename);

    state
        .renderer
        .render_still(&program, StillFormat::Png, &output)
        .await?;

    let rel_path = format!("previews/{filename}");
    Ok((
        StatusCode::OK,
        Json(json!({
            "preview_url": state.media_url_for(&rel_path),
            "render_id": render_id,
        })),
    )
        .into_response())
}

/// POST /render/image: one PNG recorded as an artifact.
pub async fn render_image_save(
    State(state): State<Arc<AppState>>,
    CurrentUser(owner): CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let (timeline, program) = prepare_program(&state, body, true).await?;

    let name = artifact_name(&timeline);
    let orientation = Orientation::from_canvas(timeline.width, timeline.height);
    let record =
        state
            .store
            .create_locked(&owner, &name, ArtifactKind::Image, 0, orientation)?;

    let out_dir = state.store.ensure_subdir("locked")?;
    let output_rel = ArtifactStore::relative_locked_path(&record.id, "png");
    let output_abs: PathBuf = out_dir.join(format!("{}.png", record.id));

    let guard = RollbackGuard::new(&state.store, &record.id, output_abs.clone());

    state
        .renderer
        .render_still(&program, StillFormat::Png, &output_abs)
        .await?;

    let saved = state.store.mark_saved(&record.id, &output_rel)?;
    guard.defuse();

    Ok((StatusCode::OK, Json(artifact_response(&state, &saved))).into_response())
}

/// GET /locked/list: the caller's artifacts, newest first.
pub async fn locked_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(owner): CurrentUser,
) -> Result<Response, ApiError> {
    let records = state.store.list_for_owner(&owner);
    let body: Vec<serde_json::Value> = records
        .iter()
        .map(|r| artifact_response(&state, r))
        .collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}
