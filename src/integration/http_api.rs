#![cfg(unix)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use crate::config::{AuthConfig, AuthToken, MediaConfig, RenderConfig};
use crate::http::create_router;
use crate::render::Engine;
use crate::state::AppState;

const TOKEN: &str = "test-token";

fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Stub engine: writes a marker payload to its last argument (the output
/// path), like a successful ffmpeg run. The stub ffprobe reports no audio.
fn make_app(dir: &TempDir, engine_body: &str) -> (Router, Arc<AppState>) {
    let ffmpeg = write_script(dir.path(), "ffmpeg", engine_body);
    let ffprobe = write_script(dir.path(), "ffprobe", "exit 1");

    let config = RenderConfig {
        media: MediaConfig {
            media_root: dir.path().join("media"),
            ..Default::default()
        },
        auth: AuthConfig {
            tokens: vec![AuthToken {
                token: TOKEN.to_string(),
                owner: "alice".to_string(),
            }],
        },
        ..Default::default()
    };
    let state = Arc::new(AppState::with_engine(config, Engine { ffmpeg, ffprobe }).unwrap());
    (create_router(state.clone()), state)
}

const WRITE_OUTPUT: &str = "for last; do :; done\nprintf 'engine-output' > \"$last\"";

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn text_timeline() -> Value {
    json!({
        "width": 320, "height": 240, "fps": 30, "duration": 1.0,
        "name": "hello card",
        "background": "#000000",
        "tracks": [
            {"id": "t1", "type": "text", "start": 0, "end": 1, "z": 0,
             "x": 40, "y": 100, "text": "hello", "color": "#ff0000", "fontSize": 48}
        ]
    })
}

#[tokio::test]
async fn test_render_requires_auth() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);
    let response = request(&app, Method::POST, "/render", None, Some(text_timeline())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_track_type_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);
    let body = json!({
        "width": 320, "height": 240, "duration": 1.0,
        "tracks": [{"id": "x", "type": "hologram", "start": 0, "end": 1, "z": 0}]
    });
    let response = request(&app, Method::POST, "/render", Some(TOKEN), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_render_saves_artifact() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);

    let response = request(&app, Method::POST, "/render", Some(TOKEN), Some(text_timeline())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["status"], "saved");
    assert_eq!(body["type"], "video");
    assert_eq!(body["name"], "hello card");
    assert_eq!(body["duration_seconds"], 1);
    let file = body["file"].as_str().unwrap();
    assert!(file.starts_with("locked/"));
    assert!(file.ends_with(".mp4"));
    assert_eq!(
        body["file_url"].as_str().unwrap(),
        format!("/media/{file}")
    );

    // saved implies the file exists at the recorded relative path
    let on_disk = state.store.media_root().join(file);
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"engine-output");

    // and the owner sees it in the listing
    let response = request(&app, Method::GET, "/locked/list", Some(TOKEN), None).await;
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["file"], *file);
}

#[tokio::test]
async fn test_engine_failure_rolls_back_artifact() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, "echo 'bad filter' >&2; exit 1");

    let response = request(&app, Method::POST, "/render", Some(TOKEN), Some(text_timeline())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "ffmpeg failed");
    assert!(body["stderr"].as_str().unwrap().contains("bad filter"));

    // no file, no record
    assert!(state.store.list_for_owner("alice").is_empty());
    let locked = state.store.media_root().join("locked");
    let leftovers: Vec<_> = std::fs::read_dir(&locked)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name() != "index.json")
                .collect()
        })
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "partial files left: {leftovers:?}");
}

#[tokio::test]
async fn test_preview_returns_url_without_artifact() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);

    let response = request(
        &app,
        Method::POST,
        "/render/preview",
        Some(TOKEN),
        Some(text_timeline()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["preview_url"].as_str().unwrap();
    assert!(url.starts_with("/media/previews/"));
    assert!(url.ends_with(".mp4"));
    assert!(!body["render_id"].as_str().unwrap().is_empty());

    let rel = url.strip_prefix("/media/").unwrap();
    assert!(state.store.media_root().join(rel).is_file());
    assert!(state.store.list_for_owner("alice").is_empty());
}

#[tokio::test]
async fn test_image_render_saves_png_artifact() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);

    let response = request(
        &app,
        Method::POST,
        "/render/image",
        Some(TOKEN),
        Some(text_timeline()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["type"], "image");
    assert_eq!(body["duration_seconds"], 0);
    let file = body["file"].as_str().unwrap();
    assert!(file.ends_with(".png"));
    assert!(state.store.media_root().join(file).is_file());
}

#[tokio::test]
async fn test_zero_duration_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);
    let mut body = text_timeline();
    body["duration"] = json!(0.0);
    body["tracks"][0]["end"] = json!(0.0334);

    let response = request(&app, Method::POST, "/render/image/preview", Some(TOKEN), Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_track_with_empty_window_renders() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);
    let mut body = text_timeline();
    body["tracks"][0]["start"] = json!(0.5);
    body["tracks"][0]["end"] = json!(0.5);

    let response = request(&app, Method::POST, "/render", Some(TOKEN), Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_listing_is_scoped_to_owner() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    state.register_token("other-token", "bob");

    let response = request(&app, Method::POST, "/render", Some(TOKEN), Some(text_timeline())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, Method::GET, "/locked/list", Some("other-token"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert!(listed.as_array().unwrap().is_empty());
}

// ---- range-aware media serving ----

fn seed_media(state: &AppState, rel: &str, data: &[u8]) {
    let path = state.store.media_root().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, data).unwrap();
}

#[tokio::test]
async fn test_media_full_read() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    seed_media(&state, "locked/a.mp4", b"0123456789");

    let response = request(&app, Method::GET, "/media/locked/a.mp4", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    assert_eq!(
        response.headers().get(header::ACCEPT_RANGES).unwrap(),
        "bytes"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"0123456789");
}

#[tokio::test]
async fn test_media_head_reports_size() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    seed_media(&state, "locked/a.mp4", b"0123456789");

    let response = request(&app, Method::HEAD, "/media/locked/a.mp4", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "10"
    );
    assert_eq!(
        response.headers().get(header::ACCEPT_RANGES).unwrap(),
        "bytes"
    );
}

#[tokio::test]
async fn test_media_single_byte_range() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    seed_media(&state, "locked/a.mp4", b"0123456789");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/media/locked/a.mp4")
                .header(header::RANGE, "bytes=0-0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-0/10"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"0");
}

#[tokio::test]
async fn test_media_last_byte_and_unsatisfiable() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    seed_media(&state, "locked/a.mp4", b"0123456789");

    // bytes=S-1- : last byte
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/media/locked/a.mp4")
                .header(header::RANGE, "bytes=9-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 9-9/10"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"9");

    // bytes=S- : one past the end
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/media/locked/a.mp4")
                .header(header::RANGE, "bytes=10-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes */10"
    );
}

#[tokio::test]
async fn test_media_missing_file_is_404() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);
    let response = request(&app, Method::GET, "/media/locked/nope.mp4", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_media_traversal_rejected() {
    let dir = TempDir::new().unwrap();
    let (app, state) = make_app(&dir, WRITE_OUTPUT);
    // a real file outside the media root
    std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
    let _ = state;

    let response = request(&app, Method::GET, "/media/../secret.txt", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_identical_timeline_twice_lists_two_artifacts() {
    let dir = TempDir::new().unwrap();
    let (app, _) = make_app(&dir, WRITE_OUTPUT);

    for _ in 0..2 {
        let response =
            request(&app, Method::POST, "/render/image", Some(TOKEN), Some(text_timeline())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = request(&app, Method::GET, "/locked/list", Some(TOKEN), None).await;
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);
}
