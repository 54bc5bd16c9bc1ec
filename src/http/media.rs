//! Range-aware media serving
//!
//! Serves files under the media root with HTTP byte-range support so
//! browsers can scrub rendered MP4s. Responses always advertise
//! `Accept-Ranges` and expose the length/range headers cross-origin.

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::state::AppState;

/// Content type by file extension; the engine controls what we write, so a
/// short table covers everything the service produces or ingests.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("aac") => "audio/aac",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Join a request path onto the media root, rejecting anything that could
/// escape it (absolute paths, `..`, prefixes).
fn resolve_media_path(media_root: &Path, request_path: &str) -> Option<PathBuf> {
    let rel = Path::new(request_path);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(media_root.join(rel))
}

/// Outcome of parsing a `Range` header against a file size.
#[derive(Debug, PartialEq, Eq)]
enum RangeOutcome {
    /// Inclusive byte window.
    Slice(u64, u64),
    Unsatisfiable,
    /// Not a byte range; serve the whole file.
    Ignore,
}

fn parse_range(header: &str, size: u64) -> RangeOutcome {
    let Some((units, range)) = header.trim().split_once('=') else {
        return RangeOutcome::Ignore;
    };
    if units != "bytes" {
        return RangeOutcome::Ignore;
    }
    let (start_str, end_str) = match range.split_once('-') {
        Some(parts) => parts,
        None => (range, ""),
    };
    let start = start_str.parse::<u64>().unwrap_or(0);
    let end = end_str
        .parse::<u64>()
        .unwrap_or_else(|_| size.saturating_sub(1));
    let end = end.min(size.saturating_sub(1));
    if start > end || start >= size {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Slice(start, end)
}

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges"),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}

fn http_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// GET/HEAD /media/{path}: range-aware file read.
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    method: Method,
    request_headers: HeaderMap,
    UrlPath(path): UrlPath<String>,
) -> Response {
    let Some(full_path) = resolve_media_path(&state.config.media.media_root, &path) else {
        return not_found();
    };
    let Ok(meta) = tokio::fs::metadata(&full_path).await else {
        return not_found();
    };
    if !meta.is_file() {
        return not_found();
    }

    let size = meta.len();
    let content_type = content_type_for(&full_path);

    let mut headers = HeaderMap::new();
    cors_headers(&mut headers);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    if let Ok(modified) = meta.modified() {
        if let Ok(value) = HeaderValue::from_str(&http_date(modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    // HEAD: headers only.
    if method == Method::HEAD {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        return (StatusCode::OK, headers).into_response();
    }

    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_range(v, size))
        .unwrap_or(RangeOutcome::Ignore);

    match range {
        RangeOutcome::Unsatisfiable => {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
        }
        RangeOutcome::Slice(start, end) => {
            let len = end - start + 1;
            let Ok(mut file) = tokio::fs::File::open(&full_path).await else {
                return not_found();
            };
            if file.seek(SeekFrom::Start(start)).await.is_err() {
                return not_found();
            }
            let stream = ReaderStream::new(file.take(len));
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{size}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            (
                StatusCode::PARTIAL_CONTENT,
                headers,
                Body::from_stream(stream),
            )
                .into_response()
        }
        RangeOutcome::Ignore => {
            let Ok(file) = tokio::fs::File::open(&full_path).await else {
                return not_found();
            };
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            (
                StatusCode::OK,
                headers,
                Body::from_stream(ReaderStream::new(file)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a/b.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a/b.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("a/b.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a/b")), "application/octet-stream");
    }

    #[test]
    fn test_traversal_rejected() {
        let root = Path::new("/srv/media");
        assert!(resolve_media_path(root, "locked/a.mp4").is_some());
        assert!(resolve_media_path(root, "../etc/passwd").is_none());
        assert!(resolve_media_path(root, "locked/../../etc/passwd").is_none());
        assert!(resolve_media_path(root, "/etc/passwd").is_none());
    }

    #[test]
    fn test_parse_range_basic() {
        assert_eq!(parse_range("bytes=0-499", 1000), RangeOutcome::Slice(0, 499));
        assert_eq!(parse_range("bytes=500-", 1000), RangeOutcome::Slice(500, 999));
        assert_eq!(parse_range("bytes=0-0", 1000), RangeOutcome::Slice(0, 0));
    }

    #[test]
    fn test_parse_range_end_clamped() {
        assert_eq!(
            parse_range("bytes=900-5000", 1000),
            RangeOutcome::Slice(900, 999)
        );
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("bytes=1000-", 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=5-2", 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-", 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_parse_range_last_byte() {
        // bytes=S-1- : the last byte of a file of size S
        assert_eq!(parse_range("bytes=999-", 1000), RangeOutcome::Slice(999, 999));
    }

    #[test]
    fn test_non_byte_units_ignored() {
        assert_eq!(parse_range("items=0-5", 1000), RangeOutcome::Ignore);
        assert_eq!(parse_range("garbage", 1000), RangeOutcome::Ignore);
    }
}
