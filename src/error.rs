use thiserror::Error;

/// Main error type for the render server.
///
/// Validation problems are the caller's fault; asset, engine, and storage
/// problems carry enough context to diagnose; timeouts are distinguished so
/// the HTTP layer can answer 504 instead of a generic 500.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset error for '{reference}': {message}")]
    Asset { reference: String, message: String },

    #[error("filter graph error: {0}")]
    GraphBuild(String),

    #[error("ffmpeg exited with status {status}: {stderr_tail}")]
    Engine { status: i32, stderr_tail: String },

    #[error("ffmpeg timed out after {0}s")]
    EngineTimeout(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Build a validation error for a specific track field.
    pub fn field(track_id: &str, message: impl std::fmt::Display) -> Self {
        RenderError::Validation(format!("track '{}': {}", track_id, message))
    }

    /// Build an asset error keeping the original reference intact.
    pub fn asset(reference: impl Into<String>, message: impl std::fmt::Display) -> Self {
        RenderError::Asset {
            reference: reference.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RenderError>;
