//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the render and media endpoints
//! - Bearer-token authentication
//! - Timeline render handlers (video/image, preview/final)
//! - Range-aware media serving
//! - CORS middleware

pub mod auth;
pub mod handlers;
pub mod media;
pub mod routes;

pub use routes::create_router;
