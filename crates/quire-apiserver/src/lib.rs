//! Quire API Server - RPC endpoint for the versioning engine
//!
//! This crate provides:
//! - Axum-based HTTP server with health endpoints
//! - `POST /rpc` dispatching versioning calls to the engine
//! - Mapping of versioning errors to HTTP status and structured bodies
//! - An in-process transport running the same dispatcher

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use error::{ApiError, Result};
pub use handlers::dispatch;
pub use server::{ApiServer, Config, DEFAULT_PORT};
pub use state::AppState;
pub use transport::LocalTransport;
