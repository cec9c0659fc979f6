//! HTTP API for the vaccination card assistant.
//!
//! JSON over HTTP, all routes nested under `/api/`. One session per user;
//! the card upload and chat endpoints run the blocking pipeline on the
//! tokio blocking pool.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
