//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `/ns/:ns/fields...` - Field reads, writes, deletes and TTLs within a namespace
//! - `/ns/:ns/batch`, `/ns/:ns/query` - Multi-field writes and reads
//! - `POST /ns/:ns/vacuum` - Reclaim expired fields
//! - `POST /ns/:ns/migrate` - Convert a namespace to native field expiration
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
