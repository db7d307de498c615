//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{GetManyRequest, SetManyRequest, SetRequest, VacuumRequest};
pub use responses::{
    DeleteResponse, FieldsResponse, GetManyResponse, GetResponse, HealthResponse,
    MigrateResponse, SetResponse, TtlResponse, VacuumResponse,
};
