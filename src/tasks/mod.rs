//! Background Tasks Module
//!
//! Maintenance that runs around cache use rather than inside it.
//!
//! # Tasks
//! - Invocation maintenance: optional migration, then a bounded vacuum, before a cache
//!   handle is handed out
//! - Vacuum: reclaims expired fields of a namespace at configured intervals

mod maintenance;
mod vacuum;

pub use maintenance::{prepare_invocation, MaintenanceReport};
pub use vacuum::spawn_vacuum_task;
