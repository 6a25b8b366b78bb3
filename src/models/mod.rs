//! Request and Response models for the tile cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP query strings and bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{Command, CommandRequest, FetchParams};
pub use responses::{CommandResponse, CommandStatus, HealthResponse, StatsResponse};
