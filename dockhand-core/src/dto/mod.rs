//! Data Transfer Objects
//!
//! Wire payloads exchanged with the container engine REST API and the CI
//! server. Field names follow the remote APIs, not Rust conventions.

pub mod ci;
pub mod engine;
