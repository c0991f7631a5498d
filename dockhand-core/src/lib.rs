//! Dockhand Core
//!
//! Core types and abstractions for the Dockhand image qualification pipeline.
//!
//! This crate contains:
//! - Domain types: images, registry credentials, containers, CI labels and jobs
//! - Registry auth codec: the token the engine expects on pull/push
//! - DTOs: wire payloads exchanged with the container engine and the CI server

pub mod auth;
pub mod domain;
pub mod dto;
pub mod error;

pub use error::{CoreError, Result};
