//! Core domain types
//!
//! These types describe the entities the pipeline reasons about. They are
//! shared between the HTTP clients (which produce them from wire payloads)
//! and the runner (which drives the pipeline stages over them).

pub mod ci;
pub mod container;
pub mod credential;
pub mod image;
