//! Repository layer
//!
//! Traits over the two remote systems a run talks to. The HTTP clients from
//! `dockhand-client` implement them directly; tests swap in recording fakes.

mod ci;
mod engine;
#[cfg(test)]
pub(crate) mod fake;

pub use ci::CiRepository;
pub use engine::EngineRepository;
