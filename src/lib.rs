//! Passive, client-side face liveness and presentation-attack detection
//! engine.
//!
//! Re-exports the pieces a host embeds: the `Engine` facade, the
//! `EngineOptions` configuration record, the domain event/error
//! taxonomies, and the ports a host wires to concrete `ImageOps` /
//! `FaceAnalyzer` / `JpegEncoder` / `Clock` implementations.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::engine::Engine;
pub use application::services;
pub use domain::entities;
pub use domain::errors;
pub use domain::events;
pub use domain::ports;
pub use domain::value_objects;
pub use infrastructure::config::EngineConfig;
