//! Application Layer
//!
//! Orchestrates domain entities and infrastructure ports: the scorers
//! and detectors, the frame ring buffer, the event bus, the detection
//! state machine, and the `Engine` facade that wires them into the
//! single cooperative per-frame loop.

pub mod engine;
pub mod services;
pub mod state_machine;
