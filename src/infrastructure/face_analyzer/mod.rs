//! `FaceAnalyzer` adapters.
//!
//! The face/landmark model itself is deliberately out of scope for this
//! engine — it is the one collaborator the spec treats as opaque. This
//! module ships the *bridging* infrastructure a concrete backend plugs
//! into: a dedicated-thread adapter for non-`Send` detectors (the same
//! shape as the teacher's rustface bridge), plus a synthetic analyzer
//! used by the demo binary and integration tests when no real model is
//! wired in.

mod synthetic;
mod threaded;

pub use synthetic::SyntheticFaceAnalyzer;
pub use threaded::{FaceDetectionBackend, ThreadedFaceAnalyzer};
