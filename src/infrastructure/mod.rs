//! Infrastructure Layer
//!
//! Concrete implementations of the domain ports: the `config`/`dotenvy`
//! layered configuration loader, a monotonic `Clock`, the `image`/
//! `imageproc`-backed `ImageOps`/`JpegEncoder`, and the two
//! `FaceAnalyzer` backends (a deterministic synthetic one for tests and
//! demos, and a dedicated-thread bridge for a real non-`Send` model).

pub mod clock;
pub mod config;
pub mod face_analyzer;
pub mod imaging;
