//! Value Objects
//!
//! Immutable domain objects defined by their attributes rather than identity.

mod action;
mod bounding_box;
mod face_observation;
mod frame_record;
mod image;
mod score;

pub use action::*;
pub use bounding_box::*;
pub use face_observation::*;
pub use frame_record::*;
pub use image::*;
pub use score::*;
