//! A deterministic `FaceAnalyzer` stand-in for the demo binary and
//! integration tests, used when no real face/mesh model is wired in.
//! Reports a single centered face box sized relative to the frame, with
//! neutral rotation and an optimistic real/live score — enough to drive
//! the state machine end to end without an ML dependency.

use async_trait::async_trait;

use crate::domain::ports::{FaceAnalyzer, FaceAnalyzerError};
use crate::domain::value_objects::{BoundingBox, FaceObservation, FrameRecord, Rotation};

pub struct SyntheticFaceAnalyzer {
    face_fraction: f32,
}

impl SyntheticFaceAnalyzer {
    pub fn new() -> Self {
        Self { face_fraction: 0.6 }
    }

    pub fn with_face_fraction(face_fraction: f32) -> Self {
        Self { face_fraction: face_fraction.clamp(0.05, 1.0) }
    }
}

impl Default for SyntheticFaceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceAnalyzer for SyntheticFaceAnalyzer {
    async fn analyze(&self, frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError> {
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return Err(FaceAnalyzerError::Backend("empty frame".to_string()));
        }

        let face_w = (w as f32 * self.face_fraction) as i32;
        let face_h = (h as f32 * self.face_fraction) as i32;
        let x = (w as i32 - face_w) / 2;
        let y = (h as i32 - face_h) / 2;

        let observation = FaceObservation::new(BoundingBox::new(x, y, face_w, face_h))
            .with_rotation(Rotation::default())
            .with_scores(0.95, 0.95);

        Ok(vec![observation])
    }
}
