//! Quality Scorer (spec §4.3).
//!
//! Two sub-scores, combined 50/50: face completeness within the frame,
//! and sharpness (Laplacian variance) inside a padded face ROI. A
//! `PrimitiveError` from `ImageOps` defaults sharpness to 1.0 rather than
//! penalizing an otherwise good frame (spec: "to avoid false rejects").
//!
//! `QualityOptions` drives both sub-scores: `min_laplacian_variance` is the
//! divisor that turns a raw Laplacian variance into a `[0,1]` sharpness
//! score, `min_blur_score` is the threshold below which sharpness earns a
//! reason, and `require_full_face_in_bounds` tightens the completeness bar
//! from "mostly in frame" (0.8) to "not clipped at all" (1.0).

use std::sync::Arc;

use tracing::warn;

use crate::domain::entities::QualityOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::{BoundingBox, FaceObservation, Image, Score};

const COMPLETENESS_REASON_THRESHOLD: f32 = 0.8;
const PASS_THRESHOLD: f32 = 0.8;
const ROI_PADDING_FRACTION: f32 = 0.10;

#[derive(Debug, Clone)]
pub struct QualityResult {
    pub completeness: Score,
    pub sharpness: Score,
    pub combined: Score,
    pub passed: bool,
    pub reasons: Vec<String>,
}

pub struct QualityScorer {
    image_ops: Arc<dyn ImageOps>,
}

impl QualityScorer {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn score(
        &self,
        face: &FaceObservation,
        gray_frame: &Image,
        options: &QualityOptions,
    ) -> QualityResult {
        let mut reasons = Vec::new();

        let completeness = Score::new(
            face.bbox.completeness_ratio(gray_frame.width() as i32, gray_frame.height() as i32),
        );
        // `require_full_face_in_bounds` tightens the completeness bar from the
        // ordinary 0.8 reason threshold to "no clipping at all".
        let completeness_threshold =
            if options.require_full_face_in_bounds { 1.0 } else { COMPLETENESS_REASON_THRESHOLD };
        if completeness.value() < completeness_threshold {
            reasons.push(format!(
                "face completeness {:.2} below {:.2}",
                completeness.value(),
                completeness_threshold
            ));
        }

        let sharpness = self.sharpness(face, gray_frame, options);
        if sharpness.value() < options.min_blur_score {
            reasons.push(format!(
                "sharpness {:.2} below {:.2}",
                sharpness.value(),
                options.min_blur_score
            ));
        }

        let combined = Score::new(completeness.value() * 0.5 + sharpness.value() * 0.5);
        let passed = combined.value() >= PASS_THRESHOLD;

        QualityResult { completeness, sharpness, combined, passed, reasons }
    }

    fn sharpness(&self, face: &FaceObservation, gray_frame: &Image, options: &QualityOptions) -> Score {
        let pad = (face.bbox.width().min(face.bbox.height()) as f32 * ROI_PADDING_FRACTION) as i32;
        let padded = BoundingBox::new(
            face.bbox.x() - pad,
            face.bbox.y() - pad,
            face.bbox.width() + pad * 2,
            face.bbox.height() + pad * 2,
        )
        .clip_to(gray_frame.width() as i32, gray_frame.height() as i32);

        if padded.area() <= 0 {
            return Score::ONE;
        }

        let result = self
            .image_ops
            .crop(gray_frame, padded)
            .and_then(|roi| self.image_ops.laplacian_variance(&roi));

        match result {
            Ok(variance) => Score::new(variance / options.min_laplacian_variance),
            Err(err) => {
                warn!(error = %err, "sharpness defaulted to neutral after ImageOps failure");
                Score::ONE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ImageOpsError;

    struct FixedVarianceOps(f32);
    impl ImageOps for FixedVarianceOps {
        fn to_grayscale(&self, image: &Image) -> Result<Image, ImageOpsError> {
            Ok(image.to_owned_copy())
        }
        fn resize(&self, image: &Image, _w: u32, _h: u32) -> Result<Image, ImageOpsError> {
            Ok(image.to_owned_copy())
        }
        fn crop(&self, image: &Image, _roi: BoundingBox) -> Result<Image, ImageOpsError> {
            Ok(image.to_owned_copy())
        }
        fn sobel_magnitude(&self, image: &Image) -> Result<Image, ImageOpsError> {
            Ok(image.to_owned_copy())
        }
        fn sobel_angles(&self, image: &Image) -> Result<Image, ImageOpsError> {
            Ok(Image::new_f32(image.width(), image.height(), 1, vec![0.0; (image.width() * image.height()) as usize]))
        }
        fn canny_edges(&self, image: &Image, _lo: f32, _hi: f32) -> Result<Image, ImageOpsError> {
            Ok(image.to_owned_copy())
        }
        fn dct_spectrum(&self, image: &Image) -> Result<Vec<f32>, ImageOpsError> {
            Ok(vec![0.0; (image.width() * image.height()) as usize])
        }
        fn laplacian_variance(&self, _image: &Image) -> Result<f32, ImageOpsError> {
            Ok(self.0)
        }
        fn mean_intensity(&self, _image: &Image) -> Result<f32, ImageOpsError> {
            Ok(0.0)
        }
    }

    fn frame() -> Image {
        Image::new_u8(200, 200, 1, vec![100; 40_000])
    }

    #[test]
    fn sharp_centered_face_passes() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(400.0)));
        let face = FaceObservation::new(BoundingBox::new(50, 50, 100, 100));
        let result = scorer.score(&face, &frame(), &QualityOptions::default());
        assert!(result.passed);
        assert!((result.sharpness.value() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn clipped_face_lowers_completeness_and_fails() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(400.0)));
        let face = FaceObservation::new(BoundingBox::new(180, 50, 100, 100));
        let result = scorer.score(&face, &frame(), &QualityOptions::default());
        assert!(result.completeness.value() < 0.8);
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn low_sharpness_reported_as_reason() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(20.0)));
        let face = FaceObservation::new(BoundingBox::new(50, 50, 100, 100));
        let result = scorer.score(&face, &frame(), &QualityOptions::default());
        assert!(result.sharpness.value() < 0.6);
        assert!(!result.passed);
    }

    #[test]
    fn raising_min_laplacian_variance_lowers_sharpness() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(400.0)));
        let face = FaceObservation::new(BoundingBox::new(50, 50, 100, 100));
        let mut options = QualityOptions::default();
        options.min_laplacian_variance = 800.0;
        let result = scorer.score(&face, &frame(), &options);
        assert!((result.sharpness.value() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn raising_min_blur_score_flags_previously_fine_sharpness() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(400.0)));
        let face = FaceObservation::new(BoundingBox::new(50, 50, 100, 100));
        let mut options = QualityOptions::default();
        options.min_blur_score = 0.999;
        let result = scorer.score(&face, &frame(), &options);
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn require_full_face_in_bounds_flags_any_clipping() {
        let scorer = QualityScorer::new(Arc::new(FixedVarianceOps(400.0)));
        // Box is clipped by one pixel column (completeness 0.99), well
        // above the lenient 0.8 threshold, so only the strict "fully in
        // bounds" rule should flag it.
        let face = FaceObservation::new(BoundingBox::new(101, 50, 100, 100));
        let lenient = QualityOptions { require_full_face_in_bounds: false, ..QualityOptions::default() };
        let strict = QualityOptions { require_full_face_in_bounds: true, ..QualityOptions::default() };

        let lenient_result = scorer.score(&face, &frame(), &lenient);
        let strict_result = scorer.score(&face, &frame(), &strict);

        assert!(lenient_result.completeness.value() >= 0.8);
        assert!(lenient_result.reasons.is_empty());
        assert!(!strict_result.reasons.is_empty());
    }
}
