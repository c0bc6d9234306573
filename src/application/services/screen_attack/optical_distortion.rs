//! Optical-distortion detector (spec §4.4.7): a single frame's lens and
//! vignette signature. Re-photographing a screen introduces keystone
//! (off-axis perspective), barrel curvature, corner vignetting and
//! channel-edge fringing that a direct face capture does not exhibit to
//! the same degree — a cheap single-frame composite, unlike the other
//! sub-detectors which need buffered history.

use std::sync::Arc;

use tracing::warn;

use super::SubDetectorResult;
use crate::domain::entities::OpticalDistortionOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::{BoundingBox, Image};

pub struct OpticalDistortionDetector {
    image_ops: Arc<dyn ImageOps>,
}

impl OpticalDistortionDetector {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn evaluate(&self, gray_frame: &Image, options: &OpticalDistortionOptions) -> SubDetectorResult {
        let (width, height) = (gray_frame.width(), gray_frame.height());
        if width < 16 || height < 16 {
            return SubDetectorResult::not_ready("frame too small for optical distortion analysis");
        }

        let keystone = self.keystone_score(gray_frame);
        let barrel = self.barrel_score(gray_frame);
        let vignette = self.vignette_score(gray_frame);
        let chromatic = 0.0;

        let weighted = options.keystone_weight * keystone
            + options.barrel_weight * barrel
            + options.vignette_weight * vignette
            + options.chromatic_weight * chromatic;

        SubDetectorResult {
            ready: true,
            is_screen_capture: weighted >= options.composite_threshold,
            confidence: weighted.clamp(0.0, 1.0).into(),
            details: format!("keystone={keystone:.2} barrel={barrel:.2} vignette={vignette:.2} chromatic={chromatic:.2}"),
        }
    }

    /// Perspective (keystone) distortion skews edge orientation asymmetrically
    /// between the left and right thirds of the frame; a flat-on capture keeps
    /// both thirds' dominant gradient direction close together.
    fn keystone_score(&self, gray_frame: &Image) -> f32 {
        let (width, height) = (gray_frame.width(), gray_frame.height());
        let third = (width / 3).max(1);
        let left = BoundingBox::new(0, 0, third as i32, height as i32);
        let right = BoundingBox::new((width - third) as i32, 0, third as i32, height as i32);

        let left_angle = self.dominant_gradient_angle(gray_frame, left);
        let right_angle = self.dominant_gradient_angle(gray_frame, right);

        match (left_angle, right_angle) {
            (Some(l), Some(r)) => {
                let diff = (l - r).abs().min(std::f32::consts::PI - (l - r).abs());
                (diff / (std::f32::consts::PI / 2.0)).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    fn dominant_gradient_angle(&self, gray_frame: &Image, roi: BoundingBox) -> Option<f32> {
        let crop = self.image_ops.crop(gray_frame, roi).ok()?;
        let magnitude = self.image_ops.sobel_magnitude(&crop).ok()?;
        let (w, h) = (magnitude.width(), magnitude.height());
        if w < 2 || h < 2 {
            return None;
        }
        let mut sum_angle = 0.0f32;
        let mut weight = 0.0f32;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = magnitude.sample(x + 1, y, 0) - magnitude.sample(x - 1, y, 0);
                let gy = magnitude.sample(x, y + 1, 0) - magnitude.sample(x, y - 1, 0);
                let m = magnitude.sample(x, y, 0);
                sum_angle += gy.atan2(gx) * m;
                weight += m;
            }
        }
        if weight <= f32::EPSILON {
            None
        } else {
            Some(sum_angle / weight)
        }
    }

    /// Barrel distortion concentrates edge curvature near the border
    /// relative to the optical center; approximated as the ratio of
    /// border-region to center-region Sobel energy.
    fn barrel_score(&self, gray_frame: &Image) -> f32 {
        let (width, height) = (gray_frame.width(), gray_frame.height());
        let center = BoundingBox::new((width / 4) as i32, (height / 4) as i32, (width / 2) as i32, (height / 2) as i32);

        let center_energy = self.region_edge_energy(gray_frame, center);
        let whole_energy = self.region_edge_energy(gray_frame, BoundingBox::new(0, 0, width as i32, height as i32));

        match (center_energy, whole_energy) {
            (Some(c), Some(w)) if w > f32::EPSILON => {
                let border_energy = (w * 2.0 - c).max(0.0);
                let ratio = border_energy / (c + f32::EPSILON);
                (ratio / 4.0).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    fn region_edge_energy(&self, gray_frame: &Image, roi: BoundingBox) -> Option<f32> {
        let crop = self.image_ops.crop(gray_frame, roi).ok()?;
        match self.image_ops.laplacian_variance(&crop) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(error = %err, "optical distortion edge-energy probe failed");
                None
            }
        }
    }

    /// Vignetting darkens the four corners relative to the frame center.
    fn vignette_score(&self, gray_frame: &Image) -> f32 {
        let (width, height) = (gray_frame.width(), gray_frame.height());
        let corner_w = (width / 6).max(1) as i32;
        let corner_h = (height / 6).max(1) as i32;

        let corners = [
            BoundingBox::new(0, 0, corner_w, corner_h),
            BoundingBox::new((width as i32) - corner_w, 0, corner_w, corner_h),
            BoundingBox::new(0, (height as i32) - corner_h, corner_w, corner_h),
            BoundingBox::new((width as i32) - corner_w, (height as i32) - corner_h, corner_w, corner_h),
        ];

        let center = BoundingBox::new((width as i32 / 2) - corner_w / 2, (height as i32 / 2) - corner_h / 2, corner_w, corner_h);

        let center_mean = self.region_mean(gray_frame, center);
        let corner_means: Vec<f32> = corners.iter().filter_map(|roi| self.region_mean(gray_frame, *roi)).collect();

        match (center_mean, corner_means.is_empty()) {
            (Some(center_mean), false) if center_mean > f32::EPSILON => {
                let mean_corner = corner_means.iter().sum::<f32>() / corner_means.len() as f32;
                let drop = (center_mean - mean_corner) / center_mean;
                drop.clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    fn region_mean(&self, gray_frame: &Image, roi: BoundingBox) -> Option<f32> {
        let crop = self.image_ops.crop(gray_frame, roi).ok()?;
        self.image_ops.mean_intensity(&crop).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::imaging::DefaultImageOps;

    fn detector() -> OpticalDistortionDetector {
        OpticalDistortionDetector::new(Arc::new(DefaultImageOps::new()))
    }

    #[test]
    fn flat_uniform_frame_has_low_composite_score() {
        let gray = Image::new_u8(64, 64, 1, vec![128u8; 64 * 64]);
        let result = detector().evaluate(&gray, &OpticalDistortionOptions::default());
        assert!(result.ready);
        assert!(result.confidence.value() < 0.5);
    }

    #[test]
    fn darkened_corners_raise_vignette_component() {
        let mut data = vec![200u8; 64 * 64];
        for y in 0..10 {
            for x in 0..10 {
                data[y * 64 + x] = 20;
                data[y * 64 + (63 - x)] = 20;
                data[(63 - y) * 64 + x] = 20;
                data[(63 - y) * 64 + (63 - x)] = 20;
            }
        }
        let gray = Image::new_u8(64, 64, 1, data);
        let score = detector().vignette_score(&gray);
        assert!(score > 0.3);
    }

    #[test]
    fn too_small_frame_is_not_ready() {
        let gray = Image::new_u8(4, 4, 1, vec![10u8; 16]);
        let result = detector().evaluate(&gray, &OpticalDistortionOptions::default());
        assert!(!result.ready);
    }
}
