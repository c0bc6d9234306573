//! Screen color-profile detector (spec §4.4.3): five HSV/statistical
//! metrics that together characterize the flattened color statistics of
//! a screen capture versus organic skin/scene lighting.

use std::sync::Arc;

use tracing::warn;

use super::SubDetectorResult;
use crate::domain::entities::ColorProfileOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::Image;

pub struct ScreenColorProfileDetector {
    image_ops: Arc<dyn ImageOps>,
}

impl ScreenColorProfileDetector {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn evaluate(&self, color_frame: &Image, gray_frame: &Image, options: &ColorProfileOptions) -> SubDetectorResult {
        if color_frame.channels() < 3 {
            return SubDetectorResult::not_ready("color profile requires a 3-channel frame");
        }

        let mean_saturation = mean_saturation(color_frame);
        let saturation_factor = if mean_saturation < options.max_mean_saturation { 1.0 } else { 0.0 };

        let correlation = mean_pairwise_correlation(color_frame);
        let correlation_factor = if correlation > options.min_channel_correlation { 1.0 } else { 0.0 };

        let entropy = grayscale_entropy(gray_frame);
        let entropy_factor = if entropy < options.max_entropy { 1.0 } else { 0.0 };

        let smoothness = match self.image_ops.laplacian_variance(gray_frame) {
            Ok(variance) => (-variance / 500.0).exp(),
            Err(err) => {
                warn!(error = %err, "color profile laplacian failed, defaulting smoothness neutral");
                0.5
            }
        };
        let smoothness_factor = if smoothness > options.min_gradient_smoothness { 1.0 } else { 0.0 };

        let uniformity = channel_sobel_uniformity(&self.image_ops, color_frame);
        let uniformity_factor = if uniformity > options.min_uniformity { 1.0 } else { 0.0 };

        let weighted = 0.25 * saturation_factor
            + 0.25 * correlation_factor
            + 0.20 * entropy_factor
            + 0.15 * smoothness_factor
            + 0.15 * uniformity_factor;

        SubDetectorResult {
            ready: true,
            is_screen_capture: weighted >= options.composite_threshold,
            confidence: weighted.clamp(0.0, 1.0).into(),
            details: format!(
                "saturation={mean_saturation:.2} correlation={correlation:.2} entropy={entropy:.2} smoothness={smoothness:.2} uniformity={uniformity:.2}"
            ),
        }
    }
}

fn mean_saturation(color_frame: &Image) -> f32 {
    let (w, h) = (color_frame.width(), color_frame.height());
    let mut sum = 0.0f32;
    let count = (w * h).max(1) as f32;
    for y in 0..h {
        for x in 0..w {
            let b = color_frame.sample(x, y, 0);
            let g = color_frame.sample(x, y, 1);
            let r = color_frame.sample(x, y, 2);
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            let sat = if max <= f32::EPSILON { 0.0 } else { (max - min) / max };
            sum += sat;
        }
    }
    sum / count
}

fn mean_pairwise_correlation(color_frame: &Image) -> f32 {
    let (w, h) = (color_frame.width(), color_frame.height());
    let n = (w * h) as usize;
    let mut b = Vec::with_capacity(n);
    let mut g = Vec::with_capacity(n);
    let mut r = Vec::with_capacity(n);
    for y in 0..h {
        for x in 0..w {
            b.push(color_frame.sample(x, y, 0));
            g.push(color_frame.sample(x, y, 1));
            r.push(color_frame.sample(x, y, 2));
        }
    }
    let bg = pearson(&b, &g);
    let br = pearson(&b, &r);
    let gr = pearson(&g, &r);
    (bg + br + gr) / 3.0
}

fn pearson(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f32>() / n as f32;
    let mean_b = b.iter().sum::<f32>() / n as f32;
    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= f32::EPSILON {
        1.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

fn grayscale_entropy(gray_frame: &Image) -> f32 {
    let mut histogram = [0u32; 256];
    let pixels = gray_frame.as_u8();
    let total = match pixels {
        Some(data) => {
            for &v in data {
                histogram[v as usize] += 1;
            }
            data.len() as f32
        }
        None => {
            let (w, h) = (gray_frame.width(), gray_frame.height());
            for y in 0..h {
                for x in 0..w {
                    let v = gray_frame.sample(x, y, 0).clamp(0.0, 255.0) as u8;
                    histogram[v as usize] += 1;
                }
            }
            (w * h) as f32
        }
    };
    if total <= 0.0 {
        return 0.0;
    }
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f32 / total;
            -p * p.log2()
        })
        .sum()
}

fn channel_sobel_uniformity(image_ops: &Arc<dyn ImageOps>, color_frame: &Image) -> f32 {
    let (w, h) = (color_frame.width(), color_frame.height());
    let mut coefficients = Vec::with_capacity(3);
    for c in 0..3 {
        let mut plane = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                plane.push(color_frame.sample(x, y, c) as u8);
            }
        }
        let plane_image = Image::new_u8(w, h, 1, plane);
        let magnitude = match image_ops.sobel_magnitude(&plane_image) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let values: Vec<f32> = (0..magnitude.height())
            .flat_map(|y| (0..magnitude.width()).map(move |x| (x, y)))
            .map(|(x, y)| magnitude.sample(x, y, 0))
            .collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        if mean <= f32::EPSILON {
            continue;
        }
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        coefficients.push(variance.sqrt() / mean);
    }
    if coefficients.is_empty() {
        return 0.0;
    }
    let mean_cv = coefficients.iter().sum::<f32>() / coefficients.len() as f32;
    (1.0 - mean_cv).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::imaging::DefaultImageOps;

    #[test]
    fn flat_gray_color_frame_has_near_zero_saturation() {
        let data = vec![150u8; 32 * 32 * 3];
        let color = Image::new_u8(32, 32, 3, data);
        assert!(mean_saturation(&color) < 0.01);
    }

    #[test]
    fn evaluate_returns_confidence_in_range() {
        let ops: Arc<dyn ImageOps> = Arc::new(DefaultImageOps::new());
        let detector = ScreenColorProfileDetector::new(ops);
        let color = Image::new_u8(32, 32, 3, vec![150u8; 32 * 32 * 3]);
        let gray = Image::new_u8(32, 32, 1, vec![150u8; 32 * 32]);
        let result = detector.evaluate(&color, &gray, &ColorProfileOptions::default());
        assert!(result.ready);
        assert!(result.confidence.value() >= 0.0 && result.confidence.value() <= 1.0);
    }
}
