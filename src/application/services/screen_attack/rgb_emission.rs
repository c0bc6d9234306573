//! RGB emission-profile detector (spec §4.4.2): screens emit their own
//! light through an RGB sub-pixel grid, leaving a distinctive low-frequency
//! energy signature and per-channel asymmetry that a reflectance-lit real
//! face does not.

use std::sync::Arc;

use tracing::warn;

use super::SubDetectorResult;
use crate::domain::entities::RgbEmissionOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::Image;

pub struct RgbEmissionDetector {
    image_ops: Arc<dyn ImageOps>,
}

impl RgbEmissionDetector {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn evaluate(&self, color_frame: &Image, options: &RgbEmissionOptions) -> SubDetectorResult {
        if color_frame.channels() < 3 {
            return SubDetectorResult::not_ready("rgb emission requires a 3-channel frame");
        }

        let channels = match extract_channel_planes(color_frame) {
            Some(c) => c,
            None => return SubDetectorResult::not_ready("channel plane extraction failed"),
        };

        let mut energies = [0.0f32; 3];
        let mut means = [0.0f32; 3];
        for (i, plane) in channels.iter().enumerate() {
            means[i] = plane.iter().sum::<f32>() / plane.len().max(1) as f32;
            energies[i] = match self.low_frequency_energy(plane, color_frame.width(), color_frame.height(), options) {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "rgb emission dct failed");
                    return SubDetectorResult::not_ready("dct failed");
                }
            };
        }

        let total_energy: f32 = energies.iter().sum::<f32>().max(f32::EPSILON);
        let energy_ratio_spread = {
            let max_e = energies.iter().cloned().fold(0.0f32, f32::max);
            let min_e = energies.iter().cloned().fold(f32::MAX, f32::min);
            (max_e - min_e) / total_energy
        };

        let channel_asymmetry = {
            let max_m = means.iter().cloned().fold(0.0f32, f32::max);
            let min_m = means.iter().cloned().fold(f32::MAX, f32::min);
            ((max_m - min_m) / 255.0).clamp(0.0, 1.0)
        };

        let channel_mean_diff = ((means[2] - means[0]).abs() + (means[2] - means[1]).abs()
            + (means[0] - means[1]).abs())
            / (3.0 * 255.0);

        let weighted = 0.5 * energy_ratio_spread.clamp(0.0, 1.0)
            + 0.3 * channel_asymmetry
            + 0.2 * channel_mean_diff.clamp(0.0, 1.0);

        SubDetectorResult {
            ready: true,
            is_screen_capture: weighted > options.confidence_threshold,
            confidence: weighted.clamp(0.0, 1.0).into(),
            details: format!(
                "energy_spread={energy_ratio_spread:.2} asymmetry={channel_asymmetry:.2} mean_diff={channel_mean_diff:.2}"
            ),
        }
    }

    fn low_frequency_energy(
        &self,
        plane: &[f32],
        width: u32,
        height: u32,
        options: &RgbEmissionOptions,
    ) -> Result<f32, crate::domain::ports::ImageOpsError> {
        let image = Image::new_f32(width, height, 1, plane.to_vec());
        let spectrum = self.image_ops.dct_spectrum(&image)?;
        let w = width as usize;
        let h = height as usize;
        let start = (w.min(h) as f32 * options.low_freq_band_start_pct) as usize;
        let end = (w.min(h) as f32 * options.low_freq_band_end_pct) as usize;
        let mut sum = 0.0f32;
        for y in start..end.min(h) {
            for x in start..end.min(w) {
                let idx = y * w + x;
                if idx < spectrum.len() {
                    sum += spectrum[idx].abs();
                }
            }
        }
        Ok(sum)
    }
}

fn extract_channel_planes(color_frame: &Image) -> Option<[Vec<f32>; 3]> {
    let (w, h) = (color_frame.width(), color_frame.height());
    let mut r = Vec::with_capacity((w * h) as usize);
    let mut g = Vec::with_capacity((w * h) as usize);
    let mut b = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            r.push(color_frame.sample(x, y, 0));
            g.push(color_frame.sample(x, y, 1));
            b.push(color_frame.sample(x, y, 2));
        }
    }
    Some([b, g, r])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::imaging::DefaultImageOps;

    #[test]
    fn neutral_gray_color_frame_scores_low() {
        let ops: Arc<dyn ImageOps> = Arc::new(DefaultImageOps::new());
        let detector = RgbEmissionDetector::new(ops);
        let data = vec![128u8; 64 * 64 * 3];
        let image = Image::new_u8(64, 64, 3, data);
        let result = detector.evaluate(&image, &RgbEmissionOptions::default());
        assert!(result.ready);
        assert!(result.confidence.value() <= 1.0);
    }

    #[test]
    fn grayscale_frame_is_not_ready() {
        let ops: Arc<dyn ImageOps> = Arc::new(DefaultImageOps::new());
        let detector = RgbEmissionDetector::new(ops);
        let image = Image::new_u8(64, 64, 1, vec![100; 64 * 64]);
        let result = detector.evaluate(&image, &RgbEmissionOptions::default());
        assert!(!result.ready);
    }
}
