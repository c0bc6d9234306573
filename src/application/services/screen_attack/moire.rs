//! Moiré detector: screen pixel-grid vs. camera-sensor-grid interference
//! via a high-pass filter, Hanning window and 2D DCT (spec §4.4.1).

use std::sync::Arc;

use tracing::warn;

use super::SubDetectorResult;
use crate::domain::entities::MoireOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::Image;

const AC_BAND: usize = 64;
const AC_SAMPLE_LINES: usize = 8;

pub struct MoireDetector {
    image_ops: Arc<dyn ImageOps>,
}

impl MoireDetector {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn evaluate(&self, gray_frame: &Image, options: &MoireOptions) -> SubDetectorResult {
        let downscaled = match self.downscale(gray_frame, options.max_dimension) {
            Ok(img) => img,
            Err(err) => {
                warn!(error = %err, "moire detector downscale failed");
                return SubDetectorResult::not_ready("downscale failed");
            }
        };

        // High-pass stand-in for the spec's 5x5 elliptical morphological
        // gradient: Sobel magnitude attenuates the same low-frequency
        // content a morphological gradient would, via the one edge
        // primitive ImageOps exposes.
        let high_pass = match self.image_ops.sobel_magnitude(&downscaled) {
            Ok(img) => img,
            Err(err) => {
                warn!(error = %err, "moire detector high-pass failed");
                return SubDetectorResult::not_ready("high-pass failed");
            }
        };

        let windowed = apply_hanning_window(&high_pass);

        let spectrum = match self.image_ops.dct_spectrum(&windowed) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "moire detector dct failed");
                return SubDetectorResult::not_ready("dct failed");
            }
        };

        let width = windowed.width() as usize;
        let (periodicity, directionality, peak_count) =
            analyze_ac_band(&spectrum, width, options.peak_ratio_over_mean, options.max_peaks_for_full_score);

        let auxiliary = canny_autocorrelation_bonus(&self.image_ops, &downscaled);

        let dct_layer = 0.6 * periodicity + 0.4 * directionality;
        let moire_strength = dct_layer * (1.0 - options.canny_weight) + auxiliary * options.canny_weight;

        let confidence = ((moire_strength - options.threshold).abs() / 0.35).clamp(0.0, 1.0);

        SubDetectorResult {
            ready: true,
            is_screen_capture: moire_strength > options.threshold,
            confidence: confidence.into(),
            details: format!("peaks={peak_count} periodicity={periodicity:.2} directionality={directionality:.2}"),
        }
    }

    fn downscale(&self, gray_frame: &Image, max_dimension: u32) -> Result<Image, crate::domain::ports::ImageOpsError> {
        if gray_frame.width() <= max_dimension && gray_frame.height() <= max_dimension {
            return self.image_ops.crop(
                gray_frame,
                crate::domain::value_objects::BoundingBox::new(
                    0,
                    0,
                    gray_frame.width() as i32,
                    gray_frame.height() as i32,
                ),
            );
        }
        let scale = max_dimension as f32 / gray_frame.width().max(gray_frame.height()) as f32;
        let new_w = ((gray_frame.width() as f32 * scale) as u32).max(1);
        let new_h = ((gray_frame.height() as f32 * scale) as u32).max(1);
        self.image_ops.resize(gray_frame, new_w, new_h)
    }
}

/// `w(y,x) = w_y * w_x`, `w_k = 0.54 - 0.46*cos(2*pi*k/(N-1))` (spec §4.4.1 step 3).
fn apply_hanning_window(image: &Image) -> Image {
    let (width, height) = (image.width(), image.height());
    let wx: Vec<f32> = (0..width).map(|k| hanning_term(k, width)).collect();
    let wy: Vec<f32> = (0..height).map(|k| hanning_term(k, height)).collect();

    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(image.sample(x, y, 0) * wx[x as usize] * wy[y as usize]);
        }
    }
    Image::new_f32(width, height, 1, data)
}

fn hanning_term(k: u32, n: u32) -> f32 {
    if n <= 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * std::f32::consts::PI * k as f32 / (n - 1) as f32).cos()
}

/// Finds peaks in the AC band `[1..64, 1..64]` where `|coef| > ratio * mean`,
/// then maps peak count and peak-radius dispersion to the two sub-scores.
fn analyze_ac_band(spectrum: &[f32], width: usize, ratio: f32, max_peaks: f32) -> (f32, f32, usize) {
    if width == 0 {
        return (0.0, 0.0, 0);
    }
    let band = AC_BAND.min(width);
    let mut coefficients = Vec::new();
    for y in 1..band {
        for x in 1..band {
            let idx = y * width + x;
            if idx < spectrum.len() {
                coefficients.push((x, y, spectrum[idx].abs()));
            }
        }
    }
    if coefficients.is_empty() {
        return (0.0, 0.0, 0);
    }

    let mean: f32 = coefficients.iter().map(|(_, _, v)| v).sum::<f32>() / coefficients.len() as f32;
    let threshold = ratio * mean;

    let peak_radii: Vec<f32> = coefficients
        .iter()
        .filter(|(_, _, v)| *v > threshold)
        .map(|(x, y, _)| ((*x as f32).powi(2) + (*y as f32).powi(2)).sqrt())
        .collect();

    let peak_count = peak_radii.len();
    let periodicity = (peak_count as f32 / max_peaks).min(1.0);

    let directionality = if peak_radii.len() >= 2 {
        let mean_radius = peak_radii.iter().sum::<f32>() / peak_radii.len() as f32;
        if mean_radius <= f32::EPSILON {
            0.0
        } else {
            let variance = peak_radii.iter().map(|r| (r - mean_radius).powi(2)).sum::<f32>()
                / peak_radii.len() as f32;
            (1.0 - variance.sqrt() / mean_radius).max(0.0)
        }
    } else {
        0.0
    };

    (periodicity, directionality, peak_count)
}

/// Optional Canny-edge auxiliary (spec §4.4.1 step 6): best-period
/// autocorrelation over `AC_SAMPLE_LINES` evenly-spaced rows and the same
/// number of columns (periods `5..min(len/4,100)` step 2), plus a
/// Sobel-angle circular-stddev direction-consistency term. The three are
/// weighted 0.4/0.4/0.2 into a `[0,1]` bonus folded into the directionality
/// term by the caller.
fn canny_autocorrelation_bonus(image_ops: &Arc<dyn ImageOps>, image: &Image) -> f32 {
    let edges = match image_ops.canny_edges(image, 50.0, 150.0) {
        Ok(e) => e,
        Err(_) => return 0.0,
    };

    let width = edges.width() as usize;
    let height = edges.height() as usize;
    if width < 10 || height < 10 {
        return 0.0;
    }

    let row_max_period = (width / 4).min(100);
    let row_score = sampled_lines(height, AC_SAMPLE_LINES)
        .into_iter()
        .map(|y| {
            let row: Vec<f32> = (0..width).map(|x| edges.sample(x as u32, y as u32, 0)).collect();
            best_autocorrelation(&row, 5, row_max_period)
        })
        .fold(0.0f32, f32::max);

    let col_max_period = (height / 4).min(100);
    let col_score = sampled_lines(width, AC_SAMPLE_LINES)
        .into_iter()
        .map(|x| {
            let col: Vec<f32> = (0..height).map(|y| edges.sample(x as u32, y as u32, 0)).collect();
            best_autocorrelation(&col, 5, col_max_period)
        })
        .fold(0.0f32, f32::max);

    let direction_consistency = match image_ops.sobel_angles(image) {
        Ok(angles) => sobel_angle_consistency(&angles),
        Err(_) => 0.0,
    };

    (row_score * 0.4 + col_score * 0.4 + direction_consistency * 0.2).clamp(0.0, 1.0)
}

/// `count` indices evenly spaced across `0..len` (at most `len` of them).
fn sampled_lines(len: usize, count: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let count = count.min(len);
    (0..count).map(|i| i * len / count).collect()
}

/// Circular standard deviation of Sobel gradient angles, doubled first
/// since a gradient and its 180-degree opposite describe the same edge
/// orientation. A screen's pixel grid concentrates edges around one or two
/// orientations, so low stddev (near 0) maps to high consistency.
fn sobel_angle_consistency(angles: &Image) -> f32 {
    let (width, height) = (angles.width(), angles.height());
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut sum_cos = 0.0f32;
    let mut sum_sin = 0.0f32;
    for y in 0..height {
        for x in 0..width {
            let doubled = 2.0 * angles.sample(x, y, 0);
            sum_cos += doubled.cos();
            sum_sin += doubled.sin();
        }
    }
    let n = (width * height) as f32;
    let resultant_length = ((sum_cos / n).powi(2) + (sum_sin / n).powi(2)).sqrt().clamp(1e-6, 1.0);
    let circular_stddev = (-2.0 * resultant_length.ln()).sqrt();

    (1.0 - circular_stddev / 2.0).clamp(0.0, 1.0)
}

fn best_autocorrelation(series: &[f32], min_period: usize, max_period: usize) -> f32 {
    if series.len() < min_period * 2 {
        return 0.0;
    }
    let mean = series.iter().sum::<f32>() / series.len() as f32;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / series.len() as f32;
    if variance <= f32::EPSILON {
        return 0.0;
    }

    let mut best = 0.0f32;
    let mut period = min_period;
    while period <= max_period.min(series.len() - 1) {
        let n = series.len() - period;
        if n == 0 {
            break;
        }
        let cov: f32 =
            (0..n).map(|i| (series[i] - mean) * (series[i + period] - mean)).sum::<f32>() / n as f32;
        let r = cov / variance;
        if r > best {
            best = r;
        }
        period += 2;
    }
    best.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::imaging::DefaultImageOps;

    #[test]
    fn uniform_gray_image_is_not_flagged() {
        let ops: Arc<dyn ImageOps> = Arc::new(DefaultImageOps::new());
        let detector = MoireDetector::new(ops);
        let image = Image::new_u8(128, 128, 1, vec![128; 128 * 128]);
        let result = detector.evaluate(&image, &MoireOptions::default());
        assert!(result.ready);
        assert!(!result.is_screen_capture);
    }

    #[test]
    fn sampled_lines_covers_full_span_and_respects_count() {
        assert_eq!(sampled_lines(0, 8), Vec::<usize>::new());
        let lines = sampled_lines(100, 8);
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], 0);
        assert!(*lines.last().unwrap() < 100);
        assert_eq!(sampled_lines(4, 8), vec![0, 1, 2, 3]);
    }

    #[test]
    fn sobel_angle_consistency_is_high_for_a_single_orientation() {
        // Every gradient points the same way (dx=0, dy=1): perfectly consistent.
        let angles = Image::new_f32(16, 16, 1, vec![std::f32::consts::FRAC_PI_2; 16 * 16]);
        assert!(sobel_angle_consistency(&angles) > 0.95);
    }

    #[test]
    fn sobel_angle_consistency_is_low_for_scattered_orientations() {
        let mut data = Vec::with_capacity(64 * 64);
        for i in 0..64 * 64 {
            // Spread angles across the full circle so doubled vectors cancel.
            data.push(-std::f32::consts::PI + (i as f32 % 64.0) / 64.0 * 2.0 * std::f32::consts::PI);
        }
        let angles = Image::new_f32(64, 64, 1, data);
        assert!(sobel_angle_consistency(&angles) < 0.3);
    }

    #[test]
    fn confidence_is_always_in_unit_range() {
        let ops: Arc<dyn ImageOps> = Arc::new(DefaultImageOps::new());
        let detector = MoireDetector::new(ops);
        let mut data = vec![0u8; 128 * 128];
        for (i, v) in data.iter_mut().enumerate() {
            *v = if i % 4 < 2 { 40 } else { 220 };
        }
        let image = Image::new_u8(128, 128, 1, data);
        let result = detector.evaluate(&image, &MoireOptions::default());
        assert!(result.confidence.value() >= 0.0 && result.confidence.value() <= 1.0);
    }
}
