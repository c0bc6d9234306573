//! Flicker detector (spec §4.4.4): LCD/OLED panels refresh at a fixed
//! rate invisible to the eye but present as periodic per-pixel brightness
//! autocorrelation across buffered frames.

use super::SubDetectorResult;
use crate::domain::entities::FlickerOptions;
use crate::domain::value_objects::Image;

pub struct FlickerDetector;

impl FlickerDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, gray_history: &[&Image], average_fps: f32, options: &FlickerOptions) -> SubDetectorResult {
        if gray_history.len() < 5 {
            return SubDetectorResult::not_ready("flicker needs >=5 buffered frames");
        }

        let (width, height) = (gray_history[0].width(), gray_history[0].height());
        let pixel_count = (width * height) as usize;
        let stride = stride_for_resolution(pixel_count);

        let effective_max_period = effective_max_period(average_fps, options.config_max_period);
        if effective_max_period <= options.min_period {
            return SubDetectorResult::not_ready("fps too low for a meaningful flicker window");
        }

        let mut sampled = 0usize;
        let mut passing = 0usize;
        let mut lag_votes = vec![0usize; effective_max_period + 1];

        let mut y = 0u32;
        while y < height {
            let mut x = 0u32;
            while x < width {
                let series: Vec<f32> = gray_history.iter().map(|frame| frame.sample(x, y, 0)).collect();
                sampled += 1;
                if let Some((lag, r)) = best_lag(&series, options.min_period, effective_max_period) {
                    if r >= options.correlation_threshold {
                        passing += 1;
                        lag_votes[lag] += 1;
                    }
                }
                x += stride;
            }
            y += stride;
        }

        if sampled == 0 {
            return SubDetectorResult::not_ready("no pixels sampled");
        }

        let passing_ratio = passing as f32 / sampled as f32;
        let adaptive_threshold = adaptive_passing_threshold(pixel_count);
        let dominant_lag = lag_votes.iter().enumerate().max_by_key(|(_, &count)| count).map(|(lag, _)| lag).unwrap_or(0);

        let estimated_refresh = if dominant_lag > 0 && average_fps > 0.0 {
            average_fps / dominant_lag as f32
        } else {
            0.0
        };

        SubDetectorResult {
            ready: true,
            is_screen_capture: passing_ratio >= adaptive_threshold,
            confidence: passing_ratio.clamp(0.0, 1.0).into(),
            details: format!(
                "passing_ratio={passing_ratio:.2} dominant_lag={dominant_lag} estimated_refresh_hz={estimated_refresh:.1}"
            ),
        }
    }
}

impl Default for FlickerDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn stride_for_resolution(pixel_count: usize) -> u32 {
    if pixel_count < 100_000 {
        1
    } else if pixel_count < 500_000 {
        2
    } else {
        3
    }
}

fn effective_max_period(average_fps: f32, config_max: usize) -> usize {
    if average_fps >= 50.0 {
        3
    } else if average_fps >= 30.0 {
        4
    } else if average_fps >= 15.0 {
        8
    } else {
        config_max
    }
}

fn adaptive_passing_threshold(pixel_count: usize) -> f32 {
    if pixel_count < 100_000 {
        0.35
    } else if pixel_count < 500_000 {
        0.38
    } else {
        0.42
    }
}

/// `r[k] = cov(s, s_shifted_k) / var(s)`; returns the best `(lag, r)` pair
/// in `[min_period, max_period]`.
fn best_lag(series: &[f32], min_period: usize, max_period: usize) -> Option<(usize, f32)> {
    if series.len() <= max_period {
        return None;
    }
    let mean = series.iter().sum::<f32>() / series.len() as f32;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / series.len() as f32;
    if variance <= f32::EPSILON {
        return None;
    }

    let mut best: Option<(usize, f32)> = None;
    for lag in min_period..=max_period {
        let n = series.len() - lag;
        if n == 0 {
            continue;
        }
        let cov: f32 = (0..n).map(|i| (series[i] - mean) * (series[i + lag] - mean)).sum::<f32>() / n as f32;
        let r = cov / variance;
        if best.map_or(true, |(_, best_r)| r > best_r) {
            best = Some((lag, r));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_brightness(value: u8) -> Image {
        Image::new_u8(4, 4, 1, vec![value; 16])
    }

    #[test]
    fn constant_brightness_series_is_not_flagged() {
        let detector = FlickerDetector::new();
        let frames: Vec<Image> = (0..10).map(|_| frame_with_brightness(128)).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let result = detector.evaluate(&refs, 30.0, &FlickerOptions::default());
        assert!(result.ready);
        assert!(!result.is_screen_capture);
    }

    #[test]
    fn periodic_brightness_is_flagged() {
        let detector = FlickerDetector::new();
        let frames: Vec<Image> = (0..30).map(|i| frame_with_brightness(if i % 3 == 0 { 200 } else { 50 })).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let options = FlickerOptions { min_period: 2, correlation_threshold: 0.5, config_max_period: 12 };
        let result = detector.evaluate(&refs, 60.0, &options);
        assert!(result.ready);
        assert!(result.is_screen_capture);
    }

    #[test]
    fn insufficient_history_is_not_ready() {
        let detector = FlickerDetector::new();
        let frames: Vec<Image> = (0..2).map(|_| frame_with_brightness(128)).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let result = detector.evaluate(&refs, 30.0, &FlickerOptions::default());
        assert!(!result.ready);
    }
}
