//! Response-time (e-ink) detector (spec §4.4.5): electrophoretic displays
//! settle over ~100-500 ms after a brightness change, far slower than a
//! camera frame interval — an artifact a live face's continuous motion
//! never produces.

use super::SubDetectorResult;
use crate::domain::entities::ResponseTimeOptions;
use crate::domain::value_objects::Image;

pub struct ResponseTimeDetector;

impl ResponseTimeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, gray_history: &[&Image], average_fps: f32, options: &ResponseTimeOptions) -> SubDetectorResult {
        if gray_history.len() < 10 {
            return SubDetectorResult::not_ready("response-time needs >=10 buffered frames");
        }
        if average_fps <= 0.0 {
            return SubDetectorResult::not_ready("fps unavailable");
        }

        let frame_interval_ms = 1000.0 / average_fps;
        let (width, height) = (gray_history[0].width(), gray_history[0].height());
        let stride = if (width * height) > 200_000 { 4 } else { 2 };

        let mut settling_pixels = 0usize;
        let mut total_candidates = 0usize;

        let mut y = 0u32;
        while y < height {
            let mut x = 0u32;
            while x < width {
                let series: Vec<f32> = gray_history.iter().map(|frame| frame.sample(x, y, 0)).collect();
                if let Some(settle_frames) = settling_time(&series, options.brightness_delta_threshold) {
                    total_candidates += 1;
                    let settle_ms = settle_frames as f32 * frame_interval_ms;
                    if settle_ms >= options.settle_threshold_ms {
                        settling_pixels += 1;
                    }
                }
                x += stride;
            }
            y += stride;
        }

        if total_candidates == 0 {
            return SubDetectorResult {
                ready: true,
                is_screen_capture: false,
                confidence: 0.0.into(),
                details: "no brightness-change candidates observed".to_string(),
            };
        }

        let settling_fraction = settling_pixels as f32 / total_candidates as f32;

        SubDetectorResult {
            ready: true,
            is_screen_capture: settling_fraction >= options.min_settling_pixel_fraction,
            confidence: settling_fraction.clamp(0.0, 1.0).into(),
            details: format!("settling_fraction={settling_fraction:.2} candidates={total_candidates}"),
        }
    }
}

impl Default for ResponseTimeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the first large brightness jump and counts how many subsequent
/// frames it takes for the pixel to settle back within a small band of
/// its post-jump value. Returns `None` if no qualifying jump occurred.
fn settling_time(series: &[f32], delta_threshold: f32) -> Option<usize> {
    for i in 1..series.len() {
        let delta = (series[i] - series[i - 1]).abs();
        if delta >= delta_threshold {
            let target = series[i];
            let band = delta_threshold * 0.15;
            for (offset, value) in series.iter().enumerate().skip(i) {
                if (value - target).abs() <= band {
                    return Some(offset - i);
                }
            }
            return Some(series.len() - i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: u8) -> Image {
        Image::new_u8(4, 4, 1, vec![value; 16])
    }

    #[test]
    fn instant_transitions_are_not_flagged() {
        let detector = ResponseTimeDetector::new();
        let frames: Vec<Image> = (0..12).map(|i| frame(if i % 2 == 0 { 50 } else { 200 })).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let result = detector.evaluate(&refs, 30.0, &ResponseTimeOptions::default());
        assert!(result.ready);
        assert!(!result.is_screen_capture);
    }

    #[test]
    fn slow_settling_transition_is_flagged() {
        let detector = ResponseTimeDetector::new();
        let mut values = vec![50u8; 6];
        values.extend(vec![200u8; 6]);
        let frames: Vec<Image> = values.into_iter().map(frame).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let result = detector.evaluate(&refs, 5.0, &ResponseTimeOptions::default());
        assert!(result.ready);
        assert!(result.is_screen_capture);
    }
}
