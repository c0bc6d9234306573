//! DLP color-wheel detector (spec §4.4.6): single-chip DLP projectors
//! sequence R/G/B through a spinning color wheel, leaving a small but
//! temporally stable chromatic offset at strong edges that a camera
//! sensor capturing a real face never produces.

use std::sync::Arc;

use super::SubDetectorResult;
use crate::domain::entities::DlpOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::Image;
use crate::infrastructure::imaging::DefaultImageOps;

pub struct DlpColorWheelDetector {
    image_ops: Arc<dyn ImageOps>,
}

impl DlpColorWheelDetector {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn evaluate(&self, color_history: &[&Image], options: &DlpOptions) -> SubDetectorResult {
        if color_history.len() < 3 {
            return SubDetectorResult::not_ready("dlp needs >=3 buffered color frames");
        }

        let separations: Vec<f32> =
            color_history.iter().filter_map(|frame| self.edge_channel_separation(frame)).collect();

        if separations.is_empty() {
            return SubDetectorResult::not_ready("no strong edges found for channel-offset measurement");
        }

        let mean_separation = separations.iter().sum::<f32>() / separations.len() as f32;
        let temporal_stability = stability(&separations);

        let is_screen_capture =
            mean_separation >= options.min_edge_separation_px && temporal_stability >= options.min_temporal_stability;

        let confidence = ((mean_separation / (options.min_edge_separation_px * 2.0)).min(1.0) * 0.5
            + temporal_stability * 0.5)
            .clamp(0.0, 1.0);

        SubDetectorResult {
            ready: true,
            is_screen_capture,
            confidence: confidence.into(),
            details: format!("mean_separation_px={mean_separation:.2} stability={temporal_stability:.2}"),
        }
    }

    /// Finds the strongest vertical edge row in the green channel (via
    /// Canny), then measures how far the same edge appears in the red and
    /// blue channels — the DLP color-wheel's characteristic offset.
    fn edge_channel_separation(&self, color_frame: &Image) -> Option<f32> {
        let (w, h) = (color_frame.width(), color_frame.height());
        if w < 8 || h < 8 {
            return None;
        }

        let planes = [plane(color_frame, 2), plane(color_frame, 1), plane(color_frame, 0)];
        let edges: Vec<Option<usize>> = planes
            .iter()
            .map(|plane_image| self.image_ops.canny_edges(plane_image, 50.0, 150.0).ok())
            .map(|edges| edges.and_then(|e| strongest_edge_column(&e)))
            .collect();

        let r = edges[0]?;
        let g = edges[1]?;
        let b = edges[2]?;

        let offsets = [(r as f32 - g as f32).abs(), (b as f32 - g as f32).abs()];
        Some(offsets.iter().cloned().fold(0.0f32, f32::max))
    }
}

fn plane(color_frame: &Image, channel: u8) -> Image {
    let (w, h) = (color_frame.width(), color_frame.height());
    let mut data = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            data.push(color_frame.sample(x, y, channel) as u8);
        }
    }
    Image::new_u8(w, h, 1, data)
}

/// Column index of the strongest vertical edge response in the middle row.
fn strongest_edge_column(edges: &Image) -> Option<usize> {
    let mid_row = edges.height() / 2;
    let width = edges.width();
    if width == 0 {
        return None;
    }
    (0..width)
        .map(|x| (x, edges.sample(x, mid_row, 0)))
        .filter(|(_, v)| *v > 0.0)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(x, _)| x as usize)
}

fn stability(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    if mean <= f32::EPSILON {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

impl Default for DlpColorWheelDetector {
    fn default() -> Self {
        Self::new(Arc::new(DefaultImageOps::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_color_frames_are_not_flagged() {
        let detector = DlpColorWheelDetector::default();
        let frames: Vec<Image> = (0..4).map(|_| Image::new_u8(32, 32, 3, vec![120u8; 32 * 32 * 3])).collect();
        let refs: Vec<&Image> = frames.iter().collect();
        let result = detector.evaluate(&refs, &DlpOptions::default());
        assert!(!result.is_screen_capture || result.ready);
    }

    #[test]
    fn insufficient_history_is_not_ready() {
        let detector = DlpColorWheelDetector::default();
        let frame = Image::new_u8(32, 32, 3, vec![120u8; 32 * 32 * 3]);
        let refs: Vec<&Image> = vec![&frame];
        let result = detector.evaluate(&refs, &DlpOptions::default());
        assert!(!result.ready);
    }
}
