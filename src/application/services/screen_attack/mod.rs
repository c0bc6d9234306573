//! Screen-Attack Detector cascade (spec §4.4).
//!
//! Coordinates seven specialised sub-detectors behind five selectable
//! cascade modes. Every sub-detector reports `ready: false` instead of a
//! verdict when it doesn't have enough data (single frame for the
//! per-frame detectors, N buffered frames for the temporal ones) — a
//! not-ready sub-detector is excluded from aggregation rather than
//! poisoning it with a default confidence (spec §4.4.8 closing line).

mod color_profile;
mod dlp;
mod flicker;
mod moire;
mod optical_distortion;
mod response_time;
mod rgb_emission;

pub use color_profile::ScreenColorProfileDetector;
pub use dlp::DlpColorWheelDetector;
pub use flicker::FlickerDetector;
pub use moire::MoireDetector;
pub use optical_distortion::OpticalDistortionDetector;
pub use response_time::ResponseTimeDetector;
pub use rgb_emission::RgbEmissionDetector;

use std::sync::Arc;

use tracing::debug;

use crate::domain::entities::{CascadeMode, ScreenDetectorOptions};
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::{Image, Score};

/// Uniform result shape every sub-detector reports (spec §4.4 preamble).
#[derive(Debug, Clone)]
pub struct SubDetectorResult {
    pub ready: bool,
    pub is_screen_capture: bool,
    pub confidence: Score,
    pub details: String,
}

impl SubDetectorResult {
    pub fn not_ready(reason: &str) -> Self {
        Self { ready: false, is_screen_capture: false, confidence: Score::ZERO, details: reason.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct CascadeResult {
    pub is_screen_capture: bool,
    pub confidence: Score,
    pub risk_level: RiskLevel,
    pub mode: CascadeMode,
    pub fired: Vec<&'static str>,
}

/// Orchestrates the seven sub-detectors according to the configured
/// `CascadeMode` (spec §4.4.8).
pub struct ScreenAttackCascade {
    moire: MoireDetector,
    rgb_emission: RgbEmissionDetector,
    color_profile: ScreenColorProfileDetector,
    flicker: FlickerDetector,
    response_time: ResponseTimeDetector,
    dlp: DlpColorWheelDetector,
    optical_distortion: OpticalDistortionDetector,
}

impl ScreenAttackCascade {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        debug!("screen-attack cascade constructed");
        Self {
            moire: MoireDetector::new(image_ops.clone()),
            rgb_emission: RgbEmissionDetector::new(image_ops.clone()),
            color_profile: ScreenColorProfileDetector::new(image_ops.clone()),
            flicker: FlickerDetector::new(),
            response_time: ResponseTimeDetector::new(),
            dlp: DlpColorWheelDetector::new(image_ops.clone()),
            optical_distortion: OpticalDistortionDetector::new(image_ops),
        }
    }

    /// Evaluates the cascade for the current frame. `color_frame` is the
    /// current frame's color image (required by RGB emission and color
    /// profile); `gray_history` is the buffered grayscale frames used by
    /// the temporal sub-detectors, oldest-first.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        gray_frame: &Image,
        color_frame: Option<&Image>,
        gray_history: &[&Image],
        color_history: &[&Image],
        average_fps: f32,
        options: &ScreenDetectorOptions,
    ) -> CascadeResult {
        debug!(mode = ?options.mode, "running screen-attack cascade");
        match options.mode {
            CascadeMode::Fastest => self.run_fastest(color_frame, options),
            CascadeMode::Fast => self.run_fast(gray_frame, color_frame, options),
            CascadeMode::Accurate => self.run_accurate(gray_frame, color_frame, options),
            CascadeMode::Adaptive => self.run_adaptive(gray_frame, color_frame, options),
            CascadeMode::Temporal => {
                self.run_temporal(gray_frame, gray_history, color_history, average_fps, options)
            }
        }
    }

    fn run_fastest(&self, color_frame: Option<&Image>, options: &ScreenDetectorOptions) -> CascadeResult {
        let rgb = self.run_rgb(color_frame, options);
        self.finish_with_mode(CascadeMode::Fastest, vec![("rgb_emission", rgb)])
    }

    fn run_fast(
        &self,
        gray_frame: &Image,
        color_frame: Option<&Image>,
        options: &ScreenDetectorOptions,
    ) -> CascadeResult {
        let rgb = self.run_rgb(color_frame, options);
        let color = self.run_color(gray_frame, color_frame, options);
        let results = vec![("rgb_emission", rgb), ("color_profile", color)];
        let fired: Vec<_> = results.iter().filter(|(_, r)| r.ready && r.is_screen_capture).collect();
        let avg_confidence = average_confidence(&results);
        let is_screen_capture =
            !fired.is_empty() && avg_confidence > options.cascade_aggregate_confidence_threshold;
        CascadeResult {
            is_screen_capture,
            confidence: Score::new(avg_confidence),
            risk_level: risk_from_fire_count(fired.len()),
            mode: CascadeMode::Fast,
            fired: fired.into_iter().map(|(name, _)| *name).collect(),
        }
    }

    fn run_accurate(
        &self,
        gray_frame: &Image,
        color_frame: Option<&Image>,
        options: &ScreenDetectorOptions,
    ) -> CascadeResult {
        let rgb = self.run_rgb(color_frame, options);
        let color = self.run_color(gray_frame, color_frame, options);
        let moire = self.moire.evaluate(gray_frame, &options.moire);
        let results = vec![("rgb_emission", rgb), ("color_profile", color), ("moire", moire)];
        let fired: Vec<_> = results.iter().filter(|(_, r)| r.ready && r.is_screen_capture).collect();
        let avg_confidence = average_confidence(&results);
        let is_screen_capture =
            fired.len() >= 2 && avg_confidence > options.cascade_aggregate_confidence_threshold;
        CascadeResult {
            is_screen_capture,
            confidence: Score::new(avg_confidence),
            risk_level: risk_from_fire_count(fired.len()),
            mode: CascadeMode::Accurate,
            fired: fired.into_iter().map(|(name, _)| *name).collect(),
        }
    }

    fn run_adaptive(
        &self,
        gray_frame: &Image,
        color_frame: Option<&Image>,
        options: &ScreenDetectorOptions,
    ) -> CascadeResult {
        let rgb = self.run_rgb(color_frame, options);
        if is_decisive(&rgb) {
            return self.finish_with_mode(CascadeMode::Adaptive, vec![("rgb_emission", rgb)]);
        }

        let color = self.run_color(gray_frame, color_frame, options);
        if is_decisive(&rgb) && is_decisive(&color) {
            return self.finish_with_mode(
                CascadeMode::Adaptive,
                vec![("rgb_emission", rgb), ("color_profile", color)],
            );
        }

        let moire = self.moire.evaluate(gray_frame, &options.moire);
        let results = vec![("rgb_emission", rgb), ("color_profile", color), ("moire", moire)];
        let fired: Vec<_> = results.iter().filter(|(_, r)| r.ready && r.is_screen_capture).collect();
        let avg_confidence = average_confidence(&results);
        let is_screen_capture = fired.len() >= 2;
        CascadeResult {
            is_screen_capture,
            confidence: Score::new(avg_confidence),
            risk_level: risk_from_fire_count(fired.len()),
            mode: CascadeMode::Adaptive,
            fired: fired.into_iter().map(|(name, _)| *name).collect(),
        }
    }

    /// TEMPORAL: the richer orchestrator, run in sequence with early exit.
    fn run_temporal(
        &self,
        gray_frame: &Image,
        gray_history: &[&Image],
        color_history: &[&Image],
        average_fps: f32,
        options: &ScreenDetectorOptions,
    ) -> CascadeResult {
        let stages: [(&'static str, SubDetectorResult, f32); 4] = [
            (
                "flicker",
                if gray_history.len() >= 5 {
                    self.flicker.evaluate(gray_history, average_fps, &options.flicker)
                } else {
                    SubDetectorResult::not_ready("flicker needs >=5 buffered frames")
                },
                0.70,
            ),
            (
                "response_time",
                if gray_history.len() >= 10 {
                    self.response_time.evaluate(gray_history, average_fps, &options.response_time)
                } else {
                    SubDetectorResult::not_ready("response-time needs >=10 buffered frames")
                },
                0.65,
            ),
            (
                "dlp",
                if color_history.len() >= 3 {
                    self.dlp.evaluate(color_history, &options.dlp)
                } else {
                    SubDetectorResult::not_ready("dlp needs >=3 buffered color frames")
                },
                0.65,
            ),
            (
                "optical_distortion",
                self.optical_distortion.evaluate(gray_frame, &options.optical_distortion),
                0.60,
            ),
        ];

        for (name, result, own_threshold) in &stages {
            if result.ready && result.confidence.value() > *own_threshold {
                return CascadeResult {
                    is_screen_capture: true,
                    confidence: result.confidence,
                    risk_level: RiskLevel::High,
                    mode: CascadeMode::Temporal,
                    fired: vec![name],
                };
            }
        }

        let ready_confidences: Vec<f32> =
            stages.iter().filter(|(_, r, _)| r.ready).map(|(_, r, _)| r.confidence.value()).collect();
        let composite = ready_confidences.iter().cloned().fold(0.0f32, f32::max);
        let is_screen_capture = composite > 0.50;
        let fired: Vec<&'static str> = stages
            .iter()
            .filter(|(_, r, _)| r.ready && r.is_screen_capture)
            .map(|(name, _, _)| *name)
            .collect();

        CascadeResult {
            is_screen_capture,
            confidence: Score::new(composite),
            risk_level: risk_from_fire_count(fired.len()),
            mode: CascadeMode::Temporal,
            fired,
        }
    }

    fn run_rgb(&self, color_frame: Option<&Image>, options: &ScreenDetectorOptions) -> SubDetectorResult {
        match color_frame {
            Some(color) => self.rgb_emission.evaluate(color, &options.rgb_emission),
            None => SubDetectorResult::not_ready("rgb emission requires a color frame"),
        }
    }

    fn run_color(
        &self,
        gray_frame: &Image,
        color_frame: Option<&Image>,
        options: &ScreenDetectorOptions,
    ) -> SubDetectorResult {
        match color_frame {
            Some(color) => self.color_profile.evaluate(color, gray_frame, &options.color_profile),
            None => SubDetectorResult::not_ready("color profile requires a color frame"),
        }
    }

    fn finish_with_mode(&self, mode: CascadeMode, results: Vec<(&'static str, SubDetectorResult)>) -> CascadeResult {
        let fired: Vec<_> = results.iter().filter(|(_, r)| r.ready && r.is_screen_capture).collect();
        let avg_confidence = average_confidence(&results);
        CascadeResult {
            is_screen_capture: !fired.is_empty(),
            confidence: Score::new(avg_confidence),
            risk_level: risk_from_fire_count(fired.len()),
            mode,
            fired: fired.into_iter().map(|(name, _)| *name).collect(),
        }
    }
}

fn average_confidence(results: &[(&'static str, SubDetectorResult)]) -> f32 {
    let ready: Vec<f32> = results.iter().filter(|(_, r)| r.ready).map(|(_, r)| r.confidence.value()).collect();
    if ready.is_empty() {
        0.0
    } else {
        ready.iter().sum::<f32>() / ready.len() as f32
    }
}

fn is_decisive(result: &SubDetectorResult) -> bool {
    result.ready && (result.confidence.value() > 0.8 || result.confidence.value() < 0.2)
}

fn risk_from_fire_count(count: usize) -> RiskLevel {
    match count {
        0 => RiskLevel::Low,
        1 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::imaging::DefaultImageOps;

    fn solid_gray(width: u32, height: u32, value: u8) -> Image {
        Image::new_u8(width, height, 1, vec![value; (width * height) as usize])
    }

    #[test]
    fn fastest_mode_runs_only_rgb_without_color_frame_is_not_ready() {
        let cascade = ScreenAttackCascade::new(Arc::new(DefaultImageOps::new()));
        let gray = solid_gray(64, 64, 128);
        let result = cascade.evaluate(&gray, None, &[], &[], 30.0, &ScreenDetectorOptions {
            mode: CascadeMode::Fastest,
            ..ScreenDetectorOptions::default()
        });
        assert!(!result.is_screen_capture);
    }

    #[test]
    fn temporal_mode_reports_not_flagged_with_insufficient_history() {
        let cascade = ScreenAttackCascade::new(Arc::new(DefaultImageOps::new()));
        let gray = solid_gray(64, 64, 128);
        let result = cascade.evaluate(&gray, None, &[], &[], 30.0, &ScreenDetectorOptions {
            mode: CascadeMode::Temporal,
            ..ScreenDetectorOptions::default()
        });
        assert!(!result.is_screen_capture);
    }
}
