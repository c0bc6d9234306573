//! Engine configuration record (spec §6 "Configuration keys").
//!
//! A flat-feeling, nested-struct configuration record with illustrative
//! defaults matching spec.md. `PartialEngineOptions` mirrors the shape
//! for `Engine::update_options`, where every field is optional and only
//! present fields overwrite the live configuration.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ActionKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionOptions {
    pub detect_video_width: u32,
    pub detect_video_height: u32,
    pub detect_video_mirror: bool,
    pub detect_video_load_timeout_ms: u64,
    pub detect_frame_delay_ms: u64,
    pub detect_error_retry_delay_ms: u64,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            detect_video_width: 640,
            detect_video_height: 480,
            detect_video_mirror: true,
            detect_video_load_timeout_ms: 10_000,
            detect_frame_delay_ms: 100,
            detect_error_retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionGateOptions {
    pub collect_min_collect_count: u32,
    pub collect_min_face_ratio: f32,
    pub collect_max_face_ratio: f32,
    pub collect_min_face_frontal: f32,
    pub collect_min_image_quality: f32,
}

impl Default for CollectionGateOptions {
    fn default() -> Self {
        Self {
            collect_min_collect_count: 5,
            collect_min_face_ratio: 0.1,
            collect_max_face_ratio: 0.8,
            collect_min_face_frontal: 0.7,
            collect_min_image_quality: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontalityOptions {
    pub yaw_threshold: f32,
    pub pitch_threshold: f32,
    pub roll_threshold: f32,
}

impl Default for FrontalityOptions {
    fn default() -> Self {
        Self { yaw_threshold: 3.0, pitch_threshold: 4.0, roll_threshold: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityOptions {
    pub require_full_face_in_bounds: bool,
    pub min_laplacian_variance: f32,
    pub min_gradient_sharpness: f32,
    pub min_blur_score: f32,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            require_full_face_in_bounds: true,
            min_laplacian_variance: 200.0,
            min_gradient_sharpness: 0.5,
            min_blur_score: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeOptions {
    pub action_liveness_action_list: Vec<ActionKind>,
    pub action_liveness_action_count: u32,
    pub action_liveness_action_randomize: bool,
    pub action_liveness_verify_timeout_ms: u64,
    pub action_liveness_min_mouth_open_percent: f32,
}

impl Default for ChallengeOptions {
    fn default() -> Self {
        Self {
            action_liveness_action_list: vec![ActionKind::Blink, ActionKind::MouthOpen, ActionKind::Nod],
            action_liveness_action_count: 1,
            action_liveness_action_randomize: true,
            action_liveness_verify_timeout_ms: 7_000,
            action_liveness_min_mouth_open_percent: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoDetectorOptions {
    pub motion_liveness_min_motion_score: f32,
    pub motion_liveness_min_keypoint_variance: f32,
    pub motion_liveness_frame_buffer_size: usize,
    pub motion_liveness_eye_aspect_ratio_threshold: f32,
}

impl Default for PhotoDetectorOptions {
    fn default() -> Self {
        Self {
            motion_liveness_min_motion_score: 0.5,
            motion_liveness_min_keypoint_variance: 0.5,
            motion_liveness_frame_buffer_size: 15,
            motion_liveness_eye_aspect_ratio_threshold: 0.2,
        }
    }
}

/// Cascade mode selection (spec §4.4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    Fastest,
    Fast,
    Accurate,
    Adaptive,
    Temporal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoireOptions {
    pub max_dimension: u32,
    pub peak_ratio_over_mean: f32,
    pub max_peaks_for_full_score: f32,
    pub canny_weight: f32,
    pub threshold: f32,
}

impl Default for MoireOptions {
    fn default() -> Self {
        Self {
            max_dimension: 256,
            peak_ratio_over_mean: 2.0,
            max_peaks_for_full_score: 20.0,
            canny_weight: 0.4,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbEmissionOptions {
    pub low_freq_band_start_pct: f32,
    pub low_freq_band_end_pct: f32,
    pub confidence_threshold: f32,
}

impl Default for RgbEmissionOptions {
    fn default() -> Self {
        Self { low_freq_band_start_pct: 0.15, low_freq_band_end_pct: 0.35, confidence_threshold: 0.60 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorProfileOptions {
    pub max_mean_saturation: f32,
    pub min_channel_correlation: f32,
    pub max_entropy: f32,
    pub min_gradient_smoothness: f32,
    pub min_uniformity: f32,
    pub composite_threshold: f32,
}

impl Default for ColorProfileOptions {
    fn default() -> Self {
        Self {
            max_mean_saturation: 0.40,
            min_channel_correlation: 0.85,
            max_entropy: 6.5,
            min_gradient_smoothness: 0.7,
            min_uniformity: 0.65,
            composite_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlickerOptions {
    pub min_period: usize,
    pub correlation_threshold: f32,
    pub config_max_period: usize,
}

impl Default for FlickerOptions {
    fn default() -> Self {
        Self { min_period: 2, correlation_threshold: 0.65, config_max_period: 12 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeOptions {
    pub settle_threshold_ms: f32,
    pub min_settling_pixel_fraction: f32,
    pub brightness_delta_threshold: f32,
}

impl Default for ResponseTimeOptions {
    fn default() -> Self {
        Self { settle_threshold_ms: 150.0, min_settling_pixel_fraction: 0.3, brightness_delta_threshold: 25.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DlpOptions {
    pub min_edge_separation_px: f32,
    pub min_temporal_stability: f32,
}

impl Default for DlpOptions {
    fn default() -> Self {
        Self { min_edge_separation_px: 1.5, min_temporal_stability: 0.6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalDistortionOptions {
    pub keystone_weight: f32,
    pub barrel_weight: f32,
    pub vignette_weight: f32,
    pub chromatic_weight: f32,
    pub composite_threshold: f32,
}

impl Default for OpticalDistortionOptions {
    fn default() -> Self {
        Self {
            keystone_weight: 0.35,
            barrel_weight: 0.30,
            vignette_weight: 0.20,
            chromatic_weight: 0.15,
            composite_threshold: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenDetectorOptions {
    pub mode: CascadeMode,
    pub moire: MoireOptions,
    pub rgb_emission: RgbEmissionOptions,
    pub color_profile: ColorProfileOptions,
    pub flicker: FlickerOptions,
    pub response_time: ResponseTimeOptions,
    pub dlp: DlpOptions,
    pub optical_distortion: OpticalDistortionOptions,
    pub screen_capture_confidence_threshold: f32,
    pub frame_drop_rate: f32,
    pub cascade_aggregate_confidence_threshold: f32,
}

impl Default for ScreenDetectorOptions {
    fn default() -> Self {
        Self {
            mode: CascadeMode::Adaptive,
            moire: MoireOptions::default(),
            rgb_emission: RgbEmissionOptions::default(),
            color_profile: ColorProfileOptions::default(),
            flicker: FlickerOptions::default(),
            response_time: ResponseTimeOptions::default(),
            dlp: DlpOptions::default(),
            optical_distortion: OpticalDistortionOptions::default(),
            screen_capture_confidence_threshold: 0.7,
            frame_drop_rate: 0.0,
            cascade_aggregate_confidence_threshold: 0.6,
        }
    }
}

/// Complete, nested engine configuration (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub acquisition: AcquisitionOptions,
    pub collection: CollectionGateOptions,
    pub frontality: FrontalityOptions,
    pub quality: QualityOptions,
    pub challenge: ChallengeOptions,
    pub photo_detector: PhotoDetectorOptions,
    pub screen_detector: ScreenDetectorOptions,
    pub frame_buffer_size: usize,
    pub min_real_score: f32,
    pub suspected_frauds_count: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionOptions::default(),
            collection: CollectionGateOptions::default(),
            frontality: FrontalityOptions::default(),
            quality: QualityOptions::default(),
            challenge: ChallengeOptions::default(),
            photo_detector: PhotoDetectorOptions::default(),
            screen_detector: ScreenDetectorOptions::default(),
            frame_buffer_size: 30,
            min_real_score: 0.4,
            suspected_frauds_count: 5,
        }
    }
}

/// A partial configuration update; `None` fields leave the live value
/// untouched (spec §6 `updateOptions(partial)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialEngineOptions {
    pub acquisition: Option<AcquisitionOptions>,
    pub collection: Option<CollectionGateOptions>,
    pub frontality: Option<FrontalityOptions>,
    pub quality: Option<QualityOptions>,
    pub challenge: Option<ChallengeOptions>,
    pub photo_detector: Option<PhotoDetectorOptions>,
    pub screen_detector: Option<ScreenDetectorOptions>,
    pub frame_buffer_size: Option<usize>,
    pub min_real_score: Option<f32>,
    pub suspected_frauds_count: Option<u32>,
}

impl EngineOptions {
    /// Applies a partial update in place.
    pub fn apply(&mut self, partial: PartialEngineOptions) {
        if let Some(v) = partial.acquisition {
            self.acquisition = v;
        }
        if let Some(v) = partial.collection {
            self.collection = v;
        }
        if let Some(v) = partial.frontality {
            self.frontality = v;
        }
        if let Some(v) = partial.quality {
            self.quality = v;
        }
        if let Some(v) = partial.challenge {
            self.challenge = v;
        }
        if let Some(v) = partial.photo_detector {
            self.photo_detector = v;
        }
        if let Some(v) = partial.screen_detector {
            self.screen_detector = v;
        }
        if let Some(v) = partial.frame_buffer_size {
            self.frame_buffer_size = v;
        }
        if let Some(v) = partial.min_real_score {
            self.min_real_score = v;
        }
        if let Some(v) = partial.suspected_frauds_count {
            self.suspected_frauds_count = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_sane_ranges() {
        let opts = EngineOptions::default();
        assert!(opts.collection.collect_min_face_ratio < opts.collection.collect_max_face_ratio);
        assert!(opts.min_real_score > 0.0 && opts.min_real_score < 1.0);
    }

    #[test]
    fn partial_update_only_touches_present_fields() {
        let mut opts = EngineOptions::default();
        let original_quality = opts.quality;

        let partial = PartialEngineOptions {
            collection: Some(CollectionGateOptions { collect_min_collect_count: 9, ..Default::default() }),
            ..Default::default()
        };
        opts.apply(partial);

        assert_eq!(opts.collection.collect_min_collect_count, 9);
        assert_eq!(opts.quality, original_quality);
    }
}
