//! Domain Events
//!
//! Events broadcast over the engine's event bus as detection progresses
//! through DETECT → COLLECT → VERIFY (spec §6 "Events").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::DetectionPeriod;
use crate::domain::value_objects::{ActionKind, BoundingBox};

/// A domain event that can be broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    /// Emitted once, after the engine's detectors have finished warming up
    /// and the first frame is about to be processed.
    DetectorLoaded(DetectorLoadedEvent),
    /// Emitted on period transitions and per-frame progress updates.
    DetectorInfo(DetectorInfoEvent),
    /// Emitted when VERIFY requests the caller perform a gesture.
    DetectorAction(DetectorActionEvent),
    /// Emitted exactly once per detection session, with the final verdict.
    DetectorFinish(DetectorFinishEvent),
    /// Emitted when a non-fatal or fatal error interrupts the session.
    DetectorError(DetectorErrorEvent),
    /// Emitted per-frame when debug instrumentation is enabled; carries raw
    /// sub-scores that never reach the public verdict.
    DetectorDebug(DetectorDebugEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorLoadedEvent {
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Stable machine-readable code published on every `detector-info` event
/// (spec §6 "detector-info"). Distinct from `ErrorCode` (domain::errors),
/// which is reserved for session-ending `detector-error` failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoCode {
    MultiFaceDetected,
    NoFaceDetected,
    FaceTooSmall,
    FaceTooLarge,
    FaceNotFrontal,
    FaceNotReal,
    FaceNotLive,
    LowImageQuality,
    FramePassed,
}

impl InfoCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoCode::MultiFaceDetected => "MULTI_FACE_DETECTED",
            InfoCode::NoFaceDetected => "NO_FACE_DETECTED",
            InfoCode::FaceTooSmall => "FACE_TOO_SMALL",
            InfoCode::FaceTooLarge => "FACE_TOO_LARGE",
            InfoCode::FaceNotFrontal => "FACE_NOT_FRONTAL",
            InfoCode::FaceNotReal => "FACE_NOT_REAL",
            InfoCode::FaceNotLive => "FACE_NOT_LIVE",
            InfoCode::LowImageQuality => "LOW_IMAGE_QUALITY",
            InfoCode::FramePassed => "FRAME_PASSED",
        }
    }
}

/// Per-frame progress report (spec §6 "detector-info"). Carries every
/// raw sub-score the state machine computed for this frame, whether or
/// not the frame passed its gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorInfoEvent {
    pub passed: bool,
    pub code: InfoCode,
    pub message: String,
    pub period: DetectionPeriod,
    pub face_count: usize,
    pub face_ratio: f32,
    pub face_frontal: f32,
    pub image_quality: f32,
    pub motion_score: f32,
    pub keypoint_variance: f32,
    pub motion_type: String,
    pub screen_confidence: f32,
    pub collect_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Started,
    Completed,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorActionEvent {
    pub action: ActionKind,
    pub status: ActionStatus,
    pub deadline_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Emitted exactly once per detection session (spec §6 "detector-finish").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorFinishEvent {
    pub success: bool,
    pub silent_passed_count: u32,
    pub action_passed_count: u32,
    pub total_time_ms: u64,
    pub best_quality_score: f32,
    /// Base64-encoded JPEG, or `None` if no qualifying frame was ever captured.
    pub best_frame_image: Option<String>,
    pub best_face_image: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorErrorEvent {
    pub code: String,
    pub message: String,
    pub fatal: bool,
    pub timestamp: DateTime<Utc>,
}

/// Raw sub-scores and recovered-`PrimitiveError` warnings that never
/// reach the public verdict (spec §6 "detector-debug"), emitted only
/// when debug instrumentation is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorDebugEvent {
    pub level: String,
    pub stage: String,
    pub message: String,
    pub details: Option<String>,
    pub face_bounding_box: Option<BoundingBox>,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DetectionEvent::DetectorLoaded(e) => e.timestamp,
            DetectionEvent::DetectorInfo(e) => e.timestamp,
            DetectionEvent::DetectorAction(e) => e.timestamp,
            DetectionEvent::DetectorFinish(e) => e.timestamp,
            DetectionEvent::DetectorError(e) => e.timestamp,
            DetectionEvent::DetectorDebug(e) => e.timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DetectionEvent::DetectorLoaded(_) => "detector_loaded",
            DetectionEvent::DetectorInfo(_) => "detector_info",
            DetectionEvent::DetectorAction(_) => "detector_action",
            DetectionEvent::DetectorFinish(_) => "detector_finish",
            DetectionEvent::DetectorError(_) => "detector_error",
            DetectionEvent::DetectorDebug(_) => "detector_debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_variant() {
        let event = DetectionEvent::DetectorLoaded(DetectorLoadedEvent {
            success: true,
            error: None,
            timestamp: Utc::now(),
        });
        assert_eq!(event.event_type(), "detector_loaded");
    }

    #[test]
    fn serializes_with_tagged_type_field() {
        let event = DetectionEvent::DetectorError(DetectorErrorEvent {
            code: "multi_face".into(),
            message: "more than one face detected".into(),
            fatal: false,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "detector_error");
        assert_eq!(json["code"], "multi_face");
    }
}
