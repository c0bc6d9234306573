//! DetectionState Entity
//!
//! The single mutable instance tracking where the engine is in its
//! DETECT → COLLECT → VERIFY lifecycle (spec §3 "DetectionState", §4.6
//! "Detection State Machine"). Created at engine construction, reset at
//! start-of-detection and on any failure that invalidates accumulated
//! evidence, torn down with the engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ActionKind, Score};

/// The three phases of the detection lifecycle (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPeriod {
    Detect,
    Collect,
    Verify,
}

/// Mutable session state for one detection run.
#[derive(Debug, Clone)]
pub struct DetectionState {
    pub period: DetectionPeriod,
    pub start_time_ms: u64,
    pub collect_count: u32,
    pub best_quality_score: Score,
    pub best_frame_image: Option<Vec<u8>>,
    pub best_face_image: Option<Vec<u8>>,
    pub completed_actions: HashSet<ActionKind>,
    pub current_action: Option<ActionKind>,
    pub action_deadline_ms: Option<u64>,
    pub suspected_fraud_count: u32,
    pub last_frontality_score: Score,
    pub liveness: bool,
    pub realness: bool,
}

impl DetectionState {
    /// Creates a fresh state at the start of a detection session.
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            period: DetectionPeriod::Detect,
            start_time_ms,
            collect_count: 0,
            best_quality_score: Score::ZERO,
            best_frame_image: None,
            best_face_image: None,
            completed_actions: HashSet::new(),
            current_action: None,
            action_deadline_ms: None,
            suspected_fraud_count: 0,
            last_frontality_score: Score::ZERO,
            liveness: false,
            realness: false,
        }
    }

    /// Resets to a fresh DETECT state, releasing any retained JPEG
    /// buffers (dropped here, not merely forgotten) — spec: "reset on
    /// multi-face detection, on fraud trigger, and on challenge timeout."
    pub fn reset(&mut self, now_ms: u64) {
        *self = DetectionState::new(now_ms);
    }

    /// Records a newly captured best frame, maintaining the invariant
    /// "`bestFrameImage` is non-null iff `bestQualityScore > 0`."
    pub fn record_best_frame(&mut self, quality: Score, frame_jpeg: Vec<u8>, face_jpeg: Vec<u8>) {
        self.best_quality_score = quality;
        self.best_frame_image = Some(frame_jpeg);
        self.best_face_image = Some(face_jpeg);
    }

    /// Whether the invariant "`collectCount <= collect_target` before
    /// transition to VERIFY" can be asserted for a given target.
    pub fn collect_count_within(&self, collect_target: u32) -> bool {
        self.collect_count <= collect_target
    }

    /// Whether completed actions stay within the configured action list
    /// and required count (spec invariant).
    pub fn completed_actions_within(
        &self,
        configured: &[ActionKind],
        required_count: usize,
    ) -> bool {
        self.completed_actions.iter().all(|a| configured.contains(a))
            && self.completed_actions.len() <= required_count
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_in_detect_with_no_best_frame() {
        let state = DetectionState::new(0);
        assert_eq!(state.period, DetectionPeriod::Detect);
        assert!(state.best_frame_image.is_none());
        assert_eq!(state.best_quality_score.value(), 0.0);
    }

    #[test]
    fn record_best_frame_keeps_invariant() {
        let mut state = DetectionState::new(0);
        state.record_best_frame(Score::new(0.9), vec![1, 2, 3], vec![4, 5, 6]);
        assert!(state.best_quality_score.value() > 0.0);
        assert!(state.best_frame_image.is_some());
    }

    #[test]
    fn reset_clears_accumulated_evidence() {
        let mut state = DetectionState::new(0);
        state.record_best_frame(Score::new(0.9), vec![1], vec![2]);
        state.collect_count = 5;
        state.reset(100);
        assert_eq!(state.collect_count, 0);
        assert!(state.best_frame_image.is_none());
        assert_eq!(state.start_time_ms, 100);
    }

    #[test]
    fn completed_actions_respect_configured_list_and_count() {
        let mut state = DetectionState::new(0);
        state.completed_actions.insert(ActionKind::Blink);
        assert!(state.completed_actions_within(&[ActionKind::Blink, ActionKind::Nod], 1));
        assert!(!state.completed_actions_within(&[ActionKind::Nod], 1));
    }
}
