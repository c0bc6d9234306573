//! EngineStatus — the introspection record returned by `Engine::get_status`
//! (spec §6 "getStatus()").

use serde::{Deserialize, Serialize};

use super::DetectionPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLifecycle {
    Idle,
    Ready,
    Detecting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub lifecycle: EngineLifecycle,
    pub period: Option<DetectionPeriod>,
    pub collect_count: u32,
    pub silent_passed_count: u32,
    pub action_passed_count: u32,
    pub average_fps: f32,
    pub buffered_frames: usize,
}

impl EngineStatus {
    pub fn idle() -> Self {
        Self {
            lifecycle: EngineLifecycle::Idle,
            period: None,
            collect_count: 0,
            silent_passed_count: 0,
            action_passed_count: 0,
            average_fps: 0.0,
            buffered_frames: 0,
        }
    }
}
