//! Detection State Machine (spec §4.6).
//!
//! Drives one detection session through DETECT → COLLECT → VERIFY,
//! applying the ordered per-frame gates, tracking action-challenge
//! progress, and deciding when to reset, continue, or stop.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::debug;

use crate::domain::entities::{DetectionPeriod, DetectionState, EngineOptions};
use crate::domain::ports::{Clock, ImageOps, JpegEncoder};
use crate::domain::value_objects::{ActionKind, FaceObservation, Score};
use crate::domain::events::{
    ActionStatus, DetectorActionEvent, DetectorInfoEvent, InfoCode,
};

use super::services::event_bus::EventBus;
use super::services::frame_collector::FrameCollector;
use super::services::frontality::FrontalityScorer;
use super::services::photo_attack::PhotoAttackDetector;
use super::services::quality::QualityScorer;
use super::services::screen_attack::ScreenAttackCascade;

static MOUTH_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mouth\s+(\d+)%\s*open").expect("static regex"));
static NOD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)head\s+(up|down)").expect("static regex"));

const MOIRE_READY_HISTORY: usize = 5;
const PHOTO_READY_FRAMES: usize = 2;

/// What the engine loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop { success: bool },
}

/// Tracks a multi-phase action predicate across frames — only NOD needs
/// this; BLINK and MOUTH_OPEN are single-frame checks.
#[derive(Debug, Default, Clone, Copy)]
struct NodProgress {
    saw_up: bool,
}

/// Coordinates the scorers and detectors for one detection session and
/// applies spec §4.6's gate sequence and period transitions.
pub struct DetectionStateMachine {
    state: DetectionState,
    image_ops: Arc<dyn ImageOps>,
    frontality: FrontalityScorer,
    quality: QualityScorer,
    screen_attack: ScreenAttackCascade,
    photo_attack: PhotoAttackDetector,
    jpeg_encoder: Arc<dyn JpegEncoder>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    nod_progress: NodProgress,
    action_cursor: usize,
    rng: StdRng,
}

impl DetectionStateMachine {
    pub fn new(
        image_ops: Arc<dyn ImageOps>,
        jpeg_encoder: Arc<dyn JpegEncoder>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
        photo_buffer_capacity: usize,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            state: DetectionState::new(now),
            image_ops: image_ops.clone(),
            frontality: FrontalityScorer::new(image_ops.clone()),
            quality: QualityScorer::new(image_ops.clone()),
            screen_attack: ScreenAttackCascade::new(image_ops),
            photo_attack: PhotoAttackDetector::new(photo_buffer_capacity),
            jpeg_encoder,
            clock,
            event_bus,
            nod_progress: NodProgress::default(),
            action_cursor: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    /// Resets the session to a fresh DETECT, releasing all retained
    /// evidence and sub-detector history.
    pub fn reset(&mut self) {
        let now = self.clock.now_ms();
        self.state.reset(now);
        self.photo_attack.reset();
        self.nod_progress = NodProgress::default();
    }

    /// Processes one incoming frame through the gate sequence and
    /// returns whether the engine loop should continue or stop.
    #[allow(clippy::too_many_arguments)]
    pub fn on_frame(
        &mut self,
        faces: &[FaceObservation],
        frame_collector: &FrameCollector,
        gray_frame: &crate::domain::value_objects::Image,
        color_frame: Option<&crate::domain::value_objects::Image>,
        options: &EngineOptions,
    ) -> TickOutcome {
        let now = self.clock.now_ms();

        if self.state.period == DetectionPeriod::Verify {
            if let Some(deadline) = self.state.action_deadline_ms {
                if now >= deadline {
                    return self.timeout_action(now);
                }
            }
        }

        // Gate 1: exactly one face.
        let face = match faces.len() {
            1 => &faces[0],
            0 => {
                self.publish_info(false, InfoCode::NoFaceDetected, "no face detected", 0, 0.0, 0.0, 0.0, 0.0, 0.0, "none", 0.0);
                if self.state.period != DetectionPeriod::Detect {
                    self.reset();
                }
                return TickOutcome::Continue;
            }
            n => {
                self.publish_info(false, InfoCode::MultiFaceDetected, "multiple faces detected", n, 0.0, 0.0, 0.0, 0.0, 0.0, "none", 0.0);
                if self.state.period != DetectionPeriod::Detect {
                    self.reset();
                }
                return TickOutcome::Continue;
            }
        };

        self.photo_attack.observe(face.clone());

        let face_ratio = face.bbox.face_ratio(gray_frame.width() as i32, gray_frame.height() as i32);

        let gray_history = frame_collector.get_gray_frames(frame_collector.buffer_size());
        let color_history: Vec<&crate::domain::value_objects::Image> = frame_collector
            .get_frames(frame_collector.buffer_size())
            .into_iter()
            .filter_map(|f| f.color.as_ref())
            .collect();
        let average_fps = frame_collector.average_fps();

        let screen_ready = gray_history.len() >= MOIRE_READY_HISTORY;
        let screen_result = self.screen_attack.evaluate(
            gray_frame,
            color_frame,
            &gray_history,
            &color_history,
            average_fps,
            &options.screen_detector,
        );

        // Gate 2: screen-attack, once ready, must not flag.
        if screen_ready && screen_result.is_screen_capture {
            self.publish_info(
                false,
                InfoCode::FaceNotReal,
                "screen capture suspected",
                1,
                face_ratio,
                0.0,
                0.0,
                0.0,
                0.0,
                "none",
                screen_result.confidence.value(),
            );
            self.reset();
            return TickOutcome::Continue;
        }

        let photo_result = self.photo_attack.evaluate(&options.photo_detector);
        let photo_ready = photo_result.trusted || frame_collector.len() >= PHOTO_READY_FRAMES;

        // Gate 3: photo-attack / motion-liveness, once ready, must not flag.
        if photo_ready && photo_result.is_photo {
            self.publish_info(
                false,
                InfoCode::FaceNotLive,
                "photo attack suspected",
                1,
                face_ratio,
                0.0,
                0.0,
                photo_result.score,
                photo_result.motion_variance,
                "rigid",
                screen_result.confidence.value(),
            );
            self.reset();
            return TickOutcome::Continue;
        }

        // Suspected-fraud counter, tracked off the analyzer's own real score.
        if let Some(real) = face.real {
            if real.value() < options.min_real_score {
                self.state.suspected_fraud_count += 1;
                if self.state.suspected_fraud_count >= options.suspected_frauds_count {
                    self.event_bus.publish(crate::domain::events::DetectionEvent::DetectorError(
                        crate::domain::events::DetectorErrorEvent {
                            code: crate::domain::errors::ErrorCode::SuspectedFraudsDetected.as_str().to_string(),
                            message: "suspected frauds threshold reached".to_string(),
                            fatal: true,
                            timestamp: chrono::Utc::now(),
                        },
                    ));
                    return self.finish(false);
                }
            }
        }

        // Gate 4: face ratio within bounds.
        if face_ratio <= options.collection.collect_min_face_ratio
            || face_ratio >= options.collection.collect_max_face_ratio
        {
            let code = if face_ratio <= options.collection.collect_min_face_ratio {
                InfoCode::FaceTooSmall
            } else {
                InfoCode::FaceTooLarge
            };
            self.publish_info(false, code, "face ratio out of bounds", 1, face_ratio, 0.0, 0.0, 0.0, 0.0, "none", screen_result.confidence.value());
            return TickOutcome::Continue;
        }

        // Gate 5: frontality, DETECT/COLLECT only.
        let frontality = if self.state.period != DetectionPeriod::Verify {
            let score = self.frontality.score(face, gray_frame, &options.frontality);
            self.state.last_frontality_score = score;
            score
        } else {
            self.state.last_frontality_score
        };

        if self.state.period != DetectionPeriod::Verify
            && frontality.value() < options.collection.collect_min_face_frontal
        {
            self.publish_info(
                false,
                InfoCode::FaceNotFrontal,
                "face not frontal",
                1,
                face_ratio,
                frontality.value(),
                0.0,
                0.0,
                0.0,
                "none",
                screen_result.confidence.value(),
            );
            return TickOutcome::Continue;
        }

        // Gate 6: quality.
        let quality = self.quality.score(face, gray_frame, &options.quality);
        if !quality.passed || quality.combined.value() < options.collection.collect_min_image_quality {
            self.publish_info(
                false,
                InfoCode::LowImageQuality,
                "image quality below threshold",
                1,
                face_ratio,
                frontality.value(),
                quality.combined.value(),
                0.0,
                0.0,
                "none",
                screen_result.confidence.value(),
            );
            return TickOutcome::Continue;
        }

        // Gate 7: mark realness/liveness once the two fraud-style gates passed.
        if screen_ready && photo_ready {
            self.state.realness = true;
            self.state.liveness = true;
        }

        self.publish_info(
            true,
            InfoCode::FramePassed,
            "frame passed",
            1,
            face_ratio,
            frontality.value(),
            quality.combined.value(),
            photo_result.score,
            photo_result.motion_variance,
            "none",
            screen_result.confidence.value(),
        );

        self.advance(face, gray_frame, quality.combined, options)
    }

    fn advance(
        &mut self,
        face: &FaceObservation,
        gray_frame: &crate::domain::value_objects::Image,
        quality: Score,
        options: &EngineOptions,
    ) -> TickOutcome {
        match self.state.period {
            DetectionPeriod::Detect => {
                self.state.period = DetectionPeriod::Collect;
                self.collect(face, gray_frame, quality, options)
            }
            DetectionPeriod::Collect => self.collect(face, gray_frame, quality, options),
            DetectionPeriod::Verify => self.check_action(face, options),
        }
    }

    fn collect(
        &mut self,
        face: &FaceObservation,
        gray_frame: &crate::domain::value_objects::Image,
        quality: Score,
        options: &EngineOptions,
    ) -> TickOutcome {
        self.state.collect_count += 1;

        if quality.value() > self.state.best_quality_score.value() {
            if let Some((frame_jpeg, face_jpeg)) = self.capture_evidence(face, gray_frame) {
                self.state.record_best_frame(quality, frame_jpeg, face_jpeg);
            }
        }

        if self.state.realness
            && self.state.liveness
            && self.state.collect_count >= options.collection.collect_min_collect_count
        {
            if options.challenge.action_liveness_action_list.is_empty()
                || options.challenge.action_liveness_action_count == 0
            {
                return self.finish(true);
            }
            self.start_verify(options);
        }

        TickOutcome::Continue
    }

    fn capture_evidence(
        &self,
        face: &FaceObservation,
        gray_frame: &crate::domain::value_objects::Image,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        let frame_jpeg = self.jpeg_encoder.encode(gray_frame, 90).ok()?;
        let roi = face.bbox.clip_to(gray_frame.width() as i32, gray_frame.height() as i32);
        let face_jpeg = if roi.area() > 0 {
            self.image_ops
                .crop(gray_frame, roi)
                .ok()
                .and_then(|cropped| self.jpeg_encoder.encode(&cropped, 90).ok())
                .unwrap_or_else(|| frame_jpeg.clone())
        } else {
            frame_jpeg.clone()
        };
        Some((frame_jpeg, face_jpeg))
    }

    fn start_verify(&mut self, options: &EngineOptions) {
        self.state.period = DetectionPeriod::Verify;
        let action = self.pick_next_action(options);
        self.state.current_action = Some(action);
        let deadline = self.clock.now_ms() + options.challenge.action_liveness_verify_timeout_ms;
        self.state.action_deadline_ms = Some(deadline);

        self.event_bus.publish(crate::domain::events::DetectionEvent::DetectorAction(DetectorActionEvent {
            action,
            status: ActionStatus::Started,
            deadline_ms: deadline,
            timestamp: chrono::Utc::now(),
        }));
    }

    fn pick_next_action(&mut self, options: &EngineOptions) -> ActionKind {
        let remaining: Vec<ActionKind> = options
            .challenge
            .action_liveness_action_list
            .iter()
            .copied()
            .filter(|a| !self.state.completed_actions.contains(a))
            .collect();

        if remaining.is_empty() {
            return options.challenge.action_liveness_action_list[0];
        }

        if options.challenge.action_liveness_action_randomize {
            let idx = self.rng.gen_range(0..remaining.len());
            remaining[idx]
        } else {
            let idx = self.action_cursor % remaining.len();
            self.action_cursor += 1;
            remaining[idx]
        }
    }

    fn check_action(&mut self, face: &FaceObservation, options: &EngineOptions) -> TickOutcome {
        let Some(action) = self.state.current_action else {
            return TickOutcome::Continue;
        };

        let completed = match action {
            ActionKind::Blink => face.has_gesture_containing("blink"),
            ActionKind::MouthOpen => self.check_mouth_open(face, options),
            ActionKind::Nod => self.check_nod(face),
        };

        if !completed {
            return TickOutcome::Continue;
        }

        self.state.completed_actions.insert(action);
        self.nod_progress = NodProgress::default();

        self.event_bus.publish(crate::domain::events::DetectionEvent::DetectorAction(DetectorActionEvent {
            action,
            status: ActionStatus::Completed,
            deadline_ms: self.state.action_deadline_ms.unwrap_or(0),
            timestamp: chrono::Utc::now(),
        }));

        if self.state.completed_actions.len() >= options.challenge.action_liveness_action_count as usize {
            return self.finish(true);
        }

        self.start_verify(options);
        TickOutcome::Continue
    }

    fn check_mouth_open(&self, face: &FaceObservation, options: &EngineOptions) -> bool {
        face.gestures.iter().any(|g| {
            MOUTH_OPEN_RE
                .captures(g)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f32>().ok())
                .map(|percent| percent > options.challenge.action_liveness_min_mouth_open_percent)
                .unwrap_or(false)
        })
    }

    fn check_nod(&mut self, face: &FaceObservation) -> bool {
        for gesture in &face.gestures {
            if let Some(captures) = NOD_RE.captures(gesture) {
                let direction = captures.get(1).map(|m| m.as_str().to_lowercase());
                match direction.as_deref() {
                    Some("up") => self.nod_progress.saw_up = true,
                    Some("down") if self.nod_progress.saw_up => return true,
                    _ => {}
                }
            }
        }
        false
    }

    fn timeout_action(&mut self, _now: u64) -> TickOutcome {
        if let Some(action) = self.state.current_action {
            self.event_bus.publish(crate::domain::events::DetectionEvent::DetectorAction(DetectorActionEvent {
                action,
                status: ActionStatus::Timeout,
                deadline_ms: self.state.action_deadline_ms.unwrap_or(0),
                timestamp: chrono::Utc::now(),
            }));
        }
        self.reset();
        TickOutcome::Continue
    }

    fn finish(&mut self, success: bool) -> TickOutcome {
        debug!(success, "detection session finished");
        TickOutcome::Stop { success }
    }

    #[allow(clippy::too_many_arguments)]
    fn publish_info(
        &self,
        passed: bool,
        code: InfoCode,
        message: &str,
        face_count: usize,
        face_ratio: f32,
        face_frontal: f32,
        image_quality: f32,
        motion_score: f32,
        keypoint_variance: f32,
        motion_type: &str,
        screen_confidence: f32,
    ) {
        self.event_bus.publish(crate::domain::events::DetectionEvent::DetectorInfo(DetectorInfoEvent {
            passed,
            code,
            message: message.to_string(),
            period: self.state.period,
            face_count,
            face_ratio,
            face_frontal,
            image_quality,
            motion_score,
            keypoint_variance,
            motion_type: motion_type.to_string(),
            screen_confidence,
            collect_count: self.state.collect_count,
            timestamp: chrono::Utc::now(),
        }));
    }
}
