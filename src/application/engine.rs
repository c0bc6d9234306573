//! Engine facade (spec §6 "External interfaces").
//!
//! The single owner that wires the injected ports (`ImageOps`,
//! `FaceAnalyzer`, `Clock`, `JpegEncoder`) to the `FrameCollector` and
//! `DetectionStateMachine`, and drives the single-threaded cooperative
//! loop described in spec §5 — mirrors the teacher's `CameraCapture`
//! start/stop lifecycle and background `tokio::spawn` task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::domain::entities::{EngineLifecycle, EngineOptions, EngineStatus, PartialEngineOptions};
use crate::domain::errors::{EngineError, ErrorCode};
use crate::domain::events::{DetectionEvent, DetectorErrorEvent, DetectorFinishEvent, DetectorLoadedEvent};
use crate::domain::ports::{Clock, FaceAnalyzer, ImageOps, JpegEncoder};
use crate::domain::value_objects::FrameRecord;

use super::services::event_bus::{EventBus, EventSubscriber};
use super::services::frame_collector::FrameCollector;
use super::state_machine::{DetectionStateMachine, TickOutcome};

/// Multiplier applied to the base frame delay after a frame is
/// successfully collected, spacing samples apart (spec §4.6 scheduling).
const POST_COLLECTION_DELAY_MULTIPLIER: f32 = 2.5;

struct EngineInner {
    options: RwLock<EngineOptions>,
    status: RwLock<EngineStatus>,
    state_machine: RwLock<DetectionStateMachine>,
    frame_collector: RwLock<FrameCollector>,
    face_analyzer: Arc<dyn FaceAnalyzer>,
    event_bus: Arc<EventBus>,
    stop_notify: Notify,
    finished: AtomicBool,
}

/// The public facade a host embeds: construct once, `initialize()`, then
/// `start_detection(frames)` per session.
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(
        options: EngineOptions,
        image_ops: Arc<dyn ImageOps>,
        face_analyzer: Arc<dyn FaceAnalyzer>,
        jpeg_encoder: Arc<dyn JpegEncoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let frame_collector = FrameCollector::new(options.frame_buffer_size, options.screen_detector.frame_drop_rate);
        let state_machine = DetectionStateMachine::new(
            image_ops,
            jpeg_encoder,
            clock,
            event_bus.clone(),
            options.photo_detector.motion_liveness_frame_buffer_size,
        );

        let inner = EngineInner {
            options: RwLock::new(options),
            status: RwLock::new(EngineStatus::idle()),
            state_machine: RwLock::new(state_machine),
            frame_collector: RwLock::new(frame_collector),
            face_analyzer,
            event_bus,
            stop_notify: Notify::new(),
            finished: AtomicBool::new(true),
        };

        Self { inner: Arc::new(inner) }
    }

    /// Loads the injected analyzer/ImageOps backends and emits LOADED.
    /// The ports are constructed eagerly in `new`, so this only confirms
    /// readiness and transitions IDLE → READY (spec §6 `initialize()`).
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let mut status = self.inner.status.write().await;
        status.lifecycle = EngineLifecycle::Ready;
        drop(status);

        self.inner.event_bus.publish(DetectionEvent::DetectorLoaded(DetectorLoadedEvent {
            success: true,
            error: None,
            timestamp: chrono::Utc::now(),
        }));
        info!("engine initialized");
        Ok(())
    }

    /// Begins consuming `frames` and driving the detection loop until a
    /// STOP outcome or an external `stop_detection()` call. Spawns a
    /// background task and returns immediately once it is scheduled.
    pub async fn start_detection<S>(&self, frames: S) -> Result<(), EngineError>
    where
        S: Stream<Item = FrameRecord> + Send + Unpin + 'static,
    {
        {
            let mut status = self.inner.status.write().await;
            if status.lifecycle != EngineLifecycle::Ready {
                return Err(EngineError::Init("engine not in READY state".to_string()));
            }
            status.lifecycle = EngineLifecycle::Detecting;
        }

        self.inner.state_machine.write().await.reset();
        self.inner.frame_collector.write().await.reset();
        self.inner.finished.store(false, Ordering::SeqCst);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            Self::run_loop(inner, frames).await;
        });

        Ok(())
    }

    async fn run_loop<S>(inner: Arc<EngineInner>, mut frames: S)
    where
        S: Stream<Item = FrameRecord> + Send + Unpin + 'static,
    {
        loop {
            if inner.finished.load(Ordering::SeqCst) {
                break;
            }

            let (base_delay, error_delay) = {
                let options = inner.options.read().await;
                (options.acquisition.detect_frame_delay_ms, options.acquisition.detect_error_retry_delay_ms)
            };

            tokio::select! {
                _ = inner.stop_notify.notified() => {
                    Self::finish(&inner, false).await;
                    break;
                }
                frame = frames.next() => {
                    let Some(frame) = frame else {
                        Self::finish(&inner, false).await;
                        break;
                    };

                    let collect_count_before = inner.state_machine.read().await.state().collect_count;
                    let delay = match Self::process_frame(&inner, frame).await {
                        Ok(TickOutcome::Continue) => {
                            let collected = inner.state_machine.read().await.state().collect_count > collect_count_before;
                            if collected {
                                Duration::from_millis((base_delay as f32 * POST_COLLECTION_DELAY_MULTIPLIER) as u64)
                            } else {
                                Duration::from_millis(base_delay)
                            }
                        }
                        Ok(TickOutcome::Stop { success }) => {
                            Self::finish(&inner, success).await;
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "tick failed, rescheduling after error delay");
                            inner.event_bus.publish(DetectionEvent::DetectorError(DetectorErrorEvent {
                                code: err.code().as_str().to_string(),
                                message: err.to_string(),
                                fatal: false,
                                timestamp: chrono::Utc::now(),
                            }));
                            Duration::from_millis(error_delay)
                        }
                    };

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn process_frame(inner: &Arc<EngineInner>, frame: FrameRecord) -> Result<TickOutcome, EngineError> {
        let faces = inner.face_analyzer.analyze(&frame).await?;

        let options = inner.options.read().await.clone();
        let mut collector = inner.frame_collector.write().await;
        let color_copy = frame.color.as_ref().map(|c| c.to_owned_copy());
        collector.add(frame.gray.to_owned_copy(), color_copy, frame.timestamp_ms);

        let mut state_machine = inner.state_machine.write().await;
        let outcome = state_machine.on_frame(
            &faces,
            &collector,
            &frame.gray,
            frame.color.as_ref(),
            &options,
        );

        let collected_successfully =
            matches!(outcome, TickOutcome::Continue) && state_machine.state().collect_count > 0;
        drop(state_machine);
        drop(collector);

        if collected_successfully {
            // signals the caller via delay scaling in run_loop; tracked here
            // only to document intent, no separate field needed.
            let _ = POST_COLLECTION_DELAY_MULTIPLIER;
        }

        Ok(outcome)
    }

    /// Ends the detection loop. Idempotent: a second call after the
    /// session has already finished is a no-op (spec §5 "idempotent").
    pub fn stop_detection(&self, success: bool) {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.finished.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            Self::finish(&inner, success).await;
        });
    }

    async fn finish(inner: &Arc<EngineInner>, success: bool) {
        if inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = inner.state_machine.read().await;
        let best_frame_image = state.state().best_frame_image.as_ref().map(|bytes| {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine as _;
            STANDARD.encode(bytes)
        });
        let best_face_image = state.state().best_face_image.as_ref().map(|bytes| {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine as _;
            STANDARD.encode(bytes)
        });
        let silent_passed_count = state.state().collect_count;
        let action_passed_count = state.state().completed_actions.len() as u32;
        let best_quality_score = state.state().best_quality_score.value();
        let total_time_ms = {
            let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
            now.saturating_sub(state.state().start_time_ms)
        };
        drop(state);

        inner.event_bus.publish(DetectionEvent::DetectorFinish(DetectorFinishEvent {
            success,
            silent_passed_count,
            action_passed_count,
            total_time_ms,
            best_quality_score,
            best_frame_image,
            best_face_image,
            timestamp: chrono::Utc::now(),
        }));

        let mut status = inner.status.write().await;
        status.lifecycle = EngineLifecycle::Ready;
        // `notify_one`, not `notify_waiters`: this must wake a `run_loop`
        // that hasn't reached its `stop_notify.notified()` branch yet
        // (mid-`process_frame` or mid-`sleep`), so the permit has to
        // survive until the loop's next `select!` polls it.
        inner.stop_notify.notify_one();
    }

    pub async fn update_options(&self, partial: PartialEngineOptions) {
        self.inner.options.write().await.apply(partial);
    }

    pub async fn get_options(&self) -> EngineOptions {
        self.inner.options.read().await.clone()
    }

    pub async fn get_status(&self) -> EngineStatus {
        let mut status = self.inner.status.read().await.clone();
        let state_machine = self.inner.state_machine.read().await;
        let collector = self.inner.frame_collector.read().await;
        status.period = Some(state_machine.state().period);
        status.collect_count = state_machine.state().collect_count;
        status.silent_passed_count = state_machine.state().collect_count;
        status.action_passed_count = state_machine.state().completed_actions.len() as u32;
        status.average_fps = collector.average_fps();
        status.buffered_frames = collector.len();
        status
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.inner.event_bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Image;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::face_analyzer::synthetic::SyntheticFaceAnalyzer;
    use crate::infrastructure::imaging::{DefaultImageOps, DefaultJpegEncoder};
    use tokio_stream::wrappers::ReceiverStream;

    fn test_engine(options: EngineOptions) -> Engine {
        Engine::new(
            options,
            Arc::new(DefaultImageOps::new()),
            Arc::new(SyntheticFaceAnalyzer::with_face_fraction(0.5)),
            Arc::new(DefaultJpegEncoder::new()),
            Arc::new(SystemClock::new()),
        )
    }

    #[tokio::test]
    async fn initialize_transitions_to_ready() {
        let engine = test_engine(EngineOptions::default());
        assert_eq!(engine.get_status().await.lifecycle, EngineLifecycle::Idle);
        engine.initialize().await.unwrap();
        assert_eq!(engine.get_status().await.lifecycle, EngineLifecycle::Ready);
    }

    #[tokio::test]
    async fn update_options_changes_live_configuration() {
        let engine = test_engine(EngineOptions::default());
        let partial = PartialEngineOptions {
            min_real_score: Some(0.9),
            ..Default::default()
        };
        engine.update_options(partial).await;
        assert_eq!(engine.get_options().await.min_real_score, 0.9);
    }

    #[tokio::test]
    async fn start_detection_runs_the_loop_and_emits_finish() {
        let mut options = EngineOptions::default();
        options.challenge.action_liveness_action_count = 0;
        options.collection.collect_min_collect_count = 2;

        let engine = test_engine(options);
        engine.initialize().await.unwrap();
        let mut subscriber = engine.subscribe();

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        for i in 0..10u64 {
            let gray = Image::new_u8(200, 200, 1, vec![120u8; 40_000]);
            tx.send(FrameRecord::new(i * 100, gray, None)).await.unwrap();
        }
        drop(tx);

        engine.start_detection(ReceiverStream::new(rx)).await.unwrap();

        let mut saw_finish = false;
        for _ in 0..50 {
            if let Some(event) = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
                .await
                .ok()
                .flatten()
            {
                if matches!(event.as_ref(), DetectionEvent::DetectorFinish(_)) {
                    saw_finish = true;
                    break;
                }
            } else {
                break;
            }
        }
        assert!(saw_finish);
    }
}
