//! End-to-end detection scenarios, driving `DetectionStateMachine` and
//! `FrameCollector` the same way `Engine::process_frame` wires them
//! together, but synchronously and with deterministic collaborators so
//! each scenario is reproducible without a camera or a real model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use liveness_engine::application::state_machine::{DetectionStateMachine, TickOutcome};
use liveness_engine::entities::{DetectionPeriod, EngineOptions};
use liveness_engine::ports::{Clock, ImageOps, ImageOpsError};
use liveness_engine::services::{EventBus, FrameCollector};
use liveness_engine::value_objects::{ActionKind, BoundingBox, FaceObservation, Image};
use liveness_engine::infrastructure::imaging::DefaultJpegEncoder;

const FRAME_W: u32 = 640;
const FRAME_H: u32 = 480;

/// Deterministic stand-in for every pixel-level primitive the scorers
/// and the screen-attack cascade call. Mirrors the `NoOpImageOps` /
/// `FixedVarianceOps` test doubles used by the unit tests in
/// `frontality.rs` and `quality.rs`: image-shaped operations pass their
/// input through unchanged, `sobel_magnitude` returns a uniform field
/// (so left/right half sums always match), and the scalar reductions
/// return fixed, gate-passing values.
struct FakeImageOps {
    laplacian_variance: f32,
}

impl FakeImageOps {
    fn new(laplacian_variance: f32) -> Self {
        Self { laplacian_variance }
    }
}

impl ImageOps for FakeImageOps {
    fn to_grayscale(&self, image: &Image) -> Result<Image, ImageOpsError> {
        Ok(image.to_owned_copy())
    }

    fn resize(&self, image: &Image, _width: u32, _height: u32) -> Result<Image, ImageOpsError> {
        Ok(image.to_owned_copy())
    }

    fn crop(&self, image: &Image, _roi: BoundingBox) -> Result<Image, ImageOpsError> {
        Ok(image.to_owned_copy())
    }

    fn sobel_magnitude(&self, image: &Image) -> Result<Image, ImageOpsError> {
        Ok(Image::new_f32(image.width(), image.height(), 1, vec![1.0; (image.width() * image.height()) as usize]))
    }

    fn sobel_angles(&self, image: &Image) -> Result<Image, ImageOpsError> {
        Ok(Image::new_f32(image.width(), image.height(), 1, vec![0.0; (image.width() * image.height()) as usize]))
    }

    fn canny_edges(&self, image: &Image, _low_threshold: f32, _high_threshold: f32) -> Result<Image, ImageOpsError> {
        Ok(image.to_owned_copy())
    }

    fn dct_spectrum(&self, image: &Image) -> Result<Vec<f32>, ImageOpsError> {
        Ok(vec![0.0; (image.width() * image.height()) as usize])
    }

    fn laplacian_variance(&self, _image: &Image) -> Result<f32, ImageOpsError> {
        Ok(self.laplacian_variance)
    }

    fn mean_intensity(&self, _image: &Image) -> Result<f32, ImageOpsError> {
        Ok(128.0)
    }
}

/// A `Clock` the test controls by hand, so action-timeout scenarios
/// don't need a real sleep.
struct ManualClock(AtomicU64);

impl ManualClock {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn machine(clock: Arc<dyn Clock>) -> DetectionStateMachine {
    DetectionStateMachine::new(
        Arc::new(FakeImageOps::new(400.0)),
        Arc::new(DefaultJpegEncoder::new()),
        clock,
        Arc::new(EventBus::new()),
        15,
    )
}

fn gray_frame() -> Image {
    Image::new_u8(FRAME_W, FRAME_H, 1, vec![128u8; (FRAME_W * FRAME_H) as usize])
}

/// A single centered, frontal, well-lit face with no mesh — the photo
/// attack detector stays permanently `not_ready` without one, which
/// keeps these scenarios independent of its own (separately
/// unit-tested) scoring arithmetic.
fn centered_face(fraction: f32, extra_gestures: &[&str]) -> FaceObservation {
    let fw = (FRAME_W as f32 * fraction) as i32;
    let fh = (FRAME_H as f32 * fraction) as i32;
    let x = (FRAME_W as i32 - fw) / 2;
    let y = (FRAME_H as i32 - fh) / 2;
    let mut gestures = vec!["facing center".to_string()];
    gestures.extend(extra_gestures.iter().map(|g| g.to_string()));
    FaceObservation::new(BoundingBox::new(x, y, fw, fh)).with_scores(0.95, 0.95).with_gestures(gestures)
}

/// Feeds `count` passing frames through the machine, returning the
/// outcome of the last one. Mirrors `Engine::process_frame`'s order:
/// the frame is added to the collector before the state machine sees it.
fn run_frames(
    machine: &mut DetectionStateMachine,
    collector: &mut FrameCollector,
    options: &EngineOptions,
    count: usize,
    fraction: f32,
) -> TickOutcome {
    let mut outcome = TickOutcome::Continue;
    for i in 0..count {
        let frame = gray_frame();
        collector.add(frame.to_owned_copy(), None, i as u64 * 100);
        let face = centered_face(fraction, &[]);
        outcome = machine.on_frame(&[face], &*collector, &frame, None, options);
    }
    outcome
}

/// S1: a silent-only session (no action challenges configured) reaches
/// enough consecutive passing frames and finishes successfully without
/// ever entering VERIFY.
#[test]
fn silent_only_session_finishes_successfully_without_action_challenge() {
    let clock = Arc::new(ManualClock::new());
    let mut machine = machine(clock);
    let mut collector = FrameCollector::with_seed(30, 0.0, 1);
    let mut options = EngineOptions::default();
    options.challenge.action_liveness_action_list = Vec::new();

    let outcome = run_frames(&mut machine, &mut collector, &options, 5, 0.5);

    assert_eq!(outcome, TickOutcome::Stop { success: true });
    assert_eq!(machine.state().period, DetectionPeriod::Collect);
    assert!(machine.state().realness);
    assert!(machine.state().liveness);
}

/// S2: a face far too small relative to the frame is rejected every
/// frame and never starts collecting.
#[test]
fn undersized_face_is_rejected_and_never_collects() {
    let clock = Arc::new(ManualClock::new());
    let mut machine = machine(clock);
    let mut collector = FrameCollector::with_seed(30, 0.0, 2);
    let options = EngineOptions::default();

    let outcome = run_frames(&mut machine, &mut collector, &options, 3, 0.1);

    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(machine.state().collect_count, 0);
    assert_eq!(machine.state().period, DetectionPeriod::Detect);
}

/// S5: once collection hands off to VERIFY, a missed action deadline
/// resets the whole session back to DETECT rather than ending it.
#[test]
fn missed_action_deadline_resets_session_to_detect() {
    let clock = Arc::new(ManualClock::new());
    let mut machine = machine(clock.clone());
    let mut collector = FrameCollector::with_seed(30, 0.0, 3);
    let mut options = EngineOptions::default();
    options.challenge.action_liveness_action_list = vec![ActionKind::Nod];
    options.challenge.action_liveness_action_count = 1;
    options.challenge.action_liveness_verify_timeout_ms = 5_000;

    let outcome = run_frames(&mut machine, &mut collector, &options, 5, 0.5);
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(machine.state().period, DetectionPeriod::Verify);
    assert_eq!(machine.state().current_action, Some(ActionKind::Nod));

    clock.advance(options.challenge.action_liveness_verify_timeout_ms + 1);

    let frame = gray_frame();
    collector.add(frame.to_owned_copy(), None, 10_000);
    let outcome = machine.on_frame(&[], &collector, &frame, None, &options);

    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(machine.state().period, DetectionPeriod::Detect);
    assert_eq!(machine.state().collect_count, 0);
    assert_eq!(machine.state().current_action, None);
}

/// S6: a completed nod (an up gesture followed by a down gesture) while
/// in VERIFY satisfies the action challenge and finishes successfully.
#[test]
fn completed_nod_action_finishes_session_successfully() {
    let clock = Arc::new(ManualClock::new());
    let mut machine = machine(clock.clone());
    let mut collector = FrameCollector::with_seed(30, 0.0, 4);
    let mut options = EngineOptions::default();
    options.challenge.action_liveness_action_list = vec![ActionKind::Nod];
    options.challenge.action_liveness_action_count = 1;

    let outcome = run_frames(&mut machine, &mut collector, &options, 5, 0.5);
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(machine.state().period, DetectionPeriod::Verify);

    let frame = gray_frame();

    collector.add(frame.to_owned_copy(), None, 10_000);
    let up_face = centered_face(0.5, &["head up"]);
    let outcome = machine.on_frame(&[up_face], &collector, &frame, None, &options);
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(machine.state().period, DetectionPeriod::Verify);

    collector.add(frame.to_owned_copy(), None, 10_100);
    let down_face = centered_face(0.5, &["head down"]);
    let outcome = machine.on_frame(&[down_face], &collector, &frame, None, &options);

    assert_eq!(outcome, TickOutcome::Stop { success: true });
    assert!(machine.state().completed_actions.contains(&ActionKind::Nod));
}
