//! Liveness engine demo binary.
//!
//! Wires the `Engine` facade to the synthetic `FaceAnalyzer` and a short
//! stream of generated frames, logging every emitted event. Exercises
//! the same construction path a host embedding this crate would use,
//! without requiring a camera or a real face/mesh model.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use liveness_engine::application::engine::Engine;
use liveness_engine::domain::events::DetectionEvent;
use liveness_engine::domain::value_objects::{FrameRecord, Image};
use liveness_engine::infrastructure::clock::SystemClock;
use liveness_engine::infrastructure::config::EngineConfig;
use liveness_engine::infrastructure::face_analyzer::SyntheticFaceAnalyzer;
use liveness_engine::infrastructure::imaging::{DefaultImageOps, DefaultJpegEncoder};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_FRAME_COUNT: u64 = 30;
const DEMO_FRAME_DIMENSION: u32 = 480;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("starting liveness engine demo v{}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load()?;
    let engine = Engine::new(
        config.options,
        Arc::new(DefaultImageOps::new()),
        Arc::new(SyntheticFaceAnalyzer::with_face_fraction(0.5)),
        Arc::new(DefaultJpegEncoder::new()),
        Arc::new(SystemClock::new()),
    );

    engine.initialize().await?;
    let mut subscriber = engine.subscribe();

    let (tx, rx) = tokio::sync::mpsc::channel(DEMO_FRAME_COUNT as usize);
    tokio::spawn(async move {
        let pixel_count = (DEMO_FRAME_DIMENSION * DEMO_FRAME_DIMENSION) as usize;
        for i in 0..DEMO_FRAME_COUNT {
            let gray = Image::new_u8(DEMO_FRAME_DIMENSION, DEMO_FRAME_DIMENSION, 1, vec![128u8; pixel_count]);
            let frame = FrameRecord::new(i * 100, gray, None);
            if tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    engine.start_detection(ReceiverStream::new(rx)).await?;

    loop {
        let Some(event) = subscriber.recv().await else {
            break;
        };
        info!(event = event.event_type(), "{:?}", event);
        if matches!(event.as_ref(), DetectionEvent::DetectorFinish(_)) {
            break;
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveness_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
