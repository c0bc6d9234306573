//! Dedicated-thread bridge for a non-`Send` face/mesh detector backend.
//!
//! Mirrors the teacher's `FaceDetector` (camera/face_detector.rs): the
//! detector model itself is not `Send`, so it is constructed and driven
//! entirely inside one owned thread; requests and responses cross the
//! boundary over a bounded `crossbeam_channel` paired with a
//! `tokio::sync::oneshot` reply per request.

use std::thread;

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{error, info, warn};

use crate::domain::ports::{FaceAnalyzer, FaceAnalyzerError};
use crate::domain::value_objects::{FaceObservation, FrameRecord};

/// Implemented by a concrete, non-`Send` model (e.g. an ONNX Runtime
/// session or an FFI binding) that can only run on the thread that
/// created it.
pub trait FaceDetectionBackend {
    fn detect(&mut self, frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError>;
}

struct AnalysisRequest {
    gray: crate::domain::value_objects::Image,
    color: Option<crate::domain::value_objects::Image>,
    timestamp_ms: u64,
    response_tx: tokio::sync::oneshot::Sender<Result<Vec<FaceObservation>, FaceAnalyzerError>>,
}

/// `FaceAnalyzer` adapter that owns a dedicated worker thread running a
/// non-`Send` [`FaceDetectionBackend`].
pub struct ThreadedFaceAnalyzer {
    request_tx: Sender<AnalysisRequest>,
}

impl ThreadedFaceAnalyzer {
    /// Spawns the backend on its own thread via `factory`, which is
    /// called once inside that thread — this is how a non-`Send` model
    /// gets constructed without ever crossing a thread boundary itself.
    pub fn spawn<B, F>(factory: F) -> Self
    where
        B: FaceDetectionBackend + 'static,
        F: FnOnce() -> Result<B, FaceAnalyzerError> + Send + 'static,
    {
        let (request_tx, request_rx): (Sender<AnalysisRequest>, Receiver<AnalysisRequest>) = bounded(8);

        thread::Builder::new()
            .name("face-analyzer".to_string())
            .spawn(move || Self::worker_loop(factory, request_rx))
            .expect("failed to spawn face-analyzer thread");

        Self { request_tx }
    }

    fn worker_loop<B, F>(factory: F, request_rx: Receiver<AnalysisRequest>)
    where
        B: FaceDetectionBackend,
        F: FnOnce() -> Result<B, FaceAnalyzerError>,
    {
        info!("face-analyzer thread starting");
        let mut backend = match factory() {
            Ok(backend) => backend,
            Err(err) => {
                error!(error = %err, "face-analyzer backend failed to initialize");
                return;
            }
        };

        while let Ok(request) = request_rx.recv() {
            let frame = FrameRecord::new(request.timestamp_ms, request.gray, request.color);
            let result = backend.detect(&frame);
            let _ = request.response_tx.send(result);
        }
        info!("face-analyzer thread stopping");
    }
}

#[async_trait]
impl FaceAnalyzer for ThreadedFaceAnalyzer {
    async fn analyze(&self, frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError> {
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        let request = AnalysisRequest {
            gray: frame.gray.to_owned_copy(),
            color: frame.color.as_ref().map(|c| c.to_owned_copy()),
            timestamp_ms: frame.timestamp_ms,
            response_tx,
        };

        if self.request_tx.send(request).is_err() {
            warn!("face-analyzer thread unavailable, request dropped");
            return Err(FaceAnalyzerError::Unavailable("worker thread gone".to_string()));
        }

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(FaceAnalyzerError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{BoundingBox, Image};

    struct EchoBackend;
    impl FaceDetectionBackend for EchoBackend {
        fn detect(&mut self, frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError> {
            Ok(vec![FaceObservation::new(BoundingBox::new(0, 0, frame.width() as i32, frame.height() as i32))])
        }
    }

    #[tokio::test]
    async fn round_trips_a_request_through_the_worker_thread() {
        let analyzer = ThreadedFaceAnalyzer::spawn(|| Ok(EchoBackend));
        let frame = FrameRecord::new(0, Image::new_u8(4, 4, 1, vec![1u8; 16]), None);
        let result = analyzer.analyze(&frame).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].bbox.width(), 4);
    }

    struct FailingBackend;
    impl FaceDetectionBackend for FailingBackend {
        fn detect(&mut self, _frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError> {
            Err(FaceAnalyzerError::Backend("synthetic failure".to_string()))
        }
    }

    #[tokio::test]
    async fn propagates_backend_errors() {
        let analyzer = ThreadedFaceAnalyzer::spawn(|| Ok(FailingBackend));
        let frame = FrameRecord::new(0, Image::new_u8(4, 4, 1, vec![1u8; 16]), None);
        let result = analyzer.analyze(&frame).await;
        assert!(result.is_err());
    }
}
