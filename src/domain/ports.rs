//! Ports
//!
//! Traits the application layer depends on and the infrastructure layer
//! implements — the injected external collaborators (camera acquisition,
//! face mesh inference, JPEG encoding, wall-clock time) that the engine
//! treats as opaque.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::value_objects::{BoundingBox, FaceObservation, FrameRecord, Image};

#[derive(Debug, Error)]
pub enum ImageOpsError {
    #[error("image dimensions invalid: {0}")]
    InvalidDimensions(String),
    #[error("region of interest out of bounds: {0:?}")]
    RegionOutOfBounds(BoundingBox),
    #[error("image encoding failed: {0}")]
    EncodingFailed(String),
}

/// Pixel-level image operations the scorers and detectors compose from.
///
/// Implementations must be deterministic and must not retain references
/// to the images passed in beyond the call.
pub trait ImageOps: Send + Sync {
    fn to_grayscale(&self, image: &Image) -> Result<Image, ImageOpsError>;

    fn resize(&self, image: &Image, width: u32, height: u32) -> Result<Image, ImageOpsError>;

    fn crop(&self, image: &Image, roi: BoundingBox) -> Result<Image, ImageOpsError>;

    /// Sobel gradient magnitude image, used by sharpness and moire scoring.
    fn sobel_magnitude(&self, image: &Image) -> Result<Image, ImageOpsError>;

    /// Sobel gradient angle image (`atan2(gy, gx)`, radians in `(-pi, pi]`),
    /// used by the moire detector's direction-consistency term.
    fn sobel_angles(&self, image: &Image) -> Result<Image, ImageOpsError>;

    /// Canny edge map, used by moire and optical-distortion scoring.
    fn canny_edges(&self, image: &Image, low_threshold: f32, high_threshold: f32) -> Result<Image, ImageOpsError>;

    /// 2-D DCT magnitude spectrum of a (typically downsampled) grayscale
    /// image, used by the moire and RGB-emission screen-attack detectors.
    fn dct_spectrum(&self, image: &Image) -> Result<Vec<f32>, ImageOpsError>;

    /// Laplacian variance, the classic focus-measure used by the quality
    /// scorer's sharpness sub-score.
    fn laplacian_variance(&self, image: &Image) -> Result<f32, ImageOpsError>;

    /// Mean pixel intensity over the whole image, used by flicker and
    /// response-time screen-attack detectors.
    fn mean_intensity(&self, image: &Image) -> Result<f32, ImageOpsError>;
}

#[derive(Debug, Error)]
pub enum FaceAnalyzerError {
    #[error("face analyzer backend unavailable: {0}")]
    Unavailable(String),
    #[error("face analyzer timed out")]
    Timeout,
    #[error("face analyzer backend error: {0}")]
    Backend(String),
}

/// The single external collaborator that turns a raw frame into zero or
/// more `FaceObservation`s (bounding box, mesh, rotation, gestures).
///
/// Mirrors the "detect faces in a frame" boundary of a native vision
/// backend; a concrete implementation typically bridges to a non-`Send`
/// detector running on a dedicated thread.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    async fn analyze(&self, frame: &FrameRecord) -> Result<Vec<FaceObservation>, FaceAnalyzerError>;
}

#[derive(Debug, Error)]
pub enum JpegEncodingError {
    #[error("jpeg encoding failed: {0}")]
    Failed(String),
}

/// Encodes an `Image` to a JPEG byte buffer for retention as
/// `bestFrameImage` / `bestFaceImage` evidence.
pub trait JpegEncoder: Send + Sync {
    fn encode(&self, image: &Image, quality: u8) -> Result<Vec<u8>, JpegEncodingError>;
}

/// Monotonic wall-clock abstraction, injected so the state machine's
/// timeouts and elapsed-time calculations are deterministically
/// testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}
