//! Frontality Scorer (spec §4.2).
//!
//! Fuses landmark symmetry, edge symmetry inside the face ROI, head-pose
//! angles and a gesture hint into a single `[0,1]` score. Every layer
//! degrades to a neutral value instead of propagating an error — a
//! `PrimitiveError` from `ImageOps` only ever costs the edge-symmetry
//! layer, never the whole score (spec §4.2 "Failure semantics").

use std::sync::Arc;

use tracing::warn;

use crate::domain::entities::FrontalityOptions;
use crate::domain::ports::ImageOps;
use crate::domain::value_objects::{
    FaceObservation, Score, LANDMARK_LEFT_EYE, LANDMARK_MOUTH, LANDMARK_NOSE, LANDMARK_RIGHT_EYE,
};

const LANDMARK_WEIGHT: f32 = 0.40;
const EDGE_WEIGHT: f32 = 0.35;
const POSE_WEIGHT: f32 = 0.25;

const EYE_TOL: f32 = 0.3;
const MOUTH_TOL: f32 = 0.2;
const NOSE_TOL: f32 = 0.25;

pub struct FrontalityScorer {
    image_ops: Arc<dyn ImageOps>,
}

impl FrontalityScorer {
    pub fn new(image_ops: Arc<dyn ImageOps>) -> Self {
        Self { image_ops }
    }

    pub fn score(
        &self,
        face: &FaceObservation,
        gray_frame: &crate::domain::value_objects::Image,
        options: &FrontalityOptions,
    ) -> Score {
        let landmark = self.landmark_symmetry(face);
        let edge = self.edge_symmetry(face, gray_frame);
        let pose = Self::pose_score(face, options);
        let gesture_multiplier = Self::gesture_multiplier(face);

        let combined = landmark * LANDMARK_WEIGHT + edge * EDGE_WEIGHT + pose * POSE_WEIGHT;
        Score::new(combined.value() * gesture_multiplier)
    }

    /// Eye Y-alignment (0.5), nose X vs. eye midpoint (0.3), mouth-corner
    /// Y-alignment (0.2). Missing groups default to neutral (1.0).
    fn landmark_symmetry(&self, face: &FaceObservation) -> Score {
        let eyes = face.landmarks(LANDMARK_LEFT_EYE).zip(face.landmarks(LANDMARK_RIGHT_EYE));
        let eye_score = eyes
            .and_then(|(left, right)| {
                let l = left.first()?;
                let r = right.first()?;
                Some(Self::y_alignment(l.y, r.y, l.distance(r), EYE_TOL))
            })
            .unwrap_or(1.0);

        let nose_score = face
            .landmarks(LANDMARK_NOSE)
            .and_then(|nose| nose.first())
            .zip(face.landmarks(LANDMARK_LEFT_EYE).zip(face.landmarks(LANDMARK_RIGHT_EYE)))
            .and_then(|(nose, (left, right))| {
                let l = left.first()?;
                let r = right.first()?;
                let eye_mid_x = (l.x + r.x) / 2.0;
                let eye_distance = l.distance(r);
                if eye_distance <= f32::EPSILON {
                    return Some(1.0);
                }
                Some((1.0 - (nose.x - eye_mid_x).abs() / (eye_distance * NOSE_TOL)).clamp(0.0, 1.0))
            })
            .unwrap_or(1.0);

        let mouth_score = face
            .landmarks(LANDMARK_MOUTH)
            .and_then(|mouth| {
                if mouth.len() < 2 {
                    return None;
                }
                let left = mouth[0];
                let right = mouth[mouth.len() - 1];
                Some(Self::y_alignment(left.y, right.y, left.distance(&right), MOUTH_TOL))
            })
            .unwrap_or(1.0);

        Score::new(eye_score * 0.5 + nose_score * 0.3 + mouth_score * 0.2)
    }

    fn y_alignment(a_y: f32, b_y: f32, distance: f32, tol: f32) -> f32 {
        if distance <= f32::EPSILON {
            return 1.0;
        }
        (1.0 - (a_y - b_y).abs() / (distance * tol)).clamp(0.0, 1.0)
    }

    /// `|leftHalfSobelSum - rightHalfSobelSum| / max`, floored at 0.5 so a
    /// naturally asymmetric lighting condition never drags the overall
    /// score to zero on its own.
    fn edge_symmetry(
        &self,
        face: &FaceObservation,
        gray_frame: &crate::domain::value_objects::Image,
    ) -> Score {
        let roi = face.bbox.clip_to(gray_frame.width() as i32, gray_frame.height() as i32);
        if roi.area() <= 0 {
            return Score::ONE;
        }

        let result = self
            .image_ops
            .crop(gray_frame, roi.clone())
            .and_then(|cropped| self.image_ops.sobel_magnitude(&cropped));

        match result {
            Ok(sobel) => {
                let width = sobel.width();
                let half = width / 2;
                if half == 0 {
                    return Score::ONE;
                }
                let mut left_sum = 0.0f32;
                let mut right_sum = 0.0f32;
                for y in 0..sobel.height() {
                    for x in 0..half {
                        left_sum += sobel.sample(x, y, 0);
                    }
                    for x in half..width {
                        right_sum += sobel.sample(x, y, 0);
                    }
                }
                let max = left_sum.max(right_sum);
                if max <= f32::EPSILON {
                    return Score::ONE;
                }
                let ratio = 1.0 - (left_sum - right_sum).abs() / max;
                Score::new(ratio.max(0.5))
            }
            Err(err) => {
                warn!(error = %err, "edge symmetry fell back to neutral after ImageOps failure");
                Score::ONE
            }
        }
    }

    /// Starts at 1.0, subtracts a weighted excess-over-threshold penalty
    /// per axis (spec §4.2 pose layer).
    fn pose_score(face: &FaceObservation, options: &FrontalityOptions) -> Score {
        let yaw_excess = (face.rotation.yaw.abs() - options.yaw_threshold).max(0.0);
        let pitch_excess = (face.rotation.pitch.abs() - options.pitch_threshold).max(0.0);
        let roll_excess = (face.rotation.roll.abs() - options.roll_threshold).max(0.0);
        let penalty = 0.15 * yaw_excess + 0.10 * pitch_excess + 0.12 * roll_excess;
        Score::new(1.0 - penalty)
    }

    /// 1.0 if any gesture mentions facing the camera dead-on, else 0.75.
    fn gesture_multiplier(face: &FaceObservation) -> f32 {
        if face.has_gesture_containing("facing center") || face.has_gesture_containing("facing camera") {
            1.0
        } else {
            0.75
        }
    }
}
