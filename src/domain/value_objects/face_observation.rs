//! FaceObservation Value Object
//!
//! The per-frame output of the external `FaceAnalyzer` (spec §3
//! "FaceObservation"): a face box, an optional 468+ point mesh, named
//! landmark groups, head-pose angles, coarse real/live scores and
//! gesture labels.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Score};

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A 3D mesh point; `z` is the analyzer's pseudo-depth estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Head-pose rotation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Named landmark groups used by the Frontality Scorer. Absence of a
/// group is a first-class, neutral case — never an error (spec §9).
pub const LANDMARK_LEFT_EYE: &str = "left_eye";
pub const LANDMARK_RIGHT_EYE: &str = "right_eye";
pub const LANDMARK_NOSE: &str = "nose";
pub const LANDMARK_MOUTH: &str = "mouth";

/// Minimum mesh length for the 468-point face mesh model this engine
/// targets (spec §3: "length >= 468 when present").
pub const MIN_MESH_POINTS: usize = 468;

/// A single frame's face analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bbox: BoundingBox,
    pub mesh: Option<Vec<Point3>>,
    pub annotations: HashMap<String, Vec<Point2>>,
    pub rotation: Rotation,
    pub real: Option<Score>,
    pub live: Option<Score>,
    pub gestures: Vec<String>,
}

impl FaceObservation {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            mesh: None,
            annotations: HashMap::new(),
            rotation: Rotation::default(),
            real: None,
            live: None,
            gestures: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: Vec<Point3>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_annotation(mut self, group: &str, points: Vec<Point2>) -> Self {
        self.annotations.insert(group.to_string(), points);
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scores(mut self, real: f32, live: f32) -> Self {
        self.real = Some(Score::new(real));
        self.live = Some(Score::new(live));
        self
    }

    pub fn with_gestures(mut self, gestures: Vec<String>) -> Self {
        self.gestures = gestures;
        self
    }

    /// Landmark points for a named group, or `None` if the analyzer
    /// didn't report that group for this frame.
    pub fn landmarks(&self, group: &str) -> Option<&[Point2]> {
        self.annotations.get(group).map(Vec::as_slice)
    }

    /// Returns a mesh point by index, if the mesh is present and long enough.
    pub fn mesh_point(&self, index: usize) -> Option<Point3> {
        self.mesh.as_ref().and_then(|m| m.get(index).copied())
    }

    /// True when any gesture label contains the given (case-insensitive) substring.
    pub fn has_gesture_containing(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.gestures.iter().any(|g| g.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_landmark_group_is_none_not_error() {
        let obs = FaceObservation::new(BoundingBox::new(0, 0, 10, 10));
        assert!(obs.landmarks(LANDMARK_LEFT_EYE).is_none());
    }

    #[test]
    fn gesture_match_is_case_insensitive() {
        let obs = FaceObservation::new(BoundingBox::new(0, 0, 10, 10))
            .with_gestures(vec!["Facing Center".to_string()]);
        assert!(obs.has_gesture_containing("facing center"));
    }

    #[test]
    fn mesh_point_out_of_range_is_none() {
        let obs = FaceObservation::new(BoundingBox::new(0, 0, 10, 10))
            .with_mesh(vec![Point3::new(1.0, 2.0, 0.0)]);
        assert!(obs.mesh_point(10).is_none());
        assert!(obs.mesh_point(0).is_some());
    }
}
