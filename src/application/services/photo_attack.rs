//! Photo-Attack Detector (spec §4.5).
//!
//! Buffers the last `B` `FaceObservation`s and scores 2D
//! motion-perspective consistency across the 468-point mesh: a flat
//! photo moves as one rigid plane, while a real face's near-camera
//! points (nose) displace more than its far points (ears) under head
//! rotation.

use std::collections::VecDeque;

use crate::domain::entities::PhotoDetectorOptions;
use crate::domain::value_objects::{FaceObservation, Point2};

const NEAR_INDICES: [usize; 4] = [1, 4, 6, 195];
const MID_INDICES: [usize; 2] = [127, 356];
const FAR_INDICES: [usize; 2] = [162, 389];

#[derive(Debug, Clone, Copy)]
struct Displacement {
    dx: f32,
    dy: f32,
    magnitude: f32,
}

#[derive(Debug, Clone)]
pub struct PhotoAttackResult {
    pub is_photo: bool,
    pub score: f32,
    pub trusted: bool,
    pub motion_variance: f32,
    pub perspective_ratio: f32,
    pub direction_consistency: f32,
    pub affine_match: f32,
}

impl PhotoAttackResult {
    fn not_ready() -> Self {
        Self {
            is_photo: false,
            score: 0.0,
            trusted: false,
            motion_variance: 0.0,
            perspective_ratio: 1.0,
            direction_consistency: 1.0,
            affine_match: 0.0,
        }
    }
}

pub struct PhotoAttackDetector {
    buffer: VecDeque<FaceObservation>,
    capacity: usize,
    frames_seen: u64,
}

impl PhotoAttackDetector {
    pub fn new(capacity: usize) -> Self {
        Self { buffer: VecDeque::with_capacity(capacity.max(1)), capacity: capacity.max(1), frames_seen: 0 }
    }

    pub fn observe(&mut self, face: FaceObservation) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(face);
        self.frames_seen += 1;
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.frames_seen = 0;
    }

    pub fn evaluate(&self, options: &PhotoDetectorOptions) -> PhotoAttackResult {
        if self.buffer.len() < 2 {
            return PhotoAttackResult::not_ready();
        }

        let displacements = self.collect_displacements();
        if displacements.near.is_empty() {
            return PhotoAttackResult::not_ready();
        }

        let all_magnitudes: Vec<f32> = [&displacements.near, &displacements.mid, &displacements.far]
            .into_iter()
            .flatten()
            .map(|d| d.magnitude)
            .collect();

        let motion_variance = variance(&all_magnitudes);

        let near_mean = mean_magnitude(&displacements.near);
        let far_mean = mean_magnitude(&displacements.far);
        let perspective_ratio = if far_mean > f32::EPSILON { near_mean / far_mean } else { 1.0 };

        let avg = average_vector(&all_magnitudes_vec(&displacements));
        let direction_consistency = direction_consistency(&all_magnitudes_vec(&displacements), avg);
        let affine_match = affine_match(&all_magnitudes_vec(&displacements), avg);

        let ratio_indicator = if perspective_ratio < 1.0 {
            0.95
        } else {
            // Real faces show ratio appreciably > 1; map toward 0 as the
            // ratio climbs above 1 and a spoof's near-far uniformity fades.
            (1.0 - (perspective_ratio - 1.0).min(1.0)).clamp(0.0, 1.0)
        };

        let variance_indicator = low_variance_indicator(motion_variance);
        let direction_indicator = direction_consistency;
        let affine_indicator = affine_match.clamp(0.0, 1.0);

        let score = if ratio_indicator > 0.9 {
            ratio_indicator
        } else {
            (ratio_indicator * 2.0 + variance_indicator + direction_indicator + affine_indicator) / 5.0
        };

        let trusted = self.frames_seen >= options.motion_liveness_frame_buffer_size as u64;

        PhotoAttackResult {
            is_photo: score > 0.5,
            score,
            trusted,
            motion_variance,
            perspective_ratio,
            direction_consistency,
            affine_match,
        }
    }

    fn collect_displacements(&self) -> GroupDisplacements {
        let mut near = Vec::new();
        let mut mid = Vec::new();
        let mut far = Vec::new();

        for pair in self.buffer.iter().collect::<Vec<_>>().windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            accumulate_group(prev, curr, &NEAR_INDICES, &mut near);
            accumulate_group(prev, curr, &MID_INDICES, &mut mid);
            accumulate_group(prev, curr, &FAR_INDICES, &mut far);
        }

        GroupDisplacements { near, mid, far }
    }
}

struct GroupDisplacements {
    near: Vec<Displacement>,
    mid: Vec<Displacement>,
    far: Vec<Displacement>,
}

fn accumulate_group(
    prev: &FaceObservation,
    curr: &FaceObservation,
    indices: &[usize],
    out: &mut Vec<Displacement>,
) {
    for &idx in indices {
        if let (Some(p0), Some(p1)) = (prev.mesh_point(idx), curr.mesh_point(idx)) {
            let (a, b) = (p0.xy(), p1.xy());
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            out.push(Displacement { dx, dy, magnitude: (dx * dx + dy * dy).sqrt() });
        }
    }
}

fn mean_magnitude(ds: &[Displacement]) -> f32 {
    if ds.is_empty() {
        return 0.0;
    }
    ds.iter().map(|d| d.magnitude).sum::<f32>() / ds.len() as f32
}

fn all_magnitudes_vec(groups: &GroupDisplacements) -> Vec<Displacement> {
    groups.near.iter().chain(groups.mid.iter()).chain(groups.far.iter()).copied().collect()
}

fn average_vector(ds: &[Displacement]) -> Point2 {
    if ds.is_empty() {
        return Point2::new(0.0, 0.0);
    }
    let n = ds.len() as f32;
    Point2::new(ds.iter().map(|d| d.dx).sum::<f32>() / n, ds.iter().map(|d| d.dy).sum::<f32>() / n)
}

fn direction_consistency(ds: &[Displacement], avg: Point2) -> f32 {
    if ds.is_empty() {
        return 1.0;
    }
    let avg_mag = (avg.x * avg.x + avg.y * avg.y).sqrt();
    if avg_mag <= f32::EPSILON {
        return 1.0;
    }
    let cosines: Vec<f32> = ds
        .iter()
        .filter(|d| d.magnitude > f32::EPSILON)
        .map(|d| (d.dx * avg.x + d.dy * avg.y) / (d.magnitude * avg_mag))
        .collect();
    if cosines.is_empty() {
        return 1.0;
    }
    let mean_cosine = cosines.iter().sum::<f32>() / cosines.len() as f32;
    ((mean_cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// `1 - mean(||d - avgD||) / ||avgD||`, high when every point follows the
/// same rigid affine motion (the signature of a flat photo).
fn affine_match(ds: &[Displacement], avg: Point2) -> f32 {
    if ds.is_empty() {
        return 0.0;
    }
    let avg_mag = (avg.x * avg.x + avg.y * avg.y).sqrt();
    if avg_mag <= f32::EPSILON {
        return 0.0;
    }
    let mean_residual = ds
        .iter()
        .map(|d| {
            let rx = d.dx - avg.x;
            let ry = d.dy - avg.y;
            (rx * rx + ry * ry).sqrt()
        })
        .sum::<f32>()
        / ds.len() as f32;
    (1.0 - mean_residual / avg_mag).clamp(0.0, 1.0)
}

fn low_variance_indicator(variance: f32) -> f32 {
    // Low motion variance implies rigid (photo-like) motion; map inversely,
    // saturating once variance climbs past a few pixels squared.
    (1.0 - (variance / 4.0)).clamp(0.0, 1.0)
}

fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{BoundingBox, Point3};

    fn mesh_with_offset(dx: f32, dy: f32) -> Vec<Point3> {
        let mut mesh = vec![Point3::new(0.0, 0.0, 0.0); 400];
        for &idx in NEAR_INDICES.iter().chain(MID_INDICES.iter()).chain(FAR_INDICES.iter()) {
            mesh[idx] = Point3::new(idx as f32 + dx, idx as f32 + dy, 0.0);
        }
        mesh
    }

    fn obs(dx: f32, dy: f32) -> FaceObservation {
        FaceObservation::new(BoundingBox::new(0, 0, 100, 100)).with_mesh(mesh_with_offset(dx, dy))
    }

    #[test]
    fn identical_frames_are_not_flagged_until_filled() {
        let mut detector = PhotoAttackDetector::new(15);
        for _ in 0..3 {
            detector.observe(obs(0.0, 0.0));
        }
        let result = detector.evaluate(&PhotoDetectorOptions::default());
        assert!(!result.trusted);
    }

    #[test]
    fn uniform_translation_is_flagged_as_photo() {
        let mut detector = PhotoAttackDetector::new(15);
        for step in 0..20 {
            detector.observe(obs(step as f32 * 2.0, 0.0));
        }
        let result = detector.evaluate(&PhotoDetectorOptions::default());
        assert!(result.is_photo);
        assert!(result.score >= 0.9);
        assert!(result.trusted);
    }

    #[test]
    fn static_photo_reaches_neutral_perspective_ratio_as_buffer_fills() {
        let mut detector = PhotoAttackDetector::new(15);
        for _ in 0..20 {
            detector.observe(obs(2.0, 0.0));
        }
        let result = detector.evaluate(&PhotoDetectorOptions::default());
        assert!(result.is_photo);
        assert_eq!(result.perspective_ratio, 1.0);
        assert!(result.trusted);
    }

    #[test]
    fn not_enough_frames_reports_not_ready() {
        let detector = PhotoAttackDetector::new(15);
        let result = detector.evaluate(&PhotoDetectorOptions::default());
        assert!(!result.is_photo);
        assert!(!result.trusted);
    }
}
