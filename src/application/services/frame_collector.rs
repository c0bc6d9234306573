//! FrameCollector
//!
//! A fixed-capacity FIFO ring of `FrameRecord`s (spec §4.1). Every
//! detector that needs temporal context (flicker, response-time, DLP,
//! photo-attack) borrows a slice from this collector rather than owning
//! frames itself — the single-owner pattern spec.md §9 calls for cyclic
//! references.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::value_objects::{FrameRecord, Image};

/// How many of the most recent timestamps feed the rolling fps average
/// (spec §4.1: "K = min(bufferSize, 30)").
const MAX_FPS_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDropStats {
    pub accepted: u64,
    pub dropped: u64,
}

impl FrameDropStats {
    pub fn drop_rate(&self) -> f32 {
        let total = self.accepted + self.dropped;
        if total == 0 {
            0.0
        } else {
            self.dropped as f32 / total as f32
        }
    }
}

/// Fixed-capacity ring buffer of recently observed frames.
pub struct FrameCollector {
    buffer_size: usize,
    frames: VecDeque<FrameRecord>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    drop_rate: f32,
    rng: StdRng,
    stats: FrameDropStats,
}

impl FrameCollector {
    /// Creates a collector seeded from OS entropy (production use).
    pub fn new(buffer_size: usize, drop_rate: f32) -> Self {
        Self::with_rng(buffer_size, drop_rate, StdRng::from_entropy())
    }

    /// Creates a collector with a deterministic seed, for reproducible tests.
    pub fn with_seed(buffer_size: usize, drop_rate: f32, seed: u64) -> Self {
        Self::with_rng(buffer_size, drop_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(buffer_size: usize, drop_rate: f32, rng: StdRng) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            frames: VecDeque::with_capacity(buffer_size.max(1)),
            frame_width: None,
            frame_height: None,
            drop_rate: drop_rate.clamp(0.0, 1.0),
            rng,
            stats: FrameDropStats::default(),
        }
    }

    /// Pushes a new frame. Returns `false` (and counts a drop) if the
    /// configured `frame_drop_rate` fires, or if the frame's dimensions
    /// differ from the first observed frame — in the latter case the
    /// whole buffer is reset rather than silently mixing frame sizes.
    pub fn add(&mut self, gray: Image, color: Option<Image>, timestamp_ms: u64) -> bool {
        if self.drop_rate > 0.0 && self.rng.gen::<f32>() < self.drop_rate {
            self.stats.dropped += 1;
            return false;
        }

        match (self.frame_width, self.frame_height) {
            (Some(w), Some(h)) if w != gray.width() || h != gray.height() => {
                self.reset();
            }
            _ => {}
        }

        self.frame_width = Some(gray.width());
        self.frame_height = Some(gray.height());

        if self.frames.len() >= self.buffer_size {
            self.frames.pop_front();
        }
        self.frames.push_back(FrameRecord::new(timestamp_ms, gray, color));
        self.stats.accepted += 1;
        true
    }

    /// Returns references to the most recent `n` grayscale frames,
    /// oldest-first, at most `min(n, buffered)` long.
    pub fn get_gray_frames(&self, n: usize) -> Vec<&Image> {
        let take = n.min(self.frames.len());
        self.frames.iter().skip(self.frames.len() - take).map(|f| &f.gray).collect()
    }

    /// Returns references to the most recent `n` frame records
    /// (timestamp + gray + optional color), oldest-first.
    pub fn get_frames(&self, n: usize) -> Vec<&FrameRecord> {
        let take = n.min(self.frames.len());
        self.frames.iter().skip(self.frames.len() - take).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Rolling average fps over the last `min(bufferSize, 30)` timestamps.
    /// Zero until at least two frames have been observed (spec §4.1).
    pub fn average_fps(&self) -> f32 {
        let window = MAX_FPS_WINDOW.min(self.buffer_size);
        let take = window.min(self.frames.len());
        if take < 2 {
            return 0.0;
        }
        let recent: Vec<u64> =
            self.frames.iter().skip(self.frames.len() - take).map(|f| f.timestamp_ms).collect();
        let span_ms = recent.last().unwrap().saturating_sub(*recent.first().unwrap());
        if span_ms == 0 {
            return 0.0;
        }
        (recent.len() as f32 - 1.0) / (span_ms as f32 / 1000.0)
    }

    /// Width/height sampled from the first observed frame; `None` before
    /// any frame has been accepted.
    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        match (self.frame_width, self.frame_height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    pub fn frame_drop_stats(&self) -> FrameDropStats {
        self.stats
    }

    /// Releases all retained frames and clears fps history (spec §4.1
    /// `reset()`). Dimensions and drop stats also reset, since a reset
    /// implies the next frame may come from a different source.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frame_width = None;
        self.frame_height = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32, v: u8) -> Image {
        Image::new_u8(w, h, 1, vec![v; (w * h) as usize])
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut collector = FrameCollector::with_seed(2, 0.0, 1);
        collector.add(gray(2, 2, 1), None, 0);
        collector.add(gray(2, 2, 2), None, 10);
        collector.add(gray(2, 2, 3), None, 20);

        assert_eq!(collector.len(), 2);
        let frames = collector.get_gray_frames(10);
        assert_eq!(frames[0].sample(0, 0, 0), 2.0);
        assert_eq!(frames[1].sample(0, 0, 0), 3.0);
    }

    #[test]
    fn retained_count_never_exceeds_buffer_size() {
        let mut collector = FrameCollector::with_seed(3, 0.0, 7);
        for i in 0..50u64 {
            collector.add(gray(4, 4, i as u8), None, i * 33);
            assert!(collector.len() <= 3);
        }
    }

    #[test]
    fn fps_is_zero_until_two_frames() {
        let mut collector = FrameCollector::with_seed(5, 0.0, 2);
        assert_eq!(collector.average_fps(), 0.0);
        collector.add(gray(2, 2, 1), None, 0);
        assert_eq!(collector.average_fps(), 0.0);
        collector.add(gray(2, 2, 1), None, 100);
        assert!((collector.average_fps() - 10.0).abs() < 0.01);
    }

    #[test]
    fn differing_frame_size_triggers_reset() {
        let mut collector = FrameCollector::with_seed(5, 0.0, 3);
        collector.add(gray(4, 4, 1), None, 0);
        collector.add(gray(4, 4, 1), None, 10);
        assert_eq!(collector.len(), 2);
        collector.add(gray(8, 8, 1), None, 20);
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.frame_dimensions(), Some((8, 8)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut collector = FrameCollector::with_seed(5, 0.0, 4);
        collector.add(gray(2, 2, 1), None, 0);
        collector.reset();
        assert_eq!(collector.len(), 0);
        assert_eq!(collector.frame_dimensions(), None);
    }
}
