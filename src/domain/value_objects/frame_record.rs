//! FrameRecord Value Object
//!
//! An immutable, timestamped grayscale (+ optional color) frame owned by
//! `FrameCollector` (spec §3 "FrameRecord"). Released when evicted from
//! the ring — in Rust this falls out of `Drop` for free once the last
//! owning `VecDeque` slot goes away.

use super::Image;

pub struct FrameRecord {
    pub timestamp_ms: u64,
    pub gray: Image,
    pub color: Option<Image>,
}

impl FrameRecord {
    pub fn new(timestamp_ms: u64, gray: Image, color: Option<Image>) -> Self {
        Self { timestamp_ms, gray, color }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}
