use serde::{Deserialize, Serialize};

use crate::{MAX_MIDDLE_SEGMENTS, MIN_MIDDLE_SEGMENTS, ROUND_CYCLE_SECONDS, SEGMENT_HEIGHT};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Base,
    Ramps,
    Platforms,
    Spiral,
    Summit,
}

pub const MIDDLE_CATALOG: [Segment; 3] = [Segment::Ramps, Segment::Platforms, Segment::Spiral];

const LCG_MULTIPLIER: u64 = 1_103_515_245;
const LCG_INCREMENT: u64 = 12_345;
const LCG_MODULUS_MASK: u64 = (1 << 31) - 1;

// Fixed recurrence, pinned so every process that seeds with the same
// round number derives the same tower:
//   state' = (state * 1103515245 + 12345) mod 2^31
// The multiply wraps in u64 and the mask is exact for the power-of-two
// modulus, so seeds larger than the modulus (millisecond round ids)
// reduce correctly on the first step.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT)
            & LCG_MODULUS_MASK;
        self.state as f64 / LCG_MODULUS_MASK as f64
    }

    // Inclusive on both ends: floor(f * (max - min + 1)) + min. The float
    // can land on 1.0 exactly, so the draw is clamped back to max.
    pub fn next_range(&mut self, min: u32, max: u32) -> u32 {
        let span = (max - min + 1) as f64;
        let drawn = (self.next_f64() * span) as u32 + min;
        drawn.min(max)
    }
}

pub fn generate_middle_segments(seed: u64) -> Vec<Segment> {
    let mut rng = SeededRng::new(seed);
    let count = rng.next_range(MIN_MIDDLE_SEGMENTS, MAX_MIDDLE_SEGMENTS);

    (0..count)
        .map(|_| {
            let pick = rng.next_range(0, MIDDLE_CATALOG.len() as u32 - 1);
            MIDDLE_CATALOG[pick as usize]
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TowerLayout {
    pub seed: u64,
    pub segments: Vec<Segment>,
}

impl TowerLayout {
    pub fn from_seed(seed: u64) -> Self {
        let mut segments = vec![Segment::Base];
        segments.extend(generate_middle_segments(seed));
        segments.push(Segment::Summit);

        Self { seed, segments }
    }

    pub fn total_height(&self) -> f32 {
        self.segments.len() as f32 * SEGMENT_HEIGHT
    }

    pub fn middle_count(&self) -> usize {
        self.segments.len() - 2
    }
}

// Round number a disconnected client derives from wall-clock seconds
// alone. Every machine lands in the same bucket, so offline towers
// match without any network round trip.
pub fn fallback_round_number(unix_seconds: u64) -> u64 {
    unix_seconds / ROUND_CYCLE_SECONDS
}
