use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BASE_TIMER_SECONDS, BREAK_SECONDS, ENDING_DWELL_SECONDS, ROUND_CYCLE_SECONDS};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Active,
    Ending,
    Break,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Active => write!(f, "ACTIVE"),
            RoundPhase::Ending => write!(f, "ENDING"),
            RoundPhase::Break => write!(f, "BREAK"),
        }
    }
}

// Countdown checkpoint. Remaining time is always computed from the pair
// below, never accumulated tick by tick, so a rate change mid-round
// cannot drift the clock.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RoundTimer {
    pub remaining_at_rate_change: f32,
    pub last_rate_change_at: u64,
    pub speed_multiplier: u32,
}

impl RoundTimer {
    pub fn start(base_seconds: u32, now_ms: u64) -> Self {
        Self {
            remaining_at_rate_change: base_seconds as f32,
            last_rate_change_at: now_ms,
            speed_multiplier: 1,
        }
    }

    pub fn remaining(&self, now_ms: u64) -> f32 {
        let elapsed = now_ms.saturating_sub(self.last_rate_change_at) as f32 / 1000.0;
        (self.remaining_at_rate_change - elapsed * self.speed_multiplier as f32).max(0.0)
    }

    // Re-anchors the checkpoint at `now_ms` before the new rate takes
    // effect, keeping the public countdown continuous.
    pub fn set_multiplier(&mut self, multiplier: u32, now_ms: u64) {
        self.remaining_at_rate_change = self.remaining(now_ms);
        self.last_rate_change_at = now_ms;
        self.speed_multiplier = multiplier;
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        self.remaining(now_ms) <= 0.0
    }
}

// Phase and remaining seconds implied by wall-clock position inside the
// fixed cycle. This is what a client shows when no server is reachable.
pub fn fallback_phase(unix_seconds: u64) -> (RoundPhase, f32) {
    let offset = (unix_seconds % ROUND_CYCLE_SECONDS) as u32;

    if offset < BASE_TIMER_SECONDS {
        (RoundPhase::Active, (BASE_TIMER_SECONDS - offset) as f32)
    } else if offset < BASE_TIMER_SECONDS + ENDING_DWELL_SECONDS {
        (RoundPhase::Ending, 0.0)
    } else {
        (RoundPhase::Break, 0.0)
    }
}
