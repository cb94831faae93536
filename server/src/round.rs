use log::info;
use shared::protocol::RoundSnapshot;
use shared::round::{RoundPhase, RoundTimer};
use shared::tower::TowerLayout;

use crate::config::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Timer hit zero; progress is frozen and results go out.
    RoundOver,
    /// Results dwell elapsed; intermission begins.
    BreakStarted,
    /// Intermission elapsed; a fresh round is live.
    RoundStarted,
}

pub struct RoundMachine {
    base_timer_seconds: u32,
    ending_dwell_ms: u64,
    break_ms: u64,
    round_id: String,
    seed: u64,
    phase: RoundPhase,
    started_at: u64,
    phase_entered_at: u64,
    timer: RoundTimer,
    finisher_count: u32,
    tower: TowerLayout,
}

impl RoundMachine {
    pub fn new(config: &ServerConfig, now_ms: u64) -> Self {
        let seed = now_ms.max(1);
        let tower = TowerLayout::from_seed(seed);
        info!(
            "Round {} started: {} segments, {}s timer",
            seed,
            tower.segments.len(),
            config.base_timer_seconds
        );

        Self {
            base_timer_seconds: config.base_timer_seconds,
            ending_dwell_ms: config.ending_dwell_seconds as u64 * 1000,
            break_ms: config.break_seconds as u64 * 1000,
            round_id: seed.to_string(),
            seed,
            phase: RoundPhase::Active,
            started_at: now_ms,
            phase_entered_at: now_ms,
            timer: RoundTimer::start(config.base_timer_seconds, now_ms),
            finisher_count: 0,
            tower,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round_id(&self) -> &str {
        &self.round_id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tower(&self) -> &TowerLayout {
        &self.tower
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn finisher_count(&self) -> u32 {
        self.finisher_count
    }

    pub fn speed_multiplier(&self) -> u32 {
        self.timer.speed_multiplier
    }

    pub fn remaining(&self, now_ms: u64) -> f32 {
        match self.phase {
            RoundPhase::Active => self.timer.remaining(now_ms),
            _ => 0.0,
        }
    }

    /// Advances whichever phase transition is due at `now_ms`. At most one
    /// transition fires per call; the poll cadence is far shorter than any
    /// phase, so transitions are never skipped.
    pub fn poll(&mut self, now_ms: u64) -> Option<RoundEvent> {
        match self.phase {
            RoundPhase::Active if self.timer.expired(now_ms) => {
                self.phase = RoundPhase::Ending;
                self.phase_entered_at = now_ms;
                info!(
                    "Round {} over: {} finisher(s)",
                    self.round_id, self.finisher_count
                );
                Some(RoundEvent::RoundOver)
            }
            RoundPhase::Ending
                if now_ms.saturating_sub(self.phase_entered_at) >= self.ending_dwell_ms =>
            {
                self.phase = RoundPhase::Break;
                self.phase_entered_at = now_ms;
                Some(RoundEvent::BreakStarted)
            }
            RoundPhase::Break if now_ms.saturating_sub(self.phase_entered_at) >= self.break_ms => {
                self.start_round(now_ms);
                Some(RoundEvent::RoundStarted)
            }
            _ => None,
        }
    }

    /// Registers one finish: bumps the shared count and re-anchors the
    /// timer checkpoint before raising the decay rate, so the public
    /// countdown stays continuous. Returns the 1-based finish order.
    /// Callers gate this on the ACTIVE phase.
    pub fn record_finish(&mut self, now_ms: u64) -> u32 {
        self.finisher_count += 1;
        self.timer.set_multiplier(self.finisher_count + 1, now_ms);
        self.finisher_count
    }

    fn start_round(&mut self, now_ms: u64) {
        // Seeds are clock-derived but bumped past the previous one, so
        // consecutive rounds never share an id even across clock hiccups.
        let seed = now_ms.max(self.seed + 1);
        self.round_id = seed.to_string();
        self.seed = seed;
        self.phase = RoundPhase::Active;
        self.started_at = now_ms;
        self.phase_entered_at = now_ms;
        self.timer = RoundTimer::start(self.base_timer_seconds, now_ms);
        self.finisher_count = 0;
        self.tower = TowerLayout::from_seed(seed);

        info!(
            "Round {} started: {} segments, {}s timer",
            self.round_id,
            self.tower.segments.len(),
            self.base_timer_seconds
        );
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.round_id.clone(),
            seed: self.seed,
            phase: self.phase,
            started_at: self.started_at,
            phase_entered_at: self.phase_entered_at,
            base_timer_seconds: self.base_timer_seconds,
            timer: self.timer,
            finisher_count: self.finisher_count,
            segments: self.tower.segments.clone(),
        }
    }
}
