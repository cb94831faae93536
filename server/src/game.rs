use log::{debug, info};
use shared::protocol::{AllTimeEntry, RoundSnapshot, WinnerEntry};
use shared::round::RoundPhase;

use crate::config::ServerConfig;
use crate::round::{RoundEvent, RoundMachine};
use crate::session::SessionTracker;

/// What the periodic poll produced; the network layer turns these into
/// broadcasts.
#[derive(Debug)]
pub enum WorldEvent {
    RoundOver { winners: Vec<WinnerEntry> },
    BreakStarted,
    RoundStarted { leaderboard: Vec<AllTimeEntry> },
}

/// Payload for the finish broadcast after an accepted finish.
#[derive(Debug)]
pub struct FinishOutcome {
    pub display_name: String,
    pub finish_order: u32,
    pub speed_multiplier: u32,
}

/// The authoritative game world. Owned by the main loop; every mutation
/// of round, session, or all-time state funnels through here.
pub struct GameWorld {
    config: ServerConfig,
    machine: RoundMachine,
    sessions: SessionTracker,
    store_dirty: bool,
    last_save_at: u64,
}

impl GameWorld {
    pub fn new(config: ServerConfig, now_ms: u64) -> Self {
        let machine = RoundMachine::new(&config, now_ms);
        Self {
            config,
            machine,
            sessions: SessionTracker::new(),
            store_dirty: false,
            last_save_at: 0,
        }
    }

    pub fn seed_all_time(&mut self, entries: Vec<AllTimeEntry>) {
        self.sessions.seed_all_time(entries);
    }

    pub fn phase(&self) -> RoundPhase {
        self.machine.phase()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.machine.snapshot()
    }

    pub fn leaderboard(&self) -> Vec<AllTimeEntry> {
        self.sessions.compute_leaderboard()
    }

    pub fn remaining(&self, now_ms: u64) -> f32 {
        self.machine.remaining(now_ms)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn handle_join(&mut self, identity: &str, display_name: &str, now_ms: u64) {
        if self.sessions.join(identity, display_name, now_ms) {
            info!("{} ({}) joined the round", display_name, identity);
        }
    }

    /// One height sample from the position feed. Samples outside ACTIVE
    /// change nothing; within a round the session max only rises.
    pub fn handle_height(&mut self, identity: &str, height: f32, now_ms: u64) {
        if self.machine.phase() != RoundPhase::Active {
            return;
        }
        if !height.is_finite() || height < 0.0 {
            debug!("Ignoring bogus height sample from {}", identity);
            return;
        }

        if self.sessions.record_height(identity, height) {
            let Some(session) = self.sessions.get(identity) else {
                return;
            };
            let display_name = session.display_name.clone();
            let max_height = session.max_height;
            if self
                .sessions
                .update_all_time(identity, &display_name, 0.0, max_height, false, now_ms)
            {
                self.store_dirty = true;
            }
        }
    }

    /// A finish report. Accepted once per identity per round and only
    /// while the round is ACTIVE; everything else is dropped quietly.
    pub fn handle_finish(
        &mut self,
        identity: &str,
        client_elapsed_ms: u64,
        now_ms: u64,
    ) -> Option<FinishOutcome> {
        if self.machine.phase() != RoundPhase::Active {
            debug!("Finish from {} after timer expiry, ignored", identity);
            return None;
        }

        let session = self.sessions.get(identity)?;
        if session.finished {
            debug!("Duplicate finish from {}, ignored", identity);
            return None;
        }
        let display_name = session.display_name.clone();

        let finish_time = if self.config.trust_client_finish_time {
            client_elapsed_ms as f32 / 1000.0
        } else {
            now_ms.saturating_sub(self.machine.started_at()) as f32 / 1000.0
        };

        let finish_order = self.machine.record_finish(now_ms);
        self.sessions.record_finish(identity, finish_time, finish_order);

        let max_height = self
            .sessions
            .get(identity)
            .map(|s| s.max_height)
            .unwrap_or(0.0);
        if self.sessions.update_all_time(
            identity,
            &display_name,
            finish_time,
            max_height,
            true,
            now_ms,
        ) {
            self.store_dirty = true;
        }

        Some(FinishOutcome {
            display_name,
            finish_order,
            speed_multiplier: self.machine.speed_multiplier(),
        })
    }

    pub fn handle_leave(&mut self, identity: &str) {
        if self.sessions.remove(identity) {
            info!("{} left the round", identity);
        }
    }

    /// Drives phase transitions. Winners are ranked from the expiring
    /// round's sessions; the reset happens only when the next round
    /// actually starts.
    pub fn poll(&mut self, now_ms: u64) -> Option<WorldEvent> {
        match self.machine.poll(now_ms)? {
            RoundEvent::RoundOver => Some(WorldEvent::RoundOver {
                winners: self.sessions.compute_winners(),
            }),
            RoundEvent::BreakStarted => Some(WorldEvent::BreakStarted),
            RoundEvent::RoundStarted => {
                self.sessions.reset_round();
                Some(WorldEvent::RoundStarted {
                    leaderboard: self.sessions.compute_leaderboard(),
                })
            }
        }
    }

    /// Rows for a persistence write, or None while the table is clean or
    /// the cooldown still runs. Taking the rows marks the table clean;
    /// a failed write reports back through `mark_store_dirty`.
    pub fn take_save_request(&mut self, now_ms: u64) -> Option<Vec<AllTimeEntry>> {
        if !self.store_dirty {
            return None;
        }
        if now_ms.saturating_sub(self.last_save_at) < self.config.persist_cooldown_ms {
            return None;
        }

        self.store_dirty = false;
        self.last_save_at = now_ms;
        Some(self.sessions.persistable(self.config.persist_top_n))
    }

    pub fn mark_store_dirty(&mut self) {
        self.store_dirty = true;
    }

    /// Shutdown flush: pending rows regardless of the cooldown.
    pub fn flush_rows(&mut self) -> Option<Vec<AllTimeEntry>> {
        if !self.store_dirty {
            return None;
        }
        self.store_dirty = false;
        Some(self.sessions.persistable(self.config.persist_top_n))
    }
}
