use log::{info, warn};
use shared::{
    fallback_phase, fallback_round_number, AllTimeEntry, Replicated, RoundPhase, RoundSnapshot,
    TowerLayout, WinnerEntry, SEGMENT_HEIGHT,
};

// Round data older than this is treated as a lost server.
pub const OFFLINE_AFTER_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Synchronizing,
    Live,
    Fallback,
}

pub struct EffectiveRound {
    pub round_key: String,
    pub phase: RoundPhase,
    pub remaining: f32,
    pub total_height: f32,
    pub speed_multiplier: u32,
}

// Read-only mirror of the server's round state. Every inbound record
// passes through a replication guard keyed on the server's address, so
// a datagram from anywhere else can never overwrite the view. When the
// server goes quiet the view degrades to the wall-clock schedule that
// every client derives identically on its own.
pub struct RoundView {
    round: Replicated<RoundSnapshot>,
    winners: Replicated<Vec<WinnerEntry>>,
    leaderboard: Replicated<Vec<AllTimeEntry>>,
    last_authoritative_at: Option<u64>,
    mode: ViewMode,
    fallback_cache: Option<(u64, TowerLayout)>,
}

impl RoundView {
    pub fn new(authority: &str) -> Self {
        Self {
            round: Replicated::new(authority),
            winners: Replicated::new(authority),
            leaderboard: Replicated::new(authority),
            last_authoritative_at: None,
            mode: ViewMode::Synchronizing,
            fallback_cache: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn round(&self) -> Option<&RoundSnapshot> {
        self.round.get()
    }

    pub fn winners(&self) -> Option<&Vec<WinnerEntry>> {
        self.winners.get()
    }

    pub fn leaderboard(&self) -> Option<&Vec<AllTimeEntry>> {
        self.leaderboard.get()
    }

    // Returns true when the snapshot starts a round this view has not
    // seen yet, which is the caller's cue to reset per-round state.
    pub fn apply_round_state(
        &mut self,
        snapshot: RoundSnapshot,
        sender: &str,
        local_now_ms: u64,
    ) -> bool {
        let previous = self.round.get().map(|current| current.round_id.clone());

        if !self.round.propose(snapshot, sender) {
            warn!("Dropped round state from non-authoritative sender {}", sender);
            return false;
        }

        self.last_authoritative_at = Some(local_now_ms);
        let current = self.round.get().map(|current| current.round_id.clone());
        previous != current
    }

    pub fn apply_winners(
        &mut self,
        winners: Vec<WinnerEntry>,
        sender: &str,
        local_now_ms: u64,
    ) -> bool {
        if !self.winners.propose(winners, sender) {
            warn!("Dropped winner list from non-authoritative sender {}", sender);
            return false;
        }
        self.last_authoritative_at = Some(local_now_ms);
        true
    }

    pub fn apply_leaderboard(
        &mut self,
        entries: Vec<AllTimeEntry>,
        sender: &str,
        local_now_ms: u64,
    ) -> bool {
        if !self.leaderboard.propose(entries, sender) {
            warn!("Dropped leaderboard from non-authoritative sender {}", sender);
            return false;
        }
        self.last_authoritative_at = Some(local_now_ms);
        true
    }

    pub fn update_mode(&mut self, local_now_ms: u64, sync_ready: bool) {
        let fresh = self
            .last_authoritative_at
            .map(|at| local_now_ms.saturating_sub(at) < OFFLINE_AFTER_MS)
            .unwrap_or(false);

        let next = if fresh {
            if sync_ready {
                ViewMode::Live
            } else {
                ViewMode::Synchronizing
            }
        } else {
            ViewMode::Fallback
        };

        if next != self.mode {
            match next {
                ViewMode::Live => info!("Round view is live"),
                ViewMode::Synchronizing => info!("Waiting for clock sync"),
                ViewMode::Fallback => {
                    warn!("No fresh round data, deriving schedule from wall clock")
                }
            }
            self.mode = next;
        }
    }

    // The round the player should currently be shown. Live mode reads
    // the mirrored snapshot against the synced server clock; fallback
    // mode derives round number, phase and tower from wall-clock time
    // alone so that disconnected clients still agree with each other.
    pub fn effective_round(
        &mut self,
        local_now_ms: u64,
        server_now_ms: Option<u64>,
    ) -> Option<EffectiveRound> {
        match self.mode {
            ViewMode::Synchronizing => None,
            ViewMode::Live => {
                let server_now_ms = server_now_ms?;
                let snapshot = self.round.get()?;
                Some(EffectiveRound {
                    round_key: snapshot.round_id.clone(),
                    phase: snapshot.phase,
                    remaining: snapshot.remaining(server_now_ms),
                    total_height: snapshot.segments.len() as f32 * SEGMENT_HEIGHT,
                    speed_multiplier: snapshot.timer.speed_multiplier,
                })
            }
            ViewMode::Fallback => {
                let unix_seconds = local_now_ms / 1000;
                let round_number = fallback_round_number(unix_seconds);
                let (phase, remaining) = fallback_phase(unix_seconds);

                let cached =
                    matches!(&self.fallback_cache, Some((number, _)) if *number == round_number);
                if !cached {
                    self.fallback_cache =
                        Some((round_number, TowerLayout::from_seed(round_number)));
                }
                let (_, layout) = self.fallback_cache.as_ref()?;

                Some(EffectiveRound {
                    round_key: format!("offline-{}", round_number),
                    phase,
                    remaining,
                    total_height: layout.total_height(),
                    speed_multiplier: 1,
                })
            }
        }
    }
}
