use serde::{Deserialize, Serialize};

use crate::round::{RoundPhase, RoundTimer};
use crate::tower::Segment;

// Authoritative round state, broadcast whole. Clients mirror it and
// derive the countdown locally from the embedded timer checkpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub round_id: String,
    pub seed: u64,
    pub phase: RoundPhase,
    pub started_at: u64,
    pub phase_entered_at: u64,
    pub base_timer_seconds: u32,
    pub timer: RoundTimer,
    pub finisher_count: u32,
    pub segments: Vec<Segment>,
}

impl RoundSnapshot {
    pub fn remaining(&self, server_now_ms: u64) -> f32 {
        self.timer.remaining(server_now_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WinnerEntry {
    pub identity: String,
    pub display_name: String,
    // Seconds; 0.0 marks a podium spot earned on height alone.
    pub finish_time: f32,
    pub max_height: f32,
    pub rank: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AllTimeEntry {
    pub identity: String,
    pub display_name: String,
    // Best finish in seconds; 0.0 means never finished.
    pub best_time: f32,
    pub best_height: f32,
    pub finish_count: u32,
    pub last_played: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        identity: String,
        display_name: String,
    },
    PositionReport {
        height: f32,
    },
    Finish {
        elapsed_ms: u64,
    },
    TimeSyncRequest {
        request_id: u64,
    },
    Leave,

    Joined {
        identity: String,
    },
    JoinRejected {
        reason: String,
    },
    RoundState {
        snapshot: RoundSnapshot,
    },
    FinishBroadcast {
        display_name: String,
        finish_order: u32,
        speed_multiplier: u32,
    },
    RoundEnded {
        winners: Vec<WinnerEntry>,
    },
    Leaderboard {
        entries: Vec<AllTimeEntry>,
    },
    TimeSyncResponse {
        request_id: u64,
        received_at: u64,
        sent_at: u64,
    },
}

impl Packet {
    // Variants only the authoritative server may originate. Inbound
    // packets of these kinds are dropped at the boundary.
    pub fn server_only(&self) -> bool {
        matches!(
            self,
            Packet::Joined { .. }
                | Packet::JoinRejected { .. }
                | Packet::RoundState { .. }
                | Packet::FinishBroadcast { .. }
                | Packet::RoundEnded { .. }
                | Packet::Leaderboard { .. }
                | Packet::TimeSyncResponse { .. }
        )
    }
}
