use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod protocol;
pub mod replication;
pub mod round;
pub mod tower;

pub use protocol::{AllTimeEntry, Packet, RoundSnapshot, WinnerEntry};
pub use replication::Replicated;
pub use round::{fallback_phase, RoundPhase, RoundTimer};
pub use tower::{fallback_round_number, SeededRng, Segment, TowerLayout};

pub const BASE_TIMER_SECONDS: u32 = 420;
pub const ENDING_DWELL_SECONDS: u32 = 3;
pub const BREAK_SECONDS: u32 = 10;
pub const ROUND_CYCLE_SECONDS: u64 =
    BASE_TIMER_SECONDS as u64 + ENDING_DWELL_SECONDS as u64 + BREAK_SECONDS as u64;

pub const SEGMENT_HEIGHT: f32 = 15.0;
pub const MIN_MIDDLE_SEGMENTS: u32 = 3;
pub const MAX_MIDDLE_SEGMENTS: u32 = 8;

pub const WINNER_COUNT: usize = 3;
pub const LEADERBOARD_SIZE: usize = 10;

pub const SYNC_SAMPLE_COUNT: u32 = 5;
pub const SYNC_SAMPLE_INTERVAL_MS: u64 = 150;
pub const SYNC_RESYNC_PERIOD_MS: u64 = 60_000;
pub const SYNC_PROBE_TIMEOUT_MS: u64 = 2_000;

// Wall-clock milliseconds since the Unix epoch. Timestamps stay u64
// end-to-end; narrowing them to a float loses millisecond precision.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
