use std::path::PathBuf;
use std::time::Duration;

use shared::{BASE_TIMER_SECONDS, BREAK_SECONDS, ENDING_DWELL_SECONDS, LEADERBOARD_SIZE};

/// Deployment knobs for one server process.
///
/// The phase durations default to the shared constants that every
/// client's offline fallback derivation assumes. Changing them on the
/// server alone makes disconnected clients drift out of step, so they
/// are only meant to be overridden in tests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_timer_seconds: u32,
    pub ending_dwell_seconds: u32,
    pub break_seconds: u32,
    /// When false (the default) the finish time is derived from the
    /// server's own round-start and arrival clocks. When true the
    /// client-reported duration is recorded as-is, which lets a modified
    /// client submit any time it likes.
    pub trust_client_finish_time: bool,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// Path of the persisted all-time score blob.
    pub store_path: PathBuf,
    /// Minimum spacing between persistence writes.
    pub persist_cooldown_ms: u64,
    /// How many ranked rows the blob keeps.
    pub persist_top_n: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_timer_seconds: BASE_TIMER_SECONDS,
            ending_dwell_seconds: ENDING_DWELL_SECONDS,
            break_seconds: BREAK_SECONDS,
            trust_client_finish_time: false,
            max_clients: 64,
            client_timeout: Duration::from_secs(10),
            store_path: PathBuf::from("alltime_scores.json"),
            persist_cooldown_ms: 5_000,
            persist_top_n: LEADERBOARD_SIZE,
        }
    }
}
