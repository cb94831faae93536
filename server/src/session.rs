//! Per-round player progress and the persistent all-time score table
//!
//! This module owns the two score-keeping layers of the server:
//! - Round-scoped sessions: one record per connected identity holding the
//!   running max height and the finish latch for the current round
//! - The all-time table: cross-round personal bests that survive
//!   disconnects and server restarts
//!
//! Both layers are mutated only from the server's main loop, so there is
//! no locking here. Ranking ties are broken by insertion order: sessions
//! by join order, all-time rows by first-seen order. That makes every
//! ranking call deterministic for identical inputs, which matters because
//! the results are broadcast and any two computations of the same state
//! must agree.

use log::info;
use shared::protocol::{AllTimeEntry, WinnerEntry};
use shared::{LEADERBOARD_SIZE, WINNER_COUNT};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Canonical form of an account identity: trimmed and lowercased.
/// Every map in the server keys on this form, so mixed-case joins from
/// the same account collapse into one player.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// One connected identity's progress in the current round
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub identity: String,
    /// Latest name the player joined with
    pub display_name: String,
    /// Running maximum of the reported climb height; never decreases
    /// within a round
    pub max_height: f32,
    /// Finish latch; once set, further finish reports are ignored
    pub finished: bool,
    /// Seconds from round start to the accepted finish; 0.0 until then
    pub finish_time: f32,
    /// 1-based order among this round's finishers; 0 until finished
    pub finish_order: u32,
    pub joined_at: u64,
}

impl PlayerSession {
    fn new(identity: String, display_name: String, now_ms: u64) -> Self {
        Self {
            identity,
            display_name,
            max_height: 0.0,
            finished: false,
            finish_time: 0.0,
            finish_order: 0,
            joined_at: now_ms,
        }
    }

    /// Zeroes the round-scoped fields; the identity stays connected
    fn reset(&mut self) {
        self.max_height = 0.0;
        self.finished = false;
        self.finish_time = 0.0;
        self.finish_order = 0;
    }
}

/// Tracks sessions for every connected identity plus the all-time table
pub struct SessionTracker {
    /// Current-round sessions indexed by normalized identity
    sessions: HashMap<String, PlayerSession>,
    /// Identities in join order; the ranking tie-break
    join_order: Vec<String>,
    /// All-time personal bests indexed by normalized identity
    all_time: HashMap<String, AllTimeEntry>,
    /// Identities in first-seen order; the all-time tie-break
    all_time_order: Vec<String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            join_order: Vec::new(),
            all_time: HashMap::new(),
            all_time_order: Vec::new(),
        }
    }

    /// Installs previously persisted all-time rows at startup
    ///
    /// The rows arrive already ranked, so their order becomes the
    /// first-seen order and the tie-break survives restarts.
    pub fn seed_all_time(&mut self, entries: Vec<AllTimeEntry>) {
        for entry in entries {
            if self.all_time.contains_key(&entry.identity) {
                continue;
            }
            self.all_time_order.push(entry.identity.clone());
            self.all_time.insert(entry.identity.clone(), entry);
        }
    }

    /// Creates or refreshes a session for `identity`
    ///
    /// Joining is idempotent within a round: a second join from the same
    /// identity refreshes the display name and keeps all progress.
    /// Returns true when a brand-new session was created.
    pub fn join(&mut self, identity: &str, display_name: &str, now_ms: u64) -> bool {
        if let Some(session) = self.sessions.get_mut(identity) {
            session.display_name = display_name.to_string();
            return false;
        }

        self.join_order.push(identity.to_string());
        self.sessions.insert(
            identity.to_string(),
            PlayerSession::new(identity.to_string(), display_name.to_string(), now_ms),
        );
        true
    }

    /// Drops the session for a departing identity
    ///
    /// The all-time row is untouched; personal bests outlive the
    /// connection. Returns false if no session existed.
    pub fn remove(&mut self, identity: &str) -> bool {
        if self.sessions.remove(identity).is_some() {
            self.join_order.retain(|id| id != identity);
            true
        } else {
            false
        }
    }

    pub fn get(&self, identity: &str) -> Option<&PlayerSession> {
        self.sessions.get(identity)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies one height sample from the position feed
    ///
    /// The session keeps a running max, so stale or out-of-order samples
    /// can never lower it. Returns true when the max actually rose;
    /// unknown identities are a no-op.
    pub fn record_height(&mut self, identity: &str, height: f32) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) if height > session.max_height => {
                session.max_height = height;
                true
            }
            _ => false,
        }
    }

    /// Latches a finish for `identity`
    ///
    /// Returns false when the identity is unknown or already finished;
    /// the first accepted finish wins and later reports change nothing.
    pub fn record_finish(&mut self, identity: &str, finish_time: f32, order: u32) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) if !session.finished => {
                session.finished = true;
                session.finish_time = finish_time;
                session.finish_order = order;
                info!(
                    "{} finished #{} in {:.1}s",
                    session.display_name, order, finish_time
                );
                true
            }
            _ => false,
        }
    }

    /// Folds one progress change into the all-time table
    ///
    /// Personal bests only improve: a finish must be strictly faster to
    /// replace the best time, a height strictly greater to replace the
    /// best height. The finish counter advances only together with a
    /// best-time improvement, so replaying an equal or slower finish
    /// leaves the row byte-for-byte identical. Returns true when the row
    /// changed, which is what drives persistence.
    pub fn update_all_time(
        &mut self,
        identity: &str,
        display_name: &str,
        finish_time: f32,
        height: f32,
        finished: bool,
        now_ms: u64,
    ) -> bool {
        if !self.all_time.contains_key(identity) {
            self.all_time_order.push(identity.to_string());
            self.all_time.insert(
                identity.to_string(),
                AllTimeEntry {
                    identity: identity.to_string(),
                    display_name: display_name.to_string(),
                    best_time: 0.0,
                    best_height: 0.0,
                    finish_count: 0,
                    last_played: now_ms,
                },
            );
        }

        let Some(entry) = self.all_time.get_mut(identity) else {
            return false;
        };

        let mut changed = false;

        if finished && (entry.best_time == 0.0 || finish_time < entry.best_time) {
            entry.best_time = finish_time;
            entry.finish_count += 1;
            changed = true;
        }

        if height > entry.best_height {
            entry.best_height = height;
            changed = true;
        }

        if changed {
            entry.display_name = display_name.to_string();
            entry.last_played = now_ms;
        }

        changed
    }

    /// Starts a new round: every connected identity's round fields reset
    pub fn reset_round(&mut self) {
        for session in self.sessions.values_mut() {
            session.reset();
        }
    }

    /// Ranks the current round and returns the podium
    ///
    /// Finishers come first, fastest time up; the rest follow by highest
    /// reached height. The sort is stable over join order, the list is
    /// truncated to the podium size, and ranks are stamped 1-based.
    pub fn compute_winners(&self) -> Vec<WinnerEntry> {
        let mut ranked: Vec<&PlayerSession> = self
            .join_order
            .iter()
            .filter_map(|identity| self.sessions.get(identity))
            .collect();

        ranked.sort_by(|a, b| match (a.finished, b.finished) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a
                .finish_time
                .partial_cmp(&b.finish_time)
                .unwrap_or(Ordering::Equal),
            (false, false) => b
                .max_height
                .partial_cmp(&a.max_height)
                .unwrap_or(Ordering::Equal),
        });

        ranked
            .into_iter()
            .take(WINNER_COUNT)
            .enumerate()
            .map(|(i, session)| WinnerEntry {
                identity: session.identity.clone(),
                display_name: session.display_name.clone(),
                finish_time: session.finish_time,
                max_height: session.max_height,
                rank: i as u32 + 1,
            })
            .collect()
    }

    fn ranked_all_time(&self) -> Vec<&AllTimeEntry> {
        let mut ranked: Vec<&AllTimeEntry> = self
            .all_time_order
            .iter()
            .filter_map(|identity| self.all_time.get(identity))
            .collect();

        ranked.sort_by(|a, b| {
            let a_finished = a.best_time > 0.0;
            let b_finished = b.best_time > 0.0;
            match (a_finished, b_finished) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (true, true) => a
                    .best_time
                    .partial_cmp(&b.best_time)
                    .unwrap_or(Ordering::Equal),
                (false, false) => b
                    .best_height
                    .partial_cmp(&a.best_height)
                    .unwrap_or(Ordering::Equal),
            }
        });

        ranked
    }

    /// Top of the all-time table, same ordering rule as the podium
    pub fn compute_leaderboard(&self) -> Vec<AllTimeEntry> {
        self.ranked_all_time()
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .cloned()
            .collect()
    }

    /// Ranked rows for the persistence blob, truncated to `top_n`
    pub fn persistable(&self, top_n: usize) -> Vec<AllTimeEntry> {
        self.ranked_all_time()
            .into_iter()
            .take(top_n)
            .cloned()
            .collect()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
