use log::{debug, info, warn};
use shared::{
    Packet, SYNC_PROBE_TIMEOUT_MS, SYNC_RESYNC_PERIOD_MS, SYNC_SAMPLE_COUNT,
    SYNC_SAMPLE_INTERVAL_MS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSample {
    pub rtt_ms: u64,
    pub offset_ms: i64,
}

// Four-timestamp exchange: t1 probe sent (local clock), t2 probe received
// (server clock), t3 response sent (server clock), t4 response received
// (local clock). Assumes the path is roughly symmetric.
pub fn compute_sample(t1: u64, t2: u64, t3: u64, t4: u64) -> SyncSample {
    let outbound = t2 as i64 - t1 as i64;
    let inbound = t3 as i64 - t4 as i64;
    let round_trip = (t4 as i64 - t1 as i64) - (t3 as i64 - t2 as i64);

    SyncSample {
        // Only a clock step mid-probe can drive this negative.
        rtt_ms: round_trip.max(0) as u64,
        offset_ms: (outbound + inbound) / 2,
    }
}

// Offsets measured over congested paths scatter the most, so the single
// fastest and slowest samples are dropped before averaging once there
// are enough samples to spare.
pub fn aggregate_offset(samples: &[SyncSample]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }

    let mut by_rtt = samples.to_vec();
    by_rtt.sort_by_key(|sample| sample.rtt_ms);

    let trimmed = if by_rtt.len() >= 3 {
        &by_rtt[1..by_rtt.len() - 1]
    } else {
        &by_rtt[..]
    };

    let sum: i64 = trimmed.iter().map(|sample| sample.offset_ms).sum();
    Some(sum / trimmed.len() as i64)
}

struct PendingProbe {
    request_id: u64,
    sent_at: u64,
}

// Estimates the server clock by sending short bursts of probes and
// keeping a single signed offset. One probe is in flight at a time;
// request ids carry a random session tag in the high bits so responses
// meant for an earlier incarnation of the client cannot match.
pub struct TimeSync {
    session_id: u32,
    next_counter: u32,
    pending: Option<PendingProbe>,
    samples: Vec<SyncSample>,
    probes_sent: u32,
    burst_active: bool,
    next_probe_at: u64,
    next_resync_at: u64,
    offset_ms: i64,
    ready: bool,
}

impl TimeSync {
    pub fn new(now_ms: u64) -> Self {
        Self {
            session_id: rand::random(),
            next_counter: 0,
            pending: None,
            samples: Vec::new(),
            probes_sent: 0,
            burst_active: true,
            next_probe_at: now_ms,
            next_resync_at: now_ms,
            offset_ms: 0,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn server_now(&self, local_now_ms: u64) -> u64 {
        (local_now_ms as i64 + self.offset_ms).max(0) as u64
    }

    // Drives the probe schedule forward. Returns the next probe packet
    // when one is due; the caller owns actually sending it.
    pub fn tick(&mut self, now_ms: u64) -> Option<Packet> {
        if let Some(probe) = &self.pending {
            if now_ms.saturating_sub(probe.sent_at) >= SYNC_PROBE_TIMEOUT_MS {
                debug!("Time sync probe {} went unanswered", probe.request_id);
                self.pending = None;
                self.after_probe_settled(now_ms);
            }
        }

        if !self.burst_active {
            if now_ms >= self.next_resync_at {
                self.begin_burst(now_ms);
            } else {
                return None;
            }
        }

        if self.pending.is_none()
            && self.probes_sent < SYNC_SAMPLE_COUNT
            && now_ms >= self.next_probe_at
        {
            let request_id = ((self.session_id as u64) << 32) | self.next_counter as u64;
            self.next_counter = self.next_counter.wrapping_add(1);
            self.probes_sent += 1;
            self.pending = Some(PendingProbe {
                request_id,
                sent_at: now_ms,
            });
            return Some(Packet::TimeSyncRequest { request_id });
        }

        None
    }

    // Feeds back a TimeSyncResponse. Responses whose id does not match
    // the in-flight probe are stale and change nothing.
    pub fn on_response(
        &mut self,
        request_id: u64,
        received_at: u64,
        sent_at: u64,
        now_ms: u64,
    ) -> bool {
        let probe = match self.pending.take() {
            Some(probe) if probe.request_id == request_id => probe,
            other => {
                self.pending = other;
                return false;
            }
        };

        let sample = compute_sample(probe.sent_at, received_at, sent_at, now_ms);
        debug!(
            "Time sync sample: rtt {}ms, offset {}ms",
            sample.rtt_ms, sample.offset_ms
        );
        self.samples.push(sample);
        self.after_probe_settled(now_ms);
        true
    }

    fn begin_burst(&mut self, now_ms: u64) {
        self.burst_active = true;
        self.probes_sent = 0;
        self.samples.clear();
        self.next_probe_at = now_ms;
    }

    fn after_probe_settled(&mut self, now_ms: u64) {
        if self.probes_sent >= SYNC_SAMPLE_COUNT {
            self.finalize(now_ms);
        } else {
            self.next_probe_at = now_ms + SYNC_SAMPLE_INTERVAL_MS;
        }
    }

    fn finalize(&mut self, now_ms: u64) {
        self.burst_active = false;
        self.next_resync_at = now_ms + SYNC_RESYNC_PERIOD_MS;

        match aggregate_offset(&self.samples) {
            Some(offset) => {
                self.offset_ms = offset;
                self.ready = true;
                info!(
                    "Clock sync complete: offset {}ms from {} samples",
                    offset,
                    self.samples.len()
                );
            }
            None => {
                warn!(
                    "Clock sync burst got no responses, retrying in {}s",
                    SYNC_RESYNC_PERIOD_MS / 1000
                );
            }
        }
    }
}
