use crate::state::{RoundView, ViewMode};
use crate::sync::TimeSync;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{get_timestamp, Packet, RoundPhase};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    identity: String,
    display_name: String,
    connected: bool,

    view: RoundView,
    sync: TimeSync,

    climb_speed: f32,
    height: f32,
    finished: bool,
    round_started_local: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        identity: String,
        display_name: String,
        climb_speed: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr: SocketAddr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            identity,
            display_name,
            connected: false,
            view: RoundView::new(&server_addr.to_string()),
            sync: TimeSync::new(get_timestamp()),
            climb_speed,
            height: 0.0,
            finished: false,
            round_started_local: get_timestamp(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Join {
            identity: self.identity.clone(),
            display_name: self.display_name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet, local_now: u64) {
        let sender = self.server_addr.to_string();

        match packet {
            Packet::Joined { identity } => {
                info!("Joined as {}", identity);
                // The server may normalize the identity we asked for.
                self.identity = identity;
                self.connected = true;
            }

            Packet::JoinRejected { reason } => {
                warn!("Join rejected: {}", reason);
                self.connected = false;
            }

            Packet::RoundState { snapshot } => {
                if self.view.apply_round_state(snapshot, &sender, local_now) {
                    self.on_new_round(local_now);
                }
            }

            Packet::FinishBroadcast {
                display_name,
                finish_order,
                speed_multiplier,
            } => {
                info!(
                    "{} reached the summit (finisher #{}), timer now runs at x{}",
                    display_name, finish_order, speed_multiplier
                );
            }

            Packet::RoundEnded { winners } => {
                info!("Round over, {} on the podium", winners.len());
                for winner in &winners {
                    if winner.finish_time > 0.0 {
                        info!(
                            "  #{} {} finished in {:.1}s",
                            winner.rank, winner.display_name, winner.finish_time
                        );
                    } else {
                        info!(
                            "  #{} {} climbed to {:.1}",
                            winner.rank, winner.display_name, winner.max_height
                        );
                    }
                }
                if let Some(own) = winners.iter().find(|w| w.identity == self.identity) {
                    info!("You placed #{}", own.rank);
                }
                self.view.apply_winners(winners, &sender, local_now);
            }

            Packet::Leaderboard { entries } => {
                debug!("Leaderboard updated: {} entries", entries.len());
                self.view.apply_leaderboard(entries, &sender, local_now);
            }

            Packet::TimeSyncResponse {
                request_id,
                received_at,
                sent_at,
            } => {
                if !self.sync.on_response(request_id, received_at, sent_at, local_now) {
                    debug!("Ignoring stale time sync response {}", request_id);
                }
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    fn on_new_round(&mut self, local_now: u64) {
        self.height = 0.0;
        self.finished = false;
        self.round_started_local = local_now;

        if let Some(snapshot) = self.view.round() {
            info!(
                "New round {} ({} segments, {:.0} to climb)",
                snapshot.round_id,
                snapshot.segments.len(),
                snapshot.segments.len() as f32 * shared::SEGMENT_HEIGHT
            );
        }
    }

    // One climb step: advance height with a little jitter, report it,
    // and claim the finish once the summit height is reached. Only runs
    // against a live, active round.
    async fn step_climb(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let local_now = get_timestamp();
        let server_now = if self.sync.is_ready() {
            Some(self.sync.server_now(local_now))
        } else {
            None
        };

        self.view.update_mode(local_now, self.sync.is_ready());

        if !self.connected || self.finished || self.view.mode() != ViewMode::Live {
            return Ok(());
        }

        let round = match self.view.effective_round(local_now, server_now) {
            Some(round) => round,
            None => return Ok(()),
        };

        if round.phase != RoundPhase::Active {
            return Ok(());
        }

        let jitter = 0.9 + rand::random::<f32>() * 0.2;
        self.height = (self.height + self.climb_speed * jitter * 0.1).min(round.total_height);

        self.send_packet(&Packet::PositionReport {
            height: self.height,
        })
        .await?;

        if self.height >= round.total_height {
            self.finished = true;
            let elapsed_ms = local_now.saturating_sub(self.round_started_local);
            self.send_packet(&Packet::Finish { elapsed_ms }).await?;
            info!("Reached the summit in {:.1}s", elapsed_ms as f64 / 1000.0);
        }

        Ok(())
    }

    fn log_status(&mut self) {
        let local_now = get_timestamp();
        let server_now = if self.sync.is_ready() {
            Some(self.sync.server_now(local_now))
        } else {
            None
        };

        self.view.update_mode(local_now, self.sync.is_ready());

        match self.view.effective_round(local_now, server_now) {
            Some(round) => info!(
                "[{}] {} with {:.0}s left, height {:.1}/{:.1} (x{})",
                round.round_key,
                round.phase,
                round.remaining,
                self.height,
                round.total_height,
                round.speed_multiplier
            ),
            None => info!("Waiting for round state from {}", self.server_addr),
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut sync_interval = interval(Duration::from_millis(25));
        let mut climb_interval = interval(Duration::from_millis(100));
        let mut status_interval = interval(Duration::from_secs(5));

        let mut buffer = [0u8; 2048];

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let local_now = get_timestamp();
                    match result {
                        Ok((len, sender)) => {
                            // Only the server we dialed may drive the view.
                            if sender == self.server_addr {
                                match deserialize::<Packet>(&buffer[0..len]) {
                                    Ok(packet) => self.handle_packet(packet, local_now).await,
                                    Err(e) => warn!("Malformed packet from server: {}", e),
                                }
                            } else {
                                debug!("Ignoring datagram from unexpected sender {}", sender);
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = sync_interval.tick() => {
                    if self.connected {
                        if let Some(packet) = self.sync.tick(get_timestamp()) {
                            if let Err(e) = self.send_packet(&packet).await {
                                error!("Error sending time sync probe: {}", e);
                            }
                        }
                    }
                },

                _ = climb_interval.tick() => {
                    if let Err(e) = self.step_climb().await {
                        error!("Error reporting climb progress: {}", e);
                    }
                },

                _ = status_interval.tick() => {
                    self.log_status();
                },

                _ = &mut ctrl_c => {
                    info!("Shutting down client");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Leave).await;
        }

        Ok(())
    }
}
