//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::{GameWorld, WorldEvent};
use crate::persistence::ScoreStore;
use crate::session::normalize_identity;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{get_timestamp, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// How often the round state machine is polled and the current snapshot
/// rebroadcast. Phase durations are orders of magnitude longer, so one
/// poll never spans two transitions.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
        /// Stamped the moment the datagram left the socket, before any
        /// channel queueing; time sync replies echo this value.
        received_at: u64,
    },
    ClientTimeout {
        identity: String,
    },
    SaveFailed,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// Main server coordinating networking and the round lifecycle
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: GameWorld,
    store: ScoreStore,
    client_timeout: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let store = ScoreStore::new(config.store_path.clone());
        let mut game = GameWorld::new(config.clone(), get_timestamp());

        // A missing or unreadable blob never blocks startup; the table
        // just starts empty and rebuilds over time.
        match store.load().await {
            Ok(entries) => {
                if !entries.is_empty() {
                    info!("Loaded {} all-time score rows", entries.len());
                }
                game.seed_all_time(entries);
            }
            Err(e) => {
                error!("Failed to load all-time scores: {}", e);
            }
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game,
            store,
            client_timeout: config.client_timeout,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let received_at = get_timestamp();
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) = server_tx.send(ServerMessage::PacketReceived {
                                packet,
                                addr,
                                received_at,
                            }) {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for addr in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client at {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for identity in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { identity }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn broadcast_packet(&self, packet: &Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: packet.clone(),
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes one inbound packet on the authoritative timeline
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr, received_at: u64) {
        {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr);
        }

        match packet {
            Packet::Join {
                identity,
                display_name,
            } => {
                let identity = normalize_identity(&identity);
                if identity.is_empty() {
                    debug!("Join with empty identity from {}, ignored", addr);
                    return;
                }

                let accepted = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(&identity, &display_name, addr)
                };

                if accepted {
                    self.game.handle_join(&identity, &display_name, get_timestamp());

                    let response = Packet::Joined {
                        identity: identity.clone(),
                    };
                    self.send_packet(&response, addr).await;

                    // Late joiners need the current round and standings
                    // immediately instead of waiting for the next poll.
                    let snapshot = Packet::RoundState {
                        snapshot: self.game.snapshot(),
                    };
                    self.send_packet(&snapshot, addr).await;

                    let leaderboard = Packet::Leaderboard {
                        entries: self.game.leaderboard(),
                    };
                    self.send_packet(&leaderboard, addr).await;
                } else {
                    let response = Packet::JoinRejected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(&response, addr).await;
                }
            }

            Packet::PositionReport { height } => {
                let identity = {
                    let clients = self.clients.read().await;
                    clients.find_identity_by_addr(addr)
                };

                match identity {
                    Some(identity) => {
                        self.game.handle_height(&identity, height, get_timestamp())
                    }
                    None => debug!("Position report from unknown address {}", addr),
                }
            }

            Packet::Finish { elapsed_ms } => {
                let identity = {
                    let clients = self.clients.read().await;
                    clients.find_identity_by_addr(addr)
                };

                let Some(identity) = identity else {
                    debug!("Finish report from unknown address {}", addr);
                    return;
                };

                let now = get_timestamp();
                if let Some(outcome) = self.game.handle_finish(&identity, elapsed_ms, now) {
                    let packet = Packet::FinishBroadcast {
                        display_name: outcome.display_name,
                        finish_order: outcome.finish_order,
                        speed_multiplier: outcome.speed_multiplier,
                    };
                    self.broadcast_packet(&packet).await;
                }
            }

            Packet::TimeSyncRequest { request_id } => {
                // Unicast echo with both server-side stamps; never
                // broadcast, never gated on a session existing.
                let response = Packet::TimeSyncResponse {
                    request_id,
                    received_at,
                    sent_at: get_timestamp(),
                };
                self.send_packet(&response, addr).await;
            }

            Packet::Leave => {
                let identity = {
                    let clients = self.clients.read().await;
                    clients.find_identity_by_addr(addr)
                };

                if let Some(identity) = identity {
                    {
                        let mut clients = self.clients.write().await;
                        clients.remove_client(&identity);
                    }
                    self.game.handle_leave(&identity);
                }
            }

            other => {
                if other.server_only() {
                    debug!("Dropped spoofed authoritative packet from {}", addr);
                } else {
                    warn!("Unexpected packet type from client at {}", addr);
                }
            }
        }
    }

    /// One poll step: advance phases, broadcast what changed, rebroadcast
    /// the snapshot, and kick off a persistence write when one is due
    async fn tick(&mut self) {
        let now = get_timestamp();

        if let Some(event) = self.game.poll(now) {
            match event {
                WorldEvent::RoundOver { winners } => {
                    self.broadcast_packet(&Packet::RoundEnded { winners }).await;
                }
                WorldEvent::BreakStarted => {}
                WorldEvent::RoundStarted { leaderboard } => {
                    self.broadcast_packet(&Packet::Leaderboard {
                        entries: leaderboard,
                    })
                    .await;
                }
            }
        }

        // The snapshot goes out every poll. On plain UDP this doubles as
        // loss recovery; a client that missed a transition converges on
        // the next poll.
        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };
        if client_count > 0 {
            let packet = Packet::RoundState {
                snapshot: self.game.snapshot(),
            };
            self.broadcast_packet(&packet).await;
        }

        if let Some(rows) = self.game.take_save_request(now) {
            let store = self.store.clone();
            let server_tx = self.server_tx.clone();
            tokio::spawn(async move {
                match store.save(&rows).await {
                    Ok(()) => debug!("Persisted {} all-time rows", rows.len()),
                    Err(e) => {
                        error!("Failed to persist all-time scores: {}", e);
                        let _ = server_tx.send(ServerMessage::SaveFailed);
                    }
                }
            });
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut poll_interval = interval(POLL_INTERVAL);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr, received_at }) => {
                            self.handle_packet(packet, addr, received_at).await;
                        },
                        Some(ServerMessage::ClientTimeout { identity }) => {
                            self.game.handle_leave(&identity);
                        },
                        Some(ServerMessage::SaveFailed) => {
                            self.game.mark_store_dirty();
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle round poll events
                _ = poll_interval.tick() => {
                    self.tick().await;
                },

                _ = &mut ctrl_c => {
                    info!("Received shutdown signal");
                    break;
                },
            }
        }

        // Flush any unsaved score changes before exiting.
        if let Some(rows) = self.game.flush_rows() {
            if let Err(e) = self.store.save(&rows).await {
                error!("Failed to persist all-time scores on shutdown: {}", e);
            }
        }

        Ok(())
    }
}
