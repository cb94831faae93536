//! # Round Server Library
//!
//! This library provides the authoritative server implementation for the
//! tower-climb minigame. It owns the round lifecycle, tracks every
//! climber's progress, ranks results, and broadcasts state updates so all
//! connected clients mirror the same round.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Round State
//! The server runs the definitive round: when it starts, how fast the
//! shared timer decays, which tower layout is in play, and when the round
//! ends. Clients receive and conform to this state; nothing a client
//! sends can steer it except through the validated operations below.
//!
//! ### Progress Tracking and Ranking
//! Handles the complete per-round bookkeeping:
//! - Join / leave / timeout lifecycle per account identity
//! - Monotonic height tracking from the position feed
//! - First-finish latching and finish ordering
//! - Podium and all-time leaderboard ranking with deterministic tie-breaks
//!
//! ### State Broadcasting
//! Rebroadcasts the full round snapshot every poll. On plain UDP this is
//! the loss-recovery story: a client that misses a transition packet
//! converges one poll later.
//!
//! ## Architecture Design
//!
//! ### Single Mutation Timeline
//! All game state lives behind one `tokio::select!` loop. Network tasks
//! only move packets; every decision that mutates round, session, or
//! score state happens sequentially on the main loop, so there are no
//! race conditions by construction.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets for low-latency communication. Critical transitions
//! tolerate packet loss because the authoritative snapshot keeps coming;
//! time sync requests are answered immediately with receive and send
//! stamps so clients can estimate the server clock.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection roster keyed by account identity: address binding, liveness
//! tracking, capacity enforcement, and timeout sweeps.
//!
//! ### Round Module (`round`)
//! The ACTIVE / ENDING / BREAK state machine, the accelerating countdown,
//! and clock-derived round ids that double as tower seeds.
//!
//! ### Session Module (`session`)
//! Round-scoped progress per identity plus the persistent all-time best
//! table and both ranking computations.
//!
//! ### Game Module (`game`)
//! The orchestrator that applies validated packet operations to the
//! round machine and the session tracker, and decides what to broadcast.
//!
//! ### Persistence Module (`persistence`)
//! The all-time score blob: one JSON document, loaded at startup,
//! rewritten whole by throttled background saves.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet attribution, the spawned receiver /
//! sender / timeout tasks, and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind the authoritative server with default round settings.
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!
//!     // Run the main loop: receive packets, advance round phases once a
//!     // second, broadcast snapshots, and persist score changes.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! ### Write Authority
//! Clients are untrusted. Round state, finish ordering, the shared timer,
//! and both leaderboards are computed exclusively on the server; inbound
//! packets that impersonate authoritative broadcasts are dropped at the
//! boundary.
//!
//! ### Finish Validation
//! A finish is accepted once per identity per round and only while the
//! round is ACTIVE. By default the recorded time is derived from the
//! server's own clocks; the client-reported duration is only honored when
//! the deployment explicitly opts into trusting it.

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod persistence;
pub mod round;
pub mod session;
