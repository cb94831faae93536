//! # Tower Climb Client Library
//!
//! This library provides the complete client-side implementation for the round-based
//! tower climb server. It handles connection management, server clock synchronization,
//! read-only mirroring of authoritative round state, and a headless climbing loop that
//! exercises the full packet surface of the protocol.
//!
//! ## Architecture Overview
//!
//! The client is deliberately thin: every gameplay decision of consequence is made by
//! the server, and the client's job is to present that state faithfully. Three pieces
//! work together to do that under real network conditions:
//!
//! ### Authoritative Mirroring
//! All round state, winner lists, and leaderboards arrive as whole snapshots and are
//! stored behind replication guards. A guard only accepts writes from the server the
//! client dialed, so a stray or spoofed datagram can never overwrite the view. The
//! client renders from its mirror and never mutates it locally.
//!
//! ### Clock Synchronization
//! Round countdowns are anchored to server timestamps, so the client estimates the
//! offset between its own clock and the server's by exchanging short bursts of timing
//! probes. Once an offset is established the client can evaluate any server timestamp
//! locally, and countdowns stay correct even when no packet has arrived for a while.
//!
//! ### Offline Fallback
//! When the server goes quiet the client degrades to a schedule derived purely from
//! wall-clock time. Round numbers, phases, and tower layouts are all deterministic
//! functions of the epoch, so disconnected clients still agree with each other about
//! which round it is and what the tower looks like.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - UDP socket management and the join handshake
//! - Packet serialization and dispatch
//! - The climbing loop that reports progress and claims finishes
//! - Periodic status logging
//!
//! ### State Module (`state`)
//! Maintains the client's view of the world:
//! - Replicated round, winner, and leaderboard records
//! - View mode tracking (synchronizing, live, fallback)
//! - The effective round presented to the player in each mode
//!
//! ### Sync Module (`sync`)
//! Implements server clock estimation:
//! - Probe scheduling with timeouts and periodic resynchronization
//! - Four-timestamp offset and round-trip measurement
//! - Outlier filtering before offsets are averaged
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         "0x1234".to_string(),
//!         "climber".to_string(),
//!         6.0,
//!     )
//!     .await?;
//!
//!     client.run().await
//! }
//! ```
//!
//! ## Design Philosophy
//!
//! ### Trust the Server, Verify the Sender
//! The client treats its own copy of the round as disposable. It applies whatever the
//! authoritative server sends, and it applies nothing from anyone else. This keeps the
//! client simple and makes the security model easy to reason about.
//!
//! ### Deterministic Everywhere
//! Tower generation and the fallback schedule run the exact same algorithms as the
//! server, using identical constants from the shared library. Two machines that have
//! never exchanged a packet still produce the same tower for the same round.
//!
//! ### Graceful Degradation
//! The client is designed to stay useful as conditions worsen:
//! - Before sync completes: round data is shown without live countdowns
//! - Packet loss: the last snapshot keeps counting down on the synced clock
//! - Server loss: the wall-clock schedule takes over within seconds

pub mod network;
pub mod state;
pub mod sync;
