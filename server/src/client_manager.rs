//! Client connection management for the round server
//!
//! This module handles the server-side roster of connected players, including:
//! - Connection lifecycle (join, leave, timeout)
//! - Identity-to-address binding so packets can be attributed to accounts
//! - Connection health monitoring and automatic cleanup
//! - Capacity enforcement
//!
//! Connections are keyed by account identity rather than by socket address:
//! a player who reconnects from a new address keeps their identity and their
//! in-round progress, while the stale address is simply rebound.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected remote player
///
/// Tracks the network-facing half of a player: where responses go and
/// when we last heard from them. Round progress lives in the session
/// tracker, not here.
#[derive(Debug)]
pub struct RemoteClient {
    /// Normalized account identity (lowercase)
    pub identity: String,
    /// Name shown to other players in broadcasts
    pub display_name: String,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl RemoteClient {
    pub fn new(identity: String, display_name: String, addr: SocketAddr) -> Self {
        Self {
            identity,
            display_name,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the client as recently active
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager provides centralized control over connections,
/// enforces the capacity limit, and answers the two lookups the packet
/// handler needs: identity by address (attributing inbound packets) and
/// the full address list (broadcasting state).
pub struct ClientManager {
    /// Connected clients indexed by account identity
    clients: HashMap<String, RemoteClient>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Attempts to add or rebind a client connection
    ///
    /// A join for an identity that is already connected rebinds that
    /// identity to the new address and refreshes the display name; this
    /// never counts against capacity. Returns false only when a genuinely
    /// new identity would exceed the capacity limit.
    pub fn add_client(&mut self, identity: &str, display_name: &str, addr: SocketAddr) -> bool {
        if let Some(existing) = self.clients.get_mut(identity) {
            if existing.addr != addr {
                info!("Client {} rebound from {} to {}", identity, existing.addr, addr);
            }
            existing.addr = addr;
            existing.display_name = display_name.to_string();
            existing.touch();
            return true;
        }

        // Enforce server capacity limits
        if self.clients.len() >= self.max_clients {
            return false;
        }

        let client = RemoteClient::new(identity.to_string(), display_name.to_string(), addr);
        info!("Client {} ({}) connected from {}", identity, display_name, addr);
        self.clients.insert(identity.to_string(), client);

        true
    }

    /// Removes a client from the roster
    ///
    /// Returns true if the client was found and removed, false if they
    /// were already gone. Handles both explicit leaves and timeout cleanup.
    pub fn remove_client(&mut self, identity: &str) -> bool {
        if let Some(client) = self.clients.remove(identity) {
            info!("Client {} disconnected", client.identity);
            true
        } else {
            false
        }
    }

    /// Finds the identity connected from the given address
    ///
    /// Used to attribute incoming packets to accounts. Returns None if no
    /// client is connected from that address.
    pub fn find_identity_by_addr(&self, addr: SocketAddr) -> Option<String> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(identity, _)| identity.clone())
    }

    /// Refreshes the liveness timestamp for whichever identity owns `addr`
    pub fn touch_addr(&mut self, addr: SocketAddr) {
        if let Some(client) = self.clients.values_mut().find(|c| c.addr == addr) {
            client.touch();
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Disconnects clients that haven't sent packets within the timeout
    /// threshold and returns their identities so other systems can clean
    /// up session state.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<String> {
        let timed_out: Vec<String> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(identity, _)| identity.clone())
            .collect();

        for identity in &timed_out {
            self.remove_client(identity);
        }

        timed_out
    }

    /// Gets the addresses of every connected client
    ///
    /// Used for broadcasting round state updates during the server's
    /// main loop.
    pub fn get_client_addrs(&self) -> Vec<SocketAddr> {
        self.clients.values().map(|client| client.addr).collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
