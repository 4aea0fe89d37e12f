//! Connection registry for the game server
//!
//! This module tracks every live TCP connection, including:
//! - Id assignment from a small fixed pool, lowest free id first
//! - Handshake progress and the display name each client announced
//! - Fan-out of encoded frames to every connection
//!
//! The registry is owned by the server's coordinator task and never shared,
//! so no lock guards it.

use crate::config::MAX_CONNECTIONS;
use log::info;
use shared::protocol::{Players, ProtocolError};
use shared::{Connection, Message};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Represents one connected participant
///
/// Each client carries:
/// - The id the server offered in its hello
/// - The peer address, for logging
/// - The announced name, or a provisional one until the handshake completes
/// - The handle of its connection actor
#[derive(Debug)]
pub struct Client {
    /// Id assigned by the server
    pub id: u8,
    /// Peer address of the TCP connection
    pub addr: SocketAddr,
    /// Display name, `Player <id>` until the client says otherwise
    pub name: String,
    /// Whether the client has answered the server's hello
    pub hello_received: bool,
    connection: Connection,
}

impl Client {
    /// Creates a client that has not completed the handshake yet
    pub fn new(id: u8, addr: SocketAddr, connection: Connection) -> Self {
        Self {
            id,
            addr,
            name: provisional_name(id),
            hello_received: false,
            connection,
        }
    }

    /// Queues a message on this client's connection
    pub fn send(&self, message: &Message) -> bool {
        self.connection.send(message)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// Name shown for a client that has not introduced itself
pub fn provisional_name(id: u8) -> String {
    format!("Player {}", id)
}

/// Manages all connected clients
///
/// The ClientManager hands out ids, enforces the connection limit and knows
/// which clients have finished the handshake. Removing a client drops its
/// connection handle, which stops the reader and lets the writer flush.
pub struct ClientManager {
    /// Connected clients indexed by id, iterated in ascending id order
    clients: BTreeMap<u8, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry accepting up to `max_clients` connections
    ///
    /// The limit is capped at the size of the id pool.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            max_clients: max_clients.min(MAX_CONNECTIONS),
        }
    }

    /// Lowest id not in use, or None when the server is at capacity
    pub fn next_free_id(&self) -> Option<u8> {
        if self.clients.len() >= self.max_clients {
            return None;
        }
        (1..=MAX_CONNECTIONS as u8).find(|id| !self.clients.contains_key(id))
    }

    /// Registers a new connection under the lowest free id
    ///
    /// `connect` receives the id and starts the connection actor. Returns
    /// None, without calling `connect`, if the server is at capacity.
    pub fn add_client<F>(&mut self, addr: SocketAddr, connect: F) -> Option<u8>
    where
        F: FnOnce(u8) -> Connection,
    {
        let id = self.next_free_id()?;
        let client = Client::new(id, addr, connect(id));
        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, client);
        Some(id)
    }

    /// Removes a client from the server
    ///
    /// Returns the removed client so the caller can still notify it.
    pub fn remove_client(&mut self, id: u8) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        info!("Client {} ({}) disconnected", client.id, client.name);
        Some(client)
    }

    pub fn get(&self, id: u8) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.clients.contains_key(&id)
    }

    /// Whether `id` is still held by the connection with this serial
    ///
    /// An id freed by a departed client can be handed out again before that
    /// client's last events are processed.
    pub fn is_current(&self, id: u8, serial: u64) -> bool {
        self.clients
            .get(&id)
            .map_or(false, |client| client.connection.serial() == serial)
    }

    /// Records the name a client announced in its hello
    ///
    /// Returns false if the client is unknown or already introduced itself.
    pub fn complete_handshake(&mut self, id: u8, name: &str) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) if !client.hello_received => {
                client.name = name.to_string();
                client.hello_received = true;
                info!("Client {} is now known as {}", id, name);
                true
            }
            _ => false,
        }
    }

    pub fn hello_received(&self, id: u8) -> bool {
        self.clients
            .get(&id)
            .map_or(false, |client| client.hello_received)
    }

    /// Whether every connected client has completed the handshake
    pub fn all_handshaken(&self) -> bool {
        self.clients.values().all(|client| client.hello_received)
    }

    /// Ids of every connected client in ascending order
    pub fn ids(&self) -> Vec<u8> {
        self.clients.keys().copied().collect()
    }

    /// Players message listing every connection with its current name
    pub fn players_message(&self) -> Result<Message, ProtocolError> {
        let players = self
            .clients
            .values()
            .map(|client| (client.id, client.name.clone()))
            .collect();
        Ok(Message::Players(Players::new(players)?))
    }

    /// Queues a message for one client
    pub fn send_to(&self, id: u8, message: &Message) -> bool {
        self.clients
            .get(&id)
            .map_or(false, |client| client.send(message))
    }

    /// Queues a message for every client
    ///
    /// The message is encoded once and the same frame is queued everywhere.
    pub fn broadcast(&self, message: &Message) {
        let frame = message.encode();
        for client in self.clients.values() {
            client.connection.send_frame(frame.clone());
        }
    }

    /// Sends a failure notice to every client and empties the registry
    pub fn fail_all(&mut self, reason: &str) -> Vec<u8> {
        let clients = std::mem::take(&mut self.clients);
        for client in clients.values() {
            client.connection.fail(reason);
        }
        clients.into_keys().collect()
    }

    /// Closes every connection without a notice and empties the registry
    pub fn close_all(&mut self) {
        for client in std::mem::take(&mut self.clients).into_values() {
            client.connection.close();
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}
