//! Server coordinator: accepts TCP connections, runs the handshake and applies
//! game moves, one event at a time

use crate::client_manager::{provisional_name, ClientManager};
use crate::config::ServerConfig;
use crate::game::GameSession;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::game::{MAX_PLAYERS, MIN_PLAYERS};
use shared::protocol::{Chat, Hello};
use shared::{Connection, ConnectionEvent, Inbound, Message, StateError};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

/// Reason sent to every participant when the admin shuts the server down
pub const SHUTDOWN_REASON: &str = "Server admin shut down server";

/// Why a start request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a game was already started on this server")]
    AlreadyStarted,
    #[error(
        "{0} clients connected, a game needs {} to {}",
        MIN_PLAYERS,
        MAX_PLAYERS
    )]
    PlayerCount(usize),
    #[error("client {0} has not completed the handshake")]
    HandshakePending(u8),
    #[error("could not set up the game: {0}")]
    State(#[from] StateError),
    #[error("server is not running")]
    ServerStopped,
}

/// One row of the admin's player list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: u8,
    pub name: String,
    pub addr: SocketAddr,
    pub hello_received: bool,
}

/// Requests from the admin side, answered through the oneshot
#[derive(Debug)]
pub enum AdminCommand {
    StartGame(oneshot::Sender<Result<(), StartError>>),
    Kick(u8, oneshot::Sender<bool>),
    ListPlayers(oneshot::Sender<Vec<PlayerInfo>>),
    Quit(oneshot::Sender<()>),
}

/// Cloneable remote control for a running [`Server`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<AdminCommand>,
}

impl ServerHandle {
    pub async fn start_game(&self) -> Result<(), StartError> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(AdminCommand::StartGame(reply)).is_err() {
            return Err(StartError::ServerStopped);
        }
        response.await.unwrap_or(Err(StartError::ServerStopped))
    }

    /// Disconnects a client. Returns false if no such client is connected.
    pub async fn kick(&self, id: u8) -> bool {
        let (reply, response) = oneshot::channel();
        if self.commands.send(AdminCommand::Kick(id, reply)).is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    pub async fn players(&self) -> Vec<PlayerInfo> {
        let (reply, response) = oneshot::channel();
        let command = AdminCommand::ListPlayers(reply);
        if self.commands.send(command).is_err() {
            return Vec::new();
        }
        response.await.unwrap_or_default()
    }

    /// Stops the server, notifying players if a game is running
    pub async fn quit(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(AdminCommand::Quit(reply)).is_ok() {
            let _ = response.await;
        }
    }
}

/// Main server owning the connection registry and the game session
///
/// Every inbound message, connection change and admin request passes through
/// the single task running [`Server::run`], so a move is validated, applied
/// and broadcast before the next event is looked at.
pub struct Server {
    listener: TcpListener,
    clients: ClientManager,
    session: Option<GameSession>,
    game_started: bool,
    stopping: bool,

    // Communication channels
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    commands_tx: mpsc::UnboundedSender<AdminCommand>,
    commands_rx: mpsc::UnboundedReceiver<AdminCommand>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(config.max_clients),
            session: None,
            game_started: false,
            stopping: false,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            commands: self.commands_tx.clone(),
        }
    }

    /// Runs until the admin quits or a started game is cancelled
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while !self.stopping {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.handle_accept(stream, addr),
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                Some(command) = self.commands_rx.recv() => self.handle_command(command),
            }
        }

        self.clients.close_all();
        info!("Server stopped");
        Ok(())
    }

    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.game_started {
            info!("Refusing connection from {}: game already started", addr);
            return;
        }

        let events = self.events_tx.clone();
        let id = match self
            .clients
            .add_client(addr, |id| Connection::from_tcp(id, stream, events))
        {
            Some(id) => id,
            None => {
                warn!("Refusing connection from {}: server is full", addr);
                return;
            }
        };

        match Hello::new(id, &provisional_name(id)) {
            Ok(hello) => {
                self.clients.send_to(id, &Message::Hello(hello));
            }
            Err(e) => {
                error!("Could not build hello for client {}: {}", id, e);
                self.kill_client(id, "handshake could not be offered");
            }
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        let ConnectionEvent {
            id,
            serial,
            inbound,
        } = event;
        if !self.clients.is_current(id, serial) {
            debug!("Ignoring event from departed connection {}#{}", id, serial);
            return;
        }

        match inbound {
            Inbound::Message(message) => self.handle_message(id, message),
            Inbound::Malformed(e) => {
                self.kill_client(id, &format!("malformed frame: {}", e));
            }
            Inbound::Closed => {
                if let Some(client) = self.clients.remove_client(id) {
                    self.after_departure(&client.name);
                }
            }
        }
    }

    fn handle_message(&mut self, id: u8, message: Message) {
        let kind = message.message_type();
        if kind.is_server_only() {
            self.kill_client(id, &format!("sent server-only message {:?}", kind));
            return;
        }

        match message {
            Message::Hello(hello) => self.handle_hello(id, hello),
            Message::Chat(chat) => self.handle_chat(id, chat),
            other => self.handle_move(id, other),
        }
    }

    fn handle_hello(&mut self, id: u8, hello: Hello) {
        if self.clients.hello_received(id) {
            self.kill_client(id, "hello received twice");
            return;
        }
        if hello.id() != id {
            self.kill_client(id, &format!("hello echoed id {}", hello.id()));
            return;
        }

        self.clients.complete_handshake(id, hello.name());
        self.broadcast_players();
    }

    fn handle_chat(&mut self, id: u8, chat: Chat) {
        if !self.clients.hello_received(id) {
            self.kill_client(id, "chat before hello");
            return;
        }
        if chat.sender() != id {
            self.kill_client(id, &format!("chat claims sender {}", chat.sender()));
            return;
        }

        self.clients.broadcast(&Message::Chat(chat));
    }

    fn handle_move(&mut self, id: u8, message: Message) {
        if !self.clients.hello_received(id) {
            self.kill_client(id, &format!("{:?} before hello", message.message_type()));
            return;
        }

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                self.kill_client(id, &format!("{:?} outside a game", message.message_type()));
                return;
            }
        };

        if let Err(e) = session.apply(id, &message) {
            self.kill_client(id, &e.to_string());
            return;
        }

        if let Some(winner) = session.winner() {
            info!("Player {} conquered the world", winner);
        }
        self.broadcast_game_state();
    }

    fn handle_command(&mut self, command: AdminCommand) {
        match command {
            AdminCommand::StartGame(reply) => {
                let result = self.start_game();
                if let Err(e) = &result {
                    warn!("Refusing to start game: {}", e);
                }
                let _ = reply.send(result);
            }
            AdminCommand::Kick(id, reply) => {
                let known = self.clients.contains(id);
                if known {
                    self.kill_client(id, "kicked by admin");
                }
                let _ = reply.send(known);
            }
            AdminCommand::ListPlayers(reply) => {
                let players = self
                    .clients
                    .ids()
                    .into_iter()
                    .filter_map(|id| self.clients.get(id))
                    .map(|client| PlayerInfo {
                        id: client.id,
                        name: client.name.clone(),
                        addr: client.addr,
                        hello_received: client.hello_received,
                    })
                    .collect();
                let _ = reply.send(players);
            }
            AdminCommand::Quit(reply) => {
                if self.session.take().is_some() {
                    warn!("Cancelling game: {}", SHUTDOWN_REASON);
                    self.clients.fail_all(SHUTDOWN_REASON);
                } else {
                    self.clients.close_all();
                }
                self.stopping = true;
                let _ = reply.send(());
            }
        }
    }

    fn start_game(&mut self) -> Result<(), StartError> {
        if self.game_started {
            return Err(StartError::AlreadyStarted);
        }
        let count = self.clients.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(StartError::PlayerCount(count));
        }
        let ids = self.clients.ids();
        if let Some(&pending) = ids.iter().find(|&&id| !self.clients.hello_received(id)) {
            return Err(StartError::HandshakePending(pending));
        }

        self.session = Some(GameSession::start(&ids, StdRng::from_entropy())?);
        self.game_started = true;
        self.broadcast_game_state();
        Ok(())
    }

    /// Drops a client for misbehaving
    fn kill_client(&mut self, id: u8, reason: &str) {
        if let Some(client) = self.clients.remove_client(id) {
            warn!("Dropping client {} ({}): {}", id, client.name, reason);
            client.connection().close();
            self.after_departure(&client.name);
        }
    }

    fn after_departure(&mut self, name: &str) {
        if self.session.is_some() {
            self.cancel_session(&format!("Player {} was disconnected", name));
        } else if !self.game_started {
            self.broadcast_players();
        }
    }

    fn cancel_session(&mut self, reason: &str) {
        warn!("Cancelling game: {}", reason);
        self.session = None;
        self.clients.fail_all(reason);
        self.stopping = true;
    }

    fn broadcast_players(&self) {
        match self.clients.players_message() {
            Ok(players) => self.clients.broadcast(&players),
            Err(e) => error!("Could not build player list: {}", e),
        }
    }

    /// Sends every participant a snapshot carrying their own cards
    fn broadcast_game_state(&self) {
        let session = match &self.session {
            Some(session) => session,
            None => return,
        };

        for id in self.clients.ids() {
            match session.snapshot_for(id) {
                Ok(snapshot) => {
                    self.clients.send_to(id, &snapshot);
                }
                Err(e) => error!("Could not build snapshot for client {}: {}", id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    async fn start_server() -> (SocketAddr, ServerHandle) {
        let config = ServerConfig::new("127.0.0.1", 0);
        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.run());
        (addr, handle)
    }

    async fn read_message(stream: &mut TcpStream) -> Message {
        let mut header = [0u8; 2];
        timeout(Duration::from_secs(5), stream.read_exact(&mut header))
            .await
            .unwrap()
            .unwrap();
        let mut frame = header.to_vec();
        frame.resize(2 + header[1] as usize, 0);
        stream.read_exact(&mut frame[2..]).await.unwrap();
        Message::decode(&frame).unwrap()
    }

    async fn assert_closed(stream: &mut TcpStream) {
        let mut rest = Vec::new();
        timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
    }

    async fn join(addr: SocketAddr, name: &str) -> (TcpStream, u8) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let id = match read_message(&mut stream).await {
            Message::Hello(hello) => hello.id(),
            _ => panic!("Unexpected message type"),
        };
        let reply = Message::from(Hello::new(id, name).unwrap());
        stream.write_all(&reply.encode()).await.unwrap();
        match read_message(&mut stream).await {
            Message::Players(players) => assert_eq!(players.name(id), Some(name)),
            _ => panic!("Unexpected message type"),
        }
        (stream, id)
    }

    #[tokio::test]
    async fn test_server_offers_provisional_hello() {
        let (addr, _handle) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        match read_message(&mut stream).await {
            Message::Hello(hello) => {
                assert_eq!(hello.id(), 1);
                assert_eq!(hello.name(), "Player 1");
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_handshake_registers_name() {
        let (addr, handle) = start_server().await;
        let (_stream, id) = join(addr, "Ada").await;

        let players = handle.players().await;
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, id);
        assert_eq!(players[0].name, "Ada");
        assert!(players[0].hello_received);
    }

    #[tokio::test]
    async fn test_wrong_hello_id_drops_client() {
        let (addr, handle) = start_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        read_message(&mut stream).await;

        let reply = Message::from(Hello::new(9, "Mallory").unwrap());
        stream.write_all(&reply.encode()).await.unwrap();

        assert_closed(&mut stream).await;
        assert!(handle.players().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_refused_without_enough_players() {
        let (addr, handle) = start_server().await;
        assert_eq!(handle.start_game().await, Err(StartError::PlayerCount(0)));

        let (_first, _) = join(addr, "Ada").await;
        assert_eq!(handle.start_game().await, Err(StartError::PlayerCount(1)));

        let mut second = TcpStream::connect(addr).await.unwrap();
        read_message(&mut second).await;
        assert_eq!(
            handle.start_game().await,
            Err(StartError::HandshakePending(2))
        );
    }

    /// Connects a socket and hands it to the server without running its loop
    async fn accept(server: &mut Server) -> TcpStream {
        let addr = server.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        let (accepted, peer) = server.listener.accept().await.unwrap();
        server.handle_accept(accepted, peer);
        stream
    }

    #[tokio::test]
    async fn test_stale_events_do_not_touch_reused_id() {
        let mut server = Server::bind(&ServerConfig::new("127.0.0.1", 0))
            .await
            .unwrap();

        let _first = accept(&mut server).await;
        let old_serial = server.clients.get(1).unwrap().connection().serial();
        server.kill_client(1, "chat before hello");
        assert!(!server.clients.contains(1));

        let mut second = accept(&mut server).await;
        assert!(server.clients.contains(1));

        // Left behind in the queue by the first connection
        let hello = Message::from(Hello::new(1, "Mallory").unwrap());
        for inbound in [Inbound::Message(hello), Inbound::Closed] {
            server.handle_event(ConnectionEvent {
                id: 1,
                serial: old_serial,
                inbound,
            });
        }

        let client = server.clients.get(1).unwrap();
        assert_eq!(client.name, "Player 1");
        assert!(!client.hello_received);
        match read_message(&mut second).await {
            Message::Hello(hello) => assert_eq!(hello.id(), 1),
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_kick_unknown_client() {
        let (_addr, handle) = start_server().await;
        assert!(!handle.kick(4).await);
    }

    #[tokio::test]
    async fn test_quit_stops_server() {
        let (addr, handle) = start_server().await;
        let (mut stream, _) = join(addr, "Ada").await;

        handle.quit().await;
        assert_closed(&mut stream).await;
        assert_eq!(handle.start_game().await, Err(StartError::ServerStopped));
    }
}
