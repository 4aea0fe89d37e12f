use crate::game::{ClientEvent, ClientGameState, Refusal};
use crate::input::{parse_command, Command, HELP};
use crate::rendering::{render_board, render_players};
use log::{info, warn};
use shared::protocol::{Hello, ProtocolError};
use shared::{Connection, ConnectionEvent, Inbound, Message, MessageType, StateError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad message from server: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("inconsistent game state from server: {0}")]
    State(#[from] StateError),
    #[error("server sent {0:?} before its hello")]
    BeforeHello(MessageType),
    #[error("server sent unexpected {0:?}")]
    Unexpected(MessageType),
    #[error("connection to the server was lost")]
    Disconnected,
}

/// One participant's session with a game server
pub struct Client {
    name: String,
    connection: Connection,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    state: ClientGameState,
}

impl Client {
    /// Opens the TCP connection. The handshake completes inside
    /// [`Client::next_event`] once the server's hello arrives.
    pub async fn connect(address: &str, name: &str) -> Result<Self, ClientError> {
        // The id is a placeholder; only the name is being checked
        Hello::new(1, name)?;

        let stream = TcpStream::connect(address).await?;
        info!("Connected to {}", address);

        let (events_tx, events) = mpsc::unbounded_channel();
        Ok(Client {
            name: name.to_string(),
            connection: Connection::from_tcp(0, stream, events_tx),
            events,
            state: ClientGameState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ClientGameState {
        &mut self.state
    }

    /// Waits for the next server message and folds it into the local view.
    /// The server's hello is answered before the event is returned.
    pub async fn next_event(&mut self) -> Result<ClientEvent, ClientError> {
        let event = self.events.recv().await.ok_or(ClientError::Disconnected)?;
        let message = match event.inbound {
            Inbound::Message(message) => message,
            Inbound::Malformed(e) => return Err(e.into()),
            Inbound::Closed => return Err(ClientError::Disconnected),
        };

        let event = self.state.apply(message)?;
        if let ClientEvent::Welcome(id) = event {
            self.send(&Hello::new(id, &self.name)?.into())?;
        }
        Ok(event)
    }

    pub fn send(&self, message: &Message) -> Result<(), ClientError> {
        if self.connection.send(message) {
            Ok(())
        } else {
            Err(ClientError::Disconnected)
        }
    }

    pub fn close(&self) {
        self.connection.close();
    }

    /// Interactive text session: server events are printed as they arrive and
    /// stdin lines become moves
    pub async fn run(mut self) -> Result<(), ClientError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        loop {
            tokio::select! {
                event = self.next_event() => match event? {
                    ClientEvent::Welcome(id) => info!("Joined as player {}", id),
                    ClientEvent::PlayersChanged => println!("{}", render_players(&self.state)),
                    ClientEvent::StateUpdated => println!("{}", render_board(&self.state)),
                    ClientEvent::Chat { name, text, .. } => println!("<{}>: {}", name, text),
                    ClientEvent::GameFailed(reason) => {
                        println!("Session terminated by server: {}", reason);
                        break;
                    }
                },
                line = lines.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => break,
                    };
                    match parse_command(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.execute(command)?,
                        Err(e) => println!("{}", e),
                    }
                }
            }
        }

        self.close();
        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<(), ClientError> {
        let proposed = match command {
            Command::Board => {
                println!("{}", render_board(&self.state));
                return Ok(());
            }
            Command::Help => {
                println!("{}", HELP);
                return Ok(());
            }
            Command::Quit => return Ok(()),
            Command::Place { territory, armies } => self.state.place(territory, armies),
            Command::Attack { from, to } => self.state.attack(from, to),
            Command::Transfer { armies } => self.state.transfer(armies),
            Command::End { fortify } => self.state.end_turn(fortify),
            Command::Exchange => self.state.exchange(),
            Command::Chat(text) => self.state.chat(&text),
        };

        match proposed {
            Ok(message) => self.send(&message),
            Err(Refusal::Protocol(e)) => {
                warn!("Could not encode move: {}", e);
                Ok(())
            }
            Err(refusal) => {
                println!("{}", refusal);
                Ok(())
            }
        }
    }
}
