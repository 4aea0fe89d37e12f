//! # Conquest Shared Library
//!
//! Everything the server and the client must agree on: the static board and
//! card catalogs, the binary wire protocol, the game rules and the connection
//! actor that moves frames over a socket.
//!
//! ## Module Organization
//!
//! ### Board (`board`) and Cards (`cards`)
//! Fixed tables indexed by small integer ids. Territory and card sets travel
//! as `u64` bit masks.
//!
//! ### Protocol (`protocol`)
//! `[type][length][payload]` frames, one codec per message type, and the
//! buffer that reassembles frames from a byte stream.
//!
//! ### Game (`game`) and Players (`player`)
//! The authoritative game state. The phase is derived from the state, moves
//! are validated in full before anything changes, and a snapshot can be
//! produced for a given recipient and rebuilt on the other side.
//!
//! ### Connection (`connection`)
//! One reader task and one writer task per socket, reporting inbound traffic
//! on a channel.

pub mod board;
pub mod cards;
pub mod connection;
pub mod game;
pub mod player;
pub mod protocol;

pub use board::{Continent, Territory};
pub use cards::{Card, CardKind};
pub use connection::{Connection, ConnectionEvent, Inbound};
pub use game::{GameData, GamePhase};
pub use player::{HeldCards, PlayerData, StateError};
pub use protocol::{Message, MessageType, ProtocolError};

/// Default TCP port of the game server
pub const DEFAULT_PORT: u16 = 7777;
