//! # Conquest Client Library
//!
//! A participant's side of a Conquest game. The client connects over TCP,
//! answers the server's hello with a display name and keeps a local view of
//! the game rebuilt from every snapshot the server sends. The server is the
//! only authority: the client merely proposes moves.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The session: connection, handshake, event stream and the interactive
//! loop tying stdin to the server.
//!
//! ### Game Module (`game`)
//! The local view and the move helpers a user interface calls:
//! - Claim or place on a territory
//! - Attack with as many dice as the source allows
//! - Move into a fresh conquest, end the turn, trade cards
//!
//! ### Input Module (`input`)
//! Parses typed commands. Territories can be named or given by id.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text board, standings and lobby list.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientEvent;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:7777", "Ada").await?;
//!     loop {
//!         match client.next_event().await? {
//!             ClientEvent::StateUpdated => println!("{}", client.state().status_line()),
//!             ClientEvent::GameFailed(reason) => {
//!                 println!("{}", reason);
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
