//! # Conquest Server Library
//!
//! The authoritative side of a Conquest game. The server hands out player
//! ids, runs the hello handshake, starts a game on the admin's request and
//! then validates every move against the rules before broadcasting a fresh
//! snapshot to each participant.
//!
//! ## Architecture
//!
//! ### Single Coordinator Task
//! Each TCP connection is a pair of tasks from [`shared::connection`]. Their
//! decoded messages, the listener and the admin commands all feed one loop in
//! [`network::Server::run`]. That loop owns the registry and the game, so a
//! move is validated, applied and broadcast before anything else happens.
//!
//! ### All-or-nothing Sessions
//! Once a game has started no one can join, and any departure cancels the
//! game for everyone with a failure notice.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! - Id assignment from the pool `1..=15`, lowest free first
//! - Handshake progress and announced names
//! - Broadcasting and bulk shutdown
//!
//! ### Game Module (`game`)
//! The running session: rules state plus its random source, and the mapping
//! from protocol messages to moves.
//!
//! ### Network Module (`network`)
//! The listener, the coordinator loop and the admin [`network::ServerHandle`].
//!
//! ### Config Module (`config`)
//! Listen address and connection limit.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::bind(&ServerConfig::new("0.0.0.0", 7777)).await?;
//!     let admin = server.handle();
//!     let running = tokio::spawn(server.run());
//!
//!     // ... once players have joined
//!     admin.start_game().await?;
//!
//!     running.await??;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
