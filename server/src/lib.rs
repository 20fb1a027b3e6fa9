//! # Mafia Game Server Library
//!
//! Runs one social-deduction ("mafia") game session per group and exposes the
//! sessions to chat adapters over UDP.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The per-group state machine and the only public entry point to game logic:
//! - Signup, dropout and the three-player quorum check at start
//! - Lynch votes, no-lynch votes and vote retraction during the day
//! - Day/night timing driven by an externally supplied clock
//! - `tick`, which resolves the day's vote when it expires and flips the cycle
//!
//! Internally the session delegates to three private collaborators: the
//! roster (signup/alive/dead sets), the vote tally and the cycle clock.
//!
//! ### Registry Module (`registry`)
//! Owns one session per group. Every session sits behind its own lock so
//! commands for a group are serialized while groups stay independent.
//!
//! ### Network Module (`network`)
//! UDP adapter in front of the registry:
//! - Decodes `Packet::Command` datagrams and replies to the sender
//! - Ticks every session on a fixed interval
//! - Broadcasts `Packet::CycleChanged` to everyone who has talked to a group
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{CycleDefaults, Server};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_secs(1),
//!         CycleDefaults::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The core never reads the wall clock or performs I/O; callers pass `now`
//! explicitly, which keeps every session operation synchronous and short.

mod clock;
mod roster;
mod tally;

pub mod network;
pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::GameSession;
