//! # Mafia Command-Line Client
//!
//! A thin adapter that stands in for a chat front end: it sends a single
//! command for one player in one group to the mafia server and prints the
//! reply as chat-style text.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - Binds an ephemeral UDP socket and encodes `Packet::Command` with bincode
//! - Waits for exactly one reply, bounded by a timeout
//! - Keeps cycle announcements that arrive in the meantime
//! - Optionally keeps listening for further announcements
//!
//! ### Render Module (`render`)
//! Formats replies: tallies ordered by vote count, rosters split into alive and
//! dead, remaining time as days/hours/minutes, and cycle announcements naming
//! who was lynched.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use client::render::render_packet;
//! use shared::{Command, GroupId, PlayerId};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Client::new(
//!         "127.0.0.1:8080",
//!         GroupId(1),
//!         PlayerId(42),
//!         Duration::from_secs(2),
//!     )
//!     .await?;
//!
//!     let exchange = client.send_command(Command::Tally).await?;
//!     println!("{}", render_packet(&exchange.reply));
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod render;
