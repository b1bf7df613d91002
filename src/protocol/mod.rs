//! Client-server communication protocol.
//!
//! This module implements the line-based news protocol spoken between clients and the
//! server, loosely modeled on NNTP. It covers the byte-level framing, the per-connection
//! state machine, the TCP server and a client.
//!
//! # Overview
//!
//! Every command and every status line is one line of text terminated by CRLF. Status lines
//! begin with a three digit code. Some replies (`215`, `220`) and the article sent after a
//! `340` carry a multi-line block terminated by a line holding a single `.`.
//!
//! ```text
//! C: GROUP comp.example
//! S: 211 1 comp.example
//! C: ARTICLE 1
//! S: 220 Article follows
//! S: Subject: Welcome
//! S: From: admin@example
//! S:
//! S: This is a sample article.
//! S: .
//! ```
//!
//! # Dot-stuffing
//!
//! A block line that starts with `.` is sent with an extra leading `.` so it can never be
//! confused with the terminator. Receivers drop the first `.` of such lines. The writer and
//! reader in [`LineTransport`] apply both halves, so any body survives a round trip.
//!
//! # Key Components
//!
//! - [`LineTransport`]: CRLF line framing and dot-terminated blocks over any reader/writer.
//! - [`Session`]: Per-connection state machine (`Idle` / `GroupSelected`).
//! - [`UsenetServer`]: TCP listener running one [`Session`] per connection.
//! - [`NewsClient`]: Client side of the protocol.
//!
//! # See Also
//!
//! - [`storage`](crate::storage): The article store that sessions read and write.
mod client;
mod response;
mod server;
mod session;
mod thread;
mod transport;

use thread::SessionPool;

pub use client::{ClientError, Draft, NewsClient, Reply};
pub use response::Response;
pub use server::{
    DEFAULT_BACKUP, DEFAULT_PORT, ServerConfig, ServerError, Shutdown, UsenetServer,
    load_or_seed, seed_sample,
};
pub use session::{Session, SessionState};
pub use transport::{LineTransport, TransportError, stuff_line, unstuff_line};
