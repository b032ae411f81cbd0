//! # coderoyale
//!
//! The match server binary's library: wires transport, protocol,
//! session, and room crates into a running server for CodeRoyale, a
//! real-time competitive coding battle royale.
//!
//! A WebSocket listener accepts the duplex game connection per
//! [`coderoyale_room`]'s room-actor model; a small HTTP side channel
//! ([`gateway`]) handles the request/response parts (create a room,
//! register a player, check room state) that don't belong on a
//! push-based stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coderoyale::CodeRoyaleServerBuilder;
//! use coderoyale::judge::StubJudgeClient;
//! use coderoyale::snapshot_store::FsSnapshotStore;
//!
//! # async fn run(auth: impl coderoyale_session::Authenticator) -> Result<(), coderoyale::CodeRoyaleError> {
//! let store = FsSnapshotStore::new("./data").await?;
//! let server = CodeRoyaleServerBuilder::new()
//!     .ws_addr("0.0.0.0:8080")
//!     .http_addr("0.0.0.0:8081")
//!     .build(auth, StubJudgeClient::new(), store)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
pub mod gateway;
mod handler;
pub mod judge;
pub mod problems;
mod server;
pub mod snapshot_store;

pub use error::CodeRoyaleError;
pub use server::{CodeRoyaleServer, CodeRoyaleServerBuilder, ServerState, PROTOCOL_VERSION};
