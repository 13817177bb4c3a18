//! # Shared Protocol Library
//!
//! This crate contains everything the game server and the reference client
//! must agree on: the JSON wire contract for inputs and snapshots, the
//! datagram framing used by the UDP transport adapter, and the logging
//! setup both binaries install at startup.
//!
//! ## Wire Contract
//!
//! Inputs travel client to server as compact JSON on channel 0:
//!
//! ```json
//! { "clientTick": 7, "seq": 1, "buttons": 1, "ax": 0.25, "ay": -0.10 }
//! ```
//!
//! `clientTick` and `seq` are required; the rest default to zero. The server
//! clamps both axes to `[-1, 1]` on ingress. Snapshots travel server to
//! client, one per peer per network tick, because the acknowledgement
//! sequences are client-specific:
//!
//! ```json
//! { "serverTick": 101, "ackApplied": 1, "ackRecv": 1 }
//! ```
//!
//! ## Design Philosophy
//!
//! The codec is deliberately permissive on optional fields and strict on
//! required ones: a packet missing `seq` is rejected with a schema error,
//! while unknown extra fields are ignored so older servers tolerate newer
//! clients. All parsing is length-aware; payloads are never assumed to be
//! null-terminated or even UTF-8.

pub mod input;
pub mod logging;
pub mod snapshot;
pub mod wire;

pub use input::{parse_client_input, ClientInput, ParseError};
pub use snapshot::Snapshot;

/// Default UDP port the server listens on.
pub const DEFAULT_PORT: u16 = 7777;

/// Maximum number of concurrently connected peers.
///
/// The server sizes its ack table to this value and asserts at startup that
/// the transport host was created with the same capacity, since peer ids are
/// used directly as ack-table indices.
pub const MAX_PEERS: usize = 64;

/// Number of logical channels carried by the datagram framing.
pub const CHANNEL_COUNT: u8 = 2;

/// Channel that carries all gameplay payloads (inputs and snapshots).
pub const GAMEPLAY_CHANNEL: u8 = 0;
