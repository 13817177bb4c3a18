//! Reference client for the tick-loop game server.
//!
//! Mirrors the server's send/receive split on a single thread: inputs go
//! out at a fixed cadence, snapshots come back carrying the per-client
//! acknowledgement sequences.

pub mod session;
pub mod transport;
