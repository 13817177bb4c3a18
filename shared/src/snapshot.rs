//! Server snapshot wire format.
//!
//! One snapshot is sent to each connected peer every network tick. The two
//! acknowledgement sequences are specific to the receiving client, which is
//! why snapshots are per-peer sends rather than a broadcast.

use serde::{Deserialize, Serialize};

/// Per-client state summary emitted by the server's network tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    /// The server's simulation tick at the time the snapshot was built.
    pub server_tick: u64,
    /// Highest input sequence the simulation has applied for this client.
    pub ack_applied: u32,
    /// Highest input sequence the receiver has seen for this client.
    pub ack_recv: u32,
}

impl Snapshot {
    /// Serializes the snapshot to its JSON wire form.
    pub fn to_wire_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses a snapshot payload. Missing fields default to zero; unknown
    /// fields are ignored.
    pub fn from_wire_json(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}
