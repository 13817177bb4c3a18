//! Datagram framing for the UDP transport adapter.
//!
//! Every datagram carries a two-byte header: a frame kind and a logical
//! channel. The framing exists so the adapter can multiplex connection
//! management and gameplay payloads over a single socket; it makes no
//! reliability or ordering promises of its own.

/// Size of the framing header preceding every payload.
pub const HEADER_LEN: usize = 2;

/// Role of a datagram within the adapter's handshake and data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Client requests a peer slot.
    Connect = 1,
    /// Server grants a slot; payload is the assigned peer id.
    ConnectAck = 2,
    /// Application payload on the header's channel.
    Data = 3,
    /// Either side announces it is going away.
    Disconnect = 4,
}

impl FrameKind {
    /// Decodes a header byte, returning `None` for unknown kinds.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FrameKind::Connect),
            2 => Some(FrameKind::ConnectAck),
            3 => Some(FrameKind::Data),
            4 => Some(FrameKind::Disconnect),
            _ => None,
        }
    }
}

/// Builds a framed datagram from kind, channel, and payload.
pub fn encode_frame(kind: FrameKind, channel: u8, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.push(kind as u8);
    datagram.push(channel);
    datagram.extend_from_slice(payload);
    datagram
}

/// Splits a datagram into its header fields and payload.
///
/// Returns `None` when the datagram is shorter than the header or the kind
/// byte is unknown; callers drop such datagrams silently.
pub fn decode_frame(datagram: &[u8]) -> Option<(FrameKind, u8, &[u8])> {
    if datagram.len() < HEADER_LEN {
        return None;
    }
    let kind = FrameKind::from_byte(datagram[0])?;
    Some((kind, datagram[1], &datagram[HEADER_LEN..]))
}

/// Encodes a peer id for a `ConnectAck` payload.
pub fn encode_peer_id(peer_id: u32) -> [u8; 4] {
    peer_id.to_le_bytes()
}

/// Decodes a `ConnectAck` payload back into a peer id.
pub fn decode_peer_id(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
