//! Client input wire format: parsing, validation, and serialization.
//!
//! The server receives one JSON object per input packet. Parsing is done
//! field by field over a [`serde_json::Value`] rather than a derived struct
//! so that the two failure modes stay distinct: bytes that are not JSON at
//! all produce [`ParseError::Syntax`], while well-formed JSON missing a
//! required field produces [`ParseError::Schema`] naming the field.

use serde::Serialize;
use thiserror::Error;

/// Why an input payload was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload was not valid JSON.
    #[error("invalid input payload: {0}")]
    Syntax(#[from] serde_json::Error),
    /// The payload was JSON but a required field is missing or malformed.
    #[error("input payload missing or invalid field `{0}`")]
    Schema(&'static str),
}

/// A single frame of player input as consumed by the simulation.
///
/// `client_id` is stamped by the server from the transport's peer index; it
/// never appears on the wire. `client_tick` and `client_seq` come from the
/// client's own counters. The axes are guaranteed to be finite and within
/// `[-1, 1]` once parsing succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInput {
    /// Peer index assigned by the transport, used as the ack-table index.
    pub client_id: u32,
    /// The client's local tick counter when the input was captured.
    pub client_tick: u32,
    /// Monotonically increasing input sequence number, starting at 1.
    pub client_seq: u32,
    /// Bitmask of pressed buttons.
    pub buttons: u32,
    /// Horizontal axis, clamped to `[-1, 1]`.
    pub axis_x: f32,
    /// Vertical axis, clamped to `[-1, 1]`.
    pub axis_y: f32,
}

/// Wire shape of an outgoing input packet. `client_id` is intentionally
/// absent; the server derives it from the sending peer.
#[derive(Serialize)]
struct WireInput {
    #[serde(rename = "clientTick")]
    client_tick: u32,
    seq: u32,
    buttons: u32,
    ax: f32,
    ay: f32,
}

impl ClientInput {
    /// Serializes this input to the compact JSON the server expects.
    pub fn to_wire_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&WireInput {
            client_tick: self.client_tick,
            seq: self.client_seq,
            buttons: self.buttons,
            ax: self.axis_x,
            ay: self.axis_y,
        })
    }
}

/// Clamps an axis value to `[-1, 1]`, coercing non-finite values.
///
/// Infinities land on the nearer bound; NaN falls back to the neutral 0.0,
/// the same default used for an absent field. JSON itself cannot encode
/// non-finite numbers, so this path only matters for inputs built in-process.
pub fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

/// Interprets a JSON value as a non-negative integer that fits in a `u32`.
///
/// Accepts plain integers as well as float spellings like `7.0` (truncated),
/// rejecting negatives, non-numbers, and anything past `u32::MAX`.
fn number_as_u32(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if !f.is_finite() || f < 0.0 || f > u32::MAX as f64 {
        return None;
    }
    Some(f as u32)
}

/// Parses an input payload received from `client_id`.
///
/// Required fields: `clientTick` and `seq` as non-negative numbers. Optional
/// fields `buttons`, `ax`, `ay` default to zero; axes are clamped. Unknown
/// fields are ignored.
pub fn parse_client_input(payload: &[u8], client_id: u32) -> Result<ClientInput, ParseError> {
    let root: serde_json::Value = serde_json::from_slice(payload)?;
    let obj = root.as_object().ok_or(ParseError::Schema("object"))?;

    let client_tick = obj
        .get("clientTick")
        .and_then(number_as_u32)
        .ok_or(ParseError::Schema("clientTick"))?;
    let client_seq = obj
        .get("seq")
        .and_then(number_as_u32)
        .ok_or(ParseError::Schema("seq"))?;

    let buttons = obj.get("buttons").and_then(number_as_u32).unwrap_or(0);
    let axis_x = obj
        .get("ax")
        .and_then(serde_json::Value::as_f64)
        .map(|v| clamp_axis(v as f32))
        .unwrap_or(0.0);
    let axis_y = obj
        .get("ay")
        .and_then(serde_json::Value::as_f64)
        .map(|v| clamp_axis(v as f32))
        .unwrap_or(0.0);

    Ok(ClientInput {
        client_id,
        client_tick,
        client_seq,
        buttons,
        axis_x,
        axis_y,
    })
}
