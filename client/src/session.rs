//! Reference client loop: fixed-cadence input sender and snapshot consumer.
//!
//! The mirror image of the server's engine/receiver split, collapsed onto a
//! single thread: pump receive events, send one input per period, sleep a
//! millisecond, repeat.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use shared::{ClientInput, Snapshot, GAMEPLAY_CHANNEL};

use crate::transport::{ClientEvent, ConnectError, UdpClient};

/// How long to wait for the server's handshake acknowledgement.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a graceful disconnect drains leftover traffic.
pub const DISCONNECT_DRAIN: Duration = Duration::from_secs(1);

/// Default delay between input sends, roughly 60 Hz.
pub const DEFAULT_SEND_PERIOD: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to encode input: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resolves a `host:port` string, accepting IP literals and DNS names.
pub fn resolve_address(addr: &str) -> io::Result<SocketAddr> {
    if let Ok(parsed) = addr.parse::<SocketAddr>() {
        return Ok(parsed);
    }
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address resolved for {addr}"),
        )
    })
}

/// A connected reference session.
pub struct Session {
    client: Option<UdpClient>,
    send_period: Duration,
    client_tick: u32,
    client_seq: u32,
    last_snapshot: Option<Snapshot>,
}

impl Session {
    /// Connects to the server, waiting up to [`HANDSHAKE_TIMEOUT`].
    pub fn connect(server: SocketAddr, send_period: Duration) -> Result<Self, ConnectError> {
        let client = UdpClient::connect(server, HANDSHAKE_TIMEOUT)?;
        Ok(Self {
            client: Some(client),
            send_period,
            client_tick: 0,
            client_seq: 0,
            last_snapshot: None,
        })
    }

    pub fn peer_id(&self) -> Option<u32> {
        self.client.as_ref().map(UdpClient::peer_id)
    }

    /// Most recent snapshot received from the server, if any.
    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.last_snapshot
    }

    /// Runs the loop until disconnected by the server, or until `run_for`
    /// elapses when given.
    pub fn run(&mut self, run_for: Option<Duration>) -> Result<(), SessionError> {
        let started = Instant::now();
        let mut last_send = Instant::now();

        while self.client.is_some() {
            self.pump_events()?;

            if self.client.is_some() && last_send.elapsed() >= self.send_period {
                last_send = Instant::now();
                self.send_next_input()?;
            }

            if let Some(limit) = run_for {
                if started.elapsed() >= limit {
                    break;
                }
            }

            thread::sleep(Duration::from_millis(1));
        }

        Ok(())
    }

    /// Graceful teardown with the standard drain window. A session already
    /// disconnected by the server tears down immediately.
    pub fn shutdown(mut self) -> io::Result<()> {
        if let Some(client) = self.client.take() {
            client.disconnect(DISCONNECT_DRAIN)?;
        }
        info!("client session closed");
        Ok(())
    }

    fn pump_events(&mut self) -> io::Result<()> {
        let mut disconnected = false;

        if let Some(client) = self.client.as_mut() {
            while let Some(event) = client.service(Duration::ZERO)? {
                match event {
                    ClientEvent::Receive { channel, payload } if channel == GAMEPLAY_CHANNEL => {
                        match Snapshot::from_wire_json(&payload) {
                            Ok(snapshot) => {
                                debug!(
                                    "snapshot serverTick={} ackApplied={} ackRecv={}",
                                    snapshot.server_tick, snapshot.ack_applied, snapshot.ack_recv
                                );
                                self.last_snapshot = Some(snapshot);
                            }
                            Err(err) => {
                                warn!("undecodable snapshot ({} bytes): {err}", payload.len());
                            }
                        }
                    }
                    ClientEvent::Receive { .. } => {}
                    ClientEvent::Disconnect => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected {
            info!("disconnected by server");
            self.client = None;
        }
        Ok(())
    }

    fn send_next_input(&mut self) -> Result<(), SessionError> {
        self.client_tick += 1;
        self.client_seq += 1;

        let input = self.sample_input();
        let bytes = input.to_wire_json()?;
        if let Some(client) = self.client.as_ref() {
            client.send_unsequenced(GAMEPLAY_CHANNEL, &bytes)?;
        }
        Ok(())
    }

    /// Synthetic input: a slow circular stick sweep with one held button.
    fn sample_input(&self) -> ClientInput {
        let phase = self.client_tick as f32 * 0.05;
        ClientInput {
            client_id: 0,
            client_tick: self.client_tick,
            client_seq: self.client_seq,
            buttons: 1,
            axis_x: phase.cos() * 0.5,
            axis_y: phase.sin() * 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_address_accepts_ip_literals() {
        let addr = resolve_address("127.0.0.1:7777").unwrap();
        assert_eq!(addr.port(), 7777);

        let addr = resolve_address("[::1]:7777").unwrap();
        assert_eq!(addr.port(), 7777);
    }

    #[test]
    fn resolve_address_accepts_localhost() {
        let addr = resolve_address("localhost:7777").unwrap();
        assert_eq!(addr.port(), 7777);
    }

    #[test]
    fn resolve_address_rejects_garbage() {
        assert!(resolve_address("definitely-not-an-address").is_err());
    }

    #[test]
    fn sampled_axes_stay_in_range() {
        for tick in (0..1000).step_by(7) {
            let session = Session {
                client: None,
                send_period: DEFAULT_SEND_PERIOD,
                client_tick: tick,
                client_seq: tick,
                last_snapshot: None,
            };
            let sampled = session.sample_input();
            assert!((-1.0..=1.0).contains(&sampled.axis_x));
            assert!((-1.0..=1.0).contains(&sampled.axis_y));
            assert_eq!(sampled.client_tick, tick);
        }
    }
}
