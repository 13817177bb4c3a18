//! Client half of the UDP transport adapter.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use shared::wire::{self, FrameKind};

/// Largest datagram the client will receive.
const RECV_BUFFER_LEN: usize = 2048;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to bind client socket: {0}")]
    Bind(#[source] io::Error),
    #[error("i/o error during handshake: {0}")]
    Io(#[from] io::Error),
    #[error("server did not answer the handshake within {0:?}")]
    Timeout(Duration),
}

/// Event surfaced by one `service` call.
#[derive(Debug)]
pub enum ClientEvent {
    /// A data payload arrived on the given channel.
    Receive { channel: u8, payload: Vec<u8> },
    /// The server announced the connection is over.
    Disconnect,
}

/// A connected client endpoint. Single-threaded by design; the reference
/// client interleaves servicing and sending on one loop.
pub struct UdpClient {
    socket: UdpSocket,
    peer_id: u32,
    recv_buf: Vec<u8>,
}

impl UdpClient {
    /// Performs the connect handshake, waiting up to `timeout` for the
    /// server's acknowledgement.
    pub fn connect(server: SocketAddr, timeout: Duration) -> Result<Self, ConnectError> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).map_err(ConnectError::Bind)?;
        socket.connect(server)?;

        socket.send(&wire::encode_frame(FrameKind::Connect, 0, &[]))?;

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ConnectError::Timeout(timeout));
            }
            socket.set_read_timeout(Some(deadline - now))?;

            let len = match socket.recv(&mut buf) {
                Ok(len) => len,
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(ConnectError::Timeout(timeout));
                }
                Err(err) => return Err(err.into()),
            };

            if let Some((FrameKind::ConnectAck, _, payload)) = wire::decode_frame(&buf[..len]) {
                if let Some(peer_id) = wire::decode_peer_id(payload) {
                    return Ok(Self {
                        socket,
                        peer_id,
                        recv_buf: buf,
                    });
                }
            }
            // Anything else is stray traffic; keep waiting for the ack.
        }
    }

    /// Peer slot the server assigned during the handshake.
    pub fn peer_id(&self) -> u32 {
        self.peer_id
    }

    /// Waits up to `timeout` for one event. A zero timeout polls without
    /// blocking. Returns `Ok(None)` when nothing happened.
    pub fn service(&mut self, timeout: Duration) -> io::Result<Option<ClientEvent>> {
        if timeout.is_zero() {
            self.socket.set_nonblocking(true)?;
        } else {
            self.socket.set_nonblocking(false)?;
            self.socket.set_read_timeout(Some(timeout))?;
        }

        let len = match self.socket.recv(&mut self.recv_buf) {
            Ok(len) => len,
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match wire::decode_frame(&self.recv_buf[..len]) {
            Some((FrameKind::Data, channel, payload)) if channel < shared::CHANNEL_COUNT => {
                Ok(Some(ClientEvent::Receive {
                    channel,
                    payload: payload.to_vec(),
                }))
            }
            Some((FrameKind::Data, channel, _)) => {
                debug!("dropping payload on unknown channel {channel}");
                Ok(None)
            }
            Some((FrameKind::Disconnect, _, _)) => Ok(Some(ClientEvent::Disconnect)),
            Some(_) => Ok(None),
            None => {
                debug!("dropping unframed datagram ({len} bytes)");
                Ok(None)
            }
        }
    }

    /// Sends `payload` as an unsequenced datagram on `channel`.
    pub fn send_unsequenced(&self, channel: u8, payload: &[u8]) -> io::Result<()> {
        self.socket
            .send(&wire::encode_frame(FrameKind::Data, channel, payload))?;
        Ok(())
    }

    /// Graceful teardown: announces the disconnect, then drains incoming
    /// traffic for up to `drain_window` or until the server acknowledges.
    pub fn disconnect(mut self, drain_window: Duration) -> io::Result<()> {
        self.socket
            .send(&wire::encode_frame(FrameKind::Disconnect, 0, &[]))?;

        let deadline = Instant::now() + drain_window;
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.service(remaining.min(Duration::from_millis(100)))? {
                Some(ClientEvent::Disconnect) => break,
                Some(ClientEvent::Receive { .. }) | None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_times_out_without_a_server() {
        // A bound socket nobody services: the connect frame goes nowhere.
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();

        let result = UdpClient::connect(addr, Duration::from_millis(100));
        assert!(matches!(result, Err(ConnectError::Timeout(_))));
    }

    #[test]
    fn handshake_completes_against_a_manual_ack() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (len, from) = server.recv_from(&mut buf).unwrap();
            let (kind, _, _) = wire::decode_frame(&buf[..len]).unwrap();
            assert_eq!(kind, FrameKind::Connect);
            let ack = wire::encode_frame(FrameKind::ConnectAck, 0, &wire::encode_peer_id(7));
            server.send_to(&ack, from).unwrap();
        });

        let client = UdpClient::connect(addr, Duration::from_secs(2)).unwrap();
        assert_eq!(client.peer_id(), 7);
        responder.join().unwrap();
    }

    #[test]
    fn zero_timeout_service_does_not_block() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (_, from) = server.recv_from(&mut buf).unwrap();
            let ack = wire::encode_frame(FrameKind::ConnectAck, 0, &wire::encode_peer_id(0));
            server.send_to(&ack, from).unwrap();
        });

        let mut client = UdpClient::connect(addr, Duration::from_secs(2)).unwrap();
        responder.join().unwrap();

        let started = Instant::now();
        assert!(client.service(Duration::ZERO).unwrap().is_none());
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
