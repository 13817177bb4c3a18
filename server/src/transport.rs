//! UDP host adapter with a peer-slot event surface.
//!
//! Exposes the shape the engine core consumes from a reliable-UDP library:
//! peer slots addressed by index, connect/disconnect events from a blocking
//! `service` call, and unsequenced datagram sends. It is deliberately not a
//! reliable transport; nothing is retransmitted or reordered.
//!
//! Thread contract: `service` is called only by the receiver worker, while
//! `send_unsequenced` and `connected_peers` are called from the engine
//! thread during network ticks. `UdpSocket` tolerates that concurrency; the
//! peer table does not, so it sits behind a mutex.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use shared::wire::{self, FrameKind};

/// Peers silent for this long are reaped by `service`.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest datagram the host will receive.
const RECV_BUFFER_LEN: usize = 2048;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind server socket: {0}")]
    Bind(#[source] io::Error),
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("peer {0} is not connected")]
    UnknownPeer(u32),
}

/// Event surfaced by one `service` call.
#[derive(Debug)]
pub enum HostEvent {
    /// A new peer completed the handshake and was assigned a slot.
    Connect { peer: u32 },
    /// A data payload arrived from a connected peer.
    Receive { peer: u32, payload: Vec<u8> },
    /// A peer announced it is going away.
    Disconnect { peer: u32 },
    /// A peer went silent past [`PEER_TIMEOUT`].
    DisconnectTimeout { peer: u32 },
}

#[derive(Debug)]
struct PeerSlot {
    addr: SocketAddr,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct PeerTable {
    slots: Vec<Option<PeerSlot>>,
    by_addr: HashMap<SocketAddr, u32>,
}

impl PeerTable {
    fn with_capacity(max_peers: usize) -> Self {
        Self {
            slots: (0..max_peers).map(|_| None).collect(),
            by_addr: HashMap::new(),
        }
    }

    /// Lowest free slot, so ids are reused after disconnects.
    fn allocate(&mut self, addr: SocketAddr) -> Option<u32> {
        let index = self.slots.iter().position(Option::is_none)? as u32;
        self.slots[index as usize] = Some(PeerSlot {
            addr,
            last_seen: Instant::now(),
        });
        self.by_addr.insert(addr, index);
        Some(index)
    }

    fn release(&mut self, peer: u32) -> Option<SocketAddr> {
        let slot = self.slots.get_mut(peer as usize)?.take()?;
        self.by_addr.remove(&slot.addr);
        Some(slot.addr)
    }
}

/// Server-side UDP host with a fixed peer capacity.
pub struct UdpHost {
    socket: UdpSocket,
    peers: Mutex<PeerTable>,
    recv_buf: Mutex<Vec<u8>>,
}

impl UdpHost {
    /// Binds on a specific address; use port 0 for an ephemeral port.
    pub fn bind(addr: SocketAddr, max_peers: usize) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).map_err(TransportError::Bind)?;
        Ok(Self {
            socket,
            peers: Mutex::new(PeerTable::with_capacity(max_peers)),
            recv_buf: Mutex::new(vec![0u8; RECV_BUFFER_LEN]),
        })
    }

    /// Binds the wildcard address on `port`, preferring the IPv6 wildcard
    /// (dual-stack on platforms that map IPv4) with an IPv4 fallback.
    pub fn bind_dual_stack(port: u16, max_peers: usize) -> Result<Self, TransportError> {
        match Self::bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)), max_peers) {
            Ok(host) => Ok(host),
            Err(_) => Self::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), max_peers),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn max_peers(&self) -> usize {
        self.lock_peers().slots.len()
    }

    /// Ids of currently connected peers, in slot order.
    pub fn connected_peers(&self) -> Vec<u32> {
        self.lock_peers()
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|_| index as u32))
            .collect()
    }

    /// Waits up to `timeout` for one event.
    ///
    /// Returns `Ok(None)` when nothing happened. Unknown senders, unframed
    /// datagrams, and connects beyond capacity are dropped silently.
    pub fn service(&self, timeout: Duration) -> io::Result<Option<HostEvent>> {
        if let Some(event) = self.reap_timed_out_peer() {
            return Ok(Some(event));
        }

        self.socket.set_read_timeout(Some(timeout))?;
        let mut guard = self
            .recv_buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let buf = guard.as_mut_slice();
        match self.socket.recv_from(buf) {
            Ok((len, addr)) => self.dispatch(&buf[..len], addr),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Sends `payload` to a connected peer as an unsequenced datagram.
    pub fn send_unsequenced(
        &self,
        peer: u32,
        channel: u8,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let addr = {
            let peers = self.lock_peers();
            peers
                .slots
                .get(peer as usize)
                .and_then(|slot| slot.as_ref())
                .map(|slot| slot.addr)
                .ok_or(TransportError::UnknownPeer(peer))?
        };
        let datagram = wire::encode_frame(FrameKind::Data, channel, payload);
        self.socket.send_to(&datagram, addr)?;
        Ok(())
    }

    fn lock_peers(&self) -> MutexGuard<'_, PeerTable> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reap_timed_out_peer(&self) -> Option<HostEvent> {
        let mut peers = self.lock_peers();
        let timed_out = peers
            .slots
            .iter()
            .enumerate()
            .find(|(_, slot)| {
                slot.as_ref()
                    .is_some_and(|slot| slot.last_seen.elapsed() > PEER_TIMEOUT)
            })
            .map(|(index, _)| index as u32)?;
        peers.release(timed_out);
        Some(HostEvent::DisconnectTimeout { peer: timed_out })
    }

    fn dispatch(&self, datagram: &[u8], addr: SocketAddr) -> io::Result<Option<HostEvent>> {
        let Some((kind, channel, payload)) = wire::decode_frame(datagram) else {
            debug!("dropping unframed datagram from {addr} ({} bytes)", datagram.len());
            return Ok(None);
        };
        if channel >= shared::CHANNEL_COUNT {
            debug!("dropping datagram from {addr} on unknown channel {channel}");
            return Ok(None);
        }

        match kind {
            FrameKind::Connect => {
                let mut peers = self.lock_peers();
                if let Some(&peer) = peers.by_addr.get(&addr) {
                    // Duplicate handshake; resend the ack, no new event.
                    drop(peers);
                    self.send_connect_ack(peer, addr)?;
                    return Ok(None);
                }
                let Some(peer) = peers.allocate(addr) else {
                    debug!("rejecting connect from {addr}: host is full");
                    return Ok(None);
                };
                drop(peers);
                self.send_connect_ack(peer, addr)?;
                Ok(Some(HostEvent::Connect { peer }))
            }
            FrameKind::Data => {
                let mut peers = self.lock_peers();
                let Some(&peer) = peers.by_addr.get(&addr) else {
                    debug!("dropping data from unknown sender {addr}");
                    return Ok(None);
                };
                if let Some(slot) = peers.slots[peer as usize].as_mut() {
                    slot.last_seen = Instant::now();
                }
                Ok(Some(HostEvent::Receive {
                    peer,
                    payload: payload.to_vec(),
                }))
            }
            FrameKind::Disconnect => {
                let mut peers = self.lock_peers();
                let Some(&peer) = peers.by_addr.get(&addr) else {
                    return Ok(None);
                };
                peers.release(peer);
                drop(peers);
                // Acknowledge so a gracefully leaving client can stop
                // draining before its window expires.
                let goodbye = wire::encode_frame(FrameKind::Disconnect, 0, &[]);
                let _ = self.socket.send_to(&goodbye, addr);
                Ok(Some(HostEvent::Disconnect { peer }))
            }
            FrameKind::ConnectAck => Ok(None),
        }
    }

    fn send_connect_ack(&self, peer: u32, addr: SocketAddr) -> io::Result<()> {
        let ack = wire::encode_frame(FrameKind::ConnectAck, 0, &wire::encode_peer_id(peer));
        self.socket.send_to(&ack, addr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost_host(max_peers: usize) -> UdpHost {
        UdpHost::bind("127.0.0.1:0".parse().unwrap(), max_peers).unwrap()
    }

    struct TestPeer {
        socket: UdpSocket,
    }

    impl TestPeer {
        fn new(host: &UdpHost) -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.connect(host.local_addr().unwrap()).unwrap();
            socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            Self { socket }
        }

        fn send_frame(&self, kind: FrameKind, payload: &[u8]) {
            self.socket
                .send(&wire::encode_frame(kind, 0, payload))
                .unwrap();
        }

        fn recv_frame(&self) -> (FrameKind, Vec<u8>) {
            let mut buf = [0u8; 2048];
            let len = self.socket.recv(&mut buf).unwrap();
            let (kind, _, payload) = wire::decode_frame(&buf[..len]).unwrap();
            (kind, payload.to_vec())
        }
    }

    fn service_until_event(host: &UdpHost) -> HostEvent {
        for _ in 0..200 {
            if let Some(event) = host.service(Duration::from_millis(10)).unwrap() {
                return event;
            }
        }
        panic!("no event within the polling budget");
    }

    #[test]
    fn handshake_assigns_the_lowest_free_slot() {
        let host = localhost_host(4);
        let peer = TestPeer::new(&host);

        peer.send_frame(FrameKind::Connect, &[]);
        match service_until_event(&host) {
            HostEvent::Connect { peer } => assert_eq!(peer, 0),
            other => panic!("unexpected event {other:?}"),
        }

        let (kind, payload) = peer.recv_frame();
        assert_eq!(kind, FrameKind::ConnectAck);
        assert_eq!(wire::decode_peer_id(&payload), Some(0));
        assert_eq!(host.connected_peers(), vec![0]);
    }

    #[test]
    fn data_flows_both_ways() {
        let host = localhost_host(4);
        let peer = TestPeer::new(&host);

        peer.send_frame(FrameKind::Connect, &[]);
        service_until_event(&host);
        peer.recv_frame();

        peer.send_frame(FrameKind::Data, b"hello");
        match service_until_event(&host) {
            HostEvent::Receive { peer, payload } => {
                assert_eq!(peer, 0);
                assert_eq!(payload, b"hello");
            }
            other => panic!("unexpected event {other:?}"),
        }

        host.send_unsequenced(0, 0, b"snapshot").unwrap();
        let (kind, payload) = peer.recv_frame();
        assert_eq!(kind, FrameKind::Data);
        assert_eq!(payload, b"snapshot");
    }

    #[test]
    fn disconnect_frees_the_slot_for_reuse() {
        let host = localhost_host(4);
        let first = TestPeer::new(&host);

        first.send_frame(FrameKind::Connect, &[]);
        service_until_event(&host);

        first.send_frame(FrameKind::Disconnect, &[]);
        match service_until_event(&host) {
            HostEvent::Disconnect { peer } => assert_eq!(peer, 0),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(host.connected_peers().is_empty());

        let second = TestPeer::new(&host);
        second.send_frame(FrameKind::Connect, &[]);
        match service_until_event(&host) {
            HostEvent::Connect { peer } => assert_eq!(peer, 0),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_senders_and_garbage_are_dropped() {
        let host = localhost_host(4);
        let stranger = TestPeer::new(&host);

        stranger.send_frame(FrameKind::Data, b"who dis");
        stranger.socket.send(b"").unwrap();
        stranger.socket.send(&[0xff, 0x00, 0x01]).unwrap();

        for _ in 0..20 {
            assert!(host.service(Duration::from_millis(5)).unwrap().is_none());
        }
    }

    #[test]
    fn data_on_an_unknown_channel_is_dropped() {
        let host = localhost_host(4);
        let peer = TestPeer::new(&host);

        peer.send_frame(FrameKind::Connect, &[]);
        service_until_event(&host);
        peer.recv_frame();

        peer.socket
            .send(&wire::encode_frame(FrameKind::Data, 7, b"x"))
            .unwrap();
        for _ in 0..20 {
            assert!(host.service(Duration::from_millis(5)).unwrap().is_none());
        }
    }

    #[test]
    fn send_to_unknown_peer_is_an_error() {
        let host = localhost_host(2);
        assert!(matches!(
            host.send_unsequenced(1, 0, b"x"),
            Err(TransportError::UnknownPeer(1))
        ));
    }

    #[test]
    fn full_host_rejects_additional_connects() {
        let host = localhost_host(1);
        let first = TestPeer::new(&host);
        let second = TestPeer::new(&host);

        first.send_frame(FrameKind::Connect, &[]);
        service_until_event(&host);

        second.send_frame(FrameKind::Connect, &[]);
        for _ in 0..20 {
            assert!(host.service(Duration::from_millis(5)).unwrap().is_none());
        }
        assert_eq!(host.connected_peers(), vec![0]);
    }
}
