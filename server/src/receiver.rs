//! Receiver worker: services the transport and feeds the simulation.
//!
//! Runs on its own thread. Every successfully parsed input is stamped with
//! the tick it must be applied at (the engine's published tick plus the
//! input delay) before being handed off, so the simulation stays
//! deterministic no matter how arrival times jitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use shared::parse_client_input;

use crate::engine::EngineShared;
use crate::queue::QueuedInput;
use crate::transport::{HostEvent, UdpHost};

/// How long one service call may block. Short enough to notice the stop
/// flag promptly, long enough to keep an idle worker off the CPU.
pub const SERVICE_TIMEOUT: Duration = Duration::from_millis(1);

/// Runs the receive loop until `running` is cleared.
///
/// The worker owns all servicing of the host; the engine thread only sends.
/// The caller must join this thread before dropping the host.
pub fn run(host: Arc<UdpHost>, shared: Arc<EngineShared>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        let event = match host.service(SERVICE_TIMEOUT) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!("transport service error: {err}");
                continue;
            }
        };

        match event {
            HostEvent::Connect { peer } => info!("client connected, peer={peer}"),
            HostEvent::Receive { peer, payload } => handle_payload(&shared, peer, &payload),
            HostEvent::Disconnect { peer } => info!("client disconnected, peer={peer}"),
            HostEvent::DisconnectTimeout { peer } => info!("client timed out, peer={peer}"),
        }
    }
}

fn handle_payload(shared: &EngineShared, peer: u32, payload: &[u8]) {
    match parse_client_input(payload, peer) {
        Ok(input) => {
            shared.acks.record_received(input.client_id, input.client_seq);
            shared.queue.push(QueuedInput {
                target_sim_tick: shared.target_tick(),
                input,
            });
        }
        Err(err) => {
            warn!(
                "invalid input from client={peer} (len={}): {err}",
                payload.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineConfig};
    use shared::wire::{self, FrameKind};
    use std::net::UdpSocket;
    use std::thread;
    use std::time::Instant;

    fn framed_send(socket: &UdpSocket, kind: FrameKind, payload: &[u8]) {
        socket.send(&wire::encode_frame(kind, 0, payload)).unwrap();
    }

    /// Boots a host plus receiver worker and returns the pieces the tests
    /// poke at. The engine itself is never started; the published tick
    /// stays at zero, making target ticks predictable.
    fn start_receiver(
        config: EngineConfig,
    ) -> (
        Arc<UdpHost>,
        Arc<EngineShared>,
        Arc<AtomicBool>,
        thread::JoinHandle<()>,
        UdpSocket,
    ) {
        let engine = Engine::new(config);
        let shared = engine.shared();
        let host = Arc::new(
            UdpHost::bind("127.0.0.1:0".parse().unwrap(), shared.acks.len()).unwrap(),
        );
        let running = Arc::new(AtomicBool::new(true));
        let worker = thread::spawn({
            let host = Arc::clone(&host);
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            move || run(host, shared, running)
        });

        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(host.local_addr().unwrap()).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        framed_send(&socket, FrameKind::Connect, &[]);
        let mut buf = [0u8; 128];
        let len = socket.recv(&mut buf).unwrap();
        let (kind, _, _) = wire::decode_frame(&buf[..len]).unwrap();
        assert_eq!(kind, FrameKind::ConnectAck);

        (host, shared, running, worker, socket)
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met within 2s");
    }

    #[test]
    fn valid_input_is_queued_with_the_delayed_target_tick() {
        let (_host, shared, running, worker, socket) =
            start_receiver(EngineConfig::default());

        framed_send(
            &socket,
            FrameKind::Data,
            br#"{"clientTick":7,"seq":1,"buttons":1,"ax":0.25,"ay":-0.10}"#,
        );

        wait_for(|| shared.acks.received(0) == 1);

        let mut out = Vec::new();
        shared.queue.drain_into(&mut out);
        assert_eq!(out.len(), 1);
        // Engine tick is still 0, so the target is exactly the input delay.
        assert_eq!(out[0].target_sim_tick, 1);
        assert_eq!(out[0].input.client_id, 0);
        assert_eq!(out[0].input.client_seq, 1);

        running.store(false, Ordering::Relaxed);
        worker.join().unwrap();
    }

    #[test]
    fn malformed_payload_changes_nothing() {
        let (_host, shared, running, worker, socket) =
            start_receiver(EngineConfig::default());

        framed_send(&socket, FrameKind::Data, b"not-json");
        // Follow with a valid packet so there is something to wait on.
        framed_send(&socket, FrameKind::Data, br#"{"clientTick":1,"seq":5}"#);

        wait_for(|| shared.acks.received(0) == 5);

        let mut out = Vec::new();
        shared.queue.drain_into(&mut out);
        assert_eq!(out.len(), 1, "the malformed packet must not be queued");
        assert_eq!(out[0].input.client_seq, 5);

        running.store(false, Ordering::Relaxed);
        worker.join().unwrap();
    }

    #[test]
    fn configured_delay_is_reflected_in_the_target() {
        let (_host, shared, running, worker, socket) = start_receiver(EngineConfig {
            input_delay_ticks: 4,
            ..EngineConfig::default()
        });

        framed_send(&socket, FrameKind::Data, br#"{"clientTick":1,"seq":1}"#);
        wait_for(|| shared.acks.received(0) == 1);

        let mut out = Vec::new();
        shared.queue.drain_into(&mut out);
        assert_eq!(out[0].target_sim_tick, 4);

        running.store(false, Ordering::Relaxed);
        worker.join().unwrap();
    }

    #[test]
    fn worker_stops_when_the_flag_clears() {
        let (_host, _shared, running, worker, _socket) =
            start_receiver(EngineConfig::default());

        running.store(false, Ordering::Relaxed);
        worker.join().unwrap();
    }
}
