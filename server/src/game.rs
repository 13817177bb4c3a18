//! Demonstration game wired into the engine hooks.
//!
//! `load` owns the transport and receiver lifecycle; `simulation_update`
//! drives a small authoritative world; `network_update` emits one snapshot
//! per connected peer, since the acknowledgement sequences differ per
//! client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use shared::{ClientInput, Snapshot, GAMEPLAY_CHANNEL};

use crate::engine::{EngineShared, GameHooks};
use crate::receiver;
use crate::transport::UdpHost;

/// Movement speed applied to a fully deflected axis, in units per second.
const MOVE_SPEED: f32 = 120.0;

/// Positions are clamped to `[-WORLD_EXTENT, WORLD_EXTENT]` on both axes.
const WORLD_EXTENT: f32 = 512.0;

/// One controllable entity per client.
#[derive(Debug, Default, Clone, Copy)]
pub struct Avatar {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub buttons: u32,
}

/// Authoritative world state, advanced only from the simulation tick.
#[derive(Debug, Default)]
pub struct World {
    avatars: HashMap<u32, Avatar>,
}

impl World {
    /// Turns an input into the avatar's velocity for the coming ticks.
    pub fn apply_input(&mut self, input: &ClientInput) {
        let avatar = self.avatars.entry(input.client_id).or_default();
        avatar.vel_x = input.axis_x * MOVE_SPEED;
        avatar.vel_y = input.axis_y * MOVE_SPEED;
        avatar.buttons = input.buttons;
    }

    /// Integrates velocities over the fixed timestep.
    pub fn step(&mut self, dt: f32) {
        for avatar in self.avatars.values_mut() {
            avatar.x = (avatar.x + avatar.vel_x * dt).clamp(-WORLD_EXTENT, WORLD_EXTENT);
            avatar.y = (avatar.y + avatar.vel_y * dt).clamp(-WORLD_EXTENT, WORLD_EXTENT);
        }
    }

    pub fn avatar(&self, client_id: u32) -> Option<&Avatar> {
        self.avatars.get(&client_id)
    }
}

/// Host-side state driven by the engine callbacks.
pub struct ServerGame {
    port: u16,
    shared: Arc<EngineShared>,
    host: Option<Arc<UdpHost>>,
    worker: Option<JoinHandle<()>>,
    worker_running: Arc<AtomicBool>,
    world: World,
    fatal: bool,
}

impl ServerGame {
    /// Game that binds its own host on `port` during `load`.
    pub fn new(port: u16, shared: Arc<EngineShared>) -> Self {
        Self {
            port,
            shared,
            host: None,
            worker: None,
            worker_running: Arc::new(AtomicBool::new(false)),
            world: World::default(),
            fatal: false,
        }
    }

    /// Game that adopts an already-bound host. Used by tests that need to
    /// know the listen address before the engine starts.
    pub fn with_host(host: Arc<UdpHost>, shared: Arc<EngineShared>) -> Self {
        let mut game = Self::new(0, shared);
        game.host = Some(host);
        game
    }

    /// True when startup failed and the process should exit non-zero.
    pub fn failed(&self) -> bool {
        self.fatal
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.host.as_ref().and_then(|host| host.local_addr().ok())
    }

    fn fail(&mut self, message: String) {
        error!("{message}");
        self.fatal = true;
        self.shared.request_stop();
    }
}

impl GameHooks for ServerGame {
    fn load(&mut self) {
        self.shared.acks.reset();

        if self.host.is_none() {
            match UdpHost::bind_dual_stack(self.port, self.shared.acks.len()) {
                Ok(host) => self.host = Some(Arc::new(host)),
                Err(err) => {
                    return self.fail(format!("failed to create server host: {err}"));
                }
            }
        }

        let host = match self.host.as_ref() {
            Some(host) => Arc::clone(host),
            None => return,
        };

        // Peer ids index the ack table directly; the capacities must agree.
        assert_eq!(host.max_peers(), self.shared.acks.len());

        if let Ok(addr) = host.local_addr() {
            info!("server host listening on {addr}");
        }

        self.worker_running.store(true, Ordering::Relaxed);
        let spawn_result = thread::Builder::new().name("receiver".into()).spawn({
            let host = Arc::clone(&host);
            let shared = Arc::clone(&self.shared);
            let running = Arc::clone(&self.worker_running);
            move || receiver::run(host, shared, running)
        });
        match spawn_result {
            Ok(handle) => self.worker = Some(handle),
            Err(err) => {
                self.worker_running.store(false, Ordering::Relaxed);
                self.host = None;
                self.fail(format!("failed to spawn receiver worker: {err}"));
            }
        }
    }

    fn unload(&mut self) {
        self.worker_running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("receiver worker panicked before shutdown");
            }
        }
        // The worker is joined first; only now may the host go away.
        self.host = None;
        info!("server unloaded");
    }

    fn simulation_update(&mut self, dt: f64, inputs: &[ClientInput]) {
        for input in inputs {
            debug!(
                "apply input: client={} clientTick={} seq={} buttons={} ax={:.2} ay={:.2}",
                input.client_id,
                input.client_tick,
                input.client_seq,
                input.buttons,
                input.axis_x,
                input.axis_y
            );
            self.world.apply_input(input);
        }
        self.world.step(dt as f32);
    }

    fn network_update(&mut self) {
        let Some(host) = self.host.as_ref() else {
            return;
        };

        let server_tick = self.shared.sim_tick();
        for peer in host.connected_peers() {
            let snapshot = Snapshot {
                server_tick,
                ack_applied: self.shared.acks.applied(peer),
                ack_recv: self.shared.acks.received(peer),
            };
            match snapshot.to_wire_json() {
                Ok(bytes) => {
                    if let Err(err) = host.send_unsequenced(peer, GAMEPLAY_CHANNEL, &bytes) {
                        debug!("snapshot send to peer {peer} failed: {err}");
                    }
                }
                Err(err) => warn!("failed to encode snapshot for peer {peer}: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn input(client_id: u32, ax: f32, ay: f32) -> ClientInput {
        ClientInput {
            client_id,
            client_tick: 1,
            client_seq: 1,
            buttons: 0,
            axis_x: ax,
            axis_y: ay,
        }
    }

    #[test]
    fn input_sets_velocity_and_step_integrates() {
        let mut world = World::default();
        world.apply_input(&input(0, 1.0, -0.5));

        let dt = 1.0 / 60.0;
        world.step(dt);

        let avatar = world.avatar(0).unwrap();
        assert_approx_eq!(avatar.vel_x, MOVE_SPEED, 1e-4);
        assert_approx_eq!(avatar.vel_y, -MOVE_SPEED * 0.5, 1e-4);
        assert_approx_eq!(avatar.x, MOVE_SPEED * dt, 1e-4);
        assert_approx_eq!(avatar.y, -MOVE_SPEED * 0.5 * dt, 1e-4);
    }

    #[test]
    fn positions_are_clamped_to_world_bounds() {
        let mut world = World::default();
        world.apply_input(&input(0, 1.0, 0.0));

        // Far longer than it takes to reach the edge.
        for _ in 0..600 {
            world.step(1.0 / 4.0);
        }

        assert_eq!(world.avatar(0).unwrap().x, WORLD_EXTENT);
    }

    #[test]
    fn avatars_are_per_client() {
        let mut world = World::default();
        world.apply_input(&input(0, 1.0, 0.0));
        world.apply_input(&input(5, -1.0, 0.0));
        world.step(1.0 / 60.0);

        assert!(world.avatar(0).unwrap().x > 0.0);
        assert!(world.avatar(5).unwrap().x < 0.0);
        assert!(world.avatar(3).is_none());
    }
}
