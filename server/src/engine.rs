//! Fixed-timestep engine loop with decoupled simulation and network clocks.
//!
//! One iteration measures elapsed real time once, banks it into both pacing
//! accumulators, settles the ticks each clock owes (bounded catch-up), then
//! sleeps until the nearer of the two next tick boundaries. The simulation
//! tick also owns the input pipeline: it drains the handoff queue, files the
//! drained inputs into the scheduled ring, and applies the current tick's
//! slot before invoking the host callback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use shared::ClientInput;

use crate::acks::AckTable;
use crate::clock::MonoClock;
use crate::pacing::{Accumulator, FRAME_CLAMP_NS, MAX_CATCHUP_TICKS};
use crate::queue::{HandoffQueue, QueuedInput};
use crate::schedule::{InputRing, DEFAULT_RING_CAPACITY};

/// Engine timing and capacity parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulation tick rate in Hz. Zero falls back to 60.
    pub sim_hz: u32,
    /// Network tick rate in Hz. Zero falls back to 20.
    pub net_hz: u32,
    /// Ticks between receiving an input and applying it.
    pub input_delay_ticks: u32,
    /// Capacity of the scheduled-input ring. Must exceed the input delay.
    pub ring_capacity: usize,
    /// Peer slots in the ack table; must match the transport host capacity.
    pub max_peers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sim_hz: 60,
            net_hz: 20,
            input_delay_ticks: 1,
            ring_capacity: DEFAULT_RING_CAPACITY,
            max_peers: shared::MAX_PEERS,
        }
    }
}

impl EngineConfig {
    /// Replaces invalid values with their defaults, logging each fallback.
    pub fn sanitized(mut self) -> Self {
        if self.sim_hz == 0 {
            warn!("invalid sim rate 0 Hz, falling back to 60");
            self.sim_hz = 60;
        }
        if self.net_hz == 0 {
            warn!("invalid net rate 0 Hz, falling back to 20");
            self.net_hz = 20;
        }
        if self.ring_capacity == 0 {
            warn!(
                "invalid ring capacity 0, falling back to {}",
                DEFAULT_RING_CAPACITY
            );
            self.ring_capacity = DEFAULT_RING_CAPACITY;
        }
        if self.input_delay_ticks as usize >= self.ring_capacity {
            warn!(
                "input delay {} does not fit ring capacity {}, falling back to 1",
                self.input_delay_ticks, self.ring_capacity
            );
            self.input_delay_ticks = 1;
        }
        if self.max_peers == 0 {
            warn!("invalid peer capacity 0, falling back to {}", shared::MAX_PEERS);
            self.max_peers = shared::MAX_PEERS;
        }
        self
    }
}

/// State shared between the engine loop, the receiver worker, and the host
/// callbacks: the run flag, the published tick counters, the handoff
/// queue, and the ack table. Bundled in one value so nothing lives in
/// process-wide statics.
pub struct EngineShared {
    running: AtomicBool,
    sim_tick: AtomicU64,
    net_tick: AtomicU64,
    input_delay_ticks: u32,
    pub queue: HandoffQueue,
    pub acks: AckTable,
}

impl EngineShared {
    /// Most recently published simulation tick. Written only by the engine
    /// loop; a slightly stale reading merely delays an input by one tick.
    pub fn sim_tick(&self) -> u64 {
        self.sim_tick.load(Ordering::Relaxed)
    }

    /// Most recently published network tick. Written only by the engine
    /// loop.
    pub fn net_tick(&self) -> u64 {
        self.net_tick.load(Ordering::Relaxed)
    }

    /// Tick at which an input received right now must be applied.
    pub fn target_tick(&self) -> u64 {
        self.sim_tick() + u64::from(self.input_delay_ticks)
    }

    pub fn input_delay_ticks(&self) -> u32 {
        self.input_delay_ticks
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Requests a cooperative shutdown. Callable from any thread.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Hooks the engine drives on behalf of the host. All methods default to
/// no-ops so a host only implements what it needs.
///
/// `load` is where the host creates its transport and spawns the receiver
/// worker; `unload` must join the worker before tearing the transport down.
/// The engine itself never touches either.
pub trait GameHooks {
    /// Called once before the first loop iteration.
    fn load(&mut self) {}

    /// Called once after the loop exits.
    fn unload(&mut self) {}

    /// Called once per simulation tick with the fixed timestep and the
    /// inputs scheduled for this tick, already recorded in the ack table.
    fn simulation_update(&mut self, _dt: f64, _inputs: &[ClientInput]) {}

    /// Called once per network tick.
    fn network_update(&mut self) {}
}

/// The engine loop. Owns the clock, both accumulators, and the scheduled
/// input ring; everything shared with other threads lives in
/// [`EngineShared`].
pub struct Engine {
    shared: Arc<EngineShared>,
    clock: MonoClock,
    sim_dt: f64,
    sim_acc: Accumulator,
    net_acc: Accumulator,
    ring: InputRing,
    drain_scratch: Vec<QueuedInput>,
    apply_scratch: Vec<ClientInput>,
}

const NANOS_PER_SEC: u64 = 1_000_000_000;

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let sim_period_ns = NANOS_PER_SEC / u64::from(config.sim_hz);
        let net_period_ns = NANOS_PER_SEC / u64::from(config.net_hz);

        Self {
            shared: Arc::new(EngineShared {
                running: AtomicBool::new(true),
                sim_tick: AtomicU64::new(0),
                net_tick: AtomicU64::new(0),
                input_delay_ticks: config.input_delay_ticks,
                queue: HandoffQueue::new(),
                acks: AckTable::new(config.max_peers),
            }),
            clock: MonoClock::new(),
            sim_dt: 1.0 / f64::from(config.sim_hz),
            sim_acc: Accumulator::new(sim_period_ns),
            net_acc: Accumulator::new(net_period_ns),
            ring: InputRing::new(config.ring_capacity),
            drain_scratch: Vec::new(),
            apply_scratch: Vec::new(),
        }
    }

    /// Handle to the state shared with the receiver worker and callbacks.
    pub fn shared(&self) -> Arc<EngineShared> {
        Arc::clone(&self.shared)
    }

    /// Runs the loop until [`EngineShared::request_stop`] is called.
    pub fn run(&mut self, hooks: &mut dyn GameHooks) {
        info!(
            "engine loop starting: sim {} Hz, net {} Hz, input delay {} tick(s)",
            NANOS_PER_SEC / self.sim_acc.period_ns(),
            NANOS_PER_SEC / self.net_acc.period_ns(),
            self.shared.input_delay_ticks,
        );

        hooks.load();

        let mut last_ns = self.clock.now_ns();
        while self.shared.is_running() {
            let now_ns = self.clock.now_ns();
            let frame_ns = (now_ns - last_ns).min(FRAME_CLAMP_NS);
            last_ns = now_ns;

            let sim = self.sim_acc.advance(frame_ns);
            for _ in 0..sim.ticks {
                self.run_sim_tick(hooks);
            }
            if sim.dropped_ns > 0 {
                warn!(
                    "sim backlog exceeded {} catch-up ticks, dropping {} ms",
                    MAX_CATCHUP_TICKS,
                    sim.dropped_ns / 1_000_000
                );
            }

            let net = self.net_acc.advance(frame_ns);
            for _ in 0..net.ticks {
                self.run_net_tick(hooks);
            }
            if net.dropped_ns > 0 {
                warn!(
                    "net backlog exceeded {} catch-up ticks, dropping {} ms",
                    MAX_CATCHUP_TICKS,
                    net.dropped_ns / 1_000_000
                );
            }

            let sleep_ns = self.sim_acc.remaining_ns().min(self.net_acc.remaining_ns());
            if sleep_ns > 0 {
                self.clock.sleep_until(self.clock.now_ns() + sleep_ns);
            }
        }

        hooks.unload();
        info!("engine loop stopped at sim tick {}", self.shared.sim_tick());
    }

    fn run_sim_tick(&mut self, hooks: &mut dyn GameHooks) {
        // Single writer: the increment is published so the receiver worker
        // can stamp target ticks against a recent value.
        let tick = self.shared.sim_tick.load(Ordering::Relaxed) + 1;
        self.shared.sim_tick.store(tick, Ordering::Relaxed);

        self.shared.queue.drain_into(&mut self.drain_scratch);
        for queued in self.drain_scratch.drain(..) {
            self.ring.schedule(queued.target_sim_tick, queued.input);
        }

        self.apply_scratch.clear();
        self.ring.take(tick, &mut self.apply_scratch);
        for input in &self.apply_scratch {
            self.shared.acks.record_applied(input.client_id, input.client_seq);
        }

        hooks.simulation_update(self.sim_dt, &self.apply_scratch);
    }

    fn run_net_tick(&mut self, hooks: &mut dyn GameHooks) {
        // Single writer, same publication scheme as the simulation tick.
        let tick = self.shared.net_tick.load(Ordering::Relaxed) + 1;
        self.shared.net_tick.store(tick, Ordering::Relaxed);
        hooks.network_update();
    }
}
