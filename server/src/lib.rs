//! # Authoritative Game Server Engine
//!
//! A fixed-timestep tick loop that decouples simulation from network I/O.
//! Two long-lived threads do all the work: the engine loop advances the
//! simulation and network clocks from a single monotonic accumulator pass,
//! and the receiver worker services the transport, parses client inputs,
//! and schedules each one for a deterministic future tick.
//!
//! The data path, leaves first:
//!
//! - [`clock`] - monotonic nanosecond timestamps and precise sleep.
//! - [`pacing`] - per-clock accumulators with bounded catch-up.
//! - [`schedule`] - the ring of per-tick input slots, stamped by tick id.
//! - [`queue`] - the swap-drained handoff between worker and simulation.
//! - [`acks`] - per-client received/applied sequence counters.
//! - [`transport`] - the UDP host adapter with peer slots and events.
//! - [`receiver`] - the worker loop feeding the queue and ack table.
//! - [`engine`] - the tick loop itself and the [`engine::GameHooks`]
//!   surface the host implements.
//! - [`game`] - a demonstration game: world state, snapshot emission, and
//!   the transport/worker lifecycle.
//!
//! Inputs flow transport → receiver → queue → ring → simulation callback;
//! acknowledgements flow back out through per-peer snapshots built on the
//! network tick.

pub mod acks;
pub mod clock;
pub mod engine;
pub mod game;
pub mod pacing;
pub mod queue;
pub mod receiver;
pub mod schedule;
pub mod transport;
