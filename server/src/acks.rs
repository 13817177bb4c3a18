//! Per-client acknowledgement counters.

use std::sync::atomic::{AtomicU32, Ordering};

/// Last-received and last-applied input sequences, one pair per peer slot.
///
/// Each cell is an independent atomic. The receiver worker is the only
/// writer of the received side; the engine loop is the only writer of the
/// applied side. Relaxed ordering suffices because snapshots report the two
/// values verbatim as unrelated scalars; no invariant spans cells.
pub struct AckTable {
    last_recv: Vec<AtomicU32>,
    last_applied: Vec<AtomicU32>,
}

impl AckTable {
    pub fn new(max_peers: usize) -> Self {
        Self {
            last_recv: (0..max_peers).map(|_| AtomicU32::new(0)).collect(),
            last_applied: (0..max_peers).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of peer slots; must match the transport host's capacity.
    pub fn len(&self) -> usize {
        self.last_recv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_recv.is_empty()
    }

    /// Zeroes every counter. Called once at startup; peer slots are not
    /// reset on disconnect, a reconnecting peer with the same id simply
    /// overwrites.
    pub fn reset(&self) {
        for cell in self.last_recv.iter().chain(self.last_applied.iter()) {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Records the newest sequence seen from `client_id`. Out-of-range ids
    /// are ignored.
    pub fn record_received(&self, client_id: u32, seq: u32) {
        if let Some(cell) = self.last_recv.get(client_id as usize) {
            cell.store(seq, Ordering::Relaxed);
        }
    }

    /// Records the newest sequence the simulation applied for `client_id`.
    /// Out-of-range ids are ignored.
    pub fn record_applied(&self, client_id: u32, seq: u32) {
        if let Some(cell) = self.last_applied.get(client_id as usize) {
            cell.store(seq, Ordering::Relaxed);
        }
    }

    pub fn received(&self, client_id: u32) -> u32 {
        self.last_recv
            .get(client_id as usize)
            .map_or(0, |cell| cell.load(Ordering::Relaxed))
    }

    pub fn applied(&self, client_id: u32) -> u32 {
        self.last_applied
            .get(client_id as usize)
            .map_or(0, |cell| cell.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let acks = AckTable::new(4);
        for id in 0..4 {
            assert_eq!(acks.received(id), 0);
            assert_eq!(acks.applied(id), 0);
        }
    }

    #[test]
    fn clients_are_isolated() {
        let acks = AckTable::new(4);
        acks.record_received(0, 3);
        acks.record_applied(0, 3);
        acks.record_received(1, 1);

        assert_eq!(acks.received(0), 3);
        assert_eq!(acks.applied(0), 3);
        assert_eq!(acks.received(1), 1);
        assert_eq!(acks.applied(1), 0);
    }

    #[test]
    fn out_of_range_ids_are_ignored() {
        let acks = AckTable::new(2);
        acks.record_received(2, 7);
        acks.record_applied(900, 7);

        assert_eq!(acks.received(2), 0);
        assert_eq!(acks.applied(900), 0);
        assert_eq!(acks.received(0), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let acks = AckTable::new(2);
        acks.record_received(0, 5);
        acks.record_applied(1, 9);

        acks.reset();

        assert_eq!(acks.received(0), 0);
        assert_eq!(acks.applied(1), 0);
    }
}
