use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;

/// Lifecycle counters shared by a converter and every pool it creates
#[derive(Debug, Default)]
pub struct PoolStats {
    pools_created: AtomicUsize,
    pools_terminated: AtomicUsize,
    units_spawned: AtomicUsize,
    units_exited: AtomicUsize,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pools_created: usize,
    pub pools_terminated: usize,
    pub units_spawned: usize,
    pub units_exited: usize,
}

impl StatsSnapshot {
    #[must_use]
    pub fn live_units(&self) -> usize {
        self.units_spawned.saturating_sub(self.units_exited)
    }

    #[must_use]
    pub fn live_pools(&self) -> usize {
        self.pools_created.saturating_sub(self.pools_terminated)
    }
}

impl PoolStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pools_created: self.pools_created.load(Ordering::SeqCst),
            pools_terminated: self.pools_terminated.load(Ordering::SeqCst),
            units_spawned: self.units_spawned.load(Ordering::SeqCst),
            units_exited: self.units_exited.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn record_pool_created(&self) {
        self.pools_created.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_pool_terminated(&self) {
        self.pools_terminated.fetch_add(1, Ordering::SeqCst);
        self.audit_live_units();
    }

    pub(crate) fn record_unit_spawned(&self) {
        self.units_spawned.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_unit_exited(&self) {
        self.units_exited.fetch_add(1, Ordering::SeqCst);
    }

    // Every unit belongs to exactly one pool, so once no pool is live no unit
    // may be either.
    fn audit_live_units(&self) {
        let snap = self.snapshot();
        if snap.live_pools() == 0 && snap.live_units() > 0 {
            warn!(
                "Worker leak audit: live_units={} spawned={} exited={} after all pools terminated",
                snap.live_units(),
                snap.units_spawned,
                snap.units_exited
            );
        }
    }
}
