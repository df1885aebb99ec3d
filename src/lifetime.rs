//! Process-wide liveness accounting.
//!
//! A host that loads the provider as a plugin needs to know when it may be
//! unloaded: no provider instance alive and no outstanding module locks.
//! Every [`crate::ThumbnailProvider`] holds an [`InstanceGuard`] for its whole
//! lifetime; hosts pin the module explicitly with [`lock_module`].

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

static LIVE_INSTANCES: AtomicU32 = AtomicU32::new(0);
static MODULE_LOCKS: AtomicU32 = AtomicU32::new(0);

/// Counts one live provider instance until dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    _private: (),
}

impl InstanceGuard {
    pub fn acquire() -> Self {
        LIVE_INSTANCES.fetch_add(1, Ordering::SeqCst);
        Self { _private: () }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        LIVE_INSTANCES.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pin (`true`) or release (`false`) the module. Releasing with no
/// outstanding lock is ignored.
pub fn lock_module(lock: bool) {
    if lock {
        MODULE_LOCKS.fetch_add(1, Ordering::SeqCst);
        debug!("Module locked");
    } else {
        let released = MODULE_LOCKS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        debug!("Module unlock (released: {})", released);
    }
}

/// Number of provider instances currently alive.
pub fn live_instances() -> u32 {
    LIVE_INSTANCES.load(Ordering::SeqCst)
}

/// Number of outstanding module locks.
pub fn module_locks() -> u32 {
    MODULE_LOCKS.load(Ordering::SeqCst)
}

/// Whether the host may unload the module right now.
pub fn can_unload() -> bool {
    live_instances() == 0 && module_locks() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and tests run in parallel, so only facts that
    // hold while a guard or lock is held are asserted.

    #[test]
    fn guard_keeps_module_loaded() {
        let guard = InstanceGuard::acquire();
        assert!(live_instances() >= 1);
        assert!(!can_unload());
        drop(guard);
    }

    #[test]
    fn lock_keeps_module_loaded() {
        lock_module(true);
        assert!(module_locks() >= 1);
        assert!(!can_unload());
        lock_module(false);
    }
}
