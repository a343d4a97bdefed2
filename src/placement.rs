//! Thread placement - binding a thread to one logical core.
//!
//! Business code asks a `ThreadPlacement` to pin the current thread and
//! never touches OS affinity APIs itself. `CoreAffinity` is backed by the
//! `core_affinity` crate, which picks the platform backend at build time.

use tracing::{debug, info, warn};

/// Capability to pin the calling thread.
pub trait ThreadPlacement: Send + Sync {
    /// Pin the current thread to logical core `core`.
    /// Returns `false` if the core is unavailable or the OS refused.
    fn pin_current(&self, core: usize) -> bool;
}

/// Pins through the OS affinity API.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreAffinity;

impl ThreadPlacement for CoreAffinity {
    fn pin_current(&self, core: usize) -> bool {
        let Some(core_ids) = core_affinity::get_core_ids() else {
            warn!(core, "could not enumerate cores");
            return false;
        };
        let available = core_ids.len();

        match core_ids.into_iter().find(|c| c.id == core) {
            Some(core_id) => core_affinity::set_for_current(core_id),
            None => {
                warn!(core, available, "requested core does not exist");
                false
            }
        }
    }
}

/// Leaves threads where the scheduler puts them.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPlacement;

impl ThreadPlacement for NoPlacement {
    fn pin_current(&self, _core: usize) -> bool {
        false
    }
}

/// Pin the current thread if a core is configured, logging the outcome.
/// Failure to pin is never fatal.
pub fn apply(placement: &dyn ThreadPlacement, core: Option<usize>, role: &str) -> bool {
    let Some(core) = core else {
        debug!(role, "thread left unpinned");
        return false;
    };

    let pinned = placement.pin_current(core);
    if pinned {
        info!(role, core, "thread pinned");
    } else {
        warn!(role, core, "thread could not be pinned, running unpinned");
    }
    pinned
}
