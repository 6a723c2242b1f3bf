//! Live core clock frequency
//!
//! Written exactly once, by the bring-up sequence, and read by every rate
//! query afterwards. A value of zero means nothing has been committed yet.

use core::sync::atomic::{AtomicU32, Ordering};

use super::Fatal;
use crate::time::Hertz;

/// Frequency of the executing core, committed once at bring-up
///
/// Each core image has its own instance, usually [`SYSTEM_CORE_CLOCK`].
#[derive(Debug)]
pub struct CoreClock {
    hz: AtomicU32,
}

/// Core clock of this firmware image
pub static SYSTEM_CORE_CLOCK: CoreClock = CoreClock::new();

impl CoreClock {
    /// An uncommitted core clock
    pub const fn new() -> Self {
        CoreClock {
            hz: AtomicU32::new(0),
        }
    }

    /// The committed frequency, or `None` before bring-up
    pub fn get(&self) -> Option<Hertz> {
        match self.hz.load(Ordering::Acquire) {
            0 => None,
            hz => Some(Hertz(hz)),
        }
    }

    /// Has a frequency been committed?
    pub fn is_committed(&self) -> bool {
        self.get().is_some()
    }

    /// Store `freq`. Fails if a frequency has already been stored.
    pub(crate) fn commit(&self, freq: Hertz) -> Result<Committed<'_>, Fatal> {
        debug_assert!(freq.0 != 0);
        self.hz
            .compare_exchange(0, freq.0, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Committed { clock: self })
            .map_err(|_| Fatal::AlreadyInitialized)
    }
}

impl Default for CoreClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a [`CoreClock`] holds a frequency
#[derive(Copy, Clone, Debug)]
pub struct Committed<'a> {
    clock: &'a CoreClock,
}

impl Committed<'_> {
    /// The committed frequency
    pub fn hz(&self) -> Hertz {
        Hertz(self.clock.hz.load(Ordering::Acquire))
    }
}
