//! Hardware Semaphore (HSEM)
//!
//! The RCC register bank is a single physical resource reachable from both
//! the Cortex-M7 and the Cortex-M4. A software mutex on one core cannot
//! exclude the other, so exclusion is taken from one of the 32 semaphores
//! of the `HSEM` block.
//!
//! A semaphore is claimed with the two-step procedure of RM0399 Section
//! 11.3.5: write `LOCK | COREID | PROCID` to the `Rx` register, then read
//! it back. The claim succeeded if and only if the value read back is the
//! value written. Writing `COREID | PROCID` with `LOCK` clear releases it.
//!
//! ```text
//!  31   30        12 11     8 7       0
//! ┌────┬────────────┬────────┬─────────┐
//! │LOCK│  reserved  │ COREID │ PROCID  │  HSEM_Rx
//! └────┴────────────┴────────┴─────────┘
//! ```
//!
//! Within one core the same `COREID | PROCID` pair would read back as
//! owned a second time, so [`HardwareLock`] additionally tracks whether it
//! is already held locally. Two logical owners on one core must share the
//! same [`HardwareLock`].

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

/// Semaphore reserved for the RCC register bank
pub const RCC_SEMAPHORE: u8 = 3;

/// Number of extra claim attempts made before giving up
pub const DEFAULT_RETRY: u32 = 0xF_FFFF;

/// Number of semaphores in the block
pub const SEMAPHORES: usize = 32;

const LOCK: u32 = 1 << 31;
const COREID_SHIFT: u32 = 8;

/// Identity of the executing core, as seen by the HSEM block
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreId {
    /// Cortex-M7, the core that brings the clock tree up
    Cm7,
    /// Cortex-M4
    Cm4,
}

impl CoreId {
    /// The core this firmware image was built for
    #[cfg(feature = "cm7")]
    pub const CURRENT: CoreId = CoreId::Cm7;
    /// The core this firmware image was built for
    #[cfg(feature = "cm4")]
    pub const CURRENT: CoreId = CoreId::Cm4;

    /// `COREID` field value
    pub const fn bits(self) -> u32 {
        match self {
            CoreId::Cm7 => 0x3,
            CoreId::Cm4 => 0x1,
        }
    }
}

/// Access to the `Rx` registers of a semaphore block
pub trait Semaphore {
    /// Write the `Rx` register of semaphore `id`
    fn write(&self, id: u8, value: u32);

    /// Read the `Rx` register of semaphore `id`
    fn read(&self, id: u8) -> u32;
}

impl<S: Semaphore + ?Sized> Semaphore for &S {
    fn write(&self, id: u8, value: u32) {
        (**self).write(id, value)
    }

    fn read(&self, id: u8) -> u32 {
        (**self).read(id)
    }
}

/// The semaphore could not be claimed within the retry bound
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockTimeout {
    /// Semaphore that could not be claimed
    pub semaphore: u8,
    /// Value of the `Rx` register at the last attempt
    pub owner: u32,
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hardware semaphore {} still held (R = {:#010x})",
            self.semaphore, self.owner
        )
    }
}

/// A blocking lock on one hardware semaphore
pub struct HardwareLock<S> {
    sem: S,
    id: u8,
    core: CoreId,
    process: u8,
    held: AtomicBool,
}

impl<S: Semaphore> HardwareLock<S> {
    /// Lock on semaphore `id`, claimed on behalf of `core`
    ///
    /// # Panics
    ///
    /// If `id` is not one of the 32 semaphores of the block.
    pub const fn new(sem: S, id: u8, core: CoreId) -> Self {
        if id as usize >= SEMAPHORES {
            ::core::panic!("HSEM has 32 semaphores");
        }
        HardwareLock {
            sem,
            id,
            core,
            process: 0,
            held: AtomicBool::new(false),
        }
    }

    /// Use `process` as the `PROCID` of every claim
    pub fn with_process(mut self, process: u8) -> Self {
        self.process = process;
        self
    }

    /// Semaphore index
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Core on whose behalf claims are made
    pub fn core(&self) -> CoreId {
        self.core
    }

    fn token(&self) -> u32 {
        (self.core.bits() << COREID_SHIFT) | self.process as u32
    }

    /// Single claim-and-verify attempt
    ///
    /// Returns `Err` with the observed `Rx` value if another owner holds the
    /// semaphore.
    fn try_claim(&self) -> Result<(), u32> {
        if self
            .held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(self.sem.read(self.id));
        }

        let claim = LOCK | self.token();
        self.sem.write(self.id, claim);
        let readback = self.sem.read(self.id);
        if readback == claim {
            Ok(())
        } else {
            self.held.store(false, Ordering::Release);
            Err(readback)
        }
    }

    /// Claim the semaphore, making at most `max_retries` further attempts
    /// after the first one fails.
    ///
    /// The returned guard releases the semaphore when dropped.
    pub fn acquire(&self, max_retries: u32) -> Result<HsemGuard<'_, S>, LockTimeout> {
        let mut retries = 0;
        loop {
            match self.try_claim() {
                Ok(()) => {
                    trace!("hsem: {} claimed after {} retries", self.id, retries);
                    return Ok(HsemGuard {
                        lock: self,
                        _not_send: PhantomData,
                    });
                }
                Err(owner) if retries >= max_retries => {
                    error!("hsem: {} not claimed, owner {:#x}", self.id, owner);
                    return Err(LockTimeout {
                        semaphore: self.id,
                        owner,
                    });
                }
                Err(_) => {
                    retries += 1;
                    core::hint::spin_loop();
                }
            }
        }
    }

    fn release(&self) {
        self.sem.write(self.id, self.token());
        self.held.store(false, Ordering::Release);
        trace!("hsem: {} released", self.id);
    }
}

/// Proof of ownership of a hardware semaphore
///
/// Not `Send`: the claim belongs to the core that made it.
pub struct HsemGuard<'l, S: Semaphore> {
    lock: &'l HardwareLock<S>,
    _not_send: PhantomData<*const ()>,
}

impl<S: Semaphore> HsemGuard<'_, S> {
    /// Semaphore index held by this guard
    pub fn id(&self) -> u8 {
        self.lock.id
    }
}

impl<S: Semaphore> Drop for HsemGuard<'_, S> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHsem, StuckHsem};

    #[test]
    /// The claim is visible in the register and cleared on drop
    fn claim_and_release() {
        let hsem = MockHsem::new();
        let lock = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm7);

        {
            let guard = lock.acquire(0).unwrap();
            assert_eq!(guard.id(), RCC_SEMAPHORE);
            assert_eq!(hsem.read(RCC_SEMAPHORE), LOCK | (0x3 << 8));
        }
        assert_eq!(hsem.read(RCC_SEMAPHORE), 0);
    }

    #[test]
    /// The other core cannot claim while the semaphore is held
    fn cores_exclude_each_other() {
        let hsem = MockHsem::new();
        let cm7 = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm7);
        let cm4 = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm4);

        let guard = cm7.acquire(0).unwrap();
        let err = cm4.acquire(16).err().unwrap();
        assert_eq!(err.semaphore, RCC_SEMAPHORE);
        assert_eq!(err.owner, LOCK | (0x3 << 8));

        drop(guard);
        assert!(cm4.acquire(0).is_ok());
    }

    #[test]
    /// A second logical owner on the same core is refused
    fn single_owner_within_core() {
        let hsem = MockHsem::new();
        let lock = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm7);

        let _guard = lock.acquire(0).unwrap();
        assert!(lock.acquire(4).is_err());
    }

    #[test]
    /// Every attempt is counted against the bound
    fn bounded_retries() {
        let hsem = StuckHsem::new();
        let lock = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm7);

        assert!(lock.acquire(9).is_err());
        assert_eq!(hsem.claims(), 10);
    }

    #[test]
    fn process_id_is_part_of_the_claim() {
        let hsem = MockHsem::new();
        let lock =
            HardwareLock::new(&hsem, 7, CoreId::Cm4).with_process(0x2a);

        let _guard = lock.acquire(0).unwrap();
        assert_eq!(hsem.read(7), LOCK | (0x1 << 8) | 0x2a);
    }

    #[test]
    #[should_panic(expected = "HSEM has 32 semaphores")]
    fn semaphore_id_out_of_range() {
        let hsem = MockHsem::new();
        let _ = HardwareLock::new(&hsem, 32, CoreId::Cm7);
    }
}
