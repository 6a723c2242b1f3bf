//! Peripheral clock gating

use core::convert::TryFrom;

use super::bus::{BusDomain, Subsystem, UnsupportedBus};
use super::regs::{Exclusive, RccRegisters};
use crate::hsem::{HardwareLock, Semaphore};

/// Set or clear the enable bits of `sub` while holding the RCC semaphore.
///
/// The bus is validated before anything else: an unknown bus touches
/// neither the semaphore nor the register bank.
///
/// # Panics
///
/// If the semaphore cannot be claimed within `retries`.
pub(crate) fn set_clock<R, S>(
    regs: &R,
    lock: &HardwareLock<S>,
    retries: u32,
    sub: &Subsystem,
    enable: bool,
) -> Result<(), UnsupportedBus>
where
    R: RccRegisters,
    S: Semaphore,
{
    let bus = BusDomain::try_from(sub.bus)?;

    let guard = match lock.acquire(retries) {
        Ok(guard) => guard,
        Err(e) => panic!("rcc: gating {:?} {:#x}: {}", bus, sub.enr, e),
    };
    let bank = Exclusive::new(regs, &guard);

    if enable {
        bank.set_enable(bus, sub.enr);
    } else {
        bank.clear_enable(bus, sub.enr);
    }
    trace!("rcc: {:?} {:#x} {}", bus, sub.enr, if enable { "on" } else { "off" });

    Ok(())
}

/// Are all of the enable bits of `sub` set? Lock-free.
pub(crate) fn is_enabled<R: RccRegisters>(
    regs: &R,
    sub: &Subsystem,
) -> Result<bool, UnsupportedBus> {
    let bus = BusDomain::try_from(sub.bus)?;
    Ok(regs.enabled(bus) & sub.enr == sub.enr)
}
