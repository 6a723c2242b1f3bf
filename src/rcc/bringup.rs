//! One-shot bring-up of the clock tree
//!
//! ```text
//!  Idle ──▶ OscillatorStart ──▶ FlashLatencyConfigured ──▶ PllConfigured
//!                                                              │
//!  Ready ◀── Committed ◀── SourceSwitched ◀── PrescalersProgrammed
//! ```
//!
//! Everything between leaving `Idle` and entering `Committed` happens with
//! the RCC semaphore held. Each step waits for the hardware to confirm it
//! before moving on.

use core::fmt;

use super::bus::Prescaler;
use super::config::{ClockConfig, Oscillator};
use super::regs::{Exclusive, RccRegisters, SysClkSource};
use super::Fatal;
use crate::hsem::{HardwareLock, Semaphore};

/// Prescaler fields, in programming order
const PRESCALERS: [Prescaler; 6] = [
    Prescaler::D1cpre,
    Prescaler::Hpre,
    Prescaler::D1ppre,
    Prescaler::D2ppre1,
    Prescaler::D2ppre2,
    Prescaler::D3ppre,
];

/// Bring-up state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// Reset state. The semaphore block gets its clock here.
    Idle,
    /// Oscillator enabled and ready
    OscillatorStart,
    /// Flash wait states programmed and confirmed
    FlashLatencyConfigured,
    /// PLL1 programmed and locked
    PllConfigured,
    /// Every bus prescaler programmed
    PrescalersProgrammed,
    /// PLL1 drives sys_ck, confirmed by SWS
    SourceSwitched,
    /// Core clock frequency committed
    Committed,
    /// Terminal state
    Ready,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Poll `ready` until it returns true.
///
/// With a `limit`, give up after that many unsuccessful polls and report
/// `stage` as not ready. Without one, spin forever.
fn wait_for<F>(limit: Option<u32>, stage: Stage, mut ready: F) -> Result<(), Fatal>
where
    F: FnMut() -> bool,
{
    let mut polls: u32 = 0;
    while !ready() {
        if let Some(limit) = limit {
            if polls >= limit {
                error!("rcc: {:?} not confirmed after {} polls", stage, polls);
                return Err(Fatal::HardwareNotReady(stage));
            }
            polls += 1;
        }
        core::hint::spin_loop();
    }
    Ok(())
}

/// Hardware part of the sequence, run by the core that owns the tree.
///
/// Returns with the semaphore released, in stage `SourceSwitched`.
pub(crate) fn run<R, S>(
    regs: &R,
    lock: &HardwareLock<S>,
    config: &ClockConfig,
    retries: u32,
    poll_limit: Option<u32>,
) -> Result<(), Fatal>
where
    R: RccRegisters,
    S: Semaphore,
{
    debug!("rcc: {:?}", Stage::Idle);
    // The semaphore block cannot be claimed before it is clocked
    regs.enable_hsem_clock();

    let guard = lock.acquire(retries)?;
    let bank = Exclusive::new(regs, &guard);

    start_oscillator(&bank, config.oscillator, poll_limit)?;
    debug!("rcc: {:?} ({} Hz)", Stage::OscillatorStart, config.oscillator.freq());

    let latency = config.flash_latency();
    bank.set_flash_latency(latency);
    wait_for(poll_limit, Stage::FlashLatencyConfigured, || {
        bank.flash_wait_states() == latency.wait_states
    })?;
    debug!(
        "rcc: {:?} ({} ws, delay {})",
        Stage::FlashLatencyConfigured,
        latency.wait_states,
        latency.programming_delay
    );

    bank.configure_pll1(config.oscillator.pll_source(), &config.pll1);
    bank.enable_pll1();
    wait_for(poll_limit, Stage::PllConfigured, || bank.pll1_ready())?;
    debug!("rcc: {:?}", Stage::PllConfigured);

    let prescalers = config.prescalers();
    for &prescaler in PRESCALERS.iter() {
        bank.set_prescaler(prescaler, prescalers.bits(prescaler));
    }
    debug!("rcc: {:?}", Stage::PrescalersProgrammed);

    bank.set_sysclk_source(SysClkSource::Pll1);
    wait_for(poll_limit, Stage::SourceSwitched, || {
        bank.sysclk_source() == Some(SysClkSource::Pll1)
    })?;
    debug!("rcc: {:?}", Stage::SourceSwitched);

    drop(guard);
    Ok(())
}

fn start_oscillator<R: RccRegisters>(
    bank: &Exclusive<'_, R>,
    oscillator: Oscillator,
    poll_limit: Option<u32>,
) -> Result<(), Fatal> {
    match oscillator {
        Oscillator::Hse { bypass, .. } => {
            bank.enable_hse(bypass);
            wait_for(poll_limit, Stage::OscillatorStart, || bank.hse_ready())
        }
        Oscillator::Hsi => {
            bank.enable_hsi();
            wait_for(poll_limit, Stage::OscillatorStart, || bank.hsi_ready())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_wait_gives_up() {
        let mut polls = 0;
        let res = wait_for(Some(5), Stage::PllConfigured, || {
            polls += 1;
            false
        });
        assert_eq!(res, Err(Fatal::HardwareNotReady(Stage::PllConfigured)));
        assert_eq!(polls, 6);
    }

    #[test]
    fn wait_returns_once_ready() {
        let mut polls = 0;
        let res = wait_for(None, Stage::OscillatorStart, || {
            polls += 1;
            polls == 100
        });
        assert_eq!(res, Ok(()));
        assert_eq!(polls, 100);
    }
}
