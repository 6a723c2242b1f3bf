//! Register bank contract
//!
//! [`RccRegisters`] is implemented once for the real peripheral (see
//! `device`) and by test doubles. The implementations perform raw register
//! accesses; the rest of this crate only reaches the mutating half through
//! [`Exclusive`], which cannot outlive a claim of the RCC hardware
//! semaphore.

use core::marker::PhantomData;
use core::ops::Deref;

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;

use super::bus::{BusDomain, Prescaler};
use super::config::FlashLatency;
use super::pll::{PllConfig, PllSource};
use crate::hsem::{HsemGuard, Semaphore};

/// System clock switch (SW / SWS)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum SysClkSource {
    Hsi,
    Csi,
    Hse,
    Pll1,
}

impl SysClkSource {
    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            SysClkSource::Hsi => 0b000,
            SysClkSource::Csi => 0b001,
            SysClkSource::Hse => 0b010,
            SysClkSource::Pll1 => 0b011,
        }
    }

    /// Decode a SWS field
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(SysClkSource::Hsi),
            0b001 => Some(SysClkSource::Csi),
            0b010 => Some(SysClkSource::Hse),
            0b011 => Some(SysClkSource::Pll1),
            _ => None,
        }
    }
}

/// HSEMEN in AHB4ENR
pub(crate) const HSEMEN: u32 = 1 << 25;

/// Proof that the RCC semaphore is held
///
/// Only [`Exclusive`] creates one, so implementations of the write half of
/// [`RccRegisters`] are unreachable without the semaphore.
///
/// ```compile_fail
/// use stm32h7xx_rcc::rcc::Held;
///
/// let held = Held { _guard: core::marker::PhantomData };
/// ```
pub struct Held<'g> {
    _guard: PhantomData<&'g ()>,
}

/// Operations on the RCC register bank and the flash access control
/// register.
///
/// Every method is a single register access or a read-modify-write of one
/// register. Status reads are free. Writes take a [`Held`], except for
/// [`enable_hsem_clock`](RccRegisters::enable_hsem_clock) which has to
/// happen before the semaphore block can be used.
pub trait RccRegisters {
    /// Set HSEMEN in AHB4ENR
    fn enable_hsem_clock(&self);

    /// HSIRDY
    fn hsi_ready(&self) -> bool;
    /// HSERDY
    fn hse_ready(&self) -> bool;
    /// LATENCY as currently seen by the flash interface
    fn flash_wait_states(&self) -> u8;
    /// PLL1RDY
    fn pll1_ready(&self) -> bool;
    /// Read SWS
    fn sysclk_source(&self) -> Option<SysClkSource>;
    /// Current content of the enable register of `bus`
    fn enabled(&self, bus: BusDomain) -> u32;

    /// Turn on the HSI (HSION)
    fn enable_hsi(&self, held: &Held<'_>);
    /// Select HSE bypass (HSEBYP) then turn on the HSE (HSEON)
    fn enable_hse(&self, held: &Held<'_>, bypass: bool);
    /// Program the flash LATENCY and WRHIGHFREQ fields
    fn set_flash_latency(&self, held: &Held<'_>, latency: FlashLatency);
    /// Program PLLSRC, DIVM1, PLL1RGE, PLL1VCOSEL, the DIVx1 factors, and
    /// the P/Q/R output enables, with fractional mode off
    fn configure_pll1(&self, held: &Held<'_>, source: PllSource, pll: &PllConfig);
    /// PLL1ON
    fn enable_pll1(&self, held: &Held<'_>);
    /// Program one prescaler field with its encoded value
    fn set_prescaler(&self, held: &Held<'_>, prescaler: Prescaler, bits: u8);
    /// Program SW
    fn set_sysclk_source(&self, held: &Held<'_>, source: SysClkSource);
    /// Set `enr` in the enable register of `bus`
    fn set_enable(&self, held: &Held<'_>, bus: BusDomain, enr: u32);
    /// Clear `enr` in the enable register of `bus`
    fn clear_enable(&self, held: &Held<'_>, bus: BusDomain, enr: u32);
}

impl<R: RccRegisters + ?Sized> RccRegisters for &R {
    fn enable_hsem_clock(&self) {
        (**self).enable_hsem_clock()
    }
    fn hsi_ready(&self) -> bool {
        (**self).hsi_ready()
    }
    fn hse_ready(&self) -> bool {
        (**self).hse_ready()
    }
    fn flash_wait_states(&self) -> u8 {
        (**self).flash_wait_states()
    }
    fn pll1_ready(&self) -> bool {
        (**self).pll1_ready()
    }
    fn sysclk_source(&self) -> Option<SysClkSource> {
        (**self).sysclk_source()
    }
    fn enabled(&self, bus: BusDomain) -> u32 {
        (**self).enabled(bus)
    }
    fn enable_hsi(&self, held: &Held<'_>) {
        (**self).enable_hsi(held)
    }
    fn enable_hse(&self, held: &Held<'_>, bypass: bool) {
        (**self).enable_hse(held, bypass)
    }
    fn set_flash_latency(&self, held: &Held<'_>, latency: FlashLatency) {
        (**self).set_flash_latency(held, latency)
    }
    fn configure_pll1(&self, held: &Held<'_>, source: PllSource, pll: &PllConfig) {
        (**self).configure_pll1(held, source, pll)
    }
    fn enable_pll1(&self, held: &Held<'_>) {
        (**self).enable_pll1(held)
    }
    fn set_prescaler(&self, held: &Held<'_>, prescaler: Prescaler, bits: u8) {
        (**self).set_prescaler(held, prescaler, bits)
    }
    fn set_sysclk_source(&self, held: &Held<'_>, source: SysClkSource) {
        (**self).set_sysclk_source(held, source)
    }
    fn set_enable(&self, held: &Held<'_>, bus: BusDomain, enr: u32) {
        (**self).set_enable(held, bus, enr)
    }
    fn clear_enable(&self, held: &Held<'_>, bus: BusDomain, enr: u32) {
        (**self).clear_enable(held, bus, enr)
    }
}

/// Write access to the register bank, tied to a held RCC semaphore
///
/// The only constructor borrows an [`HsemGuard`], so the semaphore cannot
/// be released while this handle exists. Status reads go through `Deref`.
pub struct Exclusive<'g, R> {
    regs: &'g R,
    held: Held<'g>,
}

impl<'g, R: RccRegisters> Exclusive<'g, R> {
    pub(crate) fn new<'l, S: Semaphore>(regs: &'g R, _guard: &'g HsemGuard<'l, S>) -> Self {
        Exclusive {
            regs,
            held: Held {
                _guard: PhantomData,
            },
        }
    }

    /// Turn on the HSI
    pub fn enable_hsi(&self) {
        self.regs.enable_hsi(&self.held)
    }

    /// Turn on the HSE, bypassed or not
    pub fn enable_hse(&self, bypass: bool) {
        self.regs.enable_hse(&self.held, bypass)
    }

    /// Program the flash wait states
    pub fn set_flash_latency(&self, latency: FlashLatency) {
        self.regs.set_flash_latency(&self.held, latency)
    }

    /// Program PLL1 from `source`
    pub fn configure_pll1(&self, source: PllSource, pll: &PllConfig) {
        self.regs.configure_pll1(&self.held, source, pll)
    }

    /// Turn on PLL1
    pub fn enable_pll1(&self) {
        self.regs.enable_pll1(&self.held)
    }

    /// Program one prescaler field
    pub fn set_prescaler(&self, prescaler: Prescaler, bits: u8) {
        self.regs.set_prescaler(&self.held, prescaler, bits)
    }

    /// Switch sys_ck to `source`
    pub fn set_sysclk_source(&self, source: SysClkSource) {
        self.regs.set_sysclk_source(&self.held, source)
    }

    /// Set enable bits
    pub fn set_enable(&self, bus: BusDomain, enr: u32) {
        self.regs.set_enable(&self.held, bus, enr)
    }

    /// Clear enable bits
    pub fn clear_enable(&self, bus: BusDomain, enr: u32) {
        self.regs.clear_enable(&self.held, bus, enr)
    }
}

impl<R> Deref for Exclusive<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.regs
    }
}

/// Periodic system timer
pub trait SystemTimer {
    /// Count core clock cycles, interrupt every `reload + 1` of them
    fn start_periodic(&mut self, reload: u32);
}

impl SystemTimer for SYST {
    fn start_periodic(&mut self, reload: u32) {
        self.disable_counter();
        self.set_clock_source(SystClkSource::Core);
        self.set_reload(reload);
        self.clear_current();
        self.enable_interrupt();
        self.enable_counter();
    }
}

impl<T: SystemTimer + ?Sized> SystemTimer for &mut T {
    fn start_periodic(&mut self, reload: u32) {
        (**self).start_periodic(reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsem::{CoreId, HardwareLock, RCC_SEMAPHORE};
    use crate::mock::{MockHsem, MockRcc, Op, Write};

    #[test]
    /// Writes through the handle land while the semaphore is held; the
    /// semaphore clock is the one write made without it
    fn only_the_handle_writes_under_the_lock() {
        let hsem = MockHsem::new();
        let rcc = MockRcc::new().with_hsem(&hsem);
        let lock = HardwareLock::new(&hsem, RCC_SEMAPHORE, CoreId::Cm7);

        rcc.enable_hsem_clock();
        {
            let guard = lock.acquire(0).unwrap();
            let bank = Exclusive::new(&rcc, &guard);
            bank.set_enable(BusDomain::Apb2, 1 << 4);
            assert_eq!(bank.enabled(BusDomain::Apb2), 1 << 4);
            bank.clear_enable(BusDomain::Apb2, 1 << 4);
        }

        assert_eq!(
            rcc.writes(),
            [
                Write {
                    op: Op::SetEnable(BusDomain::Ahb4, HSEMEN),
                    locked: false
                },
                Write {
                    op: Op::SetEnable(BusDomain::Apb2, 1 << 4),
                    locked: true
                },
                Write {
                    op: Op::ClearEnable(BusDomain::Apb2, 1 << 4),
                    locked: true
                },
            ]
        );
        assert_eq!(rcc.enabled(BusDomain::Apb2), 0);
    }
}
