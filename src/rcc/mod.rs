//! Reset and Clock Control
//!
//! This module brings the RCC unit of the dual-core RM0399 parts from
//! reset to a fixed [`ClockConfig`], reports the frequency of every bus
//! domain, and gates individual peripheral clocks.
//!
//! See Fig 54 "Core and bus clock generation" in Reference Manual
//! RM0399 for the tree being configured.
//!
//! HSI is 64 MHz.
//!
//! # Sharing with the other core
//!
//! The Cortex-M7 and the Cortex-M4 both see the same RCC register bank.
//! Every write made by this module, except the one that turns on the
//! clock of the `HSEM` block itself, happens while semaphore
//! [`RCC_SEMAPHORE`](crate::hsem::RCC_SEMAPHORE) is held. The register
//! bank is owned privately by [`Rcc`] and [`Ccdr`]; write access to it is
//! an [`Exclusive`] handle that only exists while a
//! [`HsemGuard`](crate::hsem::HsemGuard) is alive.
//!
//! Rate queries never touch the register bank. They are computed from the
//! committed core clock and the configured prescalers, so they are
//! lock-free and may be made from interrupt context.
//!
//! # Usage
//!
//! The configuration is a `const` value, checked at compile time:
//!
//! ```rust,ignore
//! const CONFIG: ClockConfig = ClockConfig::new()
//!     .with_hpre(AhbPrescaler::Div2)
//!     .with_d2ppre1(ApbPrescaler::Div2);
//! const _: () = CONFIG.check();
//! ```
//!
//! The Cortex-M7 image runs the full bring-up sequence:
//!
//! ```rust,ignore
//! let dp = pac::Peripherals::take().unwrap();
//! let mut cp = cortex_m::Peripherals::take().unwrap();
//!
//! let rcc = Rcc::new(
//!     RccBlock::new(dp.RCC, dp.FLASH),
//!     dp.HSEM,
//!     CoreId::Cm7,
//!     &CONFIG,
//!     &SYSTEM_CORE_CLOCK,
//! );
//! let ccdr = rcc.initialize(&mut cp.SYST).unwrap();
//!
//! assert_eq!(ccdr.sys_ck().0, 400_000_000);
//! ```
//!
//! The Cortex-M4 image uses the same configuration and `CoreId::Cm4`. It
//! does not program the tree; it only records its own core clock (hclk)
//! and starts its SysTick.
//!
//! # Peripherals
//!
//! Peripherals are named by a [`Subsystem`]: a raw bus identifier (see
//! [`bus::id`]) and the bits of that bus's enable register.
//!
//! ```rust,ignore
//! const USART2: Subsystem = Subsystem::new(bus::id::APB1, 1 << 17);
//!
//! ccdr.clock_on(&USART2)?;
//! let pclk1 = ccdr.get_rate(&USART2)?;
//! ccdr.clock_off(&USART2)?;
//! ```

use core::fmt;

use crate::hsem::{CoreId, HardwareLock, LockTimeout, Semaphore, DEFAULT_RETRY, RCC_SEMAPHORE};
use crate::time::Hertz;

pub mod bus;
mod bringup;
mod config;
mod core_clock;
mod gate;
mod pll;
pub(crate) mod regs;

pub use bringup::Stage;
pub use bus::{
    AhbPrescaler, ApbPrescaler, BusClock, BusDomain, Prescaler, Prescalers, Subsystem,
    UnsupportedBus,
};
pub use config::{ClockConfig, FlashLatency, Oscillator, VoltageScale, HSI};
pub use core_clock::{Committed, CoreClock, SYSTEM_CORE_CLOCK};
pub use pll::{PllConfig, PllInputRange, PllSource, VcoRange};
pub use regs::{Exclusive, Held, RccRegisters, SysClkSource, SystemTimer};

/// Unrecoverable bring-up failure
///
/// The clock tree may be left partially configured.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fatal {
    /// The RCC semaphore could not be claimed
    LockTimeout,
    /// The hardware did not confirm the given stage within the poll limit
    HardwareNotReady(Stage),
    /// A core clock frequency was already committed
    AlreadyInitialized,
}

impl From<LockTimeout> for Fatal {
    fn from(_: LockTimeout) -> Self {
        Fatal::LockTimeout
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::LockTimeout => f.write_str("RCC semaphore not acquired"),
            Fatal::HardwareNotReady(stage) => {
                write!(f, "hardware not ready in stage {}", stage)
            }
            Fatal::AlreadyInitialized => f.write_str("clock tree already initialized"),
        }
    }
}

/// Uncommitted RCC
///
/// Holds the register bank, the RCC semaphore and the configuration until
/// [`initialize`](Rcc::initialize) is called.
pub struct Rcc<'a, R, S: Semaphore> {
    regs: R,
    lock: HardwareLock<S>,
    config: &'a ClockConfig,
    core_clock: &'a CoreClock,
    poll_limit: Option<u32>,
    lock_retries: u32,
}

impl<'a, R, S> Rcc<'a, R, S>
where
    R: RccRegisters,
    S: Semaphore,
{
    /// Take ownership of the register bank and of the semaphore block.
    ///
    /// `core` is the core this code runs on. `core_clock` receives the
    /// frequency of that core at the end of bring-up.
    pub fn new(
        regs: R,
        sem: S,
        core: CoreId,
        config: &'a ClockConfig,
        core_clock: &'a CoreClock,
    ) -> Self {
        Rcc {
            regs,
            lock: HardwareLock::new(sem, RCC_SEMAPHORE, core),
            config,
            core_clock,
            poll_limit: None,
            lock_retries: DEFAULT_RETRY,
        }
    }

    /// Give up on a hardware ready flag after `polls` unsuccessful reads.
    ///
    /// By default ready flags are polled forever.
    pub fn ready_poll_limit(mut self, polls: u32) -> Self {
        self.poll_limit = Some(polls);
        self
    }

    /// Number of extra attempts made to claim the RCC semaphore. Applies to
    /// bring-up and to every gating operation afterwards.
    pub fn lock_retries(mut self, retries: u32) -> Self {
        self.lock_retries = retries;
        self
    }

    /// Run the bring-up sequence and start `timer` at the configured tick
    /// rate.
    ///
    /// On the Cortex-M7 the whole tree is programmed. On the Cortex-M4 the
    /// tree is assumed to be set up by the other core and only the core
    /// clock is committed.
    ///
    /// Fails with [`Fatal::AlreadyInitialized`], before touching any
    /// register, if `core_clock` already holds a frequency.
    ///
    /// # Panics
    ///
    /// If the configuration does not pass [`ClockConfig::check`]. Nothing
    /// has been written or committed at that point.
    pub fn initialize<T>(self, mut timer: T) -> Result<Ccdr<'a, R, S>, Fatal>
    where
        T: SystemTimer,
    {
        self.config.check();

        if self.core_clock.is_committed() {
            error!("rcc: already initialized");
            return Err(Fatal::AlreadyInitialized);
        }

        let core = self.lock.core();
        if core == CoreId::Cm7 {
            bringup::run(
                &self.regs,
                &self.lock,
                self.config,
                self.lock_retries,
                self.poll_limit,
            )?;
        }

        let core_ck = self.config.core_ck(core);
        let reload = self.config.systick_reload(core_ck);
        let committed = self.core_clock.commit(core_ck)?;
        timer.start_periodic(reload);
        debug!("rcc: {:?}", Stage::Committed);

        let ccdr = Ccdr {
            regs: self.regs,
            lock: self.lock,
            config: self.config,
            prescalers: self.config.prescalers().for_core(core),
            core_clock: committed,
            lock_retries: self.lock_retries,
        };
        info!(
            "rcc: {:?} core_ck {} hclk {} pclk1 {}",
            Stage::Ready,
            ccdr.core_clock.hz(),
            ccdr.rate_of(BusDomain::Ahb1),
            ccdr.rate_of(BusDomain::Apb1),
        );
        Ok(ccdr)
    }
}

/// Core Clocks Distribution and Reset (CCDR)
///
/// Returned by [`Rcc::initialize`]. Owns the register bank for the rest of
/// the program and provides peripheral clock gating and bus rate queries.
pub struct Ccdr<'a, R, S: Semaphore> {
    regs: R,
    lock: HardwareLock<S>,
    config: &'a ClockConfig,
    prescalers: Prescalers,
    core_clock: Committed<'a>,
    lock_retries: u32,
}

impl<'a, R, S> Ccdr<'a, R, S>
where
    R: RccRegisters,
    S: Semaphore,
{
    /// Enable the clock of `sub`.
    ///
    /// # Panics
    ///
    /// If the RCC semaphore cannot be claimed.
    pub fn clock_on(&self, sub: &Subsystem) -> Result<(), UnsupportedBus> {
        gate::set_clock(&self.regs, &self.lock, self.lock_retries, sub, true)
    }

    /// Disable the clock of `sub`.
    ///
    /// # Panics
    ///
    /// If the RCC semaphore cannot be claimed.
    pub fn clock_off(&self, sub: &Subsystem) -> Result<(), UnsupportedBus> {
        gate::set_clock(&self.regs, &self.lock, self.lock_retries, sub, false)
    }

    /// Are the clocks of `sub` enabled? Does not take the semaphore.
    pub fn is_enabled(&self, sub: &Subsystem) -> Result<bool, UnsupportedBus> {
        gate::is_enabled(&self.regs, sub)
    }

    /// Frequency of the bus that `sub` sits on
    pub fn get_rate(&self, sub: &Subsystem) -> Result<Hertz, UnsupportedBus> {
        self.prescalers.bus_rate(self.core_clock.hz(), sub.bus)
    }

    /// Frequency of a bus domain
    pub fn rate_of(&self, bus: BusDomain) -> Hertz {
        self.prescalers.rate_of(self.core_clock.hz(), bus.clock())
    }

    /// Frequency of the executing core
    pub fn core_ck(&self) -> Hertz {
        self.core_clock.hz()
    }

    /// System clock, as configured
    pub fn sys_ck(&self) -> Hertz {
        self.config.sys_ck
    }

    /// Configuration the tree was brought up with
    pub fn config(&self) -> &'a ClockConfig {
        self.config
    }

    /// Core this `Ccdr` was initialized on
    pub fn core(&self) -> CoreId {
        self.lock.core()
    }
}
