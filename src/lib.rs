//! Reset and Clock Control for dual-core STM32H7 parts
//!
//! The RCC register bank of the RM0399 devices is shared between the
//! Cortex-M7 and the Cortex-M4. Every write to it made by this crate is
//! bracketed by a claim of the RCC hardware semaphore in the `HSEM`
//! block, see [`hsem`].
//!
//! ```rust,ignore
//! use stm32h7xx_rcc::device::RccBlock;
//! use stm32h7xx_rcc::hsem::CoreId;
//! use stm32h7xx_rcc::rcc::{bus, ClockConfig, Rcc, Subsystem, SYSTEM_CORE_CLOCK};
//!
//! const CONFIG: ClockConfig = ClockConfig::new();
//! const _: () = CONFIG.check();
//!
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
//! let usart2 = Subsystem::new(bus::id::APB1, 1 << 17);
//! ccdr.clock_on(&usart2).unwrap();
//! let pclk1 = ccdr.get_rate(&usart2).unwrap();
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("You may not enable both `defmt` and `log` features.");

#[cfg(all(feature = "cm4", feature = "cm7"))]
compile_error!("Select exactly one of the `cm4` and `cm7` core features.");

#[cfg(all(feature = "device-selected", not(feature = "rm0399")))]
compile_error!("Only the dual-core RM0399 parts are supported.");

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod hsem;
pub mod rcc;
pub mod time;

#[cfg(feature = "device-selected")]
pub mod device;

#[cfg(feature = "stm32h747cm7")]
pub use stm32h7::stm32h747cm7 as pac;
#[cfg(feature = "stm32h747cm4")]
pub use stm32h7::stm32h747cm4 as pac;

#[cfg(test)]
pub(crate) mod mock;

/// Commonly used traits
pub mod prelude {
    pub use crate::time::U32Ext as _stm32h7xx_rcc_time_U32Ext;
}
