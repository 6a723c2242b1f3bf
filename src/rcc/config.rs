//! Build-time clock configuration
//!
//! A [`ClockConfig`] is a `const` value. Call [`ClockConfig::check`] in a
//! `const` item so that an unachievable configuration fails the build:
//!
//! ```rust
//! use stm32h7xx_rcc::rcc::{ApbPrescaler, ClockConfig};
//!
//! const CONFIG: ClockConfig = ClockConfig::new().with_d2ppre1(ApbPrescaler::Div4);
//! const _: () = CONFIG.check();
//! ```

use super::bus::{AhbPrescaler, ApbPrescaler, Prescalers};
use super::pll::{PllConfig, PllInputRange, PllSource, VcoRange};
use crate::hsem::CoreId;
use crate::time::Hertz;

/// HSI frequency, with HSIDIV = 1
pub const HSI: u32 = 64_000_000; // Hz

const SYS_CK_MAX: u32 = 480_000_000;
const HCLK_MAX: u32 = 240_000_000;
const PCLK_MAX: u32 = 120_000_000;
const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

/// Oscillator feeding the PLL
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Internal 64MHz RC oscillator
    Hsi,
    /// External crystal or clock
    Hse {
        /// Oscillator frequency
        freq: Hertz,
        /// `true` for an external clock signal driving OSC_IN directly
        bypass: bool,
    },
}

impl Oscillator {
    /// Output frequency
    pub const fn freq(self) -> u32 {
        match self {
            Oscillator::Hsi => HSI,
            Oscillator::Hse { freq, .. } => freq.0,
        }
    }

    /// Matching PLLSRC selection
    pub const fn pll_source(self) -> PllSource {
        match self {
            Oscillator::Hsi => PllSource::Hsi,
            Oscillator::Hse { .. } => PllSource::Hse,
        }
    }
}

/// Core voltage scale, which limits the flash access frequency
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum VoltageScale {
    Scale0,
    Scale1,
    Scale2,
    Scale3,
}

/// Flash wait states and programming delay
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLatency {
    /// LATENCY field
    pub wait_states: u8,
    /// WRHIGHFREQ field
    pub programming_delay: u8,
}

impl FlashLatency {
    /// See RM0433 Table 13. FLASH recommended number of wait
    /// states and programming delay
    pub const fn for_aclk(rcc_aclk: u32, vos: VoltageScale) -> Self {
        let rcc_aclk_mhz = rcc_aclk / 1_000_000;

        let (wait_states, programming_delay) = match vos {
            // VOS 1 range VCORE 1.15V - 1.26V
            VoltageScale::Scale0 | VoltageScale::Scale1 => match rcc_aclk_mhz {
                0..=69 => (0, 0),
                70..=139 => (1, 1),
                140..=184 => (2, 1),
                185..=209 => (2, 2),
                210..=224 => (3, 2),
                _ => (7, 3),
            },
            // VOS 2 range VCORE 1.05V - 1.15V
            VoltageScale::Scale2 => match rcc_aclk_mhz {
                0..=54 => (0, 0),
                55..=109 => (1, 1),
                110..=164 => (2, 1),
                165..=224 => (3, 2),
                225 => (4, 2),
                _ => (7, 3),
            },
            // VOS 3 range VCORE 0.95V - 1.05V
            VoltageScale::Scale3 => match rcc_aclk_mhz {
                0..=44 => (0, 0),
                45..=89 => (1, 1),
                90..=134 => (2, 1),
                135..=179 => (3, 2),
                180..=224 => (4, 2),
                _ => (7, 3),
            },
        };

        FlashLatency {
            wait_states,
            programming_delay,
        }
    }
}

/// Configuration of the core clocks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// PLL input oscillator
    pub oscillator: Oscillator,
    /// PLL1 factors
    pub pll1: PllConfig,
    /// AHB prescaler
    pub hpre: AhbPrescaler,
    /// APB3 prescaler
    pub d1ppre: ApbPrescaler,
    /// APB1 prescaler
    pub d2ppre1: ApbPrescaler,
    /// APB2 prescaler
    pub d2ppre2: ApbPrescaler,
    /// APB4 prescaler
    pub d3ppre: ApbPrescaler,
    /// Core voltage scale, for the flash latency table
    pub vos: VoltageScale,
    /// Target system clock, pll1_p_ck
    pub sys_ck: Hertz,
    /// SysTick interrupt rate
    pub tick_hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockConfig {
    /// 25MHz crystal, sys_ck 400MHz, hclk 200MHz, every pclk 100MHz,
    /// 1ms tick
    pub const fn new() -> Self {
        ClockConfig {
            oscillator: Oscillator::Hse {
                freq: Hertz(25_000_000),
                bypass: false,
            },
            pll1: PllConfig {
                input_range: PllInputRange::Range4,
                vco_range: VcoRange::Wide,
                m: 5,
                n: 160,
                p: 2,
                q: 4,
                r: 2,
            },
            hpre: AhbPrescaler::Div2,
            d1ppre: ApbPrescaler::Div2,
            d2ppre1: ApbPrescaler::Div2,
            d2ppre2: ApbPrescaler::Div2,
            d3ppre: ApbPrescaler::Div2,
            vos: VoltageScale::Scale1,
            sys_ck: Hertz(400_000_000),
            tick_hz: 1_000,
        }
    }

    /// Set the PLL input oscillator
    pub const fn with_oscillator(mut self, oscillator: Oscillator) -> Self {
        self.oscillator = oscillator;
        self
    }

    /// Set the PLL1 factors
    pub const fn with_pll1(mut self, pll1: PllConfig) -> Self {
        self.pll1 = pll1;
        self
    }

    /// Set the AHB prescaler
    pub const fn with_hpre(mut self, hpre: AhbPrescaler) -> Self {
        self.hpre = hpre;
        self
    }

    /// Set the APB3 prescaler
    pub const fn with_d1ppre(mut self, d1ppre: ApbPrescaler) -> Self {
        self.d1ppre = d1ppre;
        self
    }

    /// Set the APB1 prescaler
    pub const fn with_d2ppre1(mut self, d2ppre1: ApbPrescaler) -> Self {
        self.d2ppre1 = d2ppre1;
        self
    }

    /// Set the APB2 prescaler
    pub const fn with_d2ppre2(mut self, d2ppre2: ApbPrescaler) -> Self {
        self.d2ppre2 = d2ppre2;
        self
    }

    /// Set the APB4 prescaler
    pub const fn with_d3ppre(mut self, d3ppre: ApbPrescaler) -> Self {
        self.d3ppre = d3ppre;
        self
    }

    /// Set the core voltage scale
    pub const fn with_vos(mut self, vos: VoltageScale) -> Self {
        self.vos = vos;
        self
    }

    /// Set the target system clock
    pub const fn with_sys_ck(mut self, sys_ck: Hertz) -> Self {
        self.sys_ck = sys_ck;
        self
    }

    /// Set the SysTick rate
    pub const fn with_tick_hz(mut self, tick_hz: u32) -> Self {
        self.tick_hz = tick_hz;
        self
    }

    /// Prescaler selections of the bus tree
    pub const fn prescalers(&self) -> Prescalers {
        Prescalers {
            hpre: self.hpre,
            d1ppre: self.d1ppre,
            d2ppre1: self.d2ppre1,
            d2ppre2: self.d2ppre2,
            d3ppre: self.d3ppre,
        }
    }

    /// AHB/AXI clock
    pub const fn hclk(&self) -> Hertz {
        Hertz(self.sys_ck.0 / self.hpre.divisor())
    }

    /// Flash latency required at the configured AXI clock
    pub const fn flash_latency(&self) -> FlashLatency {
        FlashLatency::for_aclk(self.hclk().0, self.vos)
    }

    /// Frequency the given core runs at once the tree is up
    pub const fn core_ck(&self, core: CoreId) -> Hertz {
        match core {
            CoreId::Cm7 => self.sys_ck,
            CoreId::Cm4 => self.hclk(),
        }
    }

    /// SysTick reload value for a core running at `core_ck`
    pub const fn systick_reload(&self, core_ck: Hertz) -> u32 {
        core_ck.0 / self.tick_hz - 1
    }

    /// Validate the clock configuration at compile time.
    ///
    /// Panics with a descriptive message if the configuration is invalid.
    /// Use inside `const` items to get compile-time errors.
    pub const fn check(&self) {
        match self.oscillator {
            Oscillator::Hse { freq, bypass } => {
                let (min, max) = if bypass {
                    (1_000_000, 50_000_000)
                } else {
                    (4_000_000, 48_000_000)
                };
                if freq.0 < min || freq.0 > max {
                    ::core::panic!("HSE frequency out of range");
                }
            }
            Oscillator::Hsi => {}
        }

        let pllsrc = self.oscillator.freq();
        self.pll1.check(pllsrc);

        if self.pll1.p_ck(pllsrc).0 != self.sys_ck.0 {
            ::core::panic!("sys_ck does not match the PLL1 P output");
        }
        if self.sys_ck.0 > SYS_CK_MAX {
            ::core::panic!("sys_ck above 480MHz");
        }

        let hclk = self.hclk().0;
        if hclk > HCLK_MAX {
            ::core::panic!("hclk above 240MHz");
        }
        let p = self.prescalers();
        if hclk / p.d1ppre.divisor() > PCLK_MAX
            || hclk / p.d2ppre1.divisor() > PCLK_MAX
            || hclk / p.d2ppre2.divisor() > PCLK_MAX
            || hclk / p.d3ppre.divisor() > PCLK_MAX
        {
            ::core::panic!("pclk above 120MHz");
        }

        if self.tick_hz == 0 {
            ::core::panic!("tick_hz must not be zero");
        }
        if self.tick_hz > self.hclk().0 {
            ::core::panic!("tick_hz above the core clock");
        }
        if self.systick_reload(self.core_ck(CoreId::Cm7)) > SYST_RELOAD_MAX
            || self.systick_reload(self.core_ck(CoreId::Cm4)) > SYST_RELOAD_MAX
        {
            ::core::panic!("SysTick reload does not fit 24 bits");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: ClockConfig = ClockConfig::new();
    const _: () = DEFAULT.check();

    /// HSI 64MHz / 4 = 16MHz, * 32 = 512MHz VCO, / 8 = 64MHz
    const HSI_64MHZ: ClockConfig = ClockConfig::new()
        .with_oscillator(Oscillator::Hsi)
        .with_pll1(PllConfig {
            input_range: PllInputRange::Range8,
            vco_range: VcoRange::Wide,
            m: 4,
            n: 32,
            p: 8,
            q: 8,
            r: 8,
        })
        .with_sys_ck(Hertz(64_000_000))
        .with_d2ppre1(ApbPrescaler::Div4);
    const _: () = HSI_64MHZ.check();

    #[test]
    fn default_tree() {
        assert_eq!(DEFAULT.hclk(), Hertz(200_000_000));
        assert_eq!(DEFAULT.core_ck(CoreId::Cm7), Hertz(400_000_000));
        assert_eq!(DEFAULT.core_ck(CoreId::Cm4), Hertz(200_000_000));
        assert_eq!(DEFAULT.systick_reload(Hertz(400_000_000)), 399_999);
    }

    #[test]
    /// 200MHz AXI at VOS1 needs two wait states
    fn flash_latency_from_table() {
        assert_eq!(
            DEFAULT.flash_latency(),
            FlashLatency {
                wait_states: 2,
                programming_delay: 2
            }
        );
        assert_eq!(HSI_64MHZ.flash_latency().wait_states, 0);
        assert_eq!(
            FlashLatency::for_aclk(240_000_000, VoltageScale::Scale0).wait_states,
            7
        );
    }

    #[test]
    #[should_panic(expected = "sys_ck does not match")]
    fn mismatched_target_rejected() {
        DEFAULT.with_sys_ck(Hertz(480_000_000)).check();
    }

    #[test]
    #[should_panic(expected = "pclk above 120MHz")]
    fn fast_pclk_rejected() {
        DEFAULT.with_d3ppre(ApbPrescaler::Div1).check();
    }

    #[test]
    #[should_panic(expected = "HSE frequency out of range")]
    fn slow_crystal_rejected() {
        DEFAULT
            .with_oscillator(Oscillator::Hse {
                freq: Hertz(2_000_000),
                bypass: false,
            })
            .check();
    }

    #[test]
    #[should_panic(expected = "tick_hz above the core clock")]
    fn fast_tick_rejected() {
        DEFAULT.with_tick_hz(500_000_000).check();
    }

    #[test]
    #[should_panic(expected = "SysTick reload")]
    fn slow_tick_rejected() {
        DEFAULT.with_tick_hz(1).check();
    }
}
