//! Register bank and semaphore block of the selected device

use crate::hsem::Semaphore;
use crate::pac::{FLASH, HSEM, RCC};
use crate::rcc::{
    BusDomain, FlashLatency, Held, PllConfig, PllSource, Prescaler, RccRegisters,
    SysClkSource,
};

/// The RCC register block, together with the flash interface whose wait
/// states have to follow the AXI clock
pub struct RccBlock {
    rcc: RCC,
    flash: FLASH,
}

impl RccBlock {
    /// Take ownership of both register blocks
    pub fn new(rcc: RCC, flash: FLASH) -> Self {
        RccBlock { rcc, flash }
    }

    /// Release the register blocks
    pub fn free(self) -> (RCC, FLASH) {
        (self.rcc, self.flash)
    }
}

// Runs `$body` with `$enr` bound to the enable register of `$bus`.
//
// This macro uses the paste::item! macro to create identifiers.
macro_rules! with_enr {
    ($rcc:expr, $bus:expr, |$enr:ident| $body:expr, [$($Bus:ident: $AXBn:ident),+]) => {
        paste::item! {
            match $bus {
                $(
                    BusDomain::$Bus => {
                        let $enr = &$rcc.[< $AXBn:lower enr >];
                        $body
                    }
                )+
            }
        }
    };
    ($rcc:expr, $bus:expr, |$enr:ident| $body:expr) => {
        with_enr!($rcc, $bus, |$enr| $body, [
            Ahb1: AHB1, Ahb2: AHB2, Ahb3: AHB3, Ahb4: AHB4,
            Apb1: APB1L, Apb1_2: APB1H, Apb2: APB2, Apb3: APB3, Apb4: APB4
        ])
    };
}

impl RccRegisters for RccBlock {
    fn enable_hsem_clock(&self) {
        self.rcc.ahb4enr.modify(|_, w| w.hsemen().enabled());
    }

    fn hsi_ready(&self) -> bool {
        self.rcc.cr.read().hsirdy().is_ready()
    }

    fn hse_ready(&self) -> bool {
        self.rcc.cr.read().hserdy().is_ready()
    }

    fn flash_wait_states(&self) -> u8 {
        self.flash.acr.read().latency().bits()
    }

    fn pll1_ready(&self) -> bool {
        self.rcc.cr.read().pll1rdy().is_ready()
    }

    fn sysclk_source(&self) -> Option<SysClkSource> {
        SysClkSource::from_bits(self.rcc.cfgr.read().sws().bits())
    }

    fn enabled(&self, bus: BusDomain) -> u32 {
        with_enr!(self.rcc, bus, |reg| reg.read().bits())
    }

    fn enable_hsi(&self, _: &Held<'_>) {
        self.rcc.cr.modify(|_, w| w.hsion().on());
    }

    fn enable_hse(&self, _: &Held<'_>, bypass: bool) {
        // HSEBYP can only be written while the HSE is off
        if bypass {
            self.rcc.cr.modify(|_, w| w.hsebyp().bypassed());
        } else {
            self.rcc.cr.modify(|_, w| w.hsebyp().not_bypassed());
        }
        self.rcc.cr.modify(|_, w| w.hseon().on());
    }

    fn set_flash_latency(&self, _: &Held<'_>, latency: FlashLatency) {
        self.flash.acr.write(|w| unsafe {
            w.wrhighfreq()
                .bits(latency.programming_delay)
                .latency()
                .bits(latency.wait_states)
        });
    }

    fn configure_pll1(&self, _: &Held<'_>, source: PllSource, pll: &PllConfig) {
        self.rcc.pllckselr.modify(|_, w| {
            w.pllsrc().bits(source.bits()).divm1().bits(pll.divm_bits())
        });
        self.rcc.pllcfgr.modify(|_, w| {
            w.pll1rge()
                .bits(pll.input_range.bits())
                .pll1vcosel()
                .bit(pll.vco_range.bits() != 0)
                .pll1fracen()
                .reset()
                .divp1en()
                .enabled()
                .divq1en()
                .enabled()
                .divr1en()
                .enabled()
        });
        self.rcc.pll1divr.write(|w| unsafe {
            w.divn1()
                .bits(pll.divn_bits())
                .divp1()
                .bits(pll.divp_bits())
                .divq1()
                .bits(pll.divq_bits())
                .divr1()
                .bits(pll.divr_bits())
        });
    }

    fn enable_pll1(&self, _: &Held<'_>) {
        self.rcc.cr.modify(|_, w| w.pll1on().on());
    }

    fn set_prescaler(&self, _: &Held<'_>, prescaler: Prescaler, bits: u8) {
        let rcc = &self.rcc;
        match prescaler {
            Prescaler::D1cpre => {
                rcc.d1cfgr.modify(|_, w| unsafe { w.d1cpre().bits(bits) })
            }
            Prescaler::Hpre => {
                rcc.d1cfgr.modify(|_, w| unsafe { w.hpre().bits(bits) })
            }
            Prescaler::D1ppre => {
                rcc.d1cfgr.modify(|_, w| unsafe { w.d1ppre().bits(bits) })
            }
            Prescaler::D2ppre1 => {
                rcc.d2cfgr.modify(|_, w| unsafe { w.d2ppre1().bits(bits) })
            }
            Prescaler::D2ppre2 => {
                rcc.d2cfgr.modify(|_, w| unsafe { w.d2ppre2().bits(bits) })
            }
            Prescaler::D3ppre => {
                rcc.d3cfgr.modify(|_, w| unsafe { w.d3ppre().bits(bits) })
            }
        }
    }

    fn set_sysclk_source(&self, _: &Held<'_>, source: SysClkSource) {
        self.rcc.cfgr.modify(|_, w| unsafe { w.sw().bits(source.bits()) });
    }

    fn set_enable(&self, _: &Held<'_>, bus: BusDomain, enr: u32) {
        with_enr!(self.rcc, bus, |reg| reg
            .modify(|r, w| unsafe { w.bits(r.bits() | enr) }))
    }

    fn clear_enable(&self, _: &Held<'_>, bus: BusDomain, enr: u32) {
        with_enr!(self.rcc, bus, |reg| reg
            .modify(|r, w| unsafe { w.bits(r.bits() & !enr) }))
    }
}

impl Semaphore for HSEM {
    fn write(&self, id: u8, value: u32) {
        self.r[id as usize].write(|w| unsafe { w.bits(value) });
    }

    fn read(&self, id: u8) -> u32 {
        self.r[id as usize].read().bits()
    }
}
