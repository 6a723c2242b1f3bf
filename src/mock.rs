//! Register bank doubles for host tests

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::hsem::{Semaphore, RCC_SEMAPHORE, SEMAPHORES};
use crate::rcc::regs::HSEMEN;
use crate::rcc::{
    BusDomain, FlashLatency, Held, PllConfig, PllSource, Prescaler, RccRegisters,
    SysClkSource, SystemTimer,
};

const LOCK: u32 = 1 << 31;

/// HSEM block with the claim semantics of the hardware
pub(crate) struct MockHsem {
    r: [AtomicU32; SEMAPHORES],
}

impl MockHsem {
    pub(crate) fn new() -> Self {
        MockHsem {
            r: Default::default(),
        }
    }
}

impl Semaphore for MockHsem {
    fn write(&self, id: u8, value: u32) {
        let r = &self.r[id as usize];
        if value & LOCK != 0 {
            // Only a free semaphore can be taken
            let _ = r.compare_exchange(0, value, Ordering::AcqRel, Ordering::Acquire);
        } else {
            // Only the owner can free it
            let _ =
                r.compare_exchange(value | LOCK, 0, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    fn read(&self, id: u8) -> u32 {
        self.r[id as usize].load(Ordering::Acquire)
    }
}

/// HSEM block where every semaphore is held by the Cortex-M4 forever
pub(crate) struct StuckHsem {
    claims: AtomicU32,
}

impl StuckHsem {
    pub(crate) fn new() -> Self {
        StuckHsem {
            claims: AtomicU32::new(0),
        }
    }

    /// Number of claim attempts seen
    pub(crate) fn claims(&self) -> u32 {
        self.claims.load(Ordering::Relaxed)
    }
}

impl Semaphore for StuckHsem {
    fn write(&self, _id: u8, value: u32) {
        if value & LOCK != 0 {
            self.claims.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn read(&self, _id: u8) -> u32 {
        LOCK | (0x1 << 8)
    }
}

/// A write to the register bank
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    EnableHsi,
    EnableHse { bypass: bool },
    FlashLatency(u8),
    ConfigurePll1(PllSource),
    EnablePll1,
    Prescaler(Prescaler, u8),
    SysClkSource(SysClkSource),
    SetEnable(BusDomain, u32),
    ClearEnable(BusDomain, u32),
}

/// A write, and whether the RCC semaphore was held when it was made
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Write {
    pub op: Op,
    pub locked: bool,
}

/// RCC register bank that logs every write
///
/// Oscillators, flash latency and the clock switch take effect
/// immediately. Enable register updates are read-modify-writes that yield
/// in the middle, and panic if two of them overlap.
pub(crate) struct MockRcc<'a> {
    hsem: Option<&'a MockHsem>,
    log: Mutex<Vec<Write>>,
    enr: [AtomicU32; 9],
    hsi_on: AtomicBool,
    hse_on: AtomicBool,
    pll_on: AtomicBool,
    osc_stuck: bool,
    pll_stuck: bool,
    switch_stuck: bool,
    flash_ws: AtomicU8,
    sws: AtomicU8,
    in_rmw: AtomicBool,
}

impl<'a> MockRcc<'a> {
    pub(crate) fn new() -> Self {
        MockRcc {
            hsem: None,
            log: Mutex::new(Vec::new()),
            enr: Default::default(),
            hsi_on: AtomicBool::new(true),
            hse_on: AtomicBool::new(false),
            pll_on: AtomicBool::new(false),
            osc_stuck: false,
            pll_stuck: false,
            switch_stuck: false,
            flash_ws: AtomicU8::new(0),
            sws: AtomicU8::new(SysClkSource::Hsi.bits()),
            in_rmw: AtomicBool::new(false),
        }
    }

    /// Record the state of the RCC semaphore of `hsem` with every write
    pub(crate) fn with_hsem(mut self, hsem: &'a MockHsem) -> Self {
        self.hsem = Some(hsem);
        self
    }

    /// PLL1 never reports lock
    pub(crate) fn stuck_pll(mut self) -> Self {
        self.pll_stuck = true;
        self
    }

    /// Neither oscillator ever reports ready
    pub(crate) fn stuck_oscillator(mut self) -> Self {
        self.osc_stuck = true;
        self
    }

    /// SWS never follows SW
    pub(crate) fn stuck_switch(mut self) -> Self {
        self.switch_stuck = true;
        self
    }

    pub(crate) fn writes(&self) -> Vec<Write> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.writes().iter().map(|w| w.op).collect()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn record(&self, op: Op) {
        let locked = self
            .hsem
            .map_or(false, |hsem| hsem.read(RCC_SEMAPHORE) & LOCK != 0);
        self.log.lock().unwrap().push(Write { op, locked });
    }

    fn modify(&self, bus: BusDomain, f: impl FnOnce(u32) -> u32) {
        assert!(
            !self.in_rmw.swap(true, Ordering::SeqCst),
            "overlapping read-modify-write"
        );
        let reg = &self.enr[bus.raw() as usize];
        let value = reg.load(Ordering::SeqCst);
        thread::yield_now();
        reg.store(f(value), Ordering::SeqCst);
        self.in_rmw.store(false, Ordering::SeqCst);
    }
}

impl RccRegisters for MockRcc<'_> {
    fn enable_hsem_clock(&self) {
        self.record(Op::SetEnable(BusDomain::Ahb4, HSEMEN));
        self.modify(BusDomain::Ahb4, |v| v | HSEMEN);
    }

    fn hsi_ready(&self) -> bool {
        !self.osc_stuck && self.hsi_on.load(Ordering::SeqCst)
    }

    fn hse_ready(&self) -> bool {
        !self.osc_stuck && self.hse_on.load(Ordering::SeqCst)
    }

    fn flash_wait_states(&self) -> u8 {
        self.flash_ws.load(Ordering::SeqCst)
    }

    fn pll1_ready(&self) -> bool {
        !self.pll_stuck && self.pll_on.load(Ordering::SeqCst)
    }

    fn sysclk_source(&self) -> Option<SysClkSource> {
        SysClkSource::from_bits(self.sws.load(Ordering::SeqCst))
    }

    fn enabled(&self, bus: BusDomain) -> u32 {
        self.enr[bus.raw() as usize].load(Ordering::SeqCst)
    }

    fn enable_hsi(&self, _: &Held<'_>) {
        self.record(Op::EnableHsi);
        self.hsi_on.store(true, Ordering::SeqCst);
    }

    fn enable_hse(&self, _: &Held<'_>, bypass: bool) {
        self.record(Op::EnableHse { bypass });
        self.hse_on.store(true, Ordering::SeqCst);
    }

    fn set_flash_latency(&self, _: &Held<'_>, latency: FlashLatency) {
        self.record(Op::FlashLatency(latency.wait_states));
        self.flash_ws.store(latency.wait_states, Ordering::SeqCst);
    }

    fn configure_pll1(&self, _: &Held<'_>, source: PllSource, _pll: &PllConfig) {
        self.record(Op::ConfigurePll1(source));
    }

    fn enable_pll1(&self, _: &Held<'_>) {
        self.record(Op::EnablePll1);
        self.pll_on.store(true, Ordering::SeqCst);
    }

    fn set_prescaler(&self, _: &Held<'_>, prescaler: Prescaler, bits: u8) {
        self.record(Op::Prescaler(prescaler, bits));
    }

    fn set_sysclk_source(&self, _: &Held<'_>, source: SysClkSource) {
        self.record(Op::SysClkSource(source));
        if !self.switch_stuck {
            self.sws.store(source.bits(), Ordering::SeqCst);
        }
    }

    fn set_enable(&self, _: &Held<'_>, bus: BusDomain, enr: u32) {
        self.record(Op::SetEnable(bus, enr));
        self.modify(bus, |v| v | enr);
    }

    fn clear_enable(&self, _: &Held<'_>, bus: BusDomain, enr: u32) {
        self.record(Op::ClearEnable(bus, enr));
        self.modify(bus, |v| v & !enr);
    }
}

/// SysTick that remembers its reload value
#[derive(Default)]
pub(crate) struct MockSysTick {
    pub reload: Option<u32>,
    pub starts: u32,
}

impl SystemTimer for MockSysTick {
    fn start_periodic(&mut self, reload: u32) {
        self.reload = Some(reload);
        self.starts += 1;
    }
}
