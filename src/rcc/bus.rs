//! Bus domains and the prescaler tree
//!
//! ```text
//!                     ┌───────┐ hclk  AHB1..AHB4
//! sys_ck ────────────▶│ HPRE  │──┬──────────────────────────▶
//!                     └───────┘  │  ┌─────────┐ pclk1 APB1, APB1_2
//!                                ├─▶│ D2PPRE1 │────────────▶
//!                                │  └─────────┘
//!                                │  ┌─────────┐ pclk2 APB2
//!                                ├─▶│ D2PPRE2 │────────────▶
//!                                │  └─────────┘
//!                                │  ┌─────────┐ pclk3 APB3
//!                                ├─▶│ D1PPRE  │────────────▶
//!                                │  └─────────┘
//!                                │  ┌─────────┐ pclk4 APB4
//!                                └─▶│ D3PPRE  │────────────▶
//!                                   └─────────┘
//! ```

use core::convert::TryFrom;
use core::fmt;

use crate::hsem::CoreId;
use crate::time::Hertz;

/// Raw bus identifiers, as found in subsystem descriptor tables
pub mod id {
    #![allow(missing_docs)]
    pub const AHB1: u32 = 0;
    pub const AHB2: u32 = 1;
    pub const AHB3: u32 = 2;
    pub const AHB4: u32 = 3;
    pub const APB1: u32 = 4;
    pub const APB1_2: u32 = 5;
    pub const APB2: u32 = 6;
    pub const APB3: u32 = 7;
    pub const APB4: u32 = 8;
}

/// A descriptor named a bus this controller does not know
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnsupportedBus(pub u32);

impl fmt::Display for UnsupportedBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported bus {}", self.0)
    }
}

/// One gateable peripheral clock: a bus and the enable bits within that
/// bus's enable register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subsystem {
    /// Raw bus identifier, see [`id`]
    pub bus: u32,
    /// Bit mask within the bus enable register
    pub enr: u32,
}

impl Subsystem {
    /// Descriptor for `enr` on raw bus `bus`
    pub const fn new(bus: u32, enr: u32) -> Self {
        Subsystem { bus, enr }
    }
}

/// Clock distribution branch that has its own peripheral enable register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum BusDomain {
    Ahb1,
    Ahb2,
    Ahb3,
    Ahb4,
    /// APB1, low half (APB1LENR)
    Apb1,
    /// APB1, high half (APB1HENR)
    Apb1_2,
    Apb2,
    Apb3,
    Apb4,
}

impl BusDomain {
    /// Every recognised bus domain
    pub const ALL: [BusDomain; 9] = [
        BusDomain::Ahb1,
        BusDomain::Ahb2,
        BusDomain::Ahb3,
        BusDomain::Ahb4,
        BusDomain::Apb1,
        BusDomain::Apb1_2,
        BusDomain::Apb2,
        BusDomain::Apb3,
        BusDomain::Apb4,
    ];

    /// Raw identifier
    pub const fn raw(self) -> u32 {
        match self {
            BusDomain::Ahb1 => id::AHB1,
            BusDomain::Ahb2 => id::AHB2,
            BusDomain::Ahb3 => id::AHB3,
            BusDomain::Ahb4 => id::AHB4,
            BusDomain::Apb1 => id::APB1,
            BusDomain::Apb1_2 => id::APB1_2,
            BusDomain::Apb2 => id::APB2,
            BusDomain::Apb3 => id::APB3,
            BusDomain::Apb4 => id::APB4,
        }
    }

    /// The prescaler tree node clocking this bus
    pub const fn clock(self) -> BusClock {
        match self {
            BusDomain::Ahb1
            | BusDomain::Ahb2
            | BusDomain::Ahb3
            | BusDomain::Ahb4 => BusClock::Hclk,
            BusDomain::Apb1 | BusDomain::Apb1_2 => BusClock::Pclk1,
            BusDomain::Apb2 => BusClock::Pclk2,
            BusDomain::Apb3 => BusClock::Pclk3,
            BusDomain::Apb4 => BusClock::Pclk4,
        }
    }
}

impl TryFrom<u32> for BusDomain {
    type Error = UnsupportedBus;

    fn try_from(raw: u32) -> Result<Self, UnsupportedBus> {
        BusDomain::ALL
            .iter()
            .copied()
            .find(|bus| bus.raw() == raw)
            .ok_or(UnsupportedBus(raw))
    }
}

/// Node of the prescaler tree
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusClock {
    /// System clock, the root
    SysCk,
    /// AHB/AXI clock
    Hclk,
    /// APB1 (D2 domain)
    Pclk1,
    /// APB2 (D2 domain)
    Pclk2,
    /// APB3 (D1 domain)
    Pclk3,
    /// APB4 (D3 domain)
    Pclk4,
}

impl BusClock {
    /// Parent node and the prescaler between the two. `None` for the root.
    pub const fn parent(self) -> Option<(BusClock, Prescaler)> {
        match self {
            BusClock::SysCk => None,
            BusClock::Hclk => Some((BusClock::SysCk, Prescaler::Hpre)),
            BusClock::Pclk1 => Some((BusClock::Hclk, Prescaler::D2ppre1)),
            BusClock::Pclk2 => Some((BusClock::Hclk, Prescaler::D2ppre2)),
            BusClock::Pclk3 => Some((BusClock::Hclk, Prescaler::D1ppre)),
            BusClock::Pclk4 => Some((BusClock::Hclk, Prescaler::D3ppre)),
        }
    }
}

/// Prescaler register fields
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// D1 core prescaler. Always 1, so that the core clock is sys_ck.
    D1cpre,
    /// AHB prescaler
    Hpre,
    /// APB3 prescaler
    D1ppre,
    /// APB1 prescaler
    D2ppre1,
    /// APB2 prescaler
    D2ppre2,
    /// APB4 prescaler
    D3ppre,
}

/// Legal divisors of the D1CPRE and HPRE fields
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum AhbPrescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 1,
            AhbPrescaler::Div2 => 2,
            AhbPrescaler::Div4 => 4,
            AhbPrescaler::Div8 => 8,
            AhbPrescaler::Div16 => 16,
            AhbPrescaler::Div64 => 64,
            AhbPrescaler::Div128 => 128,
            AhbPrescaler::Div256 => 256,
            AhbPrescaler::Div512 => 512,
        }
    }

    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            AhbPrescaler::Div1 => 0b0000,
            AhbPrescaler::Div2 => 0b1000,
            AhbPrescaler::Div4 => 0b1001,
            AhbPrescaler::Div8 => 0b1010,
            AhbPrescaler::Div16 => 0b1011,
            AhbPrescaler::Div64 => 0b1100,
            AhbPrescaler::Div128 => 0b1101,
            AhbPrescaler::Div256 => 0b1110,
            AhbPrescaler::Div512 => 0b1111,
        }
    }
}

/// Legal divisors of the APB prescaler fields
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum ApbPrescaler {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    /// Division factor
    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }

    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            ApbPrescaler::Div1 => 0b000,
            ApbPrescaler::Div2 => 0b100,
            ApbPrescaler::Div4 => 0b101,
            ApbPrescaler::Div8 => 0b110,
            ApbPrescaler::Div16 => 0b111,
        }
    }
}

/// Divisor selection for every edge of the tree
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Prescalers {
    /// sys_ck to hclk
    pub hpre: AhbPrescaler,
    /// hclk to pclk3
    pub d1ppre: ApbPrescaler,
    /// hclk to pclk1
    pub d2ppre1: ApbPrescaler,
    /// hclk to pclk2
    pub d2ppre2: ApbPrescaler,
    /// hclk to pclk4
    pub d3ppre: ApbPrescaler,
}

impl Prescalers {
    /// Division factor applied by `prescaler`
    pub const fn divisor(&self, prescaler: Prescaler) -> u32 {
        match prescaler {
            Prescaler::D1cpre => 1,
            Prescaler::Hpre => self.hpre.divisor(),
            Prescaler::D1ppre => self.d1ppre.divisor(),
            Prescaler::D2ppre1 => self.d2ppre1.divisor(),
            Prescaler::D2ppre2 => self.d2ppre2.divisor(),
            Prescaler::D3ppre => self.d3ppre.divisor(),
        }
    }

    /// Field encoding of `prescaler`
    pub const fn bits(&self, prescaler: Prescaler) -> u8 {
        match prescaler {
            Prescaler::D1cpre => AhbPrescaler::Div1.bits(),
            Prescaler::Hpre => self.hpre.bits(),
            Prescaler::D1ppre => self.d1ppre.bits(),
            Prescaler::D2ppre1 => self.d2ppre1.bits(),
            Prescaler::D2ppre2 => self.d2ppre2.bits(),
            Prescaler::D3ppre => self.d3ppre.bits(),
        }
    }

    /// The tree as seen from `core`.
    ///
    /// The Cortex-M4 core clock already is hclk, so from its side the
    /// root feeds the AHB buses directly.
    pub const fn for_core(self, core: CoreId) -> Self {
        match core {
            CoreId::Cm7 => self,
            CoreId::Cm4 => Prescalers {
                hpre: AhbPrescaler::Div1,
                ..self
            },
        }
    }

    /// Frequency of `clock` when the root runs at `root`.
    ///
    /// Each step truncates: `rate(child) = rate(parent) / divisor`.
    pub fn rate_of(&self, root: Hertz, clock: BusClock) -> Hertz {
        match clock.parent() {
            None => root,
            Some((parent, prescaler)) => {
                self.rate_of(root, parent) / self.divisor(prescaler)
            }
        }
    }

    /// Frequency of the bus named by a raw identifier
    pub fn bus_rate(&self, root: Hertz, bus: u32) -> Result<Hertz, UnsupportedBus> {
        let bus = BusDomain::try_from(bus)?;
        Ok(self.rate_of(root, bus.clock()))
    }
}
