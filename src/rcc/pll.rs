//! Phase Locked Loop Configuration
//!
//! ```text
//!             ┌────┐ ref1_ck ┌─────┐ vco1_ck ┌──────┐ pll1_p_ck
//! pllsrc ────▶│ /M │────────▶│ xN  │──┬─────▶│  /P  │──────────▶
//!             └────┘         └─────┘  │      └──────┘
//!                PLL1RGE     PLL1VCOSEL│      ┌──────┐ pll1_q_ck
//!                                     ├─────▶│  /Q  │──────────▶
//!                                     │      └──────┘
//!                                     │      ┌──────┐ pll1_r_ck
//!                                     └─────▶│  /R  │──────────▶
//!                                            └──────┘
//! ```
//!
//! Only integer-N operation is used; the fractional divider stays off.

use crate::time::Hertz;

/// PLL reference clock source (PLLSRC)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    /// High speed internal oscillator
    Hsi,
    /// Low power internal oscillator
    Csi,
    /// High speed external oscillator
    Hse,
}

impl PllSource {
    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            PllSource::Hsi => 0b00,
            PllSource::Csi => 0b01,
            PllSource::Hse => 0b10,
        }
    }
}

/// Frequency range of the reference clock at the phase detector (PLL1RGE)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllInputRange {
    /// 1 to 2 MHz
    Range1,
    /// 2 to 4 MHz
    Range2,
    /// 4 to 8 MHz
    Range4,
    /// 8 to 16 MHz
    Range8,
}

impl PllInputRange {
    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            PllInputRange::Range1 => 0b00,
            PllInputRange::Range2 => 0b01,
            PllInputRange::Range4 => 0b10,
            PllInputRange::Range8 => 0b11,
        }
    }

    /// Whether `ref_ck` lies within this range
    pub const fn contains(self, ref_ck: u32) -> bool {
        let (min, max) = match self {
            PllInputRange::Range1 => (1_000_000, 2_000_000),
            PllInputRange::Range2 => (2_000_000, 4_000_000),
            PllInputRange::Range4 => (4_000_000, 8_000_000),
            PllInputRange::Range8 => (8_000_000, 16_000_000),
        };
        ref_ck >= min && ref_ck <= max
    }
}

/// VCO selection (PLL1VCOSEL)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VcoRange {
    /// VCOH, 192 to 836 MHz
    Wide,
    /// VCOL, 150 to 420 MHz
    Medium,
}

impl VcoRange {
    /// Field encoding
    pub const fn bits(self) -> u8 {
        match self {
            VcoRange::Wide => 0,
            VcoRange::Medium => 1,
        }
    }

    /// Whether `vco_ck` lies within this range
    pub const fn contains(self, vco_ck: u32) -> bool {
        let (min, max) = match self {
            VcoRange::Wide => (192_000_000, 836_000_000),
            VcoRange::Medium => (150_000_000, 420_000_000),
        };
        vco_ck >= min && vco_ck <= max
    }
}

/// Configuration of a Phase Locked Loop (PLL)
///
/// The factors are the division and multiplication ratios themselves,
/// not their register encodings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    /// Reference clock range
    pub input_range: PllInputRange,
    /// VCO selection
    pub vco_range: VcoRange,
    /// Reference divider, 1 to 63
    pub m: u8,
    /// Feedback multiplier, 4 to 512
    pub n: u16,
    /// P output divider, even values 2 to 128
    pub p: u8,
    /// Q output divider, 1 to 128
    pub q: u8,
    /// R output divider, 1 to 128
    pub r: u8,
}

impl PllConfig {
    /// Reference clock at the phase detector
    pub const fn ref_ck(&self, pllsrc: u32) -> u32 {
        pllsrc / self.m as u32
    }

    /// VCO output frequency
    pub const fn vco_ck(&self, pllsrc: u32) -> u32 {
        self.ref_ck(pllsrc) * self.n as u32
    }

    /// pll1_p_ck, the system clock candidate
    pub const fn p_ck(&self, pllsrc: u32) -> Hertz {
        Hertz(self.vco_ck(pllsrc) / self.p as u32)
    }

    /// pll1_q_ck
    pub const fn q_ck(&self, pllsrc: u32) -> Hertz {
        Hertz(self.vco_ck(pllsrc) / self.q as u32)
    }

    /// pll1_r_ck
    pub const fn r_ck(&self, pllsrc: u32) -> Hertz {
        Hertz(self.vco_ck(pllsrc) / self.r as u32)
    }

    /// DIVM1 encoding: the divider itself
    pub const fn divm_bits(&self) -> u8 {
        self.m
    }

    /// DIVN1 encoding: multiplier - 1
    pub const fn divn_bits(&self) -> u16 {
        self.n - 1
    }

    /// DIVP1 encoding: divider - 1
    pub const fn divp_bits(&self) -> u8 {
        self.p - 1
    }

    /// DIVQ1 encoding: divider - 1
    pub const fn divq_bits(&self) -> u8 {
        self.q - 1
    }

    /// DIVR1 encoding: divider - 1
    pub const fn divr_bits(&self) -> u8 {
        self.r - 1
    }

    /// Check the factors against the hardware limits for `pllsrc`.
    ///
    /// Panics when called in `const` context with an unachievable
    /// configuration.
    pub const fn check(&self, pllsrc: u32) {
        if self.m < 1 || self.m > 63 {
            ::core::panic!("PLL1 M divider must be 1 to 63");
        }
        if self.n < 4 || self.n > 512 {
            ::core::panic!("PLL1 N multiplier must be 4 to 512");
        }
        if self.p < 2 || self.p > 128 || self.p % 2 != 0 {
            ::core::panic!("PLL1 P divider must be even, 2 to 128");
        }
        if self.q < 1 || self.q > 128 {
            ::core::panic!("PLL1 Q divider must be 1 to 128");
        }
        if self.r < 1 || self.r > 128 {
            ::core::panic!("PLL1 R divider must be 1 to 128");
        }
        if !self.input_range.contains(self.ref_ck(pllsrc)) {
            ::core::panic!("PLL1 reference clock outside of PLL1RGE");
        }
        if !self.vco_range.contains(self.vco_ck(pllsrc)) {
            ::core::panic!("PLL1 VCO frequency outside of PLL1VCOSEL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pll(m: u8, n: u16, p: u8) -> PllConfig {
        PllConfig {
            input_range: PllInputRange::Range4,
            vco_range: VcoRange::Wide,
            m,
            n,
            p,
            q: 4,
            r: 2,
        }
    }

    #[test]
    /// 25MHz crystal to 400MHz sys_ck
    fn hse_25mhz_to_400mhz() {
        let pllsrc = 25_000_000;
        let cfg = pll(5, 160, 2);
        cfg.check(pllsrc);

        println!("ref_ck {} MHz", cfg.ref_ck(pllsrc) as f32 / 1e6);
        println!("vco_ck {} MHz", cfg.vco_ck(pllsrc) as f32 / 1e6);

        assert_eq!(cfg.ref_ck(pllsrc), 5_000_000);
        assert_eq!(cfg.vco_ck(pllsrc), 800_000_000);
        assert_eq!(cfg.p_ck(pllsrc), Hertz(400_000_000));
        assert_eq!(cfg.q_ck(pllsrc), Hertz(200_000_000));
        assert_eq!(cfg.r_ck(pllsrc), Hertz(400_000_000));
    }

    #[test]
    fn register_encodings() {
        let cfg = pll(5, 160, 2);
        assert_eq!(cfg.divm_bits(), 5);
        assert_eq!(cfg.divn_bits(), 159);
        assert_eq!(cfg.divp_bits(), 1);
        assert_eq!(cfg.divq_bits(), 3);
        assert_eq!(cfg.divr_bits(), 1);
    }

    #[test]
    fn range_edges_are_inclusive() {
        assert!(PllInputRange::Range2.contains(2_000_000));
        assert!(PllInputRange::Range2.contains(4_000_000));
        assert!(!PllInputRange::Range2.contains(4_000_001));
        assert!(VcoRange::Medium.contains(150_000_000));
        assert!(!VcoRange::Medium.contains(149_999_999));
        assert!(!VcoRange::Wide.contains(836_000_001));
    }

    #[test]
    #[should_panic(expected = "P divider must be even")]
    fn odd_p_rejected() {
        pll(5, 160, 3).check(25_000_000);
    }

    #[test]
    #[should_panic(expected = "P divider must be even")]
    /// DIVP1 = 0 is reserved on PLL1
    fn undivided_p_rejected() {
        pll(5, 80, 1).check(25_000_000);
    }

    #[test]
    #[should_panic(expected = "reference clock outside")]
    fn reference_outside_range_rejected() {
        // 25MHz / 2 = 12.5MHz is not in 4 - 8MHz
        pll(2, 64, 2).check(25_000_000);
    }

    #[test]
    #[should_panic(expected = "VCO frequency outside")]
    fn vco_outside_range_rejected() {
        // 5MHz * 200 = 1GHz
        pll(5, 200, 2).check(25_000_000);
    }
}
