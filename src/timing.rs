//! Bit timing for the `CNF1`, `CNF2` and `CNF3` registers.
//!
//! One bit is split into time quanta: a single sync quantum followed by the
//! propagation segment, phase segment 1 and phase segment 2. The sample point
//! sits between the two phase segments. A quantum lasts `2 * (BRP + 1)`
//! oscillator periods.

use crate::{
    regs::{Cnf1, Cnf2, Cnf3, SyncJumpWidth},
    CanSpeed, McpSpeed,
};

/// Quanta per bit allowed by the MCP2515.
const MIN_QUANTA: u32 = 5;
const MAX_QUANTA: u32 = 25;

/// Quanta counts tried first by [`BitTiming::calculate`], highest first.
const PREFERRED_MIN_QUANTA: u32 = 8;
const PREFERRED_MAX_QUANTA: u32 = 16;

/// Longest phase segment the registers can hold.
const MAX_SEGMENT: u8 = 8;

/// Propagation segment used by [`BitTiming::calculate`] while phase segment
/// 1 has room.
const PROP_SEG: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    brp: u8,
    sjw: SyncJumpWidth,
    prop_seg: u8,
    phase_seg1: u8,
    phase_seg2: u8,
    triple_sample: bool,
    wake_filter: bool,
    sof: bool,
}

impl BitTiming {
    /// Creates a bit timing from a prescaler and segment lengths given in
    /// time quanta.
    ///
    /// Triple sampling, the wake-up filter and the start-of-frame `CLKOUT`
    /// signal start enabled. Returns `None` if the combination breaks the
    /// MCP2515 timing rules.
    pub fn new(
        brp: u8,
        sjw: SyncJumpWidth,
        prop_seg: u8,
        phase_seg1: u8,
        phase_seg2: u8,
    ) -> Option<Self> {
        let timing = Self {
            brp,
            sjw,
            prop_seg,
            phase_seg1,
            phase_seg2,
            triple_sample: true,
            wake_filter: true,
            sof: true,
        };
        timing.is_valid().then(|| timing)
    }

    /// Derives a bit timing for `bitrate` from the oscillator frequency.
    ///
    /// The rate is met when the produced rate, truncated to whole bit/s,
    /// equals `bitrate`; this lets 33 333 bit/s stand for 33 1/3 kbit/s.
    ///
    /// Quanta counts from 16 down to 8 are tried first, then 17 up to 25,
    /// then 7 down to 5; the first one giving a valid prescaler wins. Phase
    /// segment 2 takes three eighths of the bit, the propagation segment two
    /// quanta and phase segment 1 the rest, with the propagation segment
    /// growing once phase segment 1 is full. At 8 MHz and 125 kbit/s this
    /// gives 16 quanta split 1/2/7/6, i.e. `CNF1 = 0x01`, `CNF2 = 0xF1`,
    /// `CNF3 = 0xC5`.
    pub fn calculate(oscillator_hz: u32, bitrate: u32) -> Option<Self> {
        let clocks_per_bit = bitrate.checked_mul(2)?;
        if clocks_per_bit == 0 {
            return None;
        }
        let quanta_prescaler = oscillator_hz / clocks_per_bit;
        if quanta_prescaler == 0 || oscillator_hz / (2 * quanta_prescaler) != bitrate {
            return None;
        }

        let candidates = (PREFERRED_MIN_QUANTA..=PREFERRED_MAX_QUANTA)
            .rev()
            .chain(PREFERRED_MAX_QUANTA + 1..=MAX_QUANTA)
            .chain((MIN_QUANTA..PREFERRED_MIN_QUANTA).rev());
        for quanta in candidates {
            if quanta_prescaler % quanta != 0 {
                continue;
            }
            let Some(brp) = (quanta_prescaler / quanta)
                .checked_sub(1)
                .and_then(|brp| u8::try_from(brp).ok())
            else {
                continue;
            };
            if let Some(timing) = Self::split(brp, quanta as u8) {
                return Some(timing);
            }
        }
        None
    }

    fn split(brp: u8, quanta: u8) -> Option<Self> {
        let phase_seg2 = (quanta * 3 / 8).clamp(2, MAX_SEGMENT);
        let rest = quanta.checked_sub(1 + phase_seg2)?;
        let prop_seg = PROP_SEG
            .max(rest.saturating_sub(MAX_SEGMENT))
            .min(rest.checked_sub(1)?);
        Self::new(brp, SyncJumpWidth::Tq1, prop_seg, rest - prop_seg, phase_seg2)
    }

    /// [`BitTiming::calculate`] for one of the enumerated speeds.
    pub fn for_speed(can_speed: CanSpeed, mcp_speed: McpSpeed) -> Option<Self> {
        Self::calculate(mcp_speed.hz(), can_speed.bps())
    }

    /// Sample three times at the sample point instead of once.
    pub const fn with_triple_sample(mut self, enabled: bool) -> Self {
        self.triple_sample = enabled;
        self
    }

    /// Low-pass filter on the wake-up input.
    pub const fn with_wake_filter(mut self, enabled: bool) -> Self {
        self.wake_filter = enabled;
        self
    }

    /// Drive the start-of-frame signal on `CLKOUT`. Has to be off when the
    /// pin outputs the clock.
    pub const fn with_sof(mut self, enabled: bool) -> Self {
        self.sof = enabled;
        self
    }

    #[inline]
    pub const fn brp(&self) -> u8 {
        self.brp
    }

    /// Time quanta per bit.
    pub const fn quanta(&self) -> u8 {
        1 + self.prop_seg + self.phase_seg1 + self.phase_seg2
    }

    /// Sample point position in tenths of a percent of the bit.
    pub const fn sample_point_permille(&self) -> u16 {
        let before = 1 + self.prop_seg + self.phase_seg1;
        (before as u16 * 1000) / self.quanta() as u16
    }

    /// Bit rate produced with the given oscillator.
    pub const fn bitrate(&self, oscillator_hz: u32) -> u32 {
        oscillator_hz / (2 * (self.brp as u32 + 1) * self.quanta() as u32)
    }

    fn is_valid(&self) -> bool {
        let quanta = self.prop_seg as u16 + self.phase_seg1 as u16 + self.phase_seg2 as u16 + 1;
        self.brp <= 63
            && (1..=8).contains(&self.prop_seg)
            && (1..=8).contains(&self.phase_seg1)
            && (2..=8).contains(&self.phase_seg2)
            && self.phase_seg2 > self.sjw.quanta()
            && self.prop_seg + self.phase_seg1 >= self.phase_seg2
            && (5..=25).contains(&quanta)
    }

    /// Register contents for `CNF1`, `CNF2` and `CNF3`.
    pub fn registers(&self) -> (Cnf1, Cnf2, Cnf3) {
        let cnf1 = Cnf1::new().with_brp(self.brp).with_sjw(self.sjw);
        let cnf2 = Cnf2::new()
            .with_prseg(self.prop_seg - 1)
            .with_phseg1(self.phase_seg1 - 1)
            .with_sam(self.triple_sample)
            .with_btlmode(true);
        let cnf3 = Cnf3::new()
            .with_phseg2(self.phase_seg2 - 1)
            .with_wakfil(self.wake_filter)
            .with_sof(self.sof);
        (cnf1, cnf2, cnf3)
    }
}
