//! Acceptance filter and mask register sets.
//!
//! The driver runs both receive buffers with filtering turned off, so these
//! are only used to clear the registers during configuration.

use crate::regs::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFilter {
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl RxFilter {
    pub const ALL: [Self; 6] = [Self::F0, Self::F1, Self::F2, Self::F3, Self::F4, Self::F5];

    /// `SIDH`, `SIDL`, `EID8` and `EID0` of this filter.
    pub const fn registers(self) -> [Register; 4] {
        match self {
            Self::F0 => [
                Register::RXF0SIDH,
                Register::RXF0SIDL,
                Register::RXF0EID8,
                Register::RXF0EID0,
            ],
            Self::F1 => [
                Register::RXF1SIDH,
                Register::RXF1SIDL,
                Register::RXF1EID8,
                Register::RXF1EID0,
            ],
            Self::F2 => [
                Register::RXF2SIDH,
                Register::RXF2SIDL,
                Register::RXF2EID8,
                Register::RXF2EID0,
            ],
            Self::F3 => [
                Register::RXF3SIDH,
                Register::RXF3SIDL,
                Register::RXF3EID8,
                Register::RXF3EID0,
            ],
            Self::F4 => [
                Register::RXF4SIDH,
                Register::RXF4SIDL,
                Register::RXF4EID8,
                Register::RXF4EID0,
            ],
            Self::F5 => [
                Register::RXF5SIDH,
                Register::RXF5SIDL,
                Register::RXF5EID8,
                Register::RXF5EID0,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxMask {
    Buffer0,
    Buffer1,
}

impl RxMask {
    pub const ALL: [Self; 2] = [Self::Buffer0, Self::Buffer1];

    /// `SIDH`, `SIDL`, `EID8` and `EID0` of this mask.
    pub const fn registers(self) -> [Register; 4] {
        match self {
            Self::Buffer0 => [
                Register::RXM0SIDH,
                Register::RXM0SIDL,
                Register::RXM0EID8,
                Register::RXM0EID0,
            ],
            Self::Buffer1 => [
                Register::RXM1SIDH,
                Register::RXM1SIDL,
                Register::RXM1EID8,
                Register::RXM1EID0,
            ],
        }
    }
}
