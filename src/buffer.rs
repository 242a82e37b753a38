//! Transmit and receive buffer register blocks.
//!
//! Each block sits at a fixed base address: `CTRL`, then `SIDH`, `SIDL`,
//! `EID8`, `EID0`, `DLC` and eight data registers at consecutive addresses.

use crate::{error::BufferIndexError, regs::Register, Instruction};

/// Number of registers in a Tx buffer block, `CTRL` through `D7`.
pub const TX_BLOCK_LEN: usize = 14;

/// Mask of the data length code field in a `DLC` register.
pub const DLC_MASK: u8 = 0x0F;

/// One of the three transmit buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxBuf {
    B0,
    B1,
    B2,
}

impl TxBuf {
    pub const ALL: [TxBuf; 3] = [TxBuf::B0, TxBuf::B1, TxBuf::B2];

    /// Control register (`TXBnCTRL`).
    pub const fn ctrl(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0CTRL,
            TxBuf::B1 => Register::TXB1CTRL,
            TxBuf::B2 => Register::TXB2CTRL,
        }
    }

    /// Identifier high register (`TXBnSIDH`).
    pub const fn sidh(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0SIDH,
            TxBuf::B1 => Register::TXB1SIDH,
            TxBuf::B2 => Register::TXB2SIDH,
        }
    }

    /// Data length register (`TXBnDLC`).
    pub const fn dlc(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0DLC,
            TxBuf::B1 => Register::TXB1DLC,
            TxBuf::B2 => Register::TXB2DLC,
        }
    }

    /// First data register (`TXBnD0`).
    pub const fn data(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0DATA,
            TxBuf::B1 => Register::TXB1DATA,
            TxBuf::B2 => Register::TXB2DATA,
        }
    }

    /// Request-to-send instruction addressing only this buffer.
    pub(crate) const fn rts(self) -> Instruction {
        match self {
            TxBuf::B0 => Instruction::RTSTX0,
            TxBuf::B1 => Instruction::RTSTX1,
            TxBuf::B2 => Instruction::RTSTX2,
        }
    }
}

impl TryFrom<u8> for TxBuf {
    type Error = BufferIndexError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(TxBuf::B0),
            1 => Ok(TxBuf::B1),
            2 => Ok(TxBuf::B2),
            other => Err(BufferIndexError(other)),
        }
    }
}

/// One of the two receive buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxBuf {
    B0,
    B1,
}

impl RxBuf {
    /// Poll order used when looking for a frame.
    pub const ALL: [RxBuf; 2] = [RxBuf::B0, RxBuf::B1];

    pub const fn ctrl(self) -> Register {
        match self {
            RxBuf::B0 => Register::RXB0CTRL,
            RxBuf::B1 => Register::RXB1CTRL,
        }
    }

    pub const fn sidh(self) -> Register {
        match self {
            RxBuf::B0 => Register::RXB0SIDH,
            RxBuf::B1 => Register::RXB1SIDH,
        }
    }

    pub const fn dlc(self) -> Register {
        match self {
            RxBuf::B0 => Register::RXB0DLC,
            RxBuf::B1 => Register::RXB1DLC,
        }
    }

    pub const fn data(self) -> Register {
        match self {
            RxBuf::B0 => Register::RXB0DATA,
            RxBuf::B1 => Register::RXB1DATA,
        }
    }
}
