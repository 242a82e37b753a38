//! Response of the `READ STATUS` instruction.

use bitflags::bitflags;

use crate::buffer::{RxBuf, TxBuf};

bitflags! {
    /// Quick-poll status byte: Rx buffer full flags and per Tx buffer
    /// request/interrupt flags.
    pub struct Status: u8 {
        /// `CANINTF.RX0IF`
        const RX0IF = 1 << 0;
        /// `CANINTF.RX1IF`
        const RX1IF = 1 << 1;
        /// `TXB0CTRL.TXREQ`
        const TX0REQ = 1 << 2;
        /// `CANINTF.TX0IF`
        const TX0IF = 1 << 3;
        /// `TXB1CTRL.TXREQ`
        const TX1REQ = 1 << 4;
        /// `CANINTF.TX1IF`
        const TX1IF = 1 << 5;
        /// `TXB2CTRL.TXREQ`
        const TX2REQ = 1 << 6;
        /// `CANINTF.TX2IF`
        const TX2IF = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#x})", self.bits())
    }
}

impl Status {
    /// Whether the controller holds an unacknowledged frame in `buf`.
    pub fn rx_full(&self, buf: RxBuf) -> bool {
        match buf {
            RxBuf::B0 => self.contains(Status::RX0IF),
            RxBuf::B1 => self.contains(Status::RX1IF),
        }
    }

    /// Whether `buf` still has a transmission pending.
    pub fn tx_pending(&self, buf: TxBuf) -> bool {
        match buf {
            TxBuf::B0 => self.contains(Status::TX0REQ),
            TxBuf::B1 => self.contains(Status::TX1REQ),
            TxBuf::B2 => self.contains(Status::TX2REQ),
        }
    }
}
