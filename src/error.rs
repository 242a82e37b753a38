use core::fmt::Debug;

use embedded_hal::can::Error as CanError;

use crate::{
    regs::{OpMode, Register},
    CanSpeed, McpSpeed, State,
};

pub type Result<T, SPI, PIN> = core::result::Result<T, Error<SPI, PIN>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<SPI, PIN> {
    /// MCP2515 did not respond to mode change within the retry budget.
    NewModeTimeout,
    /// The operation is not valid in the driver's current state.
    InvalidState(State),
    /// The requested mode cannot be used as an operating mode.
    InvalidMode(OpMode),
    /// Frame length outside `0..=8`, either requested by the caller or
    /// reported by the controller.
    InvalidDlc(u8),
    /// The register does not accept the BIT MODIFY instruction.
    NotBitModifiable(Register),
    /// Invalid configuration options.
    InvalidConfiguration(CanSpeed, McpSpeed),
    /// SPI error.
    Spi(SPI),
    /// Chip-select pin error.
    Pin(PIN),
}

impl<SPI: Debug, PIN: Debug> CanError for Error<SPI, PIN> {
    fn kind(&self) -> embedded_hal::can::ErrorKind {
        embedded_hal::can::ErrorKind::Other
    }
}

/// A transmit buffer index other than 0, 1 or 2.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferIndexError(pub u8);
