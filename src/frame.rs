//! CAN frames as exchanged with the MCP2515 buffer blocks.

use embedded_hal::can::{Frame, Id, StandardId};

/// Maximum number of data bytes in a classic CAN frame.
pub const MAX_DLC: u8 = 8;

/// A data frame carrying an 8-bit identifier.
///
/// The identifier is the byte stored in a buffer's `SIDH` register, i.e. the
/// upper eight bits of an 11-bit standard identifier. The lower identifier
/// bits and extended identifiers are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    id: u8,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Creates a frame from an identifier and up to eight data bytes.
    ///
    /// Returns `None` if `data` is longer than eight bytes.
    pub fn new(id: u8, data: &[u8]) -> Option<Self> {
        let dlc = u8::try_from(data.len()).ok()?;
        Self::from_parts(id, dlc, data)
    }

    /// Creates a frame carrying the first `dlc` bytes of `payload`.
    ///
    /// Returns `None` if `dlc` exceeds eight or `payload` holds fewer than
    /// `dlc` bytes.
    pub fn from_parts(id: u8, dlc: u8, payload: &[u8]) -> Option<Self> {
        if dlc > MAX_DLC || payload.len() < dlc as usize {
            return None;
        }
        let mut data = [0; 8];
        data[..dlc as usize].copy_from_slice(&payload[..dlc as usize]);
        Some(Self { id, dlc, data })
    }

    /// The `SIDH` identifier byte.
    #[inline]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    pub const fn dlc(&self) -> u8 {
        self.dlc
    }

    /// The meaningful data bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// The standard identifier this frame occupies on the bus.
    pub fn standard_id(&self) -> StandardId {
        // At most 0x7F8, always inside the 11-bit range.
        StandardId::new(u16::from(self.id) << 3).unwrap_or(StandardId::ZERO)
    }
}

impl Frame for CanFrame {
    /// Only standard identifiers whose lowest three bits are zero can be
    /// carried.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) if id.as_raw() & 0x7 == 0 => {
                CanFrame::new((id.as_raw() >> 3) as u8, data)
            }
            _ => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Standard(self.standard_id())
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}
