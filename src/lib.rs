#![no_std]

#[macro_use]
pub(crate) mod macros;

pub mod buffer;
pub mod error;
pub mod filter;
pub mod frame;
pub mod regs;
pub mod stat;
pub mod timing;

use embedded_hal::{
    blocking::{
        delay::{DelayMs, DelayUs},
        spi::Transfer,
    },
    digital::v2::OutputPin,
};

use buffer::{RxBuf, TxBuf, DLC_MASK, TX_BLOCK_LEN};
use error::{Error, Result};
use filter::{RxFilter, RxMask};
use frame::{CanFrame, MAX_DLC};
use regs::{
    BitModifiable, CanCtrl, CanIntf, CanStat, OpMode, RecvBufOpMode, Reg, Register, Rxb0Ctrl,
    Rxb1Ctrl, TxbCtrl,
};
use stat::Status;
use timing::BitTiming;

#[repr(u8)]
pub(crate) enum Instruction {
    Write = 0x2,
    Read = 0x3,
    Bitmod = 0x5,
    RTSTX0 = 0x81,
    RTSTX1 = 0x82,
    RTSTX2 = 0x84,
    ReadStatus = 0xA0,
    Reset = 0xC0,
}

/// Time the controller needs to come out of reset.
const RESET_DELAY_MS: u8 = 5;

/// Pause between two `CANSTAT` reads while waiting for a mode change.
const MODE_POLL_INTERVAL_US: u16 = 10;

/// Speed the CAN bus is operating at.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanSpeed {
    Kbps5,
    Kbps10,
    Kbps20,
    Kbps31_25,
    Kbps33_3,
    Kbps40,
    Kbps50,
    Kbps80,
    Kbps100,
    Kbps125,
    Kbps200,
    Kbps250,
    Kbps500,
    Kbps1000,
}

impl CanSpeed {
    /// Bit rate in bit/s.
    pub const fn bps(self) -> u32 {
        match self {
            CanSpeed::Kbps5 => 5_000,
            CanSpeed::Kbps10 => 10_000,
            CanSpeed::Kbps20 => 20_000,
            CanSpeed::Kbps31_25 => 31_250,
            CanSpeed::Kbps33_3 => 33_333,
            CanSpeed::Kbps40 => 40_000,
            CanSpeed::Kbps50 => 50_000,
            CanSpeed::Kbps80 => 80_000,
            CanSpeed::Kbps100 => 100_000,
            CanSpeed::Kbps125 => 125_000,
            CanSpeed::Kbps200 => 200_000,
            CanSpeed::Kbps250 => 250_000,
            CanSpeed::Kbps500 => 500_000,
            CanSpeed::Kbps1000 => 1_000_000,
        }
    }
}

/// Speed the MCP2515 is operating at. Should match the crystal frequency
/// onboard.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McpSpeed {
    MHz8,
    MHz16,
}

impl McpSpeed {
    /// Oscillator frequency in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            McpSpeed::MHz8 => 8_000_000,
            McpSpeed::MHz16 => 16_000_000,
        }
    }
}

/// Settings used to initialize the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Operation mode to end up in: `Normal`, `Loopback` or `ListenOnly`.
    pub mode: OpMode,
    /// Device CAN speed.
    pub can_speed: CanSpeed,
    /// Device oscillator speed. Should match the clock speed of the oscillator
    /// attached to the MCP2515.
    pub mcp_speed: McpSpeed,
    /// Whether to enable the CLKOUT pin.
    pub clkout_en: bool,
    /// Number of `CANSTAT` reads allowed per mode change before giving up
    /// with [`Error::NewModeTimeout`].
    pub mode_retries: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::Normal,
            can_speed: CanSpeed::Kbps125,
            mcp_speed: McpSpeed::MHz8,
            clkout_en: false,
            mode_retries: 20,
        }
    }
}

/// Where the driver is in the bring-up sequence.
///
/// `Reset -> ConfigPending -> Configuring -> Configured -> NormalPending ->
/// Normal`. Frames can only be sent and received in `Normal`; the only way
/// out of it is another [`MCP2515::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Power-on, controller state unknown.
    Reset,
    /// Reset issued, configuration mode not yet confirmed.
    ConfigPending,
    /// Controller confirmed configuration mode.
    Configuring,
    /// Bit timing, buffers and filters programmed.
    Configured,
    /// Operating mode requested, not yet confirmed.
    NormalPending,
    /// Controller confirmed the operating mode.
    Normal,
}

/// MCP2515 driver.
pub struct MCP2515<SPI, CS, D> {
    /// SPI interface to interact with the MCP2515.
    spi: SPI,
    /// Chip select pin to select the MCP2515.
    cs: CS,
    /// Delay interface from users HAL.
    delay: D,
    state: State,
}

impl<SPI, CS, D, SPIE, CSE> MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayMs<u8> + DelayUs<u16>,
{
    /// Creates a new MCP2515 driver. The chip is left untouched until
    /// [`init`](Self::init) or [`reset`](Self::reset) is called.
    ///
    /// # Configuration
    ///
    /// As this driver only takes ownership of the SPI interface, it is up to
    /// the user to create and configure the SPI interface. Namely, the MCP2515
    /// requires the following options:
    ///
    /// * **Data Order**: MSB first.
    /// * **Clock**: Check with your MCP2515 clock. Most breakout boards have an
    ///   8 MHz or 16 MHz oscillator on board. Half of the system clock rate is
    ///   good.
    /// * **Mode**: Mode 0.
    ///
    /// # Parameters
    ///
    /// * `spi` - SPI interface.
    /// * `cs` - Chip-select pin for the MCP2515.
    /// * `delay` - Delay interface from downstream HAL.
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self {
            spi,
            cs,
            delay,
            state: State::Reset,
        }
    }

    /// Releases the SPI interface, chip-select pin and delay.
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Initializes the MCP2515. This should be called once at the start of
    /// the program, and again to recover a controller in an unknown state.
    ///
    /// # Parameters
    ///
    /// * `settings` - Settings for MCP2515. See [`Settings`].
    pub fn init(&mut self, settings: Settings) -> Result<(), SPIE, CSE> {
        let Some(timing) = BitTiming::for_speed(settings.can_speed, settings.mcp_speed) else {
            return Err(Error::InvalidConfiguration(settings.can_speed, settings.mcp_speed));
        };
        Self::check_operating_mode(settings.mode)?;

        self.cs.set_high().map_err(Error::Pin)?;
        self.reset()?;
        self.enter_configuration(settings.mode_retries)?;
        self.configure(&timing, settings.clkout_en)?;
        self.start(settings.mode, settings.mode_retries)
    }

    /// Resets the MCP2515.
    ///
    /// The reset is not confirmed here; the following
    /// [`enter_configuration`](Self::enter_configuration) is what proves the
    /// controller is alive.
    pub fn reset(&mut self) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Reset as u8];
        self.transaction(|spi| exchange(spi, &mut data))?;
        self.delay.delay_ms(RESET_DELAY_MS);
        self.state = State::ConfigPending;
        debug!("mcp2515 reset");
        Ok(())
    }

    /// Requests configuration mode and waits for the controller to report
    /// it. Only valid straight after a reset.
    ///
    /// # Parameters
    ///
    /// * `retries` - Number of `CANSTAT` reads before giving up.
    pub fn enter_configuration(&mut self, retries: u16) -> Result<(), SPIE, CSE> {
        self.require(&[State::ConfigPending])?;
        self.request_mode(OpMode::Configuration, retries)?;
        self.state = State::Configuring;
        Ok(())
    }

    /// Programs bit timing, clears the Tx buffers and turns receive
    /// filtering off. Only valid in configuration mode, the only mode in
    /// which the `CNF` registers can be written.
    ///
    /// # Parameters
    ///
    /// * `timing` - Bit timing for `CNF1`..`CNF3`.
    /// * `clkout_en` - Whether the `CLKOUT` pin outputs the clock. Disables
    ///   the start-of-frame signal on that pin.
    pub fn configure(&mut self, timing: &BitTiming, clkout_en: bool) -> Result<(), SPIE, CSE> {
        self.require(&[State::Configuring])?;

        let timing = if clkout_en {
            timing.with_sof(false)
        } else {
            *timing
        };
        let (cnf1, cnf2, cnf3) = timing.registers();
        self.write_register(cnf1)?;
        self.write_register(cnf2)?;
        self.write_register(cnf3)?;
        self.modify_register(CanCtrl::new().with_clken(clkout_en), CanCtrl::MASK_CLKEN)?;

        // Clear Tx buffers (TXB{0,1,2}CTRL += 14)
        let zeros = [0u8; TX_BLOCK_LEN];
        for buf in TxBuf::ALL {
            self.write_registers(buf.ctrl(), &zeros)?;
        }

        // Accept every frame in both Rx buffers.
        self.write_register(Rxb0Ctrl::new().with_rxm(RecvBufOpMode::FilterOff))?;
        self.write_register(Rxb1Ctrl::new().with_rxm(RecvBufOpMode::FilterOff))?;
        self.write_byte(Register::BFPCTRL, 0)?;

        for filter in RxFilter::ALL {
            for reg in filter.registers() {
                self.write_byte(reg, 0)?;
            }
        }
        for mask in RxMask::ALL {
            for reg in mask.registers() {
                self.write_byte(reg, 0)?;
            }
        }

        self.state = State::Configured;
        debug!("mcp2515 configured, {} tq per bit", timing.quanta());
        Ok(())
    }

    /// Leaves configuration mode for `mode` and waits for the controller to
    /// report it. May be retried after a [`Error::NewModeTimeout`].
    ///
    /// # Parameters
    ///
    /// * `mode` - `Normal`, `Loopback` or `ListenOnly`.
    /// * `retries` - Number of `CANSTAT` reads before giving up.
    pub fn start(&mut self, mode: OpMode, retries: u16) -> Result<(), SPIE, CSE> {
        self.require(&[State::Configured, State::NormalPending])?;
        Self::check_operating_mode(mode)?;
        self.state = State::NormalPending;
        self.request_mode(mode, retries)?;
        self.state = State::Normal;
        Ok(())
    }

    /// Checks once whether the controller reports `mode`.
    pub fn poll_mode(&mut self, mode: OpMode) -> nb::Result<(), Error<SPIE, CSE>> {
        let canstat: CanStat = self.read_register()?;
        if canstat.opmod_or_err() == Ok(mode) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Reads the operation mode the controller currently reports, `None`
    /// for a reserved bit pattern.
    pub fn read_mode(&mut self) -> Result<Option<OpMode>, SPIE, CSE> {
        let canstat: CanStat = self.read_register()?;
        Ok(canstat.opmod_or_err().ok())
    }

    fn request_mode(&mut self, mode: OpMode, retries: u16) -> Result<(), SPIE, CSE> {
        self.modify_register(CanCtrl::new().with_reqop(mode), CanCtrl::MASK_REQOP)?;

        let polls = retries.max(1);
        for attempt in 0..polls {
            if attempt > 0 {
                self.delay.delay_us(MODE_POLL_INTERVAL_US);
            }
            match self.poll_mode(mode) {
                Ok(()) => {
                    trace!("mode {} confirmed after {} polls", mode, attempt + 1);
                    return Ok(());
                }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(err)) => return Err(err),
            }
        }

        warn!("mode {} not confirmed after {} polls", mode, polls);
        Err(Error::NewModeTimeout)
    }

    fn check_operating_mode(mode: OpMode) -> Result<(), SPIE, CSE> {
        match mode {
            OpMode::Normal | OpMode::Loopback | OpMode::ListenOnly => Ok(()),
            other => Err(Error::InvalidMode(other)),
        }
    }

    fn require(&self, allowed: &[State]) -> Result<(), SPIE, CSE> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState(self.state))
        }
    }

    /// Sends a CAN frame via a specific Tx buffer.
    ///
    /// Nothing checks whether `buf` is still busy with an earlier frame; it
    /// is overwritten. Use [`tx_ready`](Self::tx_ready) to wait for it.
    ///
    /// # Parameters
    ///
    /// * `buf` - Tx buffer to use for transmission.
    /// * `frame` - Frame to send.
    pub fn transmit(&mut self, buf: TxBuf, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        self.require(&[State::Normal])?;

        self.write_byte(buf.sidh(), frame.id())?;
        self.write_byte(buf.dlc(), frame.dlc())?;
        if !frame.data().is_empty() {
            self.write_registers(buf.data(), frame.data())?;
        }

        // Request-to-send, plus `txreq` in the ctrl register for good measure.
        let mut rts = [buf.rts() as u8];
        self.transaction(|spi| exchange(spi, &mut rts))?;
        self.modify_register_addr(
            &[buf.ctrl()],
            &TxbCtrl::new().with_txreq(true).into_bytes(),
            &TxbCtrl::MASK_TXREQ.into_bytes(),
        )?;

        trace!("frame {} staged in {}", frame.id(), buf);
        Ok(())
    }

    /// Sends `length` bytes of `payload` under `id` via a specific Tx
    /// buffer.
    ///
    /// Fails with [`Error::InvalidDlc`] before touching the controller if
    /// `length` is above 8 or `payload` is shorter than `length`.
    pub fn send(
        &mut self,
        buf: TxBuf,
        id: u8,
        length: u8,
        payload: &[u8],
    ) -> Result<(), SPIE, CSE> {
        let Some(frame) = CanFrame::from_parts(id, length, payload) else {
            return Err(Error::InvalidDlc(length));
        };
        self.transmit(buf, &frame)
    }

    /// Checks once whether `buf` has no transmission pending, i.e. whether
    /// it can be loaded again.
    pub fn tx_ready(&mut self, buf: TxBuf) -> nb::Result<(), Error<SPIE, CSE>> {
        let ctrl = TxbCtrl::from_bytes([self.read_byte(buf.ctrl())?]);
        if ctrl.txreq() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Looks for a frame with identifier `id` in Rx buffer 0, then Rx buffer
    /// 1.
    ///
    /// This is a poll: `Ok(None)` means no full buffer holds a frame with that
    /// identifier. Only buffers whose `RXnIF` flag is set are looked at. The
    /// flag is not cleared, so a frame stays visible until
    /// [`acknowledge`](Self::acknowledge) releases the buffer.
    pub fn receive(&mut self, id: u8) -> Result<Option<CanFrame>, SPIE, CSE> {
        for buf in RxBuf::ALL {
            if let Some(frame) = self.receive_from(buf, id)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Reads a frame with identifier `id` from a specific Rx buffer.
    ///
    /// An empty buffer (`RXnIF` clear) is `Ok(None)` whatever its registers
    /// hold.
    pub fn receive_from(&mut self, buf: RxBuf, id: u8) -> Result<Option<CanFrame>, SPIE, CSE> {
        self.require(&[State::Normal])?;

        let intf: CanIntf = self.read_register()?;
        let full = match buf {
            RxBuf::B0 => intf.rx0if(),
            RxBuf::B1 => intf.rx1if(),
        };
        if !full {
            return Ok(None);
        }
        if self.read_byte(buf.sidh())? != id {
            return Ok(None);
        }
        let dlc = self.read_byte(buf.dlc())? & DLC_MASK;
        if dlc > MAX_DLC {
            return Err(Error::InvalidDlc(dlc));
        }

        let mut data = [0u8; 8];
        if dlc > 0 {
            self.read_registers(buf.data(), &mut data[..dlc as usize])?;
        }
        trace!("frame {} found in {}", id, buf);
        Ok(CanFrame::from_parts(id, dlc, &data))
    }

    /// Clears the buffer full flag of `buf`, letting the controller load the
    /// next frame into it.
    pub fn acknowledge(&mut self, buf: RxBuf) -> Result<(), SPIE, CSE> {
        let mask = match buf {
            RxBuf::B0 => CanIntf::MASK_RX0IF,
            RxBuf::B1 => CanIntf::MASK_RX1IF,
        };
        self.modify_register(CanIntf::new(), mask)
    }

    /// Reads the quick-poll status byte.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut data = [Instruction::ReadStatus as u8, 0];
        self.transaction(|spi| exchange(spi, &mut data))?;
        Ok(Status::from_bits_truncate(data[1]))
    }

    /// Reads one register.
    pub fn read_byte(&mut self, reg: Register) -> Result<u8, SPIE, CSE> {
        let mut data = [Instruction::Read as u8, reg as u8, 0];
        self.transaction(|spi| exchange(spi, &mut data))?;
        Ok(data[2])
    }

    /// Writes one register.
    pub fn write_byte(&mut self, reg: Register, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Write as u8, reg as u8, value];
        self.transaction(|spi| exchange(spi, &mut data))
    }

    /// Changes the bits of `reg` selected by `mask` to those of `value`:
    /// `reg = (reg & !mask) | (value & mask)`.
    ///
    /// Only registers for which [`Register::supports_bit_modify`] holds are
    /// accepted; anything else fails with [`Error::NotBitModifiable`] without
    /// a transfer.
    pub fn modify_bits(&mut self, reg: Register, mask: u8, value: u8) -> Result<(), SPIE, CSE> {
        if !reg.supports_bit_modify() {
            return Err(Error::NotBitModifiable(reg));
        }
        let mut data = [Instruction::Bitmod as u8, reg as u8, mask, value];
        self.transaction(|spi| exchange(spi, &mut data))
    }

    /// Read a register via a register object.
    #[inline]
    pub fn read_register<const N: usize, R: Reg<N>>(&mut self) -> Result<R, SPIE, CSE> {
        let mut ret = [0u8; N];
        for (reg, byte) in R::ADDRESSES.iter().zip(ret.iter_mut()) {
            *byte = self.read_byte(*reg)?;
        }
        Ok(R::read(ret))
    }

    /// Write to a register using a register object.
    #[inline]
    pub fn write_register<const N: usize, R: Reg<N>>(&mut self, reg: R) -> Result<(), SPIE, CSE> {
        for (addr, byte) in R::ADDRESSES.iter().zip(reg.write()) {
            self.write_byte(*addr, byte)?;
        }
        Ok(())
    }

    /// Modifies a register.
    ///
    /// # Parameters
    ///
    /// * `reg` - New register content.
    /// * `mask` - Mask register. The bits must be 1 in the positions you want
    ///   to modify.
    #[inline]
    pub fn modify_register<const N: usize, R: BitModifiable<N>>(
        &mut self,
        reg: R,
        mask: R,
    ) -> Result<(), SPIE, CSE> {
        self.modify_register_addr(&R::ADDRESSES, &reg.write(), &mask.write())?;
        Ok(())
    }

    /// Modifies n registers, where n is the minimum length of `regs`, `data`
    /// and `masks`.
    ///
    /// # Returns
    ///
    /// Returns the number of registers modified (n), or error on failure.
    pub fn modify_register_addr(
        &mut self,
        regs: &[Register],
        data: &[u8],
        masks: &[u8],
    ) -> Result<usize, SPIE, CSE> {
        let n = regs.len().min(data.len()).min(masks.len());
        for i in 0..n {
            self.modify_bits(regs[i], masks[i], data[i])?;
        }
        Ok(n)
    }

    /// Reads registers starting from `reg` sequentially, moving on to the next
    /// register until `ret` is full.
    fn read_registers(&mut self, reg: Register, ret: &mut [u8]) -> Result<(), SPIE, CSE> {
        let mut hdr = [Instruction::Read as u8, reg as u8];
        self.transaction(|spi| {
            exchange(spi, &mut hdr)?;
            // The MCP2515 ignores what is shifted in while it is reading.
            ret.fill(0);
            exchange(spi, ret)
        })
    }

    /// Writes to sequential registers. Writing will start at `reg` and continue
    /// sequentially until `data` is empty.
    fn write_registers(&mut self, reg: Register, data: &[u8]) -> Result<(), SPIE, CSE> {
        debug_assert!(data.len() <= TX_BLOCK_LEN, "write runs past a buffer block");
        let mut hdr = [Instruction::Write as u8, reg as u8];
        let mut buf = [0u8; TX_BLOCK_LEN];
        let n = data.len().min(TX_BLOCK_LEN);
        buf[..n].copy_from_slice(&data[..n]);
        self.transaction(|spi| {
            exchange(spi, &mut hdr)?;
            exchange(spi, &mut buf[..n])
        })
    }

    /// Runs `f` with the chip select pin held low. The pin is released even
    /// if `f` fails.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut SPI) -> core::result::Result<T, SPIE>,
    ) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Pin)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Pin)?;
        result.map_err(Error::Spi)
    }
}

/// Shifts `bytes` out, replacing them with what the MCP2515 shifted back.
fn exchange<SPI: Transfer<u8>>(
    spi: &mut SPI,
    bytes: &mut [u8],
) -> core::result::Result<(), SPI::Error> {
    spi.transfer(bytes)?;
    Ok(())
}
