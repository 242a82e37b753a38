/// Simulated MCP2515 used by the integration tests.
///
/// It decodes the SPI instruction set byte by byte against a 128-byte
/// register file, checks chip-select framing and records every completed
/// transaction.
use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embedded_hal::{
    blocking::{
        delay::{DelayMs, DelayUs},
        spi::Transfer,
    },
    digital::v2::OutputPin,
};
use mcp2515_blocking::MCP2515;

pub const CANSTAT: u8 = 0x0E;
pub const CANCTRL: u8 = 0x0F;
pub const CNF3: u8 = 0x28;
pub const CNF2: u8 = 0x29;
pub const CNF1: u8 = 0x2A;
pub const CANINTF: u8 = 0x2C;

const MODE_CONFIGURATION: u8 = 0b100;

/// Base address of Tx buffer `n` (its `CTRL` register).
pub const fn txb(n: u8) -> u8 {
    0x30 + 0x10 * n
}

/// Base address of Rx buffer `n` (its `CTRL` register).
pub const fn rxb(n: u8) -> u8 {
    0x60 + 0x10 * n
}

/// How the simulated controller reacts to `REQOP` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum ModeBehaviour {
    /// `CANSTAT` follows `REQOP` at once.
    Immediate,
    /// `CANSTAT` follows `REQOP` after this many extra reads.
    AfterPolls(u32),
    /// Reset enters configuration mode, later requests are ignored.
    Stuck,
    /// `CANSTAT` never changes, not even on reset.
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Op {
    Reset,
    Read { addr: u8, len: usize },
    Write { addr: u8, data: Vec<u8> },
    BitModify { addr: u8, mask: u8, value: u8 },
    Rts(u8),
    ReadStatus,
    Unknown(Vec<u8>),
}

#[allow(dead_code)]
pub struct Controller {
    pub regs: [u8; 128],
    pub behaviour: ModeBehaviour,
    pub ops: Vec<Op>,
    pub canstat_reads: usize,
    pub cnf_writes_outside_config: usize,
    pub unframed_bytes: usize,
    pub slept_us: u64,
    cs_low: bool,
    pending_mode: Option<(u8, u32)>,
    txn: Vec<u8>,
}

const BIT_MODIFIABLE: [u8; 14] = [
    0x0C, 0x0D, 0x0F, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D, 0x30, 0x40, 0x50, 0x60, 0x70,
];

#[allow(dead_code)]
impl Controller {
    pub fn new(behaviour: ModeBehaviour) -> Self {
        Self {
            regs: [0; 128],
            behaviour,
            ops: Vec::new(),
            canstat_reads: 0,
            cnf_writes_outside_config: 0,
            unframed_bytes: 0,
            slept_us: 0,
            cs_low: false,
            pending_mode: None,
            txn: Vec::new(),
        }
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.regs[addr as usize & 0x7F]
    }

    pub fn mode(&self) -> u8 {
        self.reg(CANSTAT) >> 5
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    /// Moves the frame staged in Tx buffer `tx` into Rx buffer `rx`, the way
    /// a loopback transmission would.
    pub fn echo(&mut self, tx: u8, rx: u8) {
        let src = txb(tx) as usize + 1;
        let dst = rxb(rx) as usize + 1;
        let block: Vec<u8> = self.regs[src..src + 13].to_vec();
        self.regs[dst..dst + 13].copy_from_slice(&block);
        self.regs[txb(tx) as usize] &= !0x08;
        self.regs[CANINTF as usize] |= 1 << rx;
    }

    /// Places a frame directly into Rx buffer `rx`.
    pub fn load_rx(&mut self, rx: u8, sidh: u8, dlc: u8, data: &[u8]) {
        let base = rxb(rx) as usize;
        self.regs[base + 1] = sidh;
        self.regs[base + 5] = dlc;
        self.regs[base + 6..base + 6 + data.len()].copy_from_slice(data);
        self.regs[CANINTF as usize] |= 1 << rx;
    }

    fn begin(&mut self) {
        assert!(!self.cs_low, "chip select asserted twice");
        self.cs_low = true;
        self.txn.clear();
    }

    fn end(&mut self) {
        self.cs_low = false;
        let txn = std::mem::take(&mut self.txn);
        let op = match txn.as_slice() {
            [] => return,
            [0xC0] => Op::Reset,
            [0x03, addr, rest @ ..] => Op::Read {
                addr: *addr,
                len: rest.len(),
            },
            [0x02, addr, data @ ..] => Op::Write {
                addr: *addr,
                data: data.to_vec(),
            },
            [0x05, addr, mask, value] => Op::BitModify {
                addr: *addr,
                mask: *mask,
                value: *value,
            },
            [rts] if *rts & 0xF8 == 0x80 => Op::Rts(*rts),
            [0xA0, ..] => Op::ReadStatus,
            other => Op::Unknown(other.to_vec()),
        };
        self.ops.push(op);
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        if !self.cs_low {
            self.unframed_bytes += 1;
            return 0xFF;
        }
        self.txn.push(byte);
        let idx = self.txn.len() - 1;
        match self.txn[0] {
            0x03 if idx >= 2 => {
                let addr = self.txn[1].wrapping_add((idx - 2) as u8);
                self.read(addr)
            }
            0x02 if idx >= 2 => {
                let addr = self.txn[1].wrapping_add((idx - 2) as u8);
                self.write(addr, byte);
                0
            }
            0x05 if idx == 3 => {
                let (addr, mask) = (self.txn[1], self.txn[2]);
                let mask = if BIT_MODIFIABLE.contains(&addr) { mask } else { 0xFF };
                let current = self.reg(addr);
                self.write(addr, (current & !mask) | (byte & mask));
                0
            }
            0xC0 if idx == 0 => {
                self.reset();
                0
            }
            rts if idx == 0 && rts & 0xF8 == 0x80 => {
                for n in 0..3 {
                    if rts & (1 << n) != 0 {
                        self.regs[txb(n) as usize] |= 0x08;
                    }
                }
                0
            }
            0xA0 if idx >= 1 => self.status(),
            _ => 0,
        }
    }

    fn reset(&mut self) {
        self.pending_mode = None;
        if self.behaviour == ModeBehaviour::Frozen {
            return;
        }
        self.regs = [0; 128];
        self.regs[CANSTAT as usize] = MODE_CONFIGURATION << 5;
        self.regs[CANCTRL as usize] = 0x87;
    }

    fn read(&mut self, addr: u8) -> u8 {
        if addr == CANSTAT {
            self.canstat_reads += 1;
            if let Some((mode, remaining)) = self.pending_mode {
                if remaining == 0 {
                    self.set_mode(mode);
                    self.pending_mode = None;
                } else {
                    self.pending_mode = Some((mode, remaining - 1));
                }
            }
        }
        self.reg(addr)
    }

    fn write(&mut self, addr: u8, value: u8) {
        if (CNF3..=CNF1).contains(&addr) && self.mode() != MODE_CONFIGURATION {
            self.cnf_writes_outside_config += 1;
        }
        if addr == CANSTAT {
            return;
        }
        self.regs[addr as usize & 0x7F] = value;
        if addr == CANCTRL {
            let requested = value >> 5;
            match self.behaviour {
                ModeBehaviour::Immediate => self.set_mode(requested),
                ModeBehaviour::AfterPolls(n) => self.pending_mode = Some((requested, n)),
                ModeBehaviour::Stuck | ModeBehaviour::Frozen => {}
            }
        }
    }

    fn set_mode(&mut self, mode: u8) {
        let stat = &mut self.regs[CANSTAT as usize];
        *stat = (*stat & 0x1F) | (mode << 5);
    }

    fn status(&self) -> u8 {
        let intf = self.reg(CANINTF);
        let mut status = intf & 0x03;
        for n in 0..3u8 {
            if self.reg(txb(n)) & 0x08 != 0 {
                status |= 1 << (2 + 2 * n);
            }
            if intf & (1 << (2 + n)) != 0 {
                status |= 1 << (3 + 2 * n);
            }
        }
        status
    }
}

pub type Shared = Rc<RefCell<Controller>>;

pub struct SimSpi(pub Shared);

impl Transfer<u8> for SimSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut controller = self.0.borrow_mut();
        for word in words.iter_mut() {
            *word = controller.exchange(*word);
        }
        Ok(words)
    }
}

pub struct SimCs(pub Shared);

impl OutputPin for SimCs {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().begin();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut controller = self.0.borrow_mut();
        if controller.cs_low {
            controller.end();
        }
        Ok(())
    }
}

pub struct SimDelay(pub Shared);

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.0.borrow_mut().slept_us += u64::from(ms) * 1000;
    }
}

impl DelayUs<u16> for SimDelay {
    fn delay_us(&mut self, us: u16) {
        self.0.borrow_mut().slept_us += u64::from(us);
    }
}

pub type Driver = MCP2515<SimSpi, SimCs, SimDelay>;

/// Driver wired to a fresh simulated controller.
#[allow(dead_code)]
pub fn driver(behaviour: ModeBehaviour) -> (Driver, Shared) {
    let controller = Rc::new(RefCell::new(Controller::new(behaviour)));
    let driver = MCP2515::new(
        SimSpi(controller.clone()),
        SimCs(controller.clone()),
        SimDelay(controller.clone()),
    );
    (driver, controller)
}

/// Driver that already went through `init` with default settings; the
/// operation log starts empty.
#[allow(dead_code)]
pub fn ready_driver() -> (Driver, Shared) {
    let (mut driver, controller) = driver(ModeBehaviour::Immediate);
    driver.init(Default::default()).unwrap();
    controller.borrow_mut().take_ops();
    (driver, controller)
}
