// Licensed under the Apache-2.0 license

//! Register-level model of the ADD IP.

use super::{BusDevice, BusEvent, DmaPeripheral, RemoteStep, SimBus, SimPeripheral, Stuck};
use crate::i2c::message::Direction;
use crate::i2c::regs::add::{
    ctl0, ctl1, saddr0, stat, statc, CTL0, CTL1, RDATA, SADDR0, STAT, STATC, TDATA, TIMING,
};
use crate::i2c::regs::RegisterIo;
use std::collections::VecDeque;
use std::sync::Mutex;

const ERROR_FLAGS: u32 = stat::BERR | stat::LOSTARB | stat::OUERR;

#[derive(Default)]
struct State {
    ctl0: u32,
    ctl1: u32,
    saddr0: u32,
    timing: u32,
    /// Sticky status bits, in STAT positions.
    flags: u32,

    master: bool,
    busy: bool,
    read: bool,
    active: bool,
    count_left: usize,
    rdata: Option<u8>,
    tdata: Option<u8>,
    lose_arbitration: bool,

    addressed: bool,
    tr: bool,
    target_tx_active: bool,
    remote: VecDeque<RemoteStep>,
    remote_received: Vec<u8>,

    stuck: Option<Stuck>,
    bus: SimBus,
    generation: u64,
    starts: Vec<u32>,
    reloads: Vec<u32>,
}

impl State {
    fn touch(&mut self) {
        self.generation += 1;
    }

    fn enabled(&self) -> bool {
        self.ctl0 & ctl0::I2CEN != 0
    }

    fn ti(&self) -> bool {
        if self.master {
            self.active && !self.read && self.count_left > 0
        } else {
            self.addressed
                && self.tr
                && self.target_tx_active
                && self.flags & stat::ADDSEND == 0
                && self.tdata.is_none()
        }
    }

    fn stat(&self) -> u32 {
        let mut v = self.flags;
        if self.tdata.is_none() {
            v |= stat::TBE;
        }
        if self.ti() {
            v |= stat::TI;
        }
        if self.rdata.is_some() {
            v |= stat::RBNE;
        }
        if self.busy || self.addressed || self.stuck.is_some() {
            v |= stat::I2CBSY;
        }
        if !self.master && self.tr {
            v |= stat::TR;
        }
        v
    }

    fn write_ctl0(&mut self, value: u32) {
        let old = self.ctl0;
        if value != old {
            self.touch();
        }
        self.ctl0 = value;
        if old & ctl0::I2CEN != 0 && !self.enabled() {
            self.disabled();
        }
    }

    fn disabled(&mut self) {
        self.flags = 0;
        self.master = false;
        self.busy = false;
        self.active = false;
        self.addressed = false;
        self.tr = false;
        self.rdata = None;
        self.tdata = None;
        if self.stuck == Some(Stuck::Recoverable) {
            self.stuck = None;
        }
        self.touch();
    }

    fn write_ctl1(&mut self, value: u32) {
        let stored = value & !(ctl1::START | ctl1::STOP);
        if value & ctl1::START != 0 && self.enabled() {
            self.ctl1 = stored;
            self.starts.push(value);
            self.start();
            return;
        }
        if value & ctl1::STOP != 0 {
            self.ctl1 = stored;
            self.stop();
            return;
        }
        if stored != self.ctl1 {
            self.touch();
        }
        self.ctl1 = stored;
        if self.flags & stat::TCR != 0 && stored & ctl1::BYTENUM_MASK != 0 {
            self.reloads.push(value);
            self.flags &= !stat::TCR;
            self.count_left = ((stored & ctl1::BYTENUM_MASK) >> ctl1::BYTENUM_SHIFT) as usize;
            self.touch();
            self.advance_rx();
        }
    }

    fn start(&mut self) {
        self.touch();
        let repeated = self.master && self.busy;
        self.bus.start(repeated);
        self.flags &= !(stat::TC | stat::TCR);
        self.rdata = None;
        self.tdata = None;
        if self.lose_arbitration {
            self.lose_arbitration = false;
            self.flags |= stat::LOSTARB;
            self.master = false;
            self.busy = false;
            self.active = false;
            return;
        }
        self.master = true;
        self.busy = true;
        let address = if self.ctl1 & ctl1::ADD10EN != 0 {
            self.ctl1 & ctl1::SADDRESS_MASK
        } else {
            (self.ctl1 >> 1) & 0x7F
        };
        self.read = self.ctl1 & ctl1::TRDIR != 0;
        self.count_left = ((self.ctl1 & ctl1::BYTENUM_MASK) >> ctl1::BYTENUM_SHIFT) as usize;
        self.active = self.bus.select(address as u16, self.read);
        if !self.active {
            self.flags |= stat::NACK;
        } else if self.read {
            self.advance_rx();
        }
    }

    fn stop(&mut self) {
        if self.master && self.busy {
            self.touch();
            self.bus.stop();
            self.flags |= stat::STPDET;
        }
        self.master = false;
        self.busy = false;
        self.active = false;
    }

    fn segment_end(&mut self) {
        if self.ctl1 & ctl1::RELOAD != 0 {
            self.flags |= stat::TCR;
        } else if self.ctl1 & ctl1::AUTOEND != 0 {
            self.stop();
        } else {
            self.flags |= stat::TC;
        }
    }

    fn write_tdata(&mut self, byte: u8) {
        self.touch();
        if !self.master {
            if self.addressed && self.tr {
                self.tdata = Some(byte);
            }
            return;
        }
        if !(self.active && !self.read && self.count_left > 0) {
            return;
        }
        let ack = self.bus.write(byte);
        self.count_left -= 1;
        if !ack {
            self.flags |= stat::NACK;
            self.active = false;
        } else if self.count_left == 0 {
            self.segment_end();
        }
    }

    fn read_rdata(&mut self) -> u32 {
        match self.rdata.take() {
            Some(byte) => {
                self.touch();
                self.advance_rx();
                u32::from(byte)
            }
            None => 0,
        }
    }

    fn advance_rx(&mut self) {
        while self.master
            && self.active
            && self.read
            && self.rdata.is_none()
            && self.count_left > 0
        {
            let last = self.count_left == 1 && self.ctl1 & ctl1::RELOAD == 0;
            let byte = self.bus.read(!last);
            self.count_left -= 1;
            self.rdata = Some(byte);
            self.touch();
            if self.count_left == 0 {
                self.segment_end();
            }
        }
    }

    fn remote_step(&mut self) -> bool {
        let Some(step) = self.remote.front().copied() else {
            return false;
        };
        let done = match step {
            RemoteStep::Address { address, read } => {
                if self.master {
                    false
                } else {
                    let listening = self.enabled()
                        && self.saddr0 & saddr0::ADDRESSEN != 0
                        && (self.saddr0 >> 1) & 0x7F == u32::from(address);
                    if listening {
                        self.addressed = true;
                        self.tr = read;
                        self.target_tx_active = read;
                        self.flags |= stat::ADDSEND;
                    }
                    true
                }
            }
            RemoteStep::WriteByte(byte) => {
                let ready = self.addressed
                    && !self.tr
                    && self.flags & stat::ADDSEND == 0
                    && self.rdata.is_none();
                if ready {
                    self.rdata = Some(byte);
                }
                ready
            }
            RemoteStep::ReadByte { ack } => match self.tdata.take() {
                Some(byte) => {
                    self.remote_received.push(byte);
                    if !ack {
                        self.flags |= stat::NACK;
                        self.target_tx_active = false;
                    }
                    true
                }
                None => false,
            },
            RemoteStep::Stop => {
                if self.addressed {
                    self.flags |= stat::STPDET;
                }
                self.addressed = false;
                self.tr = false;
                self.tdata = None;
                self.target_tx_active = false;
                true
            }
        };
        if done {
            self.remote.pop_front();
            self.touch();
        }
        done
    }
}

/// ADD IP model with the bus attached behind it.
#[derive(Default)]
pub struct SimAdd {
    state: Mutex<State>,
}

impl SimAdd {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next START loses arbitration to another controller.
    pub fn lose_arbitration_on_next_start(&self) {
        self.state.lock().unwrap().lose_arbitration = true;
    }

    /// Every CTL1 value written with START set.
    pub fn starts(&self) -> Vec<u32> {
        self.state.lock().unwrap().starts.clone()
    }

    /// Every CTL1 value that answered a TCR.
    pub fn reloads(&self) -> Vec<u32> {
        self.state.lock().unwrap().reloads.clone()
    }

    pub fn peek(&self, offset: usize) -> u32 {
        let s = self.state.lock().unwrap();
        match offset {
            CTL0 => s.ctl0,
            CTL1 => s.ctl1,
            SADDR0 => s.saddr0,
            TIMING => s.timing,
            STAT => s.stat(),
            _ => 0,
        }
    }
}

impl RegisterIo for SimAdd {
    fn read(&self, offset: usize) -> u32 {
        if offset == RDATA {
            return self.state.lock().unwrap().read_rdata();
        }
        self.peek(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        let mut s = self.state.lock().unwrap();
        match offset {
            CTL0 => s.write_ctl0(value),
            CTL1 => s.write_ctl1(value),
            STATC => {
                let kept = s.flags & !(value & statc::ALL);
                if kept != s.flags {
                    s.flags = kept;
                    s.touch();
                }
            }
            TDATA => s.write_tdata((value & 0xFF) as u8),
            SADDR0 => {
                s.saddr0 = value;
                s.touch();
            }
            TIMING => {
                s.timing = value;
                s.touch();
            }
            _ => {}
        }
    }

    fn address_of(&self, offset: usize) -> usize {
        0x4000_6000 + offset
    }
}

impl SimPeripheral for SimAdd {
    fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    fn event_pending(&self) -> bool {
        let s = self.state.lock().unwrap();
        if !s.enabled() {
            return false;
        }
        let status = s.stat();
        [
            (ctl0::TIE, stat::TI),
            (ctl0::RBNEIE, stat::RBNE),
            (ctl0::ADDMIE, stat::ADDSEND),
            (ctl0::NACKIE, stat::NACK),
            (ctl0::STPDETIE, stat::STPDET),
            (ctl0::TCIE, stat::TC | stat::TCR),
        ]
        .iter()
        .any(|(enable, flags)| s.ctl0 & enable != 0 && status & flags != 0)
    }

    fn error_pending(&self) -> bool {
        let s = self.state.lock().unwrap();
        s.enabled() && s.ctl0 & ctl0::ERRIE != 0 && s.flags & ERROR_FLAGS != 0
    }

    fn attach(&self, device: Box<dyn BusDevice>) {
        self.state.lock().unwrap().bus.attach(device);
    }

    fn trace(&self) -> Vec<BusEvent> {
        self.state.lock().unwrap().bus.trace.clone()
    }

    fn set_stuck(&self, stuck: Option<Stuck>) {
        self.state.lock().unwrap().stuck = stuck;
    }

    fn queue_remote(&self, steps: &[RemoteStep]) {
        self.state.lock().unwrap().remote.extend(steps.iter().copied());
    }

    fn remote_step(&self) -> bool {
        self.state.lock().unwrap().remote_step()
    }

    fn remote_received(&self) -> Vec<u8> {
        self.state.lock().unwrap().remote_received.clone()
    }
}

impl DmaPeripheral for SimAdd {
    fn dma_ready(&self, direction: Direction) -> bool {
        let s = self.state.lock().unwrap();
        match direction {
            Direction::Write => s.ctl0 & ctl0::DENT != 0 && s.master && s.ti(),
            Direction::Read => s.ctl0 & ctl0::DENR != 0 && s.rdata.is_some(),
        }
    }

    fn dma_write(&self, byte: u8) {
        self.state.lock().unwrap().write_tdata(byte);
    }

    fn dma_read(&self) -> u8 {
        (self.state.lock().unwrap().read_rdata() & 0xFF) as u8
    }

    fn dma_armed(&self, _direction: Direction, _len: usize) {}
}
