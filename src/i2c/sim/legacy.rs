// Licensed under the Apache-2.0 license

//! Register-level model of the legacy IP.

use super::{BusDevice, BusEvent, DmaPeripheral, RemoteStep, SimBus, SimPeripheral, Stuck};
use crate::i2c::message::Direction;
use crate::i2c::regs::legacy::{
    ctl0, ctl1, stat0, stat1, CKCFG, CTL0, CTL1, DATA, FMPCFG, RT, SADDR0, STAT0, STAT1,
};
use crate::i2c::regs::RegisterIo;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    StartSent,
    HeaderSent,
    Addressed,
    Data,
}

#[derive(Default)]
struct State {
    ctl0: u32,
    ctl1: u32,
    saddr0: u32,
    ckcfg: u32,
    rt: u32,
    fmpcfg: u32,
    errors: u32,
    sbsend: bool,
    addsend: bool,
    add10send: bool,
    stpdet: bool,
    stat0_read: bool,

    master: bool,
    busy: bool,
    read: bool,
    phase: Phase,
    ten_bit: Option<u16>,
    header_high: u16,
    rx_data: Option<u8>,
    rx_shift: Option<u8>,
    rx_active: bool,
    poap_latch: bool,
    dma_rx_left: usize,
    tx_data: Option<u8>,
    byte_sent: bool,
    tx_dead: bool,
    lose_arbitration: bool,

    addressed: bool,
    tr: bool,
    target_tx: Option<u8>,
    target_tx_active: bool,
    remote: VecDeque<RemoteStep>,
    remote_received: Vec<u8>,

    stuck: Option<Stuck>,
    bus: SimBus,
    generation: u64,
}

impl State {
    fn touch(&mut self) {
        self.generation += 1;
    }

    fn enabled(&self) -> bool {
        self.ctl0 & ctl0::I2CEN != 0
    }

    fn rbne(&self) -> bool {
        self.rx_data.is_some()
    }

    fn tbe(&self) -> bool {
        if self.master {
            self.phase == Phase::Data && !self.read && self.tx_data.is_none() && !self.tx_dead
        } else {
            self.addressed
                && self.tr
                && !self.addsend
                && self.target_tx_active
                && self.target_tx.is_none()
        }
    }

    fn btc(&self) -> bool {
        if self.read || !self.master {
            self.rx_data.is_some() && self.rx_shift.is_some()
        } else {
            self.phase == Phase::Data && self.byte_sent && self.tx_data.is_none()
        }
    }

    fn stat0(&self) -> u32 {
        let mut v = self.errors;
        for (set, bit) in [
            (self.sbsend, stat0::SBSEND),
            (self.addsend, stat0::ADDSEND),
            (self.btc(), stat0::BTC),
            (self.add10send, stat0::ADD10SEND),
            (self.stpdet, stat0::STPDET),
            (self.rbne(), stat0::RBNE),
            (self.tbe(), stat0::TBE),
        ] {
            if set {
                v |= bit;
            }
        }
        v
    }

    fn stat1(&self) -> u32 {
        let mut v = 0;
        if self.master {
            v |= stat1::MASTER;
        }
        if self.busy || self.addressed || self.stuck.is_some() {
            v |= stat1::I2CBSY;
        }
        let transmitting = if self.master { !self.read } else { self.tr };
        if transmitting {
            v |= stat1::TR;
        }
        v
    }

    fn reset_data_path(&mut self) {
        self.rx_data = None;
        self.rx_shift = None;
        self.rx_active = false;
        self.tx_data = None;
        self.byte_sent = false;
        self.tx_dead = false;
    }

    fn write_ctl0(&mut self, value: u32) {
        if value & ctl0::SRESET != 0 {
            let keep = State {
                bus: core::mem::take(&mut self.bus),
                remote: core::mem::take(&mut self.remote),
                remote_received: core::mem::take(&mut self.remote_received),
                stuck: self.stuck.filter(|s| *s == Stuck::Permanent),
                generation: self.generation + 1,
                ..State::default()
            };
            *self = keep;
            return;
        }
        if self.stat0_read && self.stpdet {
            self.stpdet = false;
            self.touch();
        }
        let old = self.ctl0;
        let stored = value & !(ctl0::START | ctl0::STOP);
        if stored != old {
            self.touch();
        }
        self.ctl0 = stored;
        if old & ctl0::I2CEN != 0 && !self.enabled() {
            self.disabled();
        }
        if value & ctl0::START != 0 && self.enabled() {
            self.start();
        }
        if value & ctl0::STOP != 0 && self.enabled() {
            self.stop();
        }
    }

    fn disabled(&mut self) {
        self.sbsend = false;
        self.addsend = false;
        self.add10send = false;
        self.stpdet = false;
        self.master = false;
        self.busy = false;
        self.addressed = false;
        self.phase = Phase::Idle;
        self.reset_data_path();
        self.touch();
    }

    fn start(&mut self) {
        self.touch();
        let repeated = self.master && self.busy;
        self.bus.start(repeated);
        self.reset_data_path();
        if self.lose_arbitration {
            self.lose_arbitration = false;
            self.errors |= stat0::LOSTARB;
            self.master = false;
            self.phase = Phase::Idle;
            return;
        }
        self.master = true;
        self.busy = true;
        self.sbsend = true;
        self.phase = Phase::StartSent;
    }

    fn stop(&mut self) {
        if !self.master {
            return;
        }
        self.touch();
        self.bus.stop();
        self.master = false;
        self.busy = false;
        self.phase = Phase::Idle;
        self.rx_active = false;
        self.tx_data = None;
        self.byte_sent = false;
        self.ten_bit = None;
        self.dma_rx_left = 0;
    }

    fn address_nacked(&mut self) {
        self.errors |= stat0::AERR;
        self.phase = Phase::Idle;
    }

    fn addressed_as(&mut self, read: bool) {
        self.read = read;
        self.phase = Phase::Addressed;
        self.addsend = true;
    }

    fn address_byte(&mut self, byte: u8) {
        if byte & 0xF8 == 0xF0 {
            let high = u16::from((byte >> 1) & 0x03);
            if byte & 1 == 0 {
                if self.bus.header_matches(high) {
                    self.header_high = high;
                    self.add10send = true;
                    self.phase = Phase::HeaderSent;
                } else {
                    self.address_nacked();
                }
                return;
            }
            match self.ten_bit.filter(|a| a >> 8 == high) {
                Some(full) if self.bus.select(full, true) => self.addressed_as(true),
                _ => self.address_nacked(),
            }
            return;
        }
        let read = byte & 1 != 0;
        if self.bus.select(u16::from(byte >> 1), read) {
            self.addressed_as(read);
        } else {
            self.address_nacked();
        }
    }

    fn write_data(&mut self, byte: u8) {
        self.touch();
        if !self.master {
            if self.addressed && self.tr {
                self.target_tx = Some(byte);
            }
            return;
        }
        match self.phase {
            Phase::StartSent => {
                self.sbsend = false;
                self.address_byte(byte);
            }
            Phase::HeaderSent => {
                self.add10send = false;
                let full = (self.header_high << 8) | u16::from(byte);
                if self.bus.select(full, false) {
                    self.ten_bit = Some(full);
                    self.addressed_as(false);
                } else {
                    self.address_nacked();
                }
            }
            Phase::Data if !self.read => {
                self.tx_data = Some(byte);
                self.byte_sent = false;
                self.advance_tx();
            }
            _ => {}
        }
    }

    fn read_data(&mut self) -> u32 {
        match self.rx_data.take() {
            Some(byte) => {
                self.touch();
                self.advance_rx();
                u32::from(byte)
            }
            None => 0,
        }
    }

    fn address_cleared(&mut self) {
        self.touch();
        if self.master && self.phase == Phase::Addressed {
            self.phase = Phase::Data;
            if self.read {
                self.rx_active = true;
                // With POAP the first byte is acknowledged regardless.
                self.poap_latch = true;
                self.advance_rx();
            }
        }
    }

    fn decide_ack(&mut self) -> bool {
        if self.dma_rx_left > 0 {
            self.dma_rx_left -= 1;
            return !(self.ctl1 & ctl1::DMALST != 0 && self.dma_rx_left == 0);
        }
        if self.ctl0 & ctl0::POAP != 0 {
            let ack = self.poap_latch;
            self.poap_latch = self.ctl0 & ctl0::ACKEN != 0;
            return ack;
        }
        self.ctl0 & ctl0::ACKEN != 0
    }

    fn advance_rx(&mut self) {
        loop {
            let mut moved = false;
            if self.rx_data.is_none() {
                if let Some(byte) = self.rx_shift.take() {
                    self.rx_data = Some(byte);
                    moved = true;
                }
            }
            if self.master && self.rx_active && self.rx_shift.is_none() {
                let ack = self.decide_ack();
                let byte = self.bus.read(ack);
                if !ack {
                    self.rx_active = false;
                }
                if self.rx_data.is_none() {
                    self.rx_data = Some(byte);
                } else {
                    self.rx_shift = Some(byte);
                }
                moved = true;
            }
            if !moved {
                break;
            }
            self.touch();
        }
    }

    fn advance_tx(&mut self) {
        if let Some(byte) = self.tx_data.take() {
            if self.tx_dead {
                return;
            }
            if !self.bus.write(byte) {
                self.errors |= stat0::AERR;
                self.tx_dead = true;
            }
            self.byte_sent = true;
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
                    if self.enabled() && (self.saddr0 >> 1) & 0x7F == u32::from(address) {
                        self.addressed = true;
                        self.tr = read;
                        self.addsend = true;
                        self.target_tx_active = read;
                    }
                    true
                }
            }
            RemoteStep::WriteByte(byte) => {
                let ready =
                    self.addressed && !self.tr && !self.addsend && self.rx_data.is_none();
                if ready {
                    self.rx_data = Some(byte);
                }
                ready
            }
            RemoteStep::ReadByte { ack } => match self.target_tx.take() {
                Some(byte) => {
                    self.remote_received.push(byte);
                    if !ack {
                        self.errors |= stat0::AERR;
                        self.target_tx_active = false;
                    }
                    true
                }
                None => false,
            },
            RemoteStep::Stop => {
                if self.addressed {
                    self.stpdet = true;
                }
                self.addressed = false;
                self.tr = false;
                self.target_tx = None;
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

/// Legacy IP model with the bus attached behind it.
#[derive(Default)]
pub struct SimLegacy {
    state: Mutex<State>,
}

impl SimLegacy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next START loses arbitration to another controller.
    pub fn lose_arbitration_on_next_start(&self) {
        self.state.lock().unwrap().lose_arbitration = true;
    }

    /// Raw register contents, without read side effects.
    pub fn peek(&self, offset: usize) -> u32 {
        let s = self.state.lock().unwrap();
        match offset {
            CTL0 => s.ctl0,
            CTL1 => s.ctl1,
            SADDR0 => s.saddr0,
            CKCFG => s.ckcfg,
            RT => s.rt,
            FMPCFG => s.fmpcfg,
            STAT0 => s.stat0(),
            STAT1 => s.stat1(),
            _ => 0,
        }
    }
}

impl RegisterIo for SimLegacy {
    fn read(&self, offset: usize) -> u32 {
        let mut s = self.state.lock().unwrap();
        match offset {
            STAT0 => {
                s.stat0_read = true;
                s.stat0()
            }
            STAT1 => {
                let value = s.stat1();
                if s.stat0_read && s.addsend {
                    s.addsend = false;
                    s.stat0_read = false;
                    s.address_cleared();
                }
                value
            }
            DATA => s.read_data(),
            _ => {
                drop(s);
                self.peek(offset)
            }
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut s = self.state.lock().unwrap();
        let slot = match offset {
            CTL0 => return s.write_ctl0(value),
            STAT0 => {
                let kept = s.errors & value;
                if kept != s.errors {
                    s.errors = kept;
                    s.touch();
                }
                return;
            }
            DATA => return s.write_data((value & 0xFF) as u8),
            CTL1 => &mut s.ctl1,
            SADDR0 => &mut s.saddr0,
            CKCFG => &mut s.ckcfg,
            RT => &mut s.rt,
            FMPCFG => &mut s.fmpcfg,
            _ => return,
        };
        let changed = *slot != value;
        *slot = value;
        if changed {
            s.touch();
        }
    }

    fn address_of(&self, offset: usize) -> usize {
        0x4000_5400 + offset
    }
}

impl SimPeripheral for SimLegacy {
    fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    fn event_pending(&self) -> bool {
        let s = self.state.lock().unwrap();
        if !s.enabled() || s.ctl1 & ctl1::EVIE == 0 {
            return false;
        }
        let event = s.sbsend || s.addsend || s.add10send || s.btc() || s.stpdet;
        let buffer = s.ctl1 & ctl1::BUFIE != 0 && (s.rbne() || s.tbe());
        event || buffer
    }

    fn error_pending(&self) -> bool {
        let s = self.state.lock().unwrap();
        s.enabled() && s.ctl1 & ctl1::ERRIE != 0 && s.errors != 0
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

impl DmaPeripheral for SimLegacy {
    fn dma_ready(&self, direction: Direction) -> bool {
        let s = self.state.lock().unwrap();
        if s.ctl1 & ctl1::DMAON == 0 {
            return false;
        }
        match direction {
            Direction::Write => s.master && s.tbe(),
            Direction::Read => s.rbne(),
        }
    }

    fn dma_write(&self, byte: u8) {
        self.state.lock().unwrap().write_data(byte);
    }

    fn dma_read(&self) -> u8 {
        (self.state.lock().unwrap().read_data() & 0xFF) as u8
    }

    fn dma_armed(&self, direction: Direction, len: usize) {
        if direction == Direction::Read {
            self.state.lock().unwrap().dma_rx_left = len;
        }
    }
}
