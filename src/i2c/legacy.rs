// Licensed under the Apache-2.0 license

//! Legacy I2C IP back end (I2C0..I2C2).
//!
//! The legacy block has no byte counter. Every phase is paced by status
//! flags: SBSEND after the start condition, ADDSEND (or ADD10SEND) after the
//! address, TBE/RBNE per byte and BTC when the shift register and data
//! register are both full. Reads must withdraw the acknowledge one byte
//! ahead of the byte it applies to, so the last two or three bytes of a read
//! run on BTC instead of RBNE.

use crate::i2c::common::{I2cSEvent, I2cSpeed};
use crate::i2c::error::{BusErrors, Error};
use crate::i2c::message::{Direction, TargetAddress};
use crate::i2c::regs::legacy::{
    ctl0, ctl1, fmpcfg, stat0, stat1, CKCFG, CTL0, CTL1, DATA, FMPCFG, RT, SADDR0, STAT0, STAT1,
};
use crate::i2c::regs::RegisterIo;
use crate::i2c::target::{TargetCallbacks, TargetSession};
use crate::i2c::timing;
use crate::i2c::traits::{I2cHardwareCore, I2cMasterOps, I2cTargetOps};
use crate::i2c::transfer::{ActiveTransfer, Progress, XferPath};

pub struct LegacyIp<R: RegisterIo> {
    regs: R,
    fast_plus: bool,
}

impl<R: RegisterIo> LegacyIp<R> {
    /// `fast_plus` tells whether the instance has the 1 MHz pad driver.
    pub fn new(regs: R, fast_plus: bool) -> Self {
        Self { regs, fast_plus }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    fn clear_addsend(&self) -> u32 {
        // ADDSEND clears on a STAT0 read followed by a STAT1 read.
        let _ = self.regs.read(STAT0);
        self.regs.read(STAT1)
    }

    fn stop(&self) {
        self.regs.set_bits(CTL0, ctl0::STOP);
    }

    fn read_data(&self, xfer: &mut ActiveTransfer) {
        let byte = (self.regs.read(DATA) & 0xFF) as u8;
        if !xfer.push_read_byte(byte) {
            xfer.flag(BusErrors::OVERFLOW);
        }
    }

    fn on_start_sent(&self, xfer: &mut ActiveTransfer) {
        let read = xfer.direction() == Direction::Read;
        let byte = match xfer.address() {
            TargetAddress::SevenBit(a) => (a << 1) | u8::from(read),
            // The read header only goes out after the repeated start.
            TargetAddress::TenBit(_) => xfer.address().header() | u8::from(xfer.header_restarted()),
        };
        self.regs.write(DATA, u32::from(byte));
    }

    fn on_address_sent(&self, xfer: &mut ActiveTransfer) -> Progress {
        let read = xfer.direction() == Direction::Read;
        if read
            && matches!(xfer.address(), TargetAddress::TenBit(_))
            && !xfer.header_restarted()
        {
            // Target acknowledged as a writer; turn the bus around.
            let _ = self.clear_addsend();
            xfer.mark_header_restarted();
            self.regs.set_bits(CTL0, ctl0::START);
            return Progress::Pending;
        }

        if read {
            match xfer.remaining() {
                1 => {
                    self.regs.clear_bits(CTL0, ctl0::ACKEN);
                    let _ = self.clear_addsend();
                    self.stop();
                }
                2 => {
                    // POAP is set: this NACKs the second byte, not the first.
                    self.regs.clear_bits(CTL0, ctl0::ACKEN);
                    let _ = self.clear_addsend();
                }
                _ => {
                    let _ = self.clear_addsend();
                }
            }
        } else {
            let _ = self.clear_addsend();
        }

        if xfer.path() == XferPath::Dma {
            self.regs.set_bits(CTL1, ctl1::DMAON);
        }
        Progress::Pending
    }

    fn on_receive(&self, xfer: &mut ActiveTransfer, btc: bool) -> Progress {
        match xfer.remaining() {
            0 => {
                xfer.flag(BusErrors::OVERFLOW);
                self.finish_failed()
            }
            1 => {
                // Single byte read: NACK and stop were set at ADDSEND.
                self.read_data(xfer);
                self.regs.clear_bits(CTL1, ctl1::ALL_INTERRUPTS);
                Progress::Complete
            }
            2 | 3 if !btc => {
                // Wait for both registers to fill before touching ACK.
                self.regs.clear_bits(CTL1, ctl1::BUFIE);
                Progress::Pending
            }
            3 => {
                self.regs.clear_bits(CTL0, ctl0::ACKEN);
                self.read_data(xfer);
                Progress::Pending
            }
            2 => {
                self.stop();
                self.read_data(xfer);
                self.read_data(xfer);
                self.regs.clear_bits(CTL1, ctl1::ALL_INTERRUPTS);
                Progress::Complete
            }
            _ => {
                self.read_data(xfer);
                if xfer.remaining() == 3 {
                    self.regs.clear_bits(CTL1, ctl1::BUFIE);
                }
                Progress::Pending
            }
        }
    }

    fn on_transmit(&self, xfer: &mut ActiveTransfer) -> Progress {
        match xfer.next_write_byte() {
            Some(byte) => {
                self.regs.write(DATA, u32::from(byte));
                if xfer.remaining() == 0 {
                    // Last byte queued; BTC tells when it left the shifter.
                    self.regs.clear_bits(CTL1, ctl1::BUFIE);
                }
                Progress::Pending
            }
            None => self.finish_write(xfer),
        }
    }

    fn finish_write(&self, xfer: &ActiveTransfer) -> Progress {
        if xfer.has_stop() {
            self.stop();
        }
        self.regs.clear_bits(CTL1, ctl1::ALL_INTERRUPTS | ctl1::DMAON);
        Progress::Complete
    }

    fn finish_failed(&self) -> Progress {
        self.stop();
        self.regs.clear_bits(CTL1, ctl1::ALL_INTERRUPTS | ctl1::DMAON);
        Progress::Failed
    }

    fn latched_errors(&self) -> BusErrors {
        let stat = self.regs.read(STAT0);
        let mut errors = BusErrors::empty();
        if stat & stat0::BERR != 0 {
            errors |= BusErrors::BUS_ERROR;
        }
        if stat & stat0::LOSTARB != 0 {
            errors |= BusErrors::ARBITRATION_LOST;
        }
        if stat & stat0::AERR != 0 {
            errors |= BusErrors::NO_ACKNOWLEDGE;
        }
        if stat & stat0::OUERR != 0 {
            errors |= BusErrors::OVERFLOW;
        }
        if !errors.is_empty() {
            // Error flags clear on writing zero; other bits ignore writes.
            self.regs.write(STAT0, !(stat & stat0::ERRORS) & 0xFFFF);
        }
        errors
    }
}

impl<R: RegisterIo> I2cHardwareCore for LegacyIp<R> {
    fn enable(&self) {
        self.regs.set_bits(CTL0, ctl0::I2CEN);
    }

    fn disable(&self) {
        self.regs.clear_bits(CTL0, ctl0::I2CEN);
    }

    fn configure_timing(&self, speed: I2cSpeed, source_clock_hz: u32) -> Result<(), Error> {
        let t = timing::legacy_timing(source_clock_hz, speed, self.fast_plus)?;
        self.disable();
        self.regs
            .modify(CTL1, |v| (v & !ctl1::I2CCLK_MASK) | (t.i2cclk & ctl1::I2CCLK_MASK));
        self.regs.write(CKCFG, t.ckcfg);
        self.regs.write(RT, t.rise_time);
        if self.fast_plus {
            self.regs
                .write(FMPCFG, if t.fast_plus { fmpcfg::FMPEN } else { 0 });
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.regs.read(STAT1) & stat1::I2CBSY != 0
    }

    fn recover(&self, poll_budget: u32) -> bool {
        // Software reset clears the timing registers along with the stuck
        // state machine, so carry them across it.
        let saved_ctl1 = self.regs.read(CTL1) & ctl1::I2CCLK_MASK;
        let saved_ckcfg = self.regs.read(CKCFG);
        let saved_rt = self.regs.read(RT);
        let saved_saddr = self.regs.read(SADDR0);

        self.disable();
        self.regs.write(STAT0, !stat0::ERRORS & 0xFFFF);
        self.regs.write(CTL0, ctl0::SRESET);
        self.regs.write(CTL0, 0);
        self.regs.write(CTL1, saved_ctl1);
        self.regs.write(CKCFG, saved_ckcfg);
        self.regs.write(RT, saved_rt);
        self.regs.write(SADDR0, saved_saddr);
        self.enable();

        (0..poll_budget).any(|_| !self.is_busy())
    }

    fn disable_interrupts(&self) {
        self.regs
            .clear_bits(CTL1, ctl1::ALL_INTERRUPTS | ctl1::DMAON | ctl1::DMALST);
    }
}

impl<R: RegisterIo> I2cMasterOps for LegacyIp<R> {
    fn holds_bus_after(&self, direction: Direction, has_stop: bool) -> bool {
        // The acknowledge sequencing of reads always ends in a stop.
        direction == Direction::Write && !has_stop
    }

    fn begin(&self, xfer: &mut ActiveTransfer) {
        if !xfer.is_restart() {
            self.disable();
            self.regs.write(SADDR0, 0);
            self.enable();
        }
        let _ = self.latched_errors();

        let two_byte_read = xfer.direction() == Direction::Read && xfer.total() == 2;
        self.regs.modify(CTL0, |v| {
            let v = v | ctl0::ACKEN;
            if two_byte_read {
                v | ctl0::POAP
            } else {
                v & !ctl0::POAP
            }
        });

        let interrupts = match xfer.path() {
            XferPath::Interrupt => ctl1::ALL_INTERRUPTS,
            XferPath::Dma => ctl1::ERRIE | ctl1::EVIE,
        };
        self.regs
            .modify(CTL1, |v| (v & !(ctl1::ALL_INTERRUPTS | ctl1::DMAON)) | interrupts);
        self.regs.set_bits(CTL0, ctl0::START);
    }

    fn service_event(&self, xfer: &mut ActiveTransfer) -> Progress {
        let stat = self.regs.read(STAT0);

        if stat & stat0::SBSEND != 0 {
            self.on_start_sent(xfer);
            return Progress::Pending;
        }
        if stat & stat0::ADD10SEND != 0 {
            self.regs.write(DATA, u32::from(xfer.address().low_byte()));
            return Progress::Pending;
        }
        if stat & stat0::ADDSEND != 0 {
            return self.on_address_sent(xfer);
        }

        let btc = stat & stat0::BTC != 0;
        if xfer.path() == XferPath::Dma {
            // Data moves by DMA; only the end of a write is ours to see.
            if btc && xfer.direction() == Direction::Write && xfer.remaining() == 0 {
                return self.finish_write(xfer);
            }
            return Progress::Pending;
        }

        match xfer.direction() {
            Direction::Read if btc || stat & stat0::RBNE != 0 => self.on_receive(xfer, btc),
            Direction::Write if btc || stat & stat0::TBE != 0 => self.on_transmit(xfer),
            _ => Progress::Pending,
        }
    }

    fn service_error(&self, xfer: &mut ActiveTransfer) -> Progress {
        let errors = self.latched_errors();
        if errors.is_empty() {
            return Progress::Pending;
        }
        xfer.flag(errors);
        if errors.contains(BusErrors::ARBITRATION_LOST) {
            // Another controller owns the bus now.
            self.regs.clear_bits(CTL1, ctl1::ALL_INTERRUPTS | ctl1::DMAON);
            return Progress::Failed;
        }
        self.finish_failed()
    }

    fn abort(&self) {
        if self.regs.read(STAT1) & stat1::MASTER != 0 {
            self.stop();
        }
        self.disable_interrupts();
    }

    fn data_register(&self, _direction: Direction) -> usize {
        self.regs.address_of(DATA)
    }

    fn prepare_dma(&self, direction: Direction, len: usize, last: bool) {
        if direction == Direction::Read && last && len >= 2 {
            self.regs.set_bits(CTL1, ctl1::DMALST);
        } else {
            self.regs.clear_bits(CTL1, ctl1::DMALST);
        }
    }

    fn dma_finished(&self, xfer: &mut ActiveTransfer) -> Progress {
        match xfer.direction() {
            Direction::Read => {
                self.stop();
                self.regs
                    .clear_bits(CTL1, ctl1::ALL_INTERRUPTS | ctl1::DMAON | ctl1::DMALST);
                Progress::Complete
            }
            // Completion follows on BTC once the last byte has shifted out.
            Direction::Write => Progress::Pending,
        }
    }
}

impl<R: RegisterIo> I2cTargetOps for LegacyIp<R> {
    fn enter_target_mode(&self, address: u8) {
        self.disable();
        self.regs.write(SADDR0, u32::from(address & 0x7F) << 1);
        self.enable();
        self.regs.set_bits(CTL0, ctl0::ACKEN);
        self.regs.modify(CTL1, |v| {
            (v & !(ctl1::DMAON | ctl1::DMALST)) | ctl1::ALL_INTERRUPTS
        });
    }

    fn leave_target_mode(&self) {
        self.disable_interrupts();
        self.disable();
        self.regs.write(SADDR0, 0);
    }

    fn service_target<T: TargetCallbacks>(
        &self,
        target: &mut T,
        session: &mut TargetSession,
    ) -> Option<I2cSEvent> {
        let stat = self.regs.read(STAT0);

        if stat & stat0::ADDSEND != 0 {
            let status = self.regs.read(STAT1);
            let read_request = status & stat1::TR != 0;
            return Some(session.address_matched(target, read_request));
        }
        if stat & stat0::RBNE != 0 {
            let byte = (self.regs.read(DATA) & 0xFF) as u8;
            return Some(session.byte_received(target, byte));
        }
        if stat & stat0::TBE != 0 && self.regs.read(STAT1) & stat1::TR != 0 {
            let byte = session.byte_requested(target);
            self.regs.write(DATA, u32::from(byte));
            return Some(I2cSEvent::SlaveRdProc);
        }
        if stat & stat0::STPDET != 0 {
            // STPDET clears on a STAT0 read followed by a CTL0 write.
            self.regs.modify(CTL0, |v| v | ctl0::I2CEN);
            return Some(session.stopped(target));
        }
        None
    }

    fn service_target_error(&self, session: &mut TargetSession) -> bool {
        let errors = self.latched_errors();
        // A NACK from the remote reader is how a target transmission ends.
        let faults = errors - BusErrors::NO_ACKNOWLEDGE;
        if !faults.is_empty() {
            session.flag_error();
        }
        !faults.is_empty()
    }
}
