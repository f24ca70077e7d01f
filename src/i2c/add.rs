// Licensed under the Apache-2.0 license

//! ADD I2C IP back end (I2C3..I2C5).
//!
//! The ADD block counts bytes itself. A group is started by one CTL1 write
//! carrying address, direction, byte count and the START request; counts
//! above 255 run in reload segments, each acknowledged by TCR. The final
//! segment either ends with an automatic stop (STPDET) or, when the bus is
//! to be kept for a repeated start, with TC.

use crate::i2c::common::{I2cSEvent, I2cSpeed};
use crate::i2c::error::{BusErrors, Error};
use crate::i2c::message::{Direction, TargetAddress};
use crate::i2c::regs::add::{
    ctl0, ctl1, saddr0, stat, statc, CTL0, CTL1, RDATA, SADDR0, STAT, STATC, TDATA, TIMING,
};
use crate::i2c::regs::RegisterIo;
use crate::i2c::target::{TargetCallbacks, TargetSession};
use crate::i2c::timing;
use crate::i2c::traits::{I2cHardwareCore, I2cMasterOps, I2cTargetOps};
use crate::i2c::transfer::{ActiveTransfer, Progress, XferPath};

/// Largest byte count one CTL1.BYTENUM segment can carry.
pub const MAX_SEGMENT: usize = 255;

const TARGET_INTERRUPTS: u32 =
    ctl0::ADDMIE | ctl0::RBNEIE | ctl0::TIE | ctl0::STPDETIE | ctl0::NACKIE | ctl0::ERRIE;

pub struct AddIp<R: RegisterIo> {
    regs: R,
}

impl<R: RegisterIo> AddIp<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// CTL1 bits for the next byte-count segment of `xfer`.
    fn next_segment(xfer: &mut ActiveTransfer) -> u32 {
        let (len, more) = xfer.take_hw_segment(MAX_SEGMENT);
        let mut value = ((len as u32) << ctl1::BYTENUM_SHIFT) & ctl1::BYTENUM_MASK;
        if more {
            value |= ctl1::RELOAD;
        } else if xfer.has_stop() {
            value |= ctl1::AUTOEND;
        }
        value
    }

    fn stop_dma_requests(&self) {
        self.regs.clear_bits(CTL0, ctl0::DENT | ctl0::DENR);
    }

    fn quiesce(&self) {
        self.regs
            .clear_bits(CTL0, ctl0::ALL_INTERRUPTS | ctl0::DENT | ctl0::DENR);
    }

    fn fail(&self, xfer: &mut ActiveTransfer, errors: BusErrors) -> Progress {
        xfer.flag(errors);
        self.regs.set_bits(CTL1, ctl1::STOP);
        self.quiesce();
        Progress::Failed
    }

    /// TC or STPDET ended the group on the wire.
    fn group_ended(&self, xfer: &mut ActiveTransfer) -> Progress {
        if xfer.remaining() == 0 {
            self.quiesce();
            return Progress::Complete;
        }
        if xfer.path() == XferPath::Dma {
            // The DMA callback still has to account for the last message.
            xfer.mark_hw_done();
            self.regs.clear_bits(CTL0, ctl0::ALL_INTERRUPTS);
            return Progress::Pending;
        }
        let errors = if xfer.direction() == Direction::Read {
            BusErrors::OVERFLOW
        } else {
            BusErrors::BUS_ERROR
        };
        self.fail(xfer, errors)
    }
}

impl<R: RegisterIo> I2cHardwareCore for AddIp<R> {
    fn enable(&self) {
        self.regs.set_bits(CTL0, ctl0::I2CEN);
    }

    fn disable(&self) {
        self.regs.clear_bits(CTL0, ctl0::I2CEN);
    }

    fn configure_timing(&self, speed: I2cSpeed, source_clock_hz: u32) -> Result<(), Error> {
        let t = timing::add_timing(source_clock_hz, speed)?;
        // TIMING only latches while the peripheral is off.
        self.disable();
        self.regs.write(TIMING, t.register_value());
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.regs.read(STAT) & stat::I2CBSY != 0
    }

    fn recover(&self, poll_budget: u32) -> bool {
        // Only a falling edge of I2CEN resets the block, and it sits
        // disabled between transfers.
        self.enable();
        self.disable();
        self.regs.write(
            STATC,
            statc::NACKC | statc::BERRC | statc::LOSTARBC | statc::STPDETC,
        );
        self.enable();
        (0..poll_budget).any(|_| !self.is_busy())
    }

    fn disable_interrupts(&self) {
        self.quiesce();
    }
}

impl<R: RegisterIo> I2cMasterOps for AddIp<R> {
    fn holds_bus_after(&self, _direction: Direction, has_stop: bool) -> bool {
        !has_stop
    }

    fn begin(&self, xfer: &mut ActiveTransfer) {
        self.enable();
        self.regs.write(STATC, statc::ALL);

        let address = match xfer.address() {
            TargetAddress::SevenBit(a) => (u32::from(a) << 1) & ctl1::SADDRESS_MASK,
            TargetAddress::TenBit(a) => (u32::from(a) & ctl1::SADDRESS_MASK) | ctl1::ADD10EN,
        };
        let direction = match xfer.direction() {
            Direction::Read => ctl1::TRDIR,
            Direction::Write => 0,
        };
        let data_path = match (xfer.path(), xfer.direction()) {
            (XferPath::Interrupt, Direction::Read) => ctl0::RBNEIE,
            (XferPath::Interrupt, Direction::Write) => ctl0::TIE,
            (XferPath::Dma, Direction::Read) => ctl0::DENR,
            (XferPath::Dma, Direction::Write) => ctl0::DENT,
        };
        self.regs.modify(CTL0, |v| {
            (v & !(ctl0::ALL_INTERRUPTS | ctl0::DENT | ctl0::DENR))
                | ctl0::ERRIE
                | ctl0::TCIE
                | ctl0::STPDETIE
                | ctl0::NACKIE
                | data_path
        });

        let segment = Self::next_segment(xfer);
        self.regs
            .write(CTL1, address | direction | segment | ctl1::START);
    }

    fn service_event(&self, xfer: &mut ActiveTransfer) -> Progress {
        let status = self.regs.read(STAT);

        if status & stat::NACK != 0 {
            self.regs.write(STATC, statc::NACKC);
            return self.fail(xfer, BusErrors::NO_ACKNOWLEDGE);
        }

        if xfer.path() == XferPath::Interrupt {
            if status & stat::RBNE != 0 && xfer.direction() == Direction::Read {
                let byte = (self.regs.read(RDATA) & 0xFF) as u8;
                if !xfer.push_read_byte(byte) {
                    return self.fail(xfer, BusErrors::OVERFLOW);
                }
            }
            if status & stat::TI != 0 && xfer.direction() == Direction::Write {
                match xfer.next_write_byte() {
                    Some(byte) => self.regs.write(TDATA, u32::from(byte)),
                    None => return self.fail(xfer, BusErrors::OVERFLOW),
                }
                if xfer.remaining() == 0 {
                    self.regs.clear_bits(CTL0, ctl0::TIE);
                }
            }
        }

        if status & stat::TCR != 0 {
            // Writing a fresh count releases the stretched clock.
            let segment = Self::next_segment(xfer);
            self.regs.modify(CTL1, |v| {
                (v & !(ctl1::BYTENUM_MASK | ctl1::RELOAD | ctl1::AUTOEND)) | segment
            });
            return Progress::Pending;
        }

        if status & stat::TC != 0 {
            if xfer.has_stop() && xfer.remaining() == 0 {
                self.regs.set_bits(CTL1, ctl1::STOP);
            }
            // Without a stop the clock stays stretched until the next START.
            return self.group_ended(xfer);
        }

        if status & stat::STPDET != 0 {
            self.regs.write(STATC, statc::STPDETC);
            self.regs.clear_bits(CTL1, ctl1::AUTOEND);
            return self.group_ended(xfer);
        }

        Progress::Pending
    }

    fn service_error(&self, xfer: &mut ActiveTransfer) -> Progress {
        let status = self.regs.read(STAT);
        let mut errors = BusErrors::empty();
        if status & stat::BERR != 0 {
            errors |= BusErrors::BUS_ERROR;
        }
        if status & stat::LOSTARB != 0 {
            errors |= BusErrors::ARBITRATION_LOST;
        }
        if status & stat::OUERR != 0 {
            errors |= BusErrors::OVERFLOW;
        }
        if errors.is_empty() {
            return Progress::Pending;
        }
        self.regs
            .write(STATC, statc::BERRC | statc::LOSTARBC | statc::OUERRC);
        if errors.contains(BusErrors::ARBITRATION_LOST) {
            xfer.flag(errors);
            self.quiesce();
            return Progress::Failed;
        }
        self.fail(xfer, errors)
    }

    fn abort(&self) {
        if self.is_busy() {
            self.regs.set_bits(CTL1, ctl1::STOP);
        }
        self.quiesce();
    }

    fn data_register(&self, direction: Direction) -> usize {
        match direction {
            Direction::Read => self.regs.address_of(RDATA),
            Direction::Write => self.regs.address_of(TDATA),
        }
    }

    fn prepare_dma(&self, direction: Direction, _len: usize, _last: bool) {
        // NACK of the last read byte and the stop are driven by the byte
        // counter; only the request line needs to be open.
        let request = match direction {
            Direction::Read => ctl0::DENR,
            Direction::Write => ctl0::DENT,
        };
        self.regs.set_bits(CTL0, request);
    }

    fn dma_finished(&self, xfer: &mut ActiveTransfer) -> Progress {
        match xfer.direction() {
            Direction::Read => {
                self.quiesce();
                Progress::Complete
            }
            Direction::Write if xfer.hw_done() => {
                self.quiesce();
                Progress::Complete
            }
            // The last bytes are still in the shifter; TC or STPDET follows.
            Direction::Write => {
                self.stop_dma_requests();
                Progress::Pending
            }
        }
    }
}

impl<R: RegisterIo> I2cTargetOps for AddIp<R> {
    fn enter_target_mode(&self, address: u8) {
        self.disable();
        self.regs.write(
            SADDR0,
            ((u32::from(address & 0x7F) << 1) & saddr0::ADDRESS_MASK) | saddr0::ADDRESSEN,
        );
        self.regs.write(STATC, statc::ALL);
        self.regs.modify(CTL0, |v| {
            (v & !(ctl0::SS | ctl0::DENT | ctl0::DENR | ctl0::ALL_INTERRUPTS)) | TARGET_INTERRUPTS
        });
        self.enable();
    }

    fn leave_target_mode(&self) {
        self.disable();
        self.regs.clear_bits(SADDR0, saddr0::ADDRESSEN);
        self.quiesce();
    }

    fn service_target<T: TargetCallbacks>(
        &self,
        target: &mut T,
        session: &mut TargetSession,
    ) -> Option<I2cSEvent> {
        let status = self.regs.read(STAT);

        if status & stat::ADDSEND != 0 {
            let read_request = status & stat::TR != 0;
            self.regs.write(STATC, statc::ADDSENDC);
            return Some(session.address_matched(target, read_request));
        }
        if status & stat::RBNE != 0 {
            let byte = (self.regs.read(RDATA) & 0xFF) as u8;
            return Some(session.byte_received(target, byte));
        }
        if status & stat::TI != 0 {
            let byte = session.byte_requested(target);
            self.regs.write(TDATA, u32::from(byte));
            return Some(I2cSEvent::SlaveRdProc);
        }
        if status & stat::NACK != 0 {
            // The remote reader is done; the stop follows.
            self.regs.write(STATC, statc::NACKC);
        }
        if status & stat::STPDET != 0 {
            self.regs.write(STATC, statc::STPDETC);
            return Some(session.stopped(target));
        }
        None
    }

    fn service_target_error(&self, session: &mut TargetSession) -> bool {
        let status = self.regs.read(STAT);
        let faults = status & (stat::BERR | stat::LOSTARB | stat::OUERR);
        if faults == 0 {
            return false;
        }
        self.regs
            .write(STATC, statc::BERRC | statc::LOSTARBC | statc::OUERRC);
        session.flag_error();
        true
    }
}
