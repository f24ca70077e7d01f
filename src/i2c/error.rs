// Licensed under the Apache-2.0 license

//! Error types for the GD32 I2C driver.

use crate::dma::DmaError;
use bitflags::bitflags;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

bitflags! {
    /// Bus conditions latched while a group was on the wire.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct BusErrors: u8 {
        const BUS_ERROR = 1 << 0;
        const ARBITRATION_LOST = 1 << 1;
        const NO_ACKNOWLEDGE = 1 << 2;
        const BUS_BUSY = 1 << 4;
        /// Byte count ran out before the hardware finished, or the reverse.
        const OVERFLOW = 1 << 5;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Rejected before any register was touched.
    InvalidArgument,
    /// A group failed on the bus.
    Io(BusErrors),
    /// Bus stuck and recovery failed, or a target is already registered.
    Busy,
    Timeout,
    UnsupportedSpeed,
    /// The peripheral source clock cannot produce the requested speed.
    ClockOutOfRange,
    Dma(DmaError),
    /// Clock, reset or pin control refused a request.
    System,
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(errors) if errors.contains(BusErrors::ARBITRATION_LOST) => {
                ErrorKind::ArbitrationLoss
            }
            Error::Io(errors) if errors.contains(BusErrors::BUS_ERROR) => ErrorKind::Bus,
            Error::Io(errors) if errors.contains(BusErrors::NO_ACKNOWLEDGE) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Error::Io(errors) if errors.contains(BusErrors::OVERFLOW) => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}
