// Licensed under the Apache-2.0 license

//! Target-mode listener plumbing shared by both IP generations.
//!
//! A registered target receives its callbacks through the
//! `proposed_traits::i2c_target` traits. The IP back ends decode their own
//! status registers and call the helpers here, so both report the same event
//! sequence to the target.

use crate::i2c::common::{AddressWidth, I2cSEvent, SlaveStatus};
use crate::i2c::error::Error;
use proposed_traits::i2c_target::{I2CCoreTarget, ReadTarget, WriteTarget};

/// Byte sent when the target has nothing to offer.
pub const IDLE_BYTE: u8 = 0xFF;

/// Callback set a registered target must provide.
pub trait TargetCallbacks: I2CCoreTarget + ReadTarget + WriteTarget {}

impl<T: I2CCoreTarget + ReadTarget + WriteTarget> TargetCallbacks for T {}

/// Address a target asks to be registered at.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TargetConfig {
    pub address: u16,
    pub width: AddressWidth,
}

impl TargetConfig {
    #[must_use]
    pub fn seven_bit(address: u8) -> Self {
        Self {
            address: u16::from(address),
            width: AddressWidth::SevenBit,
        }
    }

    /// The 7-bit address to program.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for 10-bit configurations or
    /// addresses above 0x7F.
    pub fn seven_bit_address(&self) -> Result<u8, Error> {
        if self.width == AddressWidth::TenBit {
            return Err(Error::InvalidArgument);
        }
        u8::try_from(self.address)
            .ok()
            .filter(|a| *a <= 0x7F)
            .ok_or(Error::InvalidArgument)
    }
}

/// Listener state that lives next to the registered target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TargetSession {
    pub address: u8,
    in_transaction: bool,
    rx_count: usize,
    tx_count: usize,
    last_event: Option<I2cSEvent>,
    error: bool,
}

impl TargetSession {
    #[must_use]
    pub fn new(address: u8) -> Self {
        Self {
            address,
            in_transaction: false,
            rx_count: 0,
            tx_count: 0,
            last_event: None,
            error: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> SlaveStatus {
        SlaveStatus {
            enabled: true,
            address: Some(self.address),
            in_transaction: self.in_transaction,
            rx_count: self.rx_count,
            tx_count: self.tx_count,
            last_event: self.last_event,
            error: self.error,
        }
    }

    pub fn flag_error(&mut self) {
        self.error = true;
        self.in_transaction = false;
    }

    /// Address matched. `read_request` is true when the remote controller
    /// reads from us.
    pub fn address_matched<T: TargetCallbacks>(
        &mut self,
        target: &mut T,
        read_request: bool,
    ) -> I2cSEvent {
        let repeated = self.in_transaction;
        self.in_transaction = true;
        target.on_transaction_start(repeated);
        // The hardware has already acknowledged the address.
        let _ = target.on_address_match(self.address);
        let event = if read_request {
            I2cSEvent::SlaveRdReq
        } else {
            I2cSEvent::SlaveWrReq
        };
        self.last_event = Some(event);
        event
    }

    pub fn byte_received<T: TargetCallbacks>(&mut self, target: &mut T, byte: u8) -> I2cSEvent {
        if target.on_write(&[byte]).is_err() {
            self.error = true;
        }
        self.rx_count += 1;
        self.last_event = Some(I2cSEvent::SlaveWrRecvd);
        I2cSEvent::SlaveWrRecvd
    }

    /// Ask the target for the next byte to transmit.
    pub fn byte_requested<T: TargetCallbacks>(&mut self, target: &mut T) -> u8 {
        let mut out = [IDLE_BYTE];
        let byte = match target.on_read(&mut out) {
            Ok(n) if n > 0 => {
                let [b] = out;
                b
            }
            _ => IDLE_BYTE,
        };
        self.tx_count += 1;
        self.last_event = Some(I2cSEvent::SlaveRdProc);
        byte
    }

    pub fn stopped<T: TargetCallbacks>(&mut self, target: &mut T) -> I2cSEvent {
        self.in_transaction = false;
        target.on_stop();
        self.last_event = Some(I2cSEvent::SlaveStop);
        I2cSEvent::SlaveStop
    }
}

/// A registered target together with its listener state.
pub struct TargetSlot<T> {
    pub target: T,
    pub session: TargetSession,
}
