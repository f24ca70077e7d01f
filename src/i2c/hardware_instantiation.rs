// Licensed under the Apache-2.0 license

//! # I2C Instance Topology for GD32
//!
//! The GD32 parts carry six I2C instances split across two register
//! generations: I2C0..I2C2 are the legacy IP, I2C3..I2C5 the ADD IP. Which
//! one an instance uses is fixed by silicon, so it is decided once here, at
//! construction, and never tested again on the transfer path.
//!
//! ## The Strong Typing Problem
//!
//! A controller over the legacy IP and one over the ADD IP are different
//! types:
//!
//! ```rust,ignore
//! I2cController<LegacyIp<Mmio>, Sem>
//! I2cController<AddIp<Mmio>, Sem>
//! ```
//!
//! Boards still want to keep every bus in one array and pick one by number.
//! [`I2cBus`] wraps either variant in an enum; dispatch costs one match per
//! call and needs no allocation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let i2c0 = unsafe { Mmio::new(I2C0_BASE) };
//! let i2c3 = unsafe { Mmio::new(I2C3_BASE) };
//! let mut buses = [
//!     I2cBus::new(I2cInstance::I2c0, i2c0, mutex0, sync0, &config, 0, NoOpLogger),
//!     I2cBus::new(I2cInstance::I2c3, i2c3, mutex3, sync3, &config, 0, NoOpLogger),
//! ];
//! buses[1].as_i2c_mut().write(0x50, &[0x00, 0x10])?;
//! ```

use crate::common::{Logger, NoOpLogger};
use crate::dma::{DmaError, DmaService, NoDma};
use crate::i2c::add::AddIp;
use crate::i2c::common::{AddressWidth, I2cConfig, I2cSpeed, SlaveStatus};
use crate::i2c::dma::DmaChannels;
use crate::i2c::error::Error;
use crate::i2c::i2c_controller::{I2cController, TransferOptions};
use crate::i2c::legacy::LegacyIp;
use crate::i2c::message::Message;
use crate::i2c::regs::RegisterIo;
use crate::i2c::target::{TargetCallbacks, TargetConfig};
use crate::sync::Semaphore;
use crate::syscon::{ClockId, ResetId};

/// Simple dummy I2C target for testing without external dependencies.
///
/// Acknowledges its address, discards written bytes and answers every read
/// with `0x00`.
pub struct DummyI2CTarget {
    address: u8,
}

impl Default for DummyI2CTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyI2CTarget {
    #[must_use]
    pub fn new() -> Self {
        Self { address: 0 }
    }
}

impl embedded_hal::i2c::ErrorType for DummyI2CTarget {
    type Error = Error;
}

impl proposed_traits::i2c_target::I2CCoreTarget for DummyI2CTarget {
    fn init(&mut self, address: u8) -> Result<(), Self::Error> {
        self.address = address;
        Ok(())
    }
    fn on_transaction_start(&mut self, _repeated: bool) {}
    fn on_stop(&mut self) {}
    fn on_address_match(&mut self, address: u8) -> bool {
        self.address == address
    }
}

impl proposed_traits::i2c_target::ReadTarget for DummyI2CTarget {
    fn on_read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        match buffer.first_mut() {
            Some(byte) => {
                *byte = 0x00;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

impl proposed_traits::i2c_target::WriteTarget for DummyI2CTarget {
    fn on_write(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl proposed_traits::i2c_target::WriteReadTarget for DummyI2CTarget {}

impl proposed_traits::i2c_target::RegisterAccess for DummyI2CTarget {
    fn write_register(&mut self, _register: u8, _data: u8) -> Result<(), Self::Error> {
        Ok(())
    }
    fn read_register(&mut self, _register: u8, _data: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

/// Register generation of an instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IpVariant {
    Legacy,
    Add,
}

/// The six I2C instances.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum I2cInstance {
    I2c0,
    I2c1,
    I2c2,
    I2c3,
    I2c4,
    I2c5,
}

impl I2cInstance {
    pub const ALL: [I2cInstance; 6] = [
        I2cInstance::I2c0,
        I2cInstance::I2c1,
        I2cInstance::I2c2,
        I2cInstance::I2c3,
        I2cInstance::I2c4,
        I2cInstance::I2c5,
    ];

    /// Bus number, 0 to 5.
    #[must_use]
    pub fn bus_number(self) -> u8 {
        match self {
            I2cInstance::I2c0 => 0,
            I2cInstance::I2c1 => 1,
            I2cInstance::I2c2 => 2,
            I2cInstance::I2c3 => 3,
            I2cInstance::I2c4 => 4,
            I2cInstance::I2c5 => 5,
        }
    }

    #[must_use]
    pub fn variant(self) -> IpVariant {
        match self {
            I2cInstance::I2c0 | I2cInstance::I2c1 | I2cInstance::I2c2 => IpVariant::Legacy,
            I2cInstance::I2c3 | I2cInstance::I2c4 | I2cInstance::I2c5 => IpVariant::Add,
        }
    }

    /// Whether the legacy instance has the fast-plus pad driver. ADD
    /// instances always support fast-plus.
    #[must_use]
    pub fn fast_plus_capable(self) -> bool {
        matches!(self, I2cInstance::I2c0 | I2cInstance::I2c1)
            || self.variant() == IpVariant::Add
    }

    #[must_use]
    pub fn clock_id(self) -> ClockId {
        match self {
            I2cInstance::I2c0 => ClockId::ClkI2c0,
            I2cInstance::I2c1 => ClockId::ClkI2c1,
            I2cInstance::I2c2 => ClockId::ClkI2c2,
            I2cInstance::I2c3 => ClockId::ClkI2c3,
            I2cInstance::I2c4 => ClockId::ClkI2c4,
            I2cInstance::I2c5 => ClockId::ClkI2c5,
        }
    }

    #[must_use]
    pub fn reset_id(self) -> ResetId {
        match self {
            I2cInstance::I2c0 => ResetId::RstI2c0,
            I2cInstance::I2c1 => ResetId::RstI2c1,
            I2cInstance::I2c2 => ResetId::RstI2c2,
            I2cInstance::I2c3 => ResetId::RstI2c3,
            I2cInstance::I2c4 => ResetId::RstI2c4,
            I2cInstance::I2c5 => ResetId::RstI2c5,
        }
    }

    /// Bus clock the timing is derived from.
    #[must_use]
    pub fn source_clock(self) -> ClockId {
        match self.variant() {
            IpVariant::Legacy => ClockId::ClkApb1,
            IpVariant::Add => ClockId::ClkApb4,
        }
    }
}

/// A controller over either IP generation.
pub enum I2cBus<R, S, D = NoDma, T = DummyI2CTarget, L = NoOpLogger>
where
    R: RegisterIo,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    Legacy(I2cInstance, I2cController<LegacyIp<R>, S, D, T, L>),
    Add(I2cInstance, I2cController<AddIp<R>, S, D, T, L>),
}

impl<R, S, D, T, L> I2cBus<R, S, D, T, L>
where
    R: RegisterIo,
    S: Semaphore,
    D: DmaService,
    T: TargetCallbacks,
    L: Logger,
{
    /// Build the controller matching `instance`'s register generation.
    pub fn new(
        instance: I2cInstance,
        regs: R,
        bus_mutex: S,
        sync: S,
        config: &I2cConfig,
        source_clock_hz: u32,
        logger: L,
    ) -> Self {
        match instance.variant() {
            IpVariant::Legacy => I2cBus::Legacy(
                instance,
                I2cController::new(
                    LegacyIp::new(regs, instance.fast_plus_capable()),
                    bus_mutex,
                    sync,
                    config,
                    source_clock_hz,
                    logger,
                ),
            ),
            IpVariant::Add => I2cBus::Add(
                instance,
                I2cController::new(
                    AddIp::new(regs),
                    bus_mutex,
                    sync,
                    config,
                    source_clock_hz,
                    logger,
                ),
            ),
        }
    }

    #[must_use]
    pub fn with_dma(self, channels: DmaChannels<D>) -> Self {
        match self {
            I2cBus::Legacy(i, c) => I2cBus::Legacy(i, c.with_dma(channels)),
            I2cBus::Add(i, c) => I2cBus::Add(i, c.with_dma(channels)),
        }
    }

    #[must_use]
    pub fn instance(&self) -> I2cInstance {
        match self {
            I2cBus::Legacy(i, _) | I2cBus::Add(i, _) => *i,
        }
    }

    /// Uniform access through `embedded_hal::i2c::I2c`.
    pub fn as_i2c_mut(&mut self) -> &mut dyn embedded_hal::i2c::I2c<Error = Error> {
        match self {
            I2cBus::Legacy(_, c) => c,
            I2cBus::Add(_, c) => c,
        }
    }

    /// # Errors
    ///
    /// See [`I2cController::configure`].
    pub fn configure(&self, speed: I2cSpeed, address_width: AddressWidth) -> Result<(), Error> {
        match self {
            I2cBus::Legacy(_, c) => c.configure(speed, address_width),
            I2cBus::Add(_, c) => c.configure(speed, address_width),
        }
    }

    /// # Errors
    ///
    /// See [`I2cController::transfer_with`].
    pub fn transfer_with(
        &self,
        msgs: &mut [Message<'_>],
        address: u16,
        options: TransferOptions,
    ) -> Result<(), Error> {
        match self {
            I2cBus::Legacy(_, c) => c.transfer_with(msgs, address, options),
            I2cBus::Add(_, c) => c.transfer_with(msgs, address, options),
        }
    }

    /// # Errors
    ///
    /// See [`I2cController::transfer_with`].
    pub fn transfer(&self, msgs: &mut [Message<'_>], address: u16) -> Result<(), Error> {
        self.transfer_with(msgs, address, TransferOptions::default())
    }

    pub fn set_dma_enabled(&self, enabled: bool) {
        match self {
            I2cBus::Legacy(_, c) => c.set_dma_enabled(enabled),
            I2cBus::Add(_, c) => c.set_dma_enabled(enabled),
        }
    }

    pub fn on_event_interrupt(&self) {
        match self {
            I2cBus::Legacy(_, c) => c.on_event_interrupt(),
            I2cBus::Add(_, c) => c.on_event_interrupt(),
        }
    }

    pub fn on_error_interrupt(&self) {
        match self {
            I2cBus::Legacy(_, c) => c.on_error_interrupt(),
            I2cBus::Add(_, c) => c.on_error_interrupt(),
        }
    }

    pub fn on_dma_complete(&self, channel: u32, status: Result<(), DmaError>) {
        match self {
            I2cBus::Legacy(_, c) => c.on_dma_complete(channel, status),
            I2cBus::Add(_, c) => c.on_dma_complete(channel, status),
        }
    }

    /// # Errors
    ///
    /// See [`I2cController::target_register`].
    pub fn target_register(&self, config: TargetConfig, target: T) -> Result<(), Error> {
        match self {
            I2cBus::Legacy(_, c) => c.target_register(config, target),
            I2cBus::Add(_, c) => c.target_register(config, target),
        }
    }

    /// # Errors
    ///
    /// See [`I2cController::target_unregister`].
    pub fn target_unregister(&self, address: u8) -> Result<T, Error> {
        match self {
            I2cBus::Legacy(_, c) => c.target_unregister(address),
            I2cBus::Add(_, c) => c.target_unregister(address),
        }
    }

    #[must_use]
    pub fn target_status(&self) -> Option<SlaveStatus> {
        match self {
            I2cBus::Legacy(_, c) => c.target_status(),
            I2cBus::Add(_, c) => c.target_status(),
        }
    }
}
