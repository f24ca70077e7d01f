// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! The GD32 parts carry two unrelated I2C register generations. Each one
//! implements the traits below; the transaction state machine in
//! [`crate::i2c::i2c_controller`] is written once against them, and the
//! variant is fixed by the type chosen when the controller is built.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! I2cHardwareCore (enable, timing, busy, recovery)
//!     ├── I2cMasterOps (group begin, event/error service, DMA hand-off)
//!     └── I2cTargetOps (target address, listener service)
//! ```
//!
//! All methods take `&self`: the same instance is driven from the thread that
//! owns a transfer and from interrupt context, serialised by the controller.

use crate::i2c::common::{I2cSEvent, I2cSpeed};
use crate::i2c::error::Error;
use crate::i2c::message::Direction;
use crate::i2c::target::{TargetCallbacks, TargetSession};
use crate::i2c::transfer::{ActiveTransfer, Progress};

/// Core I2C hardware interface providing basic operations.
///
/// This is the foundation trait that both IP generations provide.
pub trait I2cHardwareCore {
    fn enable(&self);

    fn disable(&self);

    /// Program SCL timing for `speed` from the peripheral source clock.
    ///
    /// Leaves the peripheral disabled; the next transfer enables it.
    ///
    /// # Arguments
    ///
    /// * `speed` - Target bus speed class
    /// * `source_clock_hz` - Peripheral source clock frequency
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSpeed`] if the instance cannot run the
    /// speed class at all, or [`Error::ClockOutOfRange`] if the source clock
    /// cannot produce it.
    fn configure_timing(&self, speed: I2cSpeed, source_clock_hz: u32) -> Result<(), Error>;

    /// Bus busy flag.
    fn is_busy(&self) -> bool;

    /// Reset the peripheral out of a stuck-bus condition.
    ///
    /// Disables the peripheral, clears latched status, re-enables it and
    /// polls the busy flag at most `poll_budget` times. Returns `true` once
    /// the bus reads idle.
    fn recover(&self, poll_budget: u32) -> bool;

    /// Mask every interrupt source and DMA request of the peripheral.
    fn disable_interrupts(&self);
}

/// Controller-mode group sequencing.
///
/// The controller calls [`begin`](I2cMasterOps::begin) once per group with a
/// fresh cursor, then forwards every event interrupt, error interrupt and DMA
/// completion for that group until one of them returns
/// [`Progress::Complete`] or [`Progress::Failed`].
pub trait I2cMasterOps: I2cHardwareCore {
    /// Whether the bus stays owned after a group that ends without a stop.
    ///
    /// A group that keeps the bus is followed by a repeated start.
    fn holds_bus_after(&self, direction: Direction, has_stop: bool) -> bool;

    /// Clear stale status, program address, direction and byte count, unmask
    /// the interrupts the group needs and generate the start condition.
    fn begin(&self, xfer: &mut ActiveTransfer);

    /// Service the event interrupt.
    fn service_event(&self, xfer: &mut ActiveTransfer) -> Progress;

    /// Service the error interrupt. Latches bus errors into `xfer`, forces a
    /// stop and reports [`Progress::Failed`] if any were found.
    fn service_error(&self, xfer: &mut ActiveTransfer) -> Progress;

    /// Force a stop and drop DMA requests. Used when the controller gives up
    /// on a group that the hardware still considers live.
    fn abort(&self);

    /// Bus address of the data register DMA must target for `direction`.
    fn data_register(&self, direction: Direction) -> usize;

    /// Called before the DMA engine is armed for one message of the group.
    fn prepare_dma(&self, direction: Direction, len: usize, last: bool);

    /// The DMA engine moved the last byte of the group.
    fn dma_finished(&self, xfer: &mut ActiveTransfer) -> Progress;
}

/// Target-mode listener support. Only 7-bit addresses are supported.
pub trait I2cTargetOps: I2cHardwareCore {
    /// Respond to `address` and unmask the listener interrupts.
    fn enter_target_mode(&self, address: u8);

    /// Stop responding and mask the listener interrupts.
    fn leave_target_mode(&self);

    /// Service the event interrupt while no controller transfer is active.
    ///
    /// Returns the event passed on to `target`, if any.
    fn service_target<T: TargetCallbacks>(
        &self,
        target: &mut T,
        session: &mut TargetSession,
    ) -> Option<I2cSEvent>;

    /// Service the error interrupt while listening. Returns `true` if a bus
    /// error was flagged.
    fn service_target_error(&self, session: &mut TargetSession) -> bool;
}
