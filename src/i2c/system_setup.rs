// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Brings one I2C instance from reset to a configured controller through the
//! `OpenProt` `SystemControl` traits: pins, clock gate, reset line, source
//! clock rate, DMA channels and finally bus timing.

use crate::common::Logger;
use crate::dma::DmaService;
use crate::i2c::common::{AddressWidth, I2cSpeed};
use crate::i2c::error::Error;
use crate::i2c::hardware_instantiation::I2cInstance;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::target::TargetCallbacks;
use crate::i2c::traits::{I2cMasterOps, I2cTargetOps};
use crate::pinctrl::{PinControl, PinState};
use crate::sync::Semaphore;
use crate::syscon::{ClockId, ResetId};
use openprot_hal_blocking::system_control::SystemControl;

/// Reset pulse width handed to the reset controller.
pub const RESET_PULSE_US: u32 = 10;

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Enable the instance clock and pulse its reset line.
    ///
    /// # Arguments
    ///
    /// * `system_controller` - Mutable reference to `SystemControl` implementation
    /// * `instance` - I2C instance to bring out of reset
    ///
    /// # Errors
    ///
    /// Returns [`Error::System`] if the clock or reset controller refuses.
    pub fn initialize_i2c_system<S>(
        system_controller: &mut S,
        instance: I2cInstance,
    ) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        system_controller
            .enable(&instance.clock_id())
            .map_err(|_| Error::System)?;
        system_controller
            .reset_pulse(&instance.reset_id(), RESET_PULSE_US)
            .map_err(|_| Error::System)?;
        Ok(())
    }

    /// Source clock frequency the instance's timing is derived from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::System`] if the rate cannot be read, or
    /// [`Error::ClockOutOfRange`] if it does not fit the timing arithmetic.
    pub fn get_i2c_source_frequency<S>(
        system_controller: &S,
        instance: I2cInstance,
    ) -> Result<u32, Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        let hz = system_controller
            .get_frequency(&instance.source_clock())
            .map_err(|_| Error::System)?;
        u32::try_from(hz).map_err(|_| Error::ClockOutOfRange)
    }

    /// Reset the peripheral only, e.g. after an unrecoverable bus fault.
    ///
    /// # Errors
    ///
    /// Returns [`Error::System`] if the reset controller refuses.
    pub fn reset_i2c_peripheral<S>(
        system_controller: &mut S,
        instance: I2cInstance,
    ) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        system_controller
            .reset_assert(&instance.reset_id())
            .map_err(|_| Error::System)?;
        system_controller
            .reset_deassert(&instance.reset_id())
            .map_err(|_| Error::System)
    }

    /// Complete driver initialisation.
    ///
    /// Applies the default pin state, enables the clock, pulses reset, reads
    /// the source clock, claims the bound DMA channels and configures the
    /// controller for the board-declared `bitrate`.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedSpeed`] - `bitrate` is not 100 k, 400 k or 1 M
    /// * [`Error::System`] - pins, clock or reset refused
    /// * [`Error::Dma`] - a DMA channel could not be claimed
    /// * whatever [`I2cController::configure`] reports
    #[allow(clippy::too_many_arguments)]
    pub fn initialize<SC, P, H, Sem, D, T, L>(
        system_controller: &mut SC,
        pins: &mut P,
        instance: I2cInstance,
        controller: &I2cController<H, Sem, D, T, L>,
        bitrate: u32,
        address_width: AddressWidth,
    ) -> Result<(), Error>
    where
        SC: SystemControl<ClockId = ClockId, ResetId = ResetId>,
        P: PinControl,
        H: I2cMasterOps + I2cTargetOps,
        Sem: Semaphore,
        D: DmaService,
        T: TargetCallbacks,
        L: Logger,
    {
        let speed = I2cSpeed::from_bitrate(bitrate)?;
        pins.apply(PinState::Default).map_err(|_| Error::System)?;
        Self::initialize_i2c_system(system_controller, instance)?;
        let source_hz = Self::get_i2c_source_frequency(system_controller, instance)?;
        controller.set_source_clock(source_hz);
        controller.request_dma_channels()?;
        controller.configure(speed, address_width)
    }
}
