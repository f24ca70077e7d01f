// Licensed under the Apache-2.0 license

//! Common types and configuration for the GD32 I2C driver modules.
//!
//! This module provides the bus speed classes, addressing widths, target-mode
//! status types and the controller configuration builder shared by both IP
//! generations.

use crate::i2c::error::Error;
use fugit::MillisDurationU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn bitrate(self) -> u32 {
        self as u32
    }

    /// Map a board-declared bus frequency onto a speed class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSpeed`] for frequencies that are not one of
    /// the three standard I2C rates.
    pub fn from_bitrate(hz: u32) -> Result<Self, Error> {
        match hz {
            100_000 => Ok(Self::Standard),
            400_000 => Ok(Self::Fast),
            1_000_000 => Ok(Self::FastPlus),
            _ => Err(Error::UnsupportedSpeed),
        }
    }
}

/// Initial transfer path selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cXferMode {
    /// Large groups go through DMA when channels are bound.
    DmaMode,
    /// Every byte is moved by the interrupt handler.
    ByteMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AddressWidth {
    #[default]
    SevenBit,
    TenBit,
}

/// When a NACK on a write group is retried once before failing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum NackRetry {
    #[default]
    Never,
    /// Retry writes to this address, typically an EEPROM that NACKs while its
    /// internal write cycle runs.
    Address(u16),
}

impl NackRetry {
    #[must_use]
    pub fn applies_to(self, address: u16) -> bool {
        matches!(self, NackRetry::Address(a) if a == address)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cSEvent {
    SlaveRdReq,
    SlaveWrReq,
    SlaveRdProc,
    SlaveWrRecvd,
    SlaveStop,
}

/// Snapshot of the target-mode listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Whether a target is registered
    pub enabled: bool,
    /// Registered 7-bit address (if enabled)
    pub address: Option<u8>,
    /// Whether a remote controller transaction is in progress
    pub in_transaction: bool,
    /// Bytes received from the remote controller since registration
    pub rx_count: usize,
    /// Bytes sent to the remote controller since registration
    pub tx_count: usize,
    /// Last target event that occurred
    pub last_event: Option<I2cSEvent>,
    /// Whether a bus error was flagged while listening
    pub error: bool,
}

pub struct I2cConfig {
    pub xfer_mode: I2cXferMode,
    pub speed: I2cSpeed,
    pub address_width: AddressWidth,
    /// Groups of at least this many bytes use DMA.
    pub dma_threshold: usize,
    /// Bound on the wait for a DMA group before falling back to interrupts.
    pub dma_timeout: MillisDurationU32,
    /// Bus-idle polls before a stuck bus is recovered.
    pub idle_spin_budget: u32,
    /// Busy-flag polls after recovery re-enables the peripheral.
    pub recovery_poll_budget: u32,
    pub nack_retry: NackRetry,
}

pub struct I2cConfigBuilder {
    xfer_mode: I2cXferMode,
    speed: I2cSpeed,
    address_width: AddressWidth,
    dma_threshold: usize,
    dma_timeout: MillisDurationU32,
    idle_spin_budget: u32,
    recovery_poll_budget: u32,
    nack_retry: NackRetry,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            xfer_mode: I2cXferMode::DmaMode,
            speed: I2cSpeed::Standard,
            address_width: AddressWidth::SevenBit,
            dma_threshold: 32,
            dma_timeout: MillisDurationU32::millis(100),
            idle_spin_budget: 10_000,
            recovery_poll_budget: 100,
            nack_retry: NackRetry::Never,
        }
    }
    #[must_use]
    pub fn xfer_mode(mut self, mode: I2cXferMode) -> Self {
        self.xfer_mode = mode;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn address_width(mut self, width: AddressWidth) -> Self {
        self.address_width = width;
        self
    }
    #[must_use]
    pub fn dma_threshold(mut self, bytes: usize) -> Self {
        self.dma_threshold = bytes;
        self
    }
    #[must_use]
    pub fn dma_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.dma_timeout = timeout;
        self
    }
    #[must_use]
    pub fn idle_spin_budget(mut self, polls: u32) -> Self {
        self.idle_spin_budget = polls;
        self
    }
    #[must_use]
    pub fn recovery_poll_budget(mut self, polls: u32) -> Self {
        self.recovery_poll_budget = polls;
        self
    }
    #[must_use]
    pub fn nack_retry(mut self, policy: NackRetry) -> Self {
        self.nack_retry = policy;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            xfer_mode: self.xfer_mode,
            speed: self.speed,
            address_width: self.address_width,
            dma_threshold: self.dma_threshold.max(1),
            dma_timeout: self.dma_timeout,
            idle_spin_budget: self.idle_spin_budget,
            recovery_poll_budget: self.recovery_poll_budget,
            nack_retry: self.nack_retry,
        }
    }
}
