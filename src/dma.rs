// Licensed under the Apache-2.0 license

//! DMA controller collaborator.
//!
//! Peripheral drivers describe a memory/peripheral transfer with a
//! [`DmaTransferConfig`] and drive it through a [`DmaService`]. Completion is
//! reported back to the driver by whoever owns the DMA interrupt, with the
//! channel number and the transfer status.

/// Which side of the transfer is memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelDirection {
    MemoryToPeripheral,
    PeripheralToMemory,
}

/// Address stepping after each element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressAdjust {
    Increment,
    Fixed,
}

/// One single-block transfer descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaTransferConfig {
    pub direction: ChannelDirection,
    /// Request line (DMAMUX slot) feeding the channel.
    pub slot: u32,
    pub priority: u8,
    pub fifo_threshold: u8,
    pub source_address: usize,
    pub dest_address: usize,
    pub source_adjust: AddressAdjust,
    pub dest_adjust: AddressAdjust,
    /// Element width in bytes on both sides.
    pub element_size: u8,
    /// Number of elements.
    pub block_size: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct DmaStatus {
    /// Elements not yet moved.
    pub pending_length: usize,
    pub busy: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmaError {
    ChannelUnavailable,
    InvalidConfig,
    Busy,
    /// The engine reported a bus or configuration fault during the transfer.
    Transfer,
}

/// Channel-level operations of a DMA controller instance.
///
/// Methods take `&self`: channels are started from thread context and
/// re-armed from completion callbacks running in interrupt context.
pub trait DmaService {
    /// Reserve `channel` for exclusive use by the caller.
    ///
    /// # Errors
    ///
    /// Fails if the channel does not exist or is already claimed.
    fn request_channel(&self, channel: u32) -> Result<(), DmaError>;

    /// Load a descriptor into `channel`. The channel must be stopped.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor cannot be expressed by the engine.
    fn configure(&self, channel: u32, config: &DmaTransferConfig) -> Result<(), DmaError>;

    /// # Errors
    ///
    /// Fails if the channel is not configured.
    fn start(&self, channel: u32) -> Result<(), DmaError>;

    /// # Errors
    ///
    /// Fails if the channel does not exist.
    fn stop(&self, channel: u32) -> Result<(), DmaError>;

    /// # Errors
    ///
    /// Fails if the channel does not exist.
    fn status(&self, channel: u32) -> Result<DmaStatus, DmaError>;
}

/// Placeholder for drivers instantiated without DMA. Cannot be constructed.
#[derive(Debug)]
pub enum NoDma {}

impl DmaService for NoDma {
    fn request_channel(&self, _channel: u32) -> Result<(), DmaError> {
        match *self {}
    }

    fn configure(&self, _channel: u32, _config: &DmaTransferConfig) -> Result<(), DmaError> {
        match *self {}
    }

    fn start(&self, _channel: u32) -> Result<(), DmaError> {
        match *self {}
    }

    fn stop(&self, _channel: u32) -> Result<(), DmaError> {
        match *self {}
    }

    fn status(&self, _channel: u32) -> Result<DmaStatus, DmaError> {
        match *self {}
    }
}
