// Licensed under the Apache-2.0 license

//! DMA channel pair bound to one I2C instance.
//!
//! Both directions are bound together or not at all. Each transfer message
//! is moved as one single-block, byte-wide descriptor between the caller's
//! buffer and the peripheral data register.

use crate::dma::{
    AddressAdjust, ChannelDirection, DmaError, DmaService, DmaStatus, DmaTransferConfig,
};
use crate::i2c::message::Direction;
use core::ops::Range;

/// One DMA channel and the request line that feeds it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DmaBinding {
    pub channel: u32,
    pub slot: u32,
    pub priority: u8,
    pub fifo_threshold: u8,
}

impl DmaBinding {
    #[must_use]
    pub const fn new(channel: u32, slot: u32) -> Self {
        Self {
            channel,
            slot,
            priority: 0,
            fifo_threshold: 0,
        }
    }

    #[must_use]
    pub const fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// FIFO fill level at which the engine bursts, in elements.
    #[must_use]
    pub const fn fifo_threshold(mut self, threshold: u8) -> Self {
        self.fifo_threshold = threshold;
        self
    }
}

pub struct DmaChannels<D: DmaService> {
    service: D,
    tx: DmaBinding,
    rx: DmaBinding,
    window: Range<usize>,
}

impl<D: DmaService> DmaChannels<D> {
    /// Bind `tx` and `rx`. Buffers anywhere in the address space are
    /// accepted until [`with_window`](Self::with_window) narrows it.
    pub fn new(service: D, tx: DmaBinding, rx: DmaBinding) -> Self {
        Self {
            service,
            tx,
            rx,
            window: 0..usize::MAX,
        }
    }

    /// Restrict DMA to buffers inside `window`; others fall back to the
    /// interrupt path.
    #[must_use]
    pub fn with_window(mut self, window: Range<usize>) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn window(&self) -> &Range<usize> {
        &self.window
    }

    pub fn service(&self) -> &D {
        &self.service
    }

    /// Claim both channels.
    ///
    /// # Errors
    ///
    /// Returns the DMA error of the first channel that could not be claimed.
    pub fn request_channels(&self) -> Result<(), DmaError> {
        self.service.request_channel(self.tx.channel)?;
        self.service.request_channel(self.rx.channel)
    }

    /// Which transfer direction `channel` serves, if it is one of ours.
    #[must_use]
    pub fn direction_of(&self, channel: u32) -> Option<Direction> {
        if channel == self.tx.channel {
            Some(Direction::Write)
        } else if channel == self.rx.channel {
            Some(Direction::Read)
        } else {
            None
        }
    }

    fn binding(&self, direction: Direction) -> &DmaBinding {
        match direction {
            Direction::Write => &self.tx,
            Direction::Read => &self.rx,
        }
    }

    /// Move `len` bytes between `memory` and the data register at
    /// `data_register`.
    ///
    /// # Errors
    ///
    /// Propagates configuration or start failures of the DMA engine.
    pub fn start_segment(
        &self,
        direction: Direction,
        memory: usize,
        len: usize,
        data_register: usize,
    ) -> Result<(), DmaError> {
        let binding = self.binding(direction);
        let config = match direction {
            Direction::Write => DmaTransferConfig {
                direction: ChannelDirection::MemoryToPeripheral,
                slot: binding.slot,
                priority: binding.priority,
                fifo_threshold: binding.fifo_threshold,
                source_address: memory,
                dest_address: data_register,
                source_adjust: AddressAdjust::Increment,
                dest_adjust: AddressAdjust::Fixed,
                element_size: 1,
                block_size: len,
            },
            Direction::Read => DmaTransferConfig {
                direction: ChannelDirection::PeripheralToMemory,
                slot: binding.slot,
                priority: binding.priority,
                fifo_threshold: binding.fifo_threshold,
                source_address: data_register,
                dest_address: memory,
                source_adjust: AddressAdjust::Fixed,
                dest_adjust: AddressAdjust::Increment,
                element_size: 1,
                block_size: len,
            },
        };
        self.service.configure(binding.channel, &config)?;
        self.service.start(binding.channel)
    }

    /// Stop the channel serving `direction` and poll its status, at most
    /// `poll_budget` times, until it no longer reports busy.
    ///
    /// # Errors
    ///
    /// Returns the engine's stop or status error, or [`DmaError::Busy`] if
    /// the channel still reports busy and may access memory.
    pub fn halt(&self, direction: Direction, poll_budget: u32) -> Result<(), DmaError> {
        let channel = self.binding(direction).channel;
        let stopped = self.service.stop(channel);
        let mut status = Err(DmaError::Busy);
        for _ in 0..poll_budget.max(1) {
            status = self.service.status(channel);
            if matches!(status, Ok(DmaStatus { busy: false, .. })) {
                return Ok(());
            }
        }
        stopped.and(status).and(Err(DmaError::Busy))
    }
}
