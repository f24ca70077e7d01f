// Licensed under the Apache-2.0 license

//! Pin multiplexing collaborator.

/// Named pin configurations a board can declare per peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinState {
    Default,
    Sleep,
}

/// Routes a peripheral's signals to package pins.
pub trait PinControl {
    type Error: core::fmt::Debug;

    /// Apply the named pin configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the board declares no such state or the pin
    /// controller rejects it.
    fn apply(&mut self, state: PinState) -> Result<(), Self::Error>;
}
