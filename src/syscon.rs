// Licensed under the Apache-2.0 license

//! Clock and reset identifiers for the GD32 reset and clock unit (RCU).
//!
//! These are the `ClockId`/`ResetId` associated types handed to
//! `openprot_hal_blocking::system_control::SystemControl` implementations.

/// Peripheral clock gates relevant to the drivers in this crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockId {
    /// APB1 bus clock, source clock of the legacy I2C blocks.
    ClkApb1,
    /// APB4 bus clock, source clock of the ADD I2C blocks.
    ClkApb4,
    ClkI2c0,
    ClkI2c1,
    ClkI2c2,
    ClkI2c3,
    ClkI2c4,
    ClkI2c5,
    ClkDma0,
    ClkDma1,
}

/// Peripheral reset lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResetId {
    RstI2c0,
    RstI2c1,
    RstI2c2,
    RstI2c3,
    RstI2c4,
    RstI2c5,
}

/// Clock source selection for an I2C kernel clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ClockSource {
    #[default]
    Apb,
    Irc64m,
    Lpirc4m,
    Pll2R,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ClockConfig {
    pub source: ClockSource,
    pub divider: u8,
}
