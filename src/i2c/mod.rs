// Licensed under the Apache-2.0 license

//! GD32 I2C driver module.
//!
//! Two register generations share this driver: the legacy IP (I2C0..I2C2)
//! and the ADD IP (I2C3..I2C5). Both implement the hardware traits in
//! [`traits`]; [`i2c_controller::I2cController`] runs the transaction state
//! machine on top of either one.

pub mod add;
pub mod common;
pub mod dma;
pub mod error;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod legacy;
pub mod message;
pub mod regs;
pub mod system_setup;
pub mod target;
pub mod timing;
pub mod traits;
pub mod transfer;


pub use common::{AddressWidth, I2cConfig, I2cConfigBuilder, I2cSpeed, I2cXferMode, NackRetry};
pub use error::{BusErrors, Error};
pub use i2c_controller::{I2cController, TransferOptions};
pub use message::Message;
