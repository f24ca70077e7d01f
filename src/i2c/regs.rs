// Licensed under the Apache-2.0 license

//! Register access for both I2C IP generations.
//!
//! Offsets and bit positions are grouped per IP in [`legacy`] and [`add`].
//! Drivers go through [`RegisterIo`] so the same code runs against memory
//! mapped hardware ([`Mmio`]) and against the simulated peripherals used in
//! tests.

/// 32-bit register window of one peripheral instance.
pub trait RegisterIo {
    fn read(&self, offset: usize) -> u32;

    fn write(&self, offset: usize, value: u32);

    /// Bus address of a register, as programmed into DMA descriptors.
    fn address_of(&self, offset: usize) -> usize;

    fn modify<F: FnOnce(u32) -> u32>(&self, offset: usize, f: F) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    fn set_bits(&self, offset: usize, mask: u32) {
        self.modify(offset, |v| v | mask);
    }

    fn clear_bits(&self, offset: usize, mask: u32) {
        self.modify(offset, |v| v & !mask);
    }
}

/// Volatile access to a memory mapped register block.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of an I2C register block that nothing else
    /// accesses for the lifetime of the returned value.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl RegisterIo for Mmio {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` requires `base` to point at a live register block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&self, offset: usize, value: u32) {
        // SAFETY: `new` requires `base` to point at a live register block.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    fn address_of(&self, offset: usize) -> usize {
        self.base + offset
    }
}

/// Legacy I2C IP (I2C0..I2C2).
pub mod legacy {
    pub const CTL0: usize = 0x00;
    pub const CTL1: usize = 0x04;
    pub const SADDR0: usize = 0x08;
    pub const DATA: usize = 0x10;
    pub const STAT0: usize = 0x14;
    pub const STAT1: usize = 0x18;
    pub const CKCFG: usize = 0x1C;
    pub const RT: usize = 0x20;
    pub const FMPCFG: usize = 0x90;

    pub mod ctl0 {
        pub const I2CEN: u32 = 1 << 0;
        pub const START: u32 = 1 << 8;
        pub const STOP: u32 = 1 << 9;
        pub const ACKEN: u32 = 1 << 10;
        /// ACK position: the ACKEN bit applies to the next byte, not the current one.
        pub const POAP: u32 = 1 << 11;
        pub const SRESET: u32 = 1 << 15;
    }

    pub mod ctl1 {
        pub const I2CCLK_MASK: u32 = 0x3F;
        pub const ERRIE: u32 = 1 << 8;
        pub const EVIE: u32 = 1 << 9;
        pub const BUFIE: u32 = 1 << 10;
        pub const DMAON: u32 = 1 << 11;
        /// Next DMA end of transfer is the last one: NACK the final byte.
        pub const DMALST: u32 = 1 << 12;
        pub const ALL_INTERRUPTS: u32 = ERRIE | EVIE | BUFIE;
    }

    pub mod stat0 {
        pub const SBSEND: u32 = 1 << 0;
        pub const ADDSEND: u32 = 1 << 1;
        pub const BTC: u32 = 1 << 2;
        pub const ADD10SEND: u32 = 1 << 3;
        pub const STPDET: u32 = 1 << 4;
        pub const RBNE: u32 = 1 << 6;
        pub const TBE: u32 = 1 << 7;
        pub const BERR: u32 = 1 << 8;
        pub const LOSTARB: u32 = 1 << 9;
        pub const AERR: u32 = 1 << 10;
        pub const OUERR: u32 = 1 << 11;
        /// Flags cleared by writing zero to them.
        pub const ERRORS: u32 = BERR | LOSTARB | AERR | OUERR;
    }

    pub mod stat1 {
        pub const MASTER: u32 = 1 << 0;
        pub const I2CBSY: u32 = 1 << 1;
        pub const TR: u32 = 1 << 2;
    }

    pub mod ckcfg {
        pub const CLKC_MASK: u32 = 0xFFF;
        /// Fast mode duty cycle 16:9 instead of 2:1.
        pub const DTCY: u32 = 1 << 14;
        pub const FAST: u32 = 1 << 15;
    }

    pub mod fmpcfg {
        pub const FMPEN: u32 = 1 << 0;
    }
}

/// ADD I2C IP (I2C3..I2C5).
pub mod add {
    pub const CTL0: usize = 0x00;
    pub const CTL1: usize = 0x04;
    pub const SADDR0: usize = 0x08;
    pub const TIMING: usize = 0x10;
    pub const STAT: usize = 0x18;
    pub const STATC: usize = 0x1C;
    pub const RDATA: usize = 0x24;
    pub const TDATA: usize = 0x28;

    pub mod ctl0 {
        pub const I2CEN: u32 = 1 << 0;
        pub const TIE: u32 = 1 << 1;
        pub const RBNEIE: u32 = 1 << 2;
        pub const ADDMIE: u32 = 1 << 3;
        pub const NACKIE: u32 = 1 << 4;
        pub const STPDETIE: u32 = 1 << 5;
        pub const TCIE: u32 = 1 << 6;
        pub const ERRIE: u32 = 1 << 7;
        pub const DENT: u32 = 1 << 14;
        pub const DENR: u32 = 1 << 15;
        /// Disables SCL stretching in target mode.
        pub const SS: u32 = 1 << 17;
        pub const ALL_INTERRUPTS: u32 = TIE | RBNEIE | ADDMIE | NACKIE | STPDETIE | TCIE | ERRIE;
    }

    pub mod ctl1 {
        pub const SADDRESS_MASK: u32 = 0x3FF;
        /// Read transfer.
        pub const TRDIR: u32 = 1 << 10;
        pub const ADD10EN: u32 = 1 << 11;
        pub const HEAD10R: u32 = 1 << 12;
        pub const START: u32 = 1 << 13;
        pub const STOP: u32 = 1 << 14;
        pub const NACKEN: u32 = 1 << 15;
        pub const BYTENUM_SHIFT: u32 = 16;
        pub const BYTENUM_MASK: u32 = 0xFF << BYTENUM_SHIFT;
        pub const RELOAD: u32 = 1 << 24;
        pub const AUTOEND: u32 = 1 << 25;
    }

    pub mod saddr0 {
        pub const ADDRESS_MASK: u32 = 0x3FF;
        pub const ADDFORMAT: u32 = 1 << 10;
        pub const ADDRESSEN: u32 = 1 << 15;
    }

    pub mod timing {
        pub const SCLL_SHIFT: u32 = 0;
        pub const SCLH_SHIFT: u32 = 8;
        pub const SDADELY_SHIFT: u32 = 16;
        pub const SCLDELY_SHIFT: u32 = 20;
        pub const PSC_SHIFT: u32 = 28;
    }

    pub mod stat {
        pub const TBE: u32 = 1 << 0;
        pub const TI: u32 = 1 << 1;
        pub const RBNE: u32 = 1 << 2;
        pub const ADDSEND: u32 = 1 << 3;
        pub const NACK: u32 = 1 << 4;
        pub const STPDET: u32 = 1 << 5;
        pub const TC: u32 = 1 << 6;
        pub const TCR: u32 = 1 << 7;
        pub const BERR: u32 = 1 << 8;
        pub const LOSTARB: u32 = 1 << 9;
        pub const OUERR: u32 = 1 << 10;
        pub const I2CBSY: u32 = 1 << 15;
        /// Target mode: the remote controller is reading.
        pub const TR: u32 = 1 << 16;
    }

    pub mod statc {
        pub const ADDSENDC: u32 = 1 << 3;
        pub const NACKC: u32 = 1 << 4;
        pub const STPDETC: u32 = 1 << 5;
        pub const BERRC: u32 = 1 << 8;
        pub const LOSTARBC: u32 = 1 << 9;
        pub const OUERRC: u32 = 1 << 10;
        pub const ALL: u32 = ADDSENDC | NACKC | STPDETC | BERRC | LOSTARBC | OUERRC;
    }
}
