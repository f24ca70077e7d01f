// Licensed under the Apache-2.0 license

//! SCL timing derivation for both IP generations.
//!
//! The legacy IP is programmed with the source clock in MHz, a clock control
//! divider, a rise time and a duty cycle. The ADD IP takes a prescaler, SCL
//! high/low periods and SCL/SDA data delays packed in one TIMING register.

use crate::i2c::common::I2cSpeed;
use crate::i2c::error::Error;
use crate::i2c::regs::{add, legacy};

/// Highest peripheral source clock either IP accepts.
pub const I2CCLK_MAX_HZ: u32 = 54_000_000;
pub const I2CCLK_STANDARD_MIN_HZ: u32 = 2_000_000;
pub const I2CCLK_FAST_MIN_HZ: u32 = 8_000_000;
pub const I2CCLK_FAST_PLUS_MIN_HZ: u32 = 24_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LegacyTiming {
    /// Source clock in MHz, CTL1.I2CCLK.
    pub i2cclk: u32,
    pub ckcfg: u32,
    pub rise_time: u32,
    pub fast_plus: bool,
}

/// # Errors
///
/// [`Error::UnsupportedSpeed`] for fast-plus on an instance without the
/// fast-plus pad driver, [`Error::ClockOutOfRange`] if `source_hz` is above
/// the IP limit or below the minimum for the speed class.
pub fn legacy_timing(
    source_hz: u32,
    speed: I2cSpeed,
    fast_plus_capable: bool,
) -> Result<LegacyTiming, Error> {
    if source_hz > I2CCLK_MAX_HZ {
        return Err(Error::ClockOutOfRange);
    }
    let min = match speed {
        I2cSpeed::Standard => I2CCLK_STANDARD_MIN_HZ,
        I2cSpeed::Fast => I2CCLK_FAST_MIN_HZ,
        I2cSpeed::FastPlus if !fast_plus_capable => return Err(Error::UnsupportedSpeed),
        I2cSpeed::FastPlus => I2CCLK_FAST_PLUS_MIN_HZ,
    };
    if source_hz < min {
        return Err(Error::ClockOutOfRange);
    }

    let mhz = source_hz / 1_000_000;
    let bitrate = speed.bitrate();
    let timing = match speed {
        I2cSpeed::Standard => LegacyTiming {
            i2cclk: mhz,
            ckcfg: (source_hz / (bitrate * 2)).max(4) & legacy::ckcfg::CLKC_MASK,
            rise_time: mhz + 1,
            fast_plus: false,
        },
        I2cSpeed::Fast => LegacyTiming {
            i2cclk: mhz,
            ckcfg: legacy::ckcfg::FAST
                | ((source_hz / (bitrate * 3)).max(1) & legacy::ckcfg::CLKC_MASK),
            rise_time: mhz * 300 / 1000 + 1,
            fast_plus: false,
        },
        I2cSpeed::FastPlus => LegacyTiming {
            i2cclk: mhz,
            ckcfg: legacy::ckcfg::FAST
                | legacy::ckcfg::DTCY
                | ((source_hz / (bitrate * 25)).max(1) & legacy::ckcfg::CLKC_MASK),
            rise_time: mhz * 120 / 1000 + 1,
            fast_plus: true,
        },
    };
    Ok(timing)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddTiming {
    pub psc: u32,
    pub sclh: u32,
    pub scll: u32,
    pub scl_dely: u32,
    pub sda_dely: u32,
}

impl AddTiming {
    #[must_use]
    pub fn register_value(&self) -> u32 {
        (self.psc << add::timing::PSC_SHIFT)
            | (self.scl_dely << add::timing::SCLDELY_SHIFT)
            | (self.sda_dely << add::timing::SDADELY_SHIFT)
            | (self.sclh << add::timing::SCLH_SHIFT)
            | (self.scll << add::timing::SCLL_SHIFT)
    }
}

struct BusFigures {
    t_low_ns: u32,
    t_high_ns: u32,
    t_su_dat_ns: u32,
    t_af_ns: u32,
    t_vd_dat_ns: u32,
}

fn bus_figures(speed: I2cSpeed) -> BusFigures {
    match speed {
        I2cSpeed::Standard => BusFigures {
            t_low_ns: 4700,
            t_high_ns: 4000,
            t_su_dat_ns: 250,
            t_af_ns: 1000,
            t_vd_dat_ns: 3450,
        },
        I2cSpeed::Fast => BusFigures {
            t_low_ns: 1300,
            t_high_ns: 600,
            t_su_dat_ns: 100,
            t_af_ns: 300,
            t_vd_dat_ns: 900,
        },
        I2cSpeed::FastPlus => BusFigures {
            t_low_ns: 500,
            t_high_ns: 260,
            t_su_dat_ns: 50,
            t_af_ns: 120,
            t_vd_dat_ns: 450,
        },
    }
}

fn cycles(ns: u32, clk_hz: u32) -> u32 {
    let c = (u64::from(ns) * u64::from(clk_hz)).div_ceil(1_000_000_000);
    u32::try_from(c).unwrap_or(u32::MAX)
}

/// # Errors
///
/// [`Error::ClockOutOfRange`] if `source_hz` is above the IP limit or too
/// slow to produce four kernel clocks per SCL period.
pub fn add_timing(source_hz: u32, speed: I2cSpeed) -> Result<AddTiming, Error> {
    if source_hz > I2CCLK_MAX_HZ {
        return Err(Error::ClockOutOfRange);
    }
    let bitrate = speed.bitrate();
    let figures = bus_figures(speed);

    // Aim for roughly eight kernel clocks per SCL period.
    let target_internal = bitrate * 8;
    let psc = if source_hz > target_internal {
        (source_hz / target_internal).saturating_sub(1).min(0x0F)
    } else {
        0
    };
    let ip_clk = source_hz / (psc + 1);
    let total = ip_clk / bitrate;
    if total < 4 {
        return Err(Error::ClockOutOfRange);
    }
    let total = total.min(510);

    let low_min = cycles(figures.t_low_ns, ip_clk);
    let high_min = cycles(figures.t_high_ns, ip_clk);
    let (sclh, scll) = match speed {
        I2cSpeed::Standard => {
            let sclh = high_min.max(total / 2);
            let scll = low_min.max(total.saturating_sub(sclh));
            if sclh + scll > total {
                let scll = total * 55 / 100;
                (total - scll, scll)
            } else {
                (sclh, scll)
            }
        }
        I2cSpeed::Fast | I2cSpeed::FastPlus => {
            let scll = low_min.max(total * 2 / 3);
            let sclh = total.saturating_sub(scll);
            if sclh < high_min {
                (high_min, total.saturating_sub(high_min))
            } else {
                (sclh, scll)
            }
        }
    };

    let clk_ns = 1_000_000_000 / ip_clk;
    let unit = (psc + 1) * clk_ns;
    let scl_dely = ((figures.t_su_dat_ns + unit / 2) / unit).saturating_sub(1);
    // Digital noise filter off: the SDA path adds three kernel clocks.
    let sda_window = figures.t_vd_dat_ns + figures.t_af_ns;
    let sda_dely = match sda_window.checked_sub(3 * clk_ns) {
        Some(window) => (window + unit / 2) / unit,
        None => 0,
    };

    Ok(AddTiming {
        psc,
        sclh: sclh.clamp(1, 0xFF),
        scll: scll.clamp(1, 0xFF),
        scl_dely: scl_dely.clamp(1, 0x0F),
        sda_dely: sda_dely.clamp(1, 0x0F),
    })
}
