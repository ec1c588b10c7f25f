//! Clock-mode detection.
//!
//! [`clk_detect`] figures out whether the Si5326 currently sees a
//! valid reference clock, and if so, whether it's strapped for
//! wide-band or narrow-band operation, without disturbing register 0
//! on exit.

use std::time::Duration;

use crate::device::port::DeviceHandle;
use crate::sleeper::Sleeper;
use crate::types::ClockMode;

const REG_RESET: u32 = 136;
const REG_FREE_RUN: u32 = 0;
const REG_STATUS: u32 = 129;

const RESET_BIT: u8 = 0x80;
const FREE_RUN_BIT: u32 = 0x40;

/// Reset the Si5326, check for a missing reference, then briefly force
/// free-run mode to read back the wide/narrow-band strap bit.
/// Register 0 is restored to its original value before returning.
pub fn clk_detect(handle: &DeviceHandle<impl Sleeper>, sleeper: &impl Sleeper) -> crate::error::Result<ClockMode> {
    handle.si5326_wr(REG_RESET, RESET_BIT)?;
    sleeper.sleep_at_least(Duration::from_millis(200));

    let status = handle.si5326_rd(REG_STATUS)?;
    if status & 0x1 != 0 {
        return Ok(ClockMode::NoReference);
    }

    let reg0 = handle.si5326_rd(REG_FREE_RUN)?;
    handle.si5326_wr(REG_FREE_RUN, (reg0 as u32 | FREE_RUN_BIT) as u8)?;
    sleeper.sleep_at_least(Duration::from_millis(200));

    let status = handle.si5326_rd(REG_STATUS)?;
    let mode = if status & 0x4 != 0 {
        ClockMode::WideBand
    } else {
        ClockMode::NarrowBand
    };

    handle.si5326_wr(REG_FREE_RUN, reg0 as u8)?;
    sleeper.sleep_at_least(Duration::from_millis(200));

    Ok(mode)
}
