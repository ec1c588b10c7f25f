//! Top-level digitizer setup sequence.
//!
//! [`digi_setup`] composes the PLL, distribution divider, and ADC
//! front end into the order the hardware requires: safe-low-frequency
//! init first, then PLL programming (or a 250 MHz fallback), then the
//! requested divider ratio, then ADC format and the acquisition
//! control registers.

use std::time::Duration;

use crate::config::DigiConfig;
use crate::device::port::{DeviceHandle};
use crate::device::registers::*;
use crate::device::pll::si5326_setup;
use crate::error::{DigiError, Result};
use crate::sleeper::Sleeper;
use crate::types::{ChannelSelector, FirmwareCaps, Si5326Parms};

/// `SIS8300_BYPASS_9510_DIVIDER`: the `clkhl` sentinel selecting
/// divider bypass instead of a programmed ratio.
pub const BYPASS_9510_DIVIDER: u32 = 0xffff_ffff;

const AD9510_SYNC_FUNCTION_SELECT: u8 = 0x22;
const AD9510_FUNCTION_PULSE: u32 = 0x0000_0001;

/// ADC chip ID/speed-grade lookup, per §4.F step 6. Not present in the
/// retrieved reference driver; implemented directly from the written
/// requirement.
fn adc_max_clock_hz(chip_id: u32, grade: u32) -> Option<u64> {
    match (chip_id, grade) {
        // AD9268
        (0x68, 1) => Some(125_000_000),
        (0x68, 2) => Some(105_000_000),
        (0x68, 3) => Some(80_000_000),
        // AD9643
        (0x43, 0) => Some(250_000_000),
        (0x43, 1) => Some(210_000_000),
        (0x43, 3) => Some(170_000_000),
        _ => None,
    }
}

/// Bit in the ADC output-mode register (0x14) selecting 16-bit
/// left-adjust output in place of the chip's native 14-bit word. Not
/// present in the retrieved reference driver; see `DESIGN.md`'s open
/// questions.
const ADC_FORMAT_LEFT_ADJUST_BIT: u8 = 0x08;

fn adc_setup(handle: &DeviceHandle<impl Sleeper>, inst: u32) -> Result<()> {
    handle.adc_wr(inst, 0x14, 0x41)?;
    handle.adc_wr(inst, 0x16, 0x00)?;
    handle.adc_wr(inst, 0x17, 0x00)?;
    handle.adc_wr(inst, 0xff, 0x01)
}

/// Switch one ADC instance from its native 14-bit word to 16-bit
/// left-adjust output, for chip/firmware combinations that support it.
fn adc_enable_left_adjust(handle: &DeviceHandle<impl Sleeper>, inst: u32) -> Result<()> {
    handle.adc_wr(inst, 0x14, 0x41 | ADC_FORMAT_LEFT_ADJUST_BIT)?;
    handle.adc_wr(inst, 0xff, 0x01)
}

fn ad9510_setup(handle: &DeviceHandle<impl Sleeper>, i: u32, clkhl: u32) -> Result<()> {
    let clkhl_byte = (clkhl & 0xff) as u8;
    let bypass = clkhl > 0xff;
    let bypss: u8 = if bypass { 0x80 } else { 0x00 };

    handle.ad9510_wr(i, 0x00, 0xb0)?; // soft reset
    handle.ad9510_wr(i, 0x00, 0x90)?; // clear reset
    handle.ad9510_wr(i, 0xa0, 0x01)?;

    // power down outputs 0-3
    handle.ad9510_wr(i, 0x3c, 0x0b)?;
    handle.ad9510_wr(i, 0x3d, 0x0b)?;
    handle.ad9510_wr(i, 0x3e, 0x0b)?;
    handle.ad9510_wr(i, 0x3f, 0x0b)?;

    // LVDS @ 3.5mA, outputs 4-7
    handle.ad9510_wr(i, 0x40, 0x02)?;
    handle.ad9510_wr(i, 0x41, 0x02)?;
    handle.ad9510_wr(i, 0x42, 0x02)?;
    handle.ad9510_wr(i, 0x43, 0x02)?;

    // power down refin/prescaler/clk2
    handle.ad9510_wr(i, 0x45, 0x1d)?;

    // out-4 divider: chip #2 (i == 1) is pinned to the vendor
    // reference's undocumented 0xC0/0x00 pair; chip #1 gets the
    // requested clkhl/bypss.
    if i != 0 {
        handle.ad9510_wr(i, 0x50, 0x00)?;
        handle.ad9510_wr(i, 0x51, 0xc0)?;
    } else {
        handle.ad9510_wr(i, 0x50, clkhl_byte)?;
        handle.ad9510_wr(i, 0x51, bypss)?;
    }

    handle.ad9510_wr(i, 0x52, clkhl_byte)?;
    handle.ad9510_wr(i, 0x53, bypss)?;
    handle.ad9510_wr(i, 0x54, clkhl_byte)?;
    handle.ad9510_wr(i, 0x55, bypss)?;
    handle.ad9510_wr(i, 0x56, clkhl_byte)?;
    handle.ad9510_wr(i, 0x57, bypss)?;

    handle.ad9510_wr(i, 0x58, AD9510_SYNC_FUNCTION_SELECT)?;
    handle.ad9510_wr(i, 0x5a, 0x01) // UPDATE
}

/// Drive the whole digitizer setup sequence: `maybe_parms` supplies a
/// PLL configuration to program, or `None` to leave the PLL at its
/// current (presumed 250 MHz reference) state; `clkhl` is the AD9510
/// divider pattern, `BYPASS_9510_DIVIDER` bypasses it entirely.
pub fn digi_setup(
    handle: &DeviceHandle<impl Sleeper>,
    maybe_parms: Option<&Si5326Parms>,
    clkhl: u32,
    exttrig: bool,
    config: &DigiConfig,
    sleeper: &impl Sleeper,
) -> Result<()> {
    let options = FirmwareOptions::from_bits_retain(handle.reg_read(FIRMWARE_OPTIONS_REG)?);
    if options.contains(FirmwareOptions::DUAL_CHANNEL_SAMPLING) {
        return Err(DigiError::BadFirmware {
            message: "firmware supports only dual-channel sampling".into(),
            version: (handle.reg_read(IDENTIFIER_VERSION_REG)? & 0xffff) as u16,
        });
    }

    // Safe-low-frequency init: both chips at maximum divider before
    // anything else is touched.
    ad9510_setup(handle, 0, 0xff)?;
    ad9510_setup(handle, 1, 0xff)?;

    handle.reg_write(CLOCK_DISTRIBUTION_MUX_REG, 0x03f)?;

    let fout = if let Some(parms) = maybe_parms {
        let fout = si5326_setup(handle, parms, sleeper)?;
        tracing::info!(fout, "PLL locked");
        fout
    } else {
        250_000_000
    };

    let ratio: u64 = if clkhl > 0xff {
        1
    } else {
        ((clkhl & 0xf) + ((clkhl >> 4) & 0xf) + 2) as u64
    };
    let digitizer_clock = fout / ratio;

    let chip_id = handle.adc_rd(0, 0x01)?;
    let grade = handle.adc_rd(0, 0x02)?;
    if let Some(max) = adc_max_clock_hz(chip_id, grade) {
        if digitizer_clock > max {
            return Err(DigiError::OverClocked {
                clock: digitizer_clock,
                max,
                grade: grade as u8,
            });
        }
    }

    let firmware = FirmwareCaps::new((handle.reg_read(IDENTIFIER_VERSION_REG)? & 0xffff) as u16);

    let tap_delay: u32 = if digitizer_clock > 130_000_000 { 11 } else { 0 };
    handle.reg_write(ADC_INPUT_TAP_DELAY_REG, tap_delay | firmware.tap_delay_mask())?;
    let mut busy = true;
    for _ in 0..10_000 {
        let status = handle.reg_read(ADC_INPUT_TAP_DELAY_REG)?;
        if status & 0x8000_0000 == 0 {
            busy = false;
            break;
        }
    }
    if busy {
        return Err(DigiError::Timeout {
            machine: "adc_tap_delay",
            retries: 10_000,
        });
    }

    let instances: u32 = if firmware.is_eight_channel() { 4 } else { 5 };
    for inst in 0..instances {
        adc_setup(handle, inst)?;
    }
    if firmware.supports_bit_shift() {
        for inst in 0..instances {
            adc_enable_left_adjust(handle, inst)?;
        }
    }

    handle.reg_write(CLOCK_DISTRIBUTION_MUX_REG, if maybe_parms.is_some() { 0x03f | 0x500 } else { 0x03f })?;

    ad9510_setup(handle, 0, clkhl)?;
    ad9510_setup(handle, 1, clkhl)?;

    const SYNCH_FPGA_CLK69: u32 = 0x0000_0069;
    handle.ad9510_raw(SYNCH_FPGA_CLK69)?;
    sleeper.sleep_at_least(Duration::from_micros(1));
    handle.ad9510_raw(AD9510_FUNCTION_PULSE)?;

    handle.reg_write(PRETRIGGER_DELAY_REG, 0)?;

    let mut cmd = SAMPLE_CONTROL_CHANNEL_MASK; // all channels disabled until armed
    if exttrig {
        cmd |= SAMPLE_CONTROL_EXTTRIG_BIT;
        handle.reg_write(HARLINK_IN_OUT_CONTROL_REG, 0x100)?;
    }
    handle.reg_write(SAMPLE_CONTROL_REG, cmd)?;
    handle.reg_write(ACQUISITION_CONTROL_STATUS_REG, 4)?;

    if config.site_marker_probe {
        let lo = handle.reg_read(STRIP_BPM_MARKER_LO_REG)?;
        let hi = handle.reg_read(STRIP_BPM_MARKER_HI_REG)?;
        if lo == ch_to_u32(b'S', b't', b'r', b'i') && hi == ch_to_u32(b'p', b'B', b'P', b'M') {
            tracing::info!("StripBPM site marker matched, enabling site trigger");
            handle.reg_write(SITE_TRIGGER_ENABLE_REG, 0x10)?;
        }
    }

    Ok(())
}

/// Program the sample count and per-channel start addresses for
/// `sel`, validating `nsmpl` is a multiple of 16.
pub fn set_sample_count(handle: &DeviceHandle<impl Sleeper>, sel: ChannelSelector, nsmpl: u32) -> Result<()> {
    if nsmpl & 0xf != 0 {
        return Err(DigiError::InvalidParam(
            "sample count must be a multiple of 16".into(),
        ));
    }
    let nblks = nsmpl >> 4;
    handle.reg_write(SAMPLE_LENGTH_REG, nblks - 1)?;

    let mut cmd = handle.reg_read(SAMPLE_CONTROL_REG)? | SAMPLE_CONTROL_CHANNEL_MASK;
    let mut addr = 0u32;
    for (_, ch) in sel.iter() {
        handle.reg_write(SAMPLE_START_ADDRESS_CH1_REG + ch as u32, addr)?;
        cmd &= !(1u32 << ch);
        addr += nblks;
    }
    handle.reg_write(SAMPLE_CONTROL_REG, cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad9510_divider_ratio_matches_formula() {
        let clkhl = 0x23u32;
        let ratio = ((clkhl & 0xf) + ((clkhl >> 4) & 0xf) + 2) as u64;
        assert_eq!(ratio, 3 + 2 + 2);
    }

    #[test]
    fn bypass_sentinel_selects_unit_ratio() {
        assert!(BYPASS_9510_DIVIDER > 0xff);
    }

    #[test]
    fn adc_lookup_matches_documented_grades() {
        assert_eq!(adc_max_clock_hz(0x68, 1), Some(125_000_000));
        assert_eq!(adc_max_clock_hz(0x43, 0), Some(250_000_000));
        assert_eq!(adc_max_clock_hz(0x99, 9), None);
    }

    #[test]
    fn left_adjust_bit_set_on_format_register() {
        assert_eq!(0x41 | ADC_FORMAT_LEFT_ADJUST_BIT, 0x49);
    }

    #[test]
    fn bit_shift_gate_matches_firmware_caps() {
        assert!(!FirmwareCaps::new(0x2400).supports_bit_shift());
        assert!(FirmwareCaps::new(0x2402).supports_bit_shift());
    }
}
