//! FPGA register offsets.
//!
//! Most of these names are taken verbatim from the reference driver's
//! register map; their numeric values are not visible in the portion
//! of the driver this crate was built from (they live in a vendor
//! header that was not part of the retrieved source), so the values
//! below are this crate's own placement — internally consistent, but
//! see `DESIGN.md` for the open question this leaves. `SIS8300_QSPI_REG`
//! and the three "StripBPM"/harlink registers are the exception: their
//! values are quoted directly from the reference driver.

use bitflags::bitflags;

/// `nsmpl/16 - 1` sample count, in blocks of 16.
pub const SAMPLE_LENGTH_REG: u32 = 0x000;

/// Per-channel start address; add the zero-based channel index.
pub const SAMPLE_START_ADDRESS_CH1_REG: u32 = 0x004;

/// Low 10 bits mask per-channel disables; bit 11 enables the external
/// trigger.
pub const SAMPLE_CONTROL_REG: u32 = 0x02c;

/// Arm/idle acquisition control.
pub const ACQUISITION_CONTROL_STATUS_REG: u32 = 0x030;

/// Clock distribution MUX layout register.
pub const CLOCK_DISTRIBUTION_MUX_REG: u32 = 0x034;

/// ADC SPI transaction window.
pub const ADC_SPI_REG: u32 = 0x038;

/// AD9510 distribution-divider SPI transaction window.
pub const AD9510_SPI_REG: u32 = 0x03c;

/// Si5326 ("clock multiplier") SPI transaction window.
pub const CLOCK_MULTIPLIER_SPI_REG: u32 = 0x040;

/// ADC input tap delay plus ADC-pair mask.
pub const ADC_INPUT_TAP_DELAY_REG: u32 = 0x044;

/// Pretrigger delay; always zeroed by setup.
pub const PRETRIGGER_DELAY_REG: u32 = 0x048;

/// Firmware capability/option bits; bit 2 is `DUAL_CHANNEL_SAMPLING`.
pub const FIRMWARE_OPTIONS_REG: u32 = 0x04c;

/// Firmware identifier/version.
pub const IDENTIFIER_VERSION_REG: u32 = 0x050;

/// External trigger harlink routing control.
pub const HARLINK_IN_OUT_CONTROL_REG: u32 = 0x054;

/// QSPI passthrough data register, quoted verbatim from the reference
/// driver (`#define SIS8300_QSPI_REG 0x400`).
pub const SIS8300_QSPI_REG: u32 = 0x400;

/// Site marker low word, expected to read the ASCII bytes `"Stri"`.
pub const STRIP_BPM_MARKER_LO_REG: u32 = 0x4fc;

/// Site marker high word, expected to read the ASCII bytes `"pBPM"`.
pub const STRIP_BPM_MARKER_HI_REG: u32 = 0x4fd;

/// Site-specific RTM trigger enable, written when the marker matches.
pub const SITE_TRIGGER_ENABLE_REG: u32 = 0x405;

bitflags! {
    /// Bits of [`FIRMWARE_OPTIONS_REG`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FirmwareOptions: u32 {
        /// Firmware only supports dual-channel (as opposed to
        /// single-channel) sampling.
        const DUAL_CHANNEL_SAMPLING = 0x4;
    }

    /// Bits of [`SAMPLE_CONTROL_REG`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SampleControl: u32 {
        /// All ten per-channel disable bits.
        const CHANNEL_MASK = 0x3ff;
        /// Enables the external trigger.
        const EXTTRIG = 0x800;
    }
}

/// Bit in [`FIRMWARE_OPTIONS_REG`] indicating the firmware only
/// supports dual-channel (as opposed to single-channel) sampling.
pub const DUAL_CHANNEL_SAMPLING_BIT: u32 = FirmwareOptions::DUAL_CHANNEL_SAMPLING.bits();

/// Bit in [`SAMPLE_CONTROL_REG`] enabling the external trigger.
pub const SAMPLE_CONTROL_EXTTRIG_BIT: u32 = SampleControl::EXTTRIG.bits();

/// Mask of all ten per-channel disable bits in
/// [`SAMPLE_CONTROL_REG`].
pub const SAMPLE_CONTROL_CHANNEL_MASK: u32 = SampleControl::CHANNEL_MASK.bits();

/// 32-bit little-endian packing of four ASCII bytes, matching the
/// reference driver's `CHTO32` macro.
pub const fn ch_to_u32(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_bpm_marker_matches_ascii() {
        assert_eq!(ch_to_u32(b'S', b't', b'r', b'i'), 0x6972_7453);
        assert_eq!(ch_to_u32(b'p', b'B', b'P', b'M'), 0x4d50_4270);
    }
}
