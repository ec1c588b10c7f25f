//! Device register access over ioctl.
//!
//! [`DeviceHandle`] owns the open device node and provides the two
//! primitive register operations plus the three nested SPI-like
//! transaction machines (ADC, AD9510, Si5326) that sit on top of them.
//! Every ioctl failure is logged at the boundary via `tracing::error!`
//! and turned into a [`DigiError::DeviceIo`] — nothing here retries an
//! I/O failure; the only retries are busy-waits on SPI status bits.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use crate::error::{DigiError, Result};
use crate::sleeper::{NanoSleeper, Sleeper};

/// Mirrors the reference driver's `sis8300_reg` ioctl payload:
/// `{offset, data}`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct RawReg {
    offset: u32,
    data: u32,
}

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Linux ioctl request-number encoding (`_IOC` in `<asm-generic/ioctl.h>`).
const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    ((dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

const IOCTL_TYPE: u8 = b's';

const SIS8300_REG_READ: libc::c_ulong =
    ioc(IOC_READ | IOC_WRITE, IOCTL_TYPE, 0x01, std::mem::size_of::<RawReg>());
const SIS8300_REG_WRITE: libc::c_ulong =
    ioc(IOC_WRITE, IOCTL_TYPE, 0x02, std::mem::size_of::<RawReg>());
const SIS8300_READ_MODE: libc::c_ulong =
    ioc(IOC_WRITE, IOCTL_TYPE, 0x03, std::mem::size_of::<i32>());
const SIS8300_SET_SIM: libc::c_ulong = ioc(IOC_WRITE, IOCTL_TYPE, 0x11, 16);

/// `DMACHAIN_OFF | ARM | CAL_RED | CAL_GRN`, matching `SIS8300_READ_MODE`'s
/// argument values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmKind {
    DmaChainOff,
    Beam,
    CalRed,
    CalGrn,
}

impl ArmKind {
    fn as_raw(self) -> i32 {
        match self {
            ArmKind::DmaChainOff => -1,
            ArmKind::Beam => 0,
            ArmKind::CalRed => 1,
            ArmKind::CalGrn => 2,
        }
    }
}

/// An open SIS8300 device node plus the sleeper used for every
/// blocking delay in the SPI state machines and PLL setup.
pub struct DeviceHandle<S: Sleeper = NanoSleeper> {
    file: File,
    sleeper: S,
}

impl DeviceHandle<NanoSleeper> {
    /// Open the device node at `path` with the production sleeper.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map_err(|source| DigiError::DeviceIo {
                op: "open",
                offset: 0,
                source,
            })?;
        Ok(DeviceHandle {
            file,
            sleeper: NanoSleeper,
        })
    }
}

impl<S: Sleeper> DeviceHandle<S> {
    /// Wrap an already-open file with an explicit sleeper, for testing
    /// or for callers that need a non-default delay strategy.
    pub fn with_sleeper(file: File, sleeper: S) -> Self {
        DeviceHandle { file, sleeper }
    }

    fn sleep(&self, d: Duration) {
        self.sleeper.sleep_at_least(d);
    }

    /// Read a single register.
    pub fn reg_read(&self, offset: u32) -> Result<u32> {
        let mut r = RawReg { offset, data: 0 };
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), SIS8300_REG_READ, &mut r as *mut RawReg)
        };
        if rc != 0 {
            let source = std::io::Error::last_os_error();
            tracing::error!(offset, %source, "SIS8300_REG_READ failed");
            return Err(DigiError::DeviceIo {
                op: "reg_read",
                offset,
                source,
            });
        }
        Ok(r.data)
    }

    /// Write a single register.
    pub fn reg_write(&self, offset: u32, data: u32) -> Result<()> {
        let r = RawReg { offset, data };
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SIS8300_REG_WRITE, &r as *const RawReg) };
        if rc != 0 {
            let source = std::io::Error::last_os_error();
            tracing::error!(offset, data, %source, "SIS8300_REG_WRITE failed");
            return Err(DigiError::DeviceIo {
                op: "reg_write",
                offset,
                source,
            });
        }
        Ok(())
    }

    /// Switch the card's DMA read-mode (arm for acquisition, or
    /// request a calibration pattern).
    pub fn arm(&self, kind: ArmKind) -> Result<()> {
        let mut cmd = kind.as_raw();
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SIS8300_READ_MODE, &mut cmd as *mut i32) };
        if rc != 0 {
            let source = std::io::Error::last_os_error();
            tracing::error!(?kind, %source, "SIS8300_READ_MODE failed");
            return Err(DigiError::DeviceIo {
                op: "arm",
                offset: 0,
                source,
            });
        }
        Ok(())
    }

    /// Set the four simulation-channel amplitudes.
    pub fn set_sim(&self, a: i32, b: i32, c: i32, d: i32) -> Result<()> {
        let ampl = [a, b, c, d];
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), SIS8300_SET_SIM, ampl.as_ptr())
        };
        if rc != 0 {
            let source = std::io::Error::last_os_error();
            tracing::error!(a, b, c, d, %source, "set_sim ioctl failed");
            return Err(DigiError::DeviceIo {
                op: "set_sim",
                offset: 0,
                source,
            });
        }
        Ok(())
    }

    /// Synchronous QSPI passthrough: optionally write `data_out`,
    /// settle for 2 µs, optionally read back into the return value.
    pub fn qspi_write_read(&self, data_out: Option<u32>, read: bool) -> Result<Option<u32>> {
        if let Some(data) = data_out {
            self.reg_write(crate::device::registers::SIS8300_QSPI_REG, data)?;
            self.sleep(Duration::from_micros(2));
        }
        if read {
            Ok(Some(self.reg_read(crate::device::registers::SIS8300_QSPI_REG)?))
        } else {
            Ok(None)
        }
    }

    /// ADC SPI write: `instance << 24 | addr << 8 | value`. Instance
    /// indices greater than 4 are silently ignored (treated as an
    /// invalid chip index, matching the reference driver).
    pub fn adc_wr(&self, instance: u32, addr: u8, value: u8) -> Result<()> {
        if instance > 4 {
            return Ok(());
        }
        let cmd = (instance << 24) | ((addr as u32) << 8) | value as u32;
        self.reg_write(crate::device::registers::ADC_SPI_REG, cmd)?;
        self.sleep(Duration::from_micros(1));
        Ok(())
    }

    /// ADC SPI read: same packing with the read-command bit
    /// (`0x8000_0000`) set, then busy-poll the status bit up to 100
    /// iterations of 10 µs before fetching the result.
    pub fn adc_rd(&self, instance: u32, addr: u8) -> Result<u32> {
        if instance > 4 {
            return Ok(0);
        }
        let cmd = (instance << 24) | ((addr as u32) << 8) | 0x8000_0000;
        self.reg_write(crate::device::registers::ADC_SPI_REG, cmd)?;

        for _ in 0..100 {
            let status = self.reg_read(crate::device::registers::ADC_SPI_REG)?;
            if status & 0x8000_0000 == 0 {
                return Ok(status & 0xff);
            }
            self.sleep(Duration::from_micros(10));
        }
        Err(DigiError::Timeout {
            machine: "adc",
            retries: 100,
        })
    }

    /// AD9510 write: same packing shape, chip-select bit for the
    /// second chip, 1 µs inter-transfer delay, no busy poll.
    pub fn ad9510_wr(&self, inst: u32, addr: u8, value: u8) -> Result<()> {
        const GENERATE_SPI_RW_CMD: u32 = 0x0000_0000;
        const SPI_SELECT_NO2: u32 = 0x0100_0000;

        let mut cmd = GENERATE_SPI_RW_CMD;
        if inst != 0 {
            cmd |= SPI_SELECT_NO2;
        }
        cmd |= ((addr as u32) << 8) | value as u32;
        self.reg_write(crate::device::registers::AD9510_SPI_REG, cmd)?;
        self.sleep(Duration::from_micros(1));
        Ok(())
    }

    /// Drive the AD9510 SPI register with a raw command word (used for
    /// the post-setup sync pulse pair, which are not address/value
    /// writes).
    pub fn ad9510_raw(&self, cmd: u32) -> Result<()> {
        self.reg_write(crate::device::registers::AD9510_SPI_REG, cmd)?;
        self.sleep(Duration::from_micros(1));
        Ok(())
    }

    /// Busy-wait on the Si5326 SPI state machine, then run `op`. Up to
    /// 10 retries of 10 µs.
    fn si5326_xact(&self, op: impl FnOnce(&Self) -> Result<()>) -> Result<()> {
        for _ in 0..10 {
            let status = self.reg_read(crate::device::registers::CLOCK_MULTIPLIER_SPI_REG)?;
            if status & 0x8000_0000 == 0 {
                return op(self);
            }
            self.sleep(Duration::from_micros(10));
        }
        Err(DigiError::Timeout {
            machine: "si5326",
            retries: 10,
        })
    }

    /// Four-transaction Si5326 register read: write address, issue
    /// read command, re-issue the read command (firmware quirk
    /// workaround), fetch the result.
    pub fn si5326_rd(&self, addr: u32) -> Result<u32> {
        let off = crate::device::registers::CLOCK_MULTIPLIER_SPI_REG;
        self.si5326_xact(|h| h.reg_write(off, addr))?;
        self.si5326_xact(|h| h.reg_write(off, 0x8000))?;
        self.si5326_xact(|h| h.reg_write(off, 0x8000))?;
        let mut result = 0u32;
        self.si5326_xact(|h| {
            result = h.reg_read(off)?;
            Ok(())
        })?;
        Ok(result)
    }

    /// Two-transaction Si5326 register write: write address, then
    /// the write-command word with the value in the low byte.
    pub fn si5326_wr(&self, addr: u32, value: u8) -> Result<()> {
        let off = crate::device::registers::CLOCK_MULTIPLIER_SPI_REG;
        self.si5326_xact(|h| h.reg_write(off, addr))?;
        self.si5326_xact(|h| h.reg_write(off, 0x4000 | value as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_kind_maps_to_driver_constants() {
        assert_eq!(ArmKind::DmaChainOff.as_raw(), -1);
        assert_eq!(ArmKind::Beam.as_raw(), 0);
        assert_eq!(ArmKind::CalRed.as_raw(), 1);
        assert_eq!(ArmKind::CalGrn.as_raw(), 2);
    }

    #[test]
    fn ioctl_numbers_are_distinct() {
        let nums = [
            SIS8300_REG_READ,
            SIS8300_REG_WRITE,
            SIS8300_READ_MODE,
            SIS8300_SET_SIM,
        ];
        for (i, a) in nums.iter().enumerate() {
            for b in &nums[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
