use super::RegisterBus;
use crate::error::{Error, Result};
use crate::sysfs::SysfsRoot;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;

/// `I2C_SLAVE` from linux/i2c-dev.h.
const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// A Linux i2c-dev character device bound to one slave address.
pub struct LinuxI2c {
    file: File,
    device: PathBuf,
}

impl LinuxI2c {
    /// Open `/dev/i2c-<bus>` under `root` and select `address`.
    pub fn open(root: &SysfsRoot, bus: u8, address: u16) -> Result<Self> {
        let device = root.path(format!("dev/i2c-{}", bus));
        let file = File::options()
            .read(true)
            .write(true)
            .open(&device)
            .map_err(|e| Error::I2c {
                device: device.clone(),
                source: e,
            })?;

        // SAFETY: the fd is owned by `file` and stays open for the call;
        // I2C_SLAVE takes the address by value.
        unsafe { i2c_set_slave(file.as_raw_fd(), address as nix::libc::c_int) }.map_err(|e| {
            Error::I2c {
                device: device.clone(),
                source: std::io::Error::from(e),
            }
        })?;

        log::debug!("opened {} at 0x{:02x}", device.display(), address);
        Ok(Self { file, device })
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::I2c {
            device: self.device.clone(),
            source,
        }
    }
}

impl RegisterBus for LinuxI2c {
    /// Write the register pointer, then read two bytes MSB first.
    fn read_word(&mut self, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.file
            .write_all(&[register])
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|e| self.io_error(e))?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Register pointer followed by the word, MSB first, in one transfer.
    fn write_word(&mut self, register: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.file
            .write_all(&[register, hi, lo])
            .map_err(|e| self.io_error(e))
    }
}
