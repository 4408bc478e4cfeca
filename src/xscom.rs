use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc::off_t;
use nix::sys::stat::Mode;
use nix::sys::uio::{pread, pwrite};
use nix::unistd::close;
use thiserror::Error;

use std::fs;
use std::os::unix::prelude::RawFd;
use std::path::Path;

use crate::{ChipId, Status};

const REG_SIZE: usize = std::mem::size_of::<u64>();

#[derive(Debug, Error)]
pub enum XscomError {
    #[error("no XSCOM access for chip {0}")]
    NoSuchChip(ChipId),
    #[error("XSCOM transfer failed: {0}")]
    Io(#[from] Errno),
    #[error("short XSCOM transfer ({0} of 8 bytes)")]
    ShortTransfer(usize),
}

impl Status for XscomError {
    /// Negative errno, the way the debugfs driver reports failures.
    fn code(&self) -> i32 {
        let errno = match self {
            XscomError::NoSuchChip(_) => Errno::ENODEV,
            XscomError::Io(Errno::UnknownErrno) => Errno::EIO,
            XscomError::Io(errno) => *errno,
            XscomError::ShortTransfer(_) => Errno::EIO,
        };
        -(errno as i32)
    }
}

/// Translate a SCOM address into a debugfs file offset.
///
/// The indirect-mode nibble at the top of the address would be lost by the
/// shift below, so it is moved down into bits 56..60 first.
pub fn mangle_address(address: u64) -> u64 {
    let indirect = (address & 0xf000_0000_0000_0000) >> 4;
    ((address & 0x00ff_ffff_ffff_ffff) | indirect) << 3
}

struct XscomChip {
    id: ChipId,
    fd: RawFd,
}

impl XscomChip {
    fn open(id: ChipId, path: &Path) -> Result<XscomChip, Errno> {
        let fd = open(path, OFlag::O_RDWR, Mode::empty())?;

        Ok(XscomChip { id, fd })
    }
}

impl Drop for XscomChip {
    fn drop(&mut self) {
        close(self.fd).ok();
    }
}

/// Per-chip XSCOM access through the powerpc debugfs tree.
pub struct Xscom {
    chips: Vec<XscomChip>,
}

impl Xscom {
    /// Scan `root` for chip directories and open their `access` files.
    ///
    /// An unreadable root yields an empty chip table rather than an error:
    /// the caller only cares whether a default chip exists.
    pub fn open(root: &Path) -> Xscom {
        let mut chips = Vec::new();

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Can't read {}: {}", root.display(), err);
                return Xscom { chips };
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let id = match name.to_str().and_then(|n| u32::from_str_radix(n, 16).ok()) {
                Some(id) => ChipId(id),
                None => continue,
            };

            let access = entry.path().join("access");
            match XscomChip::open(id, &access) {
                Ok(chip) => {
                    debug!("Found XSCOM chip {} at {}", id, access.display());
                    chips.push(chip);
                }
                Err(err) => warn!("Can't open {}: {}", access.display(), err),
            }
        }

        chips.sort_by_key(|chip| chip.id);
        Xscom { chips }
    }

    /// The lowest chip id present, if any chip was found.
    pub fn default_chip(&self) -> Option<ChipId> {
        self.chips.first().map(|chip| chip.id)
    }

    pub fn chip_ids(&self) -> impl Iterator<Item = ChipId> + '_ {
        self.chips.iter().map(|chip| chip.id)
    }

    fn find(&self, id: ChipId) -> Result<&XscomChip, XscomError> {
        self.chips
            .iter()
            .find(|chip| chip.id == id)
            .ok_or(XscomError::NoSuchChip(id))
    }

    pub fn read(&self, chip: ChipId, address: u64) -> Result<u64, XscomError> {
        let fd = self.find(chip)?.fd;
        let offset = mangle_address(address);
        let mut buffer = [0u8; REG_SIZE];

        let len = pread(fd, &mut buffer, offset as off_t)?;
        if len != REG_SIZE {
            return Err(XscomError::ShortTransfer(len));
        }

        let value = u64::from_ne_bytes(buffer);
        debug!("xscom read chip {} {:#x} (offset {:#x}) = {:#x}", chip, address, offset, value);
        Ok(value)
    }

    pub fn write(&self, chip: ChipId, address: u64, value: u64) -> Result<(), XscomError> {
        let fd = self.find(chip)?.fd;
        let offset = mangle_address(address);

        debug!("xscom write chip {} {:#x} (offset {:#x}) = {:#x}", chip, address, offset, value);
        let len = pwrite(fd, &value.to_ne_bytes(), offset as off_t)?;
        if len != REG_SIZE {
            return Err(XscomError::ShortTransfer(len));
        }

        Ok(())
    }
}
