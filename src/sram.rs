//! OCC SRAM access through the OCB indirect address/data registers.

use log::debug;

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::xscom::{Xscom, XscomError};
use crate::{ChipId, OccChannel, SramBus};

const OCB_PIB_BASE_P8: u64 = 0x0006_B000;
const OCB_PIB_BASE_P9: u64 = 0x0006_D000;
const OCB_CHANNEL_STRIDE: u64 = 0x20;

const OCBAR0: u64 = 0x10;
const OCBCSR0_CLEAR: u64 = 0x12;
const OCBDR0: u64 = 0x15;

const OCBCSR_STREAM_MODE: u64 = ppc_bit(4);
const OCBCSR_STREAM_TYPE: u64 = ppc_bit(5);

/// IBM bit numbering: bit 0 is the most significant.
const fn ppc_bit(bit: u32) -> u64 {
    0x8000_0000_0000_0000 >> bit
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Power8,
    Power9,
}

impl Generation {
    pub fn detect(cpuinfo: &Path) -> Generation {
        match fs::read_to_string(cpuinfo) {
            Ok(text) if text.lines().any(|line| line.contains("POWER9")) => Generation::Power9,
            Ok(_) => Generation::Power8,
            Err(err) => {
                debug!("Can't read {}: {}, assuming POWER8", cpuinfo.display(), err);
                Generation::Power8
            }
        }
    }

    fn ocb_base(self) -> u64 {
        match self {
            Generation::Power8 => OCB_PIB_BASE_P8,
            Generation::Power9 => OCB_PIB_BASE_P9,
        }
    }
}

/// Read one 64-bit word of OCC SRAM through the given OCB channel.
pub fn read(
    xscom: &Xscom,
    generation: Generation,
    chip: ChipId,
    channel: OccChannel,
    address: u64,
) -> Result<u64, XscomError> {
    let base = generation.ocb_base() + OCB_CHANNEL_STRIDE * u64::from(channel.get());

    // Linear, non-streaming mode.
    step(
        "reset OCB CSR",
        xscom.write(chip, base + OCBCSR0_CLEAR, OCBCSR_STREAM_MODE | OCBCSR_STREAM_TYPE),
    )?;
    step("set OCB address", xscom.write(chip, base + OCBAR0, address << 32))?;
    step("read OCB data", xscom.read(chip, base + OCBDR0))
}

fn step<T>(what: &str, result: Result<T, XscomError>) -> Result<T, XscomError> {
    if let Err(err) = &result {
        debug!("Failed to {}: {}", what, err);
    }
    result
}

/// [`SramBus`] backed by the host's debugfs XSCOM tree.
pub struct XscomSram {
    config: Config,
    xscom: Option<Xscom>,
}

impl XscomSram {
    pub fn new(config: Config) -> XscomSram {
        XscomSram { config, xscom: None }
    }
}

impl SramBus for XscomSram {
    type Error = XscomError;

    fn discover_default_chip(&mut self) -> Option<ChipId> {
        let xscom = Xscom::open(&self.config.scom_root);
        let chip = xscom.default_chip();

        self.xscom = Some(xscom);
        chip
    }

    fn read_sram(
        &mut self,
        chip: ChipId,
        channel: OccChannel,
        address: u64,
    ) -> Result<u64, XscomError> {
        let root = &self.config.scom_root;
        let xscom = self.xscom.get_or_insert_with(|| Xscom::open(root));
        let generation = Generation::detect(&self.config.cpuinfo);

        read(xscom, generation, chip, channel, address)
    }
}
