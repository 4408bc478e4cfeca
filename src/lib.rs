use log::debug;
use thiserror::Error;

use std::fmt;

pub mod args;
pub mod config;
pub mod sram;
pub mod xscom;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_line() -> String {
    format!("xscom utils version {}", VERSION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChipId(pub u32);

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One of the four OCB channels, always in `0..=3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccChannel(u8);

impl OccChannel {
    pub fn new(channel: i64) -> Option<OccChannel> {
        match channel {
            0..=3 => Some(OccChannel(channel as u8)),
            _ => None,
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for OccChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u64,
    /// `None` means use the chip found by discovery.
    pub chip: Option<ChipId>,
    pub channel: OccChannel,
}

/// Driver status carried by a failed bus access.
pub trait Status {
    fn code(&self) -> i32;
}

/// The bus primitives a register read needs.
pub trait SramBus {
    type Error: Status + fmt::Display;

    fn discover_default_chip(&mut self) -> Option<ChipId>;

    fn read_sram(
        &mut self,
        chip: ChipId,
        channel: OccChannel,
        address: u64,
    ) -> Result<u64, Self::Error>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("No valid XSCOM chip found")]
    NoChip,
    #[error("Error {code} reading XSCOM")]
    Bus { code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub channel: OccChannel,
    pub value: u64,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCC{}: {:x}", self.channel, self.value)
    }
}

/// Perform the single register read described by `request`.
///
/// Discovery always runs first, even with an explicit chip, so a dead bus
/// is reported before any access is attempted.
pub fn read<B: SramBus>(bus: &mut B, request: &ReadRequest) -> Result<Reading, ReadError> {
    let default_chip = bus.discover_default_chip().ok_or(ReadError::NoChip)?;
    let chip = request.chip.unwrap_or(default_chip);

    debug!(
        "reading OCC{} {:#x} on chip {} (default {})",
        request.channel, request.address, chip, default_chip
    );

    let value = bus
        .read_sram(chip, request.channel, request.address)
        .map_err(|err| {
            debug!("{}", err);
            ReadError::Bus { code: err.code() }
        })?;

    Ok(Reading {
        channel: request.channel,
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::Rng;

    use super::*;
    use crate::args::{resolve, Step};

    #[derive(Debug)]
    struct FakeError(i32);

    impl Status for FakeError {
        fn code(&self) -> i32 {
            self.0
        }
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake status {}", self.0)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Discover,
        Read(ChipId, u8, u64),
    }

    #[derive(Default)]
    struct FakeBus {
        default_chip: Option<ChipId>,
        status: i32,
        memory: HashMap<(ChipId, u8, u64), u64>,
        calls: Vec<Call>,
    }

    impl SramBus for FakeBus {
        type Error = FakeError;

        fn discover_default_chip(&mut self) -> Option<ChipId> {
            self.calls.push(Call::Discover);
            self.default_chip
        }

        fn read_sram(
            &mut self,
            chip: ChipId,
            channel: OccChannel,
            address: u64,
        ) -> Result<u64, FakeError> {
            self.calls.push(Call::Read(chip, channel.get(), address));
            if self.status != 0 {
                return Err(FakeError(self.status));
            }
            Ok(self
                .memory
                .get(&(chip, channel.get(), address))
                .copied()
                .unwrap_or(0))
        }
    }

    fn read_request(args: &[&str]) -> ReadRequest {
        let planned = resolve(std::iter::once("getsram").chain(args.iter().copied())).unwrap();
        match planned.as_slice() {
            [Step::Read(request)] => request.clone(),
            other => panic!("expected a single read, got {:?}", other),
        }
    }

    #[test]
    fn reads_on_discovered_chip() {
        let mut bus = FakeBus {
            default_chip: Some(ChipId(7)),
            ..Default::default()
        };
        bus.memory.insert((ChipId(7), 2, 0x1000), 0xdeadbeef);

        let reading = read(&mut bus, &read_request(&["-n", "2", "1000"])).unwrap();

        assert_eq!(reading.to_string(), "OCC2: deadbeef");
        assert_eq!(
            bus.calls,
            vec![Call::Discover, Call::Read(ChipId(7), 2, 0x1000)]
        );
    }

    #[test]
    fn explicit_chip_still_discovers() {
        let mut bus = FakeBus {
            default_chip: Some(ChipId(0)),
            ..Default::default()
        };

        read(&mut bus, &read_request(&["--chip", "3", "20"])).unwrap();

        assert_eq!(bus.calls, vec![Call::Discover, Call::Read(ChipId(3), 0, 0x20)]);
    }

    #[test]
    fn no_chip_found() {
        let mut bus = FakeBus::default();
        let mut rng = rand::thread_rng();

        let request = ReadRequest {
            address: rng.gen(),
            chip: Some(ChipId(rng.gen())),
            channel: OccChannel::new(rng.gen_range(0..=3)).unwrap(),
        };
        let err = read(&mut bus, &request).unwrap_err();

        assert_eq!(err, ReadError::NoChip);
        assert_eq!(err.to_string(), "No valid XSCOM chip found");
        assert_eq!(bus.calls, vec![Call::Discover]);
    }

    #[test]
    fn bus_status_is_reported_verbatim() {
        for status in [5, -5, -19] {
            let mut bus = FakeBus {
                default_chip: Some(ChipId(0)),
                status,
                ..Default::default()
            };

            let err = read(&mut bus, &read_request(&["ff"])).unwrap_err();

            assert_eq!(err, ReadError::Bus { code: status });
            assert_eq!(err.to_string(), format!("Error {} reading XSCOM", status));
        }
    }

    #[test]
    fn reading_format() {
        let reading = Reading {
            channel: OccChannel::new(0).unwrap(),
            value: 0x00ab_0000_0000_0000,
        };
        assert_eq!(reading.to_string(), "OCC0: ab000000000000");
    }

    #[test]
    fn channel_range() {
        assert!((0..=3).all(|n| OccChannel::new(n).is_some()));
        assert_eq!(OccChannel::new(4), None);
        assert_eq!(OccChannel::new(-1), None);
        assert_eq!(OccChannel::new(i64::MIN), None);
        assert_eq!(OccChannel::default().get(), 0);
    }

    #[test]
    fn version() {
        assert_eq!(version_line(), format!("xscom utils version {}", env!("CARGO_PKG_VERSION")));
    }
}
