use clap::{ArgAction, Parser};
use thiserror::Error;

use std::ffi::OsString;
use std::num::IntErrorKind;

use crate::{ChipId, OccChannel, ReadRequest};

pub const USAGE: &str = "\
usage: getsram [-c|--chip chip-id] addr
               [--occ-channel|n <chan>]
       getsram -v|--version
";

#[derive(Parser, Debug)]
#[clap(name = "getsram", disable_help_flag = true, disable_version_flag = true)]
struct Args {
    #[clap(short, long, value_name = "chip-id", value_parser = parse_integer)]
    chip: Option<u32>,
    #[clap(
        short = 'n',
        long,
        value_name = "chan",
        allow_hyphen_values = true,
        value_parser = parse_channel
    )]
    occ_channel: Option<i64>,
    #[clap(short, long, action)]
    help: bool,
    #[clap(short = 'v', long, action)]
    version: bool,
    /// Only the last address given is used.
    #[clap(value_name = "addr", value_parser, action = ArgAction::Append, multiple_values = true)]
    address: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ArgError {
    #[error(transparent)]
    Usage(#[from] clap::Error),
    #[error("occ-channel out of range 0 <= c <= 3")]
    ChannelOutOfRange(i64),
    #[error("Invalid or missing address")]
    MissingAddress,
}

/// What an invocation asks for, in the order it must happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    PrintVersion,
    PrintHelp,
    Read(ReadRequest),
}

/// C-style base detection: `0x` hex, leading `0` octal, else decimal.
fn split_radix(s: &str) -> (&str, u32) {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    }
}

pub fn parse_integer(s: &str) -> Result<u32, String> {
    let (digits, radix) = split_radix(s);

    u32::from_str_radix(digits, radix).map_err(|err| format!("{}: {}", s, err))
}

/// Signed channel number, saturating at the `i64` limits so that any
/// well-formed number reaches the range check instead of failing here.
pub fn parse_channel(s: &str) -> Result<i64, String> {
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (digits, radix) = split_radix(magnitude);

    let value = match u64::from_str_radix(digits, radix) {
        Ok(value) => i64::try_from(value).unwrap_or(i64::MAX),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(err) => return Err(format!("{}: {}", s, err)),
    };

    Ok(if negative { -value } else { value })
}

/// Hexadecimal address, `0x` prefix optional.
pub fn parse_address(s: &str) -> Option<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    u64::from_str_radix(digits, 16).ok()
}

/// Turn the command line into the ordered steps of this invocation.
///
/// Version comes before help, and a read is only planned when an address
/// was given. Without an address at least one of the two flags is required.
pub fn resolve<I, T>(args: I) -> Result<Vec<Step>, ArgError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::try_parse_from(args)?;

    let channel = match args.occ_channel {
        Some(n) => OccChannel::new(n).ok_or(ArgError::ChannelOutOfRange(n))?,
        None => OccChannel::default(),
    };
    let address = args.address.last().and_then(|token| parse_address(token));

    if address.is_none() && !args.version && !args.help {
        return Err(ArgError::MissingAddress);
    }

    let mut steps = Vec::new();
    if args.version {
        steps.push(Step::PrintVersion);
    }
    if args.help {
        steps.push(Step::PrintHelp);
    }
    if let Some(address) = address {
        steps.push(Step::Read(ReadRequest {
            address,
            chip: args.chip.map(ChipId),
            channel,
        }));
    }

    Ok(steps)
}
