use std::process::ExitCode;

use getsram::args::{self, ArgError, Step};
use getsram::config::Config;
use getsram::sram::XscomSram;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .format_timestamp_micros()
        .init();

    let steps = match args::resolve(std::env::args_os()) {
        Ok(steps) => steps,
        Err(ArgError::Usage(err)) => {
            err.print().ok();
            return ExitCode::FAILURE;
        }
        Err(err @ ArgError::MissingAddress) => {
            eprintln!("{}", err);
            print!("{}", args::USAGE);
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    for step in steps {
        match step {
            Step::PrintVersion => println!("{}", getsram::version_line()),
            Step::PrintHelp => print!("{}", args::USAGE),
            Step::Read(request) => {
                let mut bus = XscomSram::new(Config::from_env());

                match getsram::read(&mut bus, &request) {
                    Ok(reading) => println!("{}", reading),
                    Err(err) => {
                        eprintln!("{}", err);
                        return ExitCode::FAILURE;
                    }
                }
            }
        }
    }

    ExitCode::SUCCESS
}
