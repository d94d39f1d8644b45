mod args;
mod tally;

use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    debug!("args: {:?}", args);

    let res = match &args.command {
        Command::Tally(tally_args) => tally::run_tally(tally_args),
        Command::Validate { survey } => tally::run_validate(survey),
        Command::Check { survey, answers } => tally::run_check(survey, answers),
    };

    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        for cause in e.iter_chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
