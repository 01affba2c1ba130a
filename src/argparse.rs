use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub fn parse() -> Cli {
    Cli::parse()
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Turn console debugging information on
    #[arg(short, long)]
    pub console: bool,

    /// Log to a file
    #[arg(short, long, value_name = "FILE", default_value = "rtdctl.log")]
    pub log_file: PathBuf,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the poll/control loop
    Run {
        /// Serial device name pattern to look for
        #[arg(short, long, default_value = rtdctl::link::DEFAULT_PATTERN)]
        pattern: String,

        /// Serial line speed
        #[arg(short, long, default_value_t = rtdctl::BAUD_RATE)]
        baud: u32,
    },

    /// Apply pending database migrations and exit
    Migrate {},
}
