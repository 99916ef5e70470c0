use clap::Parser;
use std::path::PathBuf;

use crate::core::year::{FULL_END, FULL_START};

// Build version with timeline info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Range:  ", FULL_START, "..=", FULL_END, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Historical map timeline engine (headless)
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Provider catalog (JSON). The built-in demo catalog is used when omitted
    #[arg(short = 'C', long = "catalog", value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Context to activate (e.g. population, race, narrative)
    #[arg(short = 'x', long = "context", value_name = "NAME")]
    pub context: Option<String>,

    /// Requested start year (snapped to the nearest year with data)
    #[arg(short = 'y', long = "year", value_name = "YEAR")]
    pub year: Option<i32>,

    /// Zoom in N times around the current year
    #[arg(short = 'z', long = "zoom-in", value_name = "N", default_value = "0")]
    pub zoom_in: u32,

    /// Start playback
    #[arg(short = 'p', long = "play")]
    pub play: bool,

    /// Playback steps to simulate
    #[arg(short = 't', long = "ticks", value_name = "N", default_value = "10")]
    pub ticks: usize,

    /// Enable debug logging to file (default: timemap.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
