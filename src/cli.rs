use clap::Parser;
use std::path::PathBuf;

/// illumd: backlight brightness daemon driven by the brightness keys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: searched in standard locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Exponent of the perceptual brightness curve (1-3), overrides the config
    #[arg(short = 'l', long = "linearity")]
    pub linearity: Option<u32>,

    /// Brightness step per key press in percent (1-100), overrides the config
    #[arg(short = 's', long = "step")]
    pub step: Option<u8>,

    /// Detach from the terminal and log to syslog
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
