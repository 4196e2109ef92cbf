//! Error taxonomy for per-device failures and fatal startup failures.

use std::io;

use thiserror::Error;

/// Failure affecting a single backlight or input device.
///
/// These never stop the daemon: the registry logs them and carries on with
/// the remaining devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot initialise {path}: {source}")]
    Init {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {attr} of {path}: {source}")]
    Read {
        path: String,
        attr: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {attr} of {path}: {source}")]
    Write {
        path: String,
        attr: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{path}: brightness {raw} outside 0..={max}")]
    Range { path: String, raw: i64, max: u64 },

    #[error("{path}: brightness arithmetic overflowed")]
    Overflow { path: String },
}

/// Fatal failure before the reactor starts.
///
/// Each variant maps to its own process exit code.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create hotplug channel: {0}")]
    Channel(#[source] io::Error),

    #[error("failed to install hotplug subsystem filter: {0}")]
    Filter(#[source] io::Error),

    #[error("failed to enable hotplug receiving: {0}")]
    Enable(#[source] io::Error),

    #[error("initial device scan failed: {0}")]
    Scan(#[source] io::Error),

    #[error("invalid configuration: {0:#}")]
    Config(#[source] anyhow::Error),
}

impl StartupError {
    /// Process exit code for this failure.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Channel(_) => 3,
            Self::Filter(_) => 4,
            Self::Enable(_) => 5,
            Self::Scan(_) => 6,
            Self::Config(_) => 7,
        }
    }
}
