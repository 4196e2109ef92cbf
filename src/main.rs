use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::Path,
    process::ExitCode,
};

use anyhow::{Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use illumd::{application::Application, cli::Cli, config::Config, error::StartupError};
use log::{LevelFilter, error, info};
use syslog::{BasicLogger, Facility, Formatter3164};

const RUNTIME_FAILURE: u8 = 1;

/// Receives stdout and stderr once detached.
const DAEMON_LOG: &str = "/run/illumd.log";
const DAEMON_LOG_MODE: u32 = 0o600;
const DAEMON_UMASK: u32 = 0o027;

fn init_syslog(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "illumd".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn init_log(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    if cli.daemonize {
        init_syslog(level)
    } else {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .map_err(|e| anyhow!("{e}"))
    }
}

fn open_daemon_log(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(DAEMON_LOG_MODE)
        .open(path)
}

fn into_daemon() -> Result<()> {
    open_daemon_log(Path::new(DAEMON_LOG))
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{DAEMON_LOG}: {e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .working_directory("/")
                .umask(DAEMON_UMASK)
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn load_config(cli: &Cli) -> Result<Config, StartupError> {
    Config::load(cli.config.as_deref())
        .map(|config| config.with_overrides(cli.linearity, cli.step))
        .map_err(StartupError::Config)
}

fn serve(config: Config) -> Result<()> {
    let app = Application::builder().with_config(config).build()?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(app.run())
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<StartupError>()
        .map_or(RUNTIME_FAILURE, StartupError::exit_code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Forking after the runtime exists would lose its threads and sockets.
    let started = if cli.daemonize {
        into_daemon().and_then(|()| init_log(&cli))
    } else {
        init_log(&cli)
    };
    if let Err(e) = started {
        eprintln!("illumd: {e:#}");
        return ExitCode::from(RUNTIME_FAILURE);
    }

    let result = load_config(&cli)
        .map_err(anyhow::Error::from)
        .and_then(serve);

    match result {
        Ok(()) => {
            info!("illumd stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
