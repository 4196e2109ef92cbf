//! Application entry point and builder pattern implementation.

use crate::{
    config::Config,
    daemon::Daemon,
    error::StartupError,
    hotplug::{self, HotplugMonitor},
    platform::SystemBackend,
    reactor::{self, ReadySources},
    registry::DeviceBackend,
};
use anyhow::Result;
use log::info;

/// Main application structure that drives the daemon from startup to
/// shutdown.
///
/// # Example
///
/// ```no_run
/// use illumd::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// Application::builder()
///     .with_config(Config::load(None)?)
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    config: Config,
    backend: Box<dyn DeviceBackend>,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Opens the hotplug channel, scans present devices, then serves events
    /// until a termination signal arrives.
    ///
    /// The channel is enabled before the scan so a device plugged in
    /// meanwhile is still seen; the registry drops the duplicate.
    pub async fn run(self) -> Result<()> {
        let mut monitor = HotplugMonitor::open()?;
        let records = hotplug::enumerate().map_err(StartupError::Scan)?;

        let mut sources = ReadySources::new();
        let mut daemon = Daemon::new(self.config, self.backend);
        daemon.scan(records, &mut sources);

        reactor::run(&mut daemon, &mut monitor, &mut sources).await
    }
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<Config>,
    backend: Option<Box<dyn DeviceBackend>>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: None,
            backend: None,
        }
    }

    /// Sets the configuration for the application.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the hardware backend; [`SystemBackend`] by default.
    pub fn with_backend(mut self, backend: Box<dyn DeviceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validates the configuration and builds the Application.
    pub fn build(self) -> Result<Application, StartupError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(StartupError::Config)?;
        info!(
            "Brightness curve linearity {}, step {}%",
            config.linearity, config.step_percent
        );

        Ok(Application {
            config,
            backend: self.backend.unwrap_or_else(|| Box::new(SystemBackend)),
        })
    }
}
