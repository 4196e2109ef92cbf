//! Event routing between hotplug notifications, key sources and the
//! device registry.
//!
//! [`Daemon`] owns all daemon state. The reactor calls into it on every
//! wake and it never blocks.

use std::io;

use log::{debug, error, info, warn};

use crate::{
    config::Config,
    hotplug::{Action, HotplugRecord, Subsystem},
    registry::{Added, DeviceBackend, DeviceRegistry, InputAdded, SourceSet},
};

pub struct Daemon {
    config: Config,
    registry: DeviceRegistry,
    backend: Box<dyn DeviceBackend>,
}

impl Daemon {
    pub fn new(config: Config, backend: Box<dyn DeviceBackend>) -> Self {
        Self {
            config,
            registry: DeviceRegistry::new(),
            backend,
        }
    }

    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Adds every device found by the startup scan.
    ///
    /// Devices that fail to initialise are logged and skipped.
    pub fn scan(&mut self, records: Vec<HotplugRecord>, sources: &mut dyn SourceSet) {
        for record in records {
            self.handle_hotplug(record, sources);
        }
        info!(
            "Startup scan complete: {} backlight(s), {} input(s)",
            self.registry.backlight_count(),
            self.registry.input_count()
        );
    }

    /// Applies one hotplug notification to the registry.
    pub fn handle_hotplug(&mut self, record: HotplugRecord, sources: &mut dyn SourceSet) {
        let HotplugRecord {
            action,
            subsystem,
            path,
            devnode,
        } = record;

        match (subsystem, action) {
            (Subsystem::Other(name), _) => warn!("Ignoring event from subsystem '{name}'"),
            (_, Action::Other(action)) => warn!("Ignoring '{action}' event for {path}"),
            (_, Action::Change) => debug!("Ignoring change event for {path}"),
            (Subsystem::Backlight, Action::Add) => {
                match self.registry.add_backlight_if_absent(
                    &path,
                    self.backend.as_ref(),
                    self.config.linearity,
                ) {
                    Ok(Added::Inserted) => {}
                    Ok(Added::AlreadyTracked) => debug!("{path} already tracked"),
                    Err(e) => error!("{e}"),
                }
            }
            (Subsystem::Backlight, Action::Remove) => {
                if !self.registry.remove_backlight(&path) {
                    debug!("Removed backlight {path} was not tracked");
                }
            }
            (Subsystem::Input, Action::Add) => {
                let Some(devnode) = devnode else {
                    debug!("{path} has no device node");
                    return;
                };
                match self.registry.add_input_if_absent(
                    &path,
                    &devnode,
                    self.backend.as_ref(),
                    sources,
                ) {
                    Ok(InputAdded::Inserted | InputAdded::Unsupported) => {}
                    Ok(InputAdded::AlreadyTracked) => debug!("{path} already tracked"),
                    Err(e) => error!("{e}"),
                }
            }
            (Subsystem::Input, Action::Remove) => {
                if !self.registry.remove_input(&path, sources) {
                    debug!("Removed input {path} was not tracked");
                }
            }
        }
    }

    /// Handles readiness of the input registered under `path`.
    ///
    /// An input that fails to read is dropped.
    pub fn handle_input_ready(&mut self, path: &str, sources: &mut dyn SourceSet) {
        match self.registry.drain_input(path, self.config.step()) {
            Ok(handled) => {
                if handled > 0 {
                    debug!("{path}: {handled} brightness key release(s)");
                }
            }
            Err(e) => self.handle_input_error(path, &e, sources),
        }
    }

    /// Drops the input at `path` after a failed wait or read.
    pub fn handle_input_error(&mut self, path: &str, e: &io::Error, sources: &mut dyn SourceSet) {
        error!("Failed to read key events from {path}: {e}");
        self.registry.remove_input(path, sources);
    }

    /// Releases every device.
    pub fn shutdown(&mut self, sources: &mut dyn SourceSet) {
        info!(
            "Releasing {} backlight(s) and {} input(s)",
            self.registry.backlight_count(),
            self.registry.input_count()
        );
        self.registry.clear(sources);
    }
}
