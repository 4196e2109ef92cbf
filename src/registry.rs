//! Registry of tracked backlight and input devices.
//!
//! Devices are keyed by their hardware path. Every insert is preceded by an
//! existence check, so a device seen both by the startup scan and by a
//! hotplug notification is only ever tracked once.

use std::{
    io,
    os::unix::io::RawFd,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    backlight::Backlight,
    error::DeviceError,
    fraction::Fraction,
    input::{BrightnessKey, KEY_RELEASE, KeyRead, KeySource},
    sysfs::AttributeIo,
};

/// Opens the concrete device handles the registry manages.
pub trait DeviceBackend {
    /// Opens the attribute directory of a backlight.
    fn open_backlight(&self, path: &Path) -> io::Result<Box<dyn AttributeIo>>;

    /// Opens an input node as a key source. `Ok(None)` means the node is not
    /// a key-event device.
    fn open_keys(&self, node: &Path) -> io::Result<Option<Box<dyn KeySource>>>;
}

/// The reactor's set of watched input sources.
pub trait SourceSet {
    fn register(&mut self, key: &str, fd: RawFd) -> io::Result<()>;
    fn unregister(&mut self, key: &str);
}

/// Outcome of adding a backlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    Inserted,
    AlreadyTracked,
}

/// Outcome of adding an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAdded {
    Inserted,
    AlreadyTracked,
    /// Not an event device, or it has neither brightness key.
    Unsupported,
}

struct InputDevice {
    path: String,
    devnode: PathBuf,
    keys: Box<dyn KeySource>,
}

/// Owns every tracked device. Removal is the only way a device is closed.
#[derive(Default)]
pub struct DeviceRegistry {
    backlights: Vec<Backlight>,
    inputs: Vec<InputDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking the backlight at `path` unless it already is.
    ///
    /// A failure to open the device leaves the registry untouched.
    pub fn add_backlight_if_absent(
        &mut self,
        path: &str,
        backend: &dyn DeviceBackend,
        linearity: u32,
    ) -> Result<Added, DeviceError> {
        if self.contains_backlight(path) {
            return Ok(Added::AlreadyTracked);
        }

        let attrs = backend
            .open_backlight(Path::new(path))
            .map_err(|source| DeviceError::Init {
                path: path.to_owned(),
                source,
            })?;
        let backlight = Backlight::open(path, attrs, linearity)?;

        info!(
            "Tracking backlight {path} (max_brightness {}, linearity {})",
            backlight.max_brightness(),
            backlight.linearity()
        );
        self.backlights.push(backlight);
        Ok(Added::Inserted)
    }

    /// Stops tracking the backlight at `path`. Returns whether it was tracked.
    pub fn remove_backlight(&mut self, path: &str) -> bool {
        match self.backlights.iter().position(|b| b.path() == path) {
            Some(idx) => {
                drop(self.backlights.remove(idx));
                info!("Dropped backlight {path}");
                true
            }
            None => false,
        }
    }

    /// Starts tracking the input device at `path`, reading from `devnode`.
    ///
    /// Nodes that are not key-event devices, or that have neither brightness
    /// key, are closed again and reported as [`InputAdded::Unsupported`].
    pub fn add_input_if_absent(
        &mut self,
        path: &str,
        devnode: &Path,
        backend: &dyn DeviceBackend,
        sources: &mut dyn SourceSet,
    ) -> Result<InputAdded, DeviceError> {
        if self.contains_input(path) {
            return Ok(InputAdded::AlreadyTracked);
        }

        let init_error = |source| DeviceError::Init {
            path: devnode.display().to_string(),
            source,
        };

        let Some(keys) = backend.open_keys(devnode).map_err(init_error)? else {
            return Ok(InputAdded::Unsupported);
        };

        if !BrightnessKey::ALL.iter().any(|key| keys.supports(*key)) {
            debug!("{} has no brightness keys", devnode.display());
            return Ok(InputAdded::Unsupported);
        }

        sources.register(path, keys.raw_fd()).map_err(init_error)?;

        info!("Listening for brightness keys on {}", devnode.display());
        self.inputs.push(InputDevice {
            path: path.to_owned(),
            devnode: devnode.to_path_buf(),
            keys,
        });
        Ok(InputAdded::Inserted)
    }

    /// Stops tracking the input at `path`: unregisters it, then closes it.
    pub fn remove_input(&mut self, path: &str, sources: &mut dyn SourceSet) -> bool {
        let Some(idx) = self.inputs.iter().position(|i| i.path == path) else {
            return false;
        };

        let input = self.inputs.remove(idx);
        sources.unregister(&input.path);
        info!("Stopped listening on {}", input.devnode.display());
        drop(input);
        true
    }

    /// Applies `delta` to every backlight in registry order.
    ///
    /// Failures are logged per device and do not stop the others. Returns
    /// how many backlights were updated.
    pub fn broadcast_modify(&self, delta: Fraction) -> usize {
        broadcast(&self.backlights, delta)
    }

    /// Reads everything pending on the input at `path`.
    ///
    /// Each brightness key release is applied immediately as `±step` to all
    /// backlights. Returns the number of releases handled; an unknown path
    /// handles none.
    pub fn drain_input(&mut self, path: &str, step: Fraction) -> io::Result<usize> {
        let Self { backlights, inputs } = self;
        let Some(input) = inputs.iter_mut().find(|i| i.path == path) else {
            return Ok(0);
        };

        let mut handled = 0;
        loop {
            match input.keys.next_event()? {
                KeyRead::Drained => return Ok(handled),
                KeyRead::Resync => debug!("{}: resynchronising", input.devnode.display()),
                KeyRead::Key {
                    key: Some(key),
                    value: KEY_RELEASE,
                } => {
                    debug!("{}: {key:?} released", input.devnode.display());
                    let delta = if key.step_sign() < 0 { -step } else { step };
                    broadcast(backlights, delta);
                    handled += 1;
                }
                KeyRead::Key { .. } => {}
            }
        }
    }

    /// Drops every device: inputs are unregistered and closed, then
    /// backlights are closed.
    pub fn clear(&mut self, sources: &mut dyn SourceSet) {
        for input in self.inputs.drain(..) {
            sources.unregister(&input.path);
        }
        self.backlights.clear();
    }

    pub fn contains_backlight(&self, path: &str) -> bool {
        self.backlights.iter().any(|b| b.path() == path)
    }

    pub fn contains_input(&self, path: &str) -> bool {
        self.inputs.iter().any(|i| i.path == path)
    }

    pub fn backlight_paths(&self) -> Vec<&str> {
        self.backlights.iter().map(Backlight::path).collect()
    }

    pub fn input_paths(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.path.as_str()).collect()
    }

    pub fn backlight_count(&self) -> usize {
        self.backlights.len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

fn broadcast(backlights: &[Backlight], delta: Fraction) -> usize {
    backlights
        .iter()
        .filter(|backlight| match backlight.modify(delta) {
            Ok(raw) => {
                debug!("{}: brightness set to {raw}", backlight.path());
                true
            }
            Err(e) => {
                warn!("Brightness change dropped: {e}");
                false
            }
        })
        .count()
}
