//! Hotplug notifications and the initial device scan, via udev.

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use futures::{FutureExt, StreamExt};
use log::warn;
use tokio_udev::{AsyncMonitorSocket, Device, Enumerator, Event, EventType, MonitorBuilder};

use crate::error::StartupError;

pub const BACKLIGHT: &str = "backlight";
pub const INPUT: &str = "input";

/// Subsystems the daemon watches.
pub const SUBSYSTEMS: [&str; 2] = [BACKLIGHT, INPUT];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add,
    Change,
    Remove,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subsystem {
    Backlight,
    Input,
    Other(String),
}

impl From<&str> for Subsystem {
    fn from(name: &str) -> Self {
        match name {
            BACKLIGHT => Self::Backlight,
            INPUT => Self::Input,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<EventType> for Action {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Add => Self::Add,
            EventType::Change => Self::Change,
            EventType::Remove => Self::Remove,
            other => Self::Other(format!("{other:?}").to_lowercase()),
        }
    }
}

/// One device appearing, changing or disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugRecord {
    pub action: Action,
    pub subsystem: Subsystem,
    /// Stable hardware path (the sysfs path of the device).
    pub path: String,
    /// Device node, for input devices that have one.
    pub devnode: Option<PathBuf>,
}

impl HotplugRecord {
    pub fn new(action: Action, subsystem: Subsystem, path: impl Into<String>) -> Self {
        Self {
            action,
            subsystem,
            path: path.into(),
            devnode: None,
        }
    }

    pub fn with_devnode(mut self, devnode: impl Into<PathBuf>) -> Self {
        self.devnode = Some(devnode.into());
        self
    }

    /// An already-present device found by the startup scan.
    fn scanned(device: &Device) -> Self {
        Self::describe(Action::Add, device)
    }

    fn describe(action: Action, device: &Device) -> Self {
        Self {
            action,
            subsystem: device
                .subsystem()
                .and_then(OsStr::to_str)
                .map_or_else(|| Subsystem::Other(String::new()), Subsystem::from),
            path: device.syspath().to_string_lossy().into_owned(),
            devnode: device.devnode().map(Path::to_path_buf),
        }
    }
}

impl From<&Event> for HotplugRecord {
    fn from(event: &Event) -> Self {
        Self::describe(Action::from(event.event_type()), event)
    }
}

/// The udev monitor, filtered to [`SUBSYSTEMS`] and receiving.
pub struct HotplugMonitor {
    socket: AsyncMonitorSocket,
}

impl HotplugMonitor {
    /// Creates the channel, installs the subsystem filters and enables
    /// receiving, in that order.
    ///
    /// Must run inside the tokio runtime and before [`enumerate`], so no
    /// device can appear unseen between the scan and the first wait.
    pub fn open() -> Result<Self, StartupError> {
        let builder = MonitorBuilder::new().map_err(StartupError::Channel)?;
        let builder = SUBSYSTEMS
            .iter()
            .try_fold(builder, |builder, subsystem| builder.match_subsystem(subsystem))
            .map_err(StartupError::Filter)?;
        let socket = builder.listen().map_err(StartupError::Enable)?;
        let socket = AsyncMonitorSocket::new(socket).map_err(StartupError::Enable)?;

        Ok(Self { socket })
    }

    /// Waits for the next notification, then takes every other one already
    /// pending.
    ///
    /// Returns `UnexpectedEof` once the channel is gone.
    pub async fn next_batch(&mut self) -> io::Result<Vec<HotplugRecord>> {
        let first = self.socket.next().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "hotplug channel closed")
        })??;

        let mut records = vec![HotplugRecord::from(&first)];
        while let Some(Some(pending)) = self.socket.next().now_or_never() {
            match pending {
                Ok(event) => records.push(HotplugRecord::from(&event)),
                Err(e) => warn!("Dropped hotplug notification: {e}"),
            }
        }

        Ok(records)
    }
}

/// Lists the backlight and input devices present right now as `Add` records.
pub fn enumerate() -> io::Result<Vec<HotplugRecord>> {
    let mut records = Vec::new();
    for subsystem in SUBSYSTEMS {
        let mut enumerator = Enumerator::new()?;
        enumerator.match_subsystem(subsystem)?;
        records.extend(
            enumerator
                .scan_devices()?
                .map(|device| HotplugRecord::scanned(&device)),
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn subsystem_names() {
        assert_eq!(Subsystem::from("backlight"), Subsystem::Backlight);
        assert_eq!(Subsystem::from("input"), Subsystem::Input);
        assert_eq!(Subsystem::from("usb"), Subsystem::Other("usb".into()));
    }

    #[test]
    fn event_types_map_to_actions() {
        assert_eq!(Action::from(EventType::Add), Action::Add);
        assert_eq!(Action::from(EventType::Change), Action::Change);
        assert_eq!(Action::from(EventType::Remove), Action::Remove);
        assert!(matches!(Action::from(EventType::Bind), Action::Other(_)));
    }

    #[test]
    fn record_builder() {
        let record = HotplugRecord::new(Action::Add, Subsystem::Input, "/sys/x/event3")
            .with_devnode("/dev/input/event3");
        assert_eq!(record.path, "/sys/x/event3");
        assert_eq!(record.devnode, Some(PathBuf::from("/dev/input/event3")));
    }
}
