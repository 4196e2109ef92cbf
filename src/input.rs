//! Brightness key sources backed by evdev input nodes.

use std::{
    fs::OpenOptions,
    io,
    os::unix::{
        fs::OpenOptionsExt,
        io::{AsRawFd, RawFd},
    },
    path::Path,
};

use evdev_rs::{
    Device, DeviceWrapper, ReadFlag, ReadStatus,
    enums::{EV_KEY, EventCode},
};
use log::debug;

/// Key value reported when a key is released.
pub const KEY_RELEASE: i32 = 0;

/// The two keys the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessKey {
    Up,
    Down,
}

impl BrightnessKey {
    pub const ALL: [Self; 2] = [Self::Up, Self::Down];

    /// +1 for brightness up, -1 for brightness down.
    pub const fn step_sign(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    pub const fn event_code(self) -> EventCode {
        match self {
            Self::Up => EventCode::EV_KEY(EV_KEY::KEY_BRIGHTNESSUP),
            Self::Down => EventCode::EV_KEY(EV_KEY::KEY_BRIGHTNESSDOWN),
        }
    }

    pub const fn from_event_code(code: &EventCode) -> Option<Self> {
        match code {
            EventCode::EV_KEY(EV_KEY::KEY_BRIGHTNESSUP) => Some(Self::Up),
            EventCode::EV_KEY(EV_KEY::KEY_BRIGHTNESSDOWN) => Some(Self::Down),
            _ => None,
        }
    }
}

/// Result of one non-blocking read from a key source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRead {
    /// An event was read. `key` is set only for the brightness keys.
    Key {
        key: Option<BrightnessKey>,
        value: i32,
    },
    /// Events were dropped by the kernel; reading simply continues.
    Resync,
    /// Nothing more to read until the next wake.
    Drained,
}

/// A non-blocking source of key events.
pub trait KeySource {
    /// Whether the source can emit `key` at all.
    fn supports(&self, key: BrightnessKey) -> bool;

    /// Reads the next pending event without blocking.
    fn next_event(&mut self) -> io::Result<KeyRead>;

    /// Descriptor the reactor waits on.
    fn raw_fd(&self) -> RawFd;
}

/// An evdev device node opened read-only and non-blocking.
pub struct EvdevKeys {
    device: Device,
}

impl EvdevKeys {
    /// Opens `node` as an evdev device.
    ///
    /// Returns `Ok(None)` if the node opens but is not an evdev device
    /// (joystick or legacy mouse nodes, for instance). The node is closed
    /// again in that case.
    pub fn open(node: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(node)?;

        match Device::new_from_file(file) {
            Ok(device) => Ok(Some(Self { device })),
            Err(e) => {
                debug!("{} is not an evdev device: {e}", node.display());
                Ok(None)
            }
        }
    }
}

impl KeySource for EvdevKeys {
    fn supports(&self, key: BrightnessKey) -> bool {
        self.device.has_event_code(&key.event_code())
    }

    fn next_event(&mut self) -> io::Result<KeyRead> {
        match self.device.next_event(ReadFlag::NORMAL) {
            Ok((ReadStatus::Success, event)) => Ok(KeyRead::Key {
                key: BrightnessKey::from_event_code(&event.event_code),
                value: event.value,
            }),
            Ok((ReadStatus::Sync, _)) => Ok(KeyRead::Resync),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(KeyRead::Drained),
            Err(e) => Err(e),
        }
    }

    fn raw_fd(&self) -> RawFd {
        self.device.file().as_raw_fd()
    }
}
