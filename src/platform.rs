//! Device backend for real hardware: sysfs backlights and evdev nodes.

use std::{io, path::Path};

use crate::{
    input::{EvdevKeys, KeySource},
    registry::DeviceBackend,
    sysfs::{AttributeIo, SysfsDir},
};

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl DeviceBackend for SystemBackend {
    fn open_backlight(&self, path: &Path) -> io::Result<Box<dyn AttributeIo>> {
        Ok(Box::new(SysfsDir::open(path)?))
    }

    fn open_keys(&self, node: &Path) -> io::Result<Option<Box<dyn KeySource>>> {
        Ok(EvdevKeys::open(node)?.map(|keys| Box::new(keys) as Box<dyn KeySource>))
    }
}
