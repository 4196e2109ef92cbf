//! Integer attribute access for sysfs device directories.

use std::{
    ffi::CString,
    fs::File,
    io::{self, Read, Write},
    os::unix::io::{AsRawFd, FromRawFd},
    path::Path,
};

/// Read and write small decimal integer attributes of one device.
#[cfg_attr(test, mockall::automock)]
pub trait AttributeIo {
    fn read_int(&self, name: &str) -> io::Result<i64>;
    fn write_int(&self, name: &str, value: u64) -> io::Result<()>;
}

/// A sysfs device directory, held open for as long as the device is tracked.
///
/// Attributes are opened relative to the held descriptor, so a different
/// device appearing later under the same path is never read through it.
#[derive(Debug)]
pub struct SysfsDir {
    dir: File,
}

impl SysfsDir {
    pub fn open(path: &Path) -> io::Result<Self> {
        let dir = File::open(path)?;
        if !dir.metadata()?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", path.display()),
            ));
        }

        Ok(Self { dir })
    }

    /// Opens attribute `name` inside the held directory.
    fn open_attr(&self, name: &str, flags: libc::c_int) -> io::Result<File> {
        if name.contains('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{name:?} is not an attribute name"),
            ));
        }
        let name =
            CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: `self.dir` stays open for the duration of the call and
        // `name` is a NUL-terminated string.
        let fd = unsafe {
            libc::openat(
                self.dir.as_raw_fd(),
                name.as_ptr(),
                flags | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `fd` was just returned by openat and has no other owner.
        Ok(unsafe { File::from_raw_fd(fd) })
    }
}

impl AttributeIo for SysfsDir {
    fn read_int(&self, name: &str) -> io::Result<i64> {
        let mut content = String::new();
        self.open_attr(name, libc::O_RDONLY)?
            .read_to_string(&mut content)?;
        content.trim().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{name}: {content:?} is not an integer: {e}"),
            )
        })
    }

    fn write_int(&self, name: &str, value: u64) -> io::Result<()> {
        self.open_attr(name, libc::O_WRONLY | libc::O_TRUNC)?
            .write_all(value.to_string().as_bytes())
    }
}
