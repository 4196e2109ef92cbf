//! Hardware-free stand-ins for the device backend, key sources and the
//! reactor source set.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, VecDeque},
    io,
    os::unix::io::RawFd,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    backlight::{BRIGHTNESS, MAX_BRIGHTNESS},
    input::{BrightnessKey, KEY_RELEASE, KeyRead, KeySource},
    registry::{DeviceBackend, SourceSet},
    sysfs::AttributeIo,
};

/// Ordered record of register/unregister/close calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// In-memory attribute directory shared with the test.
#[derive(Debug, Clone, Default)]
pub struct FakeAttrs(Rc<RefCell<BTreeMap<String, i64>>>);

impl FakeAttrs {
    pub fn backlight(max: i64, brightness: i64) -> Self {
        let attrs = Self::default();
        attrs.set(MAX_BRIGHTNESS, max);
        attrs.set(BRIGHTNESS, brightness);
        attrs
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.borrow().get(name).copied()
    }

    pub fn set(&self, name: &str, value: i64) {
        self.0.borrow_mut().insert(name.to_owned(), value);
    }
}

impl AttributeIo for FakeAttrs {
    fn read_int(&self, name: &str) -> io::Result<i64> {
        self.get(name)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write_int(&self, name: &str, value: u64) -> io::Result<()> {
        let value = i64::try_from(value).map_err(io::Error::other)?;
        self.set(name, value);
        Ok(())
    }
}

type EventQueue = Rc<RefCell<VecDeque<Result<KeyRead, io::ErrorKind>>>>;

/// Scripted key source. Records `close <name>` in the journal when dropped.
pub struct FakeKeys {
    name: String,
    supported: Vec<BrightnessKey>,
    queue: EventQueue,
    closed: Rc<Cell<bool>>,
    journal: Journal,
    fd: RawFd,
}

/// Test-side handle to a [`FakeKeys`] owned by the registry.
#[derive(Clone)]
pub struct KeysHandle {
    queue: EventQueue,
    closed: Rc<Cell<bool>>,
}

impl FakeKeys {
    pub fn new(supported: &[BrightnessKey], journal: &Journal) -> (Self, KeysHandle) {
        thread_local! {
            static NEXT_FD: Cell<RawFd> = const { Cell::new(100) };
        }

        let queue = EventQueue::default();
        let closed = Rc::new(Cell::new(false));
        let keys = Self {
            name: String::new(),
            supported: supported.to_vec(),
            queue: queue.clone(),
            closed: closed.clone(),
            journal: journal.clone(),
            fd: NEXT_FD.with(|fd| fd.replace(fd.get() + 1)),
        };
        (keys, KeysHandle { queue, closed })
    }
}

impl KeySource for FakeKeys {
    fn supports(&self, key: BrightnessKey) -> bool {
        self.supported.contains(&key)
    }

    fn next_event(&mut self) -> io::Result<KeyRead> {
        match self.queue.borrow_mut().pop_front() {
            Some(Ok(read)) => Ok(read),
            Some(Err(kind)) => Err(io::Error::from(kind)),
            None => Ok(KeyRead::Drained),
        }
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FakeKeys {
    fn drop(&mut self) {
        self.closed.set(true);
        self.journal.record(format!("close {}", self.name));
    }
}

impl KeysHandle {
    pub fn push(&self, read: KeyRead) {
        self.queue.borrow_mut().push_back(Ok(read));
    }

    /// Queues a press followed by a release of `key`.
    pub fn press(&self, key: BrightnessKey) {
        self.push(KeyRead::Key {
            key: Some(key),
            value: 1,
        });
        self.push(KeyRead::Key {
            key: Some(key),
            value: KEY_RELEASE,
        });
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        self.queue.borrow_mut().push_back(Err(kind));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

#[derive(Default)]
struct BackendState {
    backlights: HashMap<PathBuf, FakeAttrs>,
    keys: HashMap<PathBuf, FakeKeys>,
    backlight_opens: usize,
}

/// Backend serving [`FakeAttrs`] and [`FakeKeys`] by path.
///
/// Unknown backlight paths fail to open; unknown input nodes open as
/// non-evdev devices.
#[derive(Clone, Default)]
pub struct FakeBackend(Rc<RefCell<BackendState>>);

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backlight(&self, path: &str, attrs: FakeAttrs) {
        self.0
            .borrow_mut()
            .backlights
            .insert(PathBuf::from(path), attrs);
    }

    pub fn add_keys(&self, node: &str, mut keys: FakeKeys) {
        keys.name = node.to_owned();
        self.0.borrow_mut().keys.insert(PathBuf::from(node), keys);
    }

    pub fn backlight_opens(&self) -> usize {
        self.0.borrow().backlight_opens
    }
}

impl DeviceBackend for FakeBackend {
    fn open_backlight(&self, path: &Path) -> io::Result<Box<dyn AttributeIo>> {
        let mut state = self.0.borrow_mut();
        state.backlight_opens += 1;
        state
            .backlights
            .get(path)
            .cloned()
            .map(|attrs| Box::new(attrs) as Box<dyn AttributeIo>)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn open_keys(&self, node: &Path) -> io::Result<Option<Box<dyn KeySource>>> {
        Ok(self
            .0
            .borrow_mut()
            .keys
            .remove(node)
            .map(|keys| Box::new(keys) as Box<dyn KeySource>))
    }
}

/// Source set that only records what it was asked to do.
pub struct FakeSources {
    registered: Vec<String>,
    journal: Journal,
    fail: bool,
}

impl FakeSources {
    pub fn new(journal: &Journal) -> Self {
        Self {
            registered: Vec::new(),
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(journal: &Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.clone()
    }
}

impl SourceSet for FakeSources {
    fn register(&mut self, key: &str, _fd: RawFd) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::other("registration refused"));
        }
        self.journal.record(format!("register {key}"));
        self.registered.push(key.to_owned());
        Ok(())
    }

    fn unregister(&mut self, key: &str) {
        self.journal.record(format!("unregister {key}"));
        self.registered.retain(|k| k != key);
    }
}
