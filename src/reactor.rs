//! Single-threaded event loop.
//!
//! Waits on the hotplug channel, every registered key source and the
//! termination signals, and hands whatever became ready to the [`Daemon`].

use std::{future::pending, io, os::unix::io::RawFd, pin::Pin};

use anyhow::{Context, Result};
use futures::{Stream, StreamExt, stream};
use log::info;
use tokio::{
    io::{Interest, unix::AsyncFd},
    signal::unix::{SignalKind, signal},
};
use tokio_stream::StreamMap;

use crate::{daemon::Daemon, hotplug::HotplugMonitor, registry::SourceSet};

type Readiness = Pin<Box<dyn Stream<Item = io::Result<()>>>>;

/// Key sources the loop waits on, keyed by hardware path.
///
/// Dropping an entry deregisters its descriptor from the runtime without
/// closing it; the owning key source closes it afterwards.
pub struct ReadySources {
    streams: StreamMap<String, Readiness>,
}

impl Default for ReadySources {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySources {
    pub fn new() -> Self {
        Self {
            streams: StreamMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Waits until a registered source is readable and returns its key.
    ///
    /// Never completes while nothing is registered.
    pub async fn next_ready(&mut self) -> (String, io::Result<()>) {
        match self.streams.next().await {
            Some(ready) => ready,
            None => pending().await,
        }
    }
}

impl SourceSet for ReadySources {
    fn register(&mut self, key: &str, fd: RawFd) -> io::Result<()> {
        let fd = AsyncFd::with_interest(fd, Interest::READABLE)?;
        self.streams.insert(key.to_owned(), readiness(fd));
        Ok(())
    }

    fn unregister(&mut self, key: &str) {
        self.streams.remove(key);
    }
}

/// Yields once per readable edge of `fd`.
fn readiness(fd: AsyncFd<RawFd>) -> Readiness {
    Box::pin(stream::unfold(fd, |fd| async move {
        let ready = match fd.readable().await {
            Ok(mut guard) => {
                guard.clear_ready();
                Ok(())
            }
            Err(e) => Err(e),
        };
        Some((ready, fd))
    }))
}

/// Runs until SIGINT or SIGTERM, then releases every device.
///
/// Fails only if the hotplug channel breaks or a signal handler cannot be
/// installed.
pub async fn run(
    daemon: &mut Daemon,
    monitor: &mut HotplugMonitor,
    sources: &mut ReadySources,
) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    info!("Starting main event loop");

    let outcome = loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        info!("Received SIGINT, initiating graceful shutdown...");
                        break Ok(());
                    }
                    Err(e) => break Err(e).context("Failed to listen for shutdown signal"),
                }
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
                break Ok(());
            }

            batch = monitor.next_batch() => {
                match batch {
                    Ok(records) => {
                        for record in records {
                            daemon.handle_hotplug(record, sources);
                        }
                    }
                    Err(e) => break Err(e).context("Hotplug channel failed"),
                }
            }

            (path, ready) = sources.next_ready() => {
                match ready {
                    Ok(()) => daemon.handle_input_ready(&path, sources),
                    Err(e) => daemon.handle_input_error(&path, &e, sources),
                }
            }
        }
    };

    daemon.shutdown(sources);
    info!("Main event loop terminated");
    outcome
}
