//! # illumd
//!
//! A Linux daemon that adjusts every display backlight when a brightness key
//! is released on any keyboard.
//!
//! ## Features
//!
//! - **Hotplug**: Backlights and keyboards are picked up and dropped as
//!   udev reports them
//! - **Perceptual Steps**: Brightness moves along a configurable power curve
//! - **Exact Arithmetic**: Rational numbers, no floating-point drift
//! - **Single Thread**: One Tokio current-thread reactor, no locks
//!
//! ## Architecture
//!
//! - [`Application`](application::Application) - Startup ordering
//! - [`Daemon`](daemon::Daemon) - Routes hotplug and key events
//! - [`DeviceRegistry`](registry::DeviceRegistry) - Owns every open device
//! - [`Backlight`](backlight::Backlight) - Brightness model per device
//! - [`reactor`] - The event loop
//!
//! ## Example
//!
//! ```no_run
//! use illumd::{application::Application, config::Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = Application::builder()
//!         .with_config(Config::load(None)?)
//!         .build()?;
//!     tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?
//!         .block_on(app.run())
//! }
//! ```

pub mod application;
pub mod backlight;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod fraction;
pub mod hotplug;
pub mod input;
pub mod platform;
pub mod reactor;
pub mod registry;
pub mod sysfs;

#[cfg(test)]
mod testing;
