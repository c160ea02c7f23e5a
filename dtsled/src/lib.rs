//! dtsled: a character device driving one GPIO LED whose registers are described by the device tree.
//!
//! Attach resolves the five register regions of the `/alphaled` node, maps them, configures the
//! pin as a clocked GPIO output and exposes a `dtsled` node. Writing `1` to the node lights the
//! LED and `0` turns it off. See [lifecycle::LedDriver] for the entry point.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod mapper;
pub mod mmio;
pub mod pin;
pub mod resolver;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::LedConfig;
pub use error::LedError;
pub use lifecycle::{LedContext, LedDriver, LifecycleState};
pub use pin::PinState;
pub use session::Session;
