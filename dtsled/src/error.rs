//! Error types of the driver and their mapping onto the status codes handed back to the framework.

use crate::{lifecycle::LifecycleState, resolver::RegionIndex};
use core::fmt::{self, Display};
use dt::{fdt::reader::FdtError, prop::PropertyError};

/// Positive errno values; the framework receives them negated.
pub mod errno {
    pub const EFAULT: i32 = 14;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
}

/// Errors surfaced by attach, detach and the file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedError {
    /// The hardware description lacks the node or one of its register regions.
    ConfigurationMissing(ConfigError),
    /// A resolved region could not be mapped into the address space.
    MapFailed(RegionIndex),
    /// The framework refused a device-number, cdev, class or node request.
    DeviceRegistrationFailed { step: RegistrationStep, errno: i32 },
    /// The user buffer could not be copied in.
    CopyFault,
    /// The user byte was neither `0` nor `1`.
    InvalidCommand(u8),
    /// The driver is not in a state that allows the operation.
    InvalidState(LifecycleState),
    /// The operation is not offered by the device node.
    Unsupported,
}

/// Why the hardware description could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The device tree node is absent.
    NodeNotFound,
    /// The node's `reg` has no entry for this region.
    RegionMissing(RegionIndex),
    /// The region is too small to hold a 32-bit register.
    RegionTooSmall(RegionIndex),
    /// The node's `reg` or its parent's cell counts are malformed.
    InvalidReg(PropertyError),
    /// The flattened device tree blob could not be parsed.
    InvalidBlob(FdtError),
}

/// Device-identity acquisition steps, in the order attach performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    DeviceNumber,
    CharDevice,
    Class,
    DeviceNode,
}

impl LedError {
    /// The negative status reported to the framework.
    pub fn errno(&self) -> i32 {
        match self {
            LedError::ConfigurationMissing(_)
            | LedError::InvalidCommand(_)
            | LedError::InvalidState(_)
            | LedError::Unsupported => -errno::EINVAL,
            LedError::MapFailed(_) => -errno::ENOMEM,
            LedError::CopyFault => -errno::EFAULT,
            LedError::DeviceRegistrationFailed { errno, .. } => -errno.abs(),
        }
    }
}

impl From<ConfigError> for LedError {
    fn from(value: ConfigError) -> Self {
        LedError::ConfigurationMissing(value)
    }
}

impl Display for LedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedError::ConfigurationMissing(err) => write!(f, "configuration missing: {}", err),
            LedError::MapFailed(index) => write!(f, "failed to map {} region", index),
            LedError::DeviceRegistrationFailed { step, errno } => {
                write!(f, "{:?} registration failed ({})", step, errno)
            }
            LedError::CopyFault => f.write_str("user buffer not accessible"),
            LedError::InvalidCommand(byte) => write!(f, "invalid command {:#04x}", byte),
            LedError::InvalidState(state) => write!(f, "invalid driver state {:?}", state),
            LedError::Unsupported => f.write_str("operation not supported"),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NodeNotFound => f.write_str("device tree node not found"),
            ConfigError::RegionMissing(index) => write!(f, "no {} region in 'reg'", index),
            ConfigError::RegionTooSmall(index) => write!(f, "{} region too small", index),
            ConfigError::InvalidReg(err) => write!(f, "malformed 'reg': {:?}", err),
            ConfigError::InvalidBlob(err) => write!(f, "malformed device tree blob: {:?}", err),
        }
    }
}
