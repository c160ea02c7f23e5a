//! Contracts with the surrounding character-device framework.
//!
//! [DeviceTransport] covers device numbers, cdev registration and the class/device nodes that
//! make the driver visible to user space. [IoBufferReader] is the copy-from-user primitive the
//! write path consumes. Both are implemented by the hosting kernel glue; the driver core never
//! touches user memory or the device namespace directly.

use crate::error::LedError;
use core::fmt::{self, Display};

/// A device number, encoded as `major << 20 | minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevId(u32);

impl DevId {
    pub const MINOR_BITS: u32 = 20;
    pub const MINOR_MASK: u32 = (1 << Self::MINOR_BITS) - 1;
    pub const MAX_MAJOR: u32 = u32::MAX >> Self::MINOR_BITS;

    /// Pack `major` and `minor`. Bits beyond [DevId::MAX_MAJOR] and [DevId::MINOR_MASK] are
    /// dropped; use [DevId::try_new] for unchecked input.
    pub const fn new(major: u32, minor: u32) -> DevId {
        DevId(((major & Self::MAX_MAJOR) << Self::MINOR_BITS) | (minor & Self::MINOR_MASK))
    }
    pub const fn try_new(major: u32, minor: u32) -> Option<DevId> {
        if major > Self::MAX_MAJOR || minor > Self::MINOR_MASK {
            None
        } else {
            Some(DevId::new(major, minor))
        }
    }
    pub const fn from_raw(raw: u32) -> DevId {
        DevId(raw)
    }
    pub const fn raw(self) -> u32 {
        self.0
    }
    pub const fn major(self) -> u32 {
        self.0 >> Self::MINOR_BITS
    }
    pub const fn minor(self) -> u32 {
        self.0 & Self::MINOR_MASK
    }
}

impl Display for DevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// The character-device framework. Failures carry the framework's (negative) errno.
///
/// The operation table bound by `cdev_add` is [crate::session::FileOperations].
pub trait DeviceTransport {
    /// A registered device class.
    type Class;
    /// A device node visible in the device namespace.
    type Node;

    fn alloc_chrdev_region(&mut self, first_minor: u32, count: u32, name: &str) -> Result<DevId, i32>;
    fn register_chrdev_region(&mut self, first: DevId, count: u32, name: &str) -> Result<(), i32>;
    fn unregister_chrdev_region(&mut self, first: DevId, count: u32);

    fn cdev_add(&mut self, dev: DevId, count: u32) -> Result<(), i32>;
    fn cdev_del(&mut self, dev: DevId);

    fn class_create(&mut self, name: &str) -> Result<Self::Class, i32>;
    fn class_destroy(&mut self, class: Self::Class);

    fn device_create(&mut self, class: &Self::Class, dev: DevId, name: &str) -> Result<Self::Node, i32>;
    fn device_destroy(&mut self, class: &Self::Class, node: Self::Node);
}

/// Represents a buffer to be read from during IO.
pub trait IoBufferReader {
    /// Returns the number of bytes left to be read from the io buffer.
    fn len(&self) -> usize;

    /// Returns `true` if no data is available in the io buffer.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `data` from the io buffer.
    ///
    /// Returns [LedError::CopyFault] if the buffer cannot supply `data.len()` bytes.
    fn read_slice(&mut self, data: &mut [u8]) -> Result<(), LedError>;
}

impl IoBufferReader for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_slice(&mut self, data: &mut [u8]) -> Result<(), LedError> {
        let src = *self;
        if data.len() > src.len() {
            return Err(LedError::CopyFault);
        }
        let (head, tail) = src.split_at(data.len());
        data.copy_from_slice(head);
        *self = tail;
        Ok(())
    }
}
