//! File operations of the `dtsled` node.

use crate::{
    debug_ex,
    error::LedError,
    lifecycle::LedContext,
    mapper::IoMapper,
    pin::PinState,
    transport::IoBufferReader,
};
use log::error;

/// The operation table bound to the character device.
pub trait FileOperations: Sized {
    /// What `open` binds the new file to.
    type OpenData;

    /// Creates a new instance of this file.
    fn open(context: Self::OpenData) -> Result<Self, LedError>;

    /// Writes data from the caller's buffer to this file.
    fn write(&self, reader: &mut impl IoBufferReader, len: usize) -> Result<usize, LedError>;

    /// Reads data from this file into the caller's buffer.
    fn read(&self, _buf: &mut [u8]) -> Result<usize, LedError> {
        Err(LedError::Unsupported)
    }

    /// Cleans up after the last reference to the file goes away.
    fn release(self) {}
}

/// One open file on the device node. Holds nothing but a reference to the device.
pub struct Session<'d, M: IoMapper> {
    context: &'d LedContext<M>,
}

impl<'d, M: IoMapper> Session<'d, M> {
    /// Current LED state, read from the data register.
    pub fn state(&self) -> Result<PinState, LedError> {
        self.context.state()
    }
}

impl<'d, M: IoMapper> FileOperations for Session<'d, M> {
    type OpenData = &'d LedContext<M>;

    fn open(context: &'d LedContext<M>) -> Result<Self, LedError> {
        debug_ex!("led open!");
        Ok(Session { context })
    }

    /// Consume one command byte: `1` lights the LED, `0` turns it off.
    ///
    /// Only the first byte is looked at; the rest of the buffer is accepted and ignored.
    fn write(&self, reader: &mut impl IoBufferReader, len: usize) -> Result<usize, LedError> {
        let mut cmd = [0u8; 1];
        reader.read_slice(&mut cmd).inspect_err(|_| {
            error!("kernel write failed!");
        })?;
        let state = PinState::try_from(cmd[0]).map_err(|_| LedError::InvalidCommand(cmd[0]))?;
        debug_ex!("led write {:?}.", state);
        self.context.drive(state)?;
        Ok(len)
    }

    fn release(self) {
        debug_ex!("led release!");
    }
}
