//! Attach and detach of the LED device.
//!
//! Attach acquires, in order: device number, cdev, class, device node, then resolves the device
//! tree node, maps its regions and configures the pin. A failure at any step releases exactly
//! what was acquired before it, newest first, including the device node: a failed attach leaves
//! nothing visible to user space. Detach forces the LED off, unmaps the regions and releases the
//! device identity in reverse acquisition order.

use crate::{
    config::{LedConfig, PinConfig},
    debug_ex,
    error::{ConfigError, LedError, RegistrationStep, errno},
    mapper::{IoMapper, RegionSet},
    pin::{PinController, PinState},
    resolver,
    session::{FileOperations, Session},
    transport::{DevId, DeviceTransport},
};
use dt::{fdt::reader::FdtReader, node::DeviceTree};
use log::{error, info, warn};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unattached,
    DescriptionResolved,
    RegionsMapped,
    Configured,
    Attached,
    Detaching,
}

/// The attached hardware: mapped regions and the pin they drive.
///
/// Every register access takes the lock, so concurrent sessions cannot interleave inside a
/// read-modify-write of the shared data register.
pub struct LedContext<M: IoMapper> {
    regions: Mutex<RegionSet<M>>,
    pin: PinConfig,
}

impl<M: IoMapper> LedContext<M> {
    pub fn new(regions: RegionSet<M>, pin: PinConfig) -> LedContext<M> {
        LedContext {
            regions: Mutex::new(regions),
            pin,
        }
    }

    fn with_controller<R>(&self, f: impl FnOnce(&PinController<'_>) -> R) -> Result<R, LedError> {
        let regions = self.regions.lock();
        let pin = PinController::new(&*regions, &self.pin)
            .ok_or(LedError::InvalidState(LifecycleState::Unattached))?;
        Ok(f(&pin))
    }

    fn configure(&self) -> Result<(), LedError> {
        self.with_controller(|pin| pin.configure())
    }

    pub fn drive(&self, state: PinState) -> Result<(), LedError> {
        self.with_controller(|pin| pin.drive(state))
    }

    pub fn state(&self) -> Result<PinState, LedError> {
        self.with_controller(|pin| pin.state())
    }

    /// Force the LED off, then unmap every region. Returns the number of regions unmapped.
    fn shutdown(self) -> usize {
        if let Err(err) = self.drive(PinState::Off) {
            warn!("Unable to switch the LED off before unmapping: {}.", err);
        }
        self.regions.into_inner().unmap_all()
    }
}

/// Everything that makes the driver visible to user space.
pub struct DeviceIdentity<T: DeviceTransport> {
    devid: DevId,
    class: T::Class,
    node: T::Node,
}

/// The driver instance: configuration, framework handle and, once attached, the device.
pub struct LedDriver<T: DeviceTransport, M: IoMapper> {
    config: LedConfig,
    transport: T,
    state: LifecycleState,
    identity: Option<DeviceIdentity<T>>,
    context: Option<LedContext<M>>,
}

fn registration_failed(step: RegistrationStep, errno: i32) -> LedError {
    error!("{:?} registration failed: {}.", step, errno);
    LedError::DeviceRegistrationFailed { step, errno }
}

impl<T: DeviceTransport, M: IoMapper> LedDriver<T, M> {
    pub fn new(config: LedConfig, transport: T) -> LedDriver<T, M> {
        LedDriver {
            config,
            transport,
            state: LifecycleState::Unattached,
            identity: None,
            context: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }
    pub fn config(&self) -> &LedConfig {
        &self.config
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn devid(&self) -> Option<DevId> {
        self.identity.as_ref().map(|identity| identity.devid)
    }
    pub fn context(&self) -> Option<&LedContext<M>> {
        self.context.as_ref()
    }

    /// Register the device and bring the LED up from the description in `tree`.
    pub fn attach(&mut self, tree: &DeviceTree, mapper: M) -> Result<(), LedError> {
        if self.state != LifecycleState::Unattached {
            return Err(LedError::InvalidState(self.state));
        }
        info!("Attaching '{}'...", self.config.name);
        let identity = self.register_identity()?;
        info!(
            "devid major:{} minor:{}",
            identity.devid.major(),
            identity.devid.minor()
        );
        match self.bring_up(tree, mapper) {
            Ok(context) => {
                self.identity = Some(identity);
                self.context = Some(context);
                self.state = LifecycleState::Attached;
                info!("'{}' attached.", self.config.name);
                Ok(())
            }
            Err(err) => {
                error!("led gpio init error: {}.", err);
                let DeviceIdentity { devid, class, node } = identity;
                self.unwind_identity(devid, true, Some(class), Some(node));
                self.state = LifecycleState::Unattached;
                Err(err)
            }
        }
    }

    /// Like [LedDriver::attach], with the description read from a flattened device tree blob.
    ///
    /// A malformed blob is reported before anything is registered.
    pub fn attach_blob(&mut self, blob: &[u8], mapper: M) -> Result<(), LedError> {
        if self.state != LifecycleState::Unattached {
            return Err(LedError::InvalidState(self.state));
        }
        let mut reader = FdtReader::new(blob);
        let tree = reader
            .validate()
            .and_then(|_| reader.read())
            .map_err(ConfigError::InvalidBlob)?;
        self.attach(&tree, mapper)
    }

    /// Switch the LED off, unmap its registers and remove the device.
    pub fn detach(&mut self) -> Result<(), LedError> {
        if self.state != LifecycleState::Attached {
            return Err(LedError::InvalidState(self.state));
        }
        self.state = LifecycleState::Detaching;
        if let Some(context) = self.context.take() {
            let released = context.shutdown();
            debug_ex!("\tUnmapped {} region(s).", released);
        }
        if let Some(DeviceIdentity { devid, class, node }) = self.identity.take() {
            self.unwind_identity(devid, true, Some(class), Some(node));
        }
        self.state = LifecycleState::Unattached;
        info!("'{}' detached.", self.config.name);
        Ok(())
    }

    /// Open a session on the device node.
    pub fn open(&self) -> Result<Session<'_, M>, LedError> {
        let context = self
            .context
            .as_ref()
            .ok_or(LedError::InvalidState(self.state))?;
        Session::open(context)
    }

    fn claim_device_number(&mut self) -> Result<DevId, LedError> {
        let (name, count) = (self.config.name, self.config.count);
        let res = match self.config.major {
            Some(major) => {
                let devid = DevId::try_new(major, 0).ok_or_else(|| {
                    registration_failed(RegistrationStep::DeviceNumber, -errno::EINVAL)
                })?;
                self.transport
                    .register_chrdev_region(devid, count, name)
                    .map(|_| devid)
            }
            None => self.transport.alloc_chrdev_region(0, count, name),
        };
        res.map_err(|errno| registration_failed(RegistrationStep::DeviceNumber, errno))
    }

    fn register_identity(&mut self) -> Result<DeviceIdentity<T>, LedError> {
        let (name, count) = (self.config.name, self.config.count);
        let devid = self.claim_device_number()?;

        if let Err(errno) = self.transport.cdev_add(devid, count) {
            self.unwind_identity(devid, false, None, None);
            return Err(registration_failed(RegistrationStep::CharDevice, errno));
        }

        let class = match self.transport.class_create(name) {
            Ok(class) => class,
            Err(errno) => {
                self.unwind_identity(devid, true, None, None);
                return Err(registration_failed(RegistrationStep::Class, errno));
            }
        };

        let node = match self.transport.device_create(&class, devid, name) {
            Ok(node) => node,
            Err(errno) => {
                self.unwind_identity(devid, true, Some(class), None);
                return Err(registration_failed(RegistrationStep::DeviceNode, errno));
            }
        };

        Ok(DeviceIdentity { devid, class, node })
    }

    /// Release identity resources in reverse acquisition order. The device-number range is
    /// always held when this runs; the other steps are released only if they were acquired.
    fn unwind_identity(
        &mut self,
        devid: DevId,
        cdev_added: bool,
        class: Option<T::Class>,
        node: Option<T::Node>,
    ) {
        if let Some(class) = class {
            if let Some(node) = node {
                self.transport.device_destroy(&class, node);
            }
            self.transport.class_destroy(class);
        }
        if cdev_added {
            self.transport.cdev_del(devid);
        }
        self.transport
            .unregister_chrdev_region(devid, self.config.count);
    }

    fn bring_up(&mut self, tree: &DeviceTree, mapper: M) -> Result<LedContext<M>, LedError> {
        let resolved = resolver::resolve(tree, self.config.node_path)?;
        self.state = LifecycleState::DescriptionResolved;

        let regions = RegionSet::map_all(mapper, &resolved)?;
        self.state = LifecycleState::RegionsMapped;

        let context = LedContext::new(regions, self.config.pin.clone());
        context.configure()?;
        self.state = LifecycleState::Configured;
        Ok(context)
    }
}

impl<T: DeviceTransport, M: IoMapper> Drop for LedDriver<T, M> {
    fn drop(&mut self) {
        if self.state == LifecycleState::Attached {
            let _ = self.detach();
        }
    }
}
