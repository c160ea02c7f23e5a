//! Test doubles for the hardware, the device tree and the character-device framework.

use crate::{
    error::{RegistrationStep, errno},
    mapper::IoMapper,
    mmio::{
        IoRange,
        trace::{self, Access},
    },
    transport::{DevId, DeviceTransport},
};
use alloc::{boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use core::{
    cell::RefCell,
    ptr::{NonNull, read_volatile, write_volatile},
};
use dt::{node::DeviceTree, prop::Property};

pub const CCM_CCGR1: usize = 0x020C_406C;
pub const SW_MUX_GPIO1_IO03: usize = 0x020E_0068;
pub const SW_PAD_GPIO1_IO03: usize = 0x020E_02F4;
pub const GPIO1_DR: usize = 0x0209_C000;
pub const GPIO1_GDIR: usize = 0x0209_C004;
pub const ALPHALED_REGS: [usize; 5] = [
    CCM_CCGR1,
    SW_MUX_GPIO1_IO03,
    SW_PAD_GPIO1_IO03,
    GPIO1_DR,
    GPIO1_GDIR,
];

/// A one-cell-address, one-cell-size tree with an `/alphaled` node carrying `reg`.
pub fn tree_with_reg(reg: &[u32]) -> DeviceTree {
    tree_with_cells(1, reg)
}

/// Like [tree_with_reg], with `addr_cells` address cells per `reg` entry.
pub fn tree_with_cells(addr_cells: u32, reg: &[u32]) -> DeviceTree {
    let mut tree = DeviceTree::new();
    let root = tree.root_id;
    tree.container[root].props = vec![
        Property::from_u32_list("#address-cells", &[addr_cells]),
        Property::from_u32_list("#size-cells", &[1]),
    ];
    tree.add_node(
        root,
        "alphaled",
        vec![
            Property::from_str("compatible", "alientek,imx6ul-led"),
            Property::from_str("status", "okay"),
            Property::from_u32_list("reg", reg),
        ],
    );
    tree
}

/// The board's description: five 4-byte registers.
pub fn alphaled_tree() -> DeviceTree {
    let reg: Vec<u32> = ALPHALED_REGS
        .iter()
        .flat_map(|phys| [*phys as u32, 4])
        .collect();
    tree_with_reg(&reg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Map(usize),
    MapRefused(usize),
    /// `value` is the register content at the moment of unmapping.
    Unmap { phys: usize, value: u32 },
}

struct BusState {
    cells: BTreeMap<usize, NonNull<u32>>,
    events: Vec<BusEvent>,
    fail_at: Option<usize>,
}

/// Heap-backed registers, one 32-bit cell per physical region start.
///
/// Cells outlive their mappings so tests can inspect them after unmap.
pub struct MockBus {
    state: RefCell<BusState>,
}

impl MockBus {
    pub fn new() -> MockBus {
        MockBus {
            state: RefCell::new(BusState {
                cells: BTreeMap::new(),
                events: Vec::new(),
                fail_at: None,
            }),
        }
    }

    /// A bus that refuses to map the region starting at `phys`.
    pub fn failing_at(phys: usize) -> MockBus {
        let bus = MockBus::new();
        bus.state.borrow_mut().fail_at = Some(phys);
        bus
    }

    fn cell(&self, phys: usize) -> NonNull<u32> {
        *self
            .state
            .borrow_mut()
            .cells
            .entry(phys)
            .or_insert_with(|| NonNull::from(Box::leak(Box::new(0u32))))
    }

    pub fn preset(&self, phys: usize, value: u32) {
        unsafe { write_volatile(self.cell(phys).as_ptr(), value) }
    }

    pub fn value(&self, phys: usize) -> u32 {
        unsafe { read_volatile(self.cell(phys).as_ptr()) }
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    pub fn unmap_count(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, BusEvent::Unmap { .. }))
            .count()
    }

    /// Register reads and writes made through mappings of this bus since the last call, by
    /// physical address.
    pub fn take_accesses(&self) -> Vec<Access> {
        let state = self.state.borrow();
        let phys_of = |virt: usize| {
            state
                .cells
                .iter()
                .find(|(_, cell)| cell.as_ptr() as usize == virt)
                .map(|(phys, _)| *phys)
        };
        trace::take()
            .into_iter()
            .filter_map(|access| match access {
                Access::Read(virt) => phys_of(virt).map(Access::Read),
                Access::Write(virt) => phys_of(virt).map(Access::Write),
            })
            .collect()
    }

    /// Mappings handed out and not yet released.
    pub fn live(&self) -> usize {
        let maps = self
            .state
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, BusEvent::Map(_)))
            .count();
        maps - self.unmap_count()
    }
}

impl IoMapper for MockBus {
    fn map(&self, phys: &IoRange) -> Option<NonNull<u32>> {
        if self.state.borrow().fail_at == Some(phys.start) {
            self.state
                .borrow_mut()
                .events
                .push(BusEvent::MapRefused(phys.start));
            return None;
        }
        let cell = self.cell(phys.start);
        self.state.borrow_mut().events.push(BusEvent::Map(phys.start));
        Some(cell)
    }

    fn unmap(&self, phys: &IoRange, virt: NonNull<u32>) {
        let value = unsafe { read_volatile(virt.as_ptr()) };
        self.state.borrow_mut().events.push(BusEvent::Unmap {
            phys: phys.start,
            value,
        });
    }
}

impl Drop for MockBus {
    fn drop(&mut self) {
        for cell in self.state.get_mut().cells.values() {
            drop(unsafe { Box::from_raw(cell.as_ptr()) });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameworkCall {
    AllocRegion { count: u32, name: String },
    RegisterRegion(DevId),
    UnregisterRegion(DevId),
    CdevAdd(DevId),
    CdevDel(DevId),
    ClassCreate(String),
    ClassDestroy,
    DeviceCreate(DevId, String),
    DeviceDestroy(DevId),
}

#[derive(Debug)]
pub struct MockClass;

#[derive(Debug)]
pub struct MockNode(DevId);

/// Records every framework request and can refuse one acquisition step.
pub struct MockTransport {
    pub calls: Vec<FrameworkCall>,
    pub dynamic_major: u32,
    fail: Option<RegistrationStep>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            calls: Vec::new(),
            dynamic_major: 245,
            fail: None,
        }
    }

    pub fn failing(step: RegistrationStep) -> MockTransport {
        MockTransport {
            fail: Some(step),
            ..MockTransport::new()
        }
    }

    fn check(&self, step: RegistrationStep) -> Result<(), i32> {
        if self.fail == Some(step) {
            Err(-errno::EBUSY)
        } else {
            Ok(())
        }
    }

    fn count(&self, pred: impl Fn(&FrameworkCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// Acquired framework resources that have not been released.
    pub fn outstanding(&self) -> usize {
        let acquired = self.count(|call| {
            matches!(
                call,
                FrameworkCall::AllocRegion { .. }
                    | FrameworkCall::RegisterRegion(_)
                    | FrameworkCall::CdevAdd(_)
                    | FrameworkCall::ClassCreate(_)
                    | FrameworkCall::DeviceCreate(..)
            )
        });
        let released = self.count(|call| {
            matches!(
                call,
                FrameworkCall::UnregisterRegion(_)
                    | FrameworkCall::CdevDel(_)
                    | FrameworkCall::ClassDestroy
                    | FrameworkCall::DeviceDestroy(_)
            )
        });
        acquired - released
    }

    pub fn node_visible(&self) -> bool {
        self.count(|call| matches!(call, FrameworkCall::DeviceCreate(..)))
            > self.count(|call| matches!(call, FrameworkCall::DeviceDestroy(_)))
    }
}

impl DeviceTransport for MockTransport {
    type Class = MockClass;
    type Node = MockNode;

    fn alloc_chrdev_region(&mut self, first_minor: u32, count: u32, name: &str) -> Result<DevId, i32> {
        self.check(RegistrationStep::DeviceNumber)?;
        self.calls.push(FrameworkCall::AllocRegion {
            count,
            name: String::from(name),
        });
        Ok(DevId::new(self.dynamic_major, first_minor))
    }

    fn register_chrdev_region(&mut self, first: DevId, _count: u32, _name: &str) -> Result<(), i32> {
        self.check(RegistrationStep::DeviceNumber)?;
        self.calls.push(FrameworkCall::RegisterRegion(first));
        Ok(())
    }

    fn unregister_chrdev_region(&mut self, first: DevId, _count: u32) {
        self.calls.push(FrameworkCall::UnregisterRegion(first));
    }

    fn cdev_add(&mut self, dev: DevId, _count: u32) -> Result<(), i32> {
        self.check(RegistrationStep::CharDevice)?;
        self.calls.push(FrameworkCall::CdevAdd(dev));
        Ok(())
    }

    fn cdev_del(&mut self, dev: DevId) {
        self.calls.push(FrameworkCall::CdevDel(dev));
    }

    fn class_create(&mut self, name: &str) -> Result<MockClass, i32> {
        self.check(RegistrationStep::Class)?;
        self.calls.push(FrameworkCall::ClassCreate(String::from(name)));
        Ok(MockClass)
    }

    fn class_destroy(&mut self, _class: MockClass) {
        self.calls.push(FrameworkCall::ClassDestroy);
    }

    fn device_create(&mut self, _class: &MockClass, dev: DevId, name: &str) -> Result<MockNode, i32> {
        self.check(RegistrationStep::DeviceNode)?;
        self.calls
            .push(FrameworkCall::DeviceCreate(dev, String::from(name)));
        Ok(MockNode(dev))
    }

    fn device_destroy(&mut self, _class: &MockClass, node: MockNode) {
        self.calls.push(FrameworkCall::DeviceDestroy(node.0));
    }
}
