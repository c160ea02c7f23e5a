//! Resolution of the LED's register regions from the device tree.
//!
//! The node's `reg` property lists five `(address, size)` entries whose positions are fixed by
//! [RegionIndex]. Resolution is all-or-nothing: either every region resolves or nothing is
//! returned.

use crate::{
    debug_ex,
    error::ConfigError,
    mmio::{IoRange, IoRangeValidationType},
};
use alloc::vec::Vec;
use core::fmt::{self, Display};
use dt::{node::DeviceTree, prop::PropertyError};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Position of each register region inside the node's `reg` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum RegionIndex {
    /// CCM_CCGR1: clock gates, shared with unrelated peripherals.
    ClockGate = 0,
    /// SW_MUX_CTL_PAD: function select, dedicated to the pin.
    PinMux = 1,
    /// SW_PAD_CTL_PAD: electrical settings, dedicated to the pin.
    PadConfig = 2,
    /// GPIO_DR: output levels of the whole port.
    Data = 3,
    /// GPIO_GDIR: directions of the whole port.
    Direction = 4,
}

impl RegionIndex {
    pub const COUNT: usize = 5;
    /// All regions in `reg` order, which is also the mapping order.
    pub const ALL: [RegionIndex; Self::COUNT] = [
        RegionIndex::ClockGate,
        RegionIndex::PinMux,
        RegionIndex::PadConfig,
        RegionIndex::Data,
        RegionIndex::Direction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RegionIndex::ClockGate => "clock-gate",
            RegionIndex::PinMux => "pin-mux",
            RegionIndex::PadConfig => "pad-config",
            RegionIndex::Data => "data",
            RegionIndex::Direction => "direction",
        }
    }
}

impl Display for RegionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resolved region: where it lives physically and which role it plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub index: RegionIndex,
    pub phys: IoRange,
}

/// The five descriptors of a fully resolved node, in [RegionIndex::ALL] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegions {
    descriptors: Vec<RegionDescriptor>,
}

impl ResolvedRegions {
    pub fn iter(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.descriptors.iter()
    }
    pub fn get(&self, index: RegionIndex) -> &RegionDescriptor {
        &self.descriptors[usize::from(index)]
    }
}

/// Look up `path` in `tree` and resolve its five register regions.
pub fn resolve(tree: &DeviceTree, path: &str) -> Result<ResolvedRegions, ConfigError> {
    let node = tree.get_node(path).ok_or(ConfigError::NodeNotFound)?;
    let regs = match tree.get_reg_value(node) {
        Ok(regs) => regs,
        Err(PropertyError::PropNotFound) => {
            return Err(ConfigError::RegionMissing(RegionIndex::ClockGate));
        }
        Err(err) => return Err(ConfigError::InvalidReg(err)),
    };
    let mut descriptors = Vec::with_capacity(RegionIndex::COUNT);
    for index in RegionIndex::ALL {
        let phys = regs
            .get(usize::from(index))
            .map(|range| IoRange::from(range.clone()))
            .ok_or(ConfigError::RegionMissing(index))?;
        if !phys.validate::<u32>(IoRangeValidationType::Compatible) {
            return Err(ConfigError::RegionTooSmall(index));
        }
        debug_ex!("\t{} region at {:?}.", index, phys);
        descriptors.push(RegionDescriptor { index, phys });
    }
    Ok(ResolvedRegions { descriptors })
}
