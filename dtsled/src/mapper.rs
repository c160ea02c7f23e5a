//! Mapping of resolved register regions into the driver's address space.
//!
//! A [RegionSet] owns every live mapping. Mapping stops at the first failure and the set is
//! dropped, which unmaps whatever was already mapped, newest first. Registers are only handed out
//! as borrows of the set, so no register can be touched after its region is unmapped.

use crate::{
    debug_ex,
    error::LedError,
    mmio::{IoRange, Register},
    resolver::{RegionDescriptor, RegionIndex, ResolvedRegions},
};
use alloc::vec::Vec;
use core::ptr::NonNull;
use log::warn;

/// Address-space mapping service (`ioremap` / `iounmap`).
pub trait IoMapper {
    /// Map `phys`, returning the address of its first register, or `None` on failure.
    fn map(&self, phys: &IoRange) -> Option<NonNull<u32>>;
    /// Release a mapping previously returned by [IoMapper::map] for `phys`.
    fn unmap(&self, phys: &IoRange, virt: NonNull<u32>);
}

impl<M: IoMapper + ?Sized> IoMapper for &M {
    fn map(&self, phys: &IoRange) -> Option<NonNull<u32>> {
        (**self).map(phys)
    }
    fn unmap(&self, phys: &IoRange, virt: NonNull<u32>) {
        (**self).unmap(phys, virt)
    }
}

/// One register region, either unmapped or backed by exactly one live mapping.
#[derive(Debug)]
pub struct RegionHandle {
    desc: RegionDescriptor,
    virt: Option<NonNull<u32>>,
}

// SAFETY: the handle refers to device memory, which is not tied to the thread that mapped it.
unsafe impl Send for RegionHandle {}

impl RegionHandle {
    pub fn new(desc: RegionDescriptor) -> RegionHandle {
        RegionHandle { desc, virt: None }
    }

    pub fn index(&self) -> RegionIndex {
        self.desc.index
    }

    pub fn is_mapped(&self) -> bool {
        self.virt.is_some()
    }

    /// Map the region. A handle that is already mapped keeps its mapping.
    pub fn map(&mut self, mapper: &impl IoMapper) -> Result<(), LedError> {
        if self.virt.is_some() {
            return Ok(());
        }
        let virt = mapper
            .map(&self.desc.phys)
            .ok_or(LedError::MapFailed(self.desc.index))?;
        self.virt = Some(virt);
        Ok(())
    }

    /// Unmap the region. Returns whether a mapping was released; unmapped handles are left alone.
    pub fn unmap(&mut self, mapper: &impl IoMapper) -> bool {
        match self.virt.take() {
            Some(virt) => {
                mapper.unmap(&self.desc.phys, virt);
                true
            }
            None => false,
        }
    }

    pub fn register(&self) -> Option<&Register<u32>> {
        // SAFETY: the mapping stays live until `unmap`, which needs `&mut self`.
        self.virt.map(|virt| unsafe { Register::from_ptr(virt) })
    }
}

/// The mapped regions of one attached device.
pub struct RegionSet<M: IoMapper> {
    mapper: M,
    handles: Vec<RegionHandle>,
}

impl<M: IoMapper> RegionSet<M> {
    /// Map every resolved region in order.
    ///
    /// On failure the regions mapped so far are unmapped before the error is returned.
    pub fn map_all(mapper: M, resolved: &ResolvedRegions) -> Result<RegionSet<M>, LedError> {
        let mut set = RegionSet {
            mapper,
            handles: Vec::with_capacity(RegionIndex::COUNT),
        };
        for desc in resolved.iter() {
            let mut handle = RegionHandle::new(desc.clone());
            handle.map(&set.mapper)?;
            debug_ex!("\tMapped {} region {:?}.", desc.index, desc.phys);
            set.handles.push(handle);
        }
        Ok(set)
    }

    pub fn mapped_count(&self) -> usize {
        self.handles.iter().filter(|handle| handle.is_mapped()).count()
    }

    /// Borrow the register of a mapped region.
    pub fn register(&self, index: RegionIndex) -> Option<&Register<u32>> {
        self.handles
            .iter()
            .find(|handle| handle.index() == index)
            .and_then(RegionHandle::register)
    }

    /// Unmap every live region, newest first. Returns how many mappings were released.
    pub fn unmap_all(&mut self) -> usize {
        let mut released = 0;
        for handle in self.handles.iter_mut().rev() {
            if handle.unmap(&self.mapper) {
                released += 1;
            }
        }
        released
    }
}

impl<M: IoMapper> Drop for RegionSet<M> {
    fn drop(&mut self) {
        let released = self.unmap_all();
        if released > 0 {
            warn!("Released {} mapped region(s) on unwind.", released);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resolver::resolve,
        testing::{self, BusEvent, MockBus, alphaled_tree},
    };

    fn resolved() -> ResolvedRegions {
        resolve(&alphaled_tree(), "/alphaled").unwrap()
    }

    #[test]
    fn maps_all_regions_in_order() {
        let bus = MockBus::new();
        let set = RegionSet::map_all(&bus, &resolved()).unwrap();
        assert_eq!(set.mapped_count(), 5);
        assert_eq!(
            bus.events(),
            testing::ALPHALED_REGS
                .iter()
                .map(|phys| BusEvent::Map(*phys))
                .collect::<Vec<_>>()
        );
        assert_eq!(bus.live(), 5);
    }

    #[test]
    fn failure_unmaps_earlier_regions_and_stops() {
        let bus = MockBus::failing_at(testing::SW_PAD_GPIO1_IO03);
        let err = RegionSet::map_all(&bus, &resolved()).err();
        assert_eq!(err, Some(LedError::MapFailed(RegionIndex::PadConfig)));
        assert_eq!(
            bus.events(),
            vec![
                BusEvent::Map(testing::CCM_CCGR1),
                BusEvent::Map(testing::SW_MUX_GPIO1_IO03),
                BusEvent::MapRefused(testing::SW_PAD_GPIO1_IO03),
                BusEvent::Unmap { phys: testing::SW_MUX_GPIO1_IO03, value: 0 },
                BusEvent::Unmap { phys: testing::CCM_CCGR1, value: 0 },
            ]
        );
        assert_eq!(bus.live(), 0);
    }

    #[test]
    fn unmap_all_is_idempotent() {
        let bus = MockBus::new();
        let mut set = RegionSet::map_all(&bus, &resolved()).unwrap();
        assert_eq!(set.unmap_all(), 5);
        assert_eq!(set.unmap_all(), 0);
        assert!(set.register(RegionIndex::Data).is_none());
        drop(set);
        assert_eq!(bus.unmap_count(), 5);
    }

    #[test]
    fn drop_unmaps_live_regions() {
        let bus = MockBus::new();
        let set = RegionSet::map_all(&bus, &resolved()).unwrap();
        drop(set);
        assert_eq!(bus.live(), 0);
        assert_eq!(bus.unmap_count(), 5);
    }

    #[test]
    fn register_reaches_backing_memory() {
        let bus = MockBus::new();
        bus.preset(testing::GPIO1_DR, 0xdead_0000);
        let set = RegionSet::map_all(&bus, &resolved()).unwrap();
        let data = set.register(RegionIndex::Data).unwrap();
        assert_eq!(data.read(), 0xdead_0000);
        data.write(0x1234);
        assert_eq!(bus.value(testing::GPIO1_DR), 0x1234);
    }

    #[test]
    fn handle_map_twice_keeps_single_mapping() {
        let bus = MockBus::new();
        let desc = resolved().get(RegionIndex::Data).clone();
        let mut handle = RegionHandle::new(desc);
        handle.map(&bus).unwrap();
        handle.map(&bus).unwrap();
        assert_eq!(bus.live(), 1);
        assert!(handle.unmap(&bus));
        assert!(!handle.unmap(&bus));
        assert_eq!(bus.live(), 0);
    }
}
