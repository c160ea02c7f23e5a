use core::{
    cell::UnsafeCell,
    fmt::Debug,
    ops::Range,
    ptr::{NonNull, read_volatile, write_volatile},
};
use utils::impl_basic;

/// A memory-mapped register. Every access is a volatile load or store.
#[repr(transparent)]
pub struct Register<T: Sized + Copy> {
    inner: UnsafeCell<T>,
}

impl<T: Sized + Copy> Register<T> {
    /// View the register living at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live mapping of at least `size_of::<T>()` bytes that outlives `'a`.
    #[inline(always)]
    pub unsafe fn from_ptr<'a>(ptr: NonNull<T>) -> &'a Register<T> {
        // SAFETY: `Register<T>` is `repr(transparent)` over `T`; validity is on the caller.
        unsafe { &*(ptr.as_ptr() as *const Register<T>) }
    }
    #[inline(always)]
    pub fn read(&self) -> T {
        #[cfg(test)]
        trace::record(trace::Access::Read(self.inner.get() as usize));
        unsafe { read_volatile(self.inner.get()) }
    }
    #[inline(always)]
    pub fn write(&self, value: T) {
        #[cfg(test)]
        trace::record(trace::Access::Write(self.inner.get() as usize));
        unsafe {
            write_volatile(self.inner.get(), value);
        }
    }
    /// Read, transform and write back. Bits untouched by `f` keep their value.
    #[inline(always)]
    pub fn modify(&self, f: impl FnOnce(T) -> T) {
        self.write(f(self.read()));
    }
}

/// A physical address range, as found in a `reg` entry.
#[derive(Clone, PartialEq, Eq)]
pub struct IoRange {
    inner: Range<usize>,
}

impl_basic!(IoRange, Range<usize>);

impl IoRange {
    pub fn validate<T: Sized>(&self, val_type: IoRangeValidationType) -> bool {
        let self_size = self.len();
        let size = size_of::<T>();
        match val_type {
            IoRangeValidationType::Fit => self_size == size,
            IoRangeValidationType::Compatible => self_size >= size,
        }
    }
}

impl Debug for IoRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("[{:#x},{:#x})", self.start, self.end))
    }
}

pub enum IoRangeValidationType {
    /// The size of the IO range is exactly the same as the size of io memmap struct
    Fit,
    /// The size of the IO range equal or is greater than the size of io memmap struct
    Compatible,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_preserves_other_bits() {
        let mut cell = 0xA5A5_0000u32;
        let reg = unsafe { Register::from_ptr(NonNull::from(&mut cell)) };
        reg.modify(|v| v | 0x3);
        assert_eq!(reg.read(), 0xA5A5_0003);
        reg.write(0x10);
        assert_eq!(reg.read(), 0x10);
    }

    #[test]
    fn accesses_are_traced_in_order() {
        let mut cell = 0u32;
        let reg = unsafe { Register::from_ptr(NonNull::from(&mut cell)) };
        let addr = reg as *const Register<u32> as usize;
        trace::take();
        reg.modify(|v| v | 1);
        reg.write(2);
        assert_eq!(
            trace::take(),
            vec![
                trace::Access::Read(addr),
                trace::Access::Write(addr),
                trace::Access::Write(addr),
            ]
        );
    }

    #[test]
    fn range_validation() {
        let word = IoRange::from(0x0209c000..0x0209c004);
        assert!(word.validate::<u32>(IoRangeValidationType::Fit));
        assert!(word.validate::<u16>(IoRangeValidationType::Compatible));
        assert!(!word.validate::<u64>(IoRangeValidationType::Compatible));
        assert!(!IoRange::from(0x10..0x10).validate::<u32>(IoRangeValidationType::Compatible));
    }

    #[test]
    fn debug_prints_hex_bounds() {
        assert_eq!(
            format!("{:?}", IoRange::from(0x20c406c..0x20c4070)),
            "[0x20c406c,0x20c4070)"
        );
    }
}
