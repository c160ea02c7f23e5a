//! This module provides functionalities to resolve a flattened device tree

use bitflags::bitflags;

pub mod reader;
pub mod writer;

/// Flattened Device Tree header, decoded from its big-endian on-disk form.
#[derive(Debug, Clone, Copy)]
pub struct FdtHeader {
    pub magic: u32,
    pub totalsize: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 40;
}

/// Flattened Reserved Memory Entry
#[derive(Debug, Clone, Copy)]
pub struct ReservedMemoryEntry {
    pub addr: u64,
    pub size: u64,
}

bitflags! {
    /// Type tags found in the FDT structure block.
    pub struct FdtNodeType : u32{
        /// Begin a node (followed by its name string)
        const FDT_BEGIN_NODE  = 0x01;
        /// End a node
        const FDT_END_NODE    = 0x02;
        /// A property entry (length, nameoff, data)
        const FDT_PROP        = 0x03;
        /// No-op padding word
        const FDT_NOP         = 0x04;
        /// End of the structure block
        const FDT_END         = 0x09;
    }
}
