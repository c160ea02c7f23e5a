use crate::{
    fdt::{FdtHeader, FdtNodeType, ReservedMemoryEntry, reader::FdtReader},
    prop::Property,
};
use alloc::vec::Vec;
use utils::num::AlignableTo;

/// Builder producing a DTB blob that [FdtReader] accepts.
///
/// Nodes are emitted in call order; every [FdtWriter::begin_node] needs a matching
/// [FdtWriter::end_node], starting with the unnamed root.
pub struct FdtWriter {
    structure: Vec<u8>,
    strings: Vec<u8>,
    reserved: Vec<ReservedMemoryEntry>,
}

impl FdtWriter {
    pub fn new() -> FdtWriter {
        FdtWriter {
            structure: Vec::new(),
            strings: Vec::new(),
            reserved: Vec::new(),
        }
    }

    fn word(&mut self, w: u32) -> &mut Self {
        self.structure.extend_from_slice(&w.to_be_bytes());
        self
    }

    fn pad(&mut self) {
        let len = self.structure.len().align_up(4);
        self.structure.resize(len, 0);
    }

    /// Offset of `name` in the strings block, appending it if absent.
    fn string_offset(&mut self, name: &str) -> u32 {
        let mut offset = 0;
        for s in self.strings.split(|b| *b == 0) {
            if s == name.as_bytes() && offset < self.strings.len() {
                return offset as u32;
            }
            offset += s.len() + 1;
        }
        let offset = self.strings.len();
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        offset as u32
    }

    /// Add a memory reservation entry.
    pub fn reserve(&mut self, addr: u64, size: u64) -> &mut Self {
        self.reserved.push(ReservedMemoryEntry { addr, size });
        self
    }

    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.word(FdtNodeType::FDT_BEGIN_NODE.bits());
        self.structure.extend_from_slice(name.as_bytes());
        self.structure.push(0);
        self.pad();
        self
    }

    pub fn end_node(&mut self) -> &mut Self {
        self.word(FdtNodeType::FDT_END_NODE.bits())
    }

    pub fn nop(&mut self) -> &mut Self {
        self.word(FdtNodeType::FDT_NOP.bits())
    }

    pub fn prop(&mut self, name: &str, data: &[u8]) -> &mut Self {
        let name_off = self.string_offset(name);
        self.word(FdtNodeType::FDT_PROP.bits())
            .word(data.len() as u32)
            .word(name_off);
        self.structure.extend_from_slice(data);
        self.pad();
        self
    }

    pub fn prop_u32_list(&mut self, name: &str, cells: &[u32]) -> &mut Self {
        let prop = Property::from_u32_list(name, cells);
        self.prop(name, &prop.data)
    }

    pub fn prop_str(&mut self, name: &str, value: &str) -> &mut Self {
        let prop = Property::from_str(name, value);
        self.prop(name, &prop.data)
    }

    /// Terminate the structure block and lay out header, reservation map, structure and strings.
    pub fn finish(mut self) -> Vec<u8> {
        self.word(FdtNodeType::FDT_END.bits());
        let off_mem_rsvmap = FdtHeader::SIZE;
        let rsv_len = (self.reserved.len() + 1) * 16;
        let off_dt_struct = off_mem_rsvmap + rsv_len;
        let off_dt_strings = off_dt_struct + self.structure.len();
        let totalsize = off_dt_strings + self.strings.len();

        let mut out = Vec::with_capacity(totalsize);
        for w in [
            FdtReader::FDT_MAGIC,
            totalsize as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            off_mem_rsvmap as u32,
            FdtReader::FDT_VERSION,
            FdtReader::LAST_COMP_VERSION,
            0,
            self.strings.len() as u32,
            self.structure.len() as u32,
        ] {
            out.extend_from_slice(&w.to_be_bytes());
        }
        let terminator = ReservedMemoryEntry { addr: 0, size: 0 };
        for entry in self.reserved.iter().chain([&terminator]) {
            out.extend_from_slice(&entry.addr.to_be_bytes());
            out.extend_from_slice(&entry.size.to_be_bytes());
        }
        out.extend_from_slice(&self.structure);
        out.extend_from_slice(&self.strings);
        out
    }
}

impl Default for FdtWriter {
    fn default() -> Self {
        Self::new()
    }
}
