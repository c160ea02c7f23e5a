use core::{mem::swap, ops::Range, str};

use crate::{
    fdt::{FdtHeader, FdtNodeType, ReservedMemoryEntry},
    node::{DeviceTree, Node},
    prop::Property,
};
use alloc::{vec, vec::Vec};
use utils::num::AlignableTo;

/// Parser turning a DTB blob into a [DeviceTree].
///
/// All strings and byte arrays are **copied** into the resulting tree, so the blob may be
/// dropped once [FdtReader::read] returns.
pub struct FdtReader<'a> {
    blob: &'a [u8],
    cursor: usize,
    nodes: Vec<Node>,
}

/// Basic Reader Functions
impl<'a> FdtReader<'a> {
    #[inline(always)]
    fn word_at(&self, offset: usize) -> Result<u32, FdtError> {
        self.blob
            .get(offset..offset + 4)
            .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            .ok_or(FdtError::Truncated { offset })
    }

    #[inline(always)]
    fn dword_at(&self, offset: usize) -> Result<u64, FdtError> {
        Ok((u64::from(self.word_at(offset)?) << 32) | u64::from(self.word_at(offset + 4)?))
    }

    /// Read a 32-bit big-endian word at the cursor without advancing.
    #[inline(always)]
    fn peek_u32(&self) -> Result<u32, FdtError> {
        self.word_at(self.cursor)
    }

    /// Advance the cursor by 4 bytes.
    #[inline(always)]
    fn advance(&mut self) {
        self.cursor += 4;
    }

    /// Read a 32-bit big-endian word and advance the cursor by 4 bytes.
    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32, FdtError> {
        let res = self.peek_u32()?;
        self.advance();
        Ok(res)
    }

    /// Read `len` bytes at the cursor and move the cursor to the next 4-byte aligned position.
    #[inline(always)]
    fn readbytes_aligned(&mut self, len: usize) -> Result<&'a [u8], FdtError> {
        let res = self
            .blob
            .get(self.cursor..self.cursor + len)
            .ok_or(FdtError::Truncated {
                offset: self.cursor,
            })?;
        self.cursor = (self.cursor + len).align_up(4);
        Ok(res)
    }

    /// Skip zero words and NOPs up to the next meaningful token.
    #[inline(always)]
    fn skip(&mut self) -> Result<(), FdtError> {
        let mut p = self.peek_u32()?;
        while p == 0 || p == FdtNodeType::FDT_NOP.bits() {
            self.advance();
            p = self.peek_u32()?;
        }
        Ok(())
    }

    /// Find the NUL terminating a string that starts at `start`, bounded by `end`.
    fn cstr_at(&self, start: usize, end: usize) -> Result<&'a str, FdtError> {
        let bytes = self
            .blob
            .get(start..end.min(self.blob.len()))
            .ok_or(FdtError::Truncated { offset: start })?;
        let len = bytes
            .iter()
            .position(|b| *b == 0)
            .ok_or(FdtError::Truncated { offset: start })?;
        str::from_utf8(&bytes[..len]).map_err(|_| FdtError::InvalidString { offset: start })
    }

    /// Read a NUL-terminated string at the cursor and move to the next aligned position.
    #[inline(always)]
    fn readstr_aligned(&mut self) -> Result<&'a str, FdtError> {
        let s = self.cstr_at(self.cursor, self.blob.len())?;
        self.cursor = (self.cursor + s.len() + 1).align_up(4);
        Ok(s)
    }

    /// Read a tag word and verify it equals `supposed`.
    fn read_and_check(&mut self, supposed: FdtNodeType) -> Result<(), FdtError> {
        let node_type = self.read_u32()?;
        if node_type != supposed.bits() {
            return Err(FdtError::InvalidNodeType {
                node_type: node_type as usize,
                cursor: self.cursor,
            });
        }
        Ok(())
    }
}

impl<'a> FdtReader<'a> {
    /// Expected FDT magic number (0xd00dfeed).
    pub const FDT_MAGIC: u32 = 0xd00dfeed;
    /// The FDT version this parser targets.
    pub const FDT_VERSION: u32 = 17;
    /// The last compatible FDT version accepted by this parser.
    pub const LAST_COMP_VERSION: u32 = 16;

    /// Create a reader over a DTB blob. Call [Self::validate] before [Self::read].
    pub fn new(blob: &'a [u8]) -> FdtReader<'a> {
        FdtReader {
            blob,
            cursor: 0,
            nodes: vec![],
        }
    }

    /// Decode the FDT header.
    pub fn get_header(&self) -> Result<FdtHeader, FdtError> {
        if self.blob.len() < FdtHeader::SIZE {
            return Err(FdtError::Truncated {
                offset: self.blob.len(),
            });
        }
        Ok(FdtHeader {
            magic: self.word_at(0)?,
            totalsize: self.word_at(4)?,
            off_dt_struct: self.word_at(8)?,
            off_dt_strings: self.word_at(12)?,
            off_mem_rsvmap: self.word_at(16)?,
            version: self.word_at(20)?,
            last_comp_version: self.word_at(24)?,
            boot_cpuid_phys: self.word_at(28)?,
            size_dt_strings: self.word_at(32)?,
            size_dt_struct: self.word_at(36)?,
        })
    }

    /// Validate the FDT header (magic number and compatible version range).
    pub fn validate(&self) -> Result<(), FdtError> {
        let header = self.get_header()?;

        // 1. Check the magic number
        if header.magic != Self::FDT_MAGIC {
            return Err(FdtError::InvalidMagic {
                magic: header.magic as usize,
            });
        }

        // 2. We use version 17, and the last compatible version is 16
        if header.version < Self::LAST_COMP_VERSION
            || header.last_comp_version > Self::FDT_VERSION
        {
            return Err(FdtError::IncompatibleVersion {
                version: header.version as usize,
            });
        }
        if header.totalsize as usize > self.blob.len() {
            return Err(FdtError::Truncated {
                offset: self.blob.len(),
            });
        }
        Ok(())
    }

    /// Read a null-terminated string from the FDT string table at `offset`.
    pub fn get_string(&self, offset: usize) -> Result<&'a str, FdtError> {
        let header = self.get_header()?;
        let start = header.off_dt_strings as usize + offset;
        self.cstr_at(start, header.totalsize as usize)
    }

    /// Read consecutive property entries from the structure block.
    ///
    /// Stops when a non-`FDT_PROP` tag is encountered and returns the collected props.
    fn read_props(&mut self) -> Result<Vec<Property>, FdtError> {
        let mut res = Vec::<Property>::new();
        loop {
            self.skip()?;
            if self.peek_u32()? != FdtNodeType::FDT_PROP.bits() {
                break Ok(res);
            }
            self.advance();
            let len = self.read_u32()? as usize;
            let name_offset = self.read_u32()? as usize;
            let name = self.get_string(name_offset)?;
            let data = self.readbytes_aligned(len)?;
            res.push(Property::new(name, data));
        }
    }

    /// Parse a single node (name, properties and child nodes) without setting its parent.
    ///
    /// Recursively parses subnodes until the matching `FDT_END_NODE` is found.
    fn read_node(&mut self) -> Result<usize, FdtError> {
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_BEGIN_NODE)?;
        let full_name = self.readstr_aligned()?;
        let props = self.read_props()?;
        let mut children = vec![];
        loop {
            self.skip()?;
            let nodetype = self.peek_u32()?;
            if nodetype == FdtNodeType::FDT_BEGIN_NODE.bits() {
                children.push(self.read_node()?);
            } else if nodetype == FdtNodeType::FDT_END_NODE.bits() {
                self.advance();
                break;
            } else {
                return Err(FdtError::InvalidNodeType {
                    node_type: nodetype as usize,
                    cursor: self.cursor,
                });
            }
        }
        let id = self.nodes.len();
        let mut node = Node::new(id, 0, full_name, props);
        node.children = children;
        self.nodes.push(node);
        Ok(id)
    }

    fn set_parent(&mut self, node_id: usize) {
        for child_idx in 0..self.nodes[node_id].children.len() {
            let sub_id = self.nodes[node_id].children[child_idx];
            self.nodes[sub_id].parent_id = node_id;
            self.set_parent(sub_id);
        }
    }

    /// Read the memory reservation map, terminated by an all-zero entry.
    ///
    /// **The reserved memory blocks are not promised to be non-overlapping.**
    fn get_mem_rsv_map(&self) -> Result<Vec<Range<usize>>, FdtError> {
        let header = self.get_header()?;
        let mut offset = header.off_mem_rsvmap as usize;
        let mut res = Vec::new();
        loop {
            let block = ReservedMemoryEntry {
                addr: self.dword_at(offset)?,
                size: self.dword_at(offset + 8)?,
            };
            if block.addr == 0 && block.size == 0 {
                break;
            }
            res.push(Range {
                start: block.addr as usize,
                end: (block.addr + block.size) as usize,
            });
            offset += 16;
        }
        Ok(res)
    }

    fn read_internal(&mut self) -> Result<DeviceTree, FdtError> {
        self.cursor = self.get_header()?.off_dt_struct as usize;
        let root_id = self.read_node()?;
        self.set_parent(root_id);
        self.nodes[root_id].parent_id = root_id;
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_END)?;

        let mut tree = DeviceTree {
            root_id,
            container: vec![],
            mem_rsv_map: self.get_mem_rsv_map()?,
        };
        swap(&mut self.nodes, &mut tree.container);
        Ok(tree)
    }

    /// Parse the entire structure block into a [DeviceTree].
    ///
    /// On failure the reader is rewound and may be used again.
    pub fn read(&mut self) -> Result<DeviceTree, FdtError> {
        match self.read_internal() {
            Ok(res) => Ok(res),
            Err(err) => {
                self.cursor = 0;
                self.nodes.clear();
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    InvalidNodeType { node_type: usize, cursor: usize },
    InvalidMagic { magic: usize },
    IncompatibleVersion { version: usize },
    InvalidString { offset: usize },
    Truncated { offset: usize },
}
