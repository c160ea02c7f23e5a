//! Device tree model and flattened device tree (DTB) reader.
//!
//! [node::DeviceTree] is the in-memory form every consumer works with; it is either read from a
//! DTB blob with [fdt::reader::FdtReader] or assembled programmatically.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod fdt;
pub mod node;
pub mod prop;
