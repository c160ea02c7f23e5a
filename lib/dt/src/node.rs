use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::ops::Range;

/// An in-memory device tree. Nodes live in a flat container and refer to each other by index.
pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
    pub mem_rsv_map: Vec<Range<usize>>,
}

pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
}

impl Node {
    /// Create a detached node, splitting `name@unit` into its node name and unit address.
    pub fn new(node_id: usize, parent_id: usize, full_name: &str, props: Vec<Property>) -> Node {
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        Node {
            node_id,
            parent_id,
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children: vec![],
            props,
        }
    }
}

impl DeviceTree {
    /// Create a tree holding only an empty root node.
    pub fn new() -> DeviceTree {
        DeviceTree {
            root_id: 0,
            container: vec![Node::new(0, 0, "", vec![])],
            mem_rsv_map: vec![],
        }
    }

    /// Append a child under `parent_id` and return its id.
    pub fn add_node(&mut self, parent_id: usize, full_name: &str, props: Vec<Property>) -> usize {
        let id = self.container.len();
        self.container.push(Node::new(id, parent_id, full_name, props));
        self.container[parent_id].children.push(id);
        id
    }

    pub fn root(&self) -> &Node {
        &self.container[self.root_id]
    }
    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }
    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::from("")
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }
    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        let path = self.full_path(node);
        if path.is_empty() {
            Box::from("/")
        } else {
            path.into_boxed_str()
        }
    }
    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }
    pub fn get_children<'b>(&'b self, node: &Node) -> impl Iterator<Item = &'b Node> {
        node.children.iter().map(|x| &self.container[*x])
    }
    pub fn get_property<'b>(&self, node: &'b Node, name: impl AsRef<str>) -> Option<&'b Property> {
        let name = name.as_ref();
        node.props.iter().find(|prop| prop.name.as_ref() == name)
    }
    /// Look up a node by its absolute path, e.g. `/soc/gpio@209c000`.
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<&Node> {
        let mut node = self.root();
        for section in path.as_ref().split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|subnode| subnode.full_name.as_ref() == section)?;
        }
        Some(node)
    }
    fn get_cells(&self, node: &Node, name: &str, default: usize) -> Result<usize, PropertyError> {
        match self.get_property(node, name) {
            Some(prop) => Ok(prop.value_as_u32()? as usize),
            None => Ok(default),
        }
    }
    /// Decode the `reg` property of `node` into physical ranges, one per `(address, size)` tuple.
    ///
    /// Cell widths come from the parent's `#address-cells` (default 2) and `#size-cells` (default 1).
    pub fn get_reg_value(&self, node: &Node) -> Result<Vec<Range<usize>>, PropertyError> {
        let mut size_cel = 1;
        let mut addr_cel = 2;
        if !self.is_root(node) {
            let parent = self.get_parent(node);
            addr_cel = self.get_cells(parent, "#address-cells", addr_cel)?;
            size_cel = self.get_cells(parent, "#size-cells", size_cel)?;
        }
        let reg = self
            .get_property(node, "reg")
            .ok_or(PropertyError::PropNotFound)?
            .value_as_u32_list()?;
        let width = size_cel + addr_cel;
        if width == 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        let mut res = vec![];
        for entry in reg.chunks_exact(width) {
            let (addr_cells, size_cells) = entry.split_at(addr_cel);
            let addr = fold_cells(addr_cells)?;
            let sz = fold_cells(size_cells)?;
            let end = addr
                .checked_add(sz)
                .ok_or(PropertyError::InvalidPropFormat)?;
            res.push(Range { start: addr, end });
        }
        Ok(res)
    }
}

/// Concatenate big-endian cells into one number, most significant cell first.
///
/// Fails if the value does not fit in a `usize` on this target.
fn fold_cells(cells: &[u32]) -> Result<usize, PropertyError> {
    let value = cells.iter().try_fold(0u64, |acc, cell| {
        (acc >> 32 == 0).then(|| (acc << 32) | u64::from(*cell))
    });
    value
        .and_then(|value| usize::try_from(value).ok())
        .ok_or(PropertyError::InvalidPropFormat)
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}
