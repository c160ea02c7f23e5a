use alloc::{boxed::Box, vec::Vec};
use core::str;

/// A named device tree property. The payload is kept exactly as stored in the blob (big-endian).
#[derive(Debug, Clone)]
pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: impl AsRef<str>, data: &[u8]) -> Property {
        Property {
            name: Box::from(name.as_ref()),
            data: Box::from(data),
        }
    }

    /// Build a property whose value is a list of big-endian cells, e.g. `reg = <0x20c406c 4>`.
    pub fn from_u32_list(name: impl AsRef<str>, cells: &[u32]) -> Property {
        let data: Vec<u8> = cells.iter().flat_map(|cell| cell.to_be_bytes()).collect();
        Property {
            name: Box::from(name.as_ref()),
            data: data.into_boxed_slice(),
        }
    }

    /// Build a NUL-terminated string property.
    pub fn from_str(name: impl AsRef<str>, value: &str) -> Property {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Property {
            name: Box::from(name.as_ref()),
            data: data.into_boxed_slice(),
        }
    }

    fn value_as_bytes<const N: usize>(&self) -> Result<[u8; N], PropertyError> {
        self.data
            .get(0..N)
            .and_then(|head| head.try_into().ok())
            .ok_or(PropertyError::InvalidPropFormat)
    }
}

impl Property {
    pub fn value_as_u32(&self) -> Result<u32, PropertyError> {
        Ok(u32::from_be_bytes(self.value_as_bytes()?))
    }
    pub fn value_as_u64(&self) -> Result<u64, PropertyError> {
        Ok(u64::from_be_bytes(self.value_as_bytes()?))
    }
    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        str::from_utf8(&self.data)
            .map(|s| s.trim_end_matches('\0'))
            .map_err(|_| PropertyError::InvalidPropFormat)
    }
    pub fn value_as_strlist(&self) -> Result<Vec<&str>, PropertyError> {
        let mut res = Vec::new();
        let mut rest: &[u8] = &self.data;
        while !rest.is_empty() {
            let end = rest.iter().position(|b| *b == 0).unwrap_or(rest.len()); // last may be unterminated
            res.push(str::from_utf8(&rest[..end]).map_err(|_| PropertyError::InvalidPropFormat)?);
            rest = rest.get(end + 1..).unwrap_or(&[]);
        }
        Ok(res)
    }
    /// Decode the payload as a list of big-endian 32-bit cells.
    pub fn value_as_u32_list(&self) -> Result<Vec<u32>, PropertyError> {
        if self.data.len() % 4 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|cell| u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
    PropNotFound,
}
