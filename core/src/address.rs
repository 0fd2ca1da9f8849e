//! Storage addresses of tree nodes.
//!
//! An address packs the number of the page a node lives in together with the node's slot (`tid`)
//! within that page into a single `u64`, so that in-memory indexes holding millions of node
//! addresses stay compact:
//!
//! ```text
//!  63                               32 31             16 15              0
//! +-----------------------------------+-----------------+-----------------+
//! |               page                |      flags      |       tid       |
//! +-----------------------------------+-----------------+-----------------+
//! ```
//!
//! The flags are optional and do not participate in identity: two addresses refer to the same
//! node whenever page and tid match (see [`addr_eq`]).

use core::fmt;

use crate::{
    error::DecodeError,
    varint::{ByteReader, ByteWriter},
};

pub const TID_MASK: u64 = 0x0000_0000_0000_FFFF;
pub const FLAGS_MASK: u64 = 0x0000_0000_FFFF_0000;
pub const PAGE_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// Selects the bits that identify a node: page and tid, but not the flags.
pub const ADDRESS_EQ_MASK: u64 = PAGE_MASK | TID_MASK;

const FLAGS_SHIFT: u32 = 16;
const PAGE_SHIFT: u32 = 32;

/// Marks an address that has not been assigned yet.
pub const UNKNOWN_ADDRESS: u64 = u64::MAX;

/// Packs a page number and a slot id into an address with no flags.
pub const fn encode(page: u32, tid: i16) -> u64 {
    ((page as u64) << PAGE_SHIFT) | (tid as u16 as u64)
}

/// Packs a page number, a slot id and flags into an address.
pub const fn encode_with_flags(page: u32, tid: i16, flags: i16) -> u64 {
    encode(page, tid) | ((flags as u16 as u64) << FLAGS_SHIFT)
}

pub const fn page_of(ptr: u64) -> u32 {
    (ptr >> PAGE_SHIFT) as u32
}

pub const fn tid_of(ptr: u64) -> i16 {
    (ptr & TID_MASK) as u16 as i16
}

pub const fn flags_of(ptr: u64) -> i16 {
    ((ptr & FLAGS_MASK) >> FLAGS_SHIFT) as u16 as i16
}

/// Whether both addresses locate the same node. The flags are ignored.
pub const fn addr_eq(p0: u64, p1: u64) -> bool {
    p0 & ADDRESS_EQ_MASK == p1 & ADDRESS_EQ_MASK
}

/// Persists an address as three variable-length fields: page, tid and flags.
pub fn write(ptr: u64, out: &mut ByteWriter) {
    out.write_u32(page_of(ptr));
    out.write_i16(tid_of(ptr));
    out.write_i16(flags_of(ptr));
}

/// Reads an address previously persisted with [`write`].
pub fn read(input: &mut ByteReader<'_>) -> Result<u64, DecodeError> {
    // Read through a copy so that a failure part way leaves `input` untouched.
    let mut reader = input.clone();
    let page = reader.read_u32()?;
    let tid = reader.read_i16()?;
    let flags = reader.read_i16()?;
    *input = reader;
    Ok(encode_with_flags(page, tid, flags))
}

/// A typed wrapper around a packed address.
///
/// Equality compares the full 64 bits, flags included. Use [`StorageAddress::same_node`] to
/// compare node identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageAddress(u64);

impl StorageAddress {
    pub const UNKNOWN: Self = Self(UNKNOWN_ADDRESS);

    pub const fn new(page: u32, tid: i16) -> Self {
        Self(encode(page, tid))
    }

    pub const fn with_flags(page: u32, tid: i16, flags: i16) -> Self {
        Self(encode_with_flags(page, tid, flags))
    }

    pub const fn from_raw(ptr: u64) -> Self {
        Self(ptr)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn page(&self) -> u32 {
        page_of(self.0)
    }

    pub const fn tid(&self) -> i16 {
        tid_of(self.0)
    }

    pub const fn flags(&self) -> i16 {
        flags_of(self.0)
    }

    pub const fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ADDRESS
    }

    pub const fn same_node(&self, other: &Self) -> bool {
        addr_eq(self.0, other.0)
    }
}

impl From<u64> for StorageAddress {
    fn from(ptr: u64) -> Self {
        Self(ptr)
    }
}

impl From<StorageAddress> for u64 {
    fn from(addr: StorageAddress) -> Self {
        addr.0
    }
}

impl fmt::Debug for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAddress")
            .field("page", &self.page())
            .field("tid", &self.tid())
            .field("flags", &self.flags())
            .finish()
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "unknown");
        }
        write!(f, "{}:{}", self.page(), self.tid())
    }
}
