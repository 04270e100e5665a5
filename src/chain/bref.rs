//! Block references - the logical identity of a node
//!
//! A block reference carries everything the cluster layer needs to
//! compare replicas of the same object: the kind, the key range, the
//! version (modify_tid) and the logical size. The physical offset is
//! per-device and never comparable across replicas.

use serde::{Deserialize, Serialize};

/// Low bits of `data_off` holding the size radix.
///
/// The radix survives scrubbing; the remaining bits are a device offset.
pub const OFF_MASK_RADIX: u64 = 0x3F;

/// Kind of object a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// No object (errored or unresolved projection)
    #[default]
    Empty,
    /// Inode
    Inode,
    /// Indirect block holding further block references
    Indirect,
    /// File data block
    Data,
    /// Directory entry
    DirEntry,
    /// Freemap interior node
    FreemapNode,
    /// Freemap leaf
    FreemapLeaf,
    /// Volume header
    Volume,
    /// Freemap root
    Freemap,
}

impl NodeKind {
    /// Returns true for kinds whose payload is an array of block references.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Indirect | NodeKind::FreemapNode | NodeKind::Volume | NodeKind::Freemap
        )
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Empty => "empty",
            NodeKind::Inode => "inode",
            NodeKind::Indirect => "indirect",
            NodeKind::Data => "data",
            NodeKind::DirEntry => "dirent",
            NodeKind::FreemapNode => "freemap_node",
            NodeKind::FreemapLeaf => "freemap_leaf",
            NodeKind::Volume => "volume",
            NodeKind::Freemap => "freemap",
        }
    }
}

/// Logical metadata of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRef {
    /// Object kind
    pub kind: NodeKind,
    /// Base key
    pub key: u64,
    /// Number of low key bits covered by this reference
    pub key_bits: u8,
    /// Version of the object
    pub modify_tid: u64,
    /// Logical size in bytes
    pub size: u64,
    /// Device offset with the size radix in the low bits
    pub data_off: u64,
}

impl BlockRef {
    /// Create a block reference with no physical placement.
    pub fn new(kind: NodeKind, key: u64, modify_tid: u64) -> Self {
        Self {
            kind,
            key,
            key_bits: 0,
            modify_tid,
            size: 0,
            data_off: 0,
        }
    }

    /// Set the key bits.
    pub fn with_key_bits(mut self, key_bits: u8) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Set the logical size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the raw data offset.
    pub fn with_data_off(mut self, data_off: u64) -> Self {
        self.data_off = data_off;
        self
    }

    /// Size radix encoded in the data offset.
    #[inline]
    pub fn radix(&self) -> u8 {
        (self.data_off & OFF_MASK_RADIX) as u8
    }

    /// Physical offset with the radix bits removed.
    #[inline]
    pub fn physical_offset(&self) -> u64 {
        self.data_off & !OFF_MASK_RADIX
    }

    /// Copy of this reference with the device offset removed.
    ///
    /// The radix is kept: callers use it to size buffers.
    pub fn scrubbed(&self) -> Self {
        Self {
            data_off: self.data_off & OFF_MASK_RADIX,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_keeps_radix_only() {
        let bref = BlockRef::new(NodeKind::Data, 0x1000, 7).with_data_off(0xABCD_0000 | 14);
        let scrubbed = bref.scrubbed();

        assert_eq!(scrubbed.physical_offset(), 0);
        assert_eq!(scrubbed.radix(), 14);
        assert_eq!(scrubbed.key, 0x1000);
        assert_eq!(scrubbed.modify_tid, 7);
    }

    #[test]
    fn test_container_kinds() {
        assert!(NodeKind::Indirect.is_container());
        assert!(NodeKind::Volume.is_container());
        assert!(!NodeKind::Inode.is_container());
        assert!(!NodeKind::Data.is_container());
        assert!(!NodeKind::Empty.is_container());
    }

    #[test]
    fn test_kind_deserializes_snake_case() {
        let kind: NodeKind = serde_json::from_str("\"freemap_leaf\"").unwrap();
        assert_eq!(kind, NodeKind::FreemapLeaf);
    }
}
