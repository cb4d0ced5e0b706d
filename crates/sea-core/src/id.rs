//! Stable ID newtypes shared by every layer of the analysis core.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `NodeId` cannot be accidentally used where an `AliasId` is
//! expected.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable node identifier. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of an alias class in the memory alias split tree.
///
/// Bit 0 is reserved for nil; see `sea_core::bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AliasId(pub u32);

/// Function index (fidx) in the function split tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FidxId(pub u32);

/// Identity of a type variable (TV3) in the union-find forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TvId(pub u32);

impl fmt::Display for TvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tv{}", self.0)
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AliasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

impl fmt::Display for FidxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

// Bridge between NodeId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl AliasId {
    /// Bit 0: reserved nil alias.
    pub const NIL: AliasId = AliasId(0);
    /// Bit 1: the "all aliases" top element.
    pub const ALL: AliasId = AliasId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FidxId {
    pub const NIL: FidxId = FidxId(0);
    pub const ALL: FidxId = FidxId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
