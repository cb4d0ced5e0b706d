//! Node opcodes for the sea-of-nodes SSA graph.
//!
//! The concrete primitive library (arithmetic, comparisons, ...) is an
//! external collaborator: this crate does not enumerate
//! individual operators. Instead a [`Op::Prim`] node is "bound by name" the
//! way the inbound builder API describes, and the contract-bearing node
//! kinds the driver itself must understand -- If, Call/CallEpi, New,
//! ForwardRef, Fun/Ret/Parm/Proj, Region/Phi -- are enumerated explicitly.

use sea_core::{AliasId, FidxId};
use sea_types::Type;
use serde::{Deserialize, Serialize};

// `Op` itself cannot derive `Serialize`/`Deserialize`: `Con(Type)` holds a
// hash-consed `Type`, which needs a `TypeInterner` to round-trip and so is
// not serde-able on its own (see `sea_graph::node` for the same reasoning).

/// The three-state lifecycle of a `ForwardRef` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardRefState {
    Undeclared,
    Scoped,
    Defined,
}

/// One of the four branch projections an `If` can collapse to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IfBranch {
    Any,
    False,
    True,
    All,
}

#[derive(Debug, Clone)]
pub enum Op {
    /// Program entry; source of the initial control and memory tokens.
    Start,
    /// A constant flow value, interned at construction time.
    Con(Type),
    /// A primitive operator bound by name; the primitive library (out of
    /// scope for this crate) is responsible for giving these meaning.
    Prim { name: String },
    /// A two-way control branch; collapses per its predicate's 4-valued tuple.
    If,
    /// Projects one output of a multi-output node (If branch, Call argument
    /// slot, CallEpi return slot, ...).
    Proj { index: u16 },
    /// Control-flow merge point for a loop or join.
    Region,
    /// SSA value merge aligned with a `Region`'s inputs.
    Phi,
    /// Allocation site; mints a fresh, alias-scoped memory value.
    New { alias: AliasId },
    /// Call site: `(ctrl, mem, function-ptr, args...)`.
    Call,
    /// Merge point of all `Ret`s reachable from a `Call`.
    CallEpi,
    /// Function entry, tagged with its fidx in the split tree.
    Fun { fidx: FidxId },
    /// Function return.
    Ret,
    /// Formal parameter, by position.
    Parm { index: u32 },
    /// Recursion placeholder; three-state (undeclared/scoped/defined).
    ForwardRef(ForwardRefState),
    /// Bundles a function's live memory and result value for liveness
    /// purposes.
    Scope,
}

impl Op {
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Op::Start | Op::If | Op::Region | Op::Call | Op::CallEpi | Op::Fun { .. } | Op::Ret
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Ret)
    }

    /// True for nodes whose `_val` can never legally widen once narrowed --
    /// the driver relies on this to validate monotonicity in debug builds.
    pub fn is_constant_like(&self) -> bool {
        matches!(self, Op::Con(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_classification() {
        assert!(Op::Start.is_control_flow());
        assert!(Op::If.is_control_flow());
        assert!(!(Op::Prim { name: "add".into() }).is_control_flow());
    }

    #[test]
    fn ret_is_terminator() {
        assert!(Op::Ret.is_terminator());
        assert!(!Op::Call.is_terminator());
    }
}
