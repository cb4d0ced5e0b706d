//! Core error types for the semantic analysis engine.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! failure mode called out in the error handling design: type-variable
//! unification failures, builder-API misuse, and the two documented
//! preconditions (Bits all-kids collapse, memory `st`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{AliasId, FidxId, NodeId};

/// Errors produced across `sea-core`, `sea-types`, `sea-graph`, `sea-unify`, and `sea-opt`.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SeaError {
    /// Unifying two incompatible type-variable subclasses.
    #[error("type mismatch: cannot unify {lhs} with {rhs}")]
    TypeMismatch { lhs: String, rhs: String },

    /// A type variable is simultaneously `_may_nil` and `_use_nil`.
    #[error("nil violation: type variable is both nilable and dereferenced")]
    NilViolation,

    /// A `ForwardRef` node never advanced past the `scoped` state.
    #[error("forward reference to node {node} never resolved to a definition")]
    ForwardRef { node: NodeId },

    /// A lambda/call unification found mismatched arities.
    #[error("arity mismatch: expected {expected} arguments, found {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A call site needs a non-free bit-shape conversion; inlining is suppressed.
    #[error("call at node {node} requires a non-free argument conversion")]
    ArgConversion { node: NodeId },

    /// Builder API referenced a node id that does not exist in the graph.
    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    /// Builder API referenced an alias id outside the alias tree.
    #[error("alias not found: {0}")]
    UnknownAlias(AliasId),

    /// Builder API referenced a fidx outside the function split tree.
    #[error("fidx not found: {0}")]
    UnknownFidx(FidxId),

    /// A documented precondition of the source design was hit at
    /// runtime rather than at construction time. Not a panic: callers can
    /// recover by not exercising the unimplemented path.
    #[error("unsupported: {reason}")]
    Unsupported { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_display() {
        let err = SeaError::TypeMismatch {
            lhs: "Int".into(),
            rhs: "FunPtr".into(),
        };
        assert_eq!(err.to_string(), "type mismatch: cannot unify Int with FunPtr");
    }

    #[test]
    fn unknown_node_display() {
        let err = SeaError::UnknownNode(NodeId(5));
        assert_eq!(err.to_string(), "node not found: 5");
    }

    #[test]
    fn serde_roundtrip() {
        let err = SeaError::ArityMismatch {
            expected: 2,
            actual: 3,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: SeaError = serde_json::from_str(&json).unwrap();
        match back {
            SeaError::ArityMismatch { expected, actual } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
