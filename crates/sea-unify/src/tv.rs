//! Type-variable nodes for the Hindley-Milner style unifier.

use sea_core::TvId;

/// The subclass tag of a type variable. Structural children are `TvId`s
/// into the owning `Unifier`'s arena rather than boxed trees, matching the
/// union-find discipline: a child reference survives its target being
/// unioned away, since `find()` re-resolves it to the current leader.
#[derive(Debug, Clone)]
pub enum TvKind {
    /// An unconstrained variable; absorbs into anything it unifies with.
    Leaf,
    /// A concrete, named base type (bound by name, same deliberate
    /// "primitive library is external" choice as `sea_graph::Op::Prim`).
    Base(String),
    /// Pointee of a pointer/reference type.
    Ptr(TvId),
    /// Function type: positional parameters plus a return slot.
    Lambda { params: Vec<TvId>, ret: TvId },
    /// Record type, fields walked by label.
    Struct { fields: Vec<(String, TvId)> },
    /// A unification failure, preserved structurally so the driver can
    /// aggregate it into a diagnostic at the end of the fixpoint -- local
    /// unifications never throw.
    Err { left: TvId, right: TvId, reason: ErrReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrReason {
    SubclassMismatch,
    ArityMismatch,
    NilViolation,
}

#[derive(Debug, Clone)]
pub(crate) struct TvNode {
    pub(crate) parent: Option<TvId>,
    pub(crate) kind: TvKind,
    /// This variable may observe a nil/zero value.
    pub(crate) may_nil: bool,
    /// This variable is dereferenced somewhere, so must not be nil.
    pub(crate) use_nil: bool,
    /// 0 = never, 1 = soft, 2 = hard.
    pub(crate) widen: u8,
    pub(crate) delay_fresh: Vec<DelayFresh>,
    pub(crate) delay_resolve: Vec<TvId>,
}

/// A deferred fresh-unification, recorded on a generic `Leaf` so that any
/// later structural expansion of that leaf retroactively re-fresh-unifies
/// against the monomorphic site.
#[derive(Debug, Clone)]
pub(crate) struct DelayFresh {
    pub(crate) generic: TvId,
    pub(crate) mono: TvId,
    pub(crate) nongen: Vec<TvId>,
}

impl TvNode {
    pub(crate) fn leaf() -> Self {
        TvNode {
            parent: None,
            kind: TvKind::Leaf,
            may_nil: false,
            use_nil: false,
            widen: 0,
            delay_fresh: Vec::new(),
            delay_resolve: Vec::new(),
        }
    }
}
