//! Union-find driven unification over [`TvKind`] trees.

use std::collections::{HashMap, HashSet};

use sea_core::{SeaError, TvId};

use crate::tv::{DelayFresh, ErrReason, TvKind, TvNode};

/// Owns the type-variable arena. Mirrors `sea_core::bits::BitsInterner` and
/// `sea_types::TypeInterner` in spirit: one owned, non-global struct stands
/// in for the source's process-wide union-find table.
#[derive(Debug, Default)]
pub struct Unifier {
    nodes: Vec<TvNode>,
    /// Cross-call deferred work the driver drains between fixpoint rounds
    ///.
    delay_fresh_queue: Vec<DelayFresh>,
    delay_resolve_queue: Vec<TvId>,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, unconstrained type variable.
    pub fn fresh(&mut self) -> TvId {
        self.nodes.push(TvNode::leaf());
        TvId((self.nodes.len() - 1) as u32)
    }

    fn node(&self, id: TvId) -> &TvNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: TvId) -> &mut TvNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: TvId) -> &TvKind {
        &self.node(self.find(id)).kind
    }

    pub fn may_nil(&self, id: TvId) -> bool {
        self.node(self.find(id)).may_nil
    }

    pub fn use_nil(&self, id: TvId) -> bool {
        self.node(self.find(id)).use_nil
    }

    pub fn widen_level(&self, id: TvId) -> u8 {
        self.node(self.find(id)).widen
    }

    /// Force `_widen` up to at least `level` on `id`'s leader. Monotone by
    /// construction (`max`), matching `union`'s own widen-merge rule, so a
    /// caller pushing a lower level than what's already recorded (e.g. a
    /// second escape site) never un-widens anything.
    pub fn raise_widen(&mut self, id: TvId, level: u8) {
        let leader = self.find_mut(id);
        let current = self.node(leader).widen;
        self.node_mut(leader).widen = current.max(level);
    }

    /// Path-compressing rollup. `find(find(x)) == find(x)` always holds
    ///.
    pub fn find(&self, mut id: TvId) -> TvId {
        while let Some(parent) = self.node(id).parent {
            id = parent;
        }
        id
    }

    fn find_mut(&mut self, id: TvId) -> TvId {
        let root = self.find(id);
        let mut cur = id;
        while cur != root {
            let next = self.node(cur).parent.expect("cur != root implies a parent link");
            self.node_mut(cur).parent = Some(root);
            cur = next;
        }
        root
    }

    /// Union-find merge: the lower id becomes a child of the higher id,
    /// matching the source's "union the lower-uid into the higher" rule.
    /// The surviving leader inherits the departing leader's delayed lists
    /// and, critically, both sides' `may_nil`/`use_nil` -- every merge path
    /// (`absorb`, `unify_nilable`, the structural match in `unify_memo`)
    /// bottoms out here, so this is the one place a simultaneous
    /// `may_nil`+`use_nil` can never slip past unreported.
    pub fn union(&mut self, a: TvId, b: TvId) -> TvId {
        let a = self.find_mut(a);
        let b = self.find_mut(b);
        if a == b {
            return a;
        }
        let (survivor, departing) = if a.0 > b.0 { (a, b) } else { (b, a) };
        let mut migrated = std::mem::take(&mut self.node_mut(departing).delay_fresh);
        let mut migrated_resolve = std::mem::take(&mut self.node_mut(departing).delay_resolve);
        self.node_mut(departing).parent = Some(survivor);
        self.node_mut(survivor).delay_fresh.append(&mut migrated);
        self.node_mut(survivor).delay_resolve.append(&mut migrated_resolve);
        self.node_mut(survivor).widen = self.node(survivor).widen.max(self.node(departing).widen);

        let may = self.node(survivor).may_nil || self.node(departing).may_nil;
        let uses = self.node(survivor).use_nil || self.node(departing).use_nil;
        self.node_mut(survivor).may_nil = may;
        self.node_mut(survivor).use_nil = uses;
        if may && uses {
            self.node_mut(survivor).kind = TvKind::Err {
                left: survivor,
                right: departing,
                reason: ErrReason::NilViolation,
            };
            self.mark_nil_violation(survivor);
        }
        survivor
    }

    fn mark_nil_violation(&mut self, id: TvId) {
        let leader = self.find(id);
        let node = self.node_mut(leader);
        node.delay_resolve.push(leader);
    }

    /// Structural + nil-aware unification. Returns `true` iff it made
    /// progress (changed something). Never returns `Err`: subclass
    /// mismatches are embedded as `TvKind::Err` nodes for the driver to
    /// aggregate at the end of the fixpoint.
    pub fn unify(&mut self, a: TvId, b: TvId) -> bool {
        let mut memo = HashSet::new();
        self.unify_memo(a, b, &mut memo)
    }

    fn unify_memo(&mut self, a: TvId, b: TvId, memo: &mut HashSet<(u32, u32)>) -> bool {
        let a = self.find_mut(a);
        let b = self.find_mut(b);
        if a == b {
            return false;
        }
        let key = (a.0.min(b.0), a.0.max(b.0));
        if !memo.insert(key) {
            // Cycle already being unified on this call stack; treat as settled.
            return false;
        }

        let a_nil = self.may_nil(a) || self.use_nil(a);
        let b_nil = self.may_nil(b) || self.use_nil(b);
        if matches!(self.node(a).kind, TvKind::Leaf) && !matches!(self.node(b).kind, TvKind::Leaf) {
            self.absorb(a, b);
            return true;
        }
        if matches!(self.node(b).kind, TvKind::Leaf) {
            self.absorb(b, a);
            return true;
        }
        if a_nil || b_nil {
            return self.unify_nilable(a, b);
        }

        let progress = match (self.node(a).kind.clone(), self.node(b).kind.clone()) {
            (TvKind::Ptr(pa), TvKind::Ptr(pb)) => self.unify_memo(pa, pb, memo),
            (
                TvKind::Lambda {
                    params: pa,
                    ret: ra,
                },
                TvKind::Lambda {
                    params: pb,
                    ret: rb,
                },
            ) => {
                if pa.len() != pb.len() {
                    self.make_err(a, b, ErrReason::ArityMismatch);
                    true
                } else {
                    let mut changed = false;
                    for (x, y) in pa.iter().zip(pb.iter()) {
                        changed |= self.unify_memo(*x, *y, memo);
                    }
                    changed |= self.unify_memo(ra, rb, memo);
                    changed
                }
            }
            (TvKind::Struct { fields: fa }, TvKind::Struct { fields: fb }) => {
                let mut changed = false;
                for (name, xa) in &fa {
                    if let Some((_, xb)) = fb.iter().find(|(n, _)| n == name) {
                        changed |= self.unify_memo(*xa, *xb, memo);
                    }
                }
                changed
            }
            (TvKind::Base(na), TvKind::Base(nb)) if na == nb => false,
            (TvKind::Err { .. }, _) | (_, TvKind::Err { .. }) => false,
            _ => {
                self.make_err(a, b, ErrReason::SubclassMismatch);
                true
            }
        };
        self.union(a, b);
        progress
    }

    /// `leaf` takes on `other`'s shape. `may_nil`/`use_nil` are not touched
    /// here -- `union` below merges and checks them for both ids regardless
    /// of which one this leaf/other pair is or which survives.
    fn absorb(&mut self, leaf: TvId, other: TvId) {
        let other_kind = self.node(other).kind.clone();
        self.node_mut(leaf).kind = other_kind;
        self.union(leaf, other);
    }

    /// Embeds the error on the pair's *surviving* leader. `diagnose()` only
    /// ever inspects leader nodes, so setting `kind` before the caller's
    /// `union(a, b)` runs would silently lose the marker whenever `a`
    /// doesn't happen to be the id `union` keeps as root; unioning first
    /// and marking the result sidesteps that regardless of which id wins.
    fn make_err(&mut self, a: TvId, b: TvId, reason: ErrReason) {
        let survivor = self.union(a, b);
        self.node_mut(survivor).kind = TvKind::Err { left: a, right: b, reason };
        if reason == ErrReason::NilViolation {
            self.mark_nil_violation(survivor);
        }
    }

    /// Nil-aware merge: strips `may_nil` by pushing it through the single
    /// child.
    fn unify_nilable(&mut self, a: TvId, b: TvId) -> bool {
        let may = self.may_nil(a) || self.may_nil(b);
        let uses = self.use_nil(a) || self.use_nil(b);
        if may && uses {
            self.make_err(a, b, ErrReason::NilViolation);
            return true;
        }
        self.node_mut(a).may_nil = may;
        self.node_mut(a).use_nil = uses;
        self.union(a, b);
        true
    }

    /// Clone-bound, let-polymorphism-flavored unification: walk `generic`
    /// against `mono`, building fresh clones for generic leaders not in
    /// `nongen`.
    pub fn fresh_unify(&mut self, generic: TvId, mono: TvId, nongen: &[TvId]) -> bool {
        let mut vars = HashMap::new();
        self.fresh_unify_rec(generic, mono, nongen, &mut vars)
    }

    fn fresh_unify_rec(
        &mut self,
        generic: TvId,
        mono: TvId,
        nongen: &[TvId],
        vars: &mut HashMap<u32, TvId>,
    ) -> bool {
        let g = self.find(generic);
        if nongen.iter().any(|n| self.find(*n) == g) {
            // Occurs in the non-generic set: hard unify instead of cloning.
            return self.unify(g, mono);
        }
        match self.node(g).kind.clone() {
            TvKind::Leaf => {
                if let Some(existing) = vars.get(&g.0) {
                    return self.unify(*existing, mono);
                }
                vars.insert(g.0, mono);
                self.node_mut(g).delay_fresh.push(DelayFresh {
                    generic: g,
                    mono,
                    nongen: nongen.to_vec(),
                });
                false
            }
            TvKind::Ptr(p) => {
                if let TvKind::Ptr(mp) = self.node(self.find(mono)).kind.clone() {
                    self.fresh_unify_rec(p, mp, nongen, vars)
                } else {
                    self.unify(g, mono)
                }
            }
            TvKind::Lambda { params, ret } => {
                if let TvKind::Lambda {
                    params: mparams,
                    ret: mret,
                } = self.node(self.find(mono)).kind.clone()
                {
                    if params.len() != mparams.len() {
                        return self.unify(g, mono);
                    }
                    let mut changed = false;
                    for (p, mp) in params.iter().zip(mparams.iter()) {
                        changed |= self.fresh_unify_rec(*p, *mp, nongen, vars);
                    }
                    changed |= self.fresh_unify_rec(ret, mret, nongen, vars);
                    changed
                } else {
                    self.unify(g, mono)
                }
            }
            TvKind::Struct { fields } => {
                if let TvKind::Struct { fields: mfields } = self.node(self.find(mono)).kind.clone() {
                    let mut changed = false;
                    for (name, x) in &fields {
                        if let Some((_, mx)) = mfields.iter().find(|(n, _)| n == name) {
                            changed |= self.fresh_unify_rec(*x, *mx, nongen, vars);
                        }
                    }
                    changed
                } else {
                    self.unify(g, mono)
                }
            }
            TvKind::Base(_) | TvKind::Err { .. } => self.unify(g, mono),
        }
    }

    /// Side-effect-free query: would `unify(a, b)` succeed without creating
    /// a new `Err`? Implemented by running the real algorithm against a
    /// scratch clone of the arena -- a cheap structural dry run rather
    /// than a special-cased read-only walk.
    pub fn trial_unify(&self, a: TvId, b: TvId) -> bool {
        let mut scratch = Unifier {
            nodes: self.nodes.clone(),
            delay_fresh_queue: Vec::new(),
            delay_resolve_queue: Vec::new(),
        };
        let before_errs = scratch.count_errs();
        scratch.unify(a, b);
        scratch.count_errs() == before_errs
    }

    fn count_errs(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, TvKind::Err { .. }))
            .count()
    }

    /// Enqueue deferred fresh-unification / nil-resolution work for the
    /// driver to drain between fixpoint rounds.
    pub fn defer_fresh(&mut self, work: Vec<DelayFresh>) {
        self.delay_fresh_queue.extend(work);
    }

    pub fn drain_delay_fresh(&mut self) -> Vec<DelayFresh> {
        std::mem::take(&mut self.delay_fresh_queue)
    }

    pub fn drain_delay_resolve(&mut self) -> Vec<TvId> {
        std::mem::take(&mut self.delay_resolve_queue)
    }

    /// Aggregate every `Err` leader in the arena into a user-visible
    /// diagnostic, run once the driver's fixpoint has settled.
    pub fn diagnose(&self) -> Vec<SeaError> {
        let mut out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.find(TvId(i as u32)) != TvId(i as u32) {
                continue; // only report at leaders
            }
            if let TvKind::Err { left, right, reason } = &node.kind {
                out.push(match reason {
                    ErrReason::ArityMismatch => SeaError::ArityMismatch {
                        expected: self.arity_of(*left),
                        actual: self.arity_of(*right),
                    },
                    ErrReason::NilViolation => SeaError::NilViolation,
                    ErrReason::SubclassMismatch => SeaError::TypeMismatch {
                        lhs: format!("{left}"),
                        rhs: format!("{right}"),
                    },
                });
            }
        }
        out
    }

    fn arity_of(&self, id: TvId) -> usize {
        match &self.node(id).kind {
            TvKind::Lambda { params, .. } => params.len(),
            _ => 0,
        }
    }
}
