//! Per-node `value()`/`live_use()` recomputation.
//!
//! `compute_value` must be a **pure** function of `in(i).val` and monotone
//! downward over iterations; `compute_live` is the backward dual. Both are
//! free functions (not methods on `Graph`) because they need the
//! `TypeInterner`/`BitsInterner` contexts that `sea-graph` deliberately
//! doesn't own (see `sea_graph::graph` module doc).

use sea_core::{AliasId, BitsInterner, FidxId, SeaError};
use sea_graph::{Graph, IfBranch, Op};
use sea_types::{MemData, MemPtrData, Type, TypeInterner};

/// "If": the 4-valued output derived from the predicate's
/// nil/constant-ness. `ANY`/`ALL` predicates (not yet resolved, or
/// unreachable) keep both branches open; a resolved constant picks one.
pub fn if_branch(pred: &Type) -> IfBranch {
    if pred.is_all() {
        return IfBranch::All;
    }
    if pred.is_any() {
        return IfBranch::Any;
    }
    match pred.int_const() {
        Some(0) => IfBranch::False,
        Some(_) => IfBranch::True,
        None => IfBranch::Any,
    }
}

/// Recompute a node's `val` from its current defs' `val`s.
pub fn compute_value(
    graph: &Graph,
    id: sea_core::NodeId,
    types: &mut TypeInterner,
    bits: &mut BitsInterner<AliasId>,
    fidx_bits: &mut BitsInterner<FidxId>,
) -> Result<Type, SeaError> {
    let node = graph.node(id)?;
    let def_val = |i: usize| -> Type {
        node.def(i)
            .and_then(|d| graph.node(d).ok())
            .map(|n| n.val.clone())
            .unwrap_or_else(|| types.any())
    };
    let val = match &node.op {
        Op::Start => types.ctrl(),
        Op::Con(ty) => ty.clone(),
        // Bound by name; the primitive library (out of scope) owns real
        // semantics. Meeting all inputs keeps this monotone and safe as a
        // conservative default: a Prim node is never more precise than the
        // tightest thing any of its inputs could be.
        Op::Prim { .. } => {
            let mut acc = types.any();
            for i in 0..node.defs().count() {
                acc = types.meet(&acc, &def_val(i), bits, fidx_bits);
            }
            acc
        }
        // Full 4-valued tuple (IF_ANY/IF_FALSE/IF_TRUE/IF_ALL)
        // needs the predicate's nil/sub flags together with this node's own
        // control liveness; the control-projection result itself stays
        // `CTRL` here; `IfBranch` selection happens where the driver reads
        // `Proj` outputs against the predicate's `above_center`/`is_con`.
        Op::If => types.ctrl(),
        Op::Proj { index } => {
            match node.def(0).and_then(|src| graph.node(src).ok()) {
                Some(src_node) if matches!(src_node.op, Op::If) => {
                    let pred = src_node
                        .def(1)
                        .and_then(|p| graph.node(p).ok())
                        .map(|n| n.val.clone())
                        .unwrap_or_else(|| types.any());
                    let taken = match (*index, if_branch(&pred)) {
                        (0, IfBranch::False) => true,
                        (1, IfBranch::True) => true,
                        (_, IfBranch::Any) | (_, IfBranch::All) => true,
                        _ => false,
                    };
                    if taken {
                        types.ctrl()
                    } else {
                        types.xctrl()
                    }
                }
                _ => def_val(*index as usize),
            }
        }
        // A control merge is reachable if *any* predecessor is; that's a
        // join (least-upper-bound over "could happen").
        Op::Region => {
            let mut acc = types.xctrl();
            for i in 0..node.defs().count() {
                acc = types.join(&acc, &def_val(i), bits, fidx_bits);
            }
            acc
        }
        // An SSA merge aligned with its Region: join over the possible
        // incoming values.
        Op::Phi => {
            let mut acc = types.any();
            for i in 0..node.defs().count() {
                acc = types.join(&acc, &def_val(i), bits, fidx_bits);
            }
            acc
        }
        Op::New { alias } => {
            let obj = node.def(0).map(|_| def_val(0)).unwrap_or_else(|| types.any());
            let aliases = bits.make_const(alias.index() as u32);
            types.mem_ptr(aliases, obj)
        }
        Op::Call => types.ctrl(),
        // The real freeze/meet rule (`Driver::call_epi_value`) needs the
        // call graph's wired-ret set, which this free function doesn't
        // have access to; the driver special-cases `CallEpi` before
        // falling back here, so this arm only fires for a `CallEpi`
        // inspected outside the driver (e.g. directly in a unit test).
        Op::CallEpi => node.val.clone(),
        Op::Fun { .. } => types.ctrl(),
        Op::Ret => {
            if node.defs().count() > 0 {
                def_val(node.defs().count() - 1)
            } else {
                types.any()
            }
        }
        // Actual argument binding happens through `CallEpi`/`Call` wiring;
        // a standalone Parm optimistically starts at top.
        Op::Parm { .. } => node.val.clone(),
        Op::ForwardRef(state) => match state {
            sea_graph::ForwardRefState::Defined => def_val(0),
            _ => types.any(),
        },
        Op::Scope => {
            let mut acc = types.any();
            for i in 0..node.defs().count() {
                acc = types.meet(&acc, &def_val(i), bits, fidx_bits);
            }
            acc
        }
    };
    Ok(val)
}

/// Backward dual of `compute_value`: given this node's current `live`,
/// what does it push onto def slot `i`'s `live`? Default rule is "push my
/// own liveness to every input" (a node can't be live without its inputs
/// being live too); specific ops narrow this.
pub fn compute_live(graph: &Graph, id: sea_core::NodeId, i: usize, types: &mut TypeInterner) -> Result<Type, SeaError> {
    let node = graph.node(id)?;
    let xctrl = types.xctrl();
    let dead = types.any();
    // A predecessor resolved to XCTRL is unreachable and no longer demands
    // the value flowing in on its slot. Each Region/Phi slot is a distinct
    // predecessor def, so narrowing one slot to `dead` can never wrongly
    // suppress a different, still-reachable slot's liveness. A `Proj`->`If`
    // version of this (push `dead` back onto the shared `If` from an untaken
    // branch) is deliberately not modeled: `If` can have two `Proj` children
    // sharing one `live` field, and `dead` is absorbing under `join`, so a
    // single untaken branch could wrongly blank out the other, live branch's
    // contribution.
    let live = match &node.op {
        Op::Region => {
            let reachable = node
                .def(i)
                .and_then(|d| graph.node(d).ok())
                .map(|d| d.val != xctrl)
                .unwrap_or(true);
            if reachable {
                node.live.clone()
            } else {
                dead
            }
        }
        // Slot 0 is the aligning Region, always demanded. Slots 1.. line up
        // positionally with that Region's own predecessor slots.
        Op::Phi if i >= 1 => {
            let reachable = node
                .def(0)
                .and_then(|r| graph.node(r).ok())
                .and_then(|r| r.def(i - 1))
                .and_then(|d| graph.node(d).ok())
                .map(|d| d.val != xctrl)
                .unwrap_or(true);
            if reachable {
                node.live.clone()
            } else {
                dead
            }
        }
        _ => node.live.clone(),
    };
    Ok(live)
}

/// Mint the memory value a fresh allocation owns before any store reaches
/// it -- every field starts at the lattice top (unconstrained).
pub fn fresh_object_mem(types: &mut TypeInterner, alias: AliasId) -> Type {
    let any = types.any();
    types.mem(false, vec![(alias.index() as u32, any)])
}

/// "Loads/stores": `Mem.ld` projects the per-alias object type
/// indicated by a pointer's alias set, joining (optimistic read) or
/// meeting (pessimistic read) depending on the pointer's polarity.
pub fn mem_load(mem: &MemData, ptr: &MemPtrData, types: &mut TypeInterner, bits: &mut BitsInterner<AliasId>, fidx_bits: &mut BitsInterner<FidxId>) -> Type {
    let use_join = ptr.aliases.above_center();
    let mut acc = types.any();
    let mut seen_any = false;
    for bit in ptr.aliases.iter() {
        if bit == AliasId::NIL.index() as u32 {
            continue; // nil alias ignored on loads (fatal only on stores/meets)
        }
        let slot = mem
            .aliases
            .iter()
            .find(|(id, _)| *id == bit)
            .map(|(_, t)| t.clone())
            .or_else(|| mem.aliases.iter().find(|(id, _)| *id == 1).map(|(_, t)| t.clone()));
        if let Some(slot) = slot {
            acc = if !seen_any {
                slot
            } else if use_join {
                types.join(&acc, &slot, bits, fidx_bits)
            } else {
                types.meet(&acc, &slot, bits, fidx_bits)
            };
            seen_any = true;
        }
    }
    if !seen_any {
        types.any()
    } else {
        acc
    }
}

/// A documented precondition: the signature exists, but field-level
/// update through alias trees is not yet designed, matching the
/// open-question decision recorded in `DESIGN.md`.
pub fn mem_store(
    _mem: &MemData,
    _ptr: &MemPtrData,
    _field: &str,
    _val: &Type,
) -> Result<MemData, SeaError> {
    Err(SeaError::Unsupported {
        reason: "Mem::store: field-level update through alias trees is not yet implemented".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::{AliasId, BitsInterner, FidxId};
    use sea_graph::Graph;
    use sea_types::TypeInterner;

    fn harness() -> (TypeInterner, BitsInterner<AliasId>, BitsInterner<FidxId>) {
        (TypeInterner::new(), BitsInterner::new(), BitsInterner::new())
    }

    #[test]
    fn if_branch_resolves_constants() {
        let mut t = TypeInterner::new();
        assert_eq!(if_branch(&t.int_con(0)), IfBranch::False);
        assert_eq!(if_branch(&t.int_con(1)), IfBranch::True);
        assert_eq!(if_branch(&t.any()), IfBranch::Any);
        assert_eq!(if_branch(&t.all()), IfBranch::All);
    }

    #[test]
    fn start_value_is_ctrl() {
        let (mut types, mut bits, mut fidx) = harness();
        let any = types.any();
        let all = types.all();
        let mut g = Graph::new(any, all);
        let start = g.add_node(Op::Start, vec![]);
        let val = compute_value(&g, start, &mut types, &mut bits, &mut fidx).unwrap();
        assert_eq!(val, types.ctrl());
    }

    #[test]
    fn mem_load_falls_back_to_default_slot() {
        let (mut types, mut bits, mut fidx) = harness();
        let any = types.any();
        let mem = MemData {
            any: false,
            aliases: vec![(1, any.clone())],
        };
        let alias_bits = bits.make_const(7);
        let ptr = MemPtrData {
            aliases: alias_bits,
            obj: any.clone(),
        };
        let loaded = mem_load(&mem, &ptr, &mut types, &mut bits, &mut fidx);
        assert_eq!(loaded, any);
    }
}
