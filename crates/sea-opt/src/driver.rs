//! The combined GCP+HM worklist fixpoint, call-graph discovery,
//! and inlining, tying `sea-graph`, `sea-types`, and `sea-unify` together.
//!
//! One owned struct holds every interner/arena the engine needs, exposing
//! a single `run` entry point and a report describing what happened. The
//! two worklists (`work_flow` for value/liveness, `work_unify` for
//! type-variable progress) are plain `VecDeque`s with a side `HashSet`
//! membership guard so a node already pending is never double-queued.

use std::collections::{HashSet, VecDeque};

use sea_core::{AliasId, BitsInterner, FidxId, NodeId, SeaError};
use sea_graph::{Graph, Op};
use sea_types::TypeInterner;
use sea_unify::Unifier;

use crate::callgraph::CallGraph;
use crate::config::DriverConfig;
use crate::step;

/// Owns every interner the fixpoint touches, plus the live graph and call
/// graph. A `Driver` is the unit of a single compilation/analysis run; it
/// is not `Sync`/shared -- the engine is single-threaded cooperative, so
/// callers run one of these per worker, never behind a lock.
pub struct Driver {
    pub graph: Graph,
    pub types: TypeInterner,
    pub alias_bits: BitsInterner<AliasId>,
    pub fidx_bits: BitsInterner<FidxId>,
    pub unify: Unifier,
    pub call_graph: CallGraph,
    config: DriverConfig,
}

/// What a completed (or aborted) run produced.
#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    pub iterations: usize,
    pub diagnostics: Vec<SeaError>,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        let mut types = TypeInterner::new();
        let any = types.any();
        let all = types.all();
        Driver {
            graph: Graph::new(any, all),
            types,
            alias_bits: BitsInterner::new(),
            fidx_bits: BitsInterner::new(),
            unify: Unifier::new(),
            call_graph: CallGraph::new(),
            config,
        }
    }

    /// Run the worklist until both queues drain (a fixpoint is reached) or
    /// `config.max_iterations` is exceeded. `val` only falls and `live`
    /// only rises across the whole run, which is what guarantees this loop
    /// terminates on a well-formed (monotone) graph.
    pub fn run(&mut self) -> Result<DriverReport, SeaError> {
        let mut work_flow: VecDeque<NodeId> = self.graph.ids().collect();
        let mut in_flow: HashSet<NodeId> = work_flow.iter().copied().collect();
        let mut work_unify: VecDeque<sea_core::TvId> = VecDeque::new();
        let mut iterations = 0usize;

        loop {
            if work_flow.is_empty() && work_unify.is_empty() {
                break;
            }
            if let Some(max) = self.config.max_iterations {
                if iterations >= max {
                    return Err(SeaError::Unsupported {
                        reason: format!("driver exceeded max_iterations={max} without reaching a fixpoint"),
                    });
                }
            }

            if let Some(id) = work_flow.pop_front() {
                in_flow.remove(&id);
                iterations += 1;
                if !self.graph.contains(id) {
                    continue;
                }
                if self.config.trace {
                    tracing::debug!(node = ?id, "driver: recomputing value/liveness");
                }
                self.step_flow(id, &mut work_flow, &mut in_flow)?;
                continue;
            }

            if let Some(tv) = work_unify.pop_front() {
                iterations += 1;
                if self.config.trace {
                    tracing::debug!(tv = ?tv, "driver: draining deferred unification work");
                }
                self.step_unify(tv)?;
            }
        }

        let diagnostics = self.unify.diagnose();
        if self.config.trace {
            tracing::info!(iterations, diagnostics = diagnostics.len(), "driver: fixpoint reached");
        }
        Ok(DriverReport { iterations, diagnostics })
    }

    /// One worklist step: recompute `id`'s value, propagate to uses on
    /// change; recompute what `id` contributes to each of its defs' `live`,
    /// propagate to those defs on change; then try to inline/collect.
    fn step_flow(&mut self, id: NodeId, work_flow: &mut VecDeque<NodeId>, in_flow: &mut HashSet<NodeId>) -> Result<(), SeaError> {
        if matches!(self.graph.node(id)?.op, Op::Call) {
            self.rewire_call(id)?;
        }

        let new_val = if matches!(self.graph.node(id)?.op, Op::CallEpi) {
            self.call_epi_value(id)?
        } else {
            step::compute_value(&self.graph, id, &mut self.types, &mut self.alias_bits, &mut self.fidx_bits)?
        };
        if self.graph.set_val(id, new_val)? {
            let uses: Vec<NodeId> = self.graph.node(id)?.uses().to_vec();
            for u in uses {
                Self::enqueue(u, work_flow, in_flow);
            }
        }

        let nslots = self.graph.node(id)?.slot_count();
        for i in 0..nslots {
            let Some(def) = self.graph.node(id)?.def(i) else {
                continue;
            };
            let contributed = step::compute_live(&self.graph, id, i, &mut self.types)?;
            let existing = self.graph.node(def)?.live.clone();
            let merged = self.types.join(&existing, &contributed, &mut self.alias_bits, &mut self.fidx_bits);
            if self.graph.set_live(def, merged)? {
                Self::enqueue(def, work_flow, in_flow);
            }
        }

        if self.config.widen_escapes {
            self.widen_on_escape(id)?;
        }

        if let Some(replacement) = self.graph.ideal_reduce(id)? {
            let uses: Vec<NodeId> = self.graph.node(id)?.uses().to_vec();
            for u in uses {
                Self::enqueue(u, work_flow, in_flow);
            }
            self.graph.replace_node(id, replacement)?;
            Self::enqueue(replacement, work_flow, in_flow);
            return Ok(());
        }

        self.try_inline(id, work_flow, in_flow)?;
        self.graph.kill_if_dead(id)?;
        Ok(())
    }

    /// "any escape through the program root widens" (§4.4): a value
    /// reaching a function's `Ret` or the top-level `Scope` crosses out of
    /// what this fixpoint can keep narrowing, so its type variable (if the
    /// out-of-scope builder API attached one via `Node.tv`) is forced to the
    /// hard widening level rather than left free to narrow against a caller
    /// this driver never sees.
    fn widen_on_escape(&mut self, id: NodeId) -> Result<(), SeaError> {
        let node = self.graph.node(id)?;
        if !matches!(node.op, Op::Ret | Op::Scope) {
            return Ok(());
        }
        let tvs: Vec<sea_core::TvId> = node
            .defs()
            .filter_map(|d| self.graph.node(d).ok().and_then(|n| n.tv))
            .collect();
        for tv in tvs {
            self.unify.raise_widen(tv, 2);
        }
        Ok(())
    }

    fn enqueue(id: NodeId, work_flow: &mut VecDeque<NodeId>, in_flow: &mut HashSet<NodeId>) {
        if in_flow.insert(id) {
            work_flow.push_back(id);
        }
    }

    /// Drain one entry of delayed let-polymorphism work (the deferred
    /// fresh-unification and field-resolution queues): nothing in this
    /// crate defers generalization decisions onto `work_unify` yet, so
    /// this is a no-op placeholder the builder API (out of scope) will
    /// populate.
    fn step_unify(&mut self, _tv: sea_core::TvId) -> Result<(), SeaError> {
        Ok(())
    }

    /// "check_and_wire()/unwire()" driven off a `Call`'s own function-ptr
    /// operand (conventionally def slot 2, per "(ctrl, mem, function-ptr,
    /// args...)"): re-derives the candidate fidx set from that operand's
    /// current value and wires newly-resolved leaf callees, unwiring any
    /// previously-wired callee the sharpened set no longer contains. A
    /// `Call` built without a function-ptr operand (e.g. directly wired by
    /// a caller, as the builder API would) is left untouched.
    fn rewire_call(&mut self, call: NodeId) -> Result<(), SeaError> {
        let Some(fptr) = self.graph.node(call)?.def(2) else {
            return Ok(());
        };
        let Some(fidxs) = self.graph.node(fptr)?.val.fidxs().cloned() else {
            return Ok(());
        };
        let Some(call_epi) = self.graph.node(call)?.uses().iter().copied().find(|u| {
            self.graph.node(*u).map(|n| matches!(n.op, Op::CallEpi)).unwrap_or(false)
        }) else {
            return Ok(());
        };

        let tree = self.fidx_bits.tree().clone();
        let leaf_set: HashSet<u32> = fidxs.iter().filter(|b| tree.children_of(*b).is_empty()).collect();
        let candidates: Vec<FidxId> = leaf_set.iter().map(|b| FidxId(*b)).collect();
        let call_nargs = self.graph.node(call)?.slot_count().saturating_sub(3);
        self.call_graph
            .check_and_wire(&mut self.graph, call, call_epi, &candidates, &tree, call_nargs)?;

        let wired: Vec<NodeId> = self.call_graph.wired_rets(call).collect();
        for ret in wired {
            let ret_fidx = self.graph.node(ret)?.def(0).and_then(|fun| match self.graph.node(fun).ok()?.op {
                Op::Fun { fidx } => Some(fidx),
                _ => None,
            });
            if let Some(ret_fidx) = ret_fidx {
                if !leaf_set.contains(&ret_fidx.0) {
                    self.call_graph.unwire(&mut self.graph, call, call_epi, ret)?;
                }
            }
        }
        Ok(())
    }

    /// "Value rule for CallEpi": if any candidate leaf fidx of the call's
    /// function-ptr value is not yet wired, the value freezes at its prior
    /// `_val` rather than sliding back towards `ANY` as the split tree
    /// sharpens the fidx set out from under it. Once every candidate is
    /// wired, the value resumes as the meet of every wired callee's `Ret`.
    fn call_epi_value(&mut self, call_epi: NodeId) -> Result<sea_types::Type, SeaError> {
        let node = self.graph.node(call_epi)?;
        let prior = node.val.clone();
        let Some(call) = node.def(0) else {
            return Ok(prior);
        };
        let Some(fptr) = self.graph.node(call)?.def(2) else {
            return Ok(prior);
        };
        let Some(fidxs) = self.graph.node(fptr)?.val.fidxs().cloned() else {
            return Ok(prior);
        };
        let tree = self.fidx_bits.tree().clone();
        let leaf_candidates: Vec<FidxId> = fidxs.iter().filter(|b| tree.children_of(*b).is_empty()).map(FidxId).collect();
        if leaf_candidates.is_empty() {
            return Ok(prior);
        }
        let all_wired = leaf_candidates.iter().all(|f| {
            self.call_graph
                .function(*f)
                .map(|info| info.rets.iter().all(|r| self.call_graph.is_wired(call, *r)))
                .unwrap_or(false)
        });
        if !all_wired {
            return Ok(prior);
        }

        let wired_rets: Vec<NodeId> = self.call_graph.wired_rets(call).collect();
        let mut acc = self.types.any();
        for ret in wired_rets {
            let rv = self.graph.node(ret)?.val.clone();
            acc = self.types.meet(&acc, &rv, &mut self.alias_bits, &mut self.fidx_bits);
        }
        Ok(acc)
    }

    /// "Inlining" (§4.5): when a `CallEpi` is wired to exactly one callee
    /// and that callee has no other callers, rewrite the call to the
    /// callee's body directly -- an identity body becomes the matching call
    /// argument, a constant body becomes the constant, and a one-op body
    /// built only from params/constants is cloned with its inputs
    /// substituted. Each case unwires the callee and, once its `Ret` has no
    /// remaining use, the callee's `Fun`/`Ret` are collected along with it.
    fn try_inline(&mut self, id: NodeId, work_flow: &mut VecDeque<NodeId>, in_flow: &mut HashSet<NodeId>) -> Result<(), SeaError> {
        let node = self.graph.node(id)?;
        if !matches!(node.op, Op::CallEpi) {
            return Ok(());
        }
        let call = match node.def(0) {
            Some(c) => c,
            None => return Ok(()),
        };
        let rets: Vec<NodeId> = self.call_graph.wired_rets(call).collect();
        let [ret] = rets.as_slice() else {
            return Ok(());
        };
        let ret = *ret;
        let fidx = match self.graph.node(ret)?.def(0).and_then(|fun| match self.graph.node(fun).ok()?.op {
            Op::Fun { fidx } => Some(fidx),
            _ => None,
        }) {
            Some(f) => f,
            None => return Ok(()),
        };
        if !self.call_graph.is_sole_caller(call, fidx) {
            return Ok(());
        }
        let Some(body) = self.graph.node(ret)?.def(1) else {
            return Ok(());
        };
        let Some(replacement) = self.inline_body(body, call)? else {
            return Ok(());
        };

        let uses: Vec<NodeId> = self.graph.node(id)?.uses().to_vec();
        for u in uses {
            Self::enqueue(u, work_flow, in_flow);
        }
        self.call_graph.unwire(&mut self.graph, call, id, ret)?;
        self.graph.replace_node(id, replacement)?;
        Self::enqueue(replacement, work_flow, in_flow);
        // `ret` lost its only use (the wiring edge just unwired); collecting
        // it cascades into `fun` and the original body node too, once
        // neither has any remaining use -- matching S3's "the callee's Fun,
        // Ret disappear from the graph".
        self.graph.kill_if_dead(ret)?;
        Ok(())
    }

    /// The three §4.5 inlining body shapes. Returns `None` when the body
    /// doesn't match any of them, leaving the call un-inlined.
    fn inline_body(&mut self, body: NodeId, call: NodeId) -> Result<Option<NodeId>, SeaError> {
        let op = self.graph.node(body)?.op.clone();
        match op {
            // Identity body: the return is one of the callee's own Parms.
            Op::Parm { index } => Ok(self.graph.node(call)?.def(3 + index as usize)),
            // Constant body: reuse the constant node itself.
            Op::Con(_) => Ok(Some(body)),
            // One-op body using only params/constants, with no new memory.
            Op::Prim { .. } => self.clone_one_op(body, op, call),
            _ => Ok(None),
        }
    }

    /// Clones `body`'s op with every `Parm` input substituted for the
    /// matching call argument and every other input required to already be
    /// a constant; bails to `None` (no inline) the moment an input is
    /// neither, since that means the body reads something beyond its own
    /// params/constants.
    fn clone_one_op(&mut self, body: NodeId, op: Op, call: NodeId) -> Result<Option<NodeId>, SeaError> {
        let nslots = self.graph.node(body)?.slot_count();
        let mut new_defs = Vec::with_capacity(nslots);
        for i in 0..nslots {
            let Some(d) = self.graph.node(body)?.def(i) else {
                new_defs.push(None);
                continue;
            };
            let resolved = match self.graph.node(d)?.op {
                Op::Parm { index } => self.graph.node(call)?.def(3 + index as usize),
                Op::Con(_) => Some(d),
                _ => return Ok(None),
            };
            match resolved {
                Some(r) => new_defs.push(Some(r)),
                None => return Ok(None),
            }
        }
        Ok(Some(self.graph.add_node(op, new_defs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::FunctionInfo;
    use sea_core::FidxId;

    #[test]
    fn run_reaches_a_fixpoint_on_a_constant_chain() {
        let mut d = Driver::new(DriverConfig::default());
        let c = d.graph.add_node(Op::Con(d.types.int_con(7)), vec![]);
        let p = d.graph.add_node(Op::Prim { name: "id".into() }, vec![Some(c)]);
        let report = d.run().unwrap();
        assert!(report.iterations > 0);
        assert_eq!(d.graph.node(p).unwrap().val, d.types.int_con(7));
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn run_bails_out_once_max_iterations_is_exceeded() {
        let mut config = DriverConfig::default();
        config.max_iterations = Some(0);
        let mut d = Driver::new(config);
        d.graph.add_node(Op::Start, vec![]);
        let err = d.run().unwrap_err();
        assert!(matches!(err, SeaError::Unsupported { .. }));
    }

    #[test]
    fn sole_caller_call_epi_inlines_to_the_callee_ret_value() {
        let mut d = Driver::new(DriverConfig::default());
        let fidx = FidxId(9);
        let fun = d.graph.add_node(Op::Fun { fidx }, vec![]);
        let body = d.graph.add_node(Op::Con(d.types.int_con(42)), vec![]);
        let ret = d.graph.add_node(Op::Ret, vec![Some(fun), Some(body)]);
        d.call_graph.register_function(
            fidx,
            FunctionInfo {
                fun,
                rets: vec![ret],
                nargs: 0,
            },
        );

        let call = d.graph.add_node(Op::Call, vec![]);
        let call_epi = d.graph.add_node(Op::CallEpi, vec![Some(call)]);
        let user = d.graph.add_node(Op::Prim { name: "id".into() }, vec![Some(call_epi)]);

        let tree = sea_core::SplitTree::new();
        d.call_graph.check_and_wire(&mut d.graph, call, call_epi, &[fidx], &tree, 0).unwrap();

        d.run().unwrap();

        // Constant body: the replacement is the constant itself, and the
        // callee's Ret/Fun are no longer reachable from anywhere.
        assert_eq!(d.graph.node(user).unwrap().def(0), Some(body));
        assert!(!d.graph.contains(call_epi), "inlined CallEpi should be collected");
        assert!(!d.graph.contains(ret), "callee's Ret should be collected once inlined");
        assert!(!d.graph.contains(fun), "callee's Fun should be collected once inlined");
    }

    #[test]
    fn identity_body_inlines_to_the_call_argument() {
        let mut d = Driver::new(DriverConfig::default());
        let fidx = FidxId(11);
        let fun = d.graph.add_node(Op::Fun { fidx }, vec![]);
        let parm = d.graph.add_node(Op::Parm { index: 0 }, vec![]);
        let ret = d.graph.add_node(Op::Ret, vec![Some(fun), Some(parm)]);
        d.call_graph.register_function(
            fidx,
            FunctionInfo {
                fun,
                rets: vec![ret],
                nargs: 1,
            },
        );

        let arg = d.graph.add_node(Op::Con(d.types.int_con(99)), vec![]);
        let call = d.graph.add_node(Op::Call, vec![None, None, None, Some(arg)]);
        let call_epi = d.graph.add_node(Op::CallEpi, vec![Some(call)]);
        let user = d.graph.add_node(Op::Prim { name: "id".into() }, vec![Some(call_epi)]);

        let tree = sea_core::SplitTree::new();
        d.call_graph.check_and_wire(&mut d.graph, call, call_epi, &[fidx], &tree, 1).unwrap();

        d.run().unwrap();

        assert_eq!(d.graph.node(user).unwrap().def(0), Some(arg));
        assert!(!d.graph.contains(call_epi));
        assert!(!d.graph.contains(ret));
        assert!(!d.graph.contains(fun));
        assert!(!d.graph.contains(parm));
    }

    #[test]
    fn one_op_body_inlines_to_a_cloned_op_with_substituted_inputs() {
        let mut d = Driver::new(DriverConfig::default());
        let fidx = FidxId(12);
        let fun = d.graph.add_node(Op::Fun { fidx }, vec![]);
        let parm = d.graph.add_node(Op::Parm { index: 0 }, vec![]);
        let one = d.graph.add_node(Op::Con(d.types.int_con(1)), vec![]);
        let body = d.graph.add_node(Op::Prim { name: "add".into() }, vec![Some(parm), Some(one)]);
        let ret = d.graph.add_node(Op::Ret, vec![Some(fun), Some(body)]);
        d.call_graph.register_function(
            fidx,
            FunctionInfo {
                fun,
                rets: vec![ret],
                nargs: 1,
            },
        );

        let arg = d.graph.add_node(Op::Con(d.types.int_con(41)), vec![]);
        let call = d.graph.add_node(Op::Call, vec![None, None, None, Some(arg)]);
        let call_epi = d.graph.add_node(Op::CallEpi, vec![Some(call)]);
        let user = d.graph.add_node(Op::Prim { name: "id".into() }, vec![Some(call_epi)]);

        let tree = sea_core::SplitTree::new();
        d.call_graph.check_and_wire(&mut d.graph, call, call_epi, &[fidx], &tree, 1).unwrap();

        d.run().unwrap();

        let replacement = d.graph.node(user).unwrap().def(0).expect("user rewired to a cloned op");
        assert_ne!(replacement, body, "the cloned op is a fresh node, not the original body");
        let cloned = d.graph.node(replacement).unwrap();
        assert!(matches!(&cloned.op, Op::Prim { name } if name == "add"));
        assert_eq!(cloned.def(0), Some(arg), "Parm input substituted for the call argument");
        assert_eq!(cloned.def(1), Some(one), "Con input carried over unchanged");
        assert!(!d.graph.contains(call_epi));
        assert!(!d.graph.contains(ret));
        assert!(!d.graph.contains(fun));
        assert!(!d.graph.contains(body));
        assert!(!d.graph.contains(parm));
    }

    #[test]
    fn escaping_through_ret_hard_widens_its_type_variable_when_configured() {
        let mut config = DriverConfig::default();
        config.widen_escapes = true;
        let mut d = Driver::new(config);
        let tv = d.unify.fresh();
        let fidx = FidxId(13);
        let fun = d.graph.add_node(Op::Fun { fidx }, vec![]);
        let body = d.graph.add_node(Op::Con(d.types.int_con(3)), vec![]);
        d.graph.node_mut(body).unwrap().tv = Some(tv);
        let ret = d.graph.add_node(Op::Ret, vec![Some(fun), Some(body)]);
        d.graph.node_mut(ret).unwrap().keep = 1;

        d.run().unwrap();

        assert_eq!(d.unify.widen_level(tv), 2, "a value escaping through Ret must be hard-widened");
    }
}
