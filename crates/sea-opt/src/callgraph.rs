//! Call-graph discovery, CallEpi wiring, and inlining.
//!
//! A `HashMap`-keyed registry of known functions, built up incrementally
//! from `Call` nodes in the program graph as the fixpoint discovers them,
//! backs the wired/unwired `(Call, Ret)` pairs the driver reads.
//!
//! Simplification recorded in `DESIGN.md`: a real sea-of-nodes wiring
//! installs explicit control/memory/argument `Proj` nodes between caller and
//! callee. This crate models wiring at the level the fixpoint actually reads
//! -- a direct `CallEpi <- Ret` def edge per wired callee, tracked in
//! `CallGraph`'s wired set -- and leaves the surrounding projection
//! scaffolding to the inbound builder API, which is out of this
//! crate's scope.

use std::collections::{HashMap, HashSet};

use sea_core::{FidxId, NodeId, SeaError, SplitTree};
use sea_graph::Graph;

/// Everything the call-graph machinery needs to know about one function.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub fun: NodeId,
    pub rets: Vec<NodeId>,
    pub nargs: usize,
}

/// Live call-graph state: which functions exist, and which (Call, Ret)
/// pairs are currently wired.
#[derive(Debug, Default)]
pub struct CallGraph {
    functions: HashMap<FidxId, FunctionInfo>,
    wired: HashSet<(NodeId, NodeId)>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, fidx: FidxId, info: FunctionInfo) {
        self.functions.insert(fidx, info);
    }

    pub fn function(&self, fidx: FidxId) -> Option<&FunctionInfo> {
        self.functions.get(&fidx)
    }

    pub fn is_wired(&self, call: NodeId, ret: NodeId) -> bool {
        self.wired.contains(&(call, ret))
    }

    pub fn wired_rets(&self, call: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.wired.iter().filter(move |(c, _)| *c == call).map(|(_, r)| *r)
    }

    /// "check_and_wire": for every candidate fidx that is not a
    /// split-tree parent, not a forward-ref, not already wired, and whose
    /// arity matches the call site, add a `CallEpi <- Ret` back edge per
    /// callee `Ret`. Returns the number of newly-wired edges.
    pub fn check_and_wire(
        &mut self,
        graph: &mut Graph,
        call: NodeId,
        call_epi: NodeId,
        candidate_fidxs: &[FidxId],
        split_tree: &SplitTree,
        call_nargs: usize,
    ) -> Result<usize, SeaError> {
        let mut newly_wired = 0;
        for fidx in candidate_fidxs {
            if !split_tree.children_of(fidx.0).is_empty() {
                // A parent in the split tree is too imprecise to wire --
                // wiring only ever targets leaf fidxs.
                continue;
            }
            let Some(info) = self.functions.get(fidx).cloned() else {
                continue;
            };
            if info.nargs != call_nargs {
                // `CEProjNode.good_call` arity sanity check.
                continue;
            }
            for ret in &info.rets {
                if self.wired.insert((call, *ret)) {
                    let slot = graph.node(call_epi)?.slot_count();
                    graph.add_def_edge(call_epi, slot, *ret)?;
                    newly_wired += 1;
                }
            }
        }
        Ok(newly_wired)
    }

    /// "unwire": remove a previously wired pair, e.g. when
    /// sharpening fidxs excludes a callee that is no longer reachable.
    /// Invariant: wire followed by unwire must restore the pre-wire
    /// def/use snapshot exactly.
    pub fn unwire(&mut self, graph: &mut Graph, call: NodeId, call_epi: NodeId, ret: NodeId) -> Result<(), SeaError> {
        if !self.wired.remove(&(call, ret)) {
            return Ok(());
        }
        let len = graph.node(call_epi)?.slot_count();
        let mut target = None;
        for i in 0..len {
            if graph.node(call_epi)?.def(i) == Some(ret) {
                target = Some(i);
                break;
            }
        }
        if let Some(slot) = target {
            graph.remove_def_edge(call_epi, slot)?;
        }
        Ok(())
    }

    /// "Inlining": true when exactly one fidx is wired to this
    /// call and that callee has no other callers.
    pub fn is_sole_caller(&self, call: NodeId, fidx: FidxId) -> bool {
        let Some(info) = self.functions.get(&fidx) else {
            return false;
        };
        let wired_here: HashSet<NodeId> = self.wired_rets(call).collect();
        if !info.rets.iter().all(|r| wired_here.contains(r)) {
            return false;
        }
        self.wired.iter().filter(|(_, r)| info.rets.contains(r)).all(|(c, _)| *c == call)
    }

    /// "Fidx/alias splitting": register the clone produced by
    /// inlining a shared callee as its own function entry, as a child of
    /// the original in the fidx split tree.
    pub fn split_function(&mut self, parent: FidxId, split_tree: &mut SplitTree, clone_info: FunctionInfo) -> FidxId {
        let child = FidxId(split_tree.split(parent.0));
        self.functions.insert(child, clone_info);
        child
    }
}
