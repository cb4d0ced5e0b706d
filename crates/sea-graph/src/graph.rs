//! The sea-of-nodes SSA graph container.
//!
//! `Graph` owns a slot array of [`Node`]s and is the single place that
//! maintains the def/use duality: every `add_def_edge`/`remove_def_edge`
//! updates both sides so that `node.uses()` is never stale, the same
//! single-writer discipline production graph containers use for their
//! dual edge tables, generalized here from two separate typed graphs into
//! one homogeneous node table.
//!
//! Not `Serialize`: see the note on `Node` -- a `Type` needs its
//! `TypeInterner` to round-trip and a bare derive has no access to one.

use sea_core::{NodeId, SeaError};
use sea_types::Type;

use crate::node::Node;
use crate::ops::Op;

/// The sea-of-nodes graph. `top`/`bottom` are the lattice extremes used to
/// seed a freshly created node's `val`/`live`: `val` starts at `top` (`ANY`,
/// the optimistic starting point the GCP half of the fixpoint narrows down
/// from) and `live` starts at `bottom` (`ALL`, "assume live until a pass
/// proves otherwise").
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    start: Option<NodeId>,
    top: Type,
    bottom: Type,
}

impl Graph {
    pub fn new(top: Type, bottom: Type) -> Self {
        Graph {
            nodes: Vec::new(),
            start: None,
            top,
            bottom,
        }
    }

    pub fn top(&self) -> &Type {
        &self.top
    }

    pub fn bottom(&self) -> &Type {
        &self.bottom
    }

    pub fn start(&self) -> Option<NodeId> {
        self.start
    }

    /// Allocate a node with the given op and ordered inputs, wiring the
    /// reverse (`uses`) edges for every non-null def.
    pub fn add_node(&mut self, op: Op, defs: Vec<Option<NodeId>>) -> NodeId {
        let is_start = matches!(op, Op::Start);
        let node = Node::new(op, defs.clone(), self.top.clone(), self.bottom.clone());
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        for def in defs.into_iter().flatten() {
            self.push_use(def, id);
        }
        if is_start {
            self.start = Some(id);
        }
        id
    }

    fn push_use(&mut self, def: NodeId, user: NodeId) {
        if let Some(Some(n)) = self.nodes.get_mut(def.index()) {
            if !n.uses.contains(&user) {
                n.uses.push(user);
            }
        }
    }

    fn pop_use(&mut self, def: NodeId, user: NodeId) {
        if let Some(Some(n)) = self.nodes.get_mut(def.index()) {
            n.uses.retain(|u| *u != user);
        }
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SeaError> {
        self.nodes
            .get(id.index())
            .and_then(|n| n.as_ref())
            .ok_or(SeaError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SeaError> {
        self.nodes
            .get_mut(id.index())
            .and_then(|n| n.as_mut())
            .ok_or(SeaError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|_| NodeId(i as u32)))
    }

    /// Add a def edge `user -> def` at input slot `slot`, growing `defs` if
    /// needed, and wire the matching use edge. Replaces (and correctly
    /// unwires) whatever was previously in that slot. "wiring
    /// round-trip".
    pub fn add_def_edge(&mut self, user: NodeId, slot: usize, def: NodeId) -> Result<(), SeaError> {
        if !self.contains(def) {
            return Err(SeaError::UnknownNode(def));
        }
        let previous = {
            let node = self.node_mut(user)?;
            if node.defs.len() <= slot {
                node.defs.resize(slot + 1, None);
            }
            std::mem::replace(&mut node.defs[slot], Some(def))
        };
        if let Some(previous) = previous {
            self.pop_use(previous, user);
        }
        self.push_use(def, user);
        Ok(())
    }

    /// Remove the def edge at `slot` on `user` (and the matching use edge).
    pub fn remove_def_edge(&mut self, user: NodeId, slot: usize) -> Result<(), SeaError> {
        let def = {
            let node = self.node_mut(user)?;
            node.defs.get(slot).copied().flatten()
        };
        if let Some(def) = def {
            self.node_mut(user)?.defs[slot] = None;
            self.pop_use(def, user);
        }
        Ok(())
    }

    /// Update `val`; returns `true` iff it changed (drives worklist
    /// re-enqueueing of `uses`).
    pub fn set_val(&mut self, id: NodeId, val: Type) -> Result<bool, SeaError> {
        let node = self.node_mut(id)?;
        if node.val == val {
            return Ok(false);
        }
        node.val = val;
        Ok(true)
    }

    /// Update `live`; returns `true` iff it changed (drives worklist
    /// re-enqueueing of `defs`).
    pub fn set_live(&mut self, id: NodeId, live: Type) -> Result<bool, SeaError> {
        let node = self.node_mut(id)?;
        if node.live == live {
            return Ok(false);
        }
        node.live = live;
        Ok(true)
    }

    /// Update `tv`; returns `true` iff it changed.
    pub fn set_tv(&mut self, id: NodeId, tv: Option<sea_core::TvId>) -> Result<bool, SeaError> {
        let node = self.node_mut(id)?;
        if node.tv == tv {
            return Ok(false);
        }
        node.tv = tv;
        Ok(true)
    }

    /// Remove a node if it has no uses and is not pinned. Recursively
    /// drops def edges so the callee's own defs can die in turn.
    pub fn kill_if_dead(&mut self, id: NodeId) -> Result<(), SeaError> {
        if !self.contains(id) || !self.node(id)?.is_dead() {
            return Ok(());
        }
        let defs: Vec<NodeId> = self.node(id)?.defs().collect();
        for def in &defs {
            self.pop_use(*def, id);
        }
        self.nodes[id.index()] = None;
        for def in defs {
            self.kill_if_dead(def)?;
        }
        Ok(())
    }

    /// The generic, lattice-free structural rewrites every node kind can
    /// apply regardless of what pass is driving the worklist: collapsing a
    /// control `Region` down to its single live predecessor. Rewrites that
    /// need type/unify context (If branch folding, Call inlining) live in
    /// the optimizer driver instead, since they need a
    /// `TypeInterner`/unifier this crate deliberately doesn't own.
    pub fn ideal_reduce(&mut self, id: NodeId) -> Result<Option<NodeId>, SeaError> {
        let node = self.node(id)?;
        if let Op::Region = node.op {
            let live_defs: Vec<NodeId> = node.defs().collect();
            if live_defs.len() == 1 {
                return Ok(Some(live_defs[0]));
            }
        }
        Ok(None)
    }

    /// Sea-of-nodes "replace all uses with": rewire every current user of
    /// `old` to point at `new` instead, then try to collect `old`. The
    /// optimizer's Call/CallEpi inlining rewrites are built on
    /// top of this.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<(), SeaError> {
        let users: Vec<NodeId> = self.node(old)?.uses().to_vec();
        for user in users {
            let len = self.node(user)?.slot_count();
            for slot in 0..len {
                if self.node(user)?.def(slot) == Some(old) {
                    self.add_def_edge(user, slot, new)?;
                }
            }
        }
        self.kill_if_dead(old)?;
        Ok(())
    }
}
