use crate::error::EngineResult;
use crate::node::{NodeId, NodeKind, Status};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The ordered stages a node passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Refine,
    Process,
    Validate,
}

impl Phase {
    /// Status a node carries once this phase has delivered it.
    pub fn post_status(self) -> Status {
        match self {
            Phase::Refine => Status::BroadcastedPreprocess,
            Phase::Process => Status::BroadcastedProcess,
            Phase::Validate => Status::BroadcastedValidate,
        }
    }

    /// The catch-up chain: every phase from `Refine` through `self`, in
    /// order. A node broadcast mid-run walks the whole chain; the status
    /// gate skips the stages it already passed.
    pub fn chain(self) -> &'static [Phase] {
        match self {
            Phase::Refine => &[Phase::Refine],
            Phase::Process => &[Phase::Refine, Phase::Process],
            Phase::Validate => &[Phase::Refine, Phase::Process, Phase::Validate],
        }
    }
}

/// Subscription granularity: `Process` splits into rework (mutating) and
/// observe (read-only), with rework always delivered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPhase {
    Refine,
    Rework,
    Observe,
    Validate,
}

/// Matches a subscription against a node's runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every node.
    Any,
    /// Exact payload variant.
    Kind(NodeKind),
    /// Nodes that participate in the refinement contract.
    Refinable,
}

impl TypeFilter {
    pub fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Kind(kind) => tree.kind(node) == *kind,
            TypeFilter::Refinable => matches!(
                tree.kind(node),
                NodeKind::Selector | NodeKind::Declaration | NodeKind::AtRule
            ),
        }
    }
}

impl From<NodeKind> for TypeFilter {
    fn from(kind: NodeKind) -> Self {
        TypeFilter::Kind(kind)
    }
}

/// Accepts a broadcast node and stores it, forwards it, or dispatches it.
/// Chains compose by delegation; the terminal link is the dispatch engine.
pub trait Broadcaster {
    fn broadcast(&mut self, tree: &mut Tree, node: NodeId) -> EngineResult<()>;
}

/// Swallows everything. Useful as a chain terminator in tests and when
/// building sub-trees that are broadcast later as a whole.
#[derive(Debug, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast(&mut self, _tree: &mut Tree, _node: NodeId) -> EngineResult<()> {
        Ok(())
    }
}

/// Records every node it sees, optionally relaying to the next link.
pub struct QueryableBroadcaster<'b> {
    found: Vec<NodeId>,
    relay: Option<&'b mut dyn Broadcaster>,
}

impl<'b> QueryableBroadcaster<'b> {
    pub fn new() -> Self {
        Self {
            found: Vec::new(),
            relay: None,
        }
    }

    pub fn relaying(relay: &'b mut dyn Broadcaster) -> Self {
        Self {
            found: Vec::new(),
            relay: Some(relay),
        }
    }

    pub fn found(&self) -> &[NodeId] {
        &self.found
    }

    pub fn into_found(self) -> Vec<NodeId> {
        self.found
    }

    pub fn find_only_of(&self, tree: &Tree, kind: NodeKind) -> Option<NodeId> {
        let mut matches = self.found.iter().filter(|&&n| tree.kind(n) == kind);
        let first = matches.next();
        match matches.next() {
            Some(_) => None,
            None => first.copied(),
        }
    }
}

impl Default for QueryableBroadcaster<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for QueryableBroadcaster<'_> {
    fn broadcast(&mut self, tree: &mut Tree, node: NodeId) -> EngineResult<()> {
        self.found.push(node);
        match &mut self.relay {
            Some(relay) => relay.broadcast(tree, node),
            None => Ok(()),
        }
    }
}

/// Defers broadcasts while paused, flushing them in arrival order on
/// resume. Unpaused it is a transparent relay.
pub struct QueuingBroadcaster<'b> {
    relay: &'b mut dyn Broadcaster,
    queue: VecDeque<NodeId>,
    paused: bool,
}

impl<'b> QueuingBroadcaster<'b> {
    pub fn new(relay: &'b mut dyn Broadcaster) -> Self {
        Self {
            relay,
            queue: VecDeque::new(),
            paused: false,
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self, tree: &mut Tree) -> EngineResult<()> {
        self.paused = false;
        while let Some(node) = self.queue.pop_front() {
            self.relay.broadcast(tree, node)?;
        }
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Broadcaster for QueuingBroadcaster<'_> {
    fn broadcast(&mut self, tree: &mut Tree, node: NodeId) -> EngineResult<()> {
        if self.paused {
            self.queue.push_back(node);
            Ok(())
        } else {
            self.relay.broadcast(tree, node)
        }
    }
}
