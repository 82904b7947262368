use crate::broadcast::{Broadcaster, Phase, SubscriptionPhase};
use crate::diagnostics::Findings;
use crate::error::{EngineError, EngineResult};
use crate::node::{child_slots, Group, NodeId, SimpleSelectorKind, Slot, Status, TermKind};
use crate::plugin::Registry;
use crate::tree::Tree;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Seam to the grammar layer: turns one raw node into attached, refined
/// children and returns them for broadcast. Implementations must leave
/// already-refined nodes alone.
pub trait Refiner {
    fn refine(&self, tree: &mut Tree, node: NodeId) -> EngineResult<Vec<NodeId>>;
}

/// Refiner that never refines anything; raw nodes re-emit verbatim.
#[derive(Debug, Default)]
pub struct NoopRefiner;

impl Refiner for NoopRefiner {
    fn refine(&self, _tree: &mut Tree, _node: NodeId) -> EngineResult<Vec<NodeId>> {
        Ok(Vec::new())
    }
}

/// Terminal link of the broadcaster chain: routes each broadcast node to
/// the matching subscriptions, phase by phase.
///
/// Ordering contract: children are dispatched before their parent for the
/// same phase; rework subscribers run before observers; registration order
/// breaks ties; the status gate guarantees no node is delivered twice for
/// one phase. Mutations made by subscribers land on the pending worklist,
/// drained in enqueue order by the outermost frame; each entry finishes
/// its phase chain before the next starts, so a node is never re-entered
/// while its own delivery is still in progress.
pub struct Dispatcher<'a> {
    registry: &'a mut Registry,
    refiner: &'a dyn Refiner,
    phase: Option<Phase>,
    pending: VecDeque<NodeId>,
    draining: bool,
    findings: Findings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a mut Registry, refiner: &'a dyn Refiner) -> Self {
        Self {
            registry,
            refiner,
            phase: None,
            pending: VecDeque::new(),
            draining: false,
            findings: Findings::new(),
        }
    }

    pub fn begin(&mut self, phase: Phase) {
        self.phase = Some(phase);
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn findings(&self) -> &Findings {
        &self.findings
    }

    pub fn take_findings(&mut self) -> Findings {
        std::mem::take(&mut self.findings)
    }

    /// Run one phase over the tree rooted at `root`.
    pub fn run_phase(&mut self, tree: &mut Tree, root: NodeId, phase: Phase) -> EngineResult<()> {
        debug!(?phase, "running phase");
        self.phase = Some(phase);
        self.dispatch(tree, root, phase)
    }

    /// Advance every node that survived validation to its final status.
    pub fn finish(&mut self, tree: &mut Tree) -> EngineResult<()> {
        for id in tree.ids() {
            if !tree.is_destroyed(id) && tree.status(id) == Status::BroadcastedValidate {
                tree.advance_status(id, Status::Processed)?;
            }
        }
        Ok(())
    }

    /// Only the outermost frame drains. A subscriber reached from in here
    /// can enqueue more work, but draining it immediately would re-enter
    /// the node currently mid-delivery through its parent's child walk;
    /// the queue is left for the frame that started the drain instead.
    fn drain(&mut self, tree: &mut Tree) -> EngineResult<()> {
        if self.draining {
            return Ok(());
        }
        self.draining = true;
        while let Some(node) = self.pending.pop_front() {
            let phase = self.phase.unwrap_or(Phase::Refine);
            for &p in phase.chain() {
                if let Err(err) = self.dispatch(tree, node, p) {
                    self.draining = false;
                    return Err(err);
                }
            }
        }
        self.draining = false;
        Ok(())
    }

    /// Dispatch one node for one phase: children first, then the node's
    /// subscribers, then the status advance. Skips destroyed, `NeverEmit`,
    /// broadcast-breaking and already-delivered nodes.
    fn dispatch(&mut self, tree: &mut Tree, node: NodeId, phase: Phase) -> EngineResult<()> {
        {
            let data = tree.node(node);
            if data.destroyed || data.status == Status::NeverEmit {
                return Ok(());
            }
        }
        if tree.breaks_broadcast(node) {
            return Ok(());
        }
        if tree.status(node).at_least(phase.post_status()) {
            return Ok(());
        }
        trace!(node = node.index(), kind = ?tree.kind(node), ?phase, "dispatch");

        for &slot in child_slots(tree.kind(node)) {
            let group = Group { owner: node, slot };
            let mut cur = tree.first_in(node, slot);
            while let Some(item) = cur {
                self.dispatch(tree, item, phase)?;
                cur = tree.following(item, group);
            }
        }

        match phase {
            Phase::Refine => {
                self.deliver(tree, node, SubscriptionPhase::Refine)?;
                let alive = {
                    let data = tree.node(node);
                    !data.destroyed && data.status != Status::NeverEmit
                };
                if alive && !tree.breaks_broadcast(node) && !tree.is_refined(node) {
                    let created = self.refiner.refine(tree, node)?;
                    if !created.is_empty() {
                        debug!(
                            node = node.index(),
                            created = created.len(),
                            "default refinement"
                        );
                        // fresh children of the node mid-refinement; recurse
                        // directly so they finish before the node does
                        for child in created {
                            self.dispatch(tree, child, Phase::Refine)?;
                        }
                    }
                }
            }
            Phase::Process => {
                self.deliver(tree, node, SubscriptionPhase::Rework)?;
                self.deliver(tree, node, SubscriptionPhase::Observe)?;
            }
            Phase::Validate => {
                self.deliver(tree, node, SubscriptionPhase::Validate)?;
            }
        }

        let data = tree.node(node);
        if !data.destroyed && data.status != Status::NeverEmit {
            tree.advance_status(node, phase.post_status())?;
        }
        Ok(())
    }

    fn deliver(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        sub_phase: SubscriptionPhase,
    ) -> EngineResult<()> {
        let matched: Vec<usize> = self
            .registry
            .subscriptions
            .iter()
            .filter(|s| s.phase == sub_phase && s.filter.matches(tree, node))
            .map(|s| s.plugin)
            .collect();

        for index in matched {
            // a previous subscriber may have destroyed or suppressed the node
            {
                let data = tree.node(node);
                if data.destroyed || data.status == Status::NeverEmit {
                    break;
                }
            }
            if tree.breaks_broadcast(node) {
                break;
            }
            {
                let Self {
                    registry, pending, findings, ..
                } = self;
                let plugin = registry.plugin_mut(index);
                match sub_phase {
                    SubscriptionPhase::Refine => {
                        let mut ctx = PluginContext::new(tree, pending);
                        plugin.refine(&mut ctx, node)?;
                    }
                    SubscriptionPhase::Rework => {
                        let mut ctx = PluginContext::new(tree, pending);
                        plugin.rework(&mut ctx, node)?;
                    }
                    SubscriptionPhase::Observe => plugin.observe(tree, node),
                    SubscriptionPhase::Validate => plugin.validate(tree, node, findings),
                }
            }
            self.drain(tree)?;
        }
        Ok(())
    }
}

impl Broadcaster for Dispatcher<'_> {
    fn broadcast(&mut self, tree: &mut Tree, node: NodeId) -> EngineResult<()> {
        let phase = match self.phase {
            Some(p) => p,
            None => {
                // a positionless node with no active phase signals a
                // configuration error in the caller
                if tree.span(node).is_none() {
                    return Err(EngineError::MissingPhase { node });
                }
                self.phase = Some(Phase::Refine);
                Phase::Refine
            }
        };
        for &p in phase.chain() {
            self.dispatch(tree, node, p)?;
        }
        Ok(())
    }
}

/// Mutation surface handed to refine and rework subscribers. Structural
/// changes route through here so that newly attached, not-yet-broadcast
/// nodes enter the dispatch pipeline.
pub struct PluginContext<'a> {
    tree: &'a mut Tree,
    pending: &'a mut VecDeque<NodeId>,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(tree: &'a mut Tree, pending: &'a mut VecDeque<NodeId>) -> Self {
        Self { tree, pending }
    }

    pub fn tree(&self) -> &Tree {
        self.tree
    }

    /// Direct tree access for non-structural edits (payload text, comments).
    pub fn tree_mut(&mut self) -> &mut Tree {
        self.tree
    }

    fn enqueue(&mut self, node: NodeId) {
        if !self.tree.is_destroyed(node) && self.tree.status(node) == Status::Unbroadcasted {
            self.pending.push_back(node);
        }
    }

    pub fn append(&mut self, owner: NodeId, slot: Slot, item: NodeId) -> EngineResult<()> {
        self.tree.append(owner, slot, item)?;
        self.enqueue(item);
        Ok(())
    }

    pub fn prepend(&mut self, owner: NodeId, slot: Slot, item: NodeId) -> EngineResult<()> {
        self.tree.prepend(owner, slot, item)?;
        self.enqueue(item);
        Ok(())
    }

    pub fn insert_before(&mut self, reference: NodeId, item: NodeId) -> EngineResult<()> {
        self.tree.insert_before(reference, item)?;
        self.enqueue(item);
        Ok(())
    }

    pub fn insert_after(&mut self, reference: NodeId, item: NodeId) -> EngineResult<()> {
        self.tree.insert_after(reference, item)?;
        self.enqueue(item);
        Ok(())
    }

    pub fn destroy(&mut self, node: NodeId) {
        self.tree.destroy(node);
    }

    pub fn never_emit(&mut self, node: NodeId) {
        self.tree.mark_never_emit(node);
    }

    /// Deep copy; broadcast happens when the copy is attached.
    pub fn copy(&mut self, node: NodeId) -> EngineResult<NodeId> {
        self.tree.copy(node)
    }

    /// Re-submit a node that was built outside the context methods.
    pub fn broadcast(&mut self, node: NodeId) {
        self.enqueue(node);
    }

    pub fn new_rule(&mut self) -> NodeId {
        self.tree.new_rule(None)
    }

    pub fn new_declaration(&mut self, property: impl Into<String>) -> NodeId {
        self.tree.new_declaration(property)
    }

    pub fn new_term(&mut self, kind: TermKind, text: impl Into<String>) -> NodeId {
        self.tree.new_term(kind, text)
    }

    pub fn new_empty_selector(&mut self) -> NodeId {
        self.tree.new_empty_selector()
    }

    pub fn new_simple_selector(
        &mut self,
        kind: SimpleSelectorKind,
        name: impl Into<String>,
    ) -> NodeId {
        self.tree.new_simple_selector(kind, name)
    }

    pub fn new_custom(&mut self, name: impl Into<String>, content: impl Into<String>) -> NodeId {
        self.tree.new_custom(name, content)
    }

    /// Supply an at-rule's refined expression directly, preempting default
    /// refinement; the at-rule refuses all further delivery.
    pub fn set_at_rule_expression(
        &mut self,
        at_rule: NodeId,
        terms: Vec<NodeId>,
    ) -> EngineResult<()> {
        for term in terms {
            self.tree.append(at_rule, Slot::Expression, term)?;
        }
        self.tree.mark_broadcast_break(at_rule);
        Ok(())
    }

    /// Supply an at-rule's refined block directly, preempting default
    /// refinement; the at-rule refuses all further delivery.
    pub fn set_at_rule_block(
        &mut self,
        at_rule: NodeId,
        statements: Vec<NodeId>,
    ) -> EngineResult<()> {
        for statement in statements {
            self.tree.append(at_rule, Slot::Block, statement)?;
        }
        self.tree.mark_broadcast_break(at_rule);
        Ok(())
    }
}
