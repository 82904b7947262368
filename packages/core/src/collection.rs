use crate::error::{EngineError, EngineResult};
use crate::node::{Group, NodeId, Payload, Slot};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};

/// Ordered sibling sequence owned by one composite node. The chain is held
/// through the members' `prev`/`next` links; the collection itself only
/// tracks the endpoints, so membership changes are O(1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub first: Option<NodeId>,
    pub last: Option<NodeId>,
    pub len: usize,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Tree {
    /// The collection at `(owner, slot)`, or `None` if the slot is absent
    /// for that payload (including not-yet-refined optional slots).
    pub fn collection(&self, owner: NodeId, slot: Slot) -> Option<&Collection> {
        match (&self.node(owner).payload, slot) {
            (Payload::Stylesheet { statements }, Slot::Statements) => Some(statements),
            (Payload::Rule { selectors, .. }, Slot::Selectors) => Some(selectors),
            (Payload::Rule { declarations, .. }, Slot::Declarations) => Some(declarations),
            (Payload::AtRule { expression, .. }, Slot::Expression) => expression.as_ref(),
            (Payload::AtRule { block, .. }, Slot::Block) => block.as_ref(),
            (Payload::Selector { parts, .. }, Slot::Parts) => parts.as_ref(),
            (Payload::Declaration { value, .. }, Slot::Values) => value.as_ref(),
            _ => None,
        }
    }

    /// Read the collection for mutation, materializing optional slots.
    fn ensure_collection(&mut self, owner: NodeId, slot: Slot) -> EngineResult<Collection> {
        match (&mut self.node_mut(owner).payload, slot) {
            (Payload::Stylesheet { statements }, Slot::Statements) => Ok(*statements),
            (Payload::Rule { selectors, .. }, Slot::Selectors) => Ok(*selectors),
            (Payload::Rule { declarations, .. }, Slot::Declarations) => Ok(*declarations),
            (Payload::AtRule { expression, .. }, Slot::Expression) => {
                Ok(*expression.get_or_insert_with(Collection::default))
            }
            (Payload::AtRule { block, .. }, Slot::Block) => {
                Ok(*block.get_or_insert_with(Collection::default))
            }
            (Payload::Selector { parts, .. }, Slot::Parts) => {
                Ok(*parts.get_or_insert_with(Collection::default))
            }
            (Payload::Declaration { value, .. }, Slot::Values) => {
                Ok(*value.get_or_insert_with(Collection::default))
            }
            _ => Err(EngineError::InvalidSlot { node: owner, slot }),
        }
    }

    fn store_collection(&mut self, owner: NodeId, slot: Slot, col: Collection) {
        match (&mut self.node_mut(owner).payload, slot) {
            (Payload::Stylesheet { statements }, Slot::Statements) => *statements = col,
            (Payload::Rule { selectors, .. }, Slot::Selectors) => *selectors = col,
            (Payload::Rule { declarations, .. }, Slot::Declarations) => *declarations = col,
            (Payload::AtRule { expression, .. }, Slot::Expression) => *expression = Some(col),
            (Payload::AtRule { block, .. }, Slot::Block) => *block = Some(col),
            (Payload::Selector { parts, .. }, Slot::Parts) => *parts = Some(col),
            (Payload::Declaration { value, .. }, Slot::Values) => *value = Some(col),
            _ => {}
        }
    }

    fn check_attach(&self, owner: NodeId, item: NodeId) -> EngineResult<()> {
        if self.node(owner).destroyed {
            return Err(EngineError::DestroyedOwner { owner });
        }
        if self.node(item).destroyed {
            return Err(EngineError::DestroyedNode { node: item });
        }
        Ok(())
    }

    /// Append `item` to the end of `(owner, slot)`. An item already linked
    /// somewhere is moved, not duplicated.
    pub fn append(&mut self, owner: NodeId, slot: Slot, item: NodeId) -> EngineResult<()> {
        self.check_attach(owner, item)?;
        self.detach(item);
        let mut col = self.ensure_collection(owner, slot)?;
        let tail = col.last;
        {
            let link = &mut self.node_mut(item).link;
            link.prev = tail;
            link.next = None;
            link.group = Some(Group { owner, slot });
        }
        match tail {
            Some(t) => self.node_mut(t).link.next = Some(item),
            None => col.first = Some(item),
        }
        col.last = Some(item);
        col.len += 1;
        self.store_collection(owner, slot, col);
        Ok(())
    }

    /// Prepend `item` to the front of `(owner, slot)`.
    pub fn prepend(&mut self, owner: NodeId, slot: Slot, item: NodeId) -> EngineResult<()> {
        self.check_attach(owner, item)?;
        self.detach(item);
        let mut col = self.ensure_collection(owner, slot)?;
        let head = col.first;
        {
            let link = &mut self.node_mut(item).link;
            link.prev = None;
            link.next = head;
            link.group = Some(Group { owner, slot });
        }
        match head {
            Some(h) => self.node_mut(h).link.prev = Some(item),
            None => col.last = Some(item),
        }
        col.first = Some(item);
        col.len += 1;
        self.store_collection(owner, slot, col);
        Ok(())
    }

    /// Insert `item` immediately before `reference`, which must be linked.
    pub fn insert_before(&mut self, reference: NodeId, item: NodeId) -> EngineResult<()> {
        let group = self
            .node(reference)
            .link
            .group
            .ok_or(EngineError::Unlinked { node: reference })?;
        self.check_attach(group.owner, item)?;
        self.detach(item);
        let mut col = self.ensure_collection(group.owner, group.slot)?;
        let before = self.node(reference).link.prev;
        {
            let link = &mut self.node_mut(item).link;
            link.prev = before;
            link.next = Some(reference);
            link.group = Some(group);
        }
        self.node_mut(reference).link.prev = Some(item);
        match before {
            Some(b) => self.node_mut(b).link.next = Some(item),
            None => col.first = Some(item),
        }
        col.len += 1;
        self.store_collection(group.owner, group.slot, col);
        Ok(())
    }

    /// Insert `item` immediately after `reference`, which must be linked.
    pub fn insert_after(&mut self, reference: NodeId, item: NodeId) -> EngineResult<()> {
        let group = self
            .node(reference)
            .link
            .group
            .ok_or(EngineError::Unlinked { node: reference })?;
        self.check_attach(group.owner, item)?;
        self.detach(item);
        let mut col = self.ensure_collection(group.owner, group.slot)?;
        let after = self.node(reference).link.next;
        {
            let link = &mut self.node_mut(item).link;
            link.prev = Some(reference);
            link.next = after;
            link.group = Some(group);
        }
        self.node_mut(reference).link.next = Some(item);
        match after {
            Some(a) => self.node_mut(a).link.prev = Some(item),
            None => col.last = Some(item),
        }
        col.len += 1;
        self.store_collection(group.owner, group.slot, col);
        Ok(())
    }

    /// Unlink `item` from its collection. Idempotent: detaching an already
    /// detached item is a no-op. The item's own `prev`/`next` are left in
    /// place so iterators caught mid-walk can resume from them.
    pub fn detach(&mut self, item: NodeId) {
        let Some(group) = self.node(item).link.group else {
            return;
        };
        let (prev, next) = {
            let link = &self.node(item).link;
            (link.prev, link.next)
        };
        let mut col = match self.collection(group.owner, group.slot) {
            Some(c) => *c,
            None => return,
        };
        match prev {
            Some(p) => self.node_mut(p).link.next = next,
            None => col.first = next,
        }
        match next {
            Some(n) => self.node_mut(n).link.prev = prev,
            None => col.last = prev,
        }
        col.len = col.len.saturating_sub(1);
        self.node_mut(item).link.group = None;
        self.store_collection(group.owner, group.slot, col);
    }

    pub fn first_in(&self, owner: NodeId, slot: Slot) -> Option<NodeId> {
        self.collection(owner, slot).and_then(|c| c.first)
    }

    pub fn last_in(&self, owner: NodeId, slot: Slot) -> Option<NodeId> {
        self.collection(owner, slot).and_then(|c| c.last)
    }

    pub fn len_of(&self, owner: NodeId, slot: Slot) -> usize {
        self.collection(owner, slot).map_or(0, |c| c.len)
    }

    /// The next member of `group` after `item`, resuming past any nodes
    /// detached since `item` was visited. Follows the stale chain of a
    /// detached `item` until it finds a node still in the group.
    pub fn following(&self, item: NodeId, group: Group) -> Option<NodeId> {
        let mut next = self.node(item).link.next;
        while let Some(n) = next {
            if self.node(n).link.group == Some(group) {
                return Some(n);
            }
            next = self.node(n).link.next;
        }
        None
    }

    /// Read-only iteration over `(owner, slot)` members.
    pub fn items(&self, owner: NodeId, slot: Slot) -> CollectionIter<'_> {
        CollectionIter {
            tree: self,
            cur: self.first_in(owner, slot),
        }
    }

    /// True iff no member's writability predicate holds. Used by the writer
    /// to decide whether an empty or fully-detached group renders anything.
    pub fn is_empty_or_none_writable(&self, owner: NodeId, slot: Slot) -> bool {
        !self.items(owner, slot).any(|n| self.is_writable(n))
    }
}

pub struct CollectionIter<'a> {
    tree: &'a Tree,
    cur: Option<NodeId>,
}

impl<'a> Iterator for CollectionIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.tree.node(id).link.next;
        Some(id)
    }
}
