use crate::collection::Collection;
use crate::error::EngineResult;
use crate::node::{
    child_slots, NodeData, NodeId, NodeKind, Payload, RawContent, SimpleSelectorKind, Slot, Span,
    Status, TermKind,
};
use serde::{Deserialize, Serialize};

/// Index-addressed arena holding every node of one processing run. Slots
/// are never freed within a run, so a `NodeId` stays valid (and unique)
/// for the lifetime of the tree; destroyed nodes are only marked.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, span: Option<Span>, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(span, payload));
        id
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind()
    }

    pub fn status(&self, id: NodeId) -> Status {
        self.node(id).status
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.node(id).span
    }

    pub fn is_destroyed(&self, id: NodeId) -> bool {
        self.node(id).destroyed
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).link.group.map(|g| g.owner)
    }

    /// Advance a node's status, enforcing the transition law.
    pub fn advance_status(&mut self, id: NodeId, to: Status) -> EngineResult<()> {
        let next = self.node(id).status.transition(to)?;
        self.node_mut(id).status = next;
        Ok(())
    }

    /// Exclude a node from all future dispatch and serialization.
    pub fn mark_never_emit(&mut self, id: NodeId) {
        self.node_mut(id).status = Status::NeverEmit;
    }

    /// Detach a node and permanently suppress it and its whole subtree.
    pub fn destroy(&mut self, id: NodeId) {
        if self.node(id).destroyed {
            return;
        }
        self.detach(id);
        {
            let data = self.node_mut(id);
            data.destroyed = true;
            data.status = Status::NeverEmit;
        }
        for &slot in child_slots(self.kind(id)) {
            let children: Vec<NodeId> = self.items(id, slot).collect();
            for child in children {
                self.destroy(child);
            }
        }
    }

    // -- constructors ------------------------------------------------------

    pub fn new_stylesheet(&mut self) -> NodeId {
        self.alloc(
            Some(Span::new(1, 1)),
            Payload::Stylesheet {
                statements: Collection::default(),
            },
        )
    }

    pub fn new_rule(&mut self, span: Option<Span>) -> NodeId {
        self.alloc(
            span,
            Payload::Rule {
                selectors: Collection::default(),
                declarations: Collection::default(),
            },
        )
    }

    pub fn new_at_rule(
        &mut self,
        span: Option<Span>,
        name: impl Into<String>,
        raw_expression: Option<RawContent>,
        raw_block: Option<RawContent>,
    ) -> NodeId {
        self.alloc(
            span,
            Payload::AtRule {
                name: name.into(),
                raw_expression,
                expression: None,
                raw_block,
                block: None,
                broadcast_break: false,
            },
        )
    }

    pub fn new_selector(&mut self, span: Option<Span>, raw: RawContent) -> NodeId {
        self.alloc(
            span,
            Payload::Selector {
                raw: Some(raw),
                parts: None,
            },
        )
    }

    /// A selector a plugin assembles from parts, no raw content.
    pub fn new_empty_selector(&mut self) -> NodeId {
        self.alloc(
            None,
            Payload::Selector {
                raw: None,
                parts: Some(Collection::default()),
            },
        )
    }

    pub fn new_simple_selector(&mut self, kind: SimpleSelectorKind, name: impl Into<String>) -> NodeId {
        self.alloc(
            None,
            Payload::SimpleSelector {
                kind,
                name: name.into(),
            },
        )
    }

    pub fn new_declaration_raw(
        &mut self,
        span: Option<Span>,
        property: impl Into<String>,
        raw_value: RawContent,
    ) -> NodeId {
        self.alloc(
            span,
            Payload::Declaration {
                property: property.into(),
                raw_value: Some(raw_value),
                value: None,
            },
        )
    }

    /// A declaration a plugin assembles from terms, no raw content.
    pub fn new_declaration(&mut self, property: impl Into<String>) -> NodeId {
        self.alloc(
            None,
            Payload::Declaration {
                property: property.into(),
                raw_value: None,
                value: Some(Collection::default()),
            },
        )
    }

    pub fn new_term(&mut self, kind: TermKind, text: impl Into<String>) -> NodeId {
        self.alloc(
            None,
            Payload::Term {
                kind,
                text: text.into(),
            },
        )
    }

    pub fn new_custom(&mut self, name: impl Into<String>, content: impl Into<String>) -> NodeId {
        self.alloc(
            None,
            Payload::Custom {
                name: name.into(),
                content: content.into(),
            },
        )
    }

    pub fn attach_comments(&mut self, id: NodeId, comments: Vec<String>) {
        self.node_mut(id).comments.extend(comments);
    }

    pub fn attach_orphaned_comments(&mut self, id: NodeId, comments: Vec<String>) {
        self.node_mut(id).orphaned_comments.extend(comments);
    }

    // -- refinement accessors ----------------------------------------------

    /// Refined content present. Leaf variants count as always refined.
    pub fn is_refined(&self, id: NodeId) -> bool {
        match &self.node(id).payload {
            Payload::Selector { parts, .. } => parts.is_some(),
            Payload::Declaration { value, .. } => value.is_some(),
            Payload::AtRule {
                expression, block, ..
            } => expression.is_some() || block.is_some(),
            _ => true,
        }
    }

    pub fn take_selector_raw(&mut self, id: NodeId) -> Option<RawContent> {
        match &mut self.node_mut(id).payload {
            Payload::Selector { raw, .. } => raw.take(),
            _ => None,
        }
    }

    pub fn take_declaration_raw(&mut self, id: NodeId) -> Option<RawContent> {
        match &mut self.node_mut(id).payload {
            Payload::Declaration { raw_value, .. } => raw_value.take(),
            _ => None,
        }
    }

    pub fn take_at_rule_raw_expression(&mut self, id: NodeId) -> Option<RawContent> {
        match &mut self.node_mut(id).payload {
            Payload::AtRule { raw_expression, .. } => raw_expression.take(),
            _ => None,
        }
    }

    pub fn take_at_rule_raw_block(&mut self, id: NodeId) -> Option<RawContent> {
        match &mut self.node_mut(id).payload {
            Payload::AtRule { raw_block, .. } => raw_block.take(),
            _ => None,
        }
    }

    /// Permanently refuse further delivery for an at-rule whose structure a
    /// plugin supplied directly.
    pub fn mark_broadcast_break(&mut self, id: NodeId) {
        if let Payload::AtRule {
            broadcast_break, ..
        } = &mut self.node_mut(id).payload
        {
            *broadcast_break = true;
        }
    }

    pub fn breaks_broadcast(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).payload,
            Payload::AtRule {
                broadcast_break: true,
                ..
            }
        )
    }

    // -- text accessors ----------------------------------------------------

    pub fn at_rule_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::AtRule { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn property(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::Declaration { property, .. } => Some(property),
            _ => None,
        }
    }

    pub fn term_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::Term { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn simple_selector_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::SimpleSelector { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Declaration value as text: the trimmed raw content before refinement,
    /// the joined term list after.
    pub fn value_text(&self, id: NodeId) -> Option<String> {
        match &self.node(id).payload {
            Payload::Declaration {
                raw_value, value, ..
            } => {
                if value.is_some() {
                    let mut out = String::new();
                    for term in self.items(id, Slot::Values) {
                        if self.is_destroyed(term) {
                            continue;
                        }
                        let text = self.term_text(term).unwrap_or_default();
                        let operator = matches!(
                            self.node(term).payload,
                            Payload::Term {
                                kind: TermKind::Operator,
                                ..
                            }
                        );
                        if !out.is_empty() && !operator {
                            out.push(' ');
                        }
                        out.push_str(text);
                    }
                    Some(out)
                } else {
                    raw_value.as_ref().map(|r| r.content.trim().to_string())
                }
            }
            _ => None,
        }
    }

    // -- writability -------------------------------------------------------

    /// False if destroyed or `NeverEmit`; composites additionally require at
    /// least one writable child in their defining groups.
    pub fn is_writable(&self, id: NodeId) -> bool {
        let data = self.node(id);
        if data.destroyed || data.status == Status::NeverEmit {
            return false;
        }
        match &data.payload {
            Payload::Stylesheet { .. } => true,
            Payload::Rule { .. } => {
                !self.is_empty_or_none_writable(id, Slot::Selectors)
                    && !self.is_empty_or_none_writable(id, Slot::Declarations)
            }
            Payload::AtRule {
                raw_expression,
                expression,
                raw_block,
                block,
                ..
            } => {
                if block.is_some() {
                    !self.is_empty_or_none_writable(id, Slot::Block)
                } else if raw_block.is_some() {
                    true
                } else {
                    raw_expression.is_some()
                        || (expression.is_some()
                            && !self.is_empty_or_none_writable(id, Slot::Expression))
                }
            }
            Payload::Selector { raw, parts } => {
                if parts.is_some() {
                    !self.is_empty_or_none_writable(id, Slot::Parts)
                } else {
                    raw.as_ref().is_some_and(|r| !r.content.trim().is_empty())
                }
            }
            Payload::SimpleSelector { .. } | Payload::Term { .. } => true,
            Payload::Declaration {
                property,
                raw_value,
                value,
            } => {
                !property.is_empty()
                    && if value.is_some() {
                        !self.is_empty_or_none_writable(id, Slot::Values)
                    } else {
                        raw_value.is_some()
                    }
            }
            Payload::Custom { content, .. } => !content.is_empty(),
        }
    }

    // -- copying -----------------------------------------------------------

    /// Deep copy: fresh ids for the whole subtree, `Unbroadcasted` status,
    /// no source positions, comments carried over. Destroyed descendants are
    /// already detached and therefore not copied.
    pub fn copy(&mut self, src: NodeId) -> EngineResult<NodeId> {
        let template = match &self.node(src).payload {
            Payload::Stylesheet { .. } => Payload::Stylesheet {
                statements: Collection::default(),
            },
            Payload::Rule { .. } => Payload::Rule {
                selectors: Collection::default(),
                declarations: Collection::default(),
            },
            Payload::AtRule {
                name,
                raw_expression,
                expression,
                raw_block,
                block,
                broadcast_break,
            } => Payload::AtRule {
                name: name.clone(),
                raw_expression: raw_expression.clone(),
                expression: expression.map(|_| Collection::default()),
                raw_block: raw_block.clone(),
                block: block.map(|_| Collection::default()),
                broadcast_break: *broadcast_break,
            },
            Payload::Selector { raw, parts } => Payload::Selector {
                raw: raw.clone(),
                parts: parts.map(|_| Collection::default()),
            },
            Payload::SimpleSelector { kind, name } => Payload::SimpleSelector {
                kind: *kind,
                name: name.clone(),
            },
            Payload::Declaration {
                property,
                raw_value,
                value,
            } => Payload::Declaration {
                property: property.clone(),
                raw_value: raw_value.clone(),
                value: value.map(|_| Collection::default()),
            },
            Payload::Term { kind, text } => Payload::Term {
                kind: *kind,
                text: text.clone(),
            },
            Payload::Custom { name, content } => Payload::Custom {
                name: name.clone(),
                content: content.clone(),
            },
        };
        let comments = self.node(src).comments.clone();
        let orphaned = self.node(src).orphaned_comments.clone();
        let dst = self.alloc(None, template);
        self.node_mut(dst).comments = comments;
        self.node_mut(dst).orphaned_comments = orphaned;
        for &slot in child_slots(self.kind(src)) {
            let children: Vec<NodeId> = self.items(src, slot).collect();
            for child in children {
                let copied = self.copy(child)?;
                self.append(dst, slot, copied)?;
            }
        }
        Ok(dst)
    }
}
