use crate::collection::Collection;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Handle into the tree arena. Identity of a node for the whole run;
/// arena slots are never freed, so ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source position, 1-based. Absent for dynamically constructed nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Verbatim source substring plus its origin, kept for re-emission and
/// position-correct refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    pub line: u32,
    pub column: u32,
    pub content: String,
}

impl RawContent {
    pub fn new(line: u32, column: u32, content: impl Into<String>) -> Self {
        Self {
            line,
            column,
            content: content.into(),
        }
    }

    pub fn origin(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

/// Lifecycle status of a node. Advances monotonically through the lattice;
/// `NeverEmit` is reachable from any state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Unbroadcasted,
    BroadcastedPreprocess,
    BroadcastedProcess,
    BroadcastedValidate,
    Processed,
    NeverEmit,
}

impl Status {
    /// Position in the lattice, `None` for the terminal escape hatch.
    fn rank(self) -> Option<u8> {
        match self {
            Status::Unbroadcasted => Some(0),
            Status::BroadcastedPreprocess => Some(1),
            Status::BroadcastedProcess => Some(2),
            Status::BroadcastedValidate => Some(3),
            Status::Processed => Some(4),
            Status::NeverEmit => None,
        }
    }

    /// True if this status has reached `other` in the lattice. `NeverEmit`
    /// counts as past everything so gated dispatch always skips it.
    pub fn at_least(self, other: Status) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a >= b,
            (None, _) => true,
            (_, None) => false,
        }
    }

    /// Validate a transition. Any step other than the next lattice state or
    /// `NeverEmit` is a configuration error.
    pub fn transition(self, to: Status) -> EngineResult<Status> {
        let legal = match (self, to) {
            (_, Status::NeverEmit) => true,
            (a, b) => match (a.rank(), b.rank()) {
                (Some(x), Some(y)) => y == x + 1,
                _ => false,
            },
        };
        if legal {
            Ok(to)
        } else {
            Err(EngineError::illegal_transition(self, to))
        }
    }
}

/// Runtime type of a node, mirroring the payload variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Stylesheet,
    Rule,
    AtRule,
    Selector,
    SimpleSelector,
    Declaration,
    Term,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleSelectorKind {
    Type,
    Universal,
    Class,
    Id,
    Pseudo,
    Attribute,
    Combinator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermKind {
    Keyword,
    Number,
    Hex,
    StringLiteral,
    Function,
    Operator,
}

/// Which sibling sequence of an owner a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Statements,
    Selectors,
    Declarations,
    Expression,
    Block,
    Parts,
    Values,
}

/// Back-reference from a linked node to its owning collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub owner: NodeId,
    pub slot: Slot,
}

/// Sibling links. `prev`/`next` are preserved on detach so an in-flight
/// iterator can resume from the nearest still-attached node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
    pub group: Option<Group>,
}

/// Node payload: a closed union of the known CSS constructs plus one
/// extensibility variant. Raw and refined content are never both
/// meaningfully populated; refinement moves raw out as it attaches children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Stylesheet {
        statements: Collection,
    },
    Rule {
        selectors: Collection,
        declarations: Collection,
    },
    AtRule {
        name: String,
        raw_expression: Option<RawContent>,
        expression: Option<Collection>,
        raw_block: Option<RawContent>,
        block: Option<Collection>,
        /// Set when a plugin supplied refined structure directly; the node
        /// refuses all further delivery.
        broadcast_break: bool,
    },
    Selector {
        raw: Option<RawContent>,
        parts: Option<Collection>,
    },
    SimpleSelector {
        kind: SimpleSelectorKind,
        name: String,
    },
    Declaration {
        property: String,
        raw_value: Option<RawContent>,
        value: Option<Collection>,
    },
    Term {
        kind: TermKind,
        text: String,
    },
    Custom {
        name: String,
        content: String,
    },
}

impl Payload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Stylesheet { .. } => NodeKind::Stylesheet,
            Payload::Rule { .. } => NodeKind::Rule,
            Payload::AtRule { .. } => NodeKind::AtRule,
            Payload::Selector { .. } => NodeKind::Selector,
            Payload::SimpleSelector { .. } => NodeKind::SimpleSelector,
            Payload::Declaration { .. } => NodeKind::Declaration,
            Payload::Term { .. } => NodeKind::Term,
            Payload::Custom { .. } => NodeKind::Custom,
        }
    }
}

/// One tree element: identity lives in the arena index, everything else here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub span: Option<Span>,
    pub status: Status,
    pub destroyed: bool,
    pub comments: Vec<String>,
    pub orphaned_comments: Vec<String>,
    pub link: Link,
    pub payload: Payload,
}

impl NodeData {
    pub(crate) fn new(span: Option<Span>, payload: Payload) -> Self {
        Self {
            span,
            status: Status::Unbroadcasted,
            destroyed: false,
            comments: Vec::new(),
            orphaned_comments: Vec::new(),
            link: Link::default(),
            payload,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }
}

/// Child collections of a composite node, in document order. Propagation
/// visits these slots before delivering the node itself.
pub fn child_slots(kind: NodeKind) -> &'static [Slot] {
    match kind {
        NodeKind::Stylesheet => &[Slot::Statements],
        NodeKind::Rule => &[Slot::Selectors, Slot::Declarations],
        NodeKind::AtRule => &[Slot::Expression, Slot::Block],
        NodeKind::Selector => &[Slot::Parts],
        NodeKind::Declaration => &[Slot::Values],
        NodeKind::SimpleSelector | NodeKind::Term | NodeKind::Custom => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_one_step_at_a_time() {
        let s = Status::Unbroadcasted;
        let s = s.transition(Status::BroadcastedPreprocess).unwrap();
        let s = s.transition(Status::BroadcastedProcess).unwrap();
        let s = s.transition(Status::BroadcastedValidate).unwrap();
        let s = s.transition(Status::Processed).unwrap();
        assert_eq!(s, Status::Processed);
    }

    #[test]
    fn test_status_rejects_skips_and_regressions() {
        assert!(Status::Unbroadcasted
            .transition(Status::BroadcastedProcess)
            .is_err());
        assert!(Status::BroadcastedProcess
            .transition(Status::BroadcastedPreprocess)
            .is_err());
        assert!(Status::Processed.transition(Status::Unbroadcasted).is_err());
    }

    #[test]
    fn test_never_emit_reachable_from_any_state() {
        for s in [
            Status::Unbroadcasted,
            Status::BroadcastedPreprocess,
            Status::BroadcastedProcess,
            Status::BroadcastedValidate,
            Status::Processed,
            Status::NeverEmit,
        ] {
            assert_eq!(s.transition(Status::NeverEmit).unwrap(), Status::NeverEmit);
        }
    }

    #[test]
    fn test_never_emit_gates_everything() {
        assert!(Status::NeverEmit.at_least(Status::Processed));
        assert!(!Status::Processed.at_least(Status::NeverEmit));
    }

    #[test]
    fn test_at_least_is_lattice_order() {
        assert!(Status::BroadcastedProcess.at_least(Status::BroadcastedPreprocess));
        assert!(Status::BroadcastedProcess.at_least(Status::BroadcastedProcess));
        assert!(!Status::BroadcastedPreprocess.at_least(Status::BroadcastedProcess));
    }
}
