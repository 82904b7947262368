use crate::node::{NodeId, Span};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingLevel {
    Warning,
    Error,
}

/// One validation finding. Findings never abort the run; they are
/// accumulated and handed back to the caller next to the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub level: FindingLevel,
    pub message: String,
    pub node: Option<NodeId>,
    pub span: Option<Span>,
}

impl Finding {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Warning,
            message: message.into(),
            node: None,
            span: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Error,
            message: message.into(),
            node: None,
            span: None,
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Sink handed to validate-phase subscribers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    items: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.items.push(finding);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|f| f.level == FindingLevel::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_findings_accumulate() {
        let mut findings = Findings::new();
        findings.push(Finding::warning("loud color"));
        findings.push(Finding::error("disallowed property").with_span(Span::new(3, 7)));
        assert_eq!(findings.len(), 2);
        assert!(findings.has_errors());
        assert_eq!(findings.iter().next().unwrap().level, FindingLevel::Warning);
    }
}
