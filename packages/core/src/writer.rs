use crate::node::{NodeId, Payload, SimpleSelectorKind, Slot, TermKind};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};

/// Output style. `Verbose` keeps comments and one declaration per line,
/// `Inline` writes one rule per line, `Compressed` strips every
/// non-essential character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    Verbose,
    Inline,
    Compressed,
}

impl WriteMode {
    fn spaced(self) -> bool {
        !matches!(self, WriteMode::Compressed)
    }
}

/// Serialize the subtree under `root`. Destroyed and `NeverEmit` nodes
/// vanish; composites with no writable children vanish with them.
pub fn serialize(tree: &Tree, root: NodeId, mode: WriteMode) -> String {
    let mut writer = StyleWriter::new(mode);
    writer.write_node(tree, root);
    writer.into_output()
}

pub struct StyleWriter {
    mode: WriteMode,
    buf: String,
    depth: usize,
}

impl StyleWriter {
    pub fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            buf: String::new(),
            depth: 0,
        }
    }

    pub fn into_output(self) -> String {
        self.buf
    }

    fn indent(&mut self) {
        if self.mode == WriteMode::Verbose {
            for _ in 0..self.depth {
                self.buf.push_str("  ");
            }
        }
    }

    fn statement_break(&mut self) {
        match self.mode {
            WriteMode::Verbose | WriteMode::Inline => self.buf.push('\n'),
            WriteMode::Compressed => {}
        }
    }

    fn write_node(&mut self, tree: &Tree, node: NodeId) {
        if !tree.is_writable(node) {
            return;
        }
        match &tree.node(node).payload {
            Payload::Stylesheet { .. } => self.write_stylesheet(tree, node),
            Payload::Rule { .. } => self.write_rule(tree, node),
            Payload::AtRule { .. } => self.write_at_rule(tree, node),
            Payload::Custom { content, .. } => {
                self.indent();
                self.buf.push_str(content);
            }
            // selectors, declarations and their leaves are emitted by
            // their owners, never as free-standing statements
            _ => {}
        }
    }

    fn write_stylesheet(&mut self, tree: &Tree, node: NodeId) {
        let statements: Vec<NodeId> = tree
            .items(node, Slot::Statements)
            .filter(|&s| tree.is_writable(s))
            .collect();
        let mut first = true;
        for statement in statements {
            if !first {
                self.statement_break();
            }
            first = false;
            self.write_node(tree, statement);
        }
        if self.mode == WriteMode::Verbose {
            let orphaned = &tree.node(node).orphaned_comments;
            for comment in orphaned {
                if !self.buf.is_empty() {
                    self.buf.push('\n');
                }
                self.buf.push_str("/*");
                self.buf.push_str(comment);
                self.buf.push_str("*/");
            }
        }
        if self.mode != WriteMode::Compressed && !self.buf.is_empty() {
            self.buf.push('\n');
        }
    }

    fn write_comments(&mut self, tree: &Tree, node: NodeId) {
        if self.mode != WriteMode::Verbose {
            return;
        }
        for comment in &tree.node(node).comments {
            self.indent();
            self.buf.push_str("/*");
            self.buf.push_str(comment);
            self.buf.push_str("*/\n");
        }
    }

    fn write_rule(&mut self, tree: &Tree, node: NodeId) {
        self.write_comments(tree, node);
        self.indent();

        let selectors: Vec<String> = tree
            .items(node, Slot::Selectors)
            .filter(|&s| tree.is_writable(s))
            .map(|s| self.selector_text(tree, s))
            .collect();
        let separator = if self.mode.spaced() { ", " } else { "," };
        self.buf.push_str(&selectors.join(separator));

        match self.mode {
            WriteMode::Verbose => self.buf.push_str(" {\n"),
            WriteMode::Inline => self.buf.push_str(" {"),
            WriteMode::Compressed => self.buf.push('{'),
        }

        self.depth += 1;
        let declarations: Vec<NodeId> = tree
            .items(node, Slot::Declarations)
            .filter(|&d| tree.is_writable(d))
            .collect();
        let last = declarations.len().saturating_sub(1);
        for (i, decl) in declarations.iter().enumerate() {
            self.write_declaration(tree, *decl, i == last);
        }
        self.depth -= 1;

        if self.mode == WriteMode::Verbose {
            self.indent();
        }
        self.buf.push('}');
    }

    fn write_declaration(&mut self, tree: &Tree, node: NodeId, last: bool) {
        self.write_comments(tree, node);
        self.indent();
        let property = tree.property(node).unwrap_or_default();
        let value = tree.value_text(node).unwrap_or_default();
        match self.mode {
            WriteMode::Verbose => {
                self.buf.push_str(property);
                self.buf.push_str(": ");
                self.buf.push_str(&value);
                self.buf.push_str(";\n");
            }
            WriteMode::Inline => {
                self.buf.push_str(property);
                self.buf.push(':');
                self.buf.push_str(&value);
                if !last {
                    self.buf.push_str("; ");
                }
            }
            WriteMode::Compressed => {
                self.buf.push_str(property);
                self.buf.push(':');
                self.buf.push_str(&value);
                if !last {
                    self.buf.push(';');
                }
            }
        }
    }

    fn write_at_rule(&mut self, tree: &Tree, node: NodeId) {
        self.write_comments(tree, node);
        self.indent();
        self.buf.push('@');
        self.buf
            .push_str(tree.at_rule_name(node).unwrap_or_default());

        let expression = self.at_rule_expression_text(tree, node);
        if !expression.is_empty() {
            self.buf.push(' ');
            self.buf.push_str(&expression);
        }

        let (has_refined_block, raw_block) = match &tree.node(node).payload {
            Payload::AtRule {
                block, raw_block, ..
            } => (
                block.is_some(),
                raw_block.as_ref().map(|r| r.content.trim().to_string()),
            ),
            _ => (false, None),
        };

        if has_refined_block {
            match self.mode {
                WriteMode::Verbose => self.buf.push_str(" {\n"),
                WriteMode::Inline => self.buf.push_str(" {"),
                WriteMode::Compressed => self.buf.push('{'),
            }
            self.depth += 1;
            let statements: Vec<NodeId> = tree
                .items(node, Slot::Block)
                .filter(|&s| tree.is_writable(s))
                .collect();
            let mut first = true;
            for statement in statements {
                if !first {
                    self.statement_break();
                }
                first = false;
                self.write_node(tree, statement);
            }
            if self.mode == WriteMode::Verbose {
                self.buf.push('\n');
            }
            self.depth -= 1;
            if self.mode == WriteMode::Verbose {
                self.indent();
            }
            self.buf.push('}');
        } else if let Some(raw) = raw_block {
            match self.mode {
                WriteMode::Verbose => {
                    self.buf.push_str(" {\n");
                    self.depth += 1;
                    self.indent();
                    self.buf.push_str(&raw);
                    self.depth -= 1;
                    self.buf.push('\n');
                    self.indent();
                    self.buf.push('}');
                }
                WriteMode::Inline => {
                    self.buf.push_str(" {");
                    self.buf.push_str(&raw);
                    self.buf.push('}');
                }
                WriteMode::Compressed => {
                    self.buf.push('{');
                    self.buf.push_str(&raw);
                    self.buf.push('}');
                }
            }
        } else {
            // expression-only at-rule, e.g. @charset or @import
            self.buf.push(';');
        }
    }

    fn at_rule_expression_text(&self, tree: &Tree, node: NodeId) -> String {
        match &tree.node(node).payload {
            Payload::AtRule {
                raw_expression,
                expression,
                ..
            } => {
                if expression.is_some() {
                    self.terms_text(tree, node, Slot::Expression)
                } else {
                    raw_expression
                        .as_ref()
                        .map(|r| r.content.trim().to_string())
                        .unwrap_or_default()
                }
            }
            _ => String::new(),
        }
    }

    fn terms_text(&self, tree: &Tree, owner: NodeId, slot: Slot) -> String {
        let mut out = String::new();
        for term in tree.items(owner, slot) {
            if !tree.is_writable(term) {
                continue;
            }
            let operator = matches!(
                tree.node(term).payload,
                Payload::Term {
                    kind: TermKind::Operator,
                    ..
                }
            );
            if !out.is_empty() && !operator {
                out.push(' ');
            }
            out.push_str(tree.term_text(term).unwrap_or_default());
        }
        out
    }

    fn selector_text(&self, tree: &Tree, selector: NodeId) -> String {
        match &tree.node(selector).payload {
            Payload::Selector { raw, parts } => {
                if parts.is_some() {
                    let mut out = String::new();
                    for part in tree.items(selector, Slot::Parts) {
                        if !tree.is_writable(part) {
                            continue;
                        }
                        let name = tree.simple_selector_name(part).unwrap_or_default();
                        let combinator = matches!(
                            tree.node(part).payload,
                            Payload::SimpleSelector {
                                kind: SimpleSelectorKind::Combinator,
                                ..
                            }
                        );
                        if combinator {
                            if name.trim().is_empty() {
                                out.push(' ');
                            } else if self.mode.spaced() {
                                out.push(' ');
                                out.push_str(name.trim());
                                out.push(' ');
                            } else {
                                out.push_str(name.trim());
                            }
                        } else {
                            out.push_str(name);
                        }
                    }
                    out
                } else {
                    raw.as_ref()
                        .map(|r| r.content.trim().to_string())
                        .unwrap_or_default()
                }
            }
            _ => String::new(),
        }
    }
}
