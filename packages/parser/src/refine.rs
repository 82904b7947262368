use crate::error::ParseError;
use crate::parser::Parser;
use cascara_core::{
    EngineError, EngineResult, NodeId, NodeKind, RawContent, Refiner, SimpleSelectorKind, Slot,
    TermKind, Tree,
};

/// Grammar-driven refinement of raw node content: selector text into
/// simple-selector parts, declaration values and at-rule expressions into
/// term lists, at-rule blocks into sub-parsed statements.
#[derive(Debug, Default)]
pub struct StandardRefiner;

impl Refiner for StandardRefiner {
    fn refine(&self, tree: &mut Tree, node: NodeId) -> EngineResult<Vec<NodeId>> {
        match tree.kind(node) {
            NodeKind::Selector => refine_selector(tree, node),
            NodeKind::Declaration => refine_declaration(tree, node),
            NodeKind::AtRule => refine_at_rule(tree, node),
            _ => Ok(Vec::new()),
        }
    }
}

fn error_at(raw: &RawContent, offset: usize, message: &str) -> EngineError {
    let before = &raw.content[..offset];
    match before.rfind('\n') {
        Some(newline) => EngineError::refinement(
            raw.line + before.matches('\n').count() as u32,
            (offset - newline) as u32,
            message,
        ),
        None => EngineError::refinement(raw.line, raw.column + offset as u32, message),
    }
}

/// Re-anchor a sub-parse error to the raw content's position in the
/// original source.
fn relocate(raw: &RawContent, err: ParseError) -> EngineError {
    let shift = |line: u32, column: u32, message: String| {
        if line == 1 {
            EngineError::refinement(raw.line, raw.column + column - 1, message)
        } else {
            EngineError::refinement(raw.line + line - 1, column, message)
        }
    };
    match err {
        ParseError::Broadcast(inner) => inner,
        ParseError::UnexpectedToken {
            line,
            column,
            expected,
            found,
        } => shift(line, column, format!("expected {expected}, found {found}")),
        ParseError::UnexpectedEof { line, column } => {
            shift(line, column, "unexpected end of block".to_string())
        }
        ParseError::InvalidSyntax {
            line,
            column,
            message,
        } => shift(line, column, message),
        ParseError::LexerError { line, column } => {
            shift(line, column, "unrecognized input".to_string())
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '%' || !c.is_ascii()
}

fn take_ident(text: &str, from: usize) -> usize {
    text[from..]
        .find(|c: char| !is_ident_char(c))
        .map(|i| from + i)
        .unwrap_or(text.len())
}

/// Skip past a balanced group starting at `from` (which must point at the
/// opening delimiter). Strings inside the group are opaque.
fn take_balanced(raw: &RawContent, from: usize, open: char, close: char) -> EngineResult<usize> {
    let text = &raw.content;
    let mut depth = 0usize;
    let mut chars = text[from..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' | '\'' => {
                let mut escaped = false;
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(error_at(raw, from + i, "unterminated string"));
                }
            }
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Ok(from + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    Err(error_at(raw, from, "unterminated group"))
}

fn refine_selector(tree: &mut Tree, node: NodeId) -> EngineResult<Vec<NodeId>> {
    let Some(raw) = tree.take_selector_raw(node) else {
        return Ok(Vec::new());
    };
    let text = raw.content.clone();
    let mut parts: Vec<(SimpleSelectorKind, String)> = Vec::new();
    let mut pending_space = false;
    let mut i = 0;
    while i < text.len() {
        let c = text[i..].chars().next().unwrap_or_default();
        match c {
            c if c.is_whitespace() => {
                pending_space = !parts.is_empty();
                i += c.len_utf8();
            }
            '>' | '+' | '~' => {
                parts.push((SimpleSelectorKind::Combinator, c.to_string()));
                pending_space = false;
                i += 1;
            }
            _ => {
                if pending_space {
                    parts.push((SimpleSelectorKind::Combinator, " ".to_string()));
                    pending_space = false;
                }
                match c {
                    '*' => {
                        parts.push((SimpleSelectorKind::Universal, "*".to_string()));
                        i += 1;
                    }
                    '.' | '#' => {
                        let end = take_ident(&text, i + 1);
                        if end == i + 1 {
                            return Err(error_at(&raw, i, "expected name in selector"));
                        }
                        let kind = if c == '.' {
                            SimpleSelectorKind::Class
                        } else {
                            SimpleSelectorKind::Id
                        };
                        parts.push((kind, text[i..end].to_string()));
                        i = end;
                    }
                    ':' => {
                        let mut end = i + 1;
                        if text[end..].starts_with(':') {
                            end += 1;
                        }
                        let name_end = take_ident(&text, end);
                        if name_end == end {
                            return Err(error_at(&raw, i, "expected pseudo name"));
                        }
                        let end = if text[name_end..].starts_with('(') {
                            take_balanced(&raw, name_end, '(', ')')?
                        } else {
                            name_end
                        };
                        parts.push((SimpleSelectorKind::Pseudo, text[i..end].to_string()));
                        i = end;
                    }
                    '[' => {
                        let end = take_balanced(&raw, i, '[', ']')?;
                        parts.push((SimpleSelectorKind::Attribute, text[i..end].to_string()));
                        i = end;
                    }
                    c if is_ident_char(c) => {
                        let end = take_ident(&text, i);
                        parts.push((SimpleSelectorKind::Type, text[i..end].to_string()));
                        i = end;
                    }
                    _ => return Err(error_at(&raw, i, "unrecognized character in selector")),
                }
            }
        }
    }

    let mut created = Vec::with_capacity(parts.len());
    for (kind, name) in parts {
        let part = tree.new_simple_selector(kind, name);
        tree.append(node, Slot::Parts, part)?;
        created.push(part);
    }
    Ok(created)
}

/// Term scanner shared by declaration values and at-rule expressions.
fn scan_terms(raw: &RawContent) -> EngineResult<Vec<(TermKind, String)>> {
    let text = &raw.content;
    let mut terms: Vec<(TermKind, String)> = Vec::new();
    let mut i = 0;
    while i < text.len() {
        let c = text[i..].chars().next().unwrap_or_default();
        match c {
            c if c.is_whitespace() => i += c.len_utf8(),
            '/' if text[i..].starts_with("/*") => {
                // comments inside values are dropped
                match text[i + 2..].find("*/") {
                    Some(end) => i += 2 + end + 2,
                    None => return Err(error_at(raw, i, "unterminated comment")),
                }
            }
            ',' | '/' => {
                terms.push((TermKind::Operator, c.to_string()));
                i += 1;
            }
            '#' => {
                let end = take_ident(text, i + 1);
                if end == i + 1 {
                    return Err(error_at(raw, i, "expected hex digits"));
                }
                terms.push((TermKind::Hex, text[i..end].to_string()));
                i = end;
            }
            '"' | '\'' => {
                let mut escaped = false;
                let mut end = None;
                for (j, inner) in text[i + 1..].char_indices() {
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c {
                        end = Some(i + 1 + j + inner.len_utf8());
                        break;
                    }
                }
                let end = end.ok_or_else(|| error_at(raw, i, "unterminated string"))?;
                terms.push((TermKind::StringLiteral, text[i..end].to_string()));
                i = end;
            }
            '!' => {
                let end = take_ident(text, i + 1);
                if end == i + 1 {
                    return Err(error_at(raw, i, "expected keyword after '!'"));
                }
                terms.push((TermKind::Keyword, text[i..end].to_string()));
                i = end;
            }
            // bare parenthesized group, e.g. a media feature
            '(' => {
                let end = take_balanced(raw, i, '(', ')')?;
                terms.push((TermKind::Function, text[i..end].to_string()));
                i = end;
            }
            c if c.is_ascii_digit()
                || (matches!(c, '-' | '+' | '.')
                    && text[i + 1..].starts_with(|n: char| n.is_ascii_digit() || n == '.')) =>
            {
                let mut end = i + 1;
                while end < text.len()
                    && text[end..].starts_with(|n: char| n.is_ascii_digit() || n == '.')
                {
                    end += 1;
                }
                // trailing unit, e.g. px, em, %
                end = take_ident(text, end);
                terms.push((TermKind::Number, text[i..end].to_string()));
                i = end;
            }
            c if is_ident_char(c) => {
                let end = take_ident(text, i);
                if text[end..].starts_with('(') {
                    let end = take_balanced(raw, end, '(', ')')?;
                    terms.push((TermKind::Function, text[i..end].to_string()));
                    i = end;
                } else {
                    terms.push((TermKind::Keyword, text[i..end].to_string()));
                    i = end;
                }
            }
            _ => return Err(error_at(raw, i, "unrecognized character in value")),
        }
    }
    Ok(terms)
}

fn refine_declaration(tree: &mut Tree, node: NodeId) -> EngineResult<Vec<NodeId>> {
    let Some(raw) = tree.take_declaration_raw(node) else {
        return Ok(Vec::new());
    };
    let terms = scan_terms(&raw)?;
    if terms.is_empty() {
        return Err(error_at(&raw, 0, "declaration value is empty"));
    }
    let mut created = Vec::with_capacity(terms.len());
    for (kind, term_text) in terms {
        let term = tree.new_term(kind, term_text);
        tree.append(node, Slot::Values, term)?;
        created.push(term);
    }
    Ok(created)
}

fn refine_at_rule(tree: &mut Tree, node: NodeId) -> EngineResult<Vec<NodeId>> {
    let mut created = Vec::new();
    if let Some(raw) = tree.take_at_rule_raw_expression(node) {
        let terms = scan_terms(&raw)?;
        if terms.is_empty() {
            return Err(error_at(&raw, 0, "at-rule expression is empty"));
        }
        for (kind, term_text) in terms {
            let term = tree.new_term(kind, term_text);
            tree.append(node, Slot::Expression, term)?;
            created.push(term);
        }
    }
    // a blank block stays raw; it round-trips as-is without statements
    let has_content = match tree.node(node).payload {
        cascara_core::Payload::AtRule { ref raw_block, .. } => raw_block
            .as_ref()
            .is_some_and(|r| !r.content.trim().is_empty()),
        _ => false,
    };
    if has_content {
        if let Some(raw) = tree.take_at_rule_raw_block(node) {
            let mut parser = Parser::new(&raw.content).map_err(|e| relocate(&raw, e))?;
            let statements = parser
                .parse_statements(tree, node, Slot::Block)
                .map_err(|e| relocate(&raw, e))?;
            created.extend(statements);
        }
    }
    Ok(created)
}
