use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, LineIndex, Token};
use cascara_core::{Broadcaster, NodeId, RawContent, Slot, Span, Tree};
use std::ops::Range;
use tracing::debug;

/// Statement-level parser. Builds coarse units only: rules carry raw
/// selector and value text, at-rules carry raw expression and block text.
/// Refinement into parts and terms happens on broadcast, not here.
///
/// Each finished top-level statement is handed to the broadcaster before
/// the next one is read, so plugins see the sheet as a stream; the
/// stylesheet node itself is broadcast last.
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
    lines: LineIndex,
    pending_comments: Vec<String>,
}

/// Parse `source` into `tree`, broadcasting statements as they complete.
/// Returns the stylesheet root.
pub fn parse(
    source: &str,
    tree: &mut Tree,
    broadcaster: &mut dyn Broadcaster,
) -> ParseResult<NodeId> {
    Parser::new(source)?.parse_stylesheet(tree, broadcaster)
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            lines: LineIndex::new(source),
            pending_comments: Vec::new(),
        })
    }

    pub fn parse_stylesheet(
        &mut self,
        tree: &mut Tree,
        broadcaster: &mut dyn Broadcaster,
    ) -> ParseResult<NodeId> {
        let sheet = tree.new_stylesheet();
        let mut statements = 0usize;
        while !self.is_at_end() {
            if let Some(statement) = self.parse_statement(tree)? {
                tree.append(sheet, Slot::Statements, statement)?;
                broadcaster.broadcast(tree, statement)?;
                statements += 1;
            }
        }
        if !self.pending_comments.is_empty() {
            let comments = std::mem::take(&mut self.pending_comments);
            tree.attach_orphaned_comments(sheet, comments);
        }
        debug!(statements, "parsed stylesheet");
        broadcaster.broadcast(tree, sheet)?;
        Ok(sheet)
    }

    /// Parse the remaining input as statements appended to `(owner, slot)`,
    /// without broadcasting. Used to refine at-rule block content.
    pub fn parse_statements(
        &mut self,
        tree: &mut Tree,
        owner: NodeId,
        slot: Slot,
    ) -> ParseResult<Vec<NodeId>> {
        let mut created = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.parse_statement(tree)? {
                tree.append(owner, slot, statement)?;
                created.push(statement);
            }
        }
        if !self.pending_comments.is_empty() {
            let comments = std::mem::take(&mut self.pending_comments);
            tree.attach_orphaned_comments(owner, comments);
        }
        Ok(created)
    }

    /// One top-level statement, or `None` when the step only consumed
    /// trivia (comments, blank runs, stray semicolons) or hit the end.
    fn parse_statement(&mut self, tree: &mut Tree) -> ParseResult<Option<NodeId>> {
        match self.peek() {
            None => Ok(None),
            Some((Token::Comment(text), _)) => {
                let comment = text.to_string();
                self.advance();
                self.pending_comments.push(comment);
                Ok(None)
            }
            Some((Token::Chunk(text), _)) if text.trim().is_empty() => {
                self.advance();
                Ok(None)
            }
            Some((Token::Semicolon, _)) => {
                self.advance();
                Ok(None)
            }
            Some((Token::RBrace, _)) => Err(self.invalid_here("unmatched '}'")),
            Some((Token::AtKeyword(_), _)) => Ok(Some(self.parse_at_rule(tree)?)),
            Some(_) => Ok(Some(self.parse_rule(tree)?)),
        }
    }

    fn parse_at_rule(&mut self, tree: &mut Tree) -> ParseResult<NodeId> {
        let (name, name_range) = match self.peek() {
            Some((Token::AtKeyword(name), range)) => (name.to_string(), range.clone()),
            _ => return Err(self.invalid_here("expected at-rule")),
        };
        self.advance();
        let span = self.lines.span_at(name_range.start);

        let expr_start = name_range.end;
        let expr_end;
        let mut block_start = None;
        loop {
            match self.peek() {
                None => {
                    expr_end = self.source.len();
                    break;
                }
                Some((Token::Semicolon, range)) => {
                    expr_end = range.start;
                    self.advance();
                    break;
                }
                Some((Token::LBrace, range)) => {
                    expr_end = range.start;
                    block_start = Some(range.end);
                    self.advance();
                    break;
                }
                Some(_) => self.advance(),
            }
        }
        let raw_expression = self.raw_slice(expr_start, expr_end);

        let raw_block = match block_start {
            Some(content_start) => {
                let content_end = self.skip_block()?;
                Some(self.raw_slice(content_start, content_end).unwrap_or_else(|| {
                    let s = self.lines.span_at(content_start);
                    RawContent::new(s.line, s.column, "")
                }))
            }
            None => None,
        };

        if raw_expression.is_none() && raw_block.is_none() {
            return Err(ParseError::invalid_syntax(
                span.line,
                span.column,
                "at-rule requires an expression or a block",
            ));
        }

        let at_rule = tree.new_at_rule(Some(span), name, raw_expression, raw_block);
        self.take_comments(tree, at_rule);
        Ok(at_rule)
    }

    /// Consume up to and including the `}` matching an already-consumed `{`,
    /// returning the offset just before it.
    fn skip_block(&mut self) -> ParseResult<usize> {
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(self.eof_here()),
                Some((Token::LBrace, _)) => {
                    depth += 1;
                    self.advance();
                }
                Some((Token::RBrace, range)) => {
                    let end = range.start;
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return Ok(end);
                    }
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn parse_rule(&mut self, tree: &mut Tree) -> ParseResult<NodeId> {
        let sel_start = match self.peek() {
            Some((_, range)) => range.start,
            None => return Err(self.eof_here()),
        };
        let sel_end;
        loop {
            match self.peek() {
                None => return Err(self.eof_here()),
                Some((Token::LBrace, range)) => {
                    sel_end = range.start;
                    self.advance();
                    break;
                }
                Some((Token::Semicolon, _)) | Some((Token::RBrace, _)) => {
                    return Err(self.invalid_here("expected '{' after selector"));
                }
                Some(_) => self.advance(),
            }
        }

        let sel_text = &self.source[sel_start..sel_end];
        let mut raws = Vec::new();
        let mut offset = sel_start;
        for piece in sel_text.split(',') {
            let raw = self.raw_slice(offset, offset + piece.len());
            offset += piece.len() + 1;
            match raw {
                Some(raw) => raws.push(raw),
                None => {
                    let s = self.lines.span_at(sel_start);
                    return Err(ParseError::invalid_syntax(
                        s.line,
                        s.column,
                        "empty selector",
                    ));
                }
            }
        }

        let span = raws[0].origin();
        let rule = tree.new_rule(Some(span));
        self.take_comments(tree, rule);
        for raw in raws {
            let sel_span = raw.origin();
            let selector = tree.new_selector(Some(sel_span), raw);
            tree.append(rule, Slot::Selectors, selector)?;
        }
        self.parse_declarations(tree, rule)?;
        Ok(rule)
    }

    fn parse_declarations(&mut self, tree: &mut Tree, rule: NodeId) -> ParseResult<()> {
        let mut comments: Vec<String> = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.eof_here()),
                Some((Token::RBrace, _)) => {
                    self.advance();
                    if !comments.is_empty() {
                        tree.attach_orphaned_comments(rule, comments);
                    }
                    return Ok(());
                }
                Some((Token::Semicolon, _)) => self.advance(),
                Some((Token::Comment(text), _)) => {
                    let comment = text.to_string();
                    self.advance();
                    comments.push(comment);
                }
                Some((Token::Chunk(text), _)) if text.trim().is_empty() => self.advance(),
                Some((_, range)) => {
                    let start = range.start;
                    let declaration = self.parse_declaration(tree, start)?;
                    tree.append(rule, Slot::Declarations, declaration)?;
                    if !comments.is_empty() {
                        tree.attach_comments(declaration, std::mem::take(&mut comments));
                    }
                }
            }
        }
    }

    fn parse_declaration(&mut self, tree: &mut Tree, start: usize) -> ParseResult<NodeId> {
        let end;
        loop {
            match self.peek() {
                None => return Err(self.eof_here()),
                Some((Token::Semicolon, range)) => {
                    end = range.start;
                    self.advance();
                    break;
                }
                Some((Token::RBrace, range)) => {
                    // the rule's closing brace also terminates the last
                    // declaration; leave it for the caller
                    end = range.start;
                    break;
                }
                Some(_) => self.advance(),
            }
        }

        let text = &self.source[start..end];
        let leading = text.len() - text.trim_start().len();
        let span = self.lines.span_at(start + leading);
        let Some(colon) = text.find(':') else {
            return Err(ParseError::invalid_syntax(
                span.line,
                span.column,
                "expected ':' in declaration",
            ));
        };
        let property = text[..colon].trim().to_string();
        if property.is_empty() {
            return Err(ParseError::invalid_syntax(
                span.line,
                span.column,
                "declaration requires a property",
            ));
        }
        let raw_value = self.raw_slice(start + colon + 1, end).ok_or_else(|| {
            ParseError::invalid_syntax(span.line, span.column, "declaration requires a value")
        })?;

        Ok(tree.new_declaration_raw(Some(span), property, raw_value))
    }

    // -- cursor helpers ----------------------------------------------------

    fn peek(&self) -> Option<&(Token<'src>, Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Trimmed slice of the source as raw content, `None` if blank.
    fn raw_slice(&self, start: usize, end: usize) -> Option<RawContent> {
        let text = &self.source[start..end];
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let offset = start + (text.len() - text.trim_start().len());
        let span = self.lines.span_at(offset);
        Some(RawContent::new(span.line, span.column, trimmed))
    }

    fn here(&self) -> Span {
        let offset = self
            .peek()
            .map(|(_, range)| range.start)
            .unwrap_or(self.source.len());
        self.lines.span_at(offset)
    }

    fn invalid_here(&self, message: &str) -> ParseError {
        let span = self.here();
        ParseError::invalid_syntax(span.line, span.column, message)
    }

    fn eof_here(&self) -> ParseError {
        let span = self.lines.span_at(self.source.len());
        ParseError::unexpected_eof(span.line, span.column)
    }

    fn take_comments(&mut self, tree: &mut Tree, node: NodeId) {
        if !self.pending_comments.is_empty() {
            tree.attach_comments(node, std::mem::take(&mut self.pending_comments));
        }
    }
}
