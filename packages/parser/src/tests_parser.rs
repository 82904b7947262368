use crate::error::ParseError;
use crate::parser::parse;
use cascara_core::{
    NodeKind, NoopBroadcaster, QueryableBroadcaster, RawContent, Slot, Span, Tree,
};

fn parse_ok(source: &str) -> (Tree, cascara_core::NodeId) {
    let mut tree = Tree::new();
    let mut sink = NoopBroadcaster;
    let sheet = parse(source, &mut tree, &mut sink).unwrap();
    (tree, sheet)
}

fn raw_text(raw: Option<&RawContent>) -> Option<&str> {
    raw.map(|r| r.content.as_str())
}

#[test]
fn test_parse_single_rule() {
    let (tree, sheet) = parse_ok(".test { color: red; margin: 10px; }");
    assert_eq!(tree.len_of(sheet, Slot::Statements), 1);
    let rule = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.kind(rule), NodeKind::Rule);
    assert_eq!(tree.len_of(rule, Slot::Selectors), 1);
    assert_eq!(tree.len_of(rule, Slot::Declarations), 2);

    let decl = tree.first_in(rule, Slot::Declarations).unwrap();
    assert_eq!(tree.property(decl), Some("color"));
    assert_eq!(tree.value_text(decl).as_deref(), Some("red"));
}

#[test]
fn test_selector_group_splits_on_commas() {
    let (tree, sheet) = parse_ok(".a, .b ,.c { color: red }");
    let rule = tree.first_in(sheet, Slot::Statements).unwrap();
    let selectors: Vec<_> = tree.items(rule, Slot::Selectors).collect();
    assert_eq!(selectors.len(), 3);
    let raws: Vec<_> = selectors
        .iter()
        .map(|&s| match &tree.node(s).payload {
            cascara_core::Payload::Selector { raw, .. } => raw_text(raw.as_ref()).unwrap(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(raws, [".a", ".b", ".c"]);
}

#[test]
fn test_last_declaration_semicolon_is_optional() {
    let (tree, sheet) = parse_ok(".a { color: red; margin: 0 }");
    let rule = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.len_of(rule, Slot::Declarations), 2);
}

#[test]
fn test_spans_are_one_based() {
    let (tree, sheet) = parse_ok(".a {\n  color: red;\n}");
    let rule = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.span(sheet), Some(Span::new(1, 1)));
    assert_eq!(tree.span(rule), Some(Span::new(1, 1)));
    let decl = tree.first_in(rule, Slot::Declarations).unwrap();
    assert_eq!(tree.span(decl), Some(Span::new(2, 3)));
}

#[test]
fn test_at_rule_with_block_stays_raw() {
    let (tree, sheet) = parse_ok("@media screen and (max-width: 600px) { .a { color: red } }");
    let at = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.kind(at), NodeKind::AtRule);
    assert_eq!(tree.at_rule_name(at), Some("media"));
    match &tree.node(at).payload {
        cascara_core::Payload::AtRule {
            raw_expression,
            raw_block,
            expression,
            block,
            ..
        } => {
            assert_eq!(
                raw_text(raw_expression.as_ref()),
                Some("screen and (max-width: 600px)")
            );
            assert_eq!(raw_text(raw_block.as_ref()), Some(".a { color: red }"));
            assert!(expression.is_none());
            assert!(block.is_none());
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_expression_only_at_rule() {
    let (tree, sheet) = parse_ok("@charset \"UTF-8\";\n.a { color: red }");
    assert_eq!(tree.len_of(sheet, Slot::Statements), 2);
    let at = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.at_rule_name(at), Some("charset"));
    match &tree.node(at).payload {
        cascara_core::Payload::AtRule {
            raw_expression,
            raw_block,
            ..
        } => {
            assert_eq!(raw_text(raw_expression.as_ref()), Some("\"UTF-8\""));
            assert!(raw_block.is_none());
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_nested_braces_in_at_rule_block() {
    let (tree, sheet) = parse_ok("@media all { .a { color: red } .b { color: blue } }");
    let at = tree.first_in(sheet, Slot::Statements).unwrap();
    match &tree.node(at).payload {
        cascara_core::Payload::AtRule { raw_block, .. } => {
            assert_eq!(
                raw_text(raw_block.as_ref()),
                Some(".a { color: red } .b { color: blue }")
            );
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_comments_attach_to_next_statement() {
    let (tree, sheet) = parse_ok("/* header */\n.a { /* why */ color: red; }\n/* trailing */");
    let rule = tree.first_in(sheet, Slot::Statements).unwrap();
    assert_eq!(tree.node(rule).comments, vec![" header "]);
    let decl = tree.first_in(rule, Slot::Declarations).unwrap();
    assert_eq!(tree.node(decl).comments, vec![" why "]);
    assert_eq!(tree.node(sheet).orphaned_comments, vec![" trailing "]);
}

#[test]
fn test_statements_broadcast_in_document_order_sheet_last() {
    let mut tree = Tree::new();
    let mut query = QueryableBroadcaster::new();
    let sheet = parse(
        ".a { color: red }\n@import \"base.css\";\n.b { color: blue }",
        &mut tree,
        &mut query,
    )
    .unwrap();

    let kinds: Vec<_> = query.found().iter().map(|&n| tree.kind(n)).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Rule,
            NodeKind::AtRule,
            NodeKind::Rule,
            NodeKind::Stylesheet,
        ]
    );
    assert_eq!(*query.found().last().unwrap(), sheet);
}

#[test]
fn test_missing_colon_is_an_error() {
    let mut tree = Tree::new();
    let err = parse(".a { color red }", &mut tree, &mut NoopBroadcaster).unwrap_err();
    assert!(matches!(
        err,
        ParseError::InvalidSyntax { line: 1, column: 6, .. }
    ));
}

#[test]
fn test_unclosed_rule_is_an_error() {
    let mut tree = Tree::new();
    let err = parse(".a { color: red;", &mut tree, &mut NoopBroadcaster).unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof { .. }));
}

#[test]
fn test_unmatched_closing_brace_is_an_error() {
    let mut tree = Tree::new();
    let err = parse("} .a { color: red }", &mut tree, &mut NoopBroadcaster).unwrap_err();
    assert!(matches!(err, ParseError::InvalidSyntax { .. }));
}

#[test]
fn test_empty_selector_is_an_error() {
    let mut tree = Tree::new();
    let err = parse(".a, { color: red }", &mut tree, &mut NoopBroadcaster).unwrap_err();
    assert!(matches!(err, ParseError::InvalidSyntax { .. }));
}

#[test]
fn test_bare_at_rule_is_an_error() {
    let mut tree = Tree::new();
    let err = parse("@media;", &mut tree, &mut NoopBroadcaster).unwrap_err();
    assert!(matches!(err, ParseError::InvalidSyntax { .. }));
}

#[test]
fn test_empty_source_parses_to_empty_sheet() {
    let (tree, sheet) = parse_ok("   \n  ");
    assert_eq!(tree.len_of(sheet, Slot::Statements), 0);
}
