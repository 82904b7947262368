use crate::processor::Processor;
use cascara_core::{
    EngineResult, Finding, Findings, NodeId, NodeKind, Plugin, PluginContext, Slot, Subscriptions,
    TermKind, Tree, TypeFilter, WriteMode,
};

fn is_descendant(tree: &Tree, node: NodeId, root: NodeId) -> bool {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n == root {
            return true;
        }
        cur = tree.parent(n);
    }
    false
}

#[test]
fn test_pipeline_without_plugins_round_trips() {
    let output = Processor::new()
        .process(".a {\n  color: red;\n}")
        .unwrap();
    assert_eq!(output.css_with(WriteMode::Verbose), ".a {\n  color: red;\n}\n");
    assert_eq!(output.css_with(WriteMode::Compressed), ".a{color:red}");
    assert!(output.findings.is_empty());
}

struct DropRed;
impl Plugin for DropRed {
    fn name(&self) -> &'static str {
        "DropRed"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.rework(NodeKind::Declaration);
    }
    fn rework(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if ctx.tree().value_text(node).as_deref() == Some("red") {
            ctx.destroy(node);
        }
        Ok(())
    }
}

#[test]
fn test_destroyed_declaration_takes_its_rule_with_it() {
    let mut processor = Processor::new();
    processor.register(DropRed).unwrap();
    let output = processor
        .process(".a { color: red; }\n.b { color: blue; }")
        .unwrap();
    assert_eq!(output.css_with(WriteMode::Compressed), ".b{color:blue}");
}

#[derive(Default)]
struct Recorder {
    observed: Vec<(NodeId, NodeKind)>,
}
impl Plugin for Recorder {
    fn name(&self) -> &'static str {
        "Recorder"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.observe(TypeFilter::Any);
    }
    fn observe(&mut self, tree: &Tree, node: NodeId) {
        self.observed.push((node, tree.kind(node)));
    }
}

#[derive(Default)]
struct CopyOnce {
    done: bool,
}
impl Plugin for CopyOnce {
    fn name(&self) -> &'static str {
        "CopyOnce"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.rework(NodeKind::Rule);
    }
    fn rework(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let sheet = ctx.tree().parent(node).ok_or(cascara_core::EngineError::Unlinked { node })?;
        let copy = ctx.copy(node)?;
        ctx.append(sheet, Slot::Statements, copy)?;
        Ok(())
    }
}

#[test]
fn test_copy_sees_same_delivery_order_as_original() {
    let mut processor = Processor::new();
    processor.register(CopyOnce::default()).unwrap();
    processor.register(Recorder::default()).unwrap();
    let output = processor.process(".a { margin: 10px 0; }").unwrap();

    let statements: Vec<NodeId> = output.tree.items(output.root, Slot::Statements).collect();
    assert_eq!(statements.len(), 2);
    let (original, copy) = (statements[0], statements[1]);
    assert!(output.tree.span(original).is_some());
    assert!(output.tree.span(copy).is_none());

    let recorder = output.retrieve::<Recorder>().unwrap();
    let order_of = |root: NodeId| -> Vec<NodeKind> {
        recorder
            .observed
            .iter()
            .filter(|(n, _)| is_descendant(&output.tree, *n, root))
            .map(|(_, k)| *k)
            .collect()
    };
    // children before parent, in document order, for both trees
    assert_eq!(order_of(original), order_of(copy));
    assert_eq!(
        order_of(copy),
        vec![
            NodeKind::SimpleSelector,
            NodeKind::Selector,
            NodeKind::Term,
            NodeKind::Term,
            NodeKind::Declaration,
            NodeKind::Rule,
        ]
    );
    assert_eq!(
        output.css_with(WriteMode::Compressed),
        ".a{margin:10px 0}.a{margin:10px 0}"
    );
}

struct EraseRed;
impl Plugin for EraseRed {
    fn name(&self) -> &'static str {
        "EraseRed"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.rework(NodeKind::Term);
    }
    fn rework(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if ctx.tree().term_text(node) == Some("red") {
            ctx.destroy(node);
        }
        Ok(())
    }
}

#[test]
fn test_declaration_with_all_terms_destroyed_is_not_written() {
    let mut processor = Processor::new();
    processor.register(EraseRed).unwrap();
    let output = processor
        .process(".a { color: red }\n.b { color: blue }")
        .unwrap();
    // the valueless declaration is unwritable and takes its rule with it
    assert_eq!(output.css_with(WriteMode::Compressed), ".b{color:blue}");
}

#[test]
fn test_at_rule_block_is_refined_and_round_trips() {
    let output = Processor::new()
        .process("@media screen and (max-width: 600px) {\n  .a { color: red }\n}")
        .unwrap();
    assert_eq!(
        output.css_with(WriteMode::Compressed),
        "@media screen and (max-width: 600px){.a{color:red}}"
    );
    let at = output
        .tree
        .items(output.root, Slot::Statements)
        .next()
        .unwrap();
    assert_eq!(output.tree.kind(at), NodeKind::AtRule);
    // refined structure: three expression terms, one block rule
    assert_eq!(output.tree.len_of(at, Slot::Expression), 3);
    assert_eq!(output.tree.len_of(at, Slot::Block), 1);
}

#[derive(Default)]
struct CopyMedia {
    done: bool,
}
impl Plugin for CopyMedia {
    fn name(&self) -> &'static str {
        "CopyMedia"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.rework(NodeKind::AtRule);
    }
    fn rework(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let sheet = ctx
            .tree()
            .parent(node)
            .ok_or(cascara_core::EngineError::Unlinked { node })?;
        let copy = ctx.copy(node)?;
        ctx.append(sheet, Slot::Statements, copy)?;
        Ok(())
    }
}

#[test]
fn test_at_rule_copy_sees_same_delivery_order_as_original() {
    let mut processor = Processor::new();
    processor.register(CopyMedia::default()).unwrap();
    processor.register(Recorder::default()).unwrap();
    let output = processor
        .process("@media all and (min-width: 300px) { #id, .class { color: red; margin: 10px; } }")
        .unwrap();

    let statements: Vec<NodeId> = output.tree.items(output.root, Slot::Statements).collect();
    assert_eq!(statements.len(), 2);
    let (original, copy) = (statements[0], statements[1]);
    assert_eq!(output.tree.kind(copy), NodeKind::AtRule);
    assert!(output.tree.span(copy).is_none());

    let recorder = output.retrieve::<Recorder>().unwrap();
    let order_of = |root: NodeId| -> Vec<NodeKind> {
        recorder
            .observed
            .iter()
            .filter(|(n, _)| is_descendant(&output.tree, *n, root))
            .map(|(_, k)| *k)
            .collect()
    };
    let original_order = order_of(original);
    assert_eq!(original_order, order_of(copy));
    // expression terms first, then the block rule's subtree, then the rule
    // and the at-rule itself
    assert_eq!(
        original_order,
        vec![
            NodeKind::Term,
            NodeKind::Term,
            NodeKind::Term,
            NodeKind::SimpleSelector,
            NodeKind::Selector,
            NodeKind::SimpleSelector,
            NodeKind::Selector,
            NodeKind::Term,
            NodeKind::Declaration,
            NodeKind::Term,
            NodeKind::Declaration,
            NodeKind::Rule,
            NodeKind::AtRule,
        ]
    );
    assert_eq!(
        output.css_with(WriteMode::Compressed),
        "@media all and (min-width: 300px){#id,.class{color:red;margin:10px}}\
         @media all and (min-width: 300px){#id,.class{color:red;margin:10px}}"
    );
}

#[test]
fn test_nested_at_rule_statements_reach_plugins() {
    let mut processor = Processor::new();
    processor.register(Recorder::default()).unwrap();
    let output = processor
        .process("@media print { .a { color: red } }")
        .unwrap();
    let recorder = output.retrieve::<Recorder>().unwrap();
    let kinds: Vec<NodeKind> = recorder.observed.iter().map(|(_, k)| *k).collect();
    assert!(kinds.contains(&NodeKind::Rule));
    assert!(kinds.contains(&NodeKind::Declaration));
    // the rule inside the block is delivered before its at-rule
    let rule_at = kinds.iter().position(|k| *k == NodeKind::Rule);
    let at_at = kinds.iter().position(|k| *k == NodeKind::AtRule);
    assert!(rule_at < at_at);
}

struct MediaAll;
impl Plugin for MediaAll {
    fn name(&self) -> &'static str {
        "MediaAll"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.refine(NodeKind::AtRule);
    }
    fn refine(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if ctx.tree().at_rule_name(node) == Some("media") {
            let term = ctx.new_term(TermKind::Keyword, "all");
            ctx.set_at_rule_expression(node, vec![term])?;
        }
        Ok(())
    }
}

#[test]
fn test_plugin_supplied_expression_preempts_refinement_and_delivery() {
    let mut processor = Processor::new();
    processor.register(MediaAll).unwrap();
    processor.register(Recorder::default()).unwrap();
    let output = processor
        .process("@media screen { .a { color: red } }")
        .unwrap();

    // the supplied expression replaces the raw one; the raw block re-emits
    assert_eq!(
        output.css_with(WriteMode::Compressed),
        "@media all{.a { color: red }}"
    );
    let recorder = output.retrieve::<Recorder>().unwrap();
    assert!(!recorder
        .observed
        .iter()
        .any(|(_, k)| *k == NodeKind::AtRule));
}

#[derive(Default)]
struct Stats {
    declarations: usize,
}
impl Plugin for Stats {
    fn name(&self) -> &'static str {
        "Stats"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.observe(NodeKind::Declaration);
    }
    fn observe(&mut self, _tree: &Tree, _node: NodeId) {
        self.declarations += 1;
    }
}

#[derive(Default)]
struct Report;
impl Plugin for Report {
    fn name(&self) -> &'static str {
        "Report"
    }
    fn subscribe(&self, _subs: &mut Subscriptions) {}
    fn dependencies(&mut self, registry: &mut cascara_core::Registry) -> EngineResult<()> {
        registry.require(Stats::default)?;
        Ok(())
    }
}

#[test]
fn test_required_dependency_registers_and_runs_first() {
    let mut processor = Processor::new();
    processor.registry_mut().require(Report::default).unwrap();
    assert_eq!(processor.registry_mut().names(), ["Stats", "Report"]);

    let output = processor
        .process(".a { color: red; margin: 0 }")
        .unwrap();
    assert_eq!(output.retrieve::<Stats>().unwrap().declarations, 2);
}

struct NoFloat;
impl Plugin for NoFloat {
    fn name(&self) -> &'static str {
        "NoFloat"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.validate(NodeKind::Declaration);
    }
    fn validate(&mut self, tree: &Tree, node: NodeId, findings: &mut Findings) {
        if tree.property(node) == Some("float") {
            findings.push(Finding::warning("float is discouraged").with_node(node));
        }
    }
}

#[test]
fn test_validation_findings_surface_in_output() {
    let mut processor = Processor::new();
    processor.register(NoFloat).unwrap();
    let output = processor
        .process(".a { float: left; color: red }")
        .unwrap();
    assert_eq!(output.findings.len(), 1);
    assert!(!output.findings.has_errors());
    // findings do not affect what is written
    assert_eq!(
        output.css_with(WriteMode::Compressed),
        ".a{float:left;color:red}"
    );
}

struct HideInternal;
impl Plugin for HideInternal {
    fn name(&self) -> &'static str {
        "HideInternal"
    }
    fn subscribe(&self, subs: &mut Subscriptions) {
        subs.rework(NodeKind::Declaration);
    }
    fn rework(&mut self, ctx: &mut PluginContext, node: NodeId) -> EngineResult<()> {
        if ctx
            .tree()
            .property(node)
            .is_some_and(|p| p.starts_with("-x-"))
        {
            ctx.never_emit(node);
        }
        Ok(())
    }
}

#[test]
fn test_never_emit_declaration_is_withheld_from_output() {
    let mut processor = Processor::new();
    processor.register(HideInternal).unwrap();
    let output = processor
        .process(".a { -x-note: internal; color: red }")
        .unwrap();
    assert_eq!(output.css_with(WriteMode::Compressed), ".a{color:red}");
}

#[test]
fn test_tree_exports_as_json() {
    let output = Processor::new().process(".a { color: red }").unwrap();
    let json = output.to_json().unwrap();
    assert!(json.contains("Stylesheet"));
    assert!(json.contains("Declaration"));
}

#[test]
fn test_default_mode_is_inline() {
    let output = Processor::new()
        .process(".a { color: red; margin: 0 }")
        .unwrap();
    assert_eq!(output.css(), ".a {color:red; margin:0}\n");
}
