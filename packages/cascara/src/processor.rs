use crate::error::CascaraResult;
use cascara_core::{
    serialize, Dispatcher, Findings, NodeId, Phase, Plugin, Registry, Tree, WriteMode,
};
use cascara_parser::{parse, StandardRefiner};
use tracing::info;

/// One-shot processing pipeline: parse, refine, process, validate, then
/// hand back the tree with its findings. Plugins are registered up front;
/// a processor is consumed by `process`.
pub struct Processor {
    registry: Registry,
    mode: WriteMode,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            mode: WriteMode::Inline,
        }
    }

    pub fn with_mode(mode: WriteMode) -> Self {
        Self {
            registry: Registry::new(),
            mode,
        }
    }

    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> CascaraResult<()> {
        self.registry.register(plugin)?;
        Ok(())
    }

    /// Direct registry access, e.g. for `require`-style registration.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn process(mut self, source: &str) -> CascaraResult<Output> {
        info!(bytes = source.len(), "processing stylesheet");
        let mut tree = Tree::new();
        let refiner = StandardRefiner;
        let mut dispatcher = Dispatcher::new(&mut self.registry, &refiner);

        dispatcher.begin(Phase::Refine);
        let root = parse(source, &mut tree, &mut dispatcher)?;
        dispatcher.run_phase(&mut tree, root, Phase::Process)?;
        dispatcher.run_phase(&mut tree, root, Phase::Validate)?;
        dispatcher.finish(&mut tree)?;
        let findings = dispatcher.take_findings();
        drop(dispatcher);

        Ok(Output {
            tree,
            root,
            findings,
            registry: self.registry,
            mode: self.mode,
        })
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a processing run. The tree stays available for inspection,
/// plugins keep whatever state they accumulated.
pub struct Output {
    pub tree: Tree,
    pub root: NodeId,
    pub findings: Findings,
    registry: Registry,
    mode: WriteMode,
}

impl Output {
    pub fn css(&self) -> String {
        serialize(&self.tree, self.root, self.mode)
    }

    pub fn css_with(&self, mode: WriteMode) -> String {
        serialize(&self.tree, self.root, mode)
    }

    /// The plugin instance of type `P`, if one was registered.
    pub fn retrieve<P: Plugin + 'static>(&self) -> Option<&P> {
        self.registry.retrieve()
    }

    pub fn to_json(&self) -> CascaraResult<String> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }
}
