pub mod error;
pub mod processor;

#[cfg(test)]
mod tests_pipeline;

pub use cascara_core::{
    Broadcaster, Dispatcher, EngineError, EngineResult, Finding, FindingLevel, Findings, NodeId,
    NodeKind, Phase, Plugin, PluginContext, RawContent, Refiner, Registry, SimpleSelectorKind,
    Slot, Span, Status, Subscriptions, TermKind, Tree, TypeFilter, WriteMode,
};
pub use cascara_parser::{parse, ParseError, StandardRefiner};
pub use error::{CascaraError, CascaraResult};
pub use processor::{Output, Processor};
