pub mod broadcast;
pub mod collection;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod node;
pub mod plugin;
pub mod tree;
pub mod writer;

pub use broadcast::{
    Broadcaster, NoopBroadcaster, Phase, QueryableBroadcaster, QueuingBroadcaster,
    SubscriptionPhase, TypeFilter,
};
pub use collection::Collection;
pub use diagnostics::{Finding, FindingLevel, Findings};
pub use emit::{Dispatcher, NoopRefiner, PluginContext, Refiner};
pub use error::{EngineError, EngineResult};
pub use node::{
    Group, Link, NodeData, NodeId, NodeKind, Payload, RawContent, SimpleSelectorKind, Slot, Span,
    Status, TermKind,
};
pub use plugin::{Plugin, Registry, Subscriptions};
pub use tree::Tree;
pub use writer::{serialize, StyleWriter, WriteMode};
