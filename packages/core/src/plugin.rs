use crate::broadcast::{SubscriptionPhase, TypeFilter};
use crate::diagnostics::Findings;
use crate::emit::PluginContext;
use crate::error::{EngineError, EngineResult};
use crate::node::NodeId;
use crate::tree::Tree;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use tracing::debug;

/// Object-safe downcasting support; blanket-implemented for every plugin.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A pass over the tree. A plugin declares its subscriptions once, up
/// front, and the engine invokes the matching phase callbacks as nodes
/// are broadcast. At most one instance per concrete type is ever live.
pub trait Plugin: AsAny {
    fn name(&self) -> &'static str;

    /// Declare (type filter, phase) interests. Called once at registration.
    fn subscribe(&self, subs: &mut Subscriptions);

    /// Require other plugins this one depends on. Dependencies are
    /// registered (and therefore subscribed) strictly before this plugin.
    fn dependencies(&mut self, _registry: &mut Registry) -> EngineResult<()> {
        Ok(())
    }

    /// Refine-phase callback; may supply refined structure ahead of the
    /// default grammar production.
    fn refine(&mut self, _ctx: &mut PluginContext, _node: NodeId) -> EngineResult<()> {
        Ok(())
    }

    /// Mutating process-phase callback; runs before any observer sees the
    /// node.
    fn rework(&mut self, _ctx: &mut PluginContext, _node: NodeId) -> EngineResult<()> {
        Ok(())
    }

    /// Read-only process-phase callback.
    fn observe(&mut self, _tree: &Tree, _node: NodeId) {}

    /// Validate-phase callback; reports problems to the sink instead of
    /// failing the run.
    fn validate(&mut self, _tree: &Tree, _node: NodeId, _findings: &mut Findings) {}
}

/// Collects a plugin's declared subscriptions.
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: Vec<(TypeFilter, SubscriptionPhase)>,
}

impl Subscriptions {
    pub fn refine(&mut self, filter: impl Into<TypeFilter>) {
        self.entries.push((filter.into(), SubscriptionPhase::Refine));
    }

    pub fn rework(&mut self, filter: impl Into<TypeFilter>) {
        self.entries.push((filter.into(), SubscriptionPhase::Rework));
    }

    pub fn observe(&mut self, filter: impl Into<TypeFilter>) {
        self.entries
            .push((filter.into(), SubscriptionPhase::Observe));
    }

    pub fn validate(&mut self, filter: impl Into<TypeFilter>) {
        self.entries
            .push((filter.into(), SubscriptionPhase::Validate));
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SubscriptionEntry {
    pub plugin: usize,
    pub filter: TypeFilter,
    pub phase: SubscriptionPhase,
}

/// Holds the live plugin instances and the (type, phase) -> callback table
/// built from their declarations. Registration order is delivery order for
/// ties, and `require` resolves dependency graphs post-order, so a
/// dependency always subscribes before its dependents.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Box<dyn Plugin>>,
    by_type: HashMap<TypeId, usize>,
    resolving: Vec<TypeId>,
    pub(crate) subscriptions: Vec<SubscriptionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin instance. A second instance of an already
    /// registered type is a configuration error.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> EngineResult<()> {
        self.register_entry(Box::new(plugin), TypeId::of::<P>())?;
        Ok(())
    }

    fn register_entry(&mut self, plugin: Box<dyn Plugin>, tid: TypeId) -> EngineResult<usize> {
        if self.by_type.contains_key(&tid) {
            return Err(EngineError::duplicate_plugin(plugin.name()));
        }
        let index = self.plugins.len();
        let mut subs = Subscriptions::default();
        plugin.subscribe(&mut subs);
        debug!(
            plugin = plugin.name(),
            subscriptions = subs.entries.len(),
            "registering plugin"
        );
        for (filter, phase) in subs.entries {
            self.subscriptions.push(SubscriptionEntry {
                plugin: index,
                filter,
                phase,
            });
        }
        self.plugins.push(plugin);
        self.by_type.insert(tid, index);
        Ok(index)
    }

    /// Return the registered instance of `P`, constructing (and resolving
    /// the dependencies of) one via `factory` if absent. Cyclic dependency
    /// declarations are detected and reported rather than looping.
    pub fn require<P, F>(&mut self, factory: F) -> EngineResult<&mut P>
    where
        P: Plugin + 'static,
        F: FnOnce() -> P,
    {
        let tid = TypeId::of::<P>();
        let index = if let Some(&i) = self.by_type.get(&tid) {
            i
        } else {
            if self.resolving.contains(&tid) {
                return Err(EngineError::circular_dependency(type_name::<P>()));
            }
            self.resolving.push(tid);
            let mut plugin = factory();
            let resolved = plugin.dependencies(self);
            self.resolving.pop();
            resolved?;
            self.register_entry(Box::new(plugin), tid)?
        };
        // downcast through the trait object, not the box around it
        self.plugins[index]
            .as_mut()
            .as_any_mut()
            .downcast_mut::<P>()
            .ok_or_else(|| EngineError::plugin_resolution(type_name::<P>()))
    }

    /// The registered instance of `P`, or `None` without constructing one.
    pub fn retrieve<P: Plugin + 'static>(&self) -> Option<&P> {
        let index = *self.by_type.get(&TypeId::of::<P>())?;
        self.plugins[index].as_ref().as_any().downcast_ref::<P>()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub(crate) fn plugin_mut(&mut self, index: usize) -> &mut dyn Plugin {
        self.plugins[index].as_mut()
    }
}
