use crate::node::{NodeId, Slot, Status};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Configuration and lifecycle errors.
///
/// Every variant here indicates a bug in the embedding code or a plugin,
/// not bad input. They propagate up and terminate the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("illegal status transition from {from:?} to {to:?}")]
    IllegalTransition { from: Status, to: Status },

    #[error("plugin '{name}' is already registered")]
    DuplicatePlugin { name: String },

    #[error("circular plugin dependency involving '{name}'")]
    CircularDependency { name: String },

    #[error("plugin '{name}' could not be resolved to its concrete type")]
    PluginResolution { name: String },

    #[error("cannot mutate a collection whose owner {owner:?} is destroyed")]
    DestroyedOwner { owner: NodeId },

    #[error("cannot attach destroyed node {node:?}")]
    DestroyedNode { node: NodeId },

    #[error("node {node:?} has no {slot:?} collection")]
    InvalidSlot { node: NodeId, slot: Slot },

    #[error("node {node:?} is not linked to any collection")]
    Unlinked { node: NodeId },

    #[error("broadcast of positionless node {node:?} with no active phase")]
    MissingPhase { node: NodeId },

    #[error("refinement failed at {line}:{column}: {message}")]
    Refinement {
        line: u32,
        column: u32,
        message: String,
    },
}

impl EngineError {
    pub fn illegal_transition(from: Status, to: Status) -> Self {
        Self::IllegalTransition { from, to }
    }

    pub fn duplicate_plugin(name: impl Into<String>) -> Self {
        Self::DuplicatePlugin { name: name.into() }
    }

    pub fn circular_dependency(name: impl Into<String>) -> Self {
        Self::CircularDependency { name: name.into() }
    }

    pub fn plugin_resolution(name: impl Into<String>) -> Self {
        Self::PluginResolution { name: name.into() }
    }

    pub fn refinement(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Refinement {
            line,
            column,
            message: message.into(),
        }
    }
}
