//! Registry mapping directive kinds to the executors that serve them

use std::collections::HashMap;
use std::sync::Arc;

use crate::coord::action::DirectiveExecutor;
use crate::core::errors::{PmlError, Result};
use crate::parser::{Block, DirectiveKind};

/// Registry for directive executors
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<DirectiveKind, Arc<dyn DirectiveExecutor>>,
}

impl ExecutorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// One executor serving every directive kind
    pub fn uniform(executor: Arc<dyn DirectiveExecutor>) -> Self {
        let mut registry = Self::new();
        for kind in DirectiveKind::ALL {
            registry.register(kind, executor.clone());
        }
        registry
    }

    /// Register an executor for a kind, replacing any previous one
    pub fn register(&mut self, kind: DirectiveKind, executor: Arc<dyn DirectiveExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn get(&self, kind: DirectiveKind) -> Option<Arc<dyn DirectiveExecutor>> {
        self.executors.get(&kind).cloned()
    }

    /// List registered kinds
    pub fn kinds(&self) -> Vec<DirectiveKind> {
        let mut kinds: Vec<_> = self.executors.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.marker());
        kinds
    }

    /// Executor for a parsed block; unknown markers and unserved kinds are fatal
    pub fn resolve(&self, block: &Block) -> Result<Arc<dyn DirectiveExecutor>> {
        block
            .kind()
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| PmlError::UnknownDirective {
                marker: block.marker.clone(),
                line: block.line,
            })
    }
}
