//! Compiled-script model: what survives after directive initialization.
//!
//! An [`InitializedStatement`] is the cached form of one statement: its
//! rewritten text (static replacements applied; markers remain only for
//! deferred directives), the stored directives in source order (discarded
//! directives absent), and the map from a deferred marker key to the index
//! of its entry in the stored list. Cache entries are read-only after
//! compilation; executions clone working copies and never write back.

use hashbrown::HashMap;

use crate::processor::DirectiveState;
use crate::script::{Directive, Origin};

/// A directive that survived initialization, with its marker key and the
/// carried state the processor chose.
#[derive(Clone)]
pub struct InitializedDirective {
    pub directive: Directive,
    pub key: String,
    pub state: Option<DirectiveState>,
}

impl std::fmt::Debug for InitializedDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializedDirective")
            .field("directive", &self.directive)
            .field("key", &self.key)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct InitializedStatement {
    pub text: String,
    /// Stored directives in source order; discarded directives absent.
    pub stored: Vec<InitializedDirective>,
    /// Marker key → index into `stored`, for directives that deferred.
    pub deferred: HashMap<String, usize>,
    pub origin: Origin,
}

impl InitializedStatement {
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

/// An ordered, fully initialized script, cached per (name, identity) pair.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub statements: Vec<InitializedStatement>,
}
