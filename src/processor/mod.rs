//! # Processor Contract
//!
//! A processor is the pluggable component that interprets directives and
//! executes statements. The engine drives it through a three-stage
//! lifecycle:
//!
//! - **init**: once per (script, processor identity) pair, while the
//!   script compiles: every directive is offered to
//!   [`Processor::init_directive`], whose [`DirectiveInit`] result decides
//!   whether the directive is stored, discarded, or deferred, and whether
//!   its marker is replaced by text.
//! - **setup**: once per execution, only for directives that deferred:
//!   [`Processor::setup_directive`] re-evaluates the directive against the
//!   carried state and produces the runtime replacement.
//! - **execute**: once per execution and statement:
//!   [`Processor::execute_statement`] receives the final text and the
//!   surviving `(directive, state)` sequence in source order.
//!
//! ## Action model
//!
//! [`InitAction`] is a sum over the legal storage decisions: a directive is
//! stored, discarded, or stored with a deferred setup pass; discarding and
//! deferring at once is unrepresentable. The replacement text is an
//! independent option, so a directive can be both substituted into the text
//! and kept in the stored list.
//!
//! ## Carried state
//!
//! State is type-erased as `Arc<dyn Any + Send + Sync>`. The erasure is
//! confined to this boundary: a handler defines its own state type, wraps
//! it at init, and downcasts it back in setup/execute.

pub mod composite;
pub mod handlers;

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::runner::compiled::InitializedDirective;
use crate::runner::resolver::ScriptResolver;
use crate::script::Directive;

/// Opaque state carried from a directive's init to its setup and execute
/// stages within one statement.
pub type DirectiveState = Arc<dyn Any + Send + Sync>;

/// Type-erased configuration entry handed to a processor at init.
pub type ProcessorConfig = dyn Any + Send + Sync;

/// Storage decision for an initialized directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    /// Store the directive and carry its state.
    Store,
    /// Drop the directive; it takes no further part in execution.
    Discard,
    /// Store the directive and re-run its setup stage on every execution.
    StoreWithSetup,
}

/// Result of initializing (or setting up) one directive.
#[derive(Clone)]
pub struct DirectiveInit {
    action: InitAction,
    replacement: Option<String>,
    state: Option<DirectiveState>,
}

impl std::fmt::Debug for DirectiveInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveInit")
            .field("action", &self.action)
            .field("replacement", &self.replacement)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

impl DirectiveInit {
    /// Store the directive with no text substitution.
    pub fn store() -> Self {
        Self {
            action: InitAction::Store,
            replacement: None,
            state: None,
        }
    }

    /// Drop the directive after init.
    pub fn discard() -> Self {
        Self {
            action: InitAction::Discard,
            replacement: None,
            state: None,
        }
    }

    /// Store the directive and defer text resolution to the setup stage.
    pub fn store_with_setup() -> Self {
        Self {
            action: InitAction::StoreWithSetup,
            replacement: None,
            state: None,
        }
    }

    /// Substitute `text` in place of the directive's marker. Independent of
    /// the storage decision.
    pub fn with_replacement(mut self, text: impl Into<String>) -> Self {
        self.replacement = Some(text.into());
        self
    }

    /// Attach carried state, handed back to the processor on every setup
    /// and execute call.
    pub fn with_state<S: Any + Send + Sync>(mut self, state: S) -> Self {
        self.state = Some(Arc::new(state));
        self
    }

    pub fn action(&self) -> InitAction {
        self.action
    }

    pub fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }

    pub fn state(&self) -> Option<&DirectiveState> {
        self.state.as_ref()
    }

    pub(crate) fn into_parts(self) -> (InitAction, Option<String>, Option<DirectiveState>) {
        (self.action, self.replacement, self.state)
    }
}

/// Stable identity of a processor or handler, used as the compiled-script
/// cache key and as the configuration-map key. Explicit names win; a
/// processor without one is keyed by its concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Named(String),
    Type(TypeId),
}

impl Identity {
    pub fn named(name: impl Into<String>) -> Self {
        Identity::Named(name.into())
    }

    pub fn of<T: Any>() -> Self {
        Identity::Type(TypeId::of::<T>())
    }
}

pub trait Processor: Any {
    /// Explicit identity, if the processor carries one.
    fn identity(&self) -> Option<&str> {
        None
    }

    /// Called once before a script compiles, with the runner's
    /// configuration entry for this processor's identity (if any).
    fn init(&mut self, config: Option<&ProcessorConfig>) -> eyre::Result<()> {
        let _ = config;
        Ok(())
    }

    /// Initialize one directive. `Ok(None)` means the processor does not
    /// recognize it.
    fn init_directive(&mut self, directive: &Directive) -> eyre::Result<Option<DirectiveInit>>;

    /// Runtime pass for a directive that deferred at init. `Ok(None)` is a
    /// contract violation the runner reports as an invalid operation.
    fn setup_directive(
        &mut self,
        directive: &Directive,
        state: Option<&DirectiveState>,
    ) -> eyre::Result<Option<DirectiveInit>> {
        let _ = (directive, state);
        Ok(None)
    }

    /// Execute one fully resolved statement.
    fn execute_statement(
        &mut self,
        text: &str,
        directives: &[InitializedDirective],
    ) -> eyre::Result<()>;

    /// Capability query: a processor that can also resolve script names
    /// returns itself here and takes precedence over the runner's resolver.
    fn as_resolver(&self) -> Option<&dyn ScriptResolver> {
        None
    }
}

/// Cache identity of a processor: its explicit name when it has one,
/// otherwise its concrete type.
pub fn identity_of(processor: &dyn Processor) -> Identity {
    match processor.identity() {
        Some(name) => Identity::Named(name.to_string()),
        None => {
            // Upcast first so type_id reports the concrete type.
            let any: &dyn Any = processor;
            Identity::Type(any.type_id())
        }
    }
}
