//! # Callback Directive
//!
//! `-- #Callback: <name>` routes the statement to application code instead
//! of the database: at execution time the registered callback receives the
//! final statement text and the directive, and the handler claims the
//! statement so no generic execution happens.

use hashbrown::HashMap;

use crate::error::ScriptError;
use crate::processor::composite::{DirectiveHandler, HandlerContext};
use crate::processor::{DirectiveInit, DirectiveState};
use crate::script::Directive;

pub type Callback = Box<dyn FnMut(&str, &Directive) -> eyre::Result<()> + Send>;

#[derive(Default)]
pub struct CallbackHandler {
    callbacks: HashMap<String, Callback>,
}

impl CallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback invoked for `#Callback: <name>`.
    pub fn register<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: FnMut(&str, &Directive) -> eyre::Result<()> + Send + 'static,
    {
        self.callbacks.insert(name.into(), Box::new(callback));
        self
    }

    fn recognizes(directive: &Directive) -> bool {
        directive.name.eq_ignore_ascii_case("callback")
    }

    fn callback_name<'d>(&self, directive: &'d Directive) -> eyre::Result<&'d str> {
        let name = directive.arg(0).ok_or_else(|| {
            eyre::Report::new(ScriptError::invalid_directive(
                &directive.name,
                &directive.origin,
                "expected a callback name",
            ))
        })?;
        if !self.callbacks.contains_key(name) {
            return Err(eyre::Report::new(ScriptError::invalid_directive(
                &directive.name,
                &directive.origin,
                format!("no callback registered under '{name}'"),
            )));
        }
        Ok(name)
    }
}

impl DirectiveHandler for CallbackHandler {
    fn identity(&self) -> Option<&str> {
        Some("callback")
    }

    fn init_directive(
        &mut self,
        _ctx: &HandlerContext,
        directive: &Directive,
    ) -> eyre::Result<Option<DirectiveInit>> {
        if !Self::recognizes(directive) {
            return Ok(None);
        }
        self.callback_name(directive)?;
        Ok(Some(DirectiveInit::store()))
    }

    fn try_execute(
        &mut self,
        _ctx: &HandlerContext,
        text: &str,
        directive: &Directive,
        _state: Option<&DirectiveState>,
    ) -> eyre::Result<bool> {
        if !Self::recognizes(directive) {
            return Ok(false);
        }
        let name = self.callback_name(directive)?.to_string();
        tracing::debug!(callback = %name, "invoking statement callback");
        if let Some(callback) = self.callbacks.get_mut(&name) {
            callback(text, directive)?;
        }
        Ok(true)
    }
}
