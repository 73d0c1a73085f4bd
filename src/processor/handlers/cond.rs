//! # Conditional Directive
//!
//! `-- #If: <property>, "<text-if-true>"[, "<text-if-false>"]`
//!
//! Evaluates a named property and substitutes one of the two texts for the
//! directive marker. In static mode (the default) the property is read once
//! at compile time and the directive is discarded; with
//! [`IfConfig::defer_runtime`] the decision moves to the setup pass and is
//! re-taken on every execution.
//!
//! A property is truthy when it exists, is non-empty, and is not `false`,
//! `0`, or `no` (case-insensitive).

use std::sync::Arc;

use crate::error::ScriptError;
use crate::processor::composite::{DirectiveHandler, HandlerConfig, HandlerContext};
use crate::processor::{DirectiveInit, DirectiveState};
use crate::script::Directive;

/// Read-only key/value lookup backing conditional directives.
pub trait Properties: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

impl Properties for hashbrown::HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        hashbrown::HashMap::get(self, name).cloned()
    }
}

impl Properties for std::collections::HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        std::collections::HashMap::get(self, name).cloned()
    }
}

/// Configuration entry for [`IfHandler`], keyed by the handler's identity
/// in the composite configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfConfig {
    /// Re-evaluate the property on every execution instead of once at
    /// compile time.
    pub defer_runtime: bool,
}

pub struct IfHandler {
    properties: Arc<dyn Properties>,
    defer_runtime: bool,
}

impl IfHandler {
    pub fn new(properties: Arc<dyn Properties>) -> Self {
        Self {
            properties,
            defer_runtime: false,
        }
    }

    pub fn deferred(properties: Arc<dyn Properties>) -> Self {
        Self {
            properties,
            defer_runtime: true,
        }
    }

    fn evaluate(&self, directive: &Directive) -> eyre::Result<String> {
        let property = directive.arg(0).ok_or_else(|| {
            eyre::Report::new(ScriptError::invalid_directive(
                &directive.name,
                &directive.origin,
                "expected a property name and a replacement text",
            ))
        })?;
        if directive.arg(1).is_none() || directive.args.len() > 3 {
            return Err(eyre::Report::new(ScriptError::invalid_directive(
                &directive.name,
                &directive.origin,
                "expected 2 or 3 arguments",
            )));
        }

        let value = self.properties.get(property);
        let chosen = if truthy(value.as_deref()) {
            directive.arg(1)
        } else {
            directive.arg(2)
        };
        Ok(chosen.unwrap_or("").to_string())
    }

    fn recognizes(directive: &Directive) -> bool {
        directive.name.eq_ignore_ascii_case("if")
    }
}

fn truthy(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(raw) => {
            let v = raw.trim();
            !(v.is_empty()
                || v.eq_ignore_ascii_case("false")
                || v.eq_ignore_ascii_case("no")
                || v == "0")
        }
    }
}

impl DirectiveHandler for IfHandler {
    fn identity(&self) -> Option<&str> {
        Some("if")
    }

    fn init(&mut self, _ctx: &HandlerContext, config: Option<&HandlerConfig>) -> eyre::Result<()> {
        if let Some(cfg) = config.and_then(|c| c.downcast_ref::<IfConfig>()) {
            self.defer_runtime = cfg.defer_runtime;
        }
        Ok(())
    }

    fn init_directive(
        &mut self,
        _ctx: &HandlerContext,
        directive: &Directive,
    ) -> eyre::Result<Option<DirectiveInit>> {
        if !Self::recognizes(directive) {
            return Ok(None);
        }
        if self.defer_runtime {
            Ok(Some(DirectiveInit::store_with_setup()))
        } else {
            let replacement = self.evaluate(directive)?;
            Ok(Some(DirectiveInit::discard().with_replacement(replacement)))
        }
    }

    fn setup_directive(
        &mut self,
        _ctx: &HandlerContext,
        directive: &Directive,
        _state: Option<&DirectiveState>,
    ) -> eyre::Result<Option<DirectiveInit>> {
        if !Self::recognizes(directive) {
            return Ok(None);
        }
        let replacement = self.evaluate(directive)?;
        Ok(Some(DirectiveInit::store().with_replacement(replacement)))
    }
}

/// Builds a shared [`Properties`] store from key/value pairs.
pub fn properties_from<I, K, V>(entries: I) -> Arc<dyn Properties>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let map: hashbrown::HashMap<String, String> = entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    Arc::new(map)
}
