//! # Script Runner - Compilation Cache and Execution Driver
//!
//! The runner owns the compiled-script cache and drives the
//! `init → setup → execute` lifecycle against a caller-supplied
//! [`Processor`].
//!
//! ## Execution contract
//!
//! `execute_script(name, processor)`:
//!
//! 1. Compute the processor identity (explicit name, else concrete type).
//! 2. Probe the cache under `(name, identity)`. A hit skips compilation.
//! 3. Otherwise compile: initialize the processor with its configuration
//!    entry, resolve the source (processor-as-resolver, then the configured
//!    resolver, then a direct file read), parse, and initialize every
//!    directive in source order. The [`DirectiveInit`] result decides
//!    whether the marker is replaced by text, re-emitted for a deferred
//!    runtime pass, or dropped, and whether the directive is stored.
//! 4. Execute every statement in source order. Statements with deferred
//!    directives get a setup pass first: each marker is resolved through
//!    `setup_directive`, replacements are written into the final text, and
//!    discards are applied to a working copy with deletions performed last
//!    so the recorded indices stay valid. Processor failures are wrapped
//!    with the final text and the statement origin.
//!
//! ## Caching
//!
//! A cache entry is created on first execution of a (name, identity) pair
//! and never invalidated during the process lifetime. The cache is keyed by
//! name and identity only: supplying a different configuration for an
//! already-compiled pair does not trigger re-initialization. Entries are
//! read-only after compilation; the setup pass works on per-execution
//! copies, so carried state always starts from its init-time value.
//!
//! ## Concurrency
//!
//! The runner is single-threaded cooperative: one caller drives a script
//! end-to-end, and nothing here suspends. Distinct scripts may run in
//! parallel on distinct runners; sharing one runner across threads requires
//! external serialization of the processor anyway, since processors are
//! driven through `&mut`.

pub mod compiled;
pub mod resolver;

use std::any::Any;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::error::{Result, ScriptError};
use crate::processor::{identity_of, Identity, InitAction, Processor, ProcessorConfig};
use crate::script::{placeholder_regex, substitute, Parser, Statement};

use compiled::{CompiledScript, InitializedDirective, InitializedStatement};
use resolver::{validate_terminator, FileResolver, ScriptResolver, ScriptSource};

type ConfigMap = HashMap<Identity, Box<dyn Any + Send + Sync>>;

pub struct ScriptRunner {
    resolver: Option<Box<dyn ScriptResolver>>,
    configs: ConfigMap,
    cache: RwLock<HashMap<(String, Identity), Arc<CompiledScript>>>,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScriptRunner {
    pub fn builder() -> ScriptRunnerBuilder {
        ScriptRunnerBuilder::new()
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles the named script on first use for this processor identity,
    /// then executes it statement by statement.
    pub fn execute_script(&self, name: &str, processor: &mut dyn Processor) -> Result<()> {
        let identity = identity_of(processor);
        let key = (name.to_string(), identity.clone());

        let compiled = {
            let cache = self.cache.read();
            cache.get(&key).cloned()
        };

        let compiled = match compiled {
            Some(compiled) => compiled,
            None => {
                let compiled = Arc::new(self.compile(name, &identity, processor)?);
                let mut cache = self.cache.write();
                cache
                    .entry(key)
                    .or_insert_with(|| compiled.clone())
                    .clone()
            }
        };

        self.run(&compiled, processor)
    }

    fn compile(
        &self,
        name: &str,
        identity: &Identity,
        processor: &mut dyn Processor,
    ) -> Result<CompiledScript> {
        tracing::debug!(script = name, "compiling script");

        let config = self
            .configs
            .get(identity)
            .map(|entry| entry.as_ref() as &ProcessorConfig);
        processor
            .init(config)
            .map_err(|report| match report.downcast::<ScriptError>() {
                Ok(err) => err,
                Err(report) => {
                    ScriptError::Config(format!("processor initialization failed: {report:#}"))
                }
            })?;

        let source = self.resolve_source(name, processor)?;
        let parsed = Parser::new(&source.text, source.display_name.as_str(), &source.terminator)
            .parse()?;

        let mut statements = Vec::with_capacity(parsed.len());
        for statement in &parsed {
            statements.push(self.init_statement(statement, processor)?);
        }

        tracing::debug!(
            script = name,
            statements = statements.len(),
            "script compiled"
        );
        Ok(CompiledScript { statements })
    }

    fn resolve_source(&self, name: &str, processor: &dyn Processor) -> Result<ScriptSource> {
        let resolved = if let Some(resolver) = processor.as_resolver() {
            resolver.resolve(name)
        } else if let Some(resolver) = &self.resolver {
            resolver.resolve(name)
        } else {
            FileResolver::default().resolve(name)
        };

        match resolved {
            Ok(Some(source)) => {
                validate_terminator(&source.terminator)?;
                Ok(source)
            }
            Ok(None) => Err(ScriptError::ScriptNotFound {
                name: name.to_string(),
            }),
            Err(report) => Err(ScriptError::Resolve {
                name: name.to_string(),
                cause: report.into(),
            }),
        }
    }

    /// Init pass over one parsed statement: walks its markers in source
    /// order, asks the processor to initialize each directive, and applies
    /// the returned action.
    fn init_statement(
        &self,
        statement: &Statement,
        processor: &mut dyn Processor,
    ) -> Result<InitializedStatement> {
        let mut stored: Vec<InitializedDirective> = Vec::new();
        let mut deferred: HashMap<String, usize> = HashMap::new();

        let text = substitute(&statement.text, placeholder_regex(), |key, out| {
            let directive = statement.placeholders.get(key).ok_or_else(|| {
                ScriptError::InvalidOperation(format!(
                    "marker '{{{key}}}' has no directive entry"
                ))
            })?;

            let init = processor
                .init_directive(directive)
                .map_err(|report| {
                    ScriptError::from_directive_report(report, &directive.name, &directive.origin)
                })?
                .ok_or_else(|| ScriptError::unrecognized(&directive.name, &directive.origin))?;

            let (action, replacement, state) = init.into_parts();
            match action {
                InitAction::StoreWithSetup => {
                    // Deferred: the marker stays in the compiled text and is
                    // resolved again on every execution.
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                    deferred.insert(key.to_string(), stored.len());
                    stored.push(InitializedDirective {
                        directive: directive.clone(),
                        key: key.to_string(),
                        state,
                    });
                }
                InitAction::Store => {
                    if let Some(replacement) = replacement {
                        out.push_str(&replacement);
                    }
                    stored.push(InitializedDirective {
                        directive: directive.clone(),
                        key: key.to_string(),
                        state,
                    });
                }
                InitAction::Discard => {
                    if let Some(replacement) = replacement {
                        out.push_str(&replacement);
                    }
                }
            }
            Ok::<(), ScriptError>(())
        })?;

        Ok(InitializedStatement {
            text,
            stored,
            deferred,
            origin: statement.origin.clone(),
        })
    }

    fn run(&self, compiled: &CompiledScript, processor: &mut dyn Processor) -> Result<()> {
        for statement in &compiled.statements {
            let (text, directives) = if statement.has_deferred() {
                self.setup_statement(statement, processor)?
            } else {
                (statement.text.clone(), statement.stored.clone())
            };

            tracing::trace!(origin = %statement.origin, "executing statement");
            processor
                .execute_statement(&text, &directives)
                .map_err(|report| ScriptError::StatementExecution {
                    text: text.clone(),
                    file: statement.origin.file.to_string(),
                    line: statement.origin.line,
                    cause: report.into(),
                })?;
        }
        Ok(())
    }

    /// Deferred-setup pass: resolves the remaining markers against a
    /// working copy of the stored directives. Discards are collected and
    /// applied last, so the indices recorded at compile time stay valid.
    fn setup_statement(
        &self,
        statement: &InitializedStatement,
        processor: &mut dyn Processor,
    ) -> Result<(String, Vec<InitializedDirective>)> {
        let mut working = statement.stored.clone();
        let mut removed: Vec<usize> = Vec::new();

        let text = substitute(&statement.text, placeholder_regex(), |key, out| {
            let &index = statement.deferred.get(key).ok_or_else(|| {
                ScriptError::InvalidOperation(format!(
                    "marker '{{{key}}}' survived compilation without a deferred entry"
                ))
            })?;

            let (name, origin) = {
                let entry = &working[index];
                (entry.directive.name.clone(), entry.directive.origin.clone())
            };
            let result = {
                let entry = &working[index];
                processor.setup_directive(&entry.directive, entry.state.as_ref())
            };
            let init = result
                .map_err(|report| ScriptError::from_directive_report(report, &name, &origin))?
                .ok_or_else(|| {
                    ScriptError::InvalidOperation(format!(
                        "setup for directive '#{name}' returned no initialization"
                    ))
                })?;

            let (action, replacement, state) = init.into_parts();
            if let Some(replacement) = replacement {
                out.push_str(&replacement);
            }
            match action {
                InitAction::Discard => removed.push(index),
                _ => working[index].state = state,
            }
            Ok::<(), ScriptError>(())
        })?;

        removed.sort_unstable();
        removed.dedup();
        for index in removed.into_iter().rev() {
            working.remove(index);
        }

        Ok((text, working))
    }
}

pub struct ScriptRunnerBuilder {
    resolver: Option<Box<dyn ScriptResolver>>,
    configs: ConfigMap,
}

impl Default for ScriptRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRunnerBuilder {
    pub fn new() -> Self {
        Self {
            resolver: None,
            configs: HashMap::new(),
        }
    }

    /// Resolver consulted for processors that are not resolvers themselves.
    pub fn resolver(mut self, resolver: impl ScriptResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Registers the configuration entry handed to processors of the given
    /// identity at init.
    pub fn config(mut self, identity: Identity, config: impl Any + Send + Sync) -> Self {
        self.configs.insert(identity, Box::new(config));
        self
    }

    pub fn build(self) -> ScriptRunner {
        ScriptRunner {
            resolver: self.resolver,
            configs: self.configs,
            cache: RwLock::new(HashMap::new()),
        }
    }
}
