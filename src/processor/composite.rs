//! # Composite Processor
//!
//! A [`Processor`] implementation that fans directives out to an ordered
//! chain of [`DirectiveHandler`]s sharing one [`HandlerContext`] (the
//! database driver handle and the default command timeout).
//!
//! Dispatch is first-applicable-handler: each stage walks the chain in
//! registration order and a handler signals "not mine" either by returning
//! `Ok(None)` or by raising an unrecognized-directive error, which the
//! dispatcher catches to continue the walk. This is the only place in the
//! engine where an error is intentionally caught.
//!
//! At execution time every `(directive, state)` pair is offered to the
//! chain; a handler that returns `true` claims the statement. If nothing
//! claims it, the statement is executed as a generic non-query through the
//! shared driver.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;

use crate::db::DbDriver;
use crate::error::ScriptError;
use crate::runner::compiled::InitializedDirective;
use crate::script::Directive;

use super::{DirectiveInit, DirectiveState, Identity, Processor, ProcessorConfig};

/// Shared state handed to every handler call.
pub struct HandlerContext {
    pub driver: Arc<dyn DbDriver>,
    pub command_timeout: Option<Duration>,
}

impl HandlerContext {
    /// Runs `sql` as a non-query through the shared driver, applying the
    /// default command timeout.
    pub fn execute_non_query(&self, sql: &str) -> eyre::Result<u64> {
        self.driver.execute_with_timeout(sql, self.command_timeout)
    }
}

/// Type-erased per-handler configuration entry.
pub type HandlerConfig = dyn Any + Send + Sync;

/// One member of the composite's handler chain. Each stage receives the
/// shared context; inapplicability is signalled by returning `Ok(None)`
/// (or `false` from [`try_execute`](DirectiveHandler::try_execute)).
pub trait DirectiveHandler: Any + Send {
    /// Explicit identity used as this handler's configuration key.
    fn identity(&self) -> Option<&str> {
        None
    }

    fn init(&mut self, ctx: &HandlerContext, config: Option<&HandlerConfig>) -> eyre::Result<()> {
        let _ = (ctx, config);
        Ok(())
    }

    fn init_directive(
        &mut self,
        ctx: &HandlerContext,
        directive: &Directive,
    ) -> eyre::Result<Option<DirectiveInit>>;

    fn setup_directive(
        &mut self,
        ctx: &HandlerContext,
        directive: &Directive,
        state: Option<&DirectiveState>,
    ) -> eyre::Result<Option<DirectiveInit>> {
        let _ = (ctx, directive, state);
        Ok(None)
    }

    /// Offers the statement to this handler. Returning `true` claims it.
    fn try_execute(
        &mut self,
        ctx: &HandlerContext,
        text: &str,
        directive: &Directive,
        state: Option<&DirectiveState>,
    ) -> eyre::Result<bool> {
        let _ = (ctx, text, directive, state);
        Ok(false)
    }
}

/// Configuration for the composite: per-handler entries keyed by handler
/// identity, plus context overrides.
#[derive(Default)]
pub struct CompositeConfig {
    pub directive_configs: HashMap<Identity, Box<dyn Any + Send + Sync>>,
    pub command_timeout: Option<Duration>,
}

impl CompositeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_config(
        mut self,
        identity: Identity,
        config: impl Any + Send + Sync,
    ) -> Self {
        self.directive_configs.insert(identity, Box::new(config));
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }
}

pub struct CompositeProcessor {
    handlers: Vec<Box<dyn DirectiveHandler>>,
    ctx: HandlerContext,
    identity: Option<String>,
}

impl CompositeProcessor {
    pub fn new(driver: Arc<dyn DbDriver>) -> Self {
        Self {
            handlers: Vec::new(),
            ctx: HandlerContext {
                driver,
                command_timeout: None,
            },
            identity: None,
        }
    }

    /// Appends a handler; dispatch follows registration order.
    pub fn with_handler(mut self, handler: impl DirectiveHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }
}

fn handler_identity(handler: &dyn DirectiveHandler) -> Identity {
    match handler.identity() {
        Some(name) => Identity::Named(name.to_string()),
        None => {
            // Upcast first so type_id reports the concrete type.
            let any: &dyn Any = handler;
            Identity::Type(any.type_id())
        }
    }
}

/// True when the report carries the dispatcher's skip signal.
fn is_unrecognized(report: &eyre::Report) -> bool {
    matches!(
        report.downcast_ref::<ScriptError>(),
        Some(ScriptError::UnrecognizedDirective { .. })
    )
}

impl Processor for CompositeProcessor {
    fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    fn init(&mut self, config: Option<&ProcessorConfig>) -> eyre::Result<()> {
        let composite = config.and_then(|c| c.downcast_ref::<CompositeConfig>());

        if let Some(cfg) = composite {
            if cfg.command_timeout.is_some() {
                self.ctx.command_timeout = cfg.command_timeout;
            }
        }

        for handler in &mut self.handlers {
            let key = handler_identity(handler.as_ref());
            let entry = composite
                .and_then(|cfg| cfg.directive_configs.get(&key))
                .map(|boxed| boxed.as_ref() as &HandlerConfig);
            handler.init(&self.ctx, entry)?;
        }
        Ok(())
    }

    fn init_directive(&mut self, directive: &Directive) -> eyre::Result<Option<DirectiveInit>> {
        for handler in &mut self.handlers {
            match handler.init_directive(&self.ctx, directive) {
                Ok(Some(init)) => return Ok(Some(init)),
                Ok(None) => continue,
                Err(report) if is_unrecognized(&report) => continue,
                Err(report) => return Err(report),
            }
        }
        Err(eyre::Report::new(ScriptError::unrecognized(
            &directive.name,
            &directive.origin,
        )))
    }

    fn setup_directive(
        &mut self,
        directive: &Directive,
        state: Option<&DirectiveState>,
    ) -> eyre::Result<Option<DirectiveInit>> {
        for handler in &mut self.handlers {
            match handler.setup_directive(&self.ctx, directive, state) {
                Ok(Some(init)) => return Ok(Some(init)),
                Ok(None) => continue,
                Err(report) if is_unrecognized(&report) => continue,
                Err(report) => return Err(report),
            }
        }
        Err(eyre::Report::new(ScriptError::invalid_directive(
            &directive.name,
            &directive.origin,
            "no setup handler",
        )))
    }

    fn execute_statement(
        &mut self,
        text: &str,
        directives: &[InitializedDirective],
    ) -> eyre::Result<()> {
        let mut claimed = false;
        for entry in directives {
            for handler in &mut self.handlers {
                if handler.try_execute(&self.ctx, text, &entry.directive, entry.state.as_ref())? {
                    claimed = true;
                    break;
                }
            }
        }

        if !claimed {
            tracing::trace!(statement = text, "executing as generic non-query");
            self.ctx.execute_non_query(text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlValue;
    use crate::script::Origin;
    use parking_lot::Mutex;
    use smallvec::smallvec;

    /// Driver double recording every non-query it executes.
    #[derive(Default)]
    struct RecordingDriver {
        executed: Mutex<Vec<String>>,
    }

    impl DbDriver for RecordingDriver {
        fn execute(&self, sql: &str) -> eyre::Result<u64> {
            self.executed.lock().push(sql.to_string());
            Ok(0)
        }
        fn query(&self, _: &str) -> eyre::Result<Vec<Vec<SqlValue>>> {
            Ok(Vec::new())
        }
    }

    /// Chain probe: counts calls, recognizes one directive name.
    struct Probe {
        name: &'static str,
        recognizes: &'static str,
        init_calls: Arc<Mutex<Vec<&'static str>>>,
        raise_unrecognized: bool,
        claims_execution: bool,
    }

    impl Probe {
        fn new(name: &'static str, recognizes: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                name,
                recognizes,
                init_calls: log.clone(),
                raise_unrecognized: false,
                claims_execution: false,
            }
        }
    }

    impl DirectiveHandler for Probe {
        fn identity(&self) -> Option<&str> {
            Some(self.name)
        }

        fn init_directive(
            &mut self,
            _: &HandlerContext,
            directive: &Directive,
        ) -> eyre::Result<Option<DirectiveInit>> {
            self.init_calls.lock().push(self.name);
            if directive.name == self.recognizes {
                Ok(Some(DirectiveInit::store()))
            } else if self.raise_unrecognized {
                Err(eyre::Report::new(ScriptError::unrecognized(
                    &directive.name,
                    &directive.origin,
                )))
            } else {
                Ok(None)
            }
        }

        fn try_execute(
            &mut self,
            _: &HandlerContext,
            _: &str,
            directive: &Directive,
            _: Option<&DirectiveState>,
        ) -> eyre::Result<bool> {
            Ok(self.claims_execution && directive.name == self.recognizes)
        }
    }

    fn directive(name: &str) -> Directive {
        Directive {
            name: name.to_string(),
            args: smallvec![],
            origin: Origin::new("test.sql", 1),
        }
    }

    fn initialized(name: &str) -> InitializedDirective {
        InitializedDirective {
            directive: directive(name),
            key: "sdir-0".to_string(),
            state: None,
        }
    }

    fn composite(handlers: Vec<Probe>) -> (CompositeProcessor, Arc<RecordingDriver>) {
        let driver = Arc::new(RecordingDriver::default());
        let mut processor = CompositeProcessor::new(driver.clone());
        for handler in handlers {
            processor = processor.with_handler(handler);
        }
        (processor, driver)
    }

    #[test]
    fn first_recognizing_handler_wins_and_later_ones_are_not_called() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut processor, _) = composite(vec![
            Probe::new("first", "Other", &log),
            Probe::new("second", "Mine", &log),
            Probe::new("third", "Mine", &log),
        ]);

        let init = processor.init_directive(&directive("Mine")).unwrap();
        assert!(init.is_some());
        // Earlier handlers ran exactly once; the handler after the match
        // never ran.
        assert_eq!(*log.lock(), ["first", "second"]);
    }

    #[test]
    fn unrecognized_error_continues_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut raising = Probe::new("first", "Other", &log);
        raising.raise_unrecognized = true;
        let (mut processor, _) = composite(vec![raising, Probe::new("second", "Mine", &log)]);

        let init = processor.init_directive(&directive("Mine")).unwrap();
        assert!(init.is_some());
        assert_eq!(*log.lock(), ["first", "second"]);
    }

    #[test]
    fn exhausted_chain_reports_unrecognized() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut processor, _) = composite(vec![Probe::new("only", "Other", &log)]);

        let err = processor.init_directive(&directive("Mystery")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScriptError>(),
            Some(ScriptError::UnrecognizedDirective { name, .. }) if name == "Mystery"
        ));
    }

    #[test]
    fn other_handler_errors_abort_the_chain() {
        struct Failing;
        impl DirectiveHandler for Failing {
            fn init_directive(
                &mut self,
                _: &HandlerContext,
                _: &Directive,
            ) -> eyre::Result<Option<DirectiveInit>> {
                eyre::bail!("broken handler")
            }
        }

        let driver = Arc::new(RecordingDriver::default());
        let mut processor = CompositeProcessor::new(driver).with_handler(Failing);
        let err = processor.init_directive(&directive("X")).unwrap_err();
        assert!(err.to_string().contains("broken handler"));
    }

    #[test]
    fn setup_exhaustion_reports_invalid_directive() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut processor, _) = composite(vec![Probe::new("only", "Mine", &log)]);

        // Probe uses the default setup (not implemented → skip).
        let err = processor
            .setup_directive(&directive("Mine"), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScriptError>(),
            Some(ScriptError::InvalidDirective { message, .. }) if message == "no setup handler"
        ));
    }

    #[test]
    fn unclaimed_statement_falls_back_to_generic_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut processor, driver) = composite(vec![Probe::new("only", "Mine", &log)]);

        processor
            .execute_statement("DELETE FROM t", &[initialized("Mine")])
            .unwrap();
        assert_eq!(*driver.executed.lock(), ["DELETE FROM t"]);
    }

    #[test]
    fn claimed_statement_skips_generic_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut claiming = Probe::new("only", "Mine", &log);
        claiming.claims_execution = true;
        let (mut processor, driver) = composite(vec![claiming]);

        processor
            .execute_statement("DELETE FROM t", &[initialized("Mine")])
            .unwrap();
        assert!(driver.executed.lock().is_empty());
    }

    #[test]
    fn statement_without_directives_executes_generically() {
        let (mut processor, driver) = composite(vec![]);
        processor.execute_statement("SELECT 1", &[]).unwrap();
        assert_eq!(*driver.executed.lock(), ["SELECT 1"]);
    }

    #[test]
    fn init_routes_handler_configs_by_identity() {
        struct Configurable {
            seen: Arc<Mutex<Option<u32>>>,
        }
        impl DirectiveHandler for Configurable {
            fn identity(&self) -> Option<&str> {
                Some("configurable")
            }
            fn init(
                &mut self,
                _: &HandlerContext,
                config: Option<&HandlerConfig>,
            ) -> eyre::Result<()> {
                *self.seen.lock() = config.and_then(|c| c.downcast_ref::<u32>()).copied();
                Ok(())
            }
            fn init_directive(
                &mut self,
                _: &HandlerContext,
                _: &Directive,
            ) -> eyre::Result<Option<DirectiveInit>> {
                Ok(None)
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let driver = Arc::new(RecordingDriver::default());
        let mut processor =
            CompositeProcessor::new(driver).with_handler(Configurable { seen: seen.clone() });

        let config = CompositeConfig::new()
            .handler_config(Identity::named("configurable"), 7u32)
            .command_timeout(Duration::from_secs(30));
        Processor::init(&mut processor, Some(&config as &ProcessorConfig)).unwrap();

        assert_eq!(*seen.lock(), Some(7));
        assert_eq!(
            processor.context().command_timeout,
            Some(Duration::from_secs(30))
        );
    }
}
