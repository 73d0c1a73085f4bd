//! # Load-Table Directive
//!
//! ```sql
//! /* ** #LoadTable: MyTbl, true, "a, Int32", "b, String, 64" */
//! SELECT a, b FROM source_rows
//! ```
//!
//! Arguments: target table, truncate flag, then one column spec per target
//! column. At execution time the statement runs as a query through the
//! shared driver and the result rows are bulk-inserted into the target
//! table, after a `DELETE FROM` when the truncate flag is set. The handler
//! claims the statement.

use crate::db::{insert_batch, ColumnSpec};
use crate::error::ScriptError;
use crate::processor::composite::{DirectiveHandler, HandlerConfig, HandlerContext};
use crate::processor::{DirectiveInit, DirectiveState};
use crate::script::Directive;

const DEFAULT_CHUNK_SIZE: usize = 500;

/// Configuration entry for [`LoadTableHandler`].
#[derive(Debug, Clone, Copy)]
pub struct LoadTableConfig {
    /// Rows per generated INSERT statement.
    pub chunk_size: usize,
}

/// Carried state: the load plan parsed from the directive arguments at
/// init, reused on every execution.
#[derive(Debug)]
struct LoadPlan {
    table: String,
    truncate: bool,
    columns: Vec<ColumnSpec>,
}

pub struct LoadTableHandler {
    chunk_size: usize,
}

impl Default for LoadTableHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadTableHandler {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn recognizes(directive: &Directive) -> bool {
        directive.name.eq_ignore_ascii_case("loadtable")
    }

    fn parse_plan(directive: &Directive) -> eyre::Result<LoadPlan> {
        let invalid = |message: String| {
            eyre::Report::new(ScriptError::invalid_directive(
                &directive.name,
                &directive.origin,
                message,
            ))
        };

        let table = directive
            .arg(0)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("expected a target table name".to_string()))?
            .to_string();
        let truncate = match directive.arg(1) {
            Some(flag) if flag.eq_ignore_ascii_case("true") => true,
            Some(flag) if flag.eq_ignore_ascii_case("false") => false,
            Some(flag) => return Err(invalid(format!("truncate flag must be true or false, got '{flag}'"))),
            None => return Err(invalid("expected a truncate flag".to_string())),
        };

        let specs = &directive.args[2..];
        if specs.is_empty() {
            return Err(invalid("expected at least one column spec".to_string()));
        }
        let columns = specs
            .iter()
            .map(|spec| ColumnSpec::parse(spec))
            .collect::<eyre::Result<Vec<_>>>()
            .map_err(|err| invalid(err.to_string()))?;

        Ok(LoadPlan {
            table,
            truncate,
            columns,
        })
    }
}

impl DirectiveHandler for LoadTableHandler {
    fn identity(&self) -> Option<&str> {
        Some("load-table")
    }

    fn init(&mut self, _ctx: &HandlerContext, config: Option<&HandlerConfig>) -> eyre::Result<()> {
        if let Some(cfg) = config.and_then(|c| c.downcast_ref::<LoadTableConfig>()) {
            eyre::ensure!(cfg.chunk_size > 0, "load-table chunk size must be positive");
            self.chunk_size = cfg.chunk_size;
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
        let plan = Self::parse_plan(directive)?;
        Ok(Some(DirectiveInit::store().with_state(plan)))
    }

    fn try_execute(
        &mut self,
        ctx: &HandlerContext,
        text: &str,
        directive: &Directive,
        state: Option<&DirectiveState>,
    ) -> eyre::Result<bool> {
        if !Self::recognizes(directive) {
            return Ok(false);
        }
        let plan = state
            .and_then(|s| s.downcast_ref::<LoadPlan>())
            .ok_or_else(|| {
                eyre::Report::new(ScriptError::InvalidOperation(
                    "load-table directive executed without its plan state".to_string(),
                ))
            })?;

        let rows = ctx.driver.query(text)?;
        if plan.truncate {
            ctx.driver.execute(&format!("DELETE FROM {}", plan.table))?;
        }
        let written = insert_batch(
            ctx.driver.as_ref(),
            &plan.table,
            &plan.columns,
            &rows,
            self.chunk_size,
        )?;
        tracing::info!(table = %plan.table, rows = written, "table loaded");
        Ok(true)
    }
}
