//! # sqlscript - Annotated-SQL Preprocessor and Execution Engine
//!
//! `sqlscript` consumes SQL source files annotated with directives embedded
//! in comments, compiles them into statement lists, and drives their
//! execution against a caller-supplied database layer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlscript::{
//!     CompositeProcessor, FileResolver, IfHandler, ScriptRunner, SqliteDriver,
//! };
//! use sqlscript::processor::handlers::cond::properties_from;
//!
//! let driver = Arc::new(SqliteDriver::open("./app.db")?);
//! let props = properties_from([("tenant_filter", "true")]);
//!
//! let mut processor = CompositeProcessor::new(driver)
//!     .with_handler(IfHandler::new(props));
//!
//! let runner = ScriptRunner::builder()
//!     .resolver(FileResolver::new("./scripts"))
//!     .build();
//!
//! runner.execute_script("migrate", &mut processor)?;
//! ```
//!
//! ## Directive syntax
//!
//! ```sql
//! -- #If: tenant_filter, "WHERE tenant_id = 1"
//! /* ** #LoadTable: Target, true, "a, Int32", "b, String, 64" */
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        ScriptRunner (cache + driver)     │
//! ├─────────────────────────────────────────┤
//! │   Parser / Lexer / Placeholder rewrite   │
//! ├─────────────────────────────────────────┤
//! │  Processor (composite → handler chain)   │
//! ├─────────────────────────────────────────┤
//! │     DbDriver (rusqlite or caller's)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Scripts compile once per (script name, processor identity) pair; the
//! compiled form is cached for the process lifetime. Directives run through
//! an `init → setup → execute` lifecycle: init happens at compile time,
//! setup on every execution but only for directives that deferred, and
//! execute once per statement per execution.
//!
//! ## Module Overview
//!
//! - [`script`]: lexer, parser, placeholder substitution
//! - [`runner`]: compiled cache, resolvers, the execution driver
//! - [`processor`]: the processor contract, composite dispatch, handlers
//! - [`db`]: database driver abstraction and the bundled SQLite driver
//! - [`config`]: process-wide constants
//!
//! ## Concurrency
//!
//! A single script execution is single-threaded end-to-end. Distinct
//! scripts may run in parallel on distinct runners; one runner's cache may
//! be shared across sequential calls.

pub mod config;
pub mod db;
pub mod error;
pub mod processor;
pub mod runner;
pub mod script;

pub use db::{insert_batch, ColumnSpec, DbDriver, SqlValue, SqliteDriver};
pub use error::{Result, ScriptError};
pub use processor::composite::{
    CompositeConfig, CompositeProcessor, DirectiveHandler, HandlerContext,
};
pub use processor::handlers::{CallbackHandler, IfConfig, IfHandler, LoadTableHandler, Properties};
pub use processor::{identity_of, DirectiveInit, DirectiveState, Identity, InitAction, Processor};
pub use runner::compiled::{CompiledScript, InitializedDirective, InitializedStatement};
pub use runner::resolver::{FileResolver, ScriptResolver, ScriptSource};
pub use runner::{ScriptRunner, ScriptRunnerBuilder};
pub use script::{Directive, Origin, Statement};
