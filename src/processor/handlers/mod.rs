//! Built-in directive handlers for the composite processor.
//!
//! - [`IfHandler`]: property-driven conditional text (`#If`), static or
//!   deferred to runtime.
//! - [`CallbackHandler`]: hands a statement to registered application code
//!   (`#Callback`).
//! - [`LoadTableHandler`]: runs the statement as a query and bulk-loads
//!   the result into a target table (`#LoadTable`).

pub mod callback;
pub mod cond;
pub mod load_table;

pub use callback::CallbackHandler;
pub use cond::{IfConfig, IfHandler, Properties};
pub use load_table::{LoadTableConfig, LoadTableHandler};
