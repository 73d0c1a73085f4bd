//! Parsed statement and directive value types.
//!
//! Both types are immutable once the parser emits them. A statement's text
//! carries one `{sdir-N}` marker per directive that was parsed out of it;
//! the `placeholders` map resolves a marker key back to its directive.

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::token::Origin;

/// A named annotation extracted from a SQL comment, e.g.
/// `-- #If: flag, "WHERE a=1"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: SmallVec<[String; 4]>,
    pub origin: Origin,
}

impl Directive {
    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// One statement of a parsed script: normalized text with directive
/// placeholders embedded, plus the map resolving those placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub origin: Origin,
    pub placeholders: HashMap<String, Directive>,
}

impl Statement {
    pub fn has_directives(&self) -> bool {
        !self.placeholders.is_empty()
    }
}
