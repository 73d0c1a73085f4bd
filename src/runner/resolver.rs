//! # Script Resolution
//!
//! A resolver turns a script name into a [`ScriptSource`]: the source text,
//! a display name for error messages, and the statement terminator the
//! script uses. Resolution order in the runner: a processor that is itself
//! a resolver, then the runner's configured resolver, then a direct file
//! read with the name as the path.

use std::path::PathBuf;

use eyre::WrapErr;

use crate::config::{DEFAULT_TERMINATOR, SIGNIFICANT_CHARS};
use crate::error::{Result, ScriptError};

/// A resolved script: text, display name, and statement terminator.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    pub text: String,
    pub display_name: String,
    pub terminator: String,
}

impl ScriptSource {
    /// Source with the default `;` terminator.
    pub fn new(text: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            display_name: display_name.into(),
            terminator: DEFAULT_TERMINATOR.to_string(),
        }
    }

    /// Source with a custom terminator; rejected at construction when the
    /// terminator is empty or contains a significant or whitespace
    /// character.
    pub fn with_terminator(
        text: impl Into<String>,
        display_name: impl Into<String>,
        terminator: impl Into<String>,
    ) -> Result<Self> {
        let terminator = terminator.into();
        validate_terminator(&terminator)?;
        Ok(Self {
            text: text.into(),
            display_name: display_name.into(),
            terminator,
        })
    }
}

pub(crate) fn validate_terminator(terminator: &str) -> Result<()> {
    if terminator.is_empty() {
        return Err(ScriptError::Config(
            "statement terminator must not be empty".to_string(),
        ));
    }
    if let Some(ch) = terminator
        .chars()
        .find(|c| c.is_whitespace() || SIGNIFICANT_CHARS.contains(c))
    {
        return Err(ScriptError::Config(format!(
            "statement terminator '{terminator}' contains reserved character '{ch}'"
        )));
    }
    Ok(())
}

/// Maps a script name to its source. `Ok(None)` means the resolver does not
/// know the name; the runner turns that into a script-not-found error.
pub trait ScriptResolver: Send + Sync {
    fn resolve(&self, name: &str) -> eyre::Result<Option<ScriptSource>>;
}

/// Resolves script names as paths under a base directory, probing for a
/// `.sql` extension when the bare name does not exist.
pub struct FileResolver {
    base_dir: PathBuf,
    terminator: String,
}

impl FileResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            terminator: DEFAULT_TERMINATOR.to_string(),
        }
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Result<Self> {
        let terminator = terminator.into();
        validate_terminator(&terminator)?;
        self.terminator = terminator;
        Ok(self)
    }
}

impl Default for FileResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ScriptResolver for FileResolver {
    fn resolve(&self, name: &str) -> eyre::Result<Option<ScriptSource>> {
        let mut path = self.base_dir.join(name);
        if !path.is_file() && path.extension().is_none() {
            path.set_extension("sql");
        }
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("reading script '{}'", path.display()))?;
        Ok(Some(ScriptSource {
            text,
            display_name: path.display().to_string(),
            terminator: self.terminator.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_default_is_valid() {
        assert!(validate_terminator(DEFAULT_TERMINATOR).is_ok());
    }

    #[test]
    fn terminator_rejects_empty() {
        assert!(matches!(
            validate_terminator(""),
            Err(ScriptError::Config(_))
        ));
    }

    #[test]
    fn terminator_rejects_significant_chars() {
        for t in ["--", ";#", "a,b", "*"] {
            assert!(validate_terminator(t).is_err(), "terminator {t:?}");
        }
    }

    #[test]
    fn terminator_rejects_whitespace() {
        assert!(validate_terminator("; ").is_err());
        assert!(validate_terminator("G O").is_err());
    }

    #[test]
    fn terminator_accepts_word_terminators() {
        assert!(validate_terminator("GO").is_ok());
        assert!(validate_terminator(";").is_ok());
    }

    #[test]
    fn file_resolver_reads_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("setup.sql"), "SELECT 1;").unwrap();

        let resolver = FileResolver::new(dir.path());
        let source = resolver.resolve("setup.sql").unwrap().unwrap();
        assert_eq!(source.text, "SELECT 1;");
        assert_eq!(source.terminator, ";");
    }

    #[test]
    fn file_resolver_probes_sql_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("setup.sql"), "SELECT 1;").unwrap();

        let resolver = FileResolver::new(dir.path());
        assert!(resolver.resolve("setup").unwrap().is_some());
    }

    #[test]
    fn file_resolver_missing_script_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileResolver::new(dir.path());
        assert!(resolver.resolve("absent").unwrap().is_none());
    }
}
