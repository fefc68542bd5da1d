//! Error types for drovefile execution.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::script::ScriptError;

/// Result type alias using the runner Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Runner error taxonomy.
///
/// The distinction between `ParamsParsing` and everything else is
/// load-bearing: a teardown step whose substitution fails (typically
/// because it references state an aborted test never produced) must
/// not halt the remaining teardown steps.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    File(#[from] drovefile::Error),

    #[error("failed substituting request parameters: {0}")]
    ParamsParsing(#[source] drovefile::TemplateError),

    #[error(transparent)]
    Substitute(drovefile::SubstituteError),

    #[error("pre-script failed: {0}")]
    PreScript(#[source] ScriptError),

    #[error("script failed: {0}")]
    Script(#[source] ScriptError),

    #[error("failed transforming to http request: {0}")]
    Transform(String),

    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("response interpretation failed: {0}")]
    Response(String),

    #[error("failed reading {what}: {source}")]
    Content {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("step failed ({}:{line}): {source}", path.display())]
    Step {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Multi(#[from] Errors),

    #[error("{failed} of {total} batches failed")]
    Batch {
        total: usize,
        failed: usize,
        #[source]
        source: Errors,
    },

    #[error("no drovefiles found to execute")]
    NoFiles,

    #[error("stat failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps the error with the drovefile position of the failing
    /// step.
    pub fn at_step(self, path: PathBuf, line: usize) -> Error {
        Error::Step {
            path,
            line,
            source: Box::new(self),
        }
    }

    /// Whether the error originates from parameter substitution,
    /// looking through step context wrappers.
    pub fn is_params_parsing(&self) -> bool {
        match self {
            Error::ParamsParsing(_) => true,
            Error::Step { source, .. } => source.is_params_parsing(),
            _ => false,
        }
    }
}

/// An ordered collection of accumulated errors.
#[derive(Debug, Default)]
pub struct Errors(pub Vec<Error>);

impl Errors {
    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Collapses the collection: no errors yields `None`, a single
    /// error unwraps, anything more stays a multi-error.
    pub fn condense(mut self) -> Option<Error> {
        match self.0.len() {
            0 => None,
            1 => Some(self.0.remove(0)),
            _ => Some(Error::Multi(self)),
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} errors occurred:", self.0.len())?;
        for err in &self.0 {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}
