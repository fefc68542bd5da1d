//! The parsed drovefile: five phase-lists, imports and defaults.

use std::fmt;
use std::path::PathBuf;

use crate::parser::Parser;
use crate::request::Request;
use crate::ParseError;

/// A lifecycle phase of a drovefile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    SetupEach,
    Tests,
    TeardownEach,
    Teardown,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Setup,
        Phase::SetupEach,
        Phase::Tests,
        Phase::TeardownEach,
        Phase::Teardown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::SetupEach => "setup-each",
            Phase::Tests => "tests",
            Phase::TeardownEach => "teardown-each",
            Phase::Teardown => "teardown",
        }
    }

    /// Looks a phase up by its lowercase section name.
    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An item of a phase list.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Request(Request),
    /// A banner emitted during execution to structure the log output.
    LogSection(String),
}

/// A parsed drovefile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drovefile {
    /// Import paths as written. Resolution drains this list and merges
    /// the referenced files in.
    pub imports: Vec<String>,

    pub setup: Vec<Action>,
    pub setup_each: Vec<Action>,
    pub tests: Vec<Action>,
    pub teardown: Vec<Action>,
    pub teardown_each: Vec<Action>,

    /// Request-shaped defaults merged into every request at execution
    /// time.
    pub defaults: Request,

    /// Source path, for diagnostics. Empty when parsed from a string.
    pub path: PathBuf,
}

impl Drovefile {
    /// Parses a drovefile from source text. Imports are collected but
    /// not resolved; use [`crate::load`] for that.
    pub fn parse(src: &str) -> Result<Drovefile, ParseError> {
        Parser::new(src).parse()
    }

    pub(crate) fn phase_mut(&mut self, phase: Phase) -> &mut Vec<Action> {
        match phase {
            Phase::Setup => &mut self.setup,
            Phase::SetupEach => &mut self.setup_each,
            Phase::Tests => &mut self.tests,
            Phase::TeardownEach => &mut self.teardown_each,
            Phase::Teardown => &mut self.teardown,
        }
    }

    /// Merges an imported drovefile into this one. Phase lists
    /// concatenate with this file's actions first; defaults union with
    /// this file's values taking precedence.
    pub fn merge(&mut self, other: Drovefile) {
        self.setup.extend(other.setup);
        self.setup_each.extend(other.setup_each);
        self.tests.extend(other.tests);
        self.teardown.extend(other.teardown);
        self.teardown_each.extend(other.teardown_each);
        self.defaults.merge_defaults(&other.defaults);
    }
}
