//! Drovefile parsing and data model.
//!
//! A drovefile describes a batch of HTTP requests grouped into lifecycle
//! phases. The grammar is line-oriented:
//!
//! ```text
//! use ../shared/login
//!
//! ### Setup
//!
//! POST https://api.example.com/session
//!
//! [Body]
//! {"user": "admin"}
//!
//! ---
//!
//! ### Tests
//!
//! ##### Smoke
//!
//! GET https://api.example.com/items/{{ .itemId }}
//!
//! [QueryParams]
//! limit = 1_00
//! tags = ["a", "b"]
//!
//! [Script]
//! assert(response.status_code == 200);
//! ```
//!
//! This crate covers everything up to (but not including) execution:
//! the scanner and parser, the AST, recursive import resolution,
//! defaults merging and template substitution. Executing a parsed
//! [`Drovefile`] is the runner crate's job.

pub mod content;
pub mod error;
pub mod file;
pub mod import;
pub mod parser;
pub mod request;
pub mod template;
pub mod value;

mod scanner;

pub use content::Content;
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use file::{Action, Drovefile, Phase};
pub use import::load;
pub use request::{Entries, HeaderMap, Request, SubstituteError};
pub use template::{Params, TemplateError};
pub use value::Value;

/// File extension recognized during directory discovery.
pub const FILE_EXTENSION: &str = "drove";
