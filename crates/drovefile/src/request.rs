//! The request record and its executor-facing operations: defaults
//! merging and template substitution.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::content::Content;
use crate::template::{self, Params, TemplateError};
use crate::value::Value;

/// Ordered key/value entries of a block (`QueryParams`, `Options`,
/// `Auth`).
pub type Entries = IndexMap<String, Value>;

/// Ordered header multi-map. Keys are stored in canonical casing.
pub type HeaderMap = IndexMap<String, Vec<String>>;

/// Substitution failures. The `Already*` variants guard against a
/// request being substituted twice, which would re-expand text the
/// first pass produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstituteError {
    #[error("request parameters were already substituted")]
    AlreadySubstituted,

    #[error("pre-script parameters were already substituted")]
    AlreadyPreSubstituted,

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// A single HTTP request specification with its options and script
/// hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub header: HeaderMap,
    pub body: Content,
    pub pre_script: Content,
    pub script: Content,
    pub query_params: Entries,
    pub options: Entries,
    pub auth: Entries,

    /// 1-based line in the originating file where the request began.
    pub pos_line: usize,

    parsed: bool,
    pre_parsed: bool,
}

impl Request {
    /// Appends a header value under the canonical form of `key`.
    pub fn add_header(&mut self, key: &str, value: String) {
        self.header
            .entry(canonical_header_name(key))
            .or_default()
            .push(value);
    }

    /// Folds the file-level defaults into this request. The request's
    /// own values win everywhere; defaults' headers are appended.
    pub fn merge_defaults(&mut self, defaults: &Request) {
        for (key, values) in &defaults.header {
            self.header
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }

        merge_entries(&mut self.query_params, &defaults.query_params);
        merge_entries(&mut self.options, &defaults.options);
        merge_entries(&mut self.auth, &defaults.auth);

        if self.body.is_none() && !defaults.body.is_none() {
            self.body = defaults.body.clone();
        }
        if self.pre_script.is_none() && !defaults.pre_script.is_none() {
            self.pre_script = defaults.pre_script.clone();
        }
        if self.script.is_none() && !defaults.script.is_none() {
            self.script = defaults.script.clone();
        }
    }

    /// Substitutes templates in the pre-script only. Runs before the
    /// main substitution because the pre-script may write parameters
    /// the rest of the request reads.
    pub fn pre_substitute(&mut self, params: &Params) -> Result<(), SubstituteError> {
        if self.pre_parsed {
            return Err(SubstituteError::AlreadyPreSubstituted);
        }
        self.pre_parsed = true;

        if let Content::String(text) = &self.pre_script {
            self.pre_script = Content::String(template::apply(text, params)?);
        }

        Ok(())
    }

    /// Substitutes templates in every remaining request field. Stops
    /// early (without error) when `options.condition` resolves to
    /// false, since a skipped request's other fields may reference
    /// parameters that were never produced.
    pub fn substitute(&mut self, params: &Params) -> Result<(), SubstituteError> {
        if self.parsed {
            return Err(SubstituteError::AlreadySubstituted);
        }
        self.parsed = true;

        template::apply_entries(&mut self.options, params)?;

        let condition = self
            .options
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("condition"))
            .and_then(|(_, value)| value.as_bool());
        if condition == Some(false) {
            return Ok(());
        }

        self.uri = template::apply(&self.uri, params)?;

        template::apply_entries(&mut self.query_params, params)?;
        template::apply_entries(&mut self.auth, params)?;

        for values in self.header.values_mut() {
            for value in values.iter_mut() {
                *value = template::apply(value, params)?;
            }
        }

        match &self.body {
            Content::String(text) => {
                self.body = Content::String(template::apply(text, params)?);
            }
            Content::File(path) => {
                let rendered = template::apply(&path.to_string_lossy(), params)?;
                self.body = Content::File(rendered.into());
            }
            Content::None => {}
        }

        if let Content::String(text) = &self.script {
            self.script = Content::String(template::apply(text, params)?);
        }

        Ok(())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

fn merge_entries(target: &mut Entries, defaults: &Entries) {
    if defaults.is_empty() {
        return;
    }
    let mut merged = defaults.clone();
    for (key, value) in std::mem::take(target) {
        merged.insert(key, value);
    }
    *target = merged;
}

/// Canonicalizes a header name: each dash-separated segment starts
/// with an uppercase letter, the rest lowercased (`content-type` →
/// `Content-Type`).
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|seg| {
            let mut out = String::with_capacity(seg.len());
            for (i, c) in seg.chars().enumerate() {
                if i == 0 {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join("-")
}
