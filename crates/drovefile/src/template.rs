//! Parameter template substitution.
//!
//! Any string field of a request may contain `{{ … }}` expressions.
//! An expression is either a dotted path into the state map
//! (`{{ .response.body.token }}`) or a call into the builtin function
//! table (`{{ base64 .credentials }}`). Unresolvable paths are hard
//! errors so typos surface instead of producing empty strings.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

use crate::request::Entries;
use crate::value::Value;

/// The state map substitution reads from.
pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated template expression")]
    Unterminated,

    #[error("invalid template expression '{0}'")]
    InvalidExpression(String),

    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    #[error("unknown template function '{0}'")]
    UnknownFunction(String),

    #[error("template function {name}: {reason}")]
    BadCall { name: String, reason: String },
}

/// Substitutes every `{{ … }}` expression in `text`.
pub fn apply(text: &str, params: &Params) -> Result<String, TemplateError> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '{' && chars.get(i + 1) == Some(&'{') {
            let (expr, next) = extract(&chars, i + 2)?;
            let value = eval(&expr, params)?;
            out.push_str(&render(&value));
            i = next;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    Ok(out)
}

/// Substitutes a parsed block value in place. Strings re-render,
/// arrays descend, deferred parameters evaluate to typed values.
pub fn apply_value(value: &mut Value, params: &Params) -> Result<(), TemplateError> {
    match value {
        Value::String(s) => {
            *s = apply(s, params)?;
        }
        Value::Array(items) => {
            for item in items {
                apply_value(item, params)?;
            }
        }
        Value::Parameter(expr) => {
            let resolved = eval(expr, params)?;
            *value = Value::from_json(&resolved);
        }
        _ => {}
    }
    Ok(())
}

/// Substitutes every value of a key/value block.
pub fn apply_entries(entries: &mut Entries, params: &Params) -> Result<(), TemplateError> {
    for (_, value) in entries.iter_mut() {
        apply_value(value, params)?;
    }
    Ok(())
}

/// Extracts the expression body up to the matching `}}`, honoring
/// nested brace pairs and quoted spans the way the scanner does.
fn extract(chars: &[char], start: usize) -> Result<(String, usize), TemplateError> {
    let mut buf = String::new();
    let mut in_str = false;
    let mut str_delim = '\0';
    let mut level = 0usize;
    let mut i = start;

    while i < chars.len() {
        let r = chars[i];

        if !in_str && r == '{' && chars.get(i + 1) == Some(&'{') {
            level += 1;
        }
        if !in_str && r == '}' && chars.get(i + 1) == Some(&'}') {
            if level == 0 {
                return Ok((buf, i + 2));
            }
            level -= 1;
        }
        if r == '"' || r == '`' {
            if in_str {
                if r == str_delim {
                    in_str = false;
                }
            } else {
                in_str = true;
                str_delim = r;
            }
        }

        buf.push(r);
        i += 1;
    }

    Err(TemplateError::Unterminated)
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Path(String),
    Str(String),
    Int(i64),
    Ident(String),
}

fn eval(expr: &str, params: &Params) -> Result<serde_json::Value, TemplateError> {
    let args = split_args(expr)?;

    let Some(first) = args.first() else {
        return Err(TemplateError::InvalidExpression(expr.trim().to_string()));
    };

    match first {
        Arg::Path(path) if args.len() == 1 => resolve_path(path, params)
            .cloned()
            .ok_or_else(|| TemplateError::MissingParameter(path.clone())),
        Arg::Str(s) if args.len() == 1 => Ok(serde_json::Value::from(s.clone())),
        Arg::Int(i) if args.len() == 1 => Ok(serde_json::Value::from(*i)),
        Arg::Ident(name) => call(name, &args[1..], params),
        _ => Err(TemplateError::InvalidExpression(expr.trim().to_string())),
    }
}

fn call(name: &str, args: &[Arg], params: &Params) -> Result<serde_json::Value, TemplateError> {
    match name {
        "base64" => {
            let v = arg_value(name, args, 0, params)?;
            Ok(STANDARD.encode(render(&v)).into())
        }
        "base64url" => {
            let v = arg_value(name, args, 0, params)?;
            Ok(URL_SAFE_NO_PAD.encode(render(&v)).into())
        }
        "json" => {
            let v = arg_value(name, args, 0, params)?;
            Ok(v.to_string().into())
        }
        "timestamp" => {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            Ok(serde_json::Value::from(secs))
        }
        "randomString" => {
            let len = opt_int_arg(name, args, 0)?.unwrap_or(8).max(0) as usize;
            let s: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Ok(s.into())
        }
        "randomInt" => {
            let max = opt_int_arg(name, args, 0)?.unwrap_or(i32::MAX as i64);
            if max <= 0 {
                return Err(TemplateError::BadCall {
                    name: name.into(),
                    reason: "upper bound must be positive".into(),
                });
            }
            Ok(serde_json::Value::from(rand::thread_rng().gen_range(0..max)))
        }
        "isset" => match args {
            [Arg::Path(path)] => Ok(resolve_path(path, params).is_some().into()),
            _ => Err(TemplateError::BadCall {
                name: name.into(),
                reason: "expects a single path argument".into(),
            }),
        },
        _ => Err(TemplateError::UnknownFunction(name.to_string())),
    }
}

fn arg_value(
    name: &str,
    args: &[Arg],
    idx: usize,
    params: &Params,
) -> Result<serde_json::Value, TemplateError> {
    let arg = args.get(idx).ok_or_else(|| TemplateError::BadCall {
        name: name.into(),
        reason: format!("missing argument {}", idx + 1),
    })?;
    match arg {
        Arg::Path(path) => resolve_path(path, params)
            .cloned()
            .ok_or_else(|| TemplateError::MissingParameter(path.clone())),
        Arg::Str(s) => Ok(serde_json::Value::from(s.clone())),
        Arg::Int(i) => Ok(serde_json::Value::from(*i)),
        Arg::Ident(s) => Ok(serde_json::Value::from(s.clone())),
    }
}

fn opt_int_arg(name: &str, args: &[Arg], idx: usize) -> Result<Option<i64>, TemplateError> {
    match args.get(idx) {
        None => Ok(None),
        Some(Arg::Int(i)) => Ok(Some(*i)),
        Some(_) => Err(TemplateError::BadCall {
            name: name.into(),
            reason: format!("argument {} must be an integer", idx + 1),
        }),
    }
}

fn split_args(expr: &str) -> Result<Vec<Arg>, TemplateError> {
    let mut args = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == ' ' || c == '\t' || c == '\n' {
            chars.next();
            continue;
        }

        if c == '"' || c == '`' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some(r) if r == c => break,
                    Some(r) => s.push(r),
                    None => return Err(TemplateError::InvalidExpression(expr.trim().to_string())),
                }
            }
            args.push(Arg::Str(s));
            continue;
        }

        let mut word = String::new();
        while let Some(&r) = chars.peek() {
            if r == ' ' || r == '\t' || r == '\n' {
                break;
            }
            word.push(r);
            chars.next();
        }

        if word.starts_with('.') {
            args.push(Arg::Path(word));
        } else if let Ok(i) = word.parse::<i64>() {
            args.push(Arg::Int(i));
        } else {
            args.push(Arg::Ident(word));
        }
    }

    Ok(args)
}

/// Walks a `.a.b.0.c` path through the state map. Numeric segments
/// index into arrays.
fn resolve_path<'a>(path: &str, params: &'a Params) -> Option<&'a serde_json::Value> {
    let mut segments = path.trim_start_matches('.').split('.');

    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = params.get(first)?;

    for seg in segments {
        current = match current {
            serde_json::Value::Object(map) => map.get(seg)?,
            serde_json::Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
