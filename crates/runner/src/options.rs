//! Interpretation of the request `[Options]` block.

use std::time::Duration;

use drovefile::Entries;
use thiserror::Error;
use tracing::warn;

/// Options the execution engine itself consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOptions {
    /// When false the request is skipped without error.
    pub condition: bool,
    /// Sleep before dispatching the request.
    pub delay: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            condition: true,
            delay: Duration::ZERO,
        }
    }
}

impl ExecOptions {
    pub fn from_entries(entries: &Entries) -> Self {
        let mut opts = Self::default();
        for (key, value) in entries {
            match key.to_ascii_lowercase().as_str() {
                "condition" => {
                    if let Some(b) = value.as_bool() {
                        opts.condition = b;
                    }
                }
                "delay" => match value.as_str().map(parse_duration) {
                    Some(Ok(d)) => opts.delay = d,
                    Some(Err(err)) => warn!("ignoring delay option: {err}"),
                    None => warn!("ignoring delay option: not a duration string"),
                },
                _ => {}
            }
        }
        opts
    }
}

/// Options governing the abort decision on request failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbortOptions {
    pub always_abort: bool,
    pub no_abort: bool,
}

impl AbortOptions {
    pub fn from_entries(entries: &Entries) -> Self {
        let mut opts = Self::default();
        for (key, value) in entries {
            match key.to_ascii_lowercase().as_str() {
                "alwaysabort" => opts.always_abort = value.as_bool().unwrap_or(false),
                "noabort" => opts.no_abort = value.as_bool().unwrap_or(false),
                _ => {}
            }
        }
        opts
    }

    /// Whether a failure of this request aborts the batch.
    /// `alwaysAbort` wins over every no-abort switch.
    pub fn abort_on_error(&self, executor_no_abort: bool) -> bool {
        if self.always_abort {
            return true;
        }
        if self.no_abort || executor_no_abort {
            return false;
        }
        true
    }
}

/// Options forwarded to the HTTP dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub follow_redirects: Option<bool>,
    pub accept_invalid_certs: bool,
}

impl RequestOptions {
    pub fn from_entries(entries: &Entries) -> Self {
        let mut opts = Self::default();
        for (key, value) in entries {
            match key.to_ascii_lowercase().as_str() {
                "timeout" => match value.as_str().map(parse_duration) {
                    Some(Ok(d)) => opts.timeout = Some(d),
                    _ => warn!("ignoring timeout option: not a duration string"),
                },
                "followredirects" => opts.follow_redirects = value.as_bool(),
                "acceptinvalidcerts" => {
                    opts.accept_invalid_certs = value.as_bool().unwrap_or(false)
                }
                _ => {}
            }
        }
        opts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration '{0}'")]
pub struct InvalidDuration(String);

/// Parses duration strings like `500ms`, `2s` or `1m30s`.
pub fn parse_duration(s: &str) -> Result<Duration, InvalidDuration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InvalidDuration(s.into()));
    }

    let mut total = Duration::ZERO;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().filter(|c| c.is_ascii_digit()) {
            digits.push(*c);
            chars.next();
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().filter(|c| c.is_ascii_alphabetic()) {
            unit.push(*c);
            chars.next();
        }

        let n: u64 = digits.parse().map_err(|_| InvalidDuration(s.into()))?;
        total += match unit.as_str() {
            "ms" => Duration::from_millis(n),
            "s" => Duration::from_secs(n),
            "m" => Duration::from_secs(n * 60),
            "h" => Duration::from_secs(n * 3600),
            _ => return Err(InvalidDuration(s.into())),
        };
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drovefile::Value;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn exec_options_defaults() {
        let opts = ExecOptions::from_entries(&Entries::new());
        assert!(opts.condition);
        assert_eq!(opts.delay, Duration::ZERO);
    }

    #[test]
    fn exec_options_from_entries() {
        let mut entries = Entries::new();
        entries.insert("Condition".into(), Value::Bool(false));
        entries.insert("delay".into(), Value::String("250ms".into()));

        let opts = ExecOptions::from_entries(&entries);
        assert!(!opts.condition);
        assert_eq!(opts.delay, Duration::from_millis(250));
    }

    #[test]
    fn abort_decision_table() {
        // (always_abort, no_abort, executor_no_abort) -> abort?
        let cases = [
            (true, true, true, true),
            (true, false, false, true),
            (false, true, false, false),
            (false, false, true, false),
            (false, false, false, true),
        ];
        for (always, no, executor, expected) in cases {
            let opts = AbortOptions {
                always_abort: always,
                no_abort: no,
            };
            assert_eq!(
                opts.abort_on_error(executor),
                expected,
                "alwaysAbort={always} noAbort={no} executor={executor}"
            );
        }
    }

    #[test]
    fn request_options_from_entries() {
        let mut entries = Entries::new();
        entries.insert("timeout".into(), Value::String("5s".into()));
        entries.insert("followRedirects".into(), Value::Bool(false));
        entries.insert("acceptInvalidCerts".into(), Value::Bool(true));

        let opts = RequestOptions::from_entries(&entries);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.follow_redirects, Some(false));
        assert!(opts.accept_invalid_certs);
    }
}
