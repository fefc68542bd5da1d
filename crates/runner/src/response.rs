//! Interpretation of HTTP responses for scripts.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Error;

/// The response record merged into the script state under the
/// `response` key after every dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status_code: u16,
    pub status: String,
    pub headers: IndexMap<String, Vec<String>>,
    pub body_raw: String,
    /// Decoded body when the content type indicates JSON, null
    /// otherwise.
    pub body: serde_json::Value,
}

impl Response {
    pub async fn from_http(resp: reqwest::Response) -> Result<Self, Error> {
        let status_code = resp.status().as_u16();
        let status = match resp.status().canonical_reason() {
            Some(reason) => format!("{status_code} {reason}"),
            None => status_code.to_string(),
        };

        let mut headers: IndexMap<String, Vec<String>> = IndexMap::new();
        for (name, value) in resp.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let bytes = resp
            .bytes()
            .await
            .map_err(|err| Error::Response(err.to_string()))?;
        let body_raw = String::from_utf8_lossy(&bytes).into_owned();

        let body = if is_json && !bytes.is_empty() {
            serde_json::from_slice(&bytes).map_err(|err| Error::Response(err.to_string()))?
        } else {
            serde_json::Value::Null
        };

        Ok(Self {
            status_code,
            status,
            headers,
            body_raw,
            body,
        })
    }

    /// The JSON shape scripts see under `response`.
    pub fn to_state_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
