//! The HTTP dispatch contract and its reqwest implementation.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use drovefile::{Request, Value};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::redirect::Policy;

use crate::error::Error;
use crate::options::RequestOptions;

/// A transport-ready request built from a substituted [`Request`].
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: reqwest::Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Dispatches a single HTTP request. Implementations own connection
/// handling; the engine treats any returned error as a request
/// failure subject to the abort policy.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn do_request(
        &self,
        req: HttpRequest,
        opts: &RequestOptions,
    ) -> Result<reqwest::Response, Error>;
}

/// Transforms a merged and substituted request into its transport
/// form: parsed URL with encoded query parameters, header map with
/// auth shortcuts applied, and the body payload.
///
/// `base_dir` anchors relative `@file` body paths.
pub fn build_http_request(req: &Request, base_dir: &Path) -> Result<HttpRequest, Error> {
    let mut url = reqwest::Url::parse(&req.uri)
        .map_err(|err| Error::Transform(format!("failed parsing URI: {err}")))?;

    if !req.query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &req.query_params {
            match value {
                Value::Array(items) => {
                    for item in items {
                        pairs.append_pair(key, &item.to_string());
                    }
                }
                other => {
                    pairs.append_pair(key, &other.to_string());
                }
            }
        }
    }

    let mut headers = HeaderMap::new();
    for (name, values) in &req.header {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::Transform(format!("invalid header name '{name}': {err}")))?;
        for value in values {
            let value = HeaderValue::from_str(value)
                .map_err(|err| Error::Transform(format!("invalid header value: {err}")))?;
            headers.append(name.clone(), value);
        }
    }

    if !headers.contains_key(AUTHORIZATION) {
        if let Some(value) = authorization_from(&req.auth)? {
            headers.insert(AUTHORIZATION, value);
        }
    }

    let body = req
        .body
        .bytes(base_dir)
        .map_err(|source| Error::Content {
            what: "body file",
            source,
        })?;

    Ok(HttpRequest {
        method: req.method.clone(),
        url,
        headers,
        body,
    })
}

/// Builds an `Authorization` header from the `[Auth]` block: a
/// `token` entry becomes a bearer token, `username`/`password` become
/// basic auth.
fn authorization_from(auth: &drovefile::Entries) -> Result<Option<HeaderValue>, Error> {
    let get = |key: &str| {
        auth.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.to_string())
    };

    let raw = if let Some(token) = get("token") {
        format!("Bearer {token}")
    } else if let Some(username) = get("username") {
        let password = get("password").unwrap_or_default();
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    } else {
        return Ok(None);
    };

    HeaderValue::from_str(&raw)
        .map(Some)
        .map_err(|err| Error::Transform(format!("invalid auth value: {err}")))
}

/// The default dispatcher. Builds a client per request so that
/// per-request options like timeouts and redirect policies apply
/// cleanly.
pub struct ReqwestDispatcher;

#[async_trait]
impl Requester for ReqwestDispatcher {
    async fn do_request(
        &self,
        req: HttpRequest,
        opts: &RequestOptions,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(follow) = opts.follow_redirects {
            builder = builder.redirect(if follow {
                Policy::limited(10)
            } else {
                Policy::none()
            });
        }
        if opts.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(Error::Http)?;

        let method = reqwest::Method::from_bytes(req.method.as_bytes())
            .map_err(|err| Error::Transform(format!("invalid method '{}': {err}", req.method)))?;

        let mut request = client.request(method, req.url).headers(req.headers);
        if let Some(body) = req.body {
            request = request.body(body);
        }

        request.send().await.map_err(Error::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drovefile::{Content, Entries};

    fn base_request(uri: &str) -> Request {
        let mut file = drovefile::Drovefile::parse(&format!("GET {uri}")).unwrap();
        match file.tests.remove(0) {
            drovefile::Action::Request(req) => req,
            _ => unreachable!(),
        }
    }

    #[test]
    fn query_params_encode_into_the_url() {
        let mut req = base_request("https://example.com/items?fixed=1");
        req.query_params.insert("limit".into(), Value::Integer(10));
        req.query_params.insert(
            "tag".into(),
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
        );

        let http = build_http_request(&req, Path::new(".")).unwrap();
        assert_eq!(
            http.url.as_str(),
            "https://example.com/items?fixed=1&limit=10&tag=a&tag=b"
        );
    }

    #[test]
    fn invalid_uri_fails_transform() {
        let req = base_request("::not-a-uri::");
        assert!(matches!(
            build_http_request(&req, Path::new(".")),
            Err(Error::Transform(_))
        ));
    }

    #[test]
    fn bearer_auth_builds_authorization_header() {
        let mut auth = Entries::new();
        auth.insert("token".into(), Value::String("t0k3n".into()));
        let value = authorization_from(&auth).unwrap().unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer t0k3n");
    }

    #[test]
    fn basic_auth_builds_authorization_header() {
        let mut auth = Entries::new();
        auth.insert("username".into(), Value::String("user".into()));
        auth.insert("password".into(), Value::String("pass".into()));
        let value = authorization_from(&auth).unwrap().unwrap();
        assert_eq!(value.to_str().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn explicit_authorization_header_wins() {
        let mut req = base_request("https://example.com");
        req.add_header("Authorization", "Bearer explicit".into());
        req.auth
            .insert("token".into(), Value::String("ignored".into()));

        let http = build_http_request(&req, Path::new(".")).unwrap();
        assert_eq!(
            http.headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer explicit"
        );
    }

    #[test]
    fn string_body_becomes_bytes() {
        let mut req = base_request("https://example.com");
        req.body = Content::String("payload".into());

        let http = build_http_request(&req, Path::new(".")).unwrap();
        assert_eq!(http.body, Some(b"payload".to_vec()));
    }
}
