//! Authenticated REST client shared by all providers.
//!
//! Handles URL joining, auth headers, JSON (de)serialization, error
//! translation and `Link: <...>; rel="next"` pagination.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Hard stop for `rel="next"` chains.
pub const MAX_PAGES: usize = 100;

/// How the access token is presented to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: token <tok>` (GitHub)
    Token,
    /// `Authorization: Bearer <tok>` (GitLab)
    Bearer,
    /// No `Authorization` header and no token required
    Anonymous,
}

/// A single provider call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    body: Option<Value>,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    paginate: bool,
    raw: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
            paginate: false,
            raw: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// JSON body; sets `Content-Type: application/json`.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra header, overriding the client defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Follow `rel="next"` links and concatenate every page.
    ///
    /// Only honored for JSON GET requests on a client with a page size.
    pub fn paginate(mut self) -> Self {
        self.paginate = true;
        self
    }

    /// Return the body as text instead of decoding JSON.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(value) => value,
            Payload::Raw(text) => Value::String(text),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Raw(text) => text,
        }
    }
}

/// REST client bound to one provider API.
pub struct ProviderClient {
    base_url: String,
    token: String,
    auth: AuthScheme,
    page_size: Option<(&'static str, u32)>,
    default_headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl ProviderClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, auth: AuthScheme) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            auth,
            page_size: None,
            default_headers: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Declare the page-size query argument of the provider.
    pub fn with_page_size(mut self, param: &'static str, size: u32) -> Self {
        self.page_size = Some((param, size));
        self
    }

    /// Header sent with every request unless the request overrides it.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies...).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_anonymous(&self) -> bool {
        self.auth == AuthScheme::Anonymous
    }

    /// Resolve an endpoint against the base URL; absolute URLs pass through.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with(&self.base_url) || reqwest::Url::parse(endpoint).is_ok() {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// Issue a request.
    ///
    /// Paginated calls always return a JSON array, even for a single page.
    pub async fn call(&self, request: ApiRequest) -> Result<Payload> {
        if self.auth != AuthScheme::Anonymous && self.token.is_empty() {
            return Err(Error::Unauthenticated(
                "No access token specified. Please set access_token in the prlab configuration."
                    .to_string(),
            ));
        }

        let url = self.url(&request.url);
        let headers = self.headers(&request.headers)?;

        if request.paginate && request.method == Method::GET && !request.raw {
            if let Some((param, size)) = self.page_size {
                let mut query = request.query;
                if !query.iter().any(|(name, _)| name == param) {
                    query.push((param.to_string(), size.to_string()));
                }
                return self.call_paginated(url, query, headers).await;
            }
        }

        let response = self
            .send(
                request.method,
                &url,
                &request.query,
                headers,
                request.body.as_ref(),
            )
            .await?;

        if request.raw {
            read_text(response, &url).await.map(Payload::Raw)
        } else {
            read_json(response, &url).await.map(Payload::Json)
        }
    }

    /// GET a single JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = self.call(ApiRequest::get(url)).await?.into_json();
        decode(value, url)
    }

    /// GET every page of a listing.
    pub async fn get_all<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>> {
        let url = request.url.clone();
        let value = self.call(request.paginate()).await?.into_json();
        match value {
            Value::Array(_) => decode(value, &url),
            other => decode(Value::Array(vec![other]), &url),
        }
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let value = self
            .call(ApiRequest::post(url).body(body))
            .await?
            .into_json();
        decode(value, url)
    }

    async fn call_paginated(
        &self,
        url: String,
        query: Vec<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Payload> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut query = Some(query);
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                warn!(url = url, pages = pages, "Pagination cap reached, ignoring next pages");
                break;
            }

            let page_query = query.take().unwrap_or_default();
            let response = self
                .send(Method::GET, &url, &page_query, headers.clone(), None)
                .await?;
            let link = next_link(response.headers());

            match read_json(response, &url).await? {
                Value::Array(values) => items.extend(values),
                other => items.push(other),
            }
            pages += 1;
            next = link.map(|l| self.url(&l));
        }

        Ok(Payload::Json(Value::Array(items)))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        debug!(method = %method, url = url, "Provider request");

        let mut builder = self.client.request(method, url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = url, error = %e, "Failed to fetch provider request");
            Error::Unknown {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(
                status = status.as_u16(),
                url = url,
                message = message,
                "Provider error response"
            );
            return Err(Error::from_status(status.as_u16(), url, message));
        }

        Ok(response)
    }

    fn headers(&self, overrides: &[(String, String)]) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("prlab/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        match self.auth {
            AuthScheme::Token => {
                headers.insert(AUTHORIZATION, header_value(&format!("token {}", self.token))?);
            }
            AuthScheme::Bearer => {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.token))?);
            }
            AuthScheme::Anonymous => {}
        }

        for (name, value) in self.default_headers.iter().chain(overrides) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidInput(format!("Invalid header name '{}': {}", name, e)))?;
            headers.insert(name, header_value(value)?);
        }

        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidInput(format!("Invalid header value: {}", e)))
}

async fn read_text(response: reqwest::Response, url: &str) -> Result<String> {
    let bytes = response.bytes().await.map_err(|e| Error::Unknown {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    String::from_utf8(bytes.to_vec()).map_err(|e| Error::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

async fn read_json(response: reqwest::Response, url: &str) -> Result<Value> {
    let text = read_text(response, url).await?;
    serde_json::from_str(&text).map_err(|e| Error::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Extract the `message` (or `error`) field of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let field = value.get("message").or_else(|| value.get("error"))?;
    match field {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parse the `Link` header to find the `rel="next"` URL.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    for part in link.split(',') {
        let part = part.trim();
        if part.contains(r#"rel="next""#) {
            let start = part.find('<')? + 1;
            let end = start + part[start..].find('>')?;
            return Some(part[start..end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let client = ProviderClient::new("https://api.github.com/", "tok", AuthScheme::Token);
        assert_eq!(client.base_url(), "https://api.github.com");
        assert_eq!(client.url("user"), "https://api.github.com/user");
        assert_eq!(client.url("/search/issues"), "https://api.github.com/search/issues");
        assert_eq!(
            client.url("https://api.github.com/repos/o/r/pulls/1"),
            "https://api.github.com/repos/o/r/pulls/1"
        );
        assert_eq!(
            client.url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "link",
            r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=3>; rel="last""#
                .parse()
                .unwrap(),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/x?page=2")
        );

        let mut headers = HeaderMap::new();
        headers.insert("link", r#"<next-url>; rel="first""#.parse().unwrap());
        assert!(next_link(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert("link", r#"<next-url>; meta="next""#.parse().unwrap());
        assert!(next_link(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert("link", r#">x<; rel="next""#.parse().unwrap());
        assert!(next_link(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert("link", r#">junk, <page-2>; rel="next""#.parse().unwrap());
        assert_eq!(next_link(&headers).as_deref(), Some("page-2"));

        assert!(next_link(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message": "Not Found"}"#).as_deref(),
            Some("Not Found")
        );
        assert_eq!(
            error_message(r#"{"message": {"line_code": ["must be a valid line code"]}}"#)
                .as_deref(),
            Some(r#"{"line_code":["must be a valid line code"]}"#)
        );
        assert_eq!(error_message(r#"{"error": "invalid_token"}"#).as_deref(), Some("invalid_token"));
        assert!(error_message("<html>").is_none());
        assert!(error_message("{}").is_none());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let client = ProviderClient::new("https://api.github.com", "", AuthScheme::Token);
        let err = client.call(ApiRequest::get("user")).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
        assert_eq!(err.status_code(), 400);
    }

    mod integration {
        use super::*;
        use httpmock::prelude::*;
        use serde_json::json;

        fn create_test_client(server: &MockServer) -> ProviderClient {
            ProviderClient::new(server.base_url(), "test-token", AuthScheme::Bearer)
                .with_page_size("per_page", 100)
        }

        #[tokio::test]
        async fn test_pagination_concatenates_pages() {
            let server = MockServer::start();

            let first = server.mock(|when, then| {
                when.method(GET)
                    .path("/items")
                    .query_param("per_page", "100")
                    .header("Authorization", "Bearer test-token");
                then.status(200)
                    .header("Link", format!(r#"<{}>; rel="next""#, server.url("/items-2")))
                    .json_body(json!([{"name": "A"}, {"name": "B"}]));
            });
            let second = server.mock(|when, then| {
                when.method(GET).path("/items-2");
                then.status(200).json_body(json!([{"name": "C"}]));
            });

            let client = create_test_client(&server);
            let value = client
                .call(ApiRequest::get("items").paginate())
                .await
                .unwrap()
                .into_json();

            first.assert();
            second.assert();
            assert_eq!(value, json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]));
        }

        #[tokio::test]
        async fn test_pagination_relative_link_and_scalar_pages() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET).path("/single");
                then.status(200)
                    .header("Link", r#"<next-url>; rel="next""#)
                    .json_body(json!({"name": "first"}));
            });
            let next = server.mock(|when, then| {
                when.method(GET).path("/next-url");
                then.status(200).json_body(json!({"name": "second"}));
            });

            let client = create_test_client(&server);
            let value = client
                .call(ApiRequest::get("single").paginate())
                .await
                .unwrap()
                .into_json();

            next.assert();
            assert_eq!(value, json!([{"name": "first"}, {"name": "second"}]));
        }

        #[tokio::test]
        async fn test_single_page_is_promoted_to_list() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET).path("/valid-link");
                then.status(200).json_body(json!({"test1": "test2"}));
            });

            let client = create_test_client(&server);
            let value = client
                .call(ApiRequest::get("valid-link").paginate())
                .await
                .unwrap()
                .into_json();

            assert_eq!(value[0]["test1"], "test2");
        }

        #[tokio::test]
        async fn test_garbled_link_header_ends_pagination() {
            let server = MockServer::start();

            let items = server.mock(|when, then| {
                when.method(GET).path("/items");
                then.status(200)
                    .header("Link", r#">x<; rel="next""#)
                    .json_body(json!([1, 2]));
            });

            let client = create_test_client(&server);
            let value = client
                .call(ApiRequest::get("items").paginate())
                .await
                .unwrap()
                .into_json();

            items.assert_hits(1);
            assert_eq!(value, json!([1, 2]));
        }

        #[tokio::test]
        async fn test_pagination_cap() {
            let server = MockServer::start();

            // Self-referencing next link
            let looping = server.mock(|when, then| {
                when.method(GET).path("/loop");
                then.status(200)
                    .header("Link", r#"</loop>; rel="next""#)
                    .json_body(json!([1]));
            });

            let client = create_test_client(&server);
            let value = client
                .call(ApiRequest::get("loop").paginate())
                .await
                .unwrap()
                .into_json();

            looping.assert_hits(MAX_PAGES);
            assert_eq!(value.as_array().map(Vec::len), Some(MAX_PAGES));
        }

        #[tokio::test]
        async fn test_remote_rejected() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET).path("/missing");
                then.status(404).json_body(json!({"message": "Not Found"}));
            });

            let client = create_test_client(&server);
            let err = client.call(ApiRequest::get("missing")).await.unwrap_err();

            assert!(err.is_status(404));
            assert_eq!(err.remote_message(), Some("Not Found"));
            assert!(err.to_string().contains("Invalid response in"));
        }

        #[tokio::test]
        async fn test_remote_rejected_without_json_body() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET).path("/boom");
                then.status(502).body("<html>bad gateway</html>");
            });

            let client = create_test_client(&server);
            let err = client.call(ApiRequest::get("boom")).await.unwrap_err();

            assert_eq!(err.status_code(), 502);
            assert_eq!(err.remote_message(), Some("Bad Gateway"));
        }

        #[tokio::test]
        async fn test_malformed_response() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET).path("/garbage");
                then.status(200).body("not json");
            });

            let client = create_test_client(&server);
            let err = client.call(ApiRequest::get("garbage")).await.unwrap_err();

            assert!(matches!(err, Error::MalformedResponse { .. }));
            assert_eq!(err.status_code(), 400);
        }

        #[tokio::test]
        async fn test_unknown_transport_error() {
            let client = ProviderClient::new("http://127.0.0.1:1", "tok", AuthScheme::Bearer);
            let err = client.call(ApiRequest::get("user")).await.unwrap_err();

            assert!(matches!(err, Error::Unknown { .. }));
            assert_eq!(err.status_code(), 500);
            assert!(err.to_string().starts_with("Unknown error in"));
        }

        #[tokio::test]
        async fn test_raw_and_post() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET)
                    .path("/file")
                    .query_param("ref", "abc")
                    .header("Accept", "text/plain");
                then.status(200).body("line 1\nline 2\n");
            });
            let post = server.mock(|when, then| {
                when.method(POST)
                    .path("/comments")
                    .header("Content-Type", "application/json")
                    .json_body(json!({"body": "hello"}));
                then.status(201).json_body(json!({"id": 1}));
            });

            let client = create_test_client(&server);
            let text = client
                .call(
                    ApiRequest::get("file")
                        .query("ref", "abc")
                        .header("Accept", "text/plain")
                        .raw(),
                )
                .await
                .unwrap()
                .into_text();
            assert_eq!(text, "line 1\nline 2\n");

            let created: Value = client
                .post_json("comments", &json!({"body": "hello"}))
                .await
                .unwrap();
            post.assert();
            assert_eq!(created["id"], 1);
        }

        #[tokio::test]
        async fn test_anonymous_sends_no_authorization() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(GET).path("/public").header_missing("Authorization");
                then.status(200).json_body(json!({"ok": true}));
            });

            let client = ProviderClient::new(server.base_url(), "", AuthScheme::Anonymous);
            let value: Value = client.get_json("public").await.unwrap();

            mock.assert();
            assert_eq!(value["ok"], true);
        }
    }
}
