mod graphql;
mod raw;

pub use graphql::{is_mutation, GraphQlErrorItem};
pub use raw::{RawContent, RawRef};

use crate::config::Config;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const MAX_RETRIES: u32 = 3;
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RateMeta {
    pub remaining: Option<i32>,
    pub used: Option<i32>,
    pub reset_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

/// What is kept of an HTTP response once its body has been consumed.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub rate: RateMeta,
    pub has_next_page: bool,
}

impl ResponseMeta {
    fn from_response(res: &Response) -> Self {
        let headers = res.headers().clone();
        Self {
            status: res.status(),
            rate: extract_rate_from_rest(&headers),
            has_next_page: has_next_page_from_link(&headers),
            headers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    pub value: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("{} {}", .response.status.as_u16(), .message)]
    Status {
        response: ResponseMeta,
        message: String,
    },
    #[error("failed to decode response: {source}")]
    Decode {
        response: Option<ResponseMeta>,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}", graphql::join_messages(.0))]
    GraphQl(Vec<GraphQlErrorItem>),
    #[error("request cancelled")]
    Cancelled,
    #[error("refusing {0} from a read-only tool")]
    WriteRefused(String),
}

impl GitHubError {
    /// The HTTP response that produced this error, when there was one.
    pub fn response(&self) -> Option<&ResponseMeta> {
        match self {
            GitHubError::Status { response, .. } => Some(response),
            GitHubError::Decode { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    pub fn info(&self) -> ErrorInfo {
        match self {
            GitHubError::Status { response, message } => {
                map_status_to_error(response.status, message.clone())
            }
            GitHubError::Transport(e) => ErrorInfo {
                code: "upstream_error".into(),
                message: e.to_string(),
                retriable: true,
            },
            GitHubError::Cancelled => ErrorInfo {
                code: "cancelled".into(),
                message: self.to_string(),
                retriable: false,
            },
            GitHubError::WriteRefused(_) => ErrorInfo {
                code: "forbidden".into(),
                message: self.to_string(),
                retriable: false,
            },
            GitHubError::GraphQl(_) | GitHubError::Decode { .. } => ErrorInfo {
                code: "server_error".into(),
                message: self.to_string(),
                retriable: false,
            },
        }
    }
}

/// Whether a scoped client may issue mutating calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug)]
struct Endpoints {
    token: String,
    api_url: String,
    graphql_url: String,
    raw_url: String,
    api_version: String,
}

/// Shared handle over the REST, GraphQL and raw-content transports.
///
/// Cloning is cheap. The server keeps one root client and hands every tool call a
/// scoped copy carrying that request's cancellation token and access mode.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    endpoints: Arc<Endpoints>,
    cancel: CancellationToken,
    access: AccessMode,
}

pub fn build_client(cfg: &Config) -> reqwest::Result<GitHubClient> {
    let mut default_headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
        default_headers.insert(USER_AGENT, ua);
    }
    let http = Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()?;
    Ok(GitHubClient {
        http,
        endpoints: Arc::new(Endpoints {
            token: cfg.token.clone(),
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            graphql_url: cfg.graphql_url.clone(),
            raw_url: cfg.raw_url.trim_end_matches('/').to_string(),
            api_version: cfg.api_version.clone(),
        }),
        cancel: CancellationToken::new(),
        access: AccessMode::ReadWrite,
    })
}

fn auth_header(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token)).ok()
}

pub fn map_status_to_error(status: StatusCode, message: String) -> ErrorInfo {
    let (code, retriable) = match status {
        StatusCode::BAD_REQUEST => ("bad_request", false),
        StatusCode::UNAUTHORIZED => ("unauthorized", false),
        StatusCode::FORBIDDEN => ("forbidden", false),
        StatusCode::NOT_FOUND => ("not_found", false),
        StatusCode::CONFLICT => ("conflict", false),
        StatusCode::UNPROCESSABLE_ENTITY => ("validation_failed", false),
        StatusCode::TOO_MANY_REQUESTS => ("rate_limited", true),
        s if s.is_server_error() => ("upstream_error", true),
        _ => ("server_error", false),
    };
    ErrorInfo {
        code: code.to_string(),
        message,
        retriable,
    }
}

pub fn extract_rate_from_rest(headers: &HeaderMap) -> RateMeta {
    let header_i32 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i32>().ok())
    };
    let reset_at = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|epoch| chrono::DateTime::<chrono::Utc>::from_timestamp(epoch, 0))
        .map(|t| t.to_rfc3339());
    RateMeta {
        remaining: header_i32("x-ratelimit-remaining"),
        used: header_i32("x-ratelimit-used"),
        reset_at,
    }
}

pub fn has_next_page_from_link(headers: &HeaderMap) -> bool {
    headers
        .get("link")
        .and_then(|v| v.to_str().ok())
        .map(|link| link.contains("rel=\"next\""))
        .unwrap_or(false)
}

/// Percent-encode one URL path segment.
pub fn encode_path_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Encode a repository path segment by segment, keeping the separators (and a
/// trailing slash, which marks a directory).
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_path_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Extract GitHub's `message` field from an error body, falling back to the
/// trimmed body text.
pub fn error_message_from_body(body: &str) -> String {
    #[derive(Deserialize)]
    struct Body {
        message: String,
    }
    match serde_json::from_str::<Body>(body) {
        Ok(b) => b.message,
        Err(_) => body.trim().to_string(),
    }
}

fn compute_backoff(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d;
    }
    // Exponential backoff with jitter: base 200ms * 2^attempt, max 5s.
    let base = 200u64.saturating_mul(1u64 << attempt.min(5));
    let max = 5_000u64.min(base);
    let jitter = fastrand::u64(0..=max / 2);
    Duration::from_millis(max / 2 + jitter)
}

impl GitHubClient {
    /// Copy of this client bound to one request.
    pub fn scoped(&self, cancel: CancellationToken, access: AccessMode) -> Self {
        Self {
            http: self.http.clone(),
            endpoints: self.endpoints.clone(),
            cancel,
            access,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_url, path)
    }

    fn check_write(&self, what: &str) -> Result<(), GitHubError> {
        match self.access {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(GitHubError::WriteRefused(what.to_string())),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match auth_header(&self.endpoints.token) {
            Some(h) => builder.header(AUTHORIZATION, h),
            None => builder,
        }
    }

    fn rest_request(&self, method: Method, url: &str, accept: &str) -> RequestBuilder {
        self.authorized(self.http.request(method, url))
            .header("X-GitHub-Api-Version", self.endpoints.api_version.as_str())
            .header(ACCEPT, accept)
    }

    /// Send a request, racing the request's cancellation token. Idempotent requests
    /// are retried on transport failures, 429 and 5xx.
    async fn send<F>(&self, label: &str, idempotent: bool, make: F) -> Result<Response, GitHubError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let res = tokio::select! {
                _ = self.cancel.cancelled() => return Err(GitHubError::Cancelled),
                r = make().send() => r,
            };
            let retry_after = match res {
                Err(e) => {
                    if !idempotent || attempt >= MAX_RETRIES || e.is_builder() {
                        return Err(GitHubError::Transport(e));
                    }
                    warn!("{} error sending request: {}", label, e);
                    None
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retriable = map_status_to_error(status, String::new()).retriable;
                    if !idempotent || !retriable || attempt >= MAX_RETRIES {
                        return Ok(resp);
                    }
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    warn!("{} retrying (status {})", label, status);
                    retry_after
                }
            };
            let backoff = compute_backoff(attempt, retry_after);
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(GitHubError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
            attempt += 1;
        }
    }

    async fn read_bytes(&self, resp: Response) -> Result<Vec<u8>, GitHubError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(GitHubError::Cancelled),
            b = resp.bytes() => Ok(b?.to_vec()),
        }
    }

    /// Consume the body; non-2xx becomes `GitHubError::Status`.
    async fn finish(&self, resp: Response) -> Result<(Vec<u8>, ResponseMeta), GitHubError> {
        let meta = ResponseMeta::from_response(&resp);
        let body = self.read_bytes(resp).await?;
        if !meta.status.is_success() {
            let message = error_message_from_body(&String::from_utf8_lossy(&body));
            return Err(GitHubError::Status {
                response: meta,
                message,
            });
        }
        Ok((body, meta))
    }

    fn decode<T: DeserializeOwned>(body: &[u8], meta: ResponseMeta) -> Result<RestResponse<T>, GitHubError> {
        let parsed = if body.iter().all(|b| b.is_ascii_whitespace()) {
            serde_json::from_slice(b"null")
        } else {
            serde_json::from_slice(body)
        };
        match parsed {
            Ok(value) => Ok(RestResponse { value, meta }),
            Err(source) => Err(GitHubError::Decode {
                response: Some(meta),
                source,
            }),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<RestResponse<T>, GitHubError> {
        let url = self.api(path);
        let resp = self
            .send(&format!("GET {}", path), true, || {
                self.rest_request(Method::GET, &url, GITHUB_JSON).query(query)
            })
            .await?;
        let (body, meta) = self.finish(resp).await?;
        Self::decode(&body, meta)
    }

    /// GET returning the body as text, with a custom media type (diffs, logs).
    pub async fn get_text(
        &self,
        path: &str,
        accept: &str,
    ) -> Result<RestResponse<String>, GitHubError> {
        let url = self.api(path);
        let resp = self
            .send(&format!("GET {}", path), true, || {
                self.rest_request(Method::GET, &url, accept)
            })
            .await?;
        let (body, meta) = self.finish(resp).await?;
        Ok(RestResponse {
            value: String::from_utf8_lossy(&body).into_owned(),
            meta,
        })
    }

    /// GET following redirects and returning the raw bytes (log archives).
    pub async fn get_bytes(&self, path: &str) -> Result<RestResponse<Vec<u8>>, GitHubError> {
        let url = self.api(path);
        let resp = self
            .send(&format!("GET {}", path), true, || {
                self.rest_request(Method::GET, &url, GITHUB_JSON)
            })
            .await?;
        let (value, meta) = self.finish(resp).await?;
        Ok(RestResponse { value, meta })
    }

    /// Non-GET REST call with an optional JSON body and a JSON response.
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<RestResponse<T>, GitHubError> {
        let label = format!("{} {}", method, path);
        if method != Method::GET {
            self.check_write(&label)?;
        }
        let url = self.api(path);
        let resp = self
            .send(&label, method == Method::GET, || {
                let b = self.rest_request(method.clone(), &url, GITHUB_JSON);
                match body {
                    Some(body) => b.json(body),
                    None => b,
                }
            })
            .await?;
        let (bytes, meta) = self.finish(resp).await?;
        Self::decode(&bytes, meta)
    }

    /// Non-GET REST call whose response carries no body worth decoding (204s).
    pub async fn send_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ResponseMeta, GitHubError> {
        let label = format!("{} {}", method, path);
        if method != Method::GET {
            self.check_write(&label)?;
        }
        let url = self.api(path);
        let resp = self
            .send(&label, method == Method::GET, || {
                let b = self.rest_request(method.clone(), &url, GITHUB_JSON);
                match body {
                    Some(body) => b.json(body),
                    None => b,
                }
            })
            .await?;
        let (_, meta) = self.finish(resp).await?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_matrix() {
        assert_eq!(
            map_status_to_error(StatusCode::BAD_REQUEST, "".into()).code,
            "bad_request"
        );
        assert_eq!(
            map_status_to_error(StatusCode::UNAUTHORIZED, "".into()).code,
            "unauthorized"
        );
        assert_eq!(
            map_status_to_error(StatusCode::FORBIDDEN, "".into()).code,
            "forbidden"
        );
        assert_eq!(
            map_status_to_error(StatusCode::NOT_FOUND, "".into()).code,
            "not_found"
        );
        assert_eq!(
            map_status_to_error(StatusCode::UNPROCESSABLE_ENTITY, "".into()).code,
            "validation_failed"
        );
        let rl = map_status_to_error(StatusCode::TOO_MANY_REQUESTS, "".into());
        assert_eq!(rl.code, "rate_limited");
        assert!(rl.retriable);
        let s5 = map_status_to_error(StatusCode::INTERNAL_SERVER_ERROR, "".into());
        assert_eq!(s5.code, "upstream_error");
        assert!(s5.retriable);
    }

    #[test]
    fn error_body_is_trimmed_to_message() {
        assert_eq!(
            error_message_from_body(r#"{"message":"Not Found","documentation_url":"x"}"#),
            "Not Found"
        );
        assert_eq!(error_message_from_body("  plain text \n"), "plain text");
    }

    #[test]
    fn path_encoding_keeps_separators() {
        assert_eq!(encode_path("src/my file.rs"), "src/my%20file.rs");
        assert_eq!(encode_path("src/"), "src/");
    }

    #[test]
    fn link_header_next_page() {
        let mut h = HeaderMap::new();
        assert!(!has_next_page_from_link(&h));
        h.insert(
            "link",
            HeaderValue::from_static("<https://x/?page=2>; rel=\"next\""),
        );
        assert!(has_next_page_from_link(&h));
    }

    #[test]
    fn backoff_honors_retry_after() {
        assert_eq!(
            compute_backoff(3, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert!(compute_backoff(0, None) <= Duration::from_millis(200));
    }
}
