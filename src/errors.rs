use crate::context::RequestContext;
use crate::http::{GitHubError, ResponseMeta};
use crate::mcp::CallToolResult;
use crate::tools::ToolError;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub type Cause = Arc<dyn StdError + Send + Sync>;

/// A failed REST call, keeping the response for later inspection.
#[derive(Debug, Clone, Error)]
#[error("{message}: {cause}")]
pub struct GitHubApiError {
    pub message: String,
    pub response: Option<ResponseMeta>,
    #[source]
    pub cause: Cause,
}

#[derive(Debug, Clone, Error)]
#[error("{message}: {cause}")]
pub struct GitHubGraphQlError {
    pub message: String,
    #[source]
    pub cause: Cause,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("context does not carry a GitHub error holder")]
pub struct MissingErrorContext;

#[derive(Debug, Default)]
pub struct RequestErrors {
    pub api_errors: Vec<GitHubApiError>,
    pub graphql_errors: Vec<GitHubGraphQlError>,
}

pub(crate) type ErrorSink = Arc<Mutex<RequestErrors>>;

fn lock(sink: &ErrorSink) -> MutexGuard<'_, RequestErrors> {
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RequestContext {
    /// Attach a fresh, empty holder. Any holder already attached is replaced, so
    /// each request starts clean.
    pub fn with_error_tracking(mut self) -> Self {
        self.errors = Some(Arc::new(Mutex::new(RequestErrors::default())));
        self
    }
}

pub fn add_api_error(ctx: &RequestContext, err: GitHubApiError) {
    if let Some(sink) = &ctx.errors {
        lock(sink).api_errors.push(err);
    }
}

pub fn add_graphql_error(ctx: &RequestContext, err: GitHubGraphQlError) {
    if let Some(sink) = &ctx.errors {
        lock(sink).graphql_errors.push(err);
    }
}

pub fn get_api_errors(ctx: &RequestContext) -> Result<Vec<GitHubApiError>, MissingErrorContext> {
    let sink = ctx.errors.as_ref().ok_or(MissingErrorContext)?;
    Ok(lock(sink).api_errors.clone())
}

pub fn get_graphql_errors(
    ctx: &RequestContext,
) -> Result<Vec<GitHubGraphQlError>, MissingErrorContext> {
    let sink = ctx.errors.as_ref().ok_or(MissingErrorContext)?;
    Ok(lock(sink).graphql_errors.clone())
}

/// Record a REST failure and build the tool result the caller should return.
pub fn new_api_error_response<E>(
    ctx: &RequestContext,
    message: &str,
    response: Option<&ResponseMeta>,
    cause: E,
) -> CallToolResult
where
    E: StdError + Send + Sync + 'static,
{
    let err = GitHubApiError {
        message: message.to_string(),
        response: response.cloned(),
        cause: Arc::new(cause),
    };
    let result = CallToolResult::error(err.to_string());
    add_api_error(ctx, err);
    result
}

pub fn new_graphql_error_response<E>(ctx: &RequestContext, message: &str, cause: E) -> CallToolResult
where
    E: StdError + Send + Sync + 'static,
{
    let err = GitHubGraphQlError {
        message: message.to_string(),
        cause: Arc::new(cause),
    };
    let result = CallToolResult::error(err.to_string());
    add_graphql_error(ctx, err);
    result
}

/// Turn transport failures into recorded, already-formatted tool errors so
/// handlers can use `?`.
pub trait GitHubResultExt<T> {
    fn or_api_error(self, ctx: &RequestContext, message: &str) -> Result<T, ToolError>;
    fn or_graphql_error(self, ctx: &RequestContext, message: &str) -> Result<T, ToolError>;
}

impl<T> GitHubResultExt<T> for Result<T, GitHubError> {
    fn or_api_error(self, ctx: &RequestContext, message: &str) -> Result<T, ToolError> {
        self.map_err(|e| {
            let response = e.response().cloned();
            ToolError::Reported(new_api_error_response(ctx, message, response.as_ref(), e))
        })
    }

    fn or_graphql_error(self, ctx: &RequestContext, message: &str) -> Result<T, ToolError> {
        self.map_err(|e| ToolError::Reported(new_graphql_error_response(ctx, message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::build_client;

    fn ctx() -> RequestContext {
        RequestContext::new(build_client(&Config::default()).unwrap())
    }

    fn io_err(msg: &str) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, msg.to_string())
    }

    #[test]
    fn recording_without_holder_is_a_noop() {
        let c = ctx();
        let r = new_api_error_response(&c, "failed to get issue", None, io_err("boom"));
        assert!(r.is_error);
        assert_eq!(r.text_content(), "failed to get issue: boom");
        assert_eq!(get_api_errors(&c).unwrap_err(), MissingErrorContext);
    }

    #[test]
    fn clones_share_the_holder() {
        let outer = ctx().with_error_tracking();
        let inner = outer.clone();
        new_api_error_response(&inner, "first", None, io_err("a"));
        new_graphql_error_response(&inner, "second", io_err("b"));
        let api = get_api_errors(&outer).unwrap();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].to_string(), "first: a");
        assert_eq!(get_graphql_errors(&outer).unwrap().len(), 1);
    }

    #[test]
    fn re_attaching_clears_previous_errors() {
        let c = ctx().with_error_tracking();
        new_api_error_response(&c, "x", None, io_err("y"));
        let c = c.with_error_tracking();
        assert!(get_api_errors(&c).unwrap().is_empty());
    }
}
