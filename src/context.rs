use crate::errors::ErrorSink;
use crate::filter::ContentFilter;
use crate::http::{AccessMode, GitHubClient};
use crate::sanitize::SanitizeConfig;
use crate::toolsets::ToolsetGroup;
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Per-connection state a handler may need beyond GitHub access: the toolset
/// registry (for dynamic enablement) and a channel for server notifications.
pub struct Session {
    pub toolsets: Arc<ToolsetGroup>,
    notifier: Option<UnboundedSender<Value>>,
}

impl Session {
    pub fn new(toolsets: Arc<ToolsetGroup>, notifier: Option<UnboundedSender<Value>>) -> Self {
        Self { toolsets, notifier }
    }

    pub fn notify_tools_changed(&self) {
        let Some(tx) = &self.notifier else {
            return;
        };
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/tools/list_changed",
        });
        if tx.send(msg).is_err() {
            debug!("notification channel closed; dropping tools/list_changed");
        }
    }
}

/// Everything a tool handler, resource reader or completion routine receives.
///
/// Cloning shares the same error holder, content filter and session, so an error
/// recorded through any clone is visible through every other.
#[derive(Clone)]
pub struct RequestContext {
    pub client: GitHubClient,
    pub(crate) errors: Option<ErrorSink>,
    pub content_filter: Option<Arc<ContentFilter>>,
    pub sanitize: SanitizeConfig,
    pub session: Option<Arc<Session>>,
}

impl RequestContext {
    pub fn new(client: GitHubClient) -> Self {
        Self {
            client,
            errors: None,
            content_filter: None,
            sanitize: SanitizeConfig::default(),
            session: None,
        }
    }

    pub fn with_content_filter(mut self, filter: Arc<ContentFilter>) -> Self {
        self.content_filter = Some(filter);
        self
    }

    pub fn with_sanitize(mut self, sanitize: SanitizeConfig) -> Self {
        self.sanitize = sanitize;
        self
    }

    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Copy bound to one request: its own cancellation token and access mode.
    pub fn scoped(&self, cancel: CancellationToken, access: AccessMode) -> Self {
        Self {
            client: self.client.scoped(cancel, access),
            ..self.clone()
        }
    }
}
