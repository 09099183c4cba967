use super::{repo_path, Body, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::http::encode_path_segment;
use crate::mcp::CallToolResult;
use crate::params::{Args, ParamError};
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use reqwest::Method;
use serde_json::Value;

const FILTER_DEFAULT: &str = "default";
const FILTER_INCLUDE_READ: &str = "include_read_notifications";
const FILTER_ONLY_PARTICIPATING: &str = "only_participating";

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "list_notifications",
            Category::Notifications,
            Access::Read,
            Schema::new()
                .optional(
                    "filter",
                    ParamType::Enum(&[FILTER_DEFAULT, FILTER_INCLUDE_READ, FILTER_ONLY_PARTICIPATING]),
                    "Filter notifications to, use default unless specified.",
                )
                .optional("since", ParamType::String, "Only show notifications updated after the given time (ISO 8601 format)")
                .optional("before", ParamType::String, "Only show notifications updated before the given time (ISO 8601 format)")
                .optional("owner", ParamType::String, "Optional repository owner")
                .optional("repo", ParamType::String, "Optional repository name")
                .pagination()
                .build(),
            list_notifications,
        )
        .describe(
            t,
            "List notifications",
            "Lists all GitHub notifications for the authenticated user, including unread notifications, mentions, review requests, assignments, and updates on issues or pull requests.",
        ),
        Tool::new(
            "get_notification_details",
            Category::Notifications,
            Access::Read,
            Schema::new()
                .required("notificationID", ParamType::String, "The ID of the notification")
                .build(),
            get_notification_details,
        )
        .describe(
            t,
            "Get notification details",
            "Get detailed information for a specific GitHub notification.",
        ),
        Tool::new(
            "manage_notifications",
            Category::Notifications,
            Access::Write,
            Schema::new()
                .required(
                    "action",
                    ParamType::Enum(&["mark_read", "mark_done", "mark_all_read"]),
                    "The action to perform",
                )
                .optional("threadID", ParamType::String, "The ID of the notification thread (required for mark_read and mark_done)")
                .optional("lastReadAt", ParamType::String, "Describes the last point that notifications were checked (RFC3339). Only for mark_all_read")
                .optional("owner", ParamType::String, "Optional repository owner for mark_all_read")
                .optional("repo", ParamType::String, "Optional repository name for mark_all_read")
                .build(),
            manage_notifications,
        )
        .describe(
            t,
            "Manage notifications",
            "Mark a notification thread read or done, or mark all notifications as read.",
        ),
        Tool::new(
            "manage_notification_subscription",
            Category::Notifications,
            Access::Write,
            Schema::new()
                .required("notificationID", ParamType::String, "The ID of the notification thread")
                .required("action", ParamType::Enum(&["ignore", "watch", "delete"]), "Action to perform")
                .build(),
            manage_notification_subscription,
        )
        .describe(
            t,
            "Manage notification subscription",
            "Manage a notification subscription: ignore, watch, or delete a notification thread subscription.",
        ),
        Tool::new(
            "manage_repository_notification_subscription",
            Category::Notifications,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("action", ParamType::Enum(&["ignore", "watch", "delete"]), "Action to perform")
                .build(),
            manage_repository_notification_subscription,
        )
        .describe(
            t,
            "Manage repository notification subscription",
            "Manage a repository notification subscription: ignore, watch, or delete repository notifications subscription.",
        ),
    ]
}

/// Notifications root, scoped to one repository when both parts are given.
fn notifications_path(args: &Args) -> Result<String, ParamError> {
    let owner = args.optional_string("owner")?;
    let repo = args.optional_string("repo")?;
    Ok(match (owner, repo) {
        (Some(o), Some(r)) => format!("{}/notifications", repo_path(&o, &r)),
        _ => "/notifications".to_string(),
    })
}

fn thread_path(id: &str) -> String {
    format!("/notifications/threads/{}", encode_path_segment(id))
}

async fn list_notifications(ctx: RequestContext, args: Args) -> ToolResult {
    let filter = args
        .optional_string("filter")?
        .unwrap_or_else(|| FILTER_DEFAULT.to_string());
    let mut q = Query::new();
    match filter.as_str() {
        FILTER_DEFAULT => {}
        FILTER_INCLUDE_READ => q = q.set("all", true),
        FILTER_ONLY_PARTICIPATING => q = q.set("participating", true),
        other => return Err(ParamError::invalid("filter", format!("has unknown value {}", other)).into()),
    }
    let q = q
        .opt("since", args.optional_string("since")?)
        .opt("before", args.optional_string("before")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&notifications_path(&args)?, q.as_slice())
        .await
        .or_api_error(&ctx, "failed to get notifications")?;
    Ok(CallToolResult::json(&res.value))
}

async fn get_notification_details(ctx: RequestContext, args: Args) -> ToolResult {
    let id: String = args.required("notificationID")?;
    let res = ctx
        .client
        .get_json::<Value>(&thread_path(&id), &[])
        .await
        .or_api_error(&ctx, &format!("failed to get notification details for ID '{}'", id))?;
    Ok(CallToolResult::json(&res.value))
}

async fn manage_notifications(ctx: RequestContext, args: Args) -> ToolResult {
    let action: String = args.required("action")?;
    match action.as_str() {
        "mark_read" => {
            let id: String = args.required("threadID")?;
            ctx.client
                .send_empty::<Value>(Method::PATCH, &thread_path(&id), None)
                .await
                .or_api_error(&ctx, "failed to mark notification as read")?;
            Ok(CallToolResult::text(format!("Notification {} marked as read", id)))
        }
        "mark_done" => {
            let raw: String = args.required("threadID")?;
            let id: i64 = raw
                .parse()
                .map_err(|_| ParamError::invalid("threadID", "must be a numeric thread ID"))?;
            ctx.client
                .send_empty::<Value>(Method::DELETE, &thread_path(&id.to_string()), None)
                .await
                .or_api_error(&ctx, "failed to mark notification as done")?;
            Ok(CallToolResult::text(format!("Notification {} marked as done", id)))
        }
        "mark_all_read" => {
            let last_read_at = match args.optional_string("lastReadAt")? {
                Some(ts) => {
                    let parsed = chrono::DateTime::parse_from_rfc3339(&ts).map_err(|e| {
                        ParamError::invalid("lastReadAt", format!("is not RFC3339: {}", e))
                    })?;
                    parsed.with_timezone(&chrono::Utc).to_rfc3339()
                }
                None => chrono::Utc::now().to_rfc3339(),
            };
            let body = Body::new().set("last_read_at", last_read_at).into_value();
            ctx.client
                .send_empty(Method::PUT, &notifications_path(&args)?, Some(&body))
                .await
                .or_api_error(&ctx, "failed to mark all notifications as read")?;
            Ok(CallToolResult::text("All notifications marked as read"))
        }
        other => Err(ToolError::failed(format!("Invalid action: {}", other))),
    }
}

fn subscription_body(action: &str) -> Option<Value> {
    match action {
        "ignore" => Some(Body::new().set("ignored", true).into_value()),
        "watch" => Some(Body::new().set("ignored", false).set("subscribed", true).into_value()),
        _ => None,
    }
}

async fn update_subscription(ctx: &RequestContext, path: &str, action: &str, what: &str) -> ToolResult {
    match (action, subscription_body(action)) {
        ("delete", _) => {
            ctx.client
                .send_empty::<Value>(Method::DELETE, path, None)
                .await
                .or_api_error(ctx, &format!("failed to delete {} subscription", what))?;
            Ok(CallToolResult::text(format!("{} subscription deleted", what)))
        }
        (_, Some(body)) => {
            let res = ctx
                .client
                .send_json::<_, Value>(Method::PUT, path, Some(&body))
                .await
                .or_api_error(ctx, &format!("failed to {} {}", action, what))?;
            Ok(CallToolResult::json(&res.value))
        }
        (other, None) => Err(ToolError::failed(format!("Invalid action: {}", other))),
    }
}

async fn manage_notification_subscription(ctx: RequestContext, args: Args) -> ToolResult {
    let id: String = args.required("notificationID")?;
    let action: String = args.required("action")?;
    let path = format!("{}/subscription", thread_path(&id));
    update_subscription(&ctx, &path, &action, "notification").await
}

async fn manage_repository_notification_subscription(ctx: RequestContext, args: Args) -> ToolResult {
    let owner: String = args.required("owner")?;
    let repo: String = args.required("repo")?;
    let action: String = args.required("action")?;
    let path = format!("{}/subscription", repo_path(&owner, &repo));
    update_subscription(&ctx, &path, &action, "repository").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_path_needs_owner_and_repo() {
        let both = Args::from_value(json!({"owner": "o", "repo": "r"})).unwrap();
        assert_eq!(notifications_path(&both).unwrap(), "/repos/o/r/notifications");
        let one = Args::from_value(json!({"owner": "o"})).unwrap();
        assert_eq!(notifications_path(&one).unwrap(), "/notifications");
    }

    #[test]
    fn subscription_bodies() {
        assert_eq!(subscription_body("ignore").unwrap()["ignored"], true);
        assert_eq!(subscription_body("watch").unwrap()["subscribed"], true);
        assert!(subscription_body("delete").is_none());
    }
}
