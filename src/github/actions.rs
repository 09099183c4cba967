use super::{owner_repo, repo_path, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::{Cursor, Read};

const DEFAULT_TAIL_LINES: i64 = 500;
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

fn run_id_schema() -> Schema {
    Schema::new()
        .owner_repo()
        .required("run_id", ParamType::Number, "The unique identifier of the workflow run")
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "list_workflows",
            Category::Actions,
            Access::Read,
            Schema::new().owner_repo().pagination().build(),
            list_workflows,
        )
        .describe(t, "List workflows", "List workflows in a repository"),
        Tool::new(
            "list_workflow_runs",
            Category::Actions,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("workflow_id", ParamType::String, "The workflow ID or workflow file name; omit to list runs of every workflow")
                .optional("actor", ParamType::String, "Returns someone's workflow runs")
                .optional("branch", ParamType::String, "Returns workflow runs associated with a branch")
                .optional("event", ParamType::String, "Returns workflow runs for a specific event type")
                .optional(
                    "status",
                    ParamType::Enum(&["queued", "in_progress", "completed", "requested", "waiting"]),
                    "Returns workflow runs with the check run status",
                )
                .pagination()
                .build(),
            list_workflow_runs,
        )
        .describe(t, "List workflow runs", "List workflow runs for a repository or a specific workflow"),
        Tool::new(
            "get_workflow_run",
            Category::Actions,
            Access::Read,
            run_id_schema().build(),
            get_workflow_run,
        )
        .describe(t, "Get workflow run", "Get details of a specific workflow run"),
        Tool::new(
            "list_workflow_jobs",
            Category::Actions,
            Access::Read,
            run_id_schema()
                .optional(
                    "filter",
                    ParamType::Enum(&["latest", "all"]),
                    "Filters jobs by their completed_at timestamp",
                )
                .pagination()
                .build(),
            list_workflow_jobs,
        )
        .describe(t, "List workflow jobs", "List jobs for a specific workflow run"),
        Tool::new(
            "get_job_logs",
            Category::Actions,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("job_id", ParamType::Number, "The unique identifier of the workflow job")
                .optional("tail_lines", ParamType::Number, "Number of lines to return from the end of the log (default 500)")
                .build(),
            get_job_logs,
        )
        .describe(
            t,
            "Get job logs",
            "Download logs for a specific workflow job, returning the last lines of the log",
        ),
        Tool::new(
            "rerun_workflow_run",
            Category::Actions,
            Access::Write,
            run_id_schema().build(),
            rerun_workflow_run,
        )
        .describe(t, "Rerun workflow run", "Re-run an entire workflow run"),
        Tool::new(
            "cancel_workflow_run",
            Category::Actions,
            Access::Write,
            run_id_schema().build(),
            cancel_workflow_run,
        )
        .describe(t, "Cancel workflow run", "Cancel a workflow run"),
    ]
}

fn actions_path(owner: &str, repo: &str) -> String {
    format!("{}/actions", repo_path(owner, repo))
}

async fn list_workflows(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/workflows", actions_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list workflows")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_workflow_runs(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let path = match args.optional_string("workflow_id")? {
        Some(id) => format!(
            "{}/workflows/{}/runs",
            actions_path(&owner, &repo),
            crate::http::encode_path_segment(&id)
        ),
        None => format!("{}/runs", actions_path(&owner, &repo)),
    };
    let q = Query::new()
        .opt("actor", args.optional_string("actor")?)
        .opt("branch", args.optional_string("branch")?)
        .opt("event", args.optional_string("event")?)
        .opt("status", args.optional_string("status")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&path, q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list workflow runs")?;
    Ok(CallToolResult::json(&res.value))
}

async fn get_workflow_run(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let run_id = args.required_int("run_id")?;
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/runs/{}", actions_path(&owner, &repo), run_id), &[])
        .await
        .or_api_error(&ctx, "failed to get workflow run")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_workflow_jobs(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let run_id = args.required_int("run_id")?;
    let q = Query::new()
        .opt("filter", args.optional_string("filter")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/runs/{}/jobs", actions_path(&owner, &repo), run_id),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to list workflow jobs")?;
    Ok(CallToolResult::json(&res.value))
}

#[derive(Debug, Serialize)]
struct JobLogs {
    job_id: i64,
    logs: String,
    total_lines: usize,
    truncated: bool,
}

/// Log text from either a plain download or a zip archive; archive entries are
/// concatenated in name order.
fn decode_logs(bytes: &[u8]) -> Result<String, zip::result::ZipError> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries: Vec<(String, String)> = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        entries.push((file.name().to_string(), String::from_utf8_lossy(&buf).into_owned()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = String::new();
    for (_, text) in entries {
        out.push_str(&text);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

/// The last `n` lines of `text`, the total line count and whether any were dropped.
fn tail(text: &str, n: usize) -> (String, usize, bool) {
    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();
    let start = total.saturating_sub(n);
    (lines[start..].join("\n"), total, start > 0)
}

async fn get_job_logs(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let job_id = args.required_int("job_id")?;
    let tail_lines = args.optional_int_or("tail_lines", DEFAULT_TAIL_LINES)?;
    if tail_lines < 1 {
        return Err(crate::params::ParamError::invalid("tail_lines", "must be at least 1").into());
    }
    let res = ctx
        .client
        .get_bytes(&format!("{}/jobs/{}/logs", actions_path(&owner, &repo), job_id))
        .await
        .or_api_error(&ctx, "failed to get job logs")?;
    let text = decode_logs(&res.value)
        .map_err(|e| ToolError::failed(format!("failed to read log archive: {}", e)))?;
    let (logs, total_lines, truncated) = tail(&text, tail_lines as usize);
    Ok(CallToolResult::json(&JobLogs {
        job_id,
        logs,
        total_lines,
        truncated,
    }))
}

async fn run_action(ctx: &RequestContext, args: &Args, action: &str) -> Result<i64, ToolError> {
    let (owner, repo) = owner_repo(args)?;
    let run_id = args.required_int("run_id")?;
    ctx.client
        .send_empty::<Value>(
            Method::POST,
            &format!("{}/runs/{}/{}", actions_path(&owner, &repo), run_id, action),
            None,
        )
        .await
        .or_api_error(ctx, &format!("failed to {} workflow run", action))?;
    Ok(run_id)
}

async fn rerun_workflow_run(ctx: RequestContext, args: Args) -> ToolResult {
    let run_id = run_action(&ctx, &args, "rerun").await?;
    Ok(CallToolResult::json(&json!({
        "message": "Workflow run has been queued for re-run",
        "run_id": run_id,
    })))
}

async fn cancel_workflow_run(ctx: RequestContext, args: Args) -> ToolResult {
    let run_id = run_action(&ctx, &args, "cancel").await?;
    Ok(CallToolResult::json(&json!({
        "message": "Workflow run has been cancelled",
        "run_id": run_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    #[test]
    fn tail_keeps_last_lines() {
        let (out, total, truncated) = tail("a\nb\nc\nd\n", 2);
        assert_eq!(out, "c\nd");
        assert_eq!(total, 4);
        assert!(truncated);
        let (out, _, truncated) = tail("a\nb", 10);
        assert_eq!(out, "a\nb");
        assert!(!truncated);
    }

    #[test]
    fn plain_logs_pass_through() {
        assert_eq!(decode_logs(b"step 1\nstep 2").unwrap(), "step 1\nstep 2");
    }

    #[test]
    fn zipped_logs_are_concatenated_in_name_order() {
        let mut bytes = Vec::new();
        {
            let mut w = zip::ZipWriter::new(Cursor::new(&mut bytes));
            w.start_file("2_test.txt", FileOptions::default()).unwrap();
            w.write_all(b"tests passed").unwrap();
            w.start_file("1_build.txt", FileOptions::default()).unwrap();
            w.write_all(b"built\n").unwrap();
            w.finish().unwrap();
        }
        let text = decode_logs(&bytes).unwrap();
        assert_eq!(text, "built\ntests passed\n");
    }
}
