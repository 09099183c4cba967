use super::{owner_repo, repo_path, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::http::encode_path_segment;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolResult};
use crate::translations::Translator;
use serde_json::Value;

const SEVERITY: ParamType = ParamType::Enum(&["unknown", "low", "medium", "high", "critical"]);
const DIRECTION: ParamType = ParamType::Enum(&["asc", "desc"]);
const SORT: ParamType = ParamType::Enum(&["created", "updated", "published"]);
const STATE: ParamType = ParamType::Enum(&["triage", "draft", "published", "closed"]);

fn repo_listing_filters(s: Schema) -> Schema {
    s.optional("direction", DIRECTION, "Sort direction.")
        .optional("sort", SORT, "Sort field.")
        .optional("state", STATE, "Filter by advisory state.")
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "list_global_security_advisories",
            Category::SecurityAdvisories,
            Access::Read,
            Schema::new()
                .optional("ghsaId", ParamType::String, "Filter by GitHub Security Advisory ID (format: GHSA-xxxx-xxxx-xxxx).")
                .optional("type", ParamType::Enum(&["reviewed", "malware", "unreviewed"]), "Advisory type. Defaults to reviewed.")
                .optional("cveId", ParamType::String, "Filter by CVE ID.")
                .optional("ecosystem", ParamType::String, "Filter by package ecosystem.")
                .optional("severity", SEVERITY, "Filter by severity.")
                .optional("cwes", ParamType::StringArray, "Filter by Common Weakness Enumeration IDs (e.g. [\"79\", \"284\", \"22\"]).")
                .optional("isWithdrawn", ParamType::Boolean, "Whether to only return withdrawn advisories.")
                .optional("affects", ParamType::String, "Filter advisories by affected package or version (e.g. \"package1,package2@1.0.0\").")
                .optional("published", ParamType::String, "Filter by publish date or date range (ISO 8601 date or range).")
                .optional("updated", ParamType::String, "Filter by update date or date range (ISO 8601 date or range).")
                .optional("modified", ParamType::String, "Filter by publish or update date or date range (ISO 8601 date or range).")
                .build(),
            list_global_security_advisories,
        )
        .describe(
            t,
            "List global security advisories",
            "List global security advisories from GitHub.",
        ),
        Tool::new(
            "get_global_security_advisory",
            Category::SecurityAdvisories,
            Access::Read,
            Schema::new()
                .required("ghsaId", ParamType::String, "GitHub Security Advisory ID (format: GHSA-xxxx-xxxx-xxxx).")
                .build(),
            get_global_security_advisory,
        )
        .describe(
            t,
            "Get a global security advisory",
            "Get a global security advisory",
        ),
        Tool::new(
            "list_repository_security_advisories",
            Category::SecurityAdvisories,
            Access::Read,
            repo_listing_filters(Schema::new().owner_repo()).build(),
            list_repository_security_advisories,
        )
        .describe(
            t,
            "List repository security advisories",
            "List repository security advisories for a GitHub repository.",
        ),
        Tool::new(
            "list_org_repository_security_advisories",
            Category::SecurityAdvisories,
            Access::Read,
            repo_listing_filters(
                Schema::new().required("org", ParamType::String, "The organization login."),
            )
            .build(),
            list_org_repository_security_advisories,
        )
        .describe(
            t,
            "List org repository security advisories",
            "List repository security advisories for a GitHub organization.",
        ),
    ]
}

fn global_query(args: &Args) -> Result<Query, crate::params::ParamError> {
    let cwes = args.optional_string_array("cwes")?;
    let withdrawn = args.optional::<bool>("isWithdrawn")?;
    Ok(Query::new()
        .opt("ghsa_id", args.optional_string("ghsaId")?)
        .set("type", args.optional_string("type")?.unwrap_or_else(|| "reviewed".into()))
        .opt("cve_id", args.optional_string("cveId")?)
        .opt("ecosystem", args.optional_string("ecosystem")?)
        .opt("severity", args.optional_string("severity")?)
        .opt("cwes", (!cwes.is_empty()).then(|| cwes.join(",")))
        .opt("is_withdrawn", withdrawn)
        .opt("affects", args.optional_string("affects")?)
        .opt("published", args.optional_string("published")?)
        .opt("updated", args.optional_string("updated")?)
        .opt("modified", args.optional_string("modified")?))
}

fn repo_listing_query(args: &Args) -> Result<Query, crate::params::ParamError> {
    Ok(Query::new()
        .opt("direction", args.optional_string("direction")?)
        .opt("sort", args.optional_string("sort")?)
        .opt("state", args.optional_string("state")?))
}

async fn list_global_security_advisories(ctx: RequestContext, args: Args) -> ToolResult {
    let q = global_query(&args)?;
    let res = ctx
        .client
        .get_json::<Value>("/advisories", q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list global security advisories")?;
    Ok(CallToolResult::json(&res.value))
}

async fn get_global_security_advisory(ctx: RequestContext, args: Args) -> ToolResult {
    let id: String = args.required("ghsaId")?;
    let res = ctx
        .client
        .get_json::<Value>(&format!("/advisories/{}", encode_path_segment(&id)), &[])
        .await
        .or_api_error(&ctx, "failed to get advisory")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_repository_security_advisories(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = repo_listing_query(&args)?;
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/security-advisories", repo_path(&owner, &repo)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to list repository security advisories")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_org_repository_security_advisories(ctx: RequestContext, args: Args) -> ToolResult {
    let org: String = args.required("org")?;
    let q = repo_listing_query(&args)?;
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("/orgs/{}/security-advisories", encode_path_segment(&org)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to list organization repository security advisories")?;
    Ok(CallToolResult::json(&res.value))
}
