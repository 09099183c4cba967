use crate::config::{split_list, FlagOverrides};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// What the process was asked to do, besides serving.
#[derive(Debug, Default)]
pub struct CliOptions {
    pub flags: FlagOverrides,
    pub version: bool,
    pub generate_docs: bool,
}

pub fn build_cli() -> Command {
    Command::new("github-mcp-server")
        .about("GitHub MCP server (stdio JSON-RPC)")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .long("config")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML config file (default: $GITHUB_MCP_CONFIG)"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .num_args(1)
                .help("GitHub token (default: $GITHUB_PERSONAL_ACCESS_TOKEN)"),
        )
        .arg(
            Arg::new("gh-host")
                .long("gh-host")
                .visible_alias("host")
                .num_args(1)
                .help("GitHub Enterprise host, e.g. https://ghe.example.com or https://acme.ghe.com"),
        )
        .arg(
            Arg::new("toolsets")
                .long("toolsets")
                .num_args(1)
                .help("Comma-separated toolsets to enable, or \"all\""),
        )
        .arg(
            Arg::new("read-only")
                .long("read-only")
                .action(ArgAction::SetTrue)
                .help("Register read-only tools only"),
        )
        .arg(
            Arg::new("dynamic-toolsets")
                .long("dynamic-toolsets")
                .action(ArgAction::SetTrue)
                .help("Start with toolset discovery only and enable toolsets on demand"),
        )
        .arg(
            Arg::new("content-filter-trusted-repo")
                .long("content-filter-trusted-repo")
                .num_args(1)
                .help("owner/repo whose push-access collaborators are the only trusted authors"),
        )
        .arg(
            Arg::new("disable-content-sanitization")
                .long("disable-content-sanitization")
                .action(ArgAction::SetTrue)
                .help("Return user-written text without sanitizing it"),
        )
        .arg(
            Arg::new("export-translations")
                .long("export-translations")
                .action(ArgAction::SetTrue)
                .help("Write every translatable string to github-mcp-server-config.json and exit"),
        )
        .arg(
            Arg::new("generate-docs")
                .long("generate-docs")
                .action(ArgAction::SetTrue)
                .help("Print the Markdown tool catalog and exit"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

fn set(m: &ArgMatches, id: &str) -> Option<bool> {
    m.get_flag(id).then_some(true)
}

pub fn options(m: &ArgMatches) -> CliOptions {
    let flags = FlagOverrides {
        config_path: m.get_one::<PathBuf>("config").cloned(),
        token: m.get_one::<String>("token").cloned(),
        host: m.get_one::<String>("gh-host").cloned(),
        read_only: set(m, "read-only"),
        toolsets: m.get_one::<String>("toolsets").map(|s| split_list(s)),
        dynamic_toolsets: set(m, "dynamic-toolsets"),
        // Docs are rendered without talking to GitHub, so no token is needed.
        export_translations: m.get_flag("export-translations") || m.get_flag("generate-docs"),
        content_filter_trusted_repo: m.get_one::<String>("content-filter-trusted-repo").cloned(),
        disable_sanitization: set(m, "disable-content-sanitization"),
        log_level: m.get_one::<String>("log-level").cloned(),
    };
    CliOptions {
        flags,
        version: m.get_flag("version"),
        generate_docs: m.get_flag("generate-docs"),
    }
}

/// Logs go to stderr; stdout carries the protocol.
pub fn init_logging(level: Option<&str>) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.target(env_logger::Target::Stderr).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        let m = build_cli().try_get_matches_from(args).unwrap();
        options(&m)
    }

    #[test]
    fn absent_flags_leave_lower_layers_alone() {
        let o = parse(&["github-mcp-server"]);
        assert!(o.flags.read_only.is_none());
        assert!(o.flags.toolsets.is_none());
        assert!(!o.flags.export_translations);
        assert!(!o.version);
    }

    #[test]
    fn flags_are_collected() {
        let o = parse(&[
            "github-mcp-server",
            "--toolsets",
            "repos, issues",
            "--read-only",
            "--host",
            "https://ghe.example.com",
            "--log-level",
            "debug",
        ]);
        assert_eq!(o.flags.toolsets, Some(vec!["repos".to_string(), "issues".to_string()]));
        assert_eq!(o.flags.read_only, Some(true));
        assert_eq!(o.flags.host.as_deref(), Some("https://ghe.example.com"));
        assert_eq!(o.flags.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn generate_docs_does_not_need_a_token() {
        let o = parse(&["github-mcp-server", "--generate-docs"]);
        assert!(o.generate_docs);
        assert!(o.flags.export_translations);
    }
}
