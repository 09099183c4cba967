use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing GitHub token: set GITHUB_PERSONAL_ACCESS_TOKEN, GITHUB_TOKEN or GH_TOKEN")]
    MissingToken,
    #[error("invalid GitHub host {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime configuration for the server and its GitHub clients.
///
/// Layering, lowest to highest precedence: defaults, TOML file, environment,
/// command-line flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub host: Option<String>,
    pub api_url: String,
    pub graphql_url: String,
    pub raw_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub read_only: bool,
    pub toolsets: Vec<String>,
    pub dynamic_toolsets: bool,
    pub export_translations: bool,
    pub content_filter_trusted_repo: Option<String>,
    pub disable_sanitization: bool,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let endpoints = Endpoints::github_com();
        Self {
            token: String::new(),
            host: None,
            api_url: endpoints.api_url,
            graphql_url: endpoints.graphql_url,
            raw_url: endpoints.raw_url,
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: format!("github-mcp-server/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_only: false,
            toolsets: vec!["all".to_string()],
            dynamic_toolsets: false,
            export_translations: false,
            content_filter_trusted_repo: None,
            disable_sanitization: false,
            log_level: None,
        }
    }
}

/// Values from the optional TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub token: Option<String>,
    pub host: Option<String>,
    pub api_url: Option<String>,
    pub graphql_url: Option<String>,
    pub raw_url: Option<String>,
    pub api_version: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub read_only: Option<bool>,
    pub toolsets: Option<Vec<String>>,
    pub dynamic_toolsets: Option<bool>,
    pub content_filter_trusted_repo: Option<String>,
    pub disable_sanitization: Option<bool>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Command-line overrides. `None` means "flag not given".
#[derive(Debug, Default, Clone)]
pub struct FlagOverrides {
    pub config_path: Option<PathBuf>,
    pub token: Option<String>,
    pub host: Option<String>,
    pub read_only: Option<bool>,
    pub toolsets: Option<Vec<String>>,
    pub dynamic_toolsets: Option<bool>,
    pub export_translations: bool,
    pub content_filter_trusted_repo: Option<String>,
    pub disable_sanitization: Option<bool>,
    pub log_level: Option<String>,
}

/// Intermediate layer where every layer writes the keys it knows about.
#[derive(Debug, Default)]
struct Layered {
    token: Option<String>,
    host: Option<String>,
    api_url: Option<String>,
    graphql_url: Option<String>,
    raw_url: Option<String>,
    api_version: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    read_only: Option<bool>,
    toolsets: Option<Vec<String>>,
    dynamic_toolsets: Option<bool>,
    content_filter_trusted_repo: Option<String>,
    disable_sanitization: Option<bool>,
    log_level: Option<String>,
}

impl Layered {
    fn apply_file(&mut self, f: FileConfig) {
        overlay(&mut self.token, f.token);
        overlay(&mut self.host, f.host);
        overlay(&mut self.api_url, f.api_url);
        overlay(&mut self.graphql_url, f.graphql_url);
        overlay(&mut self.raw_url, f.raw_url);
        overlay(&mut self.api_version, f.api_version);
        overlay(&mut self.user_agent, f.user_agent);
        overlay(&mut self.timeout_secs, f.timeout_secs);
        overlay(&mut self.read_only, f.read_only);
        overlay(&mut self.toolsets, f.toolsets);
        overlay(&mut self.dynamic_toolsets, f.dynamic_toolsets);
        overlay(
            &mut self.content_filter_trusted_repo,
            f.content_filter_trusted_repo,
        );
        overlay(&mut self.disable_sanitization, f.disable_sanitization);
        overlay(&mut self.log_level, f.log_level);
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(t) = get("GITHUB_PERSONAL_ACCESS_TOKEN")
            .or_else(|| get("GITHUB_TOKEN"))
            .or_else(|| get("GH_TOKEN"))
        {
            self.token = Some(t);
        }
        if let Some(v) = get("GITHUB_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = get("GITHUB_API_URL") {
            self.api_url = Some(v);
        }
        if let Some(v) = get("GITHUB_GRAPHQL_URL") {
            self.graphql_url = Some(v);
        }
        if let Some(v) = get("GITHUB_RAW_URL") {
            self.raw_url = Some(v);
        }
        if let Some(v) = get("GITHUB_API_VERSION") {
            self.api_version = Some(v);
        }
        if let Some(v) = get("GITHUB_USER_AGENT") {
            self.user_agent = Some(v);
        }
        if let Some(v) = get("GITHUB_HTTP_TIMEOUT_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "GITHUB_HTTP_TIMEOUT_SECS",
                value: v.clone(),
            })?;
            self.timeout_secs = Some(secs);
        }
        if let Some(v) = get("GITHUB_READ_ONLY") {
            self.read_only = Some(parse_bool("GITHUB_READ_ONLY", &v)?);
        }
        if let Some(v) = get("GITHUB_TOOLSETS") {
            self.toolsets = Some(split_list(&v));
        }
        if let Some(v) = get("GITHUB_DYNAMIC_TOOLSETS") {
            self.dynamic_toolsets = Some(parse_bool("GITHUB_DYNAMIC_TOOLSETS", &v)?);
        }
        if let Some(v) = get("GITHUB_CONTENT_FILTER_TRUSTED_REPO") {
            self.content_filter_trusted_repo = Some(v);
        }
        if let Some(v) = get("GITHUB_DISABLE_CONTENT_SANITIZATION") {
            self.disable_sanitization =
                Some(parse_bool("GITHUB_DISABLE_CONTENT_SANITIZATION", &v)?);
        }
        Ok(())
    }

    fn apply_flags(&mut self, flags: &FlagOverrides) {
        overlay(&mut self.token, flags.token.clone());
        overlay(&mut self.host, flags.host.clone());
        overlay(&mut self.read_only, flags.read_only);
        overlay(&mut self.toolsets, flags.toolsets.clone());
        overlay(&mut self.dynamic_toolsets, flags.dynamic_toolsets);
        overlay(
            &mut self.content_filter_trusted_repo,
            flags.content_filter_trusted_repo.clone(),
        );
        overlay(&mut self.disable_sanitization, flags.disable_sanitization);
        overlay(&mut self.log_level, flags.log_level.clone());
    }
}

fn overlay<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

impl Config {
    /// Load configuration from the process environment and the given flags.
    pub fn load(flags: &FlagOverrides) -> Result<Self, ConfigError> {
        let file_path = flags
            .config_path
            .clone()
            .or_else(|| env::var_os("GITHUB_MCP_CONFIG").map(PathBuf::from));
        let file = match file_path {
            Some(p) => Some(FileConfig::load(&p)?),
            None => None,
        };
        Self::resolve(file, |k| env::var(k).ok(), flags)
    }

    /// Merge the three layers. Split out from `load` so the precedence rules can be
    /// exercised without touching the process environment.
    pub fn resolve<F>(
        file: Option<FileConfig>,
        env_lookup: F,
        flags: &FlagOverrides,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layered = Layered::default();
        if let Some(f) = file {
            layered.apply_file(f);
        }
        layered.apply_env(env_lookup)?;
        layered.apply_flags(flags);

        let defaults = Config::default();
        let endpoints = match layered.host.as_deref() {
            Some(h) => Endpoints::from_host(h)?,
            None => Endpoints::github_com(),
        };
        let token = layered.token.unwrap_or_default();
        if token.trim().is_empty() && !flags.export_translations {
            return Err(ConfigError::MissingToken);
        }

        Ok(Self {
            token,
            host: layered.host,
            api_url: trim_url(layered.api_url.unwrap_or(endpoints.api_url)),
            graphql_url: layered.graphql_url.unwrap_or(endpoints.graphql_url),
            raw_url: trim_url(layered.raw_url.unwrap_or(endpoints.raw_url)),
            api_version: layered.api_version.unwrap_or(defaults.api_version),
            user_agent: layered.user_agent.unwrap_or(defaults.user_agent),
            timeout_secs: layered.timeout_secs.unwrap_or(defaults.timeout_secs),
            read_only: layered.read_only.unwrap_or(false),
            toolsets: layered
                .toolsets
                .filter(|t| !t.is_empty())
                .unwrap_or(defaults.toolsets),
            dynamic_toolsets: layered.dynamic_toolsets.unwrap_or(false),
            export_translations: flags.export_translations,
            content_filter_trusted_repo: layered
                .content_filter_trusted_repo
                .filter(|r| !r.trim().is_empty()),
            disable_sanitization: layered.disable_sanitization.unwrap_or(false),
            log_level: layered.log_level,
        })
    }
}

/// Resolved base URLs for the three GitHub transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_url: String,
    pub graphql_url: String,
    pub raw_url: String,
}

impl Endpoints {
    pub fn github_com() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            graphql_url: "https://api.github.com/graphql".into(),
            raw_url: "https://raw.githubusercontent.com".into(),
        }
    }

    /// Derive endpoints from a `--gh-host` value. GHEC tenants (`*.ghe.com`) use an
    /// `api.` subdomain; anything else is treated as GitHub Enterprise Server.
    pub fn from_host(host: &str) -> Result<Self, ConfigError> {
        let with_scheme = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let parsed = url::Url::parse(&with_scheme).map_err(|source| ConfigError::InvalidHost {
            host: host.to_string(),
            source,
        })?;
        let hostname = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let scheme = parsed.scheme();
        let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

        if hostname == "github.com" || hostname == "api.github.com" {
            return Ok(Self::github_com());
        }
        if hostname.ends_with(".ghe.com") {
            let api = format!("{}://api.{}{}", scheme, hostname, port);
            return Ok(Self {
                graphql_url: format!("{}/graphql", api),
                raw_url: format!("{}://raw.{}{}", scheme, hostname, port),
                api_url: api,
            });
        }
        let base = format!("{}://{}{}", scheme, hostname, port);
        Ok(Self {
            api_url: format!("{}/api/v3", base),
            graphql_url: format!("{}/api/graphql", base),
            raw_url: format!("{}/raw", base),
        })
    }
}

fn trim_url(s: String) -> String {
    s.trim_end_matches('/').to_string()
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: v.to_string(),
        }),
    }
}

pub fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
