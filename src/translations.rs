use anyhow::Context;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TRANSLATIONS_FILE: &str = "github-mcp-server-config.json";
const ENV_PREFIX: &str = "GITHUB_MCP_";

#[derive(Debug, Default)]
pub struct Translator {
    overrides: HashMap<String, String>,
    env: bool,
    used: Mutex<BTreeMap<String, String>>,
}

impl Translator {
    /// Load overrides from `dir/github-mcp-server-config.json` when present and
    /// consult the environment on every lookup.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(TRANSLATIONS_FILE);
        let overrides = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let map: HashMap<String, String> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            debug!("loaded {} translation overrides", map.len());
            map
        } else {
            HashMap::new()
        };
        Ok(Self {
            overrides,
            env: true,
            used: Mutex::new(BTreeMap::new()),
        })
    }

    /// Fixed overrides only, no environment lookups.
    pub fn with_overrides<I: IntoIterator<Item = (String, String)>>(overrides: I) -> Self {
        Self {
            overrides: overrides.into_iter().collect(),
            env: false,
            used: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn translate(&self, key: &str, default: &str) -> String {
        let key = key.to_uppercase();
        let value = self
            .env
            .then(|| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
            .flatten()
            .or_else(|| self.overrides.get(&key).cloned())
            .unwrap_or_else(|| default.to_string());
        let mut used = self.used.lock().unwrap_or_else(|p| p.into_inner());
        used.insert(key, value.clone());
        value
    }

    /// Every key looked up so far with the value it resolved to.
    pub fn used(&self) -> BTreeMap<String, String> {
        self.used.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Write every key used so far to `dir/github-mcp-server-config.json`.
    pub fn export(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join(TRANSLATIONS_FILE);
        let body = serde_json::to_string_pretty(&self.used())?;
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        info!("exported translations to {}", path.display());
        Ok(path)
    }
}
