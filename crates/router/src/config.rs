//! Configuration for the router.
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Environment overrides for the decision source

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use switchyard_llm::LlmConfig;
use switchyard_specialists::SpecialistConfig;
use switchyard_specialists::registry::END_ALIASES;
use tracing::warn;

/// Main router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Decision source used by the supervisor, the validator and LLM specialists
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub limits: LoopLimits,

    /// Specialist used when the supervisor names an unknown id before any dispatch
    #[serde(default = "default_fallback_specialist")]
    pub fallback_specialist: String,

    /// Give the validator the whole transcript instead of request + last result
    #[serde(default)]
    pub validator_full_history: bool,

    #[serde(default)]
    pub prompts: PromptConfig,

    #[serde(default = "default_specialists")]
    pub specialists: Vec<SpecialistConfig>,
}

/// Termination and timeout limits for the routing loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopLimits {
    /// Global supervisor/validator round budget
    pub max_iterations: u32,
    /// Dispatches allowed per specialist before validation is forced
    pub visit_cap: u32,
    /// Extra attempts after a decode failure at the same step
    pub decode_retries: u32,
    pub oracle_timeout_ms: u64,
    pub specialist_timeout_ms: u64,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            visit_cap: 2,
            decode_retries: 1,
            oracle_timeout_ms: 60_000,
            specialist_timeout_ms: 120_000,
        }
    }
}

/// Optional replacements for the built-in prompt preambles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
}

fn default_fallback_specialist() -> String {
    "other".into()
}

fn default_specialists() -> Vec<SpecialistConfig> {
    vec![
        SpecialistConfig::http(
            "domain-lookup",
            "Domain registration status, owner, filing and expiry information",
            "http://127.0.0.1:10025/lookup",
        ),
        SpecialistConfig::http(
            "metrics-query",
            "Traffic, QPS, bandwidth and log statistics for a domain",
            "http://127.0.0.1:10026/query",
        ),
        SpecialistConfig::llm(
            "creative-other",
            "Jokes, couplets, travel suggestions and other light requests",
            "You are a friendly assistant. Answer the user's request briefly.",
        ),
        SpecialistConfig::static_reply(
            "other",
            "Anything the other specialists cannot handle",
            "Sorry, I can only help with domain information, traffic metrics and light creative requests.",
        ),
    ]
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            limits: LoopLimits::default(),
            fallback_specialist: default_fallback_specialist(),
            validator_full_history: false,
            prompts: PromptConfig::default(),
            specialists: default_specialists(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix systems the file must be a regular file, must not be
    /// world-writable, and must not be world-readable if it holds an API key.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.llm.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. For better security, \
                 use environment variables instead (SWITCHYARD_LLM_API_KEY, DEEPSEEK_API_KEY).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `SWITCHYARD_LLM_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("SWITCHYARD_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = get("SWITCHYARD_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = get("SWITCHYARD_LLM_BASE_URL") {
            self.llm.api_url = Some(url);
        }
        if let Some(key) = get("SWITCHYARD_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }

    /// Check the settings the routing loop relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.max_iterations == 0 {
            anyhow::bail!("limits.max_iterations must be at least 1");
        }
        if self.limits.oracle_timeout_ms == 0 || self.limits.specialist_timeout_ms == 0 {
            anyhow::bail!("limits timeouts must be greater than zero");
        }

        let mut seen = HashSet::new();
        for specialist in &self.specialists {
            if specialist.id.trim().is_empty() {
                anyhow::bail!("specialist ids must not be empty");
            }
            if END_ALIASES.iter().any(|a| a.eq_ignore_ascii_case(&specialist.id)) {
                anyhow::bail!("'{}' is reserved for the end sentinel", specialist.id);
            }
            if !seen.insert(specialist.id.as_str()) {
                anyhow::bail!("duplicate specialist id '{}'", specialist.id);
            }
        }

        if !seen.contains(self.fallback_specialist.as_str()) {
            anyhow::bail!(
                "fallback specialist '{}' is not configured (known: {})",
                self.fallback_specialist,
                self.specialists
                    .iter()
                    .map(|s| s.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(())
    }
}

/// Validate config file permissions on Unix systems.
///
/// - File must be a regular file (not symlink, directory, etc.)
/// - File must not be world-writable
/// - If the file contains an API key, it must not be world-readable
#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_api_key = content.contains("api_key")
        && (content.contains("sk-") || content.contains("key ="));

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
