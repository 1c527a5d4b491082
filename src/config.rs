use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::util::{split_list, SecretString};

/// Environment variable holding the comma-separated target language codes
pub const LANGS_ENV: &str = "LANGS";

/// Placeholder in `translate.target_root` replaced by the language code
pub const LANG_PLACEHOLDER: &str = "{lang}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub git: GitConfig,

    /// Filled from the environment, never from the config file
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Target language codes. `LANGS` replaces this list when set.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Directory prefix of the source-language documents (default: "content/en/")
    #[serde(default = "default_source_root")]
    pub source_root: String,

    /// Output prefix template; `{lang}` expands to the language code
    /// (default: "content/{lang}/")
    #[serde(default = "default_target_root")]
    pub target_root: String,

    /// Only files with this suffix are translated (default: ".md")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Commit subject that marks an automated translation commit
    #[serde(default = "default_skip_subject")]
    pub skip_subject: String,

    /// "fail-fast" (default) or "collect"
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Human-readable labels used in the prompt, keyed by language code.
    /// Codes not listed here are passed to the model verbatim.
    #[serde(default = "default_labels")]
    pub labels: BTreeMap<String, String>,
}

fn default_source_root() -> String {
    "content/en/".to_string()
}

fn default_target_root() -> String {
    format!("content/{}/", LANG_PLACEHOLDER)
}

fn default_extension() -> String {
    ".md".to_string()
}

fn default_skip_subject() -> String {
    "Auto-translate content".to_string()
}

fn default_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("en".to_string(), "English Version".to_string()),
        ("es".to_string(), "Spanish Version".to_string()),
    ])
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            source_root: default_source_root(),
            target_root: default_target_root(),
            extension: default_extension(),
            skip_subject: default_skip_subject(),
            failure_policy: FailurePolicy::default(),
            labels: default_labels(),
        }
    }
}

impl TranslateConfig {
    /// Expand the target root template for one language
    pub fn target_root_for(&self, lang: &str) -> String {
        self.target_root.replace(LANG_PLACEHOLDER, lang)
    }
}

/// What the orchestrator does when one translation task fails for good
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the joint wait on the first failure, dropping in-flight siblings
    #[default]
    FailFast,
    /// Let every task finish, then report all failures together
    Collect,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::Collect => "collect",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "abort" => Ok(FailurePolicy::FailFast),
            "collect" | "collect-all" => Ok(FailurePolicy::Collect),
            _ => bail!(
                "Unknown failure policy: {}. Valid options: fail-fast, collect",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Total attempts per completion, first try included (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Per-HTTP-request timeout in seconds (default: 120)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub zhipuai: ZhipuaiConfig,
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

fn default_max_attempts() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
            zhipuai: ZhipuaiConfig::default(),
            openai: OpenAIConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// Poll-based backend, selected when its credential is present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZhipuaiConfig {
    #[serde(default = "default_zhipuai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_zhipuai_model")]
    pub model: String,
    #[serde(default = "default_zhipuai_base_url")]
    pub base_url: String,

    /// Delay between job status checks in milliseconds (default: 500)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up on a job that has not finished after this many seconds (default: 600)
    #[serde(default = "default_poll_max_wait")]
    pub poll_max_wait_secs: u64,
}

fn default_zhipuai_key_env() -> String {
    "ZHIPUAI_API_KEY".to_string()
}

fn default_zhipuai_model() -> String {
    "glm-4-flash".to_string()
}

fn default_zhipuai_base_url() -> String {
    "https://open.bigmodel.cn/api/paas/v4".to_string()
}

fn default_poll_interval() -> u64 {
    500
}

fn default_poll_max_wait() -> u64 {
    600
}

impl Default for ZhipuaiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_zhipuai_key_env(),
            model: default_zhipuai_model(),
            base_url: default_zhipuai_base_url(),
            poll_interval_ms: default_poll_interval(),
            poll_max_wait_secs: default_poll_max_wait(),
        }
    }
}

impl ZhipuaiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_max_wait(&self) -> Duration {
        Duration::from_secs(self.poll_max_wait_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gpt_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_gpt_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_gpt_model(),
            base_url: default_openai_base_url(),
        }
    }
}

/// Credential-free OpenAI-compatible aggregator (g4f interference API by default)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_gpt_model")]
    pub model: String,
    #[serde(default = "default_fallback_base_url")]
    pub base_url: String,
}

fn default_fallback_base_url() -> String {
    "http://localhost:1337/v1".to_string()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            model: default_gpt_model(),
            base_url: default_fallback_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Timeout for each git invocation in seconds (default: 30)
    #[serde(default = "default_git_timeout")]
    pub timeout_secs: u64,
}

fn default_git_timeout() -> u64 {
    30
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_git_timeout(),
        }
    }
}

/// Provider credentials. Empty values count as absent.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub zhipuai: Option<SecretString>,
    pub openai: Option<SecretString>,
}

fn non_empty_secret(value: Option<String>) -> Option<SecretString> {
    value
        .map(SecretString::from)
        .filter(|secret| !secret.is_empty())
}

impl Config {
    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path));
        }

        let mut candidates = vec![PathBuf::from("doc-translate.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("doc-translate").join("config.toml"));
        }
        Self::load_first_existing(&candidates)
    }

    /// Load the first candidate that exists. A missing file falls through to the
    /// next one; a file that exists but cannot be read or parsed is an error.
    fn load_first_existing(candidates: &[PathBuf]) -> Result<Self> {
        for path in candidates {
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()))
                }
            };
            let config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            debug!("Loaded config from {}", path.display());
            return Ok(config);
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `LANGS` and the provider credential variables from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| env::var(name).ok());
    }

    /// Same as [`Config::apply_env`] with an injectable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(langs) = lookup(LANGS_ENV) {
            let langs = split_list(&langs);
            if !langs.is_empty() {
                debug!("Target languages from {}: {:?}", LANGS_ENV, langs);
                self.translate.languages = langs;
            }
        }

        self.credentials = Credentials {
            zhipuai: non_empty_secret(lookup(&self.llm.zhipuai.api_key_env)),
            openai: non_empty_secret(lookup(&self.llm.openai.api_key_env)),
        };
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.translate.languages.is_empty() {
            bail!(
                "No target languages configured. \
                 Set {} (e.g. LANGS=es,fr) or translate.languages",
                LANGS_ENV
            );
        }
        if self.translate.source_root.is_empty() {
            bail!("translate.source_root must not be empty");
        }
        if self.llm.max_attempts == 0 {
            bail!("llm.max_attempts must be at least 1");
        }

        // Without the placeholder every language would write the same output path
        if self.translate.languages.len() > 1
            && !self.translate.target_root.contains(LANG_PLACEHOLDER)
        {
            bail!(
                "translate.target_root \"{}\" has no {} placeholder \
                 but {} languages are configured",
                self.translate.target_root,
                LANG_PLACEHOLDER,
                self.translate.languages.len()
            );
        }

        for language in &self.translate.languages {
            let target_root = self.translate.target_root_for(language);
            if target_root == self.translate.source_root {
                bail!(
                    "translate.target_root for \"{}\" expands to the source root ({}); \
                     output would overwrite the source",
                    language,
                    target_root
                );
            }
        }
        Ok(())
    }
}
