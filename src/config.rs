use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub github: GithubConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    pub org: String,
    pub project_number: u64,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

fn default_api_url() -> String {
    "https://api.github.com/graphql".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_prefix() -> String {
    "project".to_string()
}

impl GithubConfig {
    /// Read the API credential from the configured environment variable.
    pub fn token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("{} environment variable not set", self.token_env))?;
        if token.trim().is_empty() {
            anyhow::bail!("{} environment variable is empty", self.token_env);
        }
        Ok(token)
    }
}

impl Config {
    /// Config used when no file is available (e.g. `report --file`).
    pub fn minimal() -> Self {
        Self {
            github: GithubConfig {
                org: String::new(),
                project_number: 0,
                api_url: default_api_url(),
                token_env: default_token_env(),
                page_size: default_page_size(),
                timeout_secs: default_timeout_secs(),
                max_retries: 0,
            },
            output: OutputConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    tracing::debug!(path = %path.display(), org = %config.github.org, "loaded config");
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate github
    if config.github.org.trim().is_empty() {
        anyhow::bail!("github.org must not be empty");
    }

    if config.github.project_number == 0 {
        anyhow::bail!("github.project_number must be > 0");
    }

    if !(1..=100).contains(&config.github.page_size) {
        anyhow::bail!("github.page_size must be in [1, 100]");
    }

    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }

    if config.github.token_env.trim().is_empty() {
        anyhow::bail!("github.token_env must name an environment variable");
    }

    // Validate output
    if config.output.prefix.trim().is_empty() {
        anyhow::bail!("output.prefix must not be empty");
    }

    Ok(config)
}
