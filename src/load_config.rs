/// `load_config` module: merges the optional YAML settings file with the process
/// environment into [`Settings`].
///
/// This module is the only place where untrusted YAML and environment values are
/// turned into strongly-typed configuration.
///
/// # Responsibilities
/// - Parse the optional settings file (no secrets) into a typed struct
/// - Overlay environment variables, which always win over the file
/// - Read the access token from the environment only
/// - Produce clear diagnostics: a bad value names the key or variable it came from
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{error, info};

use hashnode_sync_core::config::SyncConfig;
use hashnode_sync_core::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

use crate::hashnode::{HashnodeConfig, DEFAULT_API_URL};

pub const DEFAULT_RAW_CONTENT_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings file schema. Every key is optional; env vars override them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    posts_directory: Option<PathBuf>,
    publication_host: Option<String>,
    api_url: Option<String>,
    raw_content_url: Option<String>,
    repository: Option<String>,
    git_ref: Option<String>,
    concurrency: Option<usize>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    run_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Fully merged run settings.
#[derive(Clone, PartialEq)]
pub struct Settings {
    pub posts_directory: PathBuf,
    pub publication_host: String,
    pub api_url: String,
    pub raw_content_url: String,
    pub repository: String,
    pub git_ref: String,
    pub access_token: String,
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub run_timeout: Duration,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("posts_directory", &self.posts_directory)
            .field("publication_host", &self.publication_host)
            .field("api_url", &self.api_url)
            .field("raw_content_url", &self.raw_content_url)
            .field("repository", &self.repository)
            .field("git_ref", &self.git_ref)
            .field("access_token", &"<redacted>")
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("run_timeout", &self.run_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Settings {
    /// Engine configuration for a checkout at `repo_root`.
    pub fn sync_config(&self, repo_root: &Path) -> SyncConfig {
        let resolver = hashnode_sync_core::assets::AssetResolver::for_repository(
            &self.raw_content_url,
            &self.repository,
            &self.git_ref,
        );
        SyncConfig {
            repo_root: repo_root.to_path_buf(),
            posts_root: self.posts_directory.clone(),
            raw_base_url: resolver.base_url().to_string(),
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: self.retry_backoff,
            },
            run_timeout: self.run_timeout,
        }
    }

    pub fn client_config(&self) -> HashnodeConfig {
        HashnodeConfig {
            api_url: self.api_url.clone(),
            access_token: self.access_token.clone(),
            publication_host: self.publication_host.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Load settings from the optional YAML file at `path` and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], reading variables through `env` instead of the process environment.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => {
            info!("No config file given; using environment only");
            FileConfig::default()
        }
    };
    let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let access_token = lookup("ACCESS_TOKEN").ok_or_else(|| {
        error!("ACCESS_TOKEN environment variable not set");
        anyhow!("ACCESS_TOKEN environment variable not set")
    })?;

    let settings = Settings {
        posts_directory: lookup("POSTS_DIRECTORY")
            .map(PathBuf::from)
            .or(file.posts_directory)
            .unwrap_or_default(),
        publication_host: required(lookup("PUBLICATION_HOST"), file.publication_host, "PUBLICATION_HOST")?,
        api_url: lookup("HASHNODE_API_URL")
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        raw_content_url: lookup("GITHUB_RAW_URL")
            .or(file.raw_content_url)
            .unwrap_or_else(|| DEFAULT_RAW_CONTENT_URL.to_string()),
        repository: required(lookup("GITHUB_REPOSITORY"), file.repository, "GITHUB_REPOSITORY")?,
        git_ref: required(lookup("GITHUB_REF"), file.git_ref, "GITHUB_REF")?,
        access_token,
        concurrency: number(&lookup, "HASHNODE_SYNC_CONCURRENCY", file.concurrency)?
            .unwrap_or(DEFAULT_CONCURRENCY),
        max_retries: number(&lookup, "HASHNODE_SYNC_MAX_RETRIES", file.max_retries)?
            .unwrap_or(DEFAULT_MAX_RETRIES),
        retry_backoff: number(&lookup, "HASHNODE_SYNC_RETRY_BACKOFF_MS", file.retry_backoff_ms)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BASE_DELAY),
        run_timeout: Duration::from_secs(
            number(&lookup, "HASHNODE_SYNC_RUN_TIMEOUT_SECS", file.run_timeout_secs)?
                .unwrap_or(DEFAULT_RUN_TIMEOUT_SECS),
        ),
        request_timeout: Duration::from_secs(
            number(&lookup, "HASHNODE_SYNC_REQUEST_TIMEOUT_SECS", file.request_timeout_secs)?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
    };

    if settings.concurrency == 0 {
        error!("concurrency must be at least 1");
        anyhow::bail!("concurrency must be at least 1");
    }

    info!(
        publication_host = %settings.publication_host,
        repository = %settings.repository,
        git_ref = %settings.git_ref,
        posts_directory = %settings.posts_directory.display(),
        "Config loaded and merged successfully"
    );
    Ok(settings)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn required(from_env: Option<String>, from_file: Option<String>, var: &str) -> Result<String> {
    from_env.or(from_file).ok_or_else(|| {
        error!(var, "Required setting missing");
        anyhow!("{var} must be set in the environment or the config file")
    })
}

fn number<T, F>(env: &F, var: &str, from_file: Option<T>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(var) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            error!(var, value = %raw, error = %e, "Invalid numeric setting");
            anyhow!("{var} must be a valid number: {e}")
        }),
        None => Ok(from_file),
    }
}
