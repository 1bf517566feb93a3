use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::retry::RetryPolicy;

/// Everything the engine needs to know about one run. Built by the caller;
/// the core never reads the environment itself.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Checkout directory that document paths are relative to.
    pub repo_root: PathBuf,
    /// Directory holding the posts, relative to `repo_root`. Empty means all of it.
    pub posts_root: PathBuf,
    /// `<raw-content-host>/<owner/repo>/<ref>`.
    pub raw_base_url: String,
    /// Maximum number of items reconciled at the same time.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Budget for the whole run, counted from entering the engine. Covers the
    /// remote index listing and every mutation.
    pub run_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            repo_root: PathBuf::from("."),
            posts_root: PathBuf::new(),
            raw_base_url: String::new(),
            concurrency: 4,
            retry: RetryPolicy::default(),
            run_timeout: Duration::from_secs(300),
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            repo_root = %self.repo_root.display(),
            posts_root = %self.posts_root.display(),
            raw_base_url = %self.raw_base_url,
            concurrency = self.concurrency,
            max_retries = self.retry.max_retries,
            run_timeout_secs = self.run_timeout.as_secs(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
