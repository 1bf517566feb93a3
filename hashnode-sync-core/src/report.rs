//! Run report: what was added, modified, deleted and what failed.
//!
//! [`ReportBuilder`] is fed one [`Outcome`] per item by a single consumer and
//! orders the final buckets by item declaration order, so the report does not
//! depend on the order concurrent items happened to finish in.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A post touched by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
}

impl From<crate::contract::RemotePost> for PostSummary {
    fn from(post: crate::contract::RemotePost) -> Self {
        PostSummary {
            id: post.id,
            title: post.title,
            slug: post.slug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    AssetPath,
    Io,
    Mutation,
    Timeout,
    Validation,
    ApiUnavailable,
}

/// One failed item: the file path or slug it concerns and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub target: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(target: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorEntry {
            target: target.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result of reconciling one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added(PostSummary),
    Modified(PostSummary),
    Deleted(PostSummary),
    /// Nothing to do, e.g. deleting a post that does not exist remotely.
    Skipped,
    Failed(ErrorEntry),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub added: Vec<PostSummary>,
    pub modified: Vec<PostSummary>,
    pub deleted: Vec<PostSummary>,
    pub errors: Vec<ErrorEntry>,
    /// Items that needed no change. Not part of the serialized report.
    #[serde(skip)]
    pub skipped: usize,
    /// Set when the run as a whole was aborted.
    #[serde(skip)]
    pub aborted: bool,
}

/// Overall verdict of a run, used for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NothingToDo,
    Success,
    PartialFailure,
    TotalFailure,
}

impl RunStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::TotalFailure)
    }
}

impl RunReport {
    /// Report for a run that was aborted as a whole. The `run` entry is
    /// appended after whatever `partial` already recorded.
    pub fn fatal(partial: RunReport, err: &SyncError) -> Self {
        let kind = match err {
            SyncError::ApiUnavailable(_) => ErrorKind::ApiUnavailable,
            SyncError::DuplicateSlug { .. } => ErrorKind::Validation,
        };
        let mut report = partial;
        report.errors.push(ErrorEntry::new("run", kind, err.to_string()));
        report.aborted = true;
        report
    }

    pub fn succeeded(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub fn status(&self) -> RunStatus {
        if self.aborted {
            return RunStatus::TotalFailure;
        }
        let ok = self.succeeded() + self.skipped;
        match (ok, self.errors.len()) {
            (0, 0) => RunStatus::NothingToDo,
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::TotalFailure,
            _ => RunStatus::PartialFailure,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable restatement of the report.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Added: {}, Modified: {}, Deleted: {}, Errors: {}\n",
            self.added.len(),
            self.modified.len(),
            self.deleted.len(),
            self.errors.len()
        );
        for (label, posts) in [
            ("Added", &self.added),
            ("Modified", &self.modified),
            ("Deleted", &self.deleted),
        ] {
            if posts.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{label} posts:");
            for post in posts {
                let _ = writeln!(out, "  - {} ({})", post.title, post.slug);
            }
        }
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for entry in &self.errors {
                let _ = writeln!(out, "  - {}: {}", entry.target, entry.message);
            }
        }
        out
    }
}

/// Accumulates outcomes keyed by item sequence number.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    outcomes: Vec<(usize, Outcome)>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, seq: usize, outcome: Outcome) {
        self.outcomes.push((seq, outcome));
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn finish(mut self) -> RunReport {
        self.outcomes.sort_by_key(|(seq, _)| *seq);
        let mut report = RunReport::default();
        for (_, outcome) in self.outcomes {
            match outcome {
                Outcome::Added(post) => report.added.push(post),
                Outcome::Modified(post) => report.modified.push(post),
                Outcome::Deleted(post) => report.deleted.push(post),
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed(entry) => report.errors.push(entry),
            }
        }
        report
    }
}
