//! High-level pipeline: reconciles a [`ChangeSet`] against the platform.
//!
//! One run goes through four phases:
//!   - Prepare: every added or modified document is read, parsed and its
//!     asset references resolved into a [`PostIntent`]. Broken documents are
//!     recorded as errors and skipped.
//!   - Validate: two intents claiming the same slug abort the run before any
//!     API call is made. Deletions are held back when any document failed to
//!     prepare, since its slug (and so a possible rename) is unknown.
//!   - Index: all remote posts are listed once ([`RemoteIndex`]). Failure is
//!     fatal, since a partial index would turn updates into duplicate creates.
//!   - Reconcile: creates, updates and removals run through a bounded worker
//!     pool under the run deadline. A single consumer folds their outcomes
//!     into a [`ReportBuilder`].
//!
//! # Error Handling
//! Only [`SyncError`] escapes, inside an [`AbortedRun`] carrying the partial
//! report. Everything that concerns a single document or post ends up in
//! [`RunReport::errors`] and the run carries on.
//!
//! The run deadline ([`SyncConfig::run_timeout`]) starts when [`synchronise`]
//! is entered and covers the index listing as well as the mutations.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Document to intent: [`build_intent`]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::assets::AssetResolver;
use crate::changes::{ChangeSet, DeletedDocument};
use crate::config::SyncConfig;
use crate::contract::{PostApi, PostIntent};
use crate::error::{AbortedRun, ApiUnavailableError, DocumentError, SyncError};
use crate::frontmatter::parse_document;
use crate::index::RemoteIndex;
use crate::report::{ErrorEntry, ErrorKind, Outcome, ReportBuilder, RunReport};
use crate::retry::RetryPolicy;

/// A unit of work for the reconcile phase.
#[derive(Debug)]
enum WorkItem {
    Publish(PostIntent),
    Delete(DeletedDocument),
}

impl WorkItem {
    fn target(&self) -> String {
        match self {
            WorkItem::Publish(intent) => intent.source.display().to_string(),
            WorkItem::Delete(doc) => doc.path.display().to_string(),
        }
    }
}

/// Turn the text of the document at `path` (relative to the repository root)
/// into a post intent with absolute asset URLs.
pub fn build_intent(
    path: &Path,
    text: &str,
    resolver: &AssetResolver,
) -> Result<PostIntent, DocumentError> {
    let parsed = parse_document(text)?;
    let doc_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let content = resolver.resolve_body(&parsed.body, doc_dir)?;
    let cover_image_url = match parsed.frontmatter.cover_image.as_deref() {
        Some(cover) if !cover.trim().is_empty() => {
            Some(resolver.resolve_reference(cover, doc_dir)?)
        }
        _ => None,
    };

    Ok(PostIntent {
        source: path.to_path_buf(),
        frontmatter: parsed.frontmatter,
        content,
        cover_image_url,
    })
}

fn error_kind(err: &DocumentError) -> ErrorKind {
    match err {
        DocumentError::Io { .. } => ErrorKind::Io,
        DocumentError::Parse(_) => ErrorKind::Parse,
        DocumentError::AssetPath(_) => ErrorKind::AssetPath,
    }
}

async fn read_intent(
    config: &SyncConfig,
    resolver: &AssetResolver,
    path: &Path,
) -> Result<PostIntent, DocumentError> {
    let full_path = config.repo_root.join(path);
    let text = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    build_intent(path, &text, resolver)
}

/// Reject batches where two documents claim the same slug.
fn check_duplicate_slugs(intents: &[(usize, PostIntent)]) -> Result<(), SyncError> {
    let mut by_slug: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
    for (_, intent) in intents {
        by_slug
            .entry(intent.slug())
            .or_default()
            .push(intent.source.clone());
    }
    match by_slug.into_iter().find(|(_, paths)| paths.len() > 1) {
        Some((slug, paths)) => Err(SyncError::DuplicateSlug {
            slug: slug.to_string(),
            paths,
        }),
        None => Ok(()),
    }
}

/// Reconcile `changes` against the platform behind `api`.
pub async fn synchronise<A>(
    api: &A,
    config: &SyncConfig,
    changes: &ChangeSet,
) -> Result<RunReport, AbortedRun>
where
    A: PostApi + ?Sized,
{
    let deadline = tokio::time::Instant::now() + config.run_timeout;
    info!(
        added = changes.added.len(),
        modified = changes.modified.len(),
        deleted = changes.deleted.len(),
        "[SYNC] Starting synchronisation"
    );
    if changes.is_empty() {
        info!("[SYNC] No post changes; nothing to do");
        return Ok(RunReport::default());
    }

    // --- Phase 1: Prepare ---
    let resolver = AssetResolver::new(config.raw_base_url.clone());
    let mut builder = ReportBuilder::new();
    let mut intents: Vec<(usize, PostIntent)> = Vec::new();
    let mut seq = 0usize;

    for path in changes.added.iter().chain(&changes.modified) {
        match read_intent(config, &resolver, path).await {
            Ok(intent) => {
                debug!(path = %path.display(), slug = intent.slug(), "[SYNC] Prepared post");
                intents.push((seq, intent));
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "[SYNC][ERROR] Skipping document");
                builder.record(
                    seq,
                    Outcome::Failed(ErrorEntry::new(
                        path.display().to_string(),
                        error_kind(&e),
                        e.to_string(),
                    )),
                );
            }
        }
        seq += 1;
    }

    // --- Phase 2: Validate the batch ---
    if let Err(e) = check_duplicate_slugs(&intents) {
        error!(error = %e, "[SYNC][ERROR] Batch rejected before any API call");
        return Err(AbortedRun {
            source: e,
            partial: builder.finish(),
        });
    }
    let unprepared = builder.len();

    let claimed: HashMap<String, PathBuf> = intents
        .iter()
        .map(|(_, intent)| (intent.slug().to_string(), intent.source.clone()))
        .collect();

    let mut work: Vec<(usize, WorkItem)> = intents
        .into_iter()
        .map(|(seq, intent)| (seq, WorkItem::Publish(intent)))
        .collect();
    for doc in &changes.deleted {
        if unprepared > 0 {
            warn!(
                path = %doc.path.display(),
                slug = %doc.slug,
                unprepared,
                "[SYNC] Holding back deletion; a document in this push failed to prepare"
            );
            builder.record(
                seq,
                Outcome::Failed(ErrorEntry::new(
                    doc.path.display().to_string(),
                    ErrorKind::Validation,
                    format!(
                        "deletion of `{}` held back: {unprepared} document(s) in this push failed to prepare and may still claim the slug",
                        doc.slug
                    ),
                )),
            );
        } else if let Some(source) = claimed.get(&doc.slug) {
            info!(
                path = %doc.path.display(),
                slug = %doc.slug,
                claimed_by = %source.display(),
                "[SYNC] Slug still in use by another document; not deleting"
            );
            builder.record(seq, Outcome::Skipped);
        } else {
            work.push((seq, WorkItem::Delete(doc.clone())));
        }
        seq += 1;
    }

    if work.is_empty() {
        info!("[SYNC] No work left after preparation");
        return Ok(builder.finish());
    }

    // --- Phase 3: Remote index ---
    let index = match tokio::time::timeout_at(deadline, RemoteIndex::build(api)).await {
        Ok(Ok(index)) => index,
        Ok(Err(e)) => {
            return Err(AbortedRun {
                source: e.into(),
                partial: builder.finish(),
            })
        }
        Err(_) => {
            error!("[SYNC][ERROR] Run deadline reached while listing remote posts");
            return Err(AbortedRun {
                source: ApiUnavailableError("run deadline reached while listing posts".into()).into(),
                partial: builder.finish(),
            });
        }
    };

    // --- Phase 4: Reconcile ---
    let concurrency = config.concurrency.max(1);
    let retry = config.retry;
    let mut pending: BTreeMap<usize, String> = work
        .iter()
        .map(|(seq, item)| (*seq, item.target()))
        .collect();
    info!(items = work.len(), concurrency, "[SYNC] Reconciling posts");

    let index = &index;
    let mut outcomes = stream::iter(work.into_iter().map(|(seq, item)| async move {
        let outcome = match item {
            WorkItem::Publish(intent) => publish(api, index, retry, &intent).await,
            WorkItem::Delete(doc) => remove(api, index, retry, &doc).await,
        };
        (seq, outcome)
    }))
    .buffer_unordered(concurrency);

    loop {
        match tokio::time::timeout_at(deadline, outcomes.next()).await {
            Ok(Some((seq, outcome))) => {
                pending.remove(&seq);
                builder.record(seq, outcome);
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    unfinished = pending.len(),
                    timeout_secs = config.run_timeout.as_secs(),
                    "[SYNC] Run deadline reached; abandoning unfinished items"
                );
                for (seq, target) in std::mem::take(&mut pending) {
                    builder.record(
                        seq,
                        Outcome::Failed(ErrorEntry::new(
                            target,
                            ErrorKind::Timeout,
                            "run deadline reached before the item finished",
                        )),
                    );
                }
                break;
            }
        }
    }

    let report = builder.finish();
    info!(
        added = report.added.len(),
        modified = report.modified.len(),
        deleted = report.deleted.len(),
        errors = report.errors.len(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}

async fn publish<A>(api: &A, index: &RemoteIndex, retry: RetryPolicy, intent: &PostIntent) -> Outcome
where
    A: PostApi + ?Sized,
{
    let target = intent.source.display().to_string();
    match index.get(intent.slug()) {
        None => {
            let result = retry
                .run("create_post", || api.create_post(index.publication_id(), intent))
                .await;
            match result {
                Ok(post) => {
                    info!(path = %target, slug = %post.slug, id = %post.id, "[SYNC] Created post");
                    Outcome::Added(post.into())
                }
                Err(e) => mutation_failed(target, "create", e),
            }
        }
        Some(existing) => {
            let result = retry
                .run("update_post", || api.update_post(&existing.id, intent))
                .await;
            match result {
                Ok(post) => {
                    info!(path = %target, slug = %post.slug, id = %post.id, "[SYNC] Updated post");
                    Outcome::Modified(post.into())
                }
                Err(e) => mutation_failed(target, "update", e),
            }
        }
    }
}

async fn remove<A>(api: &A, index: &RemoteIndex, retry: RetryPolicy, doc: &DeletedDocument) -> Outcome
where
    A: PostApi + ?Sized,
{
    let target = doc.path.display().to_string();
    let Some(existing) = index.get(&doc.slug) else {
        info!(path = %target, slug = %doc.slug, "[SYNC] No remote post for deleted document");
        return Outcome::Skipped;
    };

    let result = if api.supports_removal() {
        retry
            .run("remove_post", || api.remove_post(&existing.id))
            .await
    } else {
        retry
            .run("delist_post", || api.delist_post(&existing.id))
            .await
    };
    match result {
        Ok(post) => {
            info!(path = %target, slug = %post.slug, id = %post.id, "[SYNC] Removed post");
            Outcome::Deleted(post.into())
        }
        Err(e) => mutation_failed(target, "remove", e),
    }
}

fn mutation_failed(target: String, action: &str, err: crate::error::ApiError) -> Outcome {
    error!(path = %target, action, error = %err, "[SYNC][ERROR] Mutation failed");
    Outcome::Failed(ErrorEntry::new(
        target,
        ErrorKind::Mutation,
        format!("{action} failed: {err}"),
    ))
}
