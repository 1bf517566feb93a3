//! # contract: the narrow interface between the engine and a blogging platform
//!
//! The reconciliation engine only ever talks to the platform through
//! [`PostApi`]. Real clients (the Hashnode GraphQL client in the CLI crate)
//! and test doubles implement it.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockPostApi` is exported with the
//!   `test-export-mocks` feature (on by default) so downstream integration
//!   tests can script the platform.
//!
//! ## Errors
//! - Every call returns [`ApiError`]. Implementors decide what is transient
//!   (worth retrying) and what is permanent.

use std::path::PathBuf;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::frontmatter::Frontmatter;

/// A post known to exist on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePost {
    pub id: String,
    pub slug: String,
    pub title: String,
}

/// One page of the publication's post listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostPage {
    /// Id of the publication the posts belong to; create calls need it.
    pub publication_id: String,
    pub posts: Vec<RemotePost>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Everything needed to create or update one post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostIntent {
    /// Source document, relative to the repository root.
    pub source: PathBuf,
    pub frontmatter: Frontmatter,
    /// Markdown body with image references already made absolute.
    pub content: String,
    /// Absolute cover image URL, if the post has one.
    pub cover_image_url: Option<String>,
}

impl PostIntent {
    pub fn slug(&self) -> &str {
        &self.frontmatter.slug
    }

    pub fn title(&self) -> &str {
        &self.frontmatter.title
    }
}

/// Content API operations used by the engine.
///
/// Implementations must be safe to call concurrently: the engine runs
/// independent items through a bounded worker pool.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PostApi: Send + Sync {
    /// List one page of posts, starting after `after` (`None` for the first page).
    async fn list_posts(&self, after: Option<String>) -> Result<PostPage, ApiError>;

    /// Create and publish a new post.
    async fn create_post(
        &self,
        publication_id: &str,
        intent: &PostIntent,
    ) -> Result<RemotePost, ApiError>;

    /// Replace an existing post with the intent's content and settings.
    async fn update_post(&self, post_id: &str, intent: &PostIntent)
        -> Result<RemotePost, ApiError>;

    /// Remove a post permanently.
    async fn remove_post(&self, post_id: &str) -> Result<RemotePost, ApiError>;

    /// Hide a post from the publication without deleting it.
    async fn delist_post(&self, post_id: &str) -> Result<RemotePost, ApiError>;

    /// Whether the platform supports hard deletes. When it does not,
    /// deleted documents are delisted instead.
    fn supports_removal(&self) -> bool;
}
