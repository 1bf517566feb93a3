//! Slug lookup of the posts that already exist on the platform.
//!
//! The index is all-or-nothing: a partial listing would make existing posts
//! look missing and cause duplicate creates, so any failure while paging
//! aborts the build.

use std::collections::{HashMap, HashSet};

use tracing::{error, info};

use crate::contract::{PostApi, RemotePost};
use crate::error::ApiUnavailableError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    publication_id: String,
    posts: HashMap<String, RemotePost>,
}

impl RemoteIndex {
    pub fn from_posts(publication_id: impl Into<String>, posts: Vec<RemotePost>) -> Self {
        RemoteIndex {
            publication_id: publication_id.into(),
            posts: posts.into_iter().map(|p| (p.slug.clone(), p)).collect(),
        }
    }

    /// Page through every post of the publication.
    pub async fn build<A>(api: &A) -> Result<Self, ApiUnavailableError>
    where
        A: PostApi + ?Sized,
    {
        let mut publication_id: Option<String> = None;
        let mut posts = Vec::new();
        let mut seen_cursors = HashSet::new();
        let mut after: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = api.list_posts(after.clone()).await.map_err(|e| {
                error!(error = %e, page = pages + 1, "Failed to list remote posts");
                ApiUnavailableError(format!("listing posts failed on page {}: {e}", pages + 1))
            })?;
            pages += 1;

            match &publication_id {
                None => publication_id = Some(page.publication_id.clone()),
                Some(id) if *id != page.publication_id => {
                    return Err(ApiUnavailableError(format!(
                        "publication id changed while paging ({id} then {})",
                        page.publication_id
                    )));
                }
                Some(_) => {}
            }
            posts.extend(page.posts);

            if !page.has_next_page {
                break;
            }
            let cursor = page.end_cursor.ok_or_else(|| {
                ApiUnavailableError("listing reported another page without a cursor".to_string())
            })?;
            if !seen_cursors.insert(cursor.clone()) {
                return Err(ApiUnavailableError(format!(
                    "listing returned cursor `{cursor}` twice"
                )));
            }
            after = Some(cursor);
        }

        let publication_id = publication_id.unwrap_or_default();
        if publication_id.is_empty() {
            return Err(ApiUnavailableError(
                "listing did not identify the publication".to_string(),
            ));
        }

        let index = Self::from_posts(publication_id, posts);
        info!(
            posts = index.len(),
            pages,
            publication_id = %index.publication_id,
            "Built remote post index"
        );
        Ok(index)
    }

    pub fn get(&self, slug: &str) -> Option<&RemotePost> {
        self.posts.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.posts.contains_key(slug)
    }

    pub fn publication_id(&self) -> &str {
        &self.publication_id
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockPostApi, PostPage};
    use crate::error::ApiError;

    fn post(n: u32) -> RemotePost {
        RemotePost {
            id: format!("id-{n}"),
            slug: format!("post-{n}"),
            title: format!("Post {n}"),
        }
    }

    fn page(posts: Vec<RemotePost>, next: Option<&str>) -> PostPage {
        PostPage {
            publication_id: "pub-1".into(),
            posts,
            has_next_page: next.is_some(),
            end_cursor: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn follows_cursors_across_pages() {
        let mut api = MockPostApi::new();
        api.expect_list_posts()
            .withf(|after| after.is_none())
            .times(1)
            .returning(|_| Ok(page(vec![post(1), post(2)], Some("c1"))));
        api.expect_list_posts()
            .withf(|after| after.as_deref() == Some("c1"))
            .times(1)
            .returning(|_| Ok(page(vec![post(3)], None)));

        let index = RemoteIndex::build(&api).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.publication_id(), "pub-1");
        assert_eq!(index.get("post-3").map(|p| p.id.as_str()), Some("id-3"));
    }

    #[tokio::test]
    async fn any_failed_page_fails_the_build() {
        let mut api = MockPostApi::new();
        api.expect_list_posts()
            .withf(|after| after.is_none())
            .returning(|_| Ok(page(vec![post(1)], Some("c1"))));
        api.expect_list_posts()
            .withf(|after| after.is_some())
            .returning(|_| Err(ApiError::Transient("HTTP 502".into())));

        let err = RemoteIndex::build(&api).await.unwrap_err();
        assert!(err.0.contains("page 2"), "{err}");
    }

    #[tokio::test]
    async fn repeated_cursor_is_rejected() {
        let mut api = MockPostApi::new();
        api.expect_list_posts()
            .returning(|_| Ok(page(vec![post(1)], Some("same"))));

        assert!(RemoteIndex::build(&api).await.is_err());
    }

    #[tokio::test]
    async fn missing_cursor_is_rejected() {
        let mut api = MockPostApi::new();
        api.expect_list_posts().returning(|_| {
            Ok(PostPage {
                publication_id: "pub-1".into(),
                posts: vec![],
                has_next_page: true,
                end_cursor: None,
            })
        });

        assert!(RemoteIndex::build(&api).await.is_err());
    }
}
