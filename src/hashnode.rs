#![doc = "Hashnode GraphQL client: implements the core `PostApi` contract over reqwest."]
//
//! # Hashnode client (CLI <-> Core)
//!
//! This module bridges the engine's [`PostApi`] trait to the Hashnode GraphQL
//! endpoint. Every call is a single `POST` of `{query, variables}` carrying the
//! access token in the `Authorization` header.
//!
//! ## Error mapping
//! - Transport failures, HTTP 429 and HTTP 5xx are [`ApiError::Transient`]
//!   and get retried by the engine.
//! - Other HTTP failures, GraphQL `errors` and malformed responses are
//!   [`ApiError::Permanent`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use hashnode_sync_core::contract::{PostApi, PostIntent, PostPage, RemotePost};
use hashnode_sync_core::error::ApiError;

pub const DEFAULT_API_URL: &str = "https://gql.hashnode.com";

/// Posts requested per listing page.
const PAGE_SIZE: u32 = 50;

const LIST_POSTS: &str = r#"
query ListPosts($host: String!, $first: Int!, $after: String) {
  publication(host: $host) {
    id
    posts(first: $first, after: $after) {
      edges { node { id slug title } }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

const PUBLISH_POST: &str = r#"
mutation PublishPost($input: PublishPostInput!) {
  publishPost(input: $input) { post { id slug title } }
}"#;

const UPDATE_POST: &str = r#"
mutation UpdatePost($input: UpdatePostInput!) {
  updatePost(input: $input) { post { id slug title } }
}"#;

const REMOVE_POST: &str = r#"
mutation RemovePost($input: RemovePostInput!) {
  removePost(input: $input) { post { id slug title } }
}"#;

#[derive(Clone)]
pub struct HashnodeConfig {
    pub api_url: String,
    pub access_token: String,
    pub publication_host: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for HashnodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashnodeConfig")
            .field("api_url", &self.api_url)
            .field("access_token", &"<redacted>")
            .field("publication_host", &self.publication_host)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

pub struct HashnodeClient {
    http: reqwest::Client,
    config: HashnodeConfig,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ListData {
    publication: Option<PublicationNode>,
}

#[derive(Deserialize)]
struct PublicationNode {
    id: String,
    posts: PostConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostConnection {
    edges: Vec<PostEdge>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct PostEdge {
    node: RemotePost,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct PostPayload {
    post: RemotePost,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishData {
    publish_post: PostPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    update_post: PostPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveData {
    remove_post: PostPayload,
}

impl HashnodeClient {
    pub fn new(config: HashnodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        tracing::info!(
            api_url = %config.api_url,
            publication_host = %config.publication_host,
            token_set = !config.access_token.is_empty(),
            "Initialized Hashnode client"
        );
        Ok(HashnodeClient { http, config })
    }

    /// Send one GraphQL document and decode its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.config.access_token),
            )
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "Hashnode request failed in transport");
                ApiError::Transient(format!("{operation}: {e}"))
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ApiError::Transient(format!("{operation}: HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(operation, %status, body = %body, "Hashnode rejected request");
            return Err(ApiError::Permanent(format!("{operation}: HTTP {status}: {body}")));
        }

        let body: GraphQlResponse<T> = response.json().await.map_err(|e| {
            ApiError::Permanent(format!("{operation}: malformed response: {e}"))
        })?;
        if !body.errors.is_empty() {
            let messages = body
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            tracing::error!(operation, errors = %messages, "Hashnode returned GraphQL errors");
            return Err(ApiError::Permanent(format!("{operation}: {messages}")));
        }
        body.data
            .ok_or_else(|| ApiError::Permanent(format!("{operation}: response has no data")))
    }
}

fn tags_json(intent: &PostIntent) -> Value {
    Value::Array(
        intent
            .frontmatter
            .tags
            .iter()
            .map(|tag| json!({ "slug": tag.slug, "name": tag.name }))
            .collect(),
    )
}

/// Fields shared by the publish and update inputs.
fn common_fields(intent: &PostIntent) -> Map<String, Value> {
    let fm = &intent.frontmatter;
    let mut input = Map::new();
    input.insert("title".into(), json!(fm.title));
    input.insert("slug".into(), json!(fm.slug));
    input.insert("contentMarkdown".into(), json!(intent.content));
    input.insert("tags".into(), tags_json(intent));
    if let Some(subtitle) = &fm.subtitle {
        input.insert("subtitle".into(), json!(subtitle));
    }
    if let Some(published_at) = &fm.published_at {
        input.insert("publishedAt".into(), json!(published_at));
    }
    if let Some(url) = &intent.cover_image_url {
        let mut cover = Map::new();
        cover.insert("coverImageURL".into(), json!(url));
        if let Some(attribution) = &fm.cover_image_attribution {
            cover.insert("coverImageAttribution".into(), json!(attribution));
        }
        input.insert("coverImageOptions".into(), Value::Object(cover));
    }
    input
}

/// `PublishPostInput` for a new post.
pub fn create_input(publication_id: &str, intent: &PostIntent) -> Value {
    let fm = &intent.frontmatter;
    let mut input = common_fields(intent);
    input.insert("publicationId".into(), json!(publication_id));
    input.insert("disableComments".into(), json!(fm.disable_comments));
    input.insert(
        "settings".into(),
        json!({
            "enableTableOfContent": fm.enable_table_of_contents,
            "delisted": fm.is_delisted(),
            "slugOverridden": true,
        }),
    );
    Value::Object(input)
}

/// `UpdatePostInput` replacing an existing post.
pub fn update_input(post_id: &str, intent: &PostIntent) -> Value {
    let fm = &intent.frontmatter;
    let mut input = common_fields(intent);
    input.insert("id".into(), json!(post_id));
    input.insert(
        "settings".into(),
        json!({
            "isTableOfContentEnabled": fm.enable_table_of_contents,
            "delisted": fm.is_delisted(),
            "disableComments": fm.disable_comments,
        }),
    );
    Value::Object(input)
}

#[async_trait]
impl PostApi for HashnodeClient {
    async fn list_posts(&self, after: Option<String>) -> Result<PostPage, ApiError> {
        let variables = json!({
            "host": self.config.publication_host,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: ListData = self.execute("list_posts", LIST_POSTS, variables).await?;
        let publication = data.publication.ok_or_else(|| {
            ApiError::Permanent(format!(
                "publication `{}` not found",
                self.config.publication_host
            ))
        })?;
        tracing::debug!(
            posts = publication.posts.edges.len(),
            has_next_page = publication.posts.page_info.has_next_page,
            "Fetched page of posts"
        );
        Ok(PostPage {
            publication_id: publication.id,
            posts: publication.posts.edges.into_iter().map(|e| e.node).collect(),
            has_next_page: publication.posts.page_info.has_next_page,
            end_cursor: publication.posts.page_info.end_cursor,
        })
    }

    async fn create_post(
        &self,
        publication_id: &str,
        intent: &PostIntent,
    ) -> Result<RemotePost, ApiError> {
        let input = create_input(publication_id, intent);
        let data: PublishData = self
            .execute("create_post", PUBLISH_POST, json!({ "input": input }))
            .await?;
        Ok(data.publish_post.post)
    }

    async fn update_post(&self, post_id: &str, intent: &PostIntent) -> Result<RemotePost, ApiError> {
        let input = update_input(post_id, intent);
        let data: UpdateData = self
            .execute("update_post", UPDATE_POST, json!({ "input": input }))
            .await?;
        Ok(data.update_post.post)
    }

    async fn remove_post(&self, post_id: &str) -> Result<RemotePost, ApiError> {
        let data: RemoveData = self
            .execute("remove_post", REMOVE_POST, json!({ "input": { "id": post_id } }))
            .await?;
        Ok(data.remove_post.post)
    }

    async fn delist_post(&self, post_id: &str) -> Result<RemotePost, ApiError> {
        let input = json!({ "id": post_id, "settings": { "delisted": true } });
        let data: UpdateData = self
            .execute("delist_post", UPDATE_POST, json!({ "input": input }))
            .await?;
        Ok(data.update_post.post)
    }

    fn supports_removal(&self) -> bool {
        true
    }
}
