//! YAML frontmatter parsing and validation for markdown posts.
//!
//! A post starts with a `---` line, a YAML mapping, and a closing `---` line.
//! `title` and `slug` are required; every other supported field has a default.
//! Keys this module does not know about are kept in [`Frontmatter::extra`] and
//! otherwise ignored.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::ParseError;

/// A post tag as sent to the platform.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        let slug = normalize_slug(&name);
        Tag { name, slug }
    }
}

/// Validated post metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub tags: Vec<Tag>,
    pub enable_table_of_contents: bool,
    pub cover_image: Option<String>,
    pub cover_image_attribution: Option<String>,
    /// ISO-8601 timestamp, validated but carried verbatim.
    pub published_at: Option<String>,
    pub publish: bool,
    pub disable_comments: bool,
    pub delisted: bool,
    /// Unrecognised keys. Never sent to the API.
    pub extra: BTreeMap<String, Value>,
}

impl Frontmatter {
    /// Minimal frontmatter with every optional field at its default.
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Frontmatter {
            title: title.into(),
            slug: normalize_slug(&slug.into()),
            subtitle: None,
            tags: Vec::new(),
            enable_table_of_contents: false,
            cover_image: None,
            cover_image_attribution: None,
            published_at: None,
            publish: true,
            disable_comments: false,
            delisted: false,
            extra: BTreeMap::new(),
        }
    }

    /// Whether the post should be hidden from the publication's feeds.
    /// Drafts (`publish: false`) are delisted too.
    pub fn is_delisted(&self) -> bool {
        self.delisted || !self.publish
    }

    /// Serialize the metadata back into a `---` delimited block.
    ///
    /// Optional fields at their default value are omitted, so parsing the
    /// rendered block yields an equal [`Frontmatter`].
    pub fn render(&self) -> String {
        let mut map = Mapping::new();
        let mut put = |key: &str, value: Value| {
            map.insert(Value::String(key.to_string()), value);
        };

        put("title", Value::String(self.title.clone()));
        put("slug", Value::String(self.slug.clone()));
        if let Some(subtitle) = &self.subtitle {
            put("subtitle", Value::String(subtitle.clone()));
        }
        if !self.tags.is_empty() {
            // A sequence keeps names containing commas intact.
            let names = self
                .tags
                .iter()
                .map(|t| Value::String(t.name.clone()))
                .collect();
            put("tags", Value::Sequence(names));
        }
        if self.enable_table_of_contents {
            put("enableTableOfContents", Value::Bool(true));
        }
        if let Some(cover) = &self.cover_image {
            put("coverImage", Value::String(cover.clone()));
        }
        if let Some(attribution) = &self.cover_image_attribution {
            put("coverImageAttribution", Value::String(attribution.clone()));
        }
        if let Some(published_at) = &self.published_at {
            put("publishedAt", Value::String(published_at.clone()));
        }
        if !self.publish {
            put("publish", Value::Bool(false));
        }
        if self.disable_comments {
            put("disableComments", Value::Bool(true));
        }
        if self.delisted {
            put("delisted", Value::Bool(true));
        }
        for (key, value) in &self.extra {
            put(key.as_str(), value.clone());
        }

        // A Mapping of strings, bools and already-parsed values always serializes.
        let yaml = serde_yaml::to_string(&Value::Mapping(map)).unwrap_or_default();
        format!("---\n{yaml}---\n")
    }
}

/// Frontmatter plus the body text that followed it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Lowercase, trim, and collapse whitespace runs into `-`.
pub fn normalize_slug(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Split raw text into the YAML block and the body that follows it.
pub fn split_frontmatter(text: &str) -> Result<(&str, &str), ParseError> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let mut lines = text.split_inclusive('\n');

    let first = lines.next().ok_or(ParseError::MissingFrontmatter)?;
    if first.trim_end() != "---" {
        return Err(ParseError::MissingFrontmatter);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == "---" {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }
    Err(ParseError::UnterminatedFrontmatter)
}

/// Parse a whole markdown document.
pub fn parse_document(text: &str) -> Result<ParsedDocument, ParseError> {
    let (yaml, body) = split_frontmatter(text)?;
    let frontmatter = parse_frontmatter(yaml)?;

    let body = body.trim_start_matches(['\r', '\n']).to_string();
    if body.trim().is_empty() {
        return Err(ParseError::EmptyBody);
    }

    Ok(ParsedDocument { frontmatter, body })
}

/// Parse and validate the YAML between the delimiters.
pub fn parse_frontmatter(yaml: &str) -> Result<Frontmatter, ParseError> {
    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| ParseError::InvalidYaml(e.to_string()))?;

    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(ParseError::InvalidYaml(
                "frontmatter must be a mapping of keys to values".to_string(),
            ))
        }
    };

    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        match key {
            Value::String(key) => {
                fields.insert(key, value);
            }
            other => {
                return Err(ParseError::InvalidYaml(format!(
                    "frontmatter keys must be strings, found {other:?}"
                )))
            }
        }
    }

    let title = take_string(&mut fields, "title")?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ParseError::MissingField("title"))?;
    let slug = take_string(&mut fields, "slug")?
        .map(|s| normalize_slug(&s))
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("slug"))?;

    let published_at = take_string(&mut fields, "publishedAt")?;
    if let Some(ts) = &published_at {
        validate_timestamp(ts)?;
    }

    let frontmatter = Frontmatter {
        title,
        slug,
        subtitle: take_string(&mut fields, "subtitle")?,
        tags: take_tags(&mut fields)?,
        enable_table_of_contents: take_bool(&mut fields, "enableTableOfContents", false)?,
        cover_image: take_string(&mut fields, "coverImage")?.filter(|c| !c.trim().is_empty()),
        cover_image_attribution: take_string(&mut fields, "coverImageAttribution")?,
        published_at,
        publish: take_bool(&mut fields, "publish", true)?,
        disable_comments: take_bool(&mut fields, "disableComments", false)?,
        delisted: take_bool(&mut fields, "delisted", false)?,
        extra: fields,
    };

    if !frontmatter.extra.is_empty() {
        debug!(
            slug = %frontmatter.slug,
            keys = ?frontmatter.extra.keys().collect::<Vec<_>>(),
            "Ignoring unrecognised frontmatter keys"
        );
    }

    Ok(frontmatter)
}

fn take_string(
    fields: &mut BTreeMap<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ParseError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ParseError::InvalidField {
            field,
            reason: format!("expected a string, found {other:?}"),
        }),
    }
}

fn take_bool(
    fields: &mut BTreeMap<String, Value>,
    field: &'static str,
    default: bool,
) -> Result<bool, ParseError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(ParseError::InvalidField {
            field,
            reason: format!("expected true or false, found {other:?}"),
        }),
    }
}

fn take_tags(fields: &mut BTreeMap<String, Value>) -> Result<Vec<Tag>, ParseError> {
    let names: Vec<String> = match fields.remove("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Sequence(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(ParseError::InvalidField {
                    field: "tags",
                    reason: format!("expected tag names, found {other:?}"),
                }),
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "tags",
                reason: format!("expected a comma-separated string, found {other:?}"),
            })
        }
    };

    Ok(names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| Tag::new(name))
        .collect())
}

fn validate_timestamp(ts: &str) -> Result<(), ParseError> {
    let ts = ts.trim();
    let valid = chrono::DateTime::parse_from_rfc3339(ts).is_ok()
        || chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDate::parse_from_str(ts, "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(ParseError::InvalidField {
            field: "publishedAt",
            reason: format!("`{ts}` is not an ISO-8601 timestamp"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_fields_and_defaults() {
        let doc = parse_document("---\ntitle: Hello\nslug: hello\n---\n\nBody text\n").unwrap();
        assert_eq!(doc.frontmatter.title, "Hello");
        assert_eq!(doc.frontmatter.slug, "hello");
        assert!(doc.frontmatter.publish);
        assert!(!doc.frontmatter.enable_table_of_contents);
        assert!(!doc.frontmatter.disable_comments);
        assert!(doc.frontmatter.tags.is_empty());
        assert_eq!(doc.body, "Body text\n");
    }

    #[test]
    fn missing_delimiter_is_rejected() {
        assert_eq!(
            parse_document("title: Hello\n\nBody").unwrap_err(),
            ParseError::MissingFrontmatter
        );
        assert_eq!(
            parse_document("---\ntitle: Hello\nBody").unwrap_err(),
            ParseError::UnterminatedFrontmatter
        );
    }

    #[test]
    fn missing_or_blank_required_fields_are_rejected() {
        assert_eq!(
            parse_document("---\nslug: a\n---\nBody").unwrap_err(),
            ParseError::MissingField("title")
        );
        assert_eq!(
            parse_document("---\ntitle: A\nslug: '  '\n---\nBody").unwrap_err(),
            ParseError::MissingField("slug")
        );
    }

    #[test]
    fn empty_body_is_rejected() {
        assert_eq!(
            parse_document("---\ntitle: A\nslug: a\n---\n\n  \n").unwrap_err(),
            ParseError::EmptyBody
        );
    }

    #[test]
    fn booleans_accept_strings_case_insensitively() {
        let doc = parse_document(
            "---\ntitle: A\nslug: a\npublish: \"FALSE\"\ndisableComments: 'True'\nenableTableOfContents: true\n---\nBody",
        )
        .unwrap();
        assert!(!doc.frontmatter.publish);
        assert!(doc.frontmatter.disable_comments);
        assert!(doc.frontmatter.enable_table_of_contents);
        assert!(doc.frontmatter.is_delisted());
    }

    #[test]
    fn non_boolean_value_is_rejected() {
        let err = parse_document("---\ntitle: A\nslug: a\npublish: maybe\n---\nBody").unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "publish", .. }));
    }

    #[test]
    fn tags_keep_order_and_drop_empty_segments() {
        let doc =
            parse_document("---\ntitle: A\nslug: a\ntags: Rust, Web Dev,, CI \n---\nBody").unwrap();
        let names: Vec<_> = doc.frontmatter.tags.iter().map(|t| t.name.as_str()).collect();
        let slugs: Vec<_> = doc.frontmatter.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(names, ["Rust", "Web Dev", "CI"]);
        assert_eq!(slugs, ["rust", "web-dev", "ci"]);
    }

    #[test]
    fn tags_accept_yaml_sequence() {
        let doc = parse_document("---\ntitle: A\nslug: a\ntags: [one, two]\n---\nBody").unwrap();
        assert_eq!(doc.frontmatter.tags, vec![Tag::new("one"), Tag::new("two")]);
    }

    #[test]
    fn slug_is_normalized() {
        let doc = parse_document("---\ntitle: A\nslug: ' My  First Post '\n---\nBody").unwrap();
        assert_eq!(doc.frontmatter.slug, "my-first-post");
    }

    #[test]
    fn unknown_keys_are_kept_but_inert() {
        let doc =
            parse_document("---\ntitle: A\nslug: a\nseries: rust-101\ndraftNotes: [x]\n---\nBody")
                .unwrap();
        assert_eq!(doc.frontmatter.extra.len(), 2);
        assert_eq!(
            doc.frontmatter.extra.get("series"),
            Some(&Value::String("rust-101".into()))
        );
    }

    #[test]
    fn published_at_is_validated() {
        let ok = parse_document("---\ntitle: A\nslug: a\npublishedAt: 2024-03-01T10:00:00Z\n---\nBody")
            .unwrap();
        assert_eq!(ok.frontmatter.published_at.as_deref(), Some("2024-03-01T10:00:00Z"));
        assert!(parse_document("---\ntitle: A\nslug: a\npublishedAt: 2024-03-01\n---\nBody").is_ok());

        let err =
            parse_document("---\ntitle: A\nslug: a\npublishedAt: yesterday\n---\nBody").unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "publishedAt", .. }));
    }

    #[test]
    fn render_then_parse_round_trips_every_supported_field() {
        let mut fm = Frontmatter::new("Hello: World", "hello-world");
        fm.subtitle = Some("A subtitle".into());
        fm.tags = vec![Tag::new("Rust"), Tag::new("Open Source"), Tag::new("C, C++")];
        fm.enable_table_of_contents = true;
        fm.cover_image = Some("images/cover.jpg".into());
        fm.cover_image_attribution = Some("Photo by someone".into());
        fm.published_at = Some("2024-01-02T03:04:05Z".into());
        fm.publish = false;
        fm.disable_comments = true;
        fm.delisted = true;
        fm.extra.insert("series".into(), Value::String("intro".into()));

        let text = format!("{}\nBody\n", fm.render());
        let parsed = parse_document(&text).unwrap();
        assert_eq!(parsed.frontmatter, fm);
    }

    #[test]
    fn tag_names_with_commas_survive_render() {
        let doc = parse_document("---\ntitle: A\nslug: a\ntags: [\"C, C++\", Rust]\n---\nBody").unwrap();
        assert_eq!(doc.frontmatter.tags, vec![Tag::new("C, C++"), Tag::new("Rust")]);

        let text = format!("{}\nBody\n", doc.frontmatter.render());
        let reparsed = parse_document(&text).unwrap();
        assert_eq!(reparsed.frontmatter, doc.frontmatter);
    }

    #[test]
    fn leading_bom_and_blank_lines_are_tolerated() {
        let doc = parse_document("\u{feff}\n---\r\ntitle: A\r\nslug: a\r\n---\r\nBody").unwrap();
        assert_eq!(doc.frontmatter.slug, "a");
        assert_eq!(doc.body, "Body");
    }
}
