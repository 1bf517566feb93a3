//! Rewrites document-relative image references into raw-content URLs.
//!
//! Resolution is purely lexical: paths are joined and normalized, never
//! checked on disk. Already-absolute URLs pass through untouched, so running
//! the resolver twice gives the same result.

use std::path::{Component, Path};
use std::sync::OnceLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::{Captures, Regex};

use crate::error::AssetPathError;

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // ![alt](target "title"), ![alt](<target with spaces>) and one level
        // of balanced parentheses inside a bare target.
        Regex::new(r#"!\[([^\]]*)\]\(\s*(<[^>]*>|(?:[^()\s]|\([^()\s]*\))+)([^)]*)\)"#)
            .expect("image reference regex is valid")
    })
}

/// Resolves repository-relative asset paths against a raw-content base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResolver {
    base_url: String,
}

impl AssetResolver {
    /// `base_url` already includes the repository and ref, e.g.
    /// `https://raw.githubusercontent.com/owner/repo/main`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        AssetResolver { base_url }
    }

    /// Build the base URL from the raw-content host, `owner/repo` and a git ref
    /// such as `refs/heads/main`.
    pub fn for_repository(raw_content_url: &str, repository: &str, git_ref: &str) -> Self {
        Self::new(format!(
            "{}/{}/{}",
            raw_content_url.trim_end_matches('/'),
            repository.trim_matches('/'),
            ref_name(git_ref)
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve one reference found in a document living in `doc_dir`
    /// (relative to the repository root).
    pub fn resolve_reference(
        &self,
        reference: &str,
        doc_dir: &Path,
    ) -> Result<String, AssetPathError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AssetPathError::Empty);
        }
        if is_absolute_url(reference) {
            return Ok(reference.to_string());
        }

        let (path_part, suffix) = match reference.find(['?', '#']) {
            Some(idx) => reference.split_at(idx),
            None => (reference, ""),
        };

        let segments = normalize(doc_dir, path_part)?;
        let encoded = segments
            .iter()
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!("{}/{}{}", self.base_url, encoded, suffix))
    }

    /// Rewrite every relative markdown image reference in `body`.
    pub fn resolve_body(&self, body: &str, doc_dir: &Path) -> Result<String, AssetPathError> {
        let mut out = String::with_capacity(body.len());
        let mut last = 0;

        for caps in image_regex().captures_iter(body) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&body[last..whole.start()]);
            out.push_str(&self.rewrite_image(&caps, doc_dir)?);
            last = whole.end();
        }
        out.push_str(&body[last..]);
        Ok(out)
    }

    fn rewrite_image(&self, caps: &Captures<'_>, doc_dir: &Path) -> Result<String, AssetPathError> {
        let alt = caps.get(1).map_or("", |m| m.as_str());
        let raw_target = caps.get(2).map_or("", |m| m.as_str());
        let title = caps.get(3).map_or("", |m| m.as_str());

        let target = raw_target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(raw_target);

        if is_absolute_url(target) {
            return Ok(caps[0].to_string());
        }
        let url = self.resolve_reference(target, doc_dir)?;
        Ok(format!("![{alt}]({url}{title})"))
    }
}

/// Last segment of a git ref: `refs/heads/main` becomes `main`.
pub fn ref_name(git_ref: &str) -> &str {
    git_ref.rsplit('/').next().unwrap_or(git_ref)
}

/// True for targets carrying a scheme (`https:`, `data:`, ...) or starting with `//`.
pub fn is_absolute_url(target: &str) -> bool {
    if target.starts_with("//") {
        return true;
    }
    match target.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Join `target` onto `doc_dir` and collapse `.`/`..` segments.
/// A leading `/` makes `target` relative to the repository root.
fn normalize(doc_dir: &Path, target: &str) -> Result<Vec<String>, AssetPathError> {
    let mut stack: Vec<String> = Vec::new();

    if !target.starts_with('/') {
        for component in doc_dir.components() {
            match component {
                Component::Normal(part) => stack.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    if stack.pop().is_none() {
                        return Err(AssetPathError::EscapesRoot(target.to_string()));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
    }

    for part in target.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(AssetPathError::EscapesRoot(target.to_string()));
                }
            }
            part => stack.push(percent_decode_str(part).decode_utf8_lossy().into_owned()),
        }
    }

    if stack.is_empty() {
        return Err(AssetPathError::Empty);
    }
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetResolver {
        AssetResolver::new("https://raw.example.com/main")
    }

    #[test]
    fn cover_image_resolves_against_document_directory() {
        let url = resolver()
            .resolve_reference("images/cover.jpg", Path::new("posts/a"))
            .unwrap();
        assert_eq!(url, "https://raw.example.com/main/posts/a/images/cover.jpg");
    }

    #[test]
    fn absolute_urls_are_unchanged() {
        let r = resolver();
        assert_eq!(
            r.resolve_reference("https://x/y.png", Path::new("posts")).unwrap(),
            "https://x/y.png"
        );
        assert_eq!(
            r.resolve_reference("//cdn.example.com/y.png", Path::new("posts")).unwrap(),
            "//cdn.example.com/y.png"
        );
        assert!(is_absolute_url("data:image/png;base64,AAAA"));
        assert!(!is_absolute_url("images/a:b.png"));
    }

    #[test]
    fn parent_segments_are_collapsed() {
        let url = resolver()
            .resolve_reference("../shared/./logo.png", Path::new("posts/a"))
            .unwrap();
        assert_eq!(url, "https://raw.example.com/main/posts/shared/logo.png");
    }

    #[test]
    fn escaping_the_root_is_an_error() {
        let err = resolver()
            .resolve_reference("../../../etc/passwd", Path::new("posts/a"))
            .unwrap_err();
        assert_eq!(err, AssetPathError::EscapesRoot("../../../etc/passwd".into()));
    }

    #[test]
    fn leading_slash_is_repository_relative() {
        let url = resolver()
            .resolve_reference("/assets/x.png", Path::new("posts/a"))
            .unwrap();
        assert_eq!(url, "https://raw.example.com/main/assets/x.png");
    }

    #[test]
    fn segments_are_percent_encoded_once() {
        let r = resolver();
        let spaced = r.resolve_reference("my image.png", Path::new("posts")).unwrap();
        let pre_encoded = r.resolve_reference("my%20image.png", Path::new("posts")).unwrap();
        assert_eq!(spaced, "https://raw.example.com/main/posts/my%20image.png");
        assert_eq!(spaced, pre_encoded);
    }

    #[test]
    fn body_images_are_rewritten_and_idempotent() {
        let body = "Intro\n![Diagram](img/d.png \"The diagram\")\n![remote](https://x/y.png)\n![](<my pic.jpg>)\n[link](other.md)\n";
        let r = resolver();
        let once = r.resolve_body(body, Path::new("posts/a")).unwrap();
        assert_eq!(
            once,
            "Intro\n![Diagram](https://raw.example.com/main/posts/a/img/d.png \"The diagram\")\n![remote](https://x/y.png)\n![](https://raw.example.com/main/posts/a/my%20pic.jpg)\n[link](other.md)\n"
        );
        let twice = r.resolve_body(&once, Path::new("posts/a")).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn balanced_parentheses_stay_in_the_target() {
        let r = resolver();
        let once = r
            .resolve_body("![a](img/diagram(1).png) and ![b](b.png \"t\")", Path::new("posts"))
            .unwrap();
        assert_eq!(
            once,
            "![a](https://raw.example.com/main/posts/img/diagram(1).png) and ![b](https://raw.example.com/main/posts/b.png \"t\")"
        );
        assert_eq!(r.resolve_body(&once, Path::new("posts")).unwrap(), once);
    }

    #[test]
    fn body_with_escaping_image_fails() {
        let err = resolver()
            .resolve_body("![x](../../x.png)", Path::new("posts"))
            .unwrap_err();
        assert!(matches!(err, AssetPathError::EscapesRoot(_)));
    }

    #[test]
    fn base_url_is_built_from_repository_and_ref() {
        let r = AssetResolver::for_repository(
            "https://raw.githubusercontent.com/",
            "owner/blog",
            "refs/heads/main",
        );
        assert_eq!(r.base_url(), "https://raw.githubusercontent.com/owner/blog/main");
    }
}
