//! Turns raw CI path lists into the set of documents to publish or remove.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::frontmatter::normalize_slug;

/// Raw path lists as handed over by the CI workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeInputs {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeInputs {
    /// Build inputs from delimited strings, see [`split_path_list`].
    pub fn from_lists(added: &str, changed: &str, deleted: &str) -> Self {
        ChangeInputs {
            added: split_path_list(added),
            changed: split_path_list(changed),
            deleted: split_path_list(deleted),
        }
    }
}

/// A document that disappeared from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedDocument {
    pub path: PathBuf,
    /// Derived from the file name, since the content is gone.
    pub slug: String,
}

/// Documents to reconcile, split by what happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<DeletedDocument>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Split a path list.
///
/// Lists containing a newline or comma are split on those only, so paths with
/// spaces survive; otherwise the list is split on whitespace.
pub fn split_path_list(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = if raw.contains(['\n', ',']) {
        raw.split(['\n', ',']).collect()
    } else {
        raw.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Slug for a deleted document: its file stem, normalized like a frontmatter slug.
pub fn slug_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let slug = normalize_slug(&stem);
    (!slug.is_empty()).then_some(slug)
}

/// Classify the inputs into a [`ChangeSet`].
///
/// Only markdown files under `posts_root` are kept. A path listed as both
/// added and changed is treated as added. Added or changed paths for which
/// `exists` returns false are treated as deleted.
pub fn classify<F>(inputs: &ChangeInputs, posts_root: &Path, exists: F) -> ChangeSet
where
    F: Fn(&Path) -> bool,
{
    let posts_root = normalize_path(&posts_root.to_string_lossy());
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut set = ChangeSet::default();

    let mut accept = |raw: &str| -> Option<PathBuf> {
        let path = normalize_path(raw);
        if !is_post_path(&path, &posts_root) {
            debug!(path = %raw, "Skipping path outside posts directory or not markdown");
            return None;
        }
        seen.insert(path.clone()).then_some(path)
    };

    let mut present = Vec::new();
    for raw in &inputs.added {
        if let Some(path) = accept(raw) {
            present.push((path, true));
        }
    }
    for raw in &inputs.changed {
        if let Some(path) = accept(raw) {
            present.push((path, false));
        }
    }
    let mut removed = Vec::new();
    for raw in &inputs.deleted {
        if let Some(path) = accept(raw) {
            removed.push(path);
        }
    }

    for (path, is_added) in present {
        if !exists(&path) {
            removed.push(path);
        } else if is_added {
            set.added.push(path);
        } else {
            set.modified.push(path);
        }
    }

    for path in removed {
        match slug_from_path(&path) {
            Some(slug) => set.deleted.push(DeletedDocument { path, slug }),
            None => debug!(path = %path.display(), "Cannot derive a slug for deleted path"),
        }
    }

    debug!(
        added = set.added.len(),
        modified = set.modified.len(),
        deleted = set.deleted.len(),
        "Classified changes"
    );
    set
}

fn normalize_path(raw: &str) -> PathBuf {
    let cleaned = raw.trim().replace('\\', "/");
    let mut rest = cleaned.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if rest == "." {
        rest = "";
    }
    PathBuf::from(rest.trim_end_matches('/'))
}

fn is_post_path(path: &Path, posts_root: &Path) -> bool {
    let is_markdown = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));
    is_markdown && path.starts_with(posts_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(_: &Path) -> bool {
        true
    }

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn split_handles_each_delimiter() {
        assert_eq!(split_path_list("a.md b.md\tc.md"), ["a.md", "b.md", "c.md"]);
        assert_eq!(split_path_list("a.md\nmy post.md\n"), ["a.md", "my post.md"]);
        assert_eq!(split_path_list("a.md, b.md"), ["a.md", "b.md"]);
        assert!(split_path_list("  ").is_empty());
    }

    #[test]
    fn added_takes_precedence_over_changed() {
        let inputs = ChangeInputs {
            added: vec!["posts/a.md".into()],
            changed: vec!["posts/a.md".into(), "posts/b.md".into()],
            deleted: vec![],
        };
        let set = classify(&inputs, Path::new("posts"), always);
        assert_eq!(set.added, paths(&["posts/a.md"]));
        assert_eq!(set.modified, paths(&["posts/b.md"]));
        assert!(set.deleted.is_empty());
    }

    #[test]
    fn non_markdown_and_outside_files_are_excluded() {
        let inputs = ChangeInputs {
            added: vec![
                "posts/a.md".into(),
                "posts/img/cover.png".into(),
                "README.md".into(),
                "postsextra/x.md".into(),
                "./posts/B.MARKDOWN".into(),
            ],
            ..Default::default()
        };
        let set = classify(&inputs, Path::new("posts"), always);
        assert_eq!(set.added, paths(&["posts/a.md", "posts/B.MARKDOWN"]));
    }

    #[test]
    fn empty_posts_root_accepts_whole_repository() {
        let inputs = ChangeInputs {
            added: vec!["README.md".into(), "blog/x.md".into()],
            ..Default::default()
        };
        let set = classify(&inputs, Path::new(""), always);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn changed_but_missing_files_become_deletions() {
        let inputs = ChangeInputs {
            changed: vec!["posts/gone.md".into(), "posts/here.md".into()],
            deleted: vec!["posts/Old Post.md".into()],
            ..Default::default()
        };
        let set = classify(&inputs, Path::new("posts"), |p| p.ends_with("here.md"));
        assert_eq!(set.modified, paths(&["posts/here.md"]));
        let slugs: Vec<_> = set.deleted.iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, ["old-post", "gone"]);
    }

    #[test]
    fn duplicates_are_collapsed() {
        let inputs = ChangeInputs {
            added: vec!["posts/a.md".into(), "./posts/a.md".into()],
            deleted: vec!["posts/a.md".into()],
            ..Default::default()
        };
        let set = classify(&inputs, Path::new("./posts/"), always);
        assert_eq!(set.added, paths(&["posts/a.md"]));
        assert!(set.deleted.is_empty());
    }
}
