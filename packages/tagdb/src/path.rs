//! Path resolver: slash paths → tag sequences.
//!
//! A path is a sequence of tags optionally followed by a file name. Whether
//! the last component is a name or a tag depends on the target hint and on a
//! trailing `/`.

use std::fmt;
use std::str::FromStr;

use crate::catalog::{Tag, ROOT_TAG};
use crate::error::TagDbError;

/// What the caller expects a path to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    File,
    Dir,
    /// Either; the classifier decides.
    Unsure,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::File => "file",
            Target::Dir => "dir",
            Target::Unsure => "unsure",
        }
    }
}

impl FromStr for Target {
    type Err = TagDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Target::File),
            "dir" => Ok(Target::Dir),
            "unsure" => Ok(Target::Unsure),
            other => Err(TagDbError::InvalidTarget(other.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a path on `/`, dropping empty components.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// A tokenized path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    components: Vec<String>,
    trailing_slash: bool,
}

impl TagPath {
    pub fn parse(path: &str) -> Self {
        Self {
            components: split_path(path).into_iter().map(str::to_string).collect(),
            trailing_slash: path.ends_with('/'),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// True when the path itself says "directory" (`/x/`, or the root).
    pub fn ends_with_slash(&self) -> bool {
        self.trailing_slash || self.components.is_empty()
    }

    /// All components as tags; the root is `["/"]`.
    pub fn dir_tags(&self) -> Vec<Tag> {
        if self.components.is_empty() {
            vec![ROOT_TAG.to_string()]
        } else {
            self.components.clone()
        }
    }

    /// Leading components as tags plus the last one as a file name.
    ///
    /// A single component is a root-level file (`["/"]`, name). `None` when
    /// the path has no components or ends with `/`.
    pub fn file_parts(&self) -> Option<(Vec<Tag>, &str)> {
        if self.ends_with_slash() {
            return None;
        }
        let (name, tags) = self.components.split_last()?;
        let tags = if tags.is_empty() {
            vec![ROOT_TAG.to_string()]
        } else {
            tags.to_vec()
        };
        Some((tags, name.as_str()))
    }
}

/// Result of `resolve_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub tags: Vec<Tag>,
    pub name: Option<String>,
}

/// Translate a path and target hint into `(tags, maybe filename)`.
///
/// `File`, or `Unsure` without a trailing `/`, splits off a file name.
/// `Dir`, or a trailing `/`, keeps every component as a tag.
pub fn resolve_path(path: &str, target: Target) -> ParsedPath {
    let parsed = TagPath::parse(path);
    let wants_file = match target {
        Target::File | Target::Unsure => !parsed.ends_with_slash(),
        Target::Dir => false,
    };

    if wants_file {
        if let Some((tags, name)) = parsed.file_parts() {
            return ParsedPath {
                tags,
                name: Some(name.to_string()),
            };
        }
    }

    ParsedPath {
        tags: parsed.dir_tags(),
        name: None,
    }
}

/// Render a file placement as a path: `/<tags...>/<name>`. `"/"` tags are
/// skipped, so a root file renders as `/<name>`.
pub fn join_file_path<'a, I>(tags: I, name: &str) -> String
where
    I: IntoIterator<Item = &'a Tag>,
{
    let mut path = String::from("/");
    for tag in tags {
        if tag == ROOT_TAG {
            continue;
        }
        path.push_str(tag);
        path.push('/');
    }
    path.push_str(name);
    path
}

/// Render a tag sequence as a directory path.
pub fn join_dir_path(tags: &[Tag]) -> String {
    let user: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|t| *t != ROOT_TAG)
        .collect();
    format!("/{}", user.join("/"))
}
