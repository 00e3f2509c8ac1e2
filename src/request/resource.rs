use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceParseError {
    #[error("empty resource identifier")]
    Empty,

    #[error("custom resource '{0}' is missing an identifier after ':'")]
    MissingIdentifier(String),
}

/// Identifier of the thing an image is loaded for
///
/// The set of variants is deliberately small; anything that is not a URL,
/// a local file or a platform asset goes through [`Resource::Custom`] with a
/// caller-chosen `kind` that concrete managers match on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Url(String),
    File(PathBuf),
    Asset(String),
    Custom { kind: String, id: String },
}

impl Resource {
    pub fn url(url: impl Into<String>) -> Self {
        Resource::Url(url.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Resource::File(path.into())
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Resource::Asset(id.into())
    }

    pub fn custom(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Resource::Custom {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Lowercased URL scheme for [`Resource::Url`], `None` for other variants
    pub fn scheme(&self) -> Option<String> {
        match self {
            Resource::Url(url) => url
                .split_once("://")
                .map(|(scheme, _)| scheme.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Lowercased file extension of the last path segment, if any
    ///
    /// Works for URLs (query and fragment are ignored) and file paths.
    pub fn extension(&self) -> Option<String> {
        let last_segment = match self {
            Resource::Url(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url.as_str());
                let path = without_query
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(without_query);
                // "host" alone has no path segment
                let (_, path) = path.split_once('/')?;
                path.rsplit('/').next()?.to_string()
            }
            Resource::File(path) => path.file_name()?.to_string_lossy().into_owned(),
            Resource::Asset(_) | Resource::Custom { .. } => return None,
        };

        let (stem, ext) = last_segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Url(url) => write!(f, "{url}"),
            Resource::File(path) => write!(f, "file://{}", path.display()),
            Resource::Asset(id) => write!(f, "asset:{id}"),
            Resource::Custom { kind, id } => write!(f, "{kind}:{id}"),
        }
    }
}

impl FromStr for Resource {
    type Err = ResourceParseError;

    /// `http(s)://…` → URL, `file://…` or a bare path → file,
    /// `asset:<id>` → asset, `<kind>:<id>` → custom.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ResourceParseError::Empty);
        }

        if let Some(path) = s.strip_prefix("file://") {
            return Ok(Resource::file(path));
        }

        if let Some((scheme, _)) = s.split_once("://") {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                return Ok(Resource::url(s));
            }
        }

        if let Some((kind, id)) = s.split_once(':') {
            // Windows drive letters ("C:\...") and paths are not custom kinds
            let looks_like_kind = kind.len() > 1
                && kind
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if looks_like_kind {
                if id.is_empty() {
                    return Err(ResourceParseError::MissingIdentifier(kind.to_string()));
                }
                return Ok(if kind == "asset" {
                    Resource::asset(id)
                } else {
                    Resource::custom(kind, id)
                });
            }
        }

        Ok(Resource::file(s))
    }
}
