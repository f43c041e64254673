//! Style identity and retrieval
//!
//! Resolving a style name to its canonical URL and fetching the style
//! definition text is a collaborator concern; the server consumes it
//! through the [`StyleResolver`] trait. The default implementation serves
//! styles under the canonical base URL from a local repository directory
//! and fetches any other absolute URL over HTTP.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Canonical identity of a style.
///
/// Two requests naming the same style in different spellings resolve to
/// the same `href`, which is the style component of the pool cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleUrl {
    /// Canonical URL.
    pub href: String,
    /// Short name, when the identifier sits under the canonical base.
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("invalid style identifier: {0}")]
    InvalidIdentifier(String),

    #[error("style not found: {0}")]
    NotFound(String),

    #[error("failed to read style: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch style: {0}")]
    Http(#[from] reqwest::Error),
}

/// Style resolution and fetch collaborator.
#[async_trait]
pub trait StyleResolver: Send + Sync {
    /// Normalize a requested style identifier into a canonical URL.
    ///
    /// Pure: short names resolve under the configured base URL, absolute
    /// URLs pass through.
    fn process_style_identifier(&self, identifier: &str) -> Result<StyleUrl, StyleError>;

    /// Resolve the normalized URL to its final canonical form. May suspend
    /// on I/O.
    async fn resolve_style(&self, style: &StyleUrl) -> Result<StyleUrl, StyleError>;

    /// Fetch the style definition text. May suspend on I/O.
    async fn fetch_style(&self, style: &StyleUrl) -> Result<String, StyleError>;
}

/// Default resolver backed by a local repository of `<name>.csl` files.
pub struct FileStyleResolver {
    dir: PathBuf,
    base_url: String,
    client: reqwest::Client,
}

impl FileStyleResolver {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            dir: dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Repository path for styles under the canonical base; `None` for
    /// foreign URLs, which are fetched over HTTP instead.
    fn local_path(&self, style: &StyleUrl) -> Option<PathBuf> {
        style
            .name
            .as_ref()
            .map(|name| self.dir.join(format!("{}.csl", name)))
    }
}

#[async_trait]
impl StyleResolver for FileStyleResolver {
    fn process_style_identifier(&self, identifier: &str) -> Result<StyleUrl, StyleError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(StyleError::InvalidIdentifier("empty style name".to_string()));
        }
        if identifier.contains("://") {
            let name = identifier
                .strip_prefix(&self.base_url)
                .map(|rest| rest.trim_start_matches('/').to_string())
                .filter(|name| !name.is_empty() && is_style_name(name));
            Ok(StyleUrl {
                href: identifier.to_string(),
                name,
            })
        } else if is_style_name(identifier) {
            Ok(StyleUrl {
                href: format!("{}/{}", self.base_url, identifier),
                name: Some(identifier.to_string()),
            })
        } else {
            Err(StyleError::InvalidIdentifier(identifier.to_string()))
        }
    }

    async fn resolve_style(&self, style: &StyleUrl) -> Result<StyleUrl, StyleError> {
        // local styles are canonical already; confirm the file exists so a
        // bad name fails here rather than at fetch time
        if let Some(path) = self.local_path(style) {
            if !tokio::fs::try_exists(&path).await? {
                return Err(StyleError::NotFound(style.href.clone()));
            }
        }
        Ok(style.clone())
    }

    async fn fetch_style(&self, style: &StyleUrl) -> Result<String, StyleError> {
        match self.local_path(style) {
            Some(path) => Ok(tokio::fs::read_to_string(path).await?),
            None => {
                let response = self
                    .client
                    .get(&style.href)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }
}

/// Short style names: path-safe slugs only.
fn is_style_name(s: &str) -> bool {
    !s.is_empty()
        && !s.contains("..")
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FileStyleResolver {
        FileStyleResolver::new("/tmp/styles", "http://www.zotero.org/styles")
    }

    #[test]
    fn short_name_resolves_under_base_url() {
        let url = resolver().process_style_identifier("apa").unwrap();
        assert_eq!(url.href, "http://www.zotero.org/styles/apa");
        assert_eq!(url.name.as_deref(), Some("apa"));
    }

    #[test]
    fn absolute_url_under_base_recovers_short_name() {
        let url = resolver()
            .process_style_identifier("http://www.zotero.org/styles/apa")
            .unwrap();
        assert_eq!(url.href, "http://www.zotero.org/styles/apa");
        assert_eq!(url.name.as_deref(), Some("apa"));
    }

    #[test]
    fn same_style_spelled_two_ways_shares_canonical_url() {
        let short = resolver().process_style_identifier("apa").unwrap();
        let long = resolver()
            .process_style_identifier("http://www.zotero.org/styles/apa")
            .unwrap();
        assert_eq!(short.href, long.href);
    }

    #[test]
    fn foreign_url_has_no_local_name() {
        let url = resolver()
            .process_style_identifier("https://example.com/styles/my-style.csl")
            .unwrap();
        assert_eq!(url.name, None);
    }

    #[test]
    fn rejects_path_traversal_and_empty_names() {
        assert!(resolver().process_style_identifier("").is_err());
        assert!(resolver().process_style_identifier("../etc/passwd").is_err());
        assert!(resolver().process_style_identifier("a/b").is_err());
    }

    #[tokio::test]
    async fn resolve_and_fetch_from_repository() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("apa.csl"), "<style/>").unwrap();
        let resolver = FileStyleResolver::new(dir.path(), "http://www.zotero.org/styles");

        let url = resolver.process_style_identifier("apa").unwrap();
        let url = resolver.resolve_style(&url).await.unwrap();
        assert_eq!(resolver.fetch_style(&url).await.unwrap(), "<style/>");
    }

    #[tokio::test]
    async fn unknown_style_fails_at_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileStyleResolver::new(dir.path(), "http://www.zotero.org/styles");

        let url = resolver.process_style_identifier("no-such-style").unwrap();
        assert!(matches!(
            resolver.resolve_style(&url).await,
            Err(StyleError::NotFound(_))
        ));
    }
}
