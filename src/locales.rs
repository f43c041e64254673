//! Locale store
//!
//! Immutable, process-wide mapping from locale code to locale definition
//! text, built once at startup by scanning the locale directory. Read-only
//! after initialization.

use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Fallback locale; every store is guaranteed to contain it.
pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Debug, Clone)]
pub struct LocaleStore {
    locales: HashMap<String, String>,
}

impl LocaleStore {
    /// Scan `dir` for `locales-<code>.xml` files and load them all.
    ///
    /// Fails if the directory cannot be read or no `en-US` definition is
    /// present: `retrieve` falls back to `en-US`, so the store is unusable
    /// without it.
    pub async fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut locales = HashMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(code) = name
                .strip_prefix("locales-")
                .and_then(|n| n.strip_suffix(".xml"))
            else {
                continue;
            };
            let text = tokio::fs::read_to_string(entry.path()).await?;
            locales.insert(code.to_string(), text);
        }
        if !locales.contains_key(DEFAULT_LOCALE) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {} locale definition in {}", DEFAULT_LOCALE, dir.display()),
            ));
        }
        Ok(Self { locales })
    }

    /// Look up a locale definition, falling back to `en-US` for unknown
    /// codes.
    pub fn retrieve(&self, lang: &str) -> &str {
        match self.locales.get(lang) {
            Some(text) => text.as_str(),
            None => self.locales[DEFAULT_LOCALE].as_str(),
        }
    }

    /// Number of loaded locales.
    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    /// Test-only constructor; callers must include `en-US`.
    #[cfg(test)]
    pub(crate) fn from_entries(entries: &[(&str, &str)]) -> Self {
        let locales: HashMap<String, String> = entries
            .iter()
            .map(|(code, text)| (code.to_string(), text.to_string()))
            .collect();
        debug_assert!(locales.contains_key(DEFAULT_LOCALE));
        Self { locales }
    }
}
