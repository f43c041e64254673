//! Formatting engine contract
//!
//! The citation/bibliography engine is a collaborator: the server depends
//! only on the narrow [`FormatEngine`] contract plus an [`EngineFactory`]
//! to build instances. Initializing an engine is expensive (style and
//! locale definitions are parsed up front), which is why instances are
//! pooled in [`pool`] instead of rebuilt per request. The built-in engine
//! lives in [`csl`].

pub mod csl;
pub mod pool;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::locales::LocaleStore;

/// Engine output markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Text,
    Rtf,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Html => "text/html",
            OutputFormat::Text => "text/plain",
            OutputFormat::Rtf => "text/rtf",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, EngineError> {
        match s {
            "html" => Ok(Self::Html),
            "text" => Ok(Self::Text),
            "rtf" => Ok(Self::Rtf),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Item identifier; JSON strings and integers both normalize to strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawItemId")]
pub struct ItemId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItemId {
    Text(String),
    Number(i64),
}

impl From<RawItemId> for ItemId {
    fn from(raw: RawItemId) -> Self {
        match raw {
            RawItemId::Text(s) => ItemId(s),
            RawItemId::Number(n) => ItemId(n.to_string()),
        }
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One citation cluster, in the caller's desired output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationCluster {
    #[serde(rename = "citationItems", default)]
    pub citation_items: Vec<CitationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

/// One cited item within a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Result of one bibliography generation: `[meta, entries]` on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct Bibliography(pub BibliographyMeta, pub Vec<String>);

#[derive(Debug, Clone, Serialize)]
pub struct BibliographyMeta {
    pub bibstart: String,
    pub bibend: String,
    pub entry_ids: Vec<Vec<String>>,
}

/// One appended citation: `[cluster index, rendered text]` on the wire.
pub type RenderedCitation = (usize, String);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid style definition: {0}")]
    StyleParse(String),

    #[error("invalid locale definition: {0}")]
    LocaleParse(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("citation rendering failed: {0}")]
    Render(String),
}

/// Narrow contract every pooled engine satisfies.
///
/// An instance is owned by exactly one pool entry or one in-flight request
/// at a time; ownership transfers, never duplicates. The pool clears item
/// bindings and processor state on both load and save, so a pooled engine
/// never carries another request's items.
pub trait FormatEngine: Send + Sync {
    /// Switch output markup before generation.
    fn set_output_format(&mut self, format: OutputFormat);

    /// Bind the request's item collection as the active item source.
    fn bind_items(&mut self, items: HashMap<String, Value>);

    /// Set the ordered list of active item IDs.
    fn update_items(&mut self, ids: &[ItemId]);

    /// Generate the bibliography for the active items, in order.
    fn make_bibliography(&mut self) -> Result<Bibliography, EngineError>;

    /// Append one citation cluster; returns `(cluster index, rendered)`
    /// pairs, the new cluster first.
    fn append_citation_cluster(
        &mut self,
        cluster: &CitationCluster,
    ) -> Result<Vec<RenderedCitation>, EngineError>;

    /// Drop the bound item collection.
    fn clear_items(&mut self);

    /// Reset per-request accumulation so the instance is safe to pool.
    fn restore_processor_state(&mut self);
}

/// Builds engine instances from style text and locale data.
pub trait EngineFactory: Send + Sync {
    fn build(
        &self,
        style_xml: &str,
        locales: &LocaleStore,
        locale: &str,
    ) -> Result<Box<dyn FormatEngine>, EngineError>;
}
