//! Built-in CSL-class formatting engine
//!
//! Interprets just enough of a CSL style definition to drive formatting:
//! the citation-format category (author-date, numeric, label, note,
//! author) selects the citation and bibliography renderers, and the locale
//! definition supplies connective terms. Everything deeper sits behind the
//! [`FormatEngine`] trait, so a richer engine can replace this one without
//! touching the pool or the pipeline.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::locales::LocaleStore;

use super::{
    Bibliography, BibliographyMeta, CitationCluster, CitationItem, EngineError, EngineFactory,
    FormatEngine, ItemId, OutputFormat, RenderedCitation,
};

/// Citation-format category declared by a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationFormat {
    #[default]
    AuthorDate,
    Author,
    Numeric,
    Label,
    Note,
}

impl CitationFormat {
    fn from_category(s: &str) -> Self {
        match s {
            "author-date" => Self::AuthorDate,
            "author" => Self::Author,
            "numeric" => Self::Numeric,
            "label" => Self::Label,
            "note" => Self::Note,
            _ => Self::AuthorDate,
        }
    }
}

/// Parsed style identity and formatting class.
#[derive(Debug, Clone)]
pub struct CslStyle {
    pub id: String,
    pub title: String,
    pub class: String,
    pub citation_format: CitationFormat,
}

enum TextTarget {
    Id,
    Title,
}

impl CslStyle {
    /// Extract identity and category from a CSL style definition.
    pub fn parse(xml: &str) -> Result<Self, EngineError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut id = String::new();
        let mut title = String::new();
        let mut class = String::new();
        let mut citation_format = None;
        let mut saw_style = false;
        let mut target: Option<TextTarget> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"style" => {
                        saw_style = true;
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"class" {
                                class = attr_value(&attr).map_err(EngineError::StyleParse)?;
                            }
                        }
                    }
                    b"category" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"citation-format" {
                                let value = attr_value(&attr).map_err(EngineError::StyleParse)?;
                                citation_format = Some(CitationFormat::from_category(&value));
                            }
                        }
                    }
                    b"id" if id.is_empty() => target = Some(TextTarget::Id),
                    b"title" if title.is_empty() => target = Some(TextTarget::Title),
                    _ => target = None,
                },
                Ok(Event::Text(t)) => {
                    if let Some(target) = target.take() {
                        let text = t
                            .unescape()
                            .map_err(|e| EngineError::StyleParse(e.to_string()))?
                            .into_owned();
                        match target {
                            TextTarget::Id => id = text,
                            TextTarget::Title => title = text,
                        }
                    }
                }
                Ok(Event::End(_)) => target = None,
                Ok(Event::Eof) => break,
                Err(e) => return Err(EngineError::StyleParse(e.to_string())),
                _ => {}
            }
        }

        if !saw_style {
            return Err(EngineError::StyleParse(
                "missing <style> root element".to_string(),
            ));
        }
        Ok(Self {
            id,
            title,
            class,
            citation_format: citation_format.unwrap_or_default(),
        })
    }
}

/// Connective terms from a locale definition.
#[derive(Debug, Clone, Default)]
pub struct LocaleTerms {
    terms: HashMap<String, String>,
}

impl LocaleTerms {
    pub fn parse(xml: &str) -> Result<Self, EngineError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut terms = HashMap::new();
        let mut current: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"term" => {
                    current = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            current = Some(attr_value(&attr).map_err(EngineError::LocaleParse)?);
                        }
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(name) = current.take() {
                        let text = t
                            .unescape()
                            .map_err(|e| EngineError::LocaleParse(e.to_string()))?;
                        // plural and short forms reuse the name; keep the
                        // first form the file lists
                        terms.entry(name).or_insert_with(|| text.into_owned());
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(EngineError::LocaleParse(e.to_string())),
                _ => {}
            }
        }
        Ok(Self { terms })
    }

    /// Term text, with built-in fallbacks for the few terms the renderers
    /// depend on.
    pub fn term(&self, name: &str) -> &str {
        if let Some(text) = self.terms.get(name) {
            return text;
        }
        match name {
            "and" => "and",
            "et-al" => "et al.",
            "no date" => "n.d.",
            "anonymous" => "Anonymous",
            _ => "",
        }
    }
}

fn attr_value(attr: &quick_xml::events::attributes::Attribute<'_>) -> Result<String, String> {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .map_err(|e| e.to_string())
}

impl OutputFormat {
    fn escape(&self, s: &str) -> String {
        match self {
            OutputFormat::Html => html_escape::encode_text(s).into_owned(),
            OutputFormat::Text => s.to_string(),
            OutputFormat::Rtf => s
                .replace('\\', "\\\\")
                .replace('{', "\\{")
                .replace('}', "\\}"),
        }
    }

    fn italic(&self, s: &str) -> String {
        match self {
            OutputFormat::Html => format!("<i>{}</i>", s),
            OutputFormat::Text => s.to_string(),
            OutputFormat::Rtf => format!("{{\\i {}}}", s),
        }
    }

    fn entry(&self, s: &str) -> String {
        match self {
            OutputFormat::Html => format!("  <div class=\"csl-entry\">{}</div>\n", s),
            OutputFormat::Text => format!("{}\n", s),
            OutputFormat::Rtf => format!("{}\\line ", s),
        }
    }

    fn bibstart(&self) -> &'static str {
        match self {
            OutputFormat::Html => "<div class=\"csl-bib-body\">\n",
            OutputFormat::Text => "",
            OutputFormat::Rtf => "{\\rtf ",
        }
    }

    fn bibend(&self) -> &'static str {
        match self {
            OutputFormat::Html => "</div>",
            OutputFormat::Text => "",
            OutputFormat::Rtf => "}",
        }
    }
}

/// Author names as (family, given) pairs; `literal` names collapse into
/// the family slot.
fn item_authors(item: &Value) -> Vec<(String, String)> {
    let Some(authors) = item.get("author").and_then(Value::as_array) else {
        return Vec::new();
    };
    authors
        .iter()
        .filter_map(|author| {
            if let Some(literal) = author.get("literal").and_then(Value::as_str) {
                return Some((literal.to_string(), String::new()));
            }
            let family = author.get("family").and_then(Value::as_str)?.to_string();
            let given = author
                .get("given")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((family, given))
        })
        .collect()
}

fn item_title(item: &Value) -> Option<&str> {
    item.get("title").and_then(Value::as_str)
}

/// Issue year from `issued.date-parts`, or the literal/raw date text.
fn item_year(item: &Value) -> Option<String> {
    let issued = item.get("issued")?;
    if let Some(parts) = issued.get("date-parts").and_then(Value::as_array) {
        let year = parts.first()?.as_array()?.first()?;
        return match year {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        };
    }
    issued
        .get("literal")
        .or_else(|| issued.get("raw"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Bibliography name list: first author inverted, the rest in given-family
/// order, `et al.` beyond three names.
fn format_bib_authors(
    authors: &[(String, String)],
    and_term: &str,
    et_al: &str,
    anonymous: &str,
) -> String {
    let full = |a: &(String, String)| {
        if a.1.is_empty() {
            a.0.clone()
        } else {
            format!("{} {}", a.1, a.0)
        }
    };
    let inverted = |a: &(String, String)| {
        if a.1.is_empty() {
            a.0.clone()
        } else {
            format!("{}, {}", a.0, a.1)
        }
    };
    match authors {
        [] => anonymous.to_string(),
        [a] => inverted(a),
        [a, b] => format!("{}, {} {}", inverted(a), and_term, full(b)),
        [a, b, c] => format!("{}, {}, {} {}", inverted(a), full(b), and_term, full(c)),
        [a, ..] => format!("{}, {}", inverted(a), et_al),
    }
}

/// Pooled engine instance bound to one style+locale.
pub struct CslEngine {
    style: CslStyle,
    terms: LocaleTerms,
    output: OutputFormat,
    items: HashMap<String, Value>,
    active_ids: Vec<ItemId>,
    /// Appearance-order registry for numeric citation numbering; cleared
    /// by `restore_processor_state`.
    cited_ids: Vec<ItemId>,
    /// Clusters appended since the last state restore.
    cluster_count: usize,
}

impl CslEngine {
    fn new(style: CslStyle, terms: LocaleTerms) -> Self {
        Self {
            style,
            terms,
            output: OutputFormat::default(),
            items: HashMap::new(),
            active_ids: Vec::new(),
            cited_ids: Vec::new(),
            cluster_count: 0,
        }
    }

    fn item(&self, id: &ItemId) -> Result<&Value, EngineError> {
        self.items
            .get(&id.0)
            .ok_or_else(|| EngineError::Render(format!("unknown item id: {}", id)))
    }

    /// 1-based citation number: position among the active IDs, otherwise
    /// appearance order behind them.
    fn citation_number(&mut self, id: &ItemId) -> usize {
        if let Some(pos) = self.active_ids.iter().position(|a| a == id) {
            return pos + 1;
        }
        if let Some(pos) = self.cited_ids.iter().position(|c| c == id) {
            return self.active_ids.len() + pos + 1;
        }
        self.cited_ids.push(id.clone());
        self.active_ids.len() + self.cited_ids.len()
    }

    fn short_author(&self, item: &Value) -> String {
        let authors = item_authors(item);
        match authors.len() {
            0 => self.terms.term("anonymous").to_string(),
            1 => authors[0].0.clone(),
            2 => format!(
                "{} {} {}",
                authors[0].0,
                self.terms.term("and"),
                authors[1].0
            ),
            _ => format!("{} {}", authors[0].0, self.terms.term("et-al")),
        }
    }

    fn year_or_no_date(&self, item: &Value) -> String {
        item_year(item).unwrap_or_else(|| self.terms.term("no date").to_string())
    }

    fn render_cite_core(&mut self, cite: &CitationItem) -> Result<String, EngineError> {
        match self.style.citation_format {
            CitationFormat::Numeric => {
                self.item(&cite.id)?;
                Ok(self.citation_number(&cite.id).to_string())
            }
            CitationFormat::AuthorDate => {
                let item = self.item(&cite.id)?;
                let author = self.short_author(item);
                let year = self.year_or_no_date(item);
                Ok(format!(
                    "{} {}",
                    self.output.escape(&author),
                    self.output.escape(&year)
                ))
            }
            CitationFormat::Author => {
                let item = self.item(&cite.id)?;
                let author = self.short_author(item);
                Ok(self.output.escape(&author))
            }
            CitationFormat::Label => {
                let item = self.item(&cite.id)?;
                let family = item_authors(item)
                    .first()
                    .map(|a| a.0.clone())
                    .unwrap_or_else(|| self.terms.term("anonymous").to_string());
                let year = item_year(item).unwrap_or_default();
                Ok(self.output.escape(&format!("{}{}", family, year)))
            }
            CitationFormat::Note => {
                let item = self.item(&cite.id)?;
                let name = item_authors(item)
                    .first()
                    .map(|a| {
                        if a.1.is_empty() {
                            a.0.clone()
                        } else {
                            format!("{} {}", a.1, a.0)
                        }
                    })
                    .unwrap_or_else(|| self.terms.term("anonymous").to_string());
                let mut text = self.output.escape(&name);
                if let Some(title) = item_title(item) {
                    text.push_str(", ");
                    text.push_str(&self.output.italic(&self.output.escape(title)));
                }
                if let Some(year) = item_year(item) {
                    text.push_str(&format!(" ({})", self.output.escape(&year)));
                }
                Ok(text)
            }
        }
    }

    fn render_cluster(&mut self, cluster: &CitationCluster) -> Result<String, EngineError> {
        if cluster.citation_items.is_empty() {
            return Err(EngineError::Render(
                "citation cluster has no items".to_string(),
            ));
        }
        let mut cites = Vec::with_capacity(cluster.citation_items.len());
        for cite in &cluster.citation_items {
            let mut text = self.render_cite_core(cite)?;
            if let Some(locator) = &cite.locator {
                text.push_str(", ");
                text.push_str(&self.output.escape(locator));
            }
            if let Some(prefix) = &cite.prefix {
                text = format!("{}{}", self.output.escape(prefix), text);
            }
            if let Some(suffix) = &cite.suffix {
                text.push_str(&self.output.escape(suffix));
            }
            cites.push(text);
        }
        Ok(match self.style.citation_format {
            CitationFormat::Numeric => format!("[{}]", cites.join(", ")),
            CitationFormat::Label => format!("[{}]", cites.join("; ")),
            CitationFormat::AuthorDate => format!("({})", cites.join("; ")),
            CitationFormat::Author | CitationFormat::Note => cites.join("; "),
        })
    }

    fn render_entry(&self, index: usize, id: &ItemId) -> Result<String, EngineError> {
        let item = self.item(id)?;
        let out = self.output;
        let format = self.style.citation_format;
        let mut entry = String::new();

        if format == CitationFormat::Numeric {
            entry.push_str(&format!("[{}] ", index + 1));
        }

        let names = format_bib_authors(
            &item_authors(item),
            self.terms.term("and"),
            self.terms.term("et-al"),
            self.terms.term("anonymous"),
        );
        entry.push_str(&out.escape(&names));
        if !names.ends_with('.') {
            entry.push('.');
        }

        if format == CitationFormat::AuthorDate {
            entry.push(' ');
            let year = out.escape(&self.year_or_no_date(item));
            entry.push_str(&year);
            if !year.ends_with('.') {
                entry.push('.');
            }
        }

        if let Some(title) = item_title(item) {
            entry.push(' ');
            entry.push_str(&out.italic(&out.escape(title)));
            entry.push('.');
        }

        if let Some(publisher) = item.get("publisher").and_then(Value::as_str) {
            entry.push(' ');
            entry.push_str(&out.escape(publisher));
            entry.push('.');
        }

        if format != CitationFormat::AuthorDate {
            entry.push(' ');
            let year = out.escape(&self.year_or_no_date(item));
            entry.push_str(&year);
            if !year.ends_with('.') {
                entry.push('.');
            }
        }

        Ok(entry)
    }
}

impl FormatEngine for CslEngine {
    fn set_output_format(&mut self, format: OutputFormat) {
        self.output = format;
    }

    fn bind_items(&mut self, items: HashMap<String, Value>) {
        self.items = items;
    }

    fn update_items(&mut self, ids: &[ItemId]) {
        self.active_ids = ids.to_vec();
    }

    fn make_bibliography(&mut self) -> Result<Bibliography, EngineError> {
        let mut entries = Vec::with_capacity(self.active_ids.len());
        let mut entry_ids = Vec::with_capacity(self.active_ids.len());
        for (index, id) in self.active_ids.iter().enumerate() {
            let entry = self.render_entry(index, id)?;
            entries.push(self.output.entry(&entry));
            entry_ids.push(vec![id.0.clone()]);
        }
        Ok(Bibliography(
            BibliographyMeta {
                bibstart: self.output.bibstart().to_string(),
                bibend: self.output.bibend().to_string(),
                entry_ids,
            },
            entries,
        ))
    }

    fn append_citation_cluster(
        &mut self,
        cluster: &CitationCluster,
    ) -> Result<Vec<RenderedCitation>, EngineError> {
        let rendered = self.render_cluster(cluster)?;
        let index = self.cluster_count;
        self.cluster_count += 1;
        Ok(vec![(index, rendered)])
    }

    fn clear_items(&mut self) {
        self.items.clear();
    }

    fn restore_processor_state(&mut self) {
        self.cited_ids.clear();
        self.cluster_count = 0;
    }
}

/// Default factory: builds [`CslEngine`] instances.
#[derive(Debug, Default)]
pub struct CslEngineFactory;

impl EngineFactory for CslEngineFactory {
    fn build(
        &self,
        style_xml: &str,
        locales: &LocaleStore,
        locale: &str,
    ) -> Result<Box<dyn FormatEngine>, EngineError> {
        let style = CslStyle::parse(style_xml)?;
        let terms = LocaleTerms::parse(locales.retrieve(locale))?;
        Ok(Box::new(CslEngine::new(style, terms)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const AUTHOR_DATE_STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0">
  <info>
    <title>Chicago Manual of Style 17th edition (author-date)</title>
    <id>http://www.zotero.org/styles/chicago-author-date</id>
    <category citation-format="author-date"/>
    <category field="generic-base"/>
  </info>
</style>
"#;

    const NUMERIC_STYLE: &str = r#"<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0">
  <info>
    <title>IEEE</title>
    <id>http://www.zotero.org/styles/ieee</id>
    <category citation-format="numeric"/>
  </info>
</style>
"#;

    const LOCALE: &str = r#"<locale xmlns="http://purl.org/net/xbiblio/csl" version="1.0" xml:lang="en-US">
  <terms>
    <term name="and">and</term>
    <term name="et-al">et al.</term>
    <term name="anonymous">Anonymous</term>
  </terms>
</locale>
"#;

    fn engine(style_xml: &str) -> CslEngine {
        let style = CslStyle::parse(style_xml).unwrap();
        let terms = LocaleTerms::parse(LOCALE).unwrap();
        CslEngine::new(style, terms)
    }

    fn bind(engine: &mut CslEngine, items: Vec<Value>) {
        let mut map = HashMap::new();
        let mut ids = Vec::new();
        for item in items {
            let id = item["id"].as_str().unwrap().to_string();
            ids.push(ItemId(id.clone()));
            map.insert(id, item);
        }
        engine.bind_items(map);
        engine.update_items(&ids);
    }

    fn doe_2020() -> Value {
        json!({
            "id": "doe",
            "title": "A History of Margins",
            "author": [{"family": "Doe", "given": "Jane"}],
            "issued": {"date-parts": [[2020, 4]]},
            "publisher": "Field Press"
        })
    }

    fn roe_smith() -> Value {
        json!({
            "id": "roe",
            "title": "Edge Cases",
            "author": [
                {"family": "Roe", "given": "Richard"},
                {"family": "Smith", "given": "Ada"}
            ],
            "issued": {"date-parts": [["1998"]]}
        })
    }

    fn cluster(ids: &[&str]) -> CitationCluster {
        CitationCluster {
            citation_items: ids
                .iter()
                .map(|id| CitationItem {
                    id: ItemId::from(*id),
                    locator: None,
                    label: None,
                    prefix: None,
                    suffix: None,
                })
                .collect(),
            properties: None,
        }
    }

    #[test]
    fn parses_style_identity_and_category() {
        let style = CslStyle::parse(AUTHOR_DATE_STYLE).unwrap();
        assert_eq!(style.id, "http://www.zotero.org/styles/chicago-author-date");
        assert_eq!(style.title, "Chicago Manual of Style 17th edition (author-date)");
        assert_eq!(style.class, "in-text");
        assert_eq!(style.citation_format, CitationFormat::AuthorDate);
    }

    #[test]
    fn missing_category_defaults_to_author_date() {
        let style = CslStyle::parse("<style class=\"in-text\"><info><id>x</id></info></style>")
            .unwrap();
        assert_eq!(style.citation_format, CitationFormat::AuthorDate);
    }

    #[test]
    fn non_style_xml_is_rejected() {
        assert!(CslStyle::parse("<locale xml:lang=\"en-US\"/>").is_err());
        assert!(CslStyle::parse("not xml <<<").is_err());
    }

    #[test]
    fn locale_terms_parse_with_fallbacks() {
        let terms = LocaleTerms::parse(LOCALE).unwrap();
        assert_eq!(terms.term("and"), "and");
        assert_eq!(terms.term("et-al"), "et al.");
        // not in the file, served from the built-in fallback
        assert_eq!(terms.term("no date"), "n.d.");
        assert_eq!(terms.term("nonexistent"), "");
    }

    #[test]
    fn author_date_citation() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        bind(&mut engine, vec![doe_2020(), roe_smith()]);

        let result = engine.append_citation_cluster(&cluster(&["doe", "roe"])).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 0);
        assert_eq!(result[0].1, "(Doe 2020; Roe and Smith 1998)");
    }

    #[test]
    fn cluster_indices_increase_until_state_restore() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        bind(&mut engine, vec![doe_2020()]);

        assert_eq!(engine.append_citation_cluster(&cluster(&["doe"])).unwrap()[0].0, 0);
        assert_eq!(engine.append_citation_cluster(&cluster(&["doe"])).unwrap()[0].0, 1);

        engine.restore_processor_state();
        assert_eq!(engine.append_citation_cluster(&cluster(&["doe"])).unwrap()[0].0, 0);
    }

    #[test]
    fn numeric_citations_number_by_item_order() {
        let mut engine = engine(NUMERIC_STYLE);
        bind(&mut engine, vec![doe_2020(), roe_smith()]);

        let result = engine.append_citation_cluster(&cluster(&["roe"])).unwrap();
        assert_eq!(result[0].1, "[2]");
        let result = engine.append_citation_cluster(&cluster(&["doe", "roe"])).unwrap();
        assert_eq!(result[0].1, "[1, 2]");
    }

    #[test]
    fn unknown_item_id_is_a_render_error() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        bind(&mut engine, vec![doe_2020()]);

        assert!(engine.append_citation_cluster(&cluster(&["missing"])).is_err());
    }

    #[test]
    fn empty_cluster_is_a_render_error() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        bind(&mut engine, vec![doe_2020()]);

        assert!(engine.append_citation_cluster(&cluster(&[])).is_err());
    }

    #[test]
    fn html_bibliography_wraps_entries() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        bind(&mut engine, vec![doe_2020()]);

        let bib = engine.make_bibliography().unwrap();
        assert_eq!(bib.0.bibstart, "<div class=\"csl-bib-body\">\n");
        assert_eq!(bib.0.bibend, "</div>");
        assert_eq!(bib.0.entry_ids, vec![vec!["doe".to_string()]]);
        assert_eq!(bib.1.len(), 1);
        assert_eq!(
            bib.1[0],
            "  <div class=\"csl-entry\">Doe, Jane. 2020. <i>A History of Margins</i>. Field Press.</div>\n"
        );
    }

    #[test]
    fn text_output_has_no_markup() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        engine.set_output_format(OutputFormat::Text);
        bind(&mut engine, vec![doe_2020()]);

        let bib = engine.make_bibliography().unwrap();
        assert_eq!(bib.0.bibstart, "");
        assert_eq!(bib.1[0], "Doe, Jane. 2020. A History of Margins. Field Press.\n");
    }

    #[test]
    fn rtf_output_uses_rtf_markup() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        engine.set_output_format(OutputFormat::Rtf);
        bind(&mut engine, vec![doe_2020()]);

        let bib = engine.make_bibliography().unwrap();
        assert_eq!(bib.0.bibstart, "{\\rtf ");
        assert_eq!(bib.0.bibend, "}");
        assert!(bib.1[0].contains("{\\i A History of Margins}"));
    }

    #[test]
    fn html_output_escapes_item_text() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        let item = json!({
            "id": "x",
            "title": "Ampersands & <Angles>",
            "author": [{"family": "Doe", "given": "Jane"}],
            "issued": {"date-parts": [[2021]]}
        });
        bind(&mut engine, vec![item]);

        let bib = engine.make_bibliography().unwrap();
        assert!(bib.1[0].contains("Ampersands &amp; &lt;Angles&gt;"));
    }

    #[test]
    fn numbered_entries_for_numeric_styles() {
        let mut engine = engine(NUMERIC_STYLE);
        engine.set_output_format(OutputFormat::Text);
        bind(&mut engine, vec![doe_2020(), roe_smith()]);

        let bib = engine.make_bibliography().unwrap();
        assert!(bib.1[0].starts_with("[1] Doe, Jane."));
        assert!(bib.1[1].starts_with("[2] Roe, Richard, and Ada Smith."));
    }

    #[test]
    fn missing_fields_fall_back_to_terms() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        engine.set_output_format(OutputFormat::Text);
        bind(&mut engine, vec![json!({"id": "bare", "title": "Untitled Papers"})]);

        let bib = engine.make_bibliography().unwrap();
        assert_eq!(bib.1[0], "Anonymous. n.d. Untitled Papers.\n");
    }

    #[test]
    fn locator_prefix_and_suffix_are_applied() {
        let mut engine = engine(AUTHOR_DATE_STYLE);
        engine.set_output_format(OutputFormat::Text);
        bind(&mut engine, vec![doe_2020()]);

        let cite = CitationCluster {
            citation_items: vec![CitationItem {
                id: ItemId::from("doe"),
                locator: Some("15".to_string()),
                label: Some("page".to_string()),
                prefix: Some("see ".to_string()),
                suffix: None,
            }],
            properties: None,
        };
        let result = engine.append_citation_cluster(&cite).unwrap();
        assert_eq!(result[0].1, "(see Doe 2020, 15)");
    }

    #[test]
    fn factory_builds_engine_from_store() {
        let store = crate::locales::LocaleStore::from_entries(&[("en-US", LOCALE)]);
        let factory = CslEngineFactory;
        assert!(factory.build(AUTHOR_DATE_STYLE, &store, "en-US").is_ok());
        assert!(factory.build("<locale/>", &store, "en-US").is_err());
    }
}
