//! Record extraction from a single XML document.
//!
//! Every element whose local name equals the catalog's boundary name starts one
//! record. Each mapped source element is looked up in that element's subtree and
//! the first match in document order supplies the column value.

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use encoding_rs::{Encoding, UTF_8};
use indexmap::IndexMap;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};

use crate::aggregator::RecordSource;
use crate::catalog::FieldCatalog;
use crate::error::{ExtractError, ExtractResult};

/// Bytes inspected when looking for the XML declaration
const DECLARATION_WINDOW: usize = 1024;

static ENCODING_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("encoding declaration pattern is valid")
});

/// One flat column -> value result for a single boundary element.
///
/// Fields keep insertion order, which for extracted records is catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a column, if this record has it
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Set a column value, replacing any previous value for the column
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// Extracts records from documents on disk using a shared catalog
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    catalog: Arc<FieldCatalog>,
}

impl RecordExtractor {
    pub fn new(catalog: Arc<FieldCatalog>) -> Self {
        Self { catalog }
    }

    /// Read, decode and parse one document, then extract its records
    pub fn extract_file(&self, path: &Path) -> ExtractResult<Vec<Record>> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            file: path.to_path_buf(),
            source,
        })?;

        let text = decode_document(&bytes);
        let records = extract_from_str(&text, &self.catalog).map_err(|source| {
            ExtractError::Parse {
                file: path.to_path_buf(),
                source,
            }
        })?;

        debug!(file = %path.display(), records = records.len(), "extracted document");
        Ok(records)
    }
}

impl RecordSource for RecordExtractor {
    fn extract(&self, path: &Path) -> ExtractResult<Vec<Record>> {
        self.extract_file(path)
    }
}

/// Extract records from one document; unreadable or malformed input yields no records
pub fn extract_or_empty(path: &Path, catalog: &FieldCatalog) -> Vec<Record> {
    let extractor = RecordExtractor::new(Arc::new(catalog.clone()));
    extractor.extract_file(path).unwrap_or_else(|e| {
        warn!(error = %e, "skipping document");
        Vec::new()
    })
}

/// Parse XML text and extract its records
pub fn extract_from_str(text: &str, catalog: &FieldCatalog) -> Result<Vec<Record>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(text, options)?;
    Ok(extract_records(&document, catalog))
}

/// Extract one record per boundary element found anywhere in the document
pub fn extract_records(document: &Document, catalog: &FieldCatalog) -> Vec<Record> {
    let boundary = local_name(catalog.boundary());

    document
        .descendants()
        .filter(|node| is_named(node, boundary))
        .filter_map(|block| build_record(block, catalog))
        .collect()
}

fn build_record(block: Node, catalog: &FieldCatalog) -> Option<Record> {
    let mut record = Record::new();

    for (source, column) in catalog.mappings() {
        // Several sources may feed one column; the first one that resolves wins.
        if record.get(column).is_some() {
            continue;
        }

        let source = local_name(source);
        let found = block
            .descendants()
            .skip(1)
            .find(|node| is_named(node, source));

        if let Some(element) = found {
            record.insert(column, leading_text(element));
        }
    }

    (!record.is_empty()).then_some(record)
}

/// Character data before the first child element; comments are skipped
fn leading_text(element: Node) -> String {
    element
        .children()
        .take_while(|node| node.is_text() || node.is_comment())
        .filter(Node::is_text)
        .filter_map(|node| node.text())
        .collect()
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// `prefix:name` -> `name`
fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Decode raw document bytes per BOM or XML declaration, defaulting to UTF-8
pub fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text;
    }

    let encoding = declared_encoding(bytes).unwrap_or(UTF_8);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "document contains undecodable bytes");
    }
    text
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let window = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    let head = String::from_utf8_lossy(window);
    let label = ENCODING_DECLARATION.captures(&head)?.get(1)?.as_str().to_owned();
    // A UTF-16 label on ASCII-compatible bytes cannot be right.
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}
