//! Field catalog: output column order plus the source-element to column mapping.
//!
//! The catalog is built once at startup from the built-in customs declaration
//! layout, optionally merged with a line-oriented override file, and is then
//! shared read-only by every extraction task.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::CatalogError;

/// Reserved override key that names the record-boundary element
pub const BOUNDARY_KEY: &str = "parser_open_block_tag";

/// Boundary element of the built-in layout
pub const DEFAULT_BOUNDARY: &str = "ESADout_CUGoods";

/// Built-in (source element, column) pairs, in output column order
const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("GoodsNumeric", "Номер"),
    ("GoodsDescription", "Название"),
    ("GrossWeightQuantity", "Вес брутто(кг)"),
    ("InvoicedCost", "Цена товара"),
    ("ContractCurrencyCode", "Валюта"),
    ("ContractCurrencyRate", "Курс"),
    ("CustomsCost", "Таможенная стоимость"),
    ("Manufacturer", "Производитель"),
    ("GoodsModel", "Модель"),
    ("TradeMark", "Торговая марка"),
    ("GoodsQuantity", "Количество"),
    ("MeasureUnitQualifierName", "Единица измерения"),
    ("Code", "Код товара"),
    ("PrDocumentNumber", "Инвойс"),
];

/// Resolved column order and name mapping, read-only after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    boundary: String,
    columns: Vec<String>,
    /// source element -> column, in catalog order
    sources: IndexMap<String, String>,
}

impl FieldCatalog {
    /// Catalog with no mapped fields
    pub fn empty(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            columns: Vec::new(),
            sources: IndexMap::new(),
        }
    }

    /// Build a catalog from (source, column) pairs; column order follows first appearance
    pub fn from_pairs<I, S, C>(boundary: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        let mut catalog = Self::empty(boundary);
        for (source, column) in pairs {
            catalog.apply_override(source, column);
        }
        catalog
    }

    /// The built-in customs declaration layout
    pub fn builtin() -> Self {
        Self::from_pairs(DEFAULT_BOUNDARY, DEFAULT_FIELDS.iter().copied())
    }

    /// Load the built-in catalog merged with the override file at `path`.
    ///
    /// A missing file is not an error; the built-in catalog is returned as is.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin();
        let Some(path) = path else {
            return Ok(catalog);
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "configuration file not found, using built-in fields");
                return Ok(catalog);
            }
            Err(source) => {
                return Err(CatalogError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let overrides = parse_overrides(&content);
        debug!(path = %path.display(), count = overrides.len(), "applying field overrides");
        for (source, column) in overrides {
            catalog.apply_override(source, column);
        }
        Ok(catalog)
    }

    /// Add or replace one mapping.
    ///
    /// The reserved [`BOUNDARY_KEY`] replaces the boundary element name and never
    /// introduces a column. Any other new column name is appended to the column order.
    pub fn apply_override(&mut self, source: impl Into<String>, column: impl Into<String>) {
        let source = source.into();
        let column = column.into();

        // The boundary element delimits records; it is never a value inside one,
        // so a column for it would always be empty.
        if source == BOUNDARY_KEY {
            self.boundary = column;
            return;
        }

        if !self.columns.contains(&column) {
            self.columns.push(column.clone());
        }

        // A remapped source keeps its original position.
        self.sources.insert(source, column);
    }

    /// Name of the element that delimits one record
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Output column order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// (source element, column) pairs in catalog order
    pub fn mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources
            .iter()
            .map(|(source, column)| (source.as_str(), column.as_str()))
    }

    /// Column for a source element name; the reserved key yields the boundary name
    pub fn column_for(&self, source: &str) -> Option<&str> {
        if source == BOUNDARY_KEY {
            return Some(&self.boundary);
        }
        self.sources.get(source).map(String::as_str)
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Parse `source=column` override lines, skipping blanks and `#` comments
pub fn parse_overrides(content: &str) -> Vec<(String, String)> {
    let mut overrides = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('=').collect();
        let [source, column] = parts.as_slice() else {
            warn!(line = number + 1, "skipping configuration line without a single '='");
            continue;
        };

        let (source, column) = (source.trim(), column.trim());
        if source.is_empty() || column.is_empty() {
            warn!(line = number + 1, "skipping configuration line with an empty name");
            continue;
        }
        overrides.push((source.to_string(), column.to_string()));
    }

    overrides
}
