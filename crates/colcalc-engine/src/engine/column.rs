//! Column catalog types.
//!
//! The catalog is owned by the host table; the engine only reads it. Rows of
//! the table are indexed in the same order as the catalog's columns.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Value type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    DollarAmt,
    Quantity,
    Ratio,
    Percent,
    Date,
    Datetime,
    Boolean,
}

impl ValueType {
    /// The numeric subtypes that collapse to QUANTITY when mixed.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::DollarAmt | ValueType::Quantity | ValueType::Ratio | ValueType::Percent
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::DollarAmt => "DOLLAR_AMT",
            ValueType::Quantity => "QUANTITY",
            ValueType::Ratio => "RATIO",
            ValueType::Percent => "PERCENT",
            ValueType::Date => "DATE",
            ValueType::Datetime => "DATETIME",
            ValueType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_visible() -> bool {
    true
}

/// Description of one table column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDescriptor {
    pub field: String,
    pub title: String,
    pub value_type: ValueType,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub numeric: bool,
    /// Identifier used in query expressions; the field id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Guarded query expression for derived columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(
        field: impl Into<String>,
        title: impl Into<String>,
        value_type: ValueType,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            field: field.into(),
            title: title.into(),
            value_type,
            visible: true,
            numeric: value_type.is_numeric(),
            storage: None,
            expression: None,
        }
    }

    pub fn storage_identifier(&self) -> &str {
        self.storage.as_deref().unwrap_or(&self.field)
    }
}

/// Ordered list of the table's columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnCatalog {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnCatalog {
    pub fn new(columns: Vec<ColumnDescriptor>) -> ColumnCatalog {
        ColumnCatalog { columns }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDescriptor> {
        self.columns.iter()
    }

    /// Row index of a field.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn get(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Derive a field id from a display name that does not collide with an existing column.
    /// `"Profit Margin"` becomes `profit_margin`, then `profit_margin_2`, and so on.
    pub fn unique_field_for(&self, title: &str) -> String {
        let lowered = title.trim().to_ascii_lowercase();
        let slug = slug_re().replace_all(&lowered, "_");
        let slug = slug.trim_matches('_');
        let base = if slug.is_empty() { "custom_column" } else { slug };

        if self.get(base).is_none() {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.get(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// A copy of the catalog with `column` appended.
    pub fn with_column(&self, column: ColumnDescriptor) -> ColumnCatalog {
        let mut columns = self.columns.clone();
        columns.push(column);
        ColumnCatalog { columns }
    }

    pub fn into_columns(self) -> Vec<ColumnDescriptor> {
        self.columns
    }
}

impl FromIterator<ColumnDescriptor> for ColumnCatalog {
    fn from_iter<I: IntoIterator<Item = ColumnDescriptor>>(iter: I) -> Self {
        ColumnCatalog {
            columns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ColumnCatalog {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug regex must compile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new(vec![
            ColumnDescriptor::new("revenue", "Revenue", ValueType::DollarAmt),
            ColumnDescriptor::new("profit_margin", "Profit Margin", ValueType::Percent),
        ])
    }

    #[test]
    fn test_position_follows_catalog_order() {
        let catalog = catalog();
        assert_eq!(catalog.position("revenue"), Some(0));
        assert_eq!(catalog.position("profit_margin"), Some(1));
        assert_eq!(catalog.position("missing"), None);
    }

    #[test]
    fn test_unique_field_for_slugifies_and_dedupes() {
        let catalog = catalog();
        assert_eq!(catalog.unique_field_for("Net Units"), "net_units");
        assert_eq!(catalog.unique_field_for("  Profit Margin "), "profit_margin_2");
        assert_eq!(catalog.unique_field_for("%%%"), "custom_column");
    }

    #[test]
    fn test_storage_identifier_defaults_to_field() {
        let mut column = ColumnDescriptor::new("revenue", "Revenue", ValueType::DollarAmt);
        assert_eq!(column.storage_identifier(), "revenue");
        column.storage = Some("fact.revenue".into());
        assert_eq!(column.storage_identifier(), "fact.revenue");
        assert!(column.numeric);
    }
}
