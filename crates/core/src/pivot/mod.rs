//! Normalization of raw backend rows and entries into attribute maps.
//!
//! Two record shapes arrive from backends:
//!
//! - a [`Row`] (SQL-like): ordered column -> single value
//! - an [`Entry`] (directory-like): ordered attribute -> list of values
//!
//! Both are case-insensitive on column names and keep the spelling the
//! backend used. [`RowPivot`] turns either shape into a logical
//! [`AttributeMap`] using the result mapping and case canonicalization.

pub mod name_value;

pub use name_value::{EntityGroup, NameValueColumns};

use tracing::debug;

use crate::attributes::{add_value, AttributeMap, AttributeValue};
use crate::container::{CaseFoldingMap, KeyComparison};
use crate::mapping::{CaseCanonicalization, ResultAttributeMapping};

/// One raw SQL-like result row.
pub type Row = CaseFoldingMap<AttributeValue>;

/// One raw directory-like entry.
pub type Entry = CaseFoldingMap<Vec<AttributeValue>>;

/// Build a [`Row`] from `(column, value)` pairs.
///
/// With `ignore_null`, null columns are left out of the row entirely.
pub fn row_from_columns<K, V>(columns: impl IntoIterator<Item = (K, V)>, ignore_null: bool) -> Row
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    let mut row = Row::case_insensitive();
    for (column, value) in columns {
        let value = value.into();
        if ignore_null && value.is_null() {
            continue;
        }
        row.put(column, value);
    }
    row
}

/// Build an [`Entry`] from `(attribute, values)` pairs.
///
/// With `ignore_null`, null values are dropped and attributes left with no
/// values are omitted.
pub fn entry_from_attributes<K, I, V>(
    attributes: impl IntoIterator<Item = (K, I)>,
    ignore_null: bool,
) -> Entry
where
    K: Into<String>,
    I: IntoIterator<Item = V>,
    V: Into<AttributeValue>,
{
    let mut entry = Entry::case_insensitive();
    for (name, values) in attributes {
        let values: Vec<AttributeValue> = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &AttributeValue| !(ignore_null && v.is_null()))
            .collect();
        if ignore_null && values.is_empty() {
            continue;
        }
        entry.put(name, values);
    }
    entry
}

/// Pivots raw records into logical attribute maps.
///
/// Read-only after construction and safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct RowPivot {
    mapping: ResultAttributeMapping,
    case: CaseCanonicalization,
    comparison: KeyComparison,
}

impl RowPivot {
    pub fn new(mapping: ResultAttributeMapping) -> Self {
        let comparison = mapping.comparison();
        Self {
            mapping,
            case: CaseCanonicalization::none(),
            comparison,
        }
    }

    pub fn with_case(mut self, case: CaseCanonicalization) -> Self {
        self.case = case;
        self
    }

    /// Key comparison of the attribute maps this pivot produces.
    pub fn with_comparison(mut self, comparison: KeyComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn mapping(&self) -> &ResultAttributeMapping {
        &self.mapping
    }

    pub fn case(&self) -> &CaseCanonicalization {
        &self.case
    }

    pub fn comparison(&self) -> KeyComparison {
        self.comparison
    }

    /// Direct-column pivot of one SQL-like row.
    pub fn pivot_row(&self, row: &Row) -> AttributeMap {
        let mut out = AttributeMap::new(self.comparison);
        self.pivot_fields(
            &mut out,
            row.iter().map(|(column, value)| (column, std::slice::from_ref(value))),
        );
        debug!(columns = row.len(), attributes = out.len(), "pivoted row");
        out
    }

    /// Direct-column pivot of one directory-like entry.
    pub fn pivot_entry(&self, entry: &Entry) -> AttributeMap {
        let mut out = AttributeMap::new(self.comparison);
        self.pivot_fields(
            &mut out,
            entry.iter().map(|(name, values)| (name, values.as_slice())),
        );
        debug!(attributes = out.len(), "pivoted entry");
        out
    }

    /// Direct-column pivot of several rows into a single map; values of
    /// repeated columns accumulate in row order.
    pub fn pivot_rows(&self, rows: &[Row]) -> AttributeMap {
        let mut out = AttributeMap::new(self.comparison);
        for row in rows {
            self.pivot_fields(
                &mut out,
                row.iter().map(|(column, value)| (column, std::slice::from_ref(value))),
            );
        }
        debug!(rows = rows.len(), attributes = out.len(), "pivoted rows");
        out
    }

    fn pivot_fields<'a>(
        &self,
        out: &mut AttributeMap,
        fields: impl Iterator<Item = (&'a str, &'a [AttributeValue])>,
    ) {
        for (column, values) in fields {
            let name = self.case.canonicalize(column, column);
            self.append(out, &name, values);
        }
    }

    /// Append `values` under every logical name `backend` maps to.
    pub(crate) fn append(&self, out: &mut AttributeMap, backend: &str, values: &[AttributeValue]) {
        if values.is_empty() {
            return;
        }
        for target in self.mapping.targets(backend) {
            for value in values {
                add_value(out, target, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CaseMode;

    fn mapping() -> ResultAttributeMapping {
        ResultAttributeMapping::from_pairs(
            "result.mapping",
            KeyComparison::CaseInsensitive,
            [
                ("name", Some(vec!["firstName"])),
                ("email", Some(vec!["email", "emailAddress"])),
                ("shirt_color", None),
                ("secret", Some(vec![])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_row_mapper_ignore_null() {
        let row = row_from_columns([("NAME", Some("Andrew")), ("phone", None)], true);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("name"), Some(&AttributeValue::from("Andrew")));
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["NAME"]);

        let row = row_from_columns([("NAME", Some("Andrew")), ("phone", None)], false);
        assert_eq!(row.get("phone"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_entry_mapper_ignore_null() {
        let entry = entry_from_attributes(
            [
                ("mail", vec![Some("a@x"), None]),
                ("fax", vec![None]),
            ],
            true,
        );
        assert_eq!(entry.get("MAIL"), Some(&vec![AttributeValue::from("a@x")]));
        assert!(!entry.contains_key("fax"));
    }

    #[test]
    fn test_direct_column_fan_out_and_passthrough() {
        let pivot = RowPivot::new(mapping());
        let row = row_from_columns(
            [
                ("name", "Andrew"),
                ("email", "a@x"),
                ("shirt_color", "blue"),
                ("netid", "awp9"),
                ("secret", "hunter2"),
            ],
            false,
        );
        let out = pivot.pivot_row(&row);
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["firstName", "email", "emailAddress", "shirt_color", "netid"]
        );
        assert_eq!(out.get("emailAddress"), Some(&vec![AttributeValue::from("a@x")]));
        assert_eq!(out.get("netid"), Some(&vec![AttributeValue::from("awp9")]));
        assert!(!out.contains_key("secret"));
    }

    #[test]
    fn test_direct_column_keeps_null_values() {
        let pivot = RowPivot::new(mapping());
        let row = row_from_columns([("email", None::<&str>)], false);
        let out = pivot.pivot_row(&row);
        assert_eq!(out.get("email"), Some(&vec![AttributeValue::Null]));
    }

    #[test]
    fn test_entry_pivot_keeps_value_order() {
        let pivot = RowPivot::new(mapping());
        let entry = entry_from_attributes([("email", vec!["a@x", "b@x"])], false);
        let out = pivot.pivot_entry(&entry);
        assert_eq!(
            out.get("email"),
            Some(&vec![AttributeValue::from("a@x"), AttributeValue::from("b@x")])
        );
    }

    #[test]
    fn test_rows_accumulate() {
        let pivot = RowPivot::new(mapping());
        let rows = vec![
            row_from_columns([("email", "a@x")], false),
            row_from_columns([("email", "b@x")], false),
        ];
        let out = pivot.pivot_rows(&rows);
        assert_eq!(out.get("email").map(Vec::len), Some(2));
    }

    #[test]
    fn test_case_canonicalized_column_names() {
        let mapping = ResultAttributeMapping::from_pairs(
            "result.mapping",
            KeyComparison::CaseSensitive,
            [("mail", Some(vec!["email"]))],
        )
        .unwrap();
        let pivot = RowPivot::new(mapping).with_case(CaseCanonicalization {
            default: CaseMode::Lower,
            ..Default::default()
        });
        let row = row_from_columns([("MAIL", "a@x")], false);
        let out = pivot.pivot_row(&row);
        assert_eq!(out.get("email"), Some(&vec![AttributeValue::from("a@x")]));
    }
}
