//! Name/value pivot: each row carries an attribute name in one column and
//! its value in another.

use tracing::{debug, warn};

use super::{Row, RowPivot};
use crate::attributes::{add_value, AttributeMap, AttributeValue};
use crate::errors::ShapeError;

/// Which columns carry attribute names and which carry their values.
///
/// A name column may own several value columns; every value column's value
/// is appended under the name read from its name column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValueColumns {
    pairs: Vec<(String, Vec<String>)>,
}

impl NameValueColumns {
    /// One name column with one value column.
    pub fn new(name_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            pairs: vec![(name_column.into(), vec![value_column.into()])],
        }
    }

    /// Add another name column and the value columns it owns.
    pub fn with_pair<S: Into<String>>(
        mut self,
        name_column: impl Into<String>,
        value_columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.pairs.push((
            name_column.into(),
            value_columns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.pairs
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

/// Attributes pivoted for one entity of a grouped name/value pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    pub entity: AttributeValue,
    pub attributes: AttributeMap,
}

impl RowPivot {
    /// Pivot every row into one attribute map.
    ///
    /// Values for the same logical name accumulate in row-arrival order.
    /// A row whose name column is null is skipped.
    pub fn pivot_name_value(
        &self,
        rows: &[Row],
        columns: &NameValueColumns,
    ) -> Result<AttributeMap, ShapeError> {
        let mut out = AttributeMap::new(self.comparison());
        for (index, row) in rows.iter().enumerate() {
            self.pivot_name_value_row(&mut out, index, row, columns)?;
        }
        debug!(rows = rows.len(), attributes = out.len(), "pivoted name/value rows");
        Ok(out)
    }

    /// Pivot rows into one attribute map per distinct value of
    /// `entity_column`, in first-seen order.
    ///
    /// The entity value is stored once per group under the entity column's
    /// name as the backend spelled it. Rows with a null entity are skipped.
    pub fn pivot_name_value_grouped(
        &self,
        rows: &[Row],
        columns: &NameValueColumns,
        entity_column: &str,
    ) -> Result<Vec<EntityGroup>, ShapeError> {
        let mut groups: Vec<EntityGroup> = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let entity = row.get(entity_column).ok_or_else(|| ShapeError::MissingEntityColumn {
                row: index,
                column: entity_column.to_string(),
            })?;
            if entity.is_null() {
                warn!(row = index, column = entity_column, "skipping row with null entity");
                continue;
            }

            let pos = match groups.iter().position(|g| &g.entity == entity) {
                Some(pos) => pos,
                None => {
                    let mut attributes = AttributeMap::new(self.comparison());
                    let key = row.stored_key(entity_column).unwrap_or(entity_column);
                    add_value(&mut attributes, key, entity.clone());
                    groups.push(EntityGroup {
                        entity: entity.clone(),
                        attributes,
                    });
                    groups.len() - 1
                }
            };
            self.pivot_name_value_row(&mut groups[pos].attributes, index, row, columns)?;
        }
        debug!(rows = rows.len(), entities = groups.len(), "pivoted grouped name/value rows");
        Ok(groups)
    }

    fn pivot_name_value_row(
        &self,
        out: &mut AttributeMap,
        index: usize,
        row: &Row,
        columns: &NameValueColumns,
    ) -> Result<(), ShapeError> {
        for (name_column, value_columns) in columns.pairs() {
            let name = row.get(name_column).ok_or_else(|| ShapeError::MissingNameColumn {
                row: index,
                column: name_column.to_string(),
            })?;
            let Some(name) = name.to_text() else {
                warn!(row = index, column = name_column, "skipping row with null attribute name");
                continue;
            };
            let name = self.case().canonicalize(name_column, &name).into_owned();

            for value_column in value_columns {
                let value = row.get(value_column).ok_or_else(|| ShapeError::MissingValueColumn {
                    row: index,
                    column: value_column.clone(),
                })?;
                self.append(out, &name, std::slice::from_ref(value));
            }
        }
        Ok(())
    }
}
