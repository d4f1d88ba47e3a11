use crate::{Row, RowNames, Value};
use std::collections::HashMap;

/// Materialised result of one read: rows labelled with the view's field
/// names, convertible to tuples, mappings, batches or columns.
#[derive(Debug)]
pub struct ResultSet {
    labels: RowNames,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(labels: RowNames, rows: Vec<Row>) -> ResultSet {
        ResultSet { labels, rows }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows as value tuples.
    pub fn all(self) -> Vec<Row> {
        self.rows
    }

    /// The first row, if any.
    pub fn one(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Rows as field-name → value mappings.
    pub fn dicts(&self) -> impl Iterator<Item = HashMap<String, Value>> + '_ {
        self.rows.iter().map(|row| {
            self.labels
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }

    /// Rows in batches of at most `size`.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = &[Row]> {
        self.rows.chunks(size.max(1))
    }

    /// Columnar layout; the seam for dataframe bridges.
    pub fn columns(self) -> Vec<(String, Vec<Value>)> {
        let mut columns: Vec<(String, Vec<Value>)> = self
            .labels
            .iter()
            .map(|label| (label.clone(), Vec::with_capacity(self.rows.len())))
            .collect();
        for row in self.rows {
            for (i, value) in row.into_vec().into_iter().enumerate() {
                columns[i].1.push(value);
            }
        }
        columns
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
