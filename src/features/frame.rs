//! Column-oriented logical feature frame.
//!
//! Every column has the same row count. Numeric cells are `Option<f64>` with
//! `None` as the explicit unknown marker; categorical cells are
//! `Option<String>` where `None` only appears for columns injected as entirely
//! missing (reconciled categoricals use the empty-string token instead).

use serde::{Deserialize, Serialize};

/// Kind of a logical feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Cell storage for one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    /// A column of `len` unknown cells of the given kind.
    pub fn missing(kind: ColumnKind, len: usize) -> Self {
        match kind {
            ColumnKind::Numeric => ColumnData::Numeric(vec![None; len]),
            ColumnKind::Categorical => ColumnData::Categorical(vec![None; len]),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(rows.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named column plus whether any source column backed it
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub data: ColumnData,
    /// False when none of the column's aliases appeared in the input
    pub sourced: bool,
}

/// Ordered set of equally long feature columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    n_rows: usize,
    columns: Vec<FeatureColumn>,
}

impl FeatureFrame {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric cells of `name`, if the column exists and is numeric.
    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    /// Categorical cells of `name`, if the column exists and is categorical.
    pub fn categorical(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Categorical(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_sourced(&self, name: &str) -> bool {
        self.column(name).map(|c| c.sourced).unwrap_or(false)
    }

    /// Insert or replace a column, keeping the position of a replaced one.
    ///
    /// # Panics
    /// Panics if the column length differs from the frame's row count.
    pub fn set_column(&mut self, name: &str, data: ColumnData, sourced: bool) {
        assert_eq!(
            data.len(),
            self.n_rows,
            "column {name} has {} rows, frame has {}",
            data.len(),
            self.n_rows
        );
        let column = FeatureColumn {
            name: name.to_string(),
            data,
            sourced,
        };
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Project onto `layout`, injecting absent columns as entirely missing
    /// and dropping columns the layout does not name.
    pub fn aligned(&self, layout: &[(String, ColumnKind)]) -> FeatureFrame {
        let mut out = FeatureFrame::new(self.n_rows);
        for (name, kind) in layout {
            match self.column(name) {
                Some(col) if col.data.kind() == *kind => out.columns.push(col.clone()),
                _ => out.columns.push(FeatureColumn {
                    name: name.clone(),
                    data: ColumnData::missing(*kind, self.n_rows),
                    sourced: false,
                }),
            }
        }
        out
    }

    /// New frame containing only `rows`, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureFrame {
        FeatureFrame {
            n_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|c| FeatureColumn {
                    name: c.name.clone(),
                    data: c.data.select(rows),
                    sourced: c.sourced,
                })
                .collect(),
        }
    }
}
