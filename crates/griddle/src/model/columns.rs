use std::collections::HashMap;

/// Output column name to "categorical" flag, introspected from the transform
/// once when the model instance loads.
///
/// Categorical columns hold a single value per row, so their output width is
/// always 1. Columns the transform did not describe are treated as
/// non-categorical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTypeMap {
    columns: HashMap<String, bool>,
}

impl ColumnTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, categorical: bool) {
        self.columns.insert(name.into(), categorical);
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.columns.get(name).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for ColumnTypeMap {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(name, categorical)| (name.into(), categorical)).collect(),
        }
    }
}
