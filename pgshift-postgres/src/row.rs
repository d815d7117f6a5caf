use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_postgres::SimpleQueryRow;

/// A result row as returned by the simple query protocol.
///
/// Columns keep the order of the select list. Every value is the Postgres text representation
/// of the column (`"t"`/`"f"` for booleans, `2024-05-01 10:00:00.5` for timestamps) and SQL
/// `NULL` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    entries: Vec<(String, Option<String>)>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, keeping insertion order.
    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.entries.push((column.into(), value.map(str::to_owned)));
        self
    }

    /// Returns the value of `column`, `None` if the value is `NULL` or the column is missing.
    ///
    /// Use [`QueryRow::contains`] to tell both cases apart.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }
}

impl From<&SimpleQueryRow> for QueryRow {
    fn from(row: &SimpleQueryRow) -> Self {
        let entries = row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name().to_owned(), row.get(i).map(str::to_owned)))
            .collect();

        Self { entries }
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for QueryRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.map(Into::into)))
            .collect();

        Self { entries }
    }
}

impl Serialize for QueryRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
