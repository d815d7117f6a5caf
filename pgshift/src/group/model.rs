use chrono::{DateTime, NaiveDateTime, Utc};
use pg_escape::quote_literal;
use pgshift_postgres::QueryRow;
use pgshift_postgres::time::{format_timestamp, parse_timestamp};
use serde::Serialize;

use crate::group::GroupDecodeError;

/// Separator used when a list of tables is stored in `table_names`.
const TABLE_NAMES_SEPARATOR: &str = ", ";

/// Lifecycle state of a group, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    /// Neither `started_at` nor `completed_at` is set.
    Created,
    /// The run started and has not completed yet.
    Started,
    /// The run completed. Terminal.
    Completed,
}

/// A replication run as stored in the `groups` table.
///
/// Timestamps are UTC wall clock values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: i32,
    pub name: String,
    /// Comma separated list of the tables covered by the run.
    pub table_names: Option<String>,
    pub schema_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl Group {
    /// Returns the lifecycle state of the run.
    pub fn state(&self) -> GroupState {
        match (self.started_at, self.completed_at) {
            (_, Some(_)) => GroupState::Completed,
            (Some(_), None) => GroupState::Started,
            (None, None) => GroupState::Created,
        }
    }

    /// Splits [`Group::table_names`] into trimmed, non empty table names.
    pub fn table_names(&self) -> Vec<&str> {
        self.table_names
            .as_deref()
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TryFrom<&QueryRow> for Group {
    type Error = GroupDecodeError;

    fn try_from(row: &QueryRow) -> Result<Self, Self::Error> {
        Ok(Group {
            id: required_integer(row, "id")?,
            name: required_text(row, "name")?.to_owned(),
            table_names: optional_text(row, "table_names")?.map(str::to_owned),
            schema_name: optional_text(row, "schema_name")?.map(str::to_owned),
            created_at: optional_timestamp(row, "created_at")?,
            started_at: optional_timestamp(row, "started_at")?,
            completed_at: optional_timestamp(row, "completed_at")?,
        })
    }
}

fn optional_text<'a>(
    row: &'a QueryRow,
    column: &'static str,
) -> Result<Option<&'a str>, GroupDecodeError> {
    if !row.contains(column) {
        return Err(GroupDecodeError::MissingColumn(column));
    }

    Ok(row.get(column))
}

fn required_text<'a>(row: &'a QueryRow, column: &'static str) -> Result<&'a str, GroupDecodeError> {
    optional_text(row, column)?.ok_or(GroupDecodeError::UnexpectedNull(column))
}

fn required_integer(row: &QueryRow, column: &'static str) -> Result<i32, GroupDecodeError> {
    let value = required_text(row, column)?;
    value
        .parse()
        .map_err(|source| GroupDecodeError::InvalidInteger {
            column,
            value: value.to_owned(),
            source,
        })
}

fn optional_timestamp(
    row: &QueryRow,
    column: &'static str,
) -> Result<Option<NaiveDateTime>, GroupDecodeError> {
    optional_text(row, column)?
        .map(|value| {
            parse_timestamp(value).map_err(|source| GroupDecodeError::InvalidTimestamp {
                column,
                value: value.to_owned(),
                source,
            })
        })
        .transpose()
}

/// Decodes a Postgres boolean in text form (`t`/`f`).
pub(crate) fn decode_bool(row: &QueryRow, column: &'static str) -> Result<bool, GroupDecodeError> {
    match required_text(row, column)? {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        value => Err(GroupDecodeError::InvalidBoolean {
            column,
            value: value.to_owned(),
        }),
    }
}

/// Attributes of a group to insert.
///
/// Only the supplied attributes are written. `name` is required by the table, a group without
/// one is rejected by the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: Option<String>,
    pub table_names: Option<String>,
    pub schema_name: Option<String>,
}

impl NewGroup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_table_names(mut self, table_names: impl Into<String>) -> Self {
        self.table_names = Some(table_names.into());
        self
    }

    /// Stores `tables` as a comma separated list.
    pub fn with_tables<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table_names = tables
            .into_iter()
            .map(|table| table.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(TABLE_NAMES_SEPARATOR);

        self.with_table_names(table_names)
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    /// Returns the `(column, literal)` pairs of the supplied attributes.
    pub(crate) fn columns(&self) -> Vec<(&'static str, String)> {
        [
            ("name", &self.name),
            ("table_names", &self.table_names),
            ("schema_name", &self.schema_name),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .as_deref()
                .map(|value| (column, quote_literal(value)))
        })
        .collect()
    }
}

/// Changes applied to the groups matching a name.
///
/// Attributes left as `None` are not touched, a timestamp can't be reset to `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub table_names: Option<String>,
    pub schema_name: Option<String>,
}

impl GroupUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    pub fn table_names(mut self, table_names: impl Into<String>) -> Self {
        self.table_names = Some(table_names.into());
        self
    }

    pub fn schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    /// Returns the `column = literal` assignments of the update.
    pub(crate) fn assignments(&self) -> Vec<String> {
        let timestamps = [
            ("started_at", self.started_at),
            ("completed_at", self.completed_at),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value.map(|value| format!("{column} = {}", quote_literal(&format_timestamp(value))))
        });

        let texts = [
            ("table_names", &self.table_names),
            ("schema_name", &self.schema_name),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .as_deref()
                .map(|value| format!("{column} = {}", quote_literal(value)))
        });

        timestamps.chain(texts).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn group_row(started_at: Option<&str>, completed_at: Option<&str>) -> QueryRow {
        QueryRow::new()
            .with("id", Some("7"))
            .with("name", Some("orders"))
            .with("table_names", Some("orders, order_items,"))
            .with("schema_name", None)
            .with("created_at", Some("2024-05-01 10:00:00.25"))
            .with("started_at", started_at)
            .with("completed_at", completed_at)
    }

    #[test]
    fn test_decode_group_row() {
        let group = Group::try_from(&group_row(None, None)).unwrap();

        assert_eq!(group.id, 7);
        assert_eq!(group.name, "orders");
        assert_eq!(group.schema_name, None);
        assert_eq!(
            group.created_at,
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_milli_opt(10, 0, 0, 250)
        );
        assert_eq!(group.table_names(), vec!["orders", "order_items"]);
        assert_eq!(group.state(), GroupState::Created);
    }

    #[test]
    fn test_state_follows_timestamps() {
        let started = Group::try_from(&group_row(Some("2024-05-01 11:00:00"), None)).unwrap();
        assert_eq!(started.state(), GroupState::Started);

        let completed = Group::try_from(&group_row(
            Some("2024-05-01 11:00:00"),
            Some("2024-05-01 12:00:00"),
        ))
        .unwrap();
        assert_eq!(completed.state(), GroupState::Completed);
    }

    #[test]
    fn test_decode_rejects_invalid_values() {
        let row = group_row(Some("not a timestamp"), None);
        assert!(matches!(
            Group::try_from(&row),
            Err(GroupDecodeError::InvalidTimestamp {
                column: "started_at",
                ..
            })
        ));

        let row = QueryRow::new().with("id", Some("1")).with("name", Some("orders"));
        assert!(matches!(
            Group::try_from(&row),
            Err(GroupDecodeError::MissingColumn("table_names"))
        ));

        let row = QueryRow::new().with("id", Some("one"));
        assert!(matches!(
            Group::try_from(&row),
            Err(GroupDecodeError::InvalidInteger { column: "id", .. })
        ));
    }

    #[test]
    fn test_decode_bool() {
        let row = QueryRow::new().with("exists", Some("t"));
        assert!(decode_bool(&row, "exists").unwrap());

        let row = QueryRow::new().with("exists", Some("f"));
        assert!(!decode_bool(&row, "exists").unwrap());

        let row = QueryRow::new().with("exists", Some("maybe"));
        assert!(decode_bool(&row, "exists").is_err());
    }

    #[test]
    fn test_new_group_columns_skip_missing_attributes() {
        assert!(NewGroup::default().columns().is_empty());

        let new_group = NewGroup::named("o'brien").with_tables(["table1", "table2"]);
        assert_eq!(
            new_group.columns(),
            vec![
                ("name", "'o''brien'".to_owned()),
                ("table_names", "'table1, table2'".to_owned()),
            ]
        );
    }

    #[test]
    fn test_update_assignments() {
        assert!(GroupUpdate::new().is_empty());

        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let update = GroupUpdate::new()
            .started_at(started_at)
            .schema_name("public");

        assert_eq!(
            update.assignments(),
            vec![
                "started_at = '2024-05-01 10:30:00.000000'".to_owned(),
                "schema_name = 'public'".to_owned(),
            ]
        );
    }
}
