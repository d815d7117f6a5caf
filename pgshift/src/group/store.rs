use chrono::{DateTime, Utc};
use pg_escape::{quote_identifier, quote_literal};
use pgshift_config::shared::GroupStoreConfig;
use pgshift_postgres::{QueryExecutor, QueryRow};
use tracing::{debug, error, info};

use crate::group::model::decode_bool;
use crate::group::{Group, GroupError, GroupUpdate, NewGroup};

/// Name of the table holding the groups inside the internal schema.
pub const GROUPS_TABLE: &str = "groups";

/// Store of the [`Group`] rows of the internal schema.
///
/// Every statement is a single round trip through the [`QueryExecutor`]. Groups are looked up
/// by name, which is not unique: [`GroupStore::find`], [`GroupStore::update`] and
/// [`GroupStore::delete`] act on every group with the given name.
#[derive(Debug, Clone)]
pub struct GroupStore<E> {
    executor: E,
    schema: String,
}

impl<E> GroupStore<E>
where
    E: QueryExecutor,
{
    pub fn new(executor: E, config: &GroupStoreConfig) -> Self {
        Self {
            executor,
            schema: config.internal_schema.clone(),
        }
    }

    /// Returns the internal schema holding the table.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the schema qualified and quoted name of the groups table.
    fn table(&self) -> String {
        format!("{}.{GROUPS_TABLE}", quote_identifier(&self.schema))
    }

    async fn run(&self, query: &str) -> Result<Vec<QueryRow>, GroupError> {
        Ok(self.executor.run(query, Some(&self.schema)).await?)
    }

    async fn run_returning_groups(&self, query: &str) -> Result<Vec<Group>, GroupError> {
        let rows = self.run(query).await?;
        decode_groups(&rows)
    }

    /// Creates the internal schema and the groups table if they don't exist.
    ///
    /// Calling it again keeps the existing table and its rows.
    pub async fn setup(&self) -> Result<(), GroupError> {
        let query = format!(
            r#"
            create schema if not exists {schema};
            create table if not exists {table} (
                id serial primary key,
                name text not null,
                table_names text,
                schema_name text,
                created_at timestamp default timezone('utc', now()),
                started_at timestamp,
                completed_at timestamp
            );
            "#,
            schema = quote_identifier(&self.schema),
            table = self.table(),
        );
        self.run(&query).await?;

        info!(schema = %self.schema, "groups table is set up");

        Ok(())
    }

    /// Drops the groups table if it exists. The internal schema is kept.
    pub async fn drop(&self) -> Result<(), GroupError> {
        let query = format!("drop table if exists {}", self.table());
        self.run(&query).await?;

        info!(schema = %self.schema, "groups table dropped");

        Ok(())
    }

    /// Returns whether the groups table exists in the internal schema.
    pub async fn exists(&self) -> Result<bool, GroupError> {
        let query = format!(
            r#"
            select exists (
                select from pg_tables
                where schemaname = {schema} and tablename = {table}
            )
            "#,
            schema = quote_literal(&self.schema),
            table = quote_literal(GROUPS_TABLE),
        );
        let rows = self.run(&query).await?;

        match rows.first() {
            Some(row) => Ok(decode_bool(row, "exists")?),
            None => Ok(false),
        }
    }

    /// Inserts a group with the supplied attributes and returns it.
    ///
    /// Any rejection by the database, like a missing name, is returned as an error prefixed
    /// with `Adding group entry failed:` followed by the server diagnostic.
    pub async fn create(&self, new_group: &NewGroup) -> Result<Group, GroupError> {
        let columns = new_group.columns();
        let query = if columns.is_empty() {
            format!("insert into {} default values returning *", self.table())
        } else {
            let (names, values): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
            format!(
                "insert into {} ({}) values ({}) returning *",
                self.table(),
                names.join(", "),
                values.join(", ")
            )
        };

        let rows = match self.executor.run(&query, Some(&self.schema)).await {
            Ok(rows) => rows,
            Err(err) => {
                let err = GroupError::from_create_failure(err);
                error!(schema = %self.schema, group_name = ?new_group.name, "{err}");

                return Err(err);
            }
        };

        let group = rows
            .first()
            .map(Group::try_from)
            .transpose()?
            .ok_or(GroupError::NoRowReturned)?;

        info!(
            schema = %self.schema,
            group_id = group.id,
            group_name = %group.name,
            "group created"
        );

        Ok(group)
    }

    /// Returns the groups named `name`, ordered by id. Empty when there is none.
    pub async fn find(&self, name: &str) -> Result<Vec<Group>, GroupError> {
        let query = format!(
            "select * from {} where name = {} order by id",
            self.table(),
            quote_literal(name)
        );
        let groups = self.run_returning_groups(&query).await?;

        debug!(
            schema = %self.schema,
            group_name = name,
            found = groups.len(),
            "groups looked up"
        );

        Ok(groups)
    }

    /// Returns every group, ordered by id.
    pub async fn list(&self) -> Result<Vec<Group>, GroupError> {
        let query = format!("select * from {} order by id", self.table());

        self.run_returning_groups(&query).await
    }

    /// Applies `update` to the groups named `group_name` and returns them as updated.
    ///
    /// A name matching no group returns an empty vector. An empty update writes nothing and
    /// returns the current groups.
    pub async fn update(
        &self,
        group_name: &str,
        update: &GroupUpdate,
    ) -> Result<Vec<Group>, GroupError> {
        let assignments = update.assignments();
        if assignments.is_empty() {
            return self.find(group_name).await;
        }

        let query = format!(
            "update {} set {} where name = {} returning *",
            self.table(),
            assignments.join(", "),
            quote_literal(group_name)
        );
        let mut groups = self.run_returning_groups(&query).await?;
        groups.sort_by_key(|group| group.id);

        info!(
            schema = %self.schema,
            group_name,
            updated = groups.len(),
            "groups updated"
        );

        Ok(groups)
    }

    /// Records the start of the run of the groups named `group_name`.
    pub async fn mark_started(
        &self,
        group_name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Vec<Group>, GroupError> {
        self.update(group_name, &GroupUpdate::new().started_at(started_at))
            .await
    }

    /// Records the completion of the run of the groups named `group_name`.
    pub async fn mark_completed(
        &self,
        group_name: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<Group>, GroupError> {
        self.update(group_name, &GroupUpdate::new().completed_at(completed_at))
            .await
    }

    /// Deletes the groups named `group_name` and returns how many were removed.
    pub async fn delete(&self, group_name: &str) -> Result<u64, GroupError> {
        let query = format!(
            "delete from {} where name = {} returning id",
            self.table(),
            quote_literal(group_name)
        );
        let deleted = self.run(&query).await?.len() as u64;

        info!(schema = %self.schema, group_name, deleted, "groups deleted");

        Ok(deleted)
    }
}

fn decode_groups(rows: &[QueryRow]) -> Result<Vec<Group>, GroupError> {
    rows.iter()
        .map(|row| Group::try_from(row).map_err(GroupError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupDecodeError, GroupState};
    use crate::test_utils::executor::{ScriptedExecutor, group_row};
    use chrono::TimeZone;
    use pgshift_postgres::QueryError;
    use pgshift_postgres::error::SqlState;

    fn store(executor: &ScriptedExecutor) -> GroupStore<ScriptedExecutor> {
        GroupStore::new(executor.clone(), &GroupStoreConfig::new("pgshift"))
    }

    fn squash(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_setup_is_idempotent_ddl() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);

        store.setup().await.unwrap();

        let calls = executor.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].schema.as_deref(), Some("pgshift"));
        let query = squash(&calls[0].query);
        assert!(query.contains("create schema if not exists pgshift;"));
        assert!(query.contains("create table if not exists pgshift.groups ("));
        assert!(query.contains("id serial primary key, name text not null, table_names text, schema_name text, created_at timestamp default timezone('utc', now()), started_at timestamp, completed_at timestamp"));
    }

    #[tokio::test]
    async fn test_drop_and_exists() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);

        store.drop().await.unwrap();
        executor
            .push_rows(vec![QueryRow::new().with("exists", Some("f"))])
            .await;
        assert!(!store.exists().await.unwrap());

        let calls = executor.calls().await;
        assert_eq!(calls[0].query, "drop table if exists pgshift.groups");
        assert!(squash(&calls[1].query).contains(
            "where schemaname = 'pgshift' and tablename = 'groups'"
        ));
    }

    #[tokio::test]
    async fn test_create_inserts_supplied_fields_only() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_rows(vec![group_row(1, "test", None, None)])
            .await;

        let group = store.create(&NewGroup::named("test")).await.unwrap();

        assert_eq!(group.id, 1);
        assert_eq!(group.name, "test");
        assert_eq!(group.table_names, None);
        assert_eq!(group.state(), GroupState::Created);
        assert_eq!(
            executor.calls().await[0].query,
            "insert into pgshift.groups (name) values ('test') returning *"
        );
    }

    #[tokio::test]
    async fn test_create_without_attributes_uses_default_values() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_error(QueryError::Database {
                code: SqlState::NOT_NULL_VIOLATION,
                message: r#"ERROR: null value in column "name" of relation "groups" violates not-null constraint"#.to_owned(),
            })
            .await;

        let err = store.create(&NewGroup::default()).await.unwrap_err();

        assert!(matches!(err, GroupError::ConstraintViolation(_)));
        assert!(
            err.to_string()
                .starts_with(r#"Adding group entry failed: ERROR: null value in column "name""#)
        );
        assert_eq!(
            executor.calls().await[0].query,
            "insert into pgshift.groups default values returning *"
        );
    }

    #[tokio::test]
    async fn test_create_without_returned_row() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);

        let err = store.create(&NewGroup::named("test")).await.unwrap_err();

        assert!(matches!(err, GroupError::NoRowReturned));
    }

    #[tokio::test]
    async fn test_find_quotes_name_and_decodes_rows() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_rows(vec![
                group_row(1, "it's", None, None),
                group_row(2, "it's", Some("2024-05-01 10:00:00.5"), None),
            ])
            .await;

        let groups = store.find("it's").await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].state(), GroupState::Started);
        assert_eq!(
            executor.calls().await[0].query,
            "select * from pgshift.groups where name = 'it''s' order by id"
        );
    }

    #[tokio::test]
    async fn test_find_surfaces_decode_errors() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_rows(vec![QueryRow::new().with("id", Some("1"))])
            .await;

        let err = store.find("test").await.unwrap_err();

        assert!(matches!(
            err,
            GroupError::Decode(GroupDecodeError::MissingColumn("name"))
        ));
    }

    #[tokio::test]
    async fn test_update_sets_timestamps() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_rows(vec![
                group_row(
                    2,
                    "test",
                    Some("2024-05-01 10:00:00"),
                    Some("2024-05-01 11:00:00"),
                ),
                group_row(1, "test", Some("2024-05-01 10:00:00"), Some("2024-05-01 11:00:00")),
            ])
            .await;

        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let completed_at = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        let groups = store
            .update(
                "test",
                &GroupUpdate::new()
                    .started_at(started_at)
                    .completed_at(completed_at),
            )
            .await
            .unwrap();

        assert_eq!(
            groups.iter().map(|group| group.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(groups[0].started_at, Some(started_at.naive_utc()));
        assert_eq!(groups[0].state(), GroupState::Completed);
        assert_eq!(
            executor.calls().await[0].query,
            "update pgshift.groups set started_at = '2024-05-01 10:00:00.000000', \
             completed_at = '2024-05-01 11:00:00.000000' where name = 'test' returning *"
        );
    }

    #[tokio::test]
    async fn test_empty_update_only_reads() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);

        let groups = store.update("missing", &GroupUpdate::new()).await.unwrap();

        assert!(groups.is_empty());
        let calls = executor.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].query.starts_with("select * from pgshift.groups"));
    }

    #[tokio::test]
    async fn test_delete_counts_removed_rows() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_rows(vec![
                QueryRow::new().with("id", Some("1")),
                QueryRow::new().with("id", Some("3")),
            ])
            .await;

        assert_eq!(store.delete("test").await.unwrap(), 2);
        assert_eq!(store.delete("test").await.unwrap(), 0);
        assert_eq!(
            executor.calls().await[0].query,
            "delete from pgshift.groups where name = 'test' returning id"
        );
    }

    #[tokio::test]
    async fn test_query_errors_propagate_unchanged() {
        let executor = ScriptedExecutor::new();
        let store = store(&executor);
        executor
            .push_error(QueryError::Database {
                code: SqlState::UNDEFINED_TABLE,
                message: r#"ERROR: relation "pgshift.groups" does not exist"#.to_owned(),
            })
            .await;

        let err = store.find("test").await.unwrap_err();

        assert!(matches!(err, GroupError::Query(QueryError::Database { .. })));
        assert_eq!(
            err.to_string(),
            r#"ERROR: relation "pgshift.groups" does not exist"#
        );
    }

    #[tokio::test]
    async fn test_quotes_unusual_schema_names() {
        let executor = ScriptedExecutor::new();
        let store = GroupStore::new(executor.clone(), &GroupStoreConfig::new("Shift Meta"));

        store.drop().await.unwrap();

        assert_eq!(
            executor.calls().await[0].query,
            r#"drop table if exists "Shift Meta".groups"#
        );
    }
}
