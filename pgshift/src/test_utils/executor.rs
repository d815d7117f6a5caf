use pgshift_postgres::{QueryError, QueryExecutor, QueryRow};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A statement received by a [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedQuery {
    pub query: String,
    pub schema: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    responses: VecDeque<Result<Vec<QueryRow>, QueryError>>,
    calls: Vec<ExecutedQuery>,
}

/// In-memory [`QueryExecutor`] replaying scripted responses.
///
/// Each call records the statement and pops the next scripted response. With no response left
/// a call succeeds with no rows. Clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues rows returned by the next unanswered call.
    pub async fn push_rows(&self, rows: Vec<QueryRow>) {
        let mut inner = self.inner.lock().await;
        inner.responses.push_back(Ok(rows));
    }

    /// Queues an error returned by the next unanswered call.
    pub async fn push_error(&self, error: QueryError) {
        let mut inner = self.inner.lock().await;
        inner.responses.push_back(Err(error));
    }

    /// Returns the statements received so far, in order.
    pub async fn calls(&self) -> Vec<ExecutedQuery> {
        let inner = self.inner.lock().await;
        inner.calls.clone()
    }
}

impl QueryExecutor for ScriptedExecutor {
    async fn run(&self, query: &str, schema: Option<&str>) -> Result<Vec<QueryRow>, QueryError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ExecutedQuery {
            query: query.to_owned(),
            schema: schema.map(str::to_owned),
        });

        inner.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Builds a `groups` row the way Postgres returns it.
pub fn group_row(
    id: i32,
    name: &str,
    started_at: Option<&str>,
    completed_at: Option<&str>,
) -> QueryRow {
    QueryRow::new()
        .with("id", Some(id.to_string().as_str()))
        .with("name", Some(name))
        .with("table_names", None)
        .with("schema_name", None)
        .with("created_at", Some("2024-05-01 09:00:00.123456"))
        .with("started_at", started_at)
        .with("completed_at", completed_at)
}
