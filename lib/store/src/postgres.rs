//! Postgres-backed store.
//!
//! Definitions and execution contexts are stored as JSONB with the columns
//! the engine queries (status, wake time, contact/workflow keys) broken out
//! for indexing. The guarded insert takes a per-(workflow, contact)
//! advisory transaction lock before its existence check, so two concurrent
//! starts for the same contact serialize at the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copper_pigeon_core::{ContactId, ExecutionId, OrganizationId, WorkflowId};
use copper_pigeon_workflow::{
    CountScope, ExecutionContext, ExecutionStore, InsertGuard, StoreError, Workflow,
    WorkflowStore,
};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Runs the store's migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Backend {
            reason: e.to_string(),
        })
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: JsonValue) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Backend {
        reason: format!("stored record failed to decode: {e}"),
    })
}

/// Read access to workflow definitions stored in Postgres.
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_workflow(row: &PgRow) -> Result<Workflow, StoreError> {
        let definition: JsonValue = row.try_get("definition").map_err(backend)?;
        let mut workflow: Workflow = decode(definition)?;
        workflow.graph.rebuild_index_map();
        Ok(workflow)
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        let row = sqlx::query("SELECT definition FROM workflow_definitions WHERE id = $1")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(Self::decode_workflow).transpose()
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Workflow>, StoreError> {
        let rows = sqlx::query(
            "SELECT definition FROM workflow_definitions \
             WHERE organization_id = $1 AND status = 'active'",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::decode_workflow).collect()
    }
}

/// Execution persistence in Postgres.
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_context(row: &PgRow) -> Result<ExecutionContext, StoreError> {
        let context: JsonValue = row.try_get("context").map_err(backend)?;
        decode(context)
    }
}

const UPSERT_EXECUTION: &str = "INSERT INTO workflow_executions \
     (id, workflow_id, contact_id, organization_id, status, wake_at, context) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) \
     ON CONFLICT (id) DO UPDATE \
     SET status = EXCLUDED.status, wake_at = EXCLUDED.wake_at, context = EXCLUDED.context";

fn bind_execution<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    context: &ExecutionContext,
    body: JsonValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(context.execution_id.to_string())
        .bind(context.workflow_id.to_string())
        .bind(context.contact_id.to_string())
        .bind(context.organization_id.to_string())
        .bind(context.status.as_str())
        .bind(context.wake_at)
        .bind(body)
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn insert(
        &self,
        context: &ExecutionContext,
        guard: InsertGuard,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_value(context).map_err(|e| StoreError::Backend {
            reason: e.to_string(),
        })?;

        match guard {
            InsertGuard::None => {
                bind_execution(sqlx::query(UPSERT_EXECUTION), context, body)
                    .execute(&self.pool)
                    .await
                    .map_err(backend)?;
            }
            InsertGuard::NoActiveForContact => {
                let mut tx = self.pool.begin().await.map_err(backend)?;

                // Serialize concurrent starts for this (workflow, contact)
                // pair for the duration of the transaction.
                sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                    .bind(format!("{}:{}", context.workflow_id, context.contact_id))
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;

                let row = sqlx::query(
                    "SELECT count(*) AS n FROM workflow_executions \
                     WHERE workflow_id = $1 AND contact_id = $2 \
                     AND status IN ('running', 'waiting')",
                )
                .bind(context.workflow_id.to_string())
                .bind(context.contact_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
                let active: i64 = row.try_get("n").map_err(backend)?;

                if active > 0 {
                    return Err(StoreError::ActiveExecutionExists {
                        workflow_id: context.workflow_id,
                        contact_id: context.contact_id,
                    });
                }

                bind_execution(sqlx::query(UPSERT_EXECUTION), context, body)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;

                tx.commit().await.map_err(backend)?;
            }
        }
        Ok(())
    }

    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError> {
        let body = serde_json::to_value(context).map_err(|e| StoreError::Backend {
            reason: e.to_string(),
        })?;
        bind_execution(sqlx::query(UPSERT_EXECUTION), context, body)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn load(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExecutionContext>, StoreError> {
        let row = sqlx::query("SELECT context FROM workflow_executions WHERE id = $1")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(Self::decode_context).transpose()
    }

    async fn count_for_contact(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        scope: CountScope,
    ) -> Result<u64, StoreError> {
        let sql = match scope {
            CountScope::Any => {
                "SELECT count(*) AS n FROM workflow_executions \
                 WHERE workflow_id = $1 AND contact_id = $2"
            }
            CountScope::Active => {
                "SELECT count(*) AS n FROM workflow_executions \
                 WHERE workflow_id = $1 AND contact_id = $2 \
                 AND status IN ('running', 'waiting')"
            }
            CountScope::Completed => {
                "SELECT count(*) AS n FROM workflow_executions \
                 WHERE workflow_id = $1 AND contact_id = $2 AND status = 'completed'"
            }
        };

        let row = sqlx::query(sql)
            .bind(workflow_id.to_string())
            .bind(contact_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.try_get("n").map_err(backend)?;
        Ok(count as u64)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionContext>, StoreError> {
        let rows = sqlx::query(
            "SELECT context FROM workflow_executions \
             WHERE status = 'waiting' AND wake_at <= $1 \
             ORDER BY wake_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::decode_context).collect()
    }
}
