use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    RepoError, SnapshotQueryFilter, SnapshotWriteTx, SnapshotsRepo, UpdateSnapshotStatusParams,
};
use crate::domain::entities::SnapshotRecord;
use crate::domain::snapshots::{ReportType, SnapshotKey, SourceDataset};
use crate::domain::types::SnapshotStatus;

use super::{PostgresRepositories, map_sqlx_error};

const SNAPSHOT_COLUMNS: &str = "id, bank_id, period, report_type, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    bank_id: Uuid,
    period: OffsetDateTime,
    report_type: String,
    status: SnapshotStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<SnapshotRow> for SnapshotRecord {
    type Error = RepoError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let report_type =
            ReportType::parse(&row.report_type).map_err(RepoError::from_persistence)?;
        Ok(Self {
            id: row.id,
            bank_id: row.bank_id,
            period: row.period,
            report_type,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SnapshotsRepo for PostgresRepositories {
    async fn find_active_snapshot(&self, key: &SnapshotKey) -> Result<Option<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM snapshots
            WHERE bank_id = $1 AND period = $2 AND report_type = $3 AND status <> $4
            LIMIT 1
            "#,
        )
        .bind(key.bank_id)
        .bind(key.period)
        .bind(key.report_type.as_str())
        .bind(SnapshotStatus::FailedValidation)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_snapshot(&self, id: Uuid) -> Result<Option<SnapshotRecord>, RepoError> {
        let row: Option<SnapshotRow> = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SnapshotRecord::try_from).transpose()
    }

    async fn list_snapshots(
        &self,
        filter: &SnapshotQueryFilter,
        limit: u32,
    ) -> Result<Vec<SnapshotRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE 1=1 "
        ));

        if let Some(bank_id) = filter.bank_id {
            qb.push(" AND bank_id = ");
            qb.push_bind(bank_id);
        }

        if let Some(period) = filter.period {
            qb.push(" AND period = ");
            qb.push_bind(period);
        }

        if let Some(report_type) = filter.report_type.as_ref() {
            qb.push(" AND report_type = ");
            qb.push_bind(report_type.as_str().to_string());
        }

        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<SnapshotRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(SnapshotRecord::try_from).collect()
    }

    async fn begin_snapshot_write(&self) -> Result<Box<dyn SnapshotWriteTx>, RepoError> {
        let tx = self.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgSnapshotWriteTx { tx }))
    }

    async fn update_status(
        &self,
        params: UpdateSnapshotStatusParams,
    ) -> Result<Option<SnapshotRecord>, RepoError> {
        let row: Option<SnapshotRow> = sqlx::query_as::<_, SnapshotRow>(&format!(
            r#"
            UPDATE snapshots
               SET status = $3,
                   updated_at = $4
             WHERE id = $1 AND status = $2
            RETURNING {SNAPSHOT_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.expected)
        .bind(params.status)
        .bind(params.updated_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SnapshotRecord::try_from).transpose()
    }
}

/// Snapshot-creation transaction on a pooled Postgres connection.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgSnapshotWriteTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SnapshotWriteTx for PgSnapshotWriteTx {
    async fn insert_snapshot(&mut self, record: &SnapshotRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (id, bank_id, period, report_type, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.bank_id)
        .bind(record.period)
        .bind(record.report_type.as_str())
        .bind(record.status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(self.tx.as_mut())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn copy_source_dataset(
        &mut self,
        dataset: SourceDataset,
        snapshot_id: Uuid,
        key: &SnapshotKey,
    ) -> Result<u64, RepoError> {
        let statement = match dataset {
            SourceDataset::LoanExposures => {
                r#"
                INSERT INTO loan_exposure_snapshots (
                    snapshot_id, loan_id, account_id, customer_id, customer_category,
                    principal_amount, interest_rate, collateral_value, days_past_due,
                    country, effective_at
                )
                SELECT $1, loan_id, account_id, customer_id, customer_category,
                       principal_amount, interest_rate, collateral_value, days_past_due,
                       country, effective_at
                  FROM loan_exposures
                 WHERE bank_id = $2 AND effective_at <= $3
                "#
            }
        };

        let result = sqlx::query(statement)
            .bind(snapshot_id)
            .bind(key.bank_id)
            .bind(key.period)
            .execute(self.tx.as_mut())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
