//! Snapshot creation and lifecycle service.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::audit::{ACTION_CREATE_SNAPSHOT, ACTION_TRANSITION_SNAPSHOT, AuditService};
use crate::application::context::OperationContext;
use crate::application::repos::{
    ACTIVE_SNAPSHOT_KEY_CONSTRAINT, BanksRepo, RepoError, SnapshotQueryFilter, SnapshotWriteTx,
    SnapshotsRepo, UpdateSnapshotStatusParams,
};
use crate::domain::entities::SnapshotRecord;
use crate::domain::error::DomainError;
use crate::domain::snapshots::{INITIAL_STATUS, ReportType, SnapshotKey, ensure_transition};
use crate::domain::types::SnapshotStatus;

pub const METRIC_SNAPSHOT_CREATED_TOTAL: &str = "regsnap_snapshot_created_total";
pub const METRIC_SNAPSHOT_CONFLICT_TOTAL: &str = "regsnap_snapshot_conflict_total";
pub const METRIC_SNAPSHOT_CREATE_FAILED_TOTAL: &str = "regsnap_snapshot_create_failed_total";
pub const METRIC_SNAPSHOT_CREATE_MS: &str = "regsnap_snapshot_create_ms";

const OP_CREATE: &str = "snapshot.create";
const OP_BANK_LOOKUP: &str = "snapshot.create.bank_lookup";
const OP_DUPLICATE_CHECK: &str = "snapshot.create.duplicate_check";
const OP_BEGIN: &str = "snapshot.create.begin";
const OP_INSERT: &str = "snapshot.create.insert";
const OP_COPY_SOURCES: &str = "snapshot.create.copy_sources";
const OP_COMMIT: &str = "snapshot.create.commit";
const OP_GET: &str = "snapshot.get";
const OP_LIST: &str = "snapshot.list";
const OP_TRANSITION: &str = "snapshot.transition";

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Unparsed listing criteria; every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ListSnapshotsRequest {
    pub bank_id: Option<Uuid>,
    pub period: Option<OffsetDateTime>,
    pub report_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

/// Coarse error classes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Internal,
}

#[derive(Debug, Error)]
pub enum SnapshotServiceError {
    #[error("bank `{bank_id}` not found")]
    BankNotFound { bank_id: Uuid },
    #[error(
        "snapshot already exists for bank `{}`, period {}, report type `{}`",
        key.bank_id,
        key.period,
        key.report_type
    )]
    AlreadyExists {
        key: SnapshotKey,
        existing_id: Option<Uuid>,
    },
    #[error("snapshot `{id}` not found")]
    NotFound { id: Uuid },
    #[error("snapshot `{id}` is no longer in status {expected}")]
    StatusChanged { id: Uuid, expected: SnapshotStatus },
    #[error("{op}: {source}")]
    Invalid {
        op: &'static str,
        #[source]
        source: DomainError,
    },
    #[error("{op}: transaction failed")]
    Transaction {
        op: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("{op}: persistence failed")]
    Persistence {
        op: &'static str,
        #[source]
        source: RepoError,
    },
}

impl SnapshotServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapshotServiceError::BankNotFound { .. } | SnapshotServiceError::NotFound { .. } => {
                ErrorKind::NotFound
            }
            SnapshotServiceError::AlreadyExists { .. }
            | SnapshotServiceError::StatusChanged { .. } => ErrorKind::Conflict,
            SnapshotServiceError::Invalid { .. } => ErrorKind::Invalid,
            SnapshotServiceError::Transaction { .. } | SnapshotServiceError::Persistence { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotServiceError::BankNotFound { .. } => "bank_not_found",
            SnapshotServiceError::AlreadyExists { .. } => "snapshot_already_exists",
            SnapshotServiceError::NotFound { .. } => "snapshot_not_found",
            SnapshotServiceError::StatusChanged { .. } => "snapshot_status_changed",
            SnapshotServiceError::Invalid { .. } => "invalid_input",
            SnapshotServiceError::Transaction { .. } => "transaction_error",
            SnapshotServiceError::Persistence { .. } => "persistence_error",
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            SnapshotServiceError::BankNotFound { .. } => OP_BANK_LOOKUP,
            SnapshotServiceError::AlreadyExists { .. } => OP_CREATE,
            SnapshotServiceError::NotFound { .. } => OP_GET,
            SnapshotServiceError::StatusChanged { .. } => OP_TRANSITION,
            SnapshotServiceError::Invalid { op, .. }
            | SnapshotServiceError::Transaction { op, .. }
            | SnapshotServiceError::Persistence { op, .. } => op,
        }
    }

    fn invalid(op: &'static str, source: DomainError) -> Self {
        Self::Invalid { op, source }
    }

    fn transaction(op: &'static str, source: RepoError) -> Self {
        Self::Transaction { op, source }
    }

    fn persistence(op: &'static str, source: RepoError) -> Self {
        Self::Persistence { op, source }
    }
}

/// Translate a write failure, treating a violation of the active-key index as a conflict.
fn classify_write_error(
    key: &SnapshotKey,
    err: RepoError,
    wrap: fn(&'static str, RepoError) -> SnapshotServiceError,
    op: &'static str,
) -> SnapshotServiceError {
    if err.violates(ACTIVE_SNAPSHOT_KEY_CONSTRAINT) {
        SnapshotServiceError::AlreadyExists {
            key: key.clone(),
            existing_id: None,
        }
    } else {
        wrap(op, err)
    }
}

/// Parse a status given either by name or by ordinal.
pub fn parse_status(raw: &str) -> Result<SnapshotStatus, DomainError> {
    let trimmed = raw.trim();
    if let Ok(ordinal) = trimmed.parse::<i64>() {
        return SnapshotStatus::from_ordinal(ordinal).ok_or_else(|| {
            DomainError::validation(format!("status ordinal {ordinal} is out of range"))
        });
    }
    SnapshotStatus::try_from(trimmed)
        .map_err(|_| DomainError::validation(format!("unknown status `{trimmed}`")))
}

#[derive(Clone)]
pub struct SnapshotService {
    banks: Arc<dyn BanksRepo>,
    snapshots: Arc<dyn SnapshotsRepo>,
    audit: AuditService,
}

impl SnapshotService {
    pub fn new(
        banks: Arc<dyn BanksRepo>,
        snapshots: Arc<dyn SnapshotsRepo>,
        audit: AuditService,
    ) -> Self {
        Self {
            banks,
            snapshots,
            audit,
        }
    }

    /// Create a `DRAFT` snapshot for `(bank_id, period, report_type)` and freeze its source data.
    ///
    /// Either the snapshot row and every copied source row become visible together, or nothing
    /// does. The audit entry is written after commit and never affects the outcome.
    pub async fn create_snapshot(
        &self,
        ctx: &OperationContext,
        bank_id: Uuid,
        period: OffsetDateTime,
        report_type: &str,
    ) -> Result<Uuid, SnapshotServiceError> {
        let started_at = Instant::now();
        let result = self.create_snapshot_inner(ctx, bank_id, period, report_type).await;
        histogram!(METRIC_SNAPSHOT_CREATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(_) => counter!(METRIC_SNAPSHOT_CREATED_TOTAL).increment(1),
            Err(SnapshotServiceError::AlreadyExists { .. }) => {
                counter!(METRIC_SNAPSHOT_CONFLICT_TOTAL).increment(1)
            }
            Err(_) => counter!(METRIC_SNAPSHOT_CREATE_FAILED_TOTAL).increment(1),
        }

        result
    }

    async fn create_snapshot_inner(
        &self,
        ctx: &OperationContext,
        bank_id: Uuid,
        period: OffsetDateTime,
        report_type: &str,
    ) -> Result<Uuid, SnapshotServiceError> {
        let report_type = ReportType::parse(report_type)
            .map_err(|err| SnapshotServiceError::invalid(OP_CREATE, err))?;
        let key = SnapshotKey::new(bank_id, period, report_type);

        debug!(
            target: "regsnap::snapshots",
            bank_id = %bank_id,
            correlation_id = %ctx.correlation_id,
            "validating bank existence"
        );
        let exists = self
            .banks
            .bank_exists(bank_id)
            .await
            .map_err(|err| SnapshotServiceError::persistence(OP_BANK_LOOKUP, err))?;
        if !exists {
            return Err(SnapshotServiceError::BankNotFound { bank_id });
        }

        // Fast path only; the partial unique index is the authoritative guard.
        if let Some(existing_id) = self
            .snapshots
            .find_active_snapshot(&key)
            .await
            .map_err(|err| SnapshotServiceError::persistence(OP_DUPLICATE_CHECK, err))?
        {
            warn!(
                target: "regsnap::snapshots",
                existing_id = %existing_id,
                bank_id = %bank_id,
                report_type = %key.report_type,
                correlation_id = %ctx.correlation_id,
                "active snapshot already exists for key"
            );
            return Err(SnapshotServiceError::AlreadyExists {
                key,
                existing_id: Some(existing_id),
            });
        }

        let mut tx = self
            .snapshots
            .begin_snapshot_write()
            .await
            .map_err(|err| SnapshotServiceError::transaction(OP_BEGIN, err))?;

        let now = OffsetDateTime::now_utc();
        let record = SnapshotRecord {
            id: Uuid::new_v4(),
            bank_id,
            period,
            report_type: key.report_type.clone(),
            status: INITIAL_STATUS,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = write_snapshot(tx.as_mut(), &record, &key).await {
            rollback_after_failure(tx, &record, ctx).await;
            return Err(err);
        }

        tx.commit().await.map_err(|err| {
            error!(
                target: "regsnap::snapshots",
                snapshot_id = %record.id,
                correlation_id = %ctx.correlation_id,
                error = %err,
                "failed to commit snapshot transaction"
            );
            classify_write_error(&key, err, SnapshotServiceError::transaction, OP_COMMIT)
        })?;

        self.audit
            .record_snapshot_event(ctx, ACTION_CREATE_SNAPSHOT, &record)
            .await;

        info!(
            target: "regsnap::snapshots",
            snapshot_id = %record.id,
            bank_id = %bank_id,
            report_type = %record.report_type,
            correlation_id = %ctx.correlation_id,
            "snapshot created"
        );

        Ok(record.id)
    }

    pub async fn get_snapshot(&self, id: Uuid) -> Result<SnapshotRecord, SnapshotServiceError> {
        self.snapshots
            .find_snapshot(id)
            .await
            .map_err(|err| SnapshotServiceError::persistence(OP_GET, err))?
            .ok_or(SnapshotServiceError::NotFound { id })
    }

    /// List snapshots matching `request`, newest first.
    pub async fn list_snapshots(
        &self,
        request: ListSnapshotsRequest,
    ) -> Result<Vec<SnapshotRecord>, SnapshotServiceError> {
        let report_type = request
            .report_type
            .as_deref()
            .map(ReportType::parse)
            .transpose()
            .map_err(|err| SnapshotServiceError::invalid(OP_LIST, err))?;
        let status = request
            .status
            .as_deref()
            .map(parse_status)
            .transpose()
            .map_err(|err| SnapshotServiceError::invalid(OP_LIST, err))?;

        let limit = match request.limit {
            None => DEFAULT_LIST_LIMIT,
            Some(0) => {
                return Err(SnapshotServiceError::invalid(
                    OP_LIST,
                    DomainError::validation("limit must be greater than zero"),
                ));
            }
            Some(limit) => limit.min(MAX_LIST_LIMIT),
        };

        let filter = SnapshotQueryFilter {
            bank_id: request.bank_id,
            period: request.period,
            report_type,
            status,
        };

        self.snapshots
            .list_snapshots(&filter, limit)
            .await
            .map_err(|err| SnapshotServiceError::persistence(OP_LIST, err))
    }

    /// Move a snapshot along one edge of the lifecycle graph.
    pub async fn transition_status(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        to: SnapshotStatus,
    ) -> Result<SnapshotRecord, SnapshotServiceError> {
        let current = self.get_snapshot(id).await?;
        ensure_transition(current.status, to)
            .map_err(|err| SnapshotServiceError::invalid(OP_TRANSITION, err))?;

        let key = current.key();
        let updated = self
            .snapshots
            .update_status(UpdateSnapshotStatusParams {
                id,
                expected: current.status,
                status: to,
                updated_at: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(|err| {
                classify_write_error(&key, err, SnapshotServiceError::persistence, OP_TRANSITION)
            })?
            .ok_or(SnapshotServiceError::StatusChanged {
                id,
                expected: current.status,
            })?;

        self.audit
            .record_snapshot_event(ctx, ACTION_TRANSITION_SNAPSHOT, &updated)
            .await;

        info!(
            target: "regsnap::snapshots",
            snapshot_id = %id,
            from = %current.status,
            to = %updated.status,
            correlation_id = %ctx.correlation_id,
            "snapshot status changed"
        );

        Ok(updated)
    }

    /// Like [`Self::transition_status`] but accepts a raw status name or ordinal.
    pub async fn transition_status_raw(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        to: &str,
    ) -> Result<SnapshotRecord, SnapshotServiceError> {
        let to =
            parse_status(to).map_err(|err| SnapshotServiceError::invalid(OP_TRANSITION, err))?;
        self.transition_status(ctx, id, to).await
    }
}

async fn write_snapshot(
    tx: &mut dyn SnapshotWriteTx,
    record: &SnapshotRecord,
    key: &SnapshotKey,
) -> Result<(), SnapshotServiceError> {
    tx.insert_snapshot(record).await.map_err(|err| {
        classify_write_error(key, err, SnapshotServiceError::persistence, OP_INSERT)
    })?;

    for dataset in key.report_type.source_datasets() {
        let copied = tx
            .copy_source_dataset(*dataset, record.id, key)
            .await
            .map_err(|err| {
                classify_write_error(key, err, SnapshotServiceError::persistence, OP_COPY_SOURCES)
            })?;
        debug!(
            target: "regsnap::snapshots",
            snapshot_id = %record.id,
            dataset = dataset.as_str(),
            rows = copied,
            "source dataset frozen"
        );
    }

    Ok(())
}

async fn rollback_after_failure(
    tx: Box<dyn SnapshotWriteTx>,
    record: &SnapshotRecord,
    ctx: &OperationContext,
) {
    if let Err(err) = tx.rollback().await {
        // The connection discards the transaction when it is released.
        error!(
            target: "regsnap::snapshots",
            snapshot_id = %record.id,
            correlation_id = %ctx.correlation_id,
            error = %err,
            "failed to roll back snapshot transaction"
        );
    }
}
