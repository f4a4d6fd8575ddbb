//! Repository traits describing persistence adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{AuditLogRecord, SnapshotRecord};
use crate::domain::snapshots::{ReportType, SnapshotKey, SourceDataset};
use crate::domain::types::SnapshotStatus;

/// Partial unique index guarding `(bank_id, period, report_type)` for active snapshots.
pub const ACTIVE_SNAPSHOT_KEY_CONSTRAINT: &str = "snapshots_active_key_idx";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, RepoError::Duplicate { constraint: c } if c == constraint)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateSnapshotStatusParams {
    pub id: Uuid,
    pub expected: SnapshotStatus,
    pub status: SnapshotStatus,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotQueryFilter {
    pub bank_id: Option<Uuid>,
    pub period: Option<OffsetDateTime>,
    pub report_type: Option<ReportType>,
    pub status: Option<SnapshotStatus>,
}

#[async_trait]
pub trait BanksRepo: Send + Sync {
    async fn bank_exists(&self, id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait SnapshotsRepo: Send + Sync {
    /// Id of a snapshot holding `key` in any status other than `FAILED_VALIDATION`.
    async fn find_active_snapshot(&self, key: &SnapshotKey) -> Result<Option<Uuid>, RepoError>;

    async fn find_snapshot(&self, id: Uuid) -> Result<Option<SnapshotRecord>, RepoError>;

    /// Newest first, ordered by `(created_at, id)` descending.
    async fn list_snapshots(
        &self,
        filter: &SnapshotQueryFilter,
        limit: u32,
    ) -> Result<Vec<SnapshotRecord>, RepoError>;

    async fn begin_snapshot_write(&self) -> Result<Box<dyn SnapshotWriteTx>, RepoError>;

    /// Compare-and-set status update; `None` when the row is missing or no longer in `expected`.
    async fn update_status(
        &self,
        params: UpdateSnapshotStatusParams,
    ) -> Result<Option<SnapshotRecord>, RepoError>;
}

/// Writes performed inside one snapshot-creation transaction.
///
/// Dropping an uncommitted handle must discard every write made through it.
#[async_trait]
pub trait SnapshotWriteTx: Send {
    async fn insert_snapshot(&mut self, record: &SnapshotRecord) -> Result<(), RepoError>;

    /// Freeze rows of `dataset` effective on or before the key's period; returns rows copied.
    async fn copy_source_dataset(
        &mut self,
        dataset: SourceDataset,
        snapshot_id: Uuid,
        key: &SnapshotKey,
    ) -> Result<u64, RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;

    async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogRecord>, RepoError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self, timeout: Duration) -> Result<(), RepoError>;
}
