//! In-memory repositories with commit-only visibility and failure injection.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use tracing::Subscriber;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use uuid::Uuid;

use regsnap::application::audit::AuditService;
use regsnap::application::context::OperationContext;
use regsnap::application::repos::{
    ACTIVE_SNAPSHOT_KEY_CONSTRAINT, AuditRepo, BanksRepo, RepoError, SnapshotQueryFilter,
    SnapshotWriteTx, SnapshotsRepo, StoreHealth, UpdateSnapshotStatusParams,
};
use regsnap::application::snapshots::SnapshotService;
use regsnap::domain::entities::{AuditLogRecord, SnapshotRecord};
use regsnap::domain::snapshots::{SnapshotKey, SourceDataset, blocks_recreation};
use regsnap::domain::types::SnapshotStatus;

pub const PERIOD: OffsetDateTime = datetime!(2025-03-31 00:00 UTC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    BankLookup,
    DuplicateCheck,
    Begin,
    Insert,
    Copy,
    Commit,
    Rollback,
    Audit,
    Health,
}

#[derive(Default)]
struct StoreState {
    banks: HashSet<Uuid>,
    snapshots: HashMap<Uuid, SnapshotRecord>,
    /// bank id → `effective_at` of each source loan exposure.
    loan_exposures: HashMap<Uuid, Vec<OffsetDateTime>>,
    /// snapshot id → number of frozen loan exposure rows.
    frozen_rows: HashMap<Uuid, u64>,
    audit: Vec<AuditLogRecord>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<StoreState>,
    failures: Mutex<HashSet<FailPoint>>,
    skip_duplicate_check: Mutex<bool>,
    status_before_update: Mutex<Option<SnapshotStatus>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn injected(point: FailPoint) -> RepoError {
    RepoError::Persistence(format!("injected failure at {point:?}"))
}

fn active_key_violation() -> RepoError {
    RepoError::Duplicate {
        constraint: ACTIVE_SNAPSHOT_KEY_CONSTRAINT.to_string(),
    }
}

fn key_taken(state: &StoreState, key: &SnapshotKey, except: Option<Uuid>) -> bool {
    state.snapshots.values().any(|existing| {
        Some(existing.id) != except && blocks_recreation(existing.status) && existing.key() == *key
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bank(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.state.lock().unwrap().banks.insert(id);
        id
    }

    pub fn add_loan_exposure(&self, bank_id: Uuid, effective_at: OffsetDateTime) {
        self.inner
            .state
            .lock()
            .unwrap()
            .loan_exposures
            .entry(bank_id)
            .or_default()
            .push(effective_at);
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.inner.failures.lock().unwrap().insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        self.inner.failures.lock().unwrap().remove(&point);
    }

    /// Make the duplicate pre-check report nothing, so only the unique index can catch a clash.
    pub fn skip_duplicate_check(&self) {
        *self.inner.skip_duplicate_check.lock().unwrap() = true;
    }

    pub fn snapshot(&self, id: Uuid) -> Option<SnapshotRecord> {
        self.inner.state.lock().unwrap().snapshots.get(&id).cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.state.lock().unwrap().snapshots.len()
    }

    pub fn frozen_rows(&self, snapshot_id: Uuid) -> Option<u64> {
        self.inner
            .state
            .lock()
            .unwrap()
            .frozen_rows
            .get(&snapshot_id)
            .copied()
    }

    pub fn frozen_row_total(&self) -> u64 {
        self.inner.state.lock().unwrap().frozen_rows.values().sum()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogRecord> {
        self.inner.state.lock().unwrap().audit.clone()
    }

    /// Force a stored snapshot into `status`, bypassing the lifecycle rules.
    pub fn force_status(&self, id: Uuid, status: SnapshotStatus) {
        if let Some(record) = self.inner.state.lock().unwrap().snapshots.get_mut(&id) {
            record.status = status;
        }
    }

    /// Let another writer move the target row to `status` just before the next status update.
    pub fn change_status_before_next_update(&self, status: SnapshotStatus) {
        *self.inner.status_before_update.lock().unwrap() = Some(status);
    }

    pub fn begins(&self) -> usize {
        self.inner.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    fn check(&self, point: FailPoint) -> Result<(), RepoError> {
        if self.inner.failures.lock().unwrap().contains(&point) {
            Err(injected(point))
        } else {
            Ok(())
        }
    }

    pub fn service(&self) -> SnapshotService {
        let banks: Arc<dyn BanksRepo> = Arc::new(self.clone());
        let snapshots: Arc<dyn SnapshotsRepo> = Arc::new(self.clone());
        let audit: Arc<dyn AuditRepo> = Arc::new(self.clone());
        SnapshotService::new(banks, snapshots, AuditService::new(audit))
    }
}

#[async_trait]
impl BanksRepo for MemoryStore {
    async fn bank_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        self.check(FailPoint::BankLookup)?;
        Ok(self.inner.state.lock().unwrap().banks.contains(&id))
    }
}

#[async_trait]
impl SnapshotsRepo for MemoryStore {
    async fn find_active_snapshot(&self, key: &SnapshotKey) -> Result<Option<Uuid>, RepoError> {
        self.check(FailPoint::DuplicateCheck)?;
        if *self.inner.skip_duplicate_check.lock().unwrap() {
            return Ok(None);
        }
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .snapshots
            .values()
            .find(|existing| blocks_recreation(existing.status) && existing.key() == *key)
            .map(|existing| existing.id))
    }

    async fn find_snapshot(&self, id: Uuid) -> Result<Option<SnapshotRecord>, RepoError> {
        Ok(self.inner.state.lock().unwrap().snapshots.get(&id).cloned())
    }

    async fn list_snapshots(
        &self,
        filter: &SnapshotQueryFilter,
        limit: u32,
    ) -> Result<Vec<SnapshotRecord>, RepoError> {
        let state = self.inner.state.lock().unwrap();
        let mut records: Vec<SnapshotRecord> = state
            .snapshots
            .values()
            .filter(|record| filter.bank_id.is_none_or(|bank_id| record.bank_id == bank_id))
            .filter(|record| filter.period.is_none_or(|period| record.period == period))
            .filter(|record| {
                filter
                    .report_type
                    .as_ref()
                    .is_none_or(|report_type| record.report_type == *report_type)
            })
            .filter(|record| filter.status.is_none_or(|status| record.status == status))
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn begin_snapshot_write(&self) -> Result<Box<dyn SnapshotWriteTx>, RepoError> {
        self.check(FailPoint::Begin)?;
        self.inner.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryWriteTx {
            store: self.clone(),
            snapshot: None,
            frozen: Vec::new(),
        }))
    }

    async fn update_status(
        &self,
        params: UpdateSnapshotStatusParams,
    ) -> Result<Option<SnapshotRecord>, RepoError> {
        let mut state = self.inner.state.lock().unwrap();
        let raced = self.inner.status_before_update.lock().unwrap().take();
        if let (Some(status), Some(record)) = (raced, state.snapshots.get_mut(&params.id)) {
            record.status = status;
        }
        let Some(current) = state.snapshots.get(&params.id).cloned() else {
            return Ok(None);
        };
        if current.status != params.expected {
            return Ok(None);
        }
        if blocks_recreation(params.status)
            && key_taken(&state, &current.key(), Some(current.id))
        {
            return Err(active_key_violation());
        }
        let record = state
            .snapshots
            .get_mut(&params.id)
            .expect("snapshot present");
        record.status = params.status;
        record.updated_at = params.updated_at;
        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.check(FailPoint::Audit)?;
        self.inner.state.lock().unwrap().audit.push(record);
        Ok(())
    }

    async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogRecord>, RepoError> {
        Ok(self
            .inner
            .state
            .lock()
            .unwrap()
            .audit
            .iter()
            .filter(|entry| {
                entry.entity_type == entity_type && entry.entity_id.as_deref() == Some(entity_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self, _timeout: Duration) -> Result<(), RepoError> {
        self.check(FailPoint::Health)
    }
}

/// Buffered writes; nothing reaches the store until `commit`.
struct MemoryWriteTx {
    store: MemoryStore,
    snapshot: Option<SnapshotRecord>,
    frozen: Vec<(Uuid, u64)>,
}

#[async_trait]
impl SnapshotWriteTx for MemoryWriteTx {
    async fn insert_snapshot(&mut self, record: &SnapshotRecord) -> Result<(), RepoError> {
        self.store.check(FailPoint::Insert)?;
        let state = self.store.inner.state.lock().unwrap();
        if key_taken(&state, &record.key(), None) {
            return Err(active_key_violation());
        }
        self.snapshot = Some(record.clone());
        Ok(())
    }

    async fn copy_source_dataset(
        &mut self,
        dataset: SourceDataset,
        snapshot_id: Uuid,
        key: &SnapshotKey,
    ) -> Result<u64, RepoError> {
        self.store.check(FailPoint::Copy)?;
        let copied = match dataset {
            SourceDataset::LoanExposures => {
                let state = self.store.inner.state.lock().unwrap();
                state
                    .loan_exposures
                    .get(&key.bank_id)
                    .map(|rows| rows.iter().filter(|at| **at <= key.period).count() as u64)
                    .unwrap_or(0)
            }
        };
        self.frozen.push((snapshot_id, copied));
        Ok(copied)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.store.check(FailPoint::Commit)?;
        let mut state = self.store.inner.state.lock().unwrap();
        if let Some(record) = self.snapshot.as_ref() {
            if key_taken(&state, &record.key(), None) {
                return Err(active_key_violation());
            }
            state.snapshots.insert(record.id, record.clone());
        }
        for (snapshot_id, rows) in &self.frozen {
            *state.frozen_rows.entry(*snapshot_id).or_default() += rows;
        }
        self.store.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.store.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.store.check(FailPoint::Rollback)
    }
}

/// Formatted log output from events whose target passes the given filter.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn subscriber(&self, targets: Targets) -> impl Subscriber + Send + Sync {
        let buffer = Arc::clone(&self.buffer);
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || CapturedWriter(Arc::clone(&buffer)))
            .finish()
            .with(targets)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

pub fn ctx() -> OperationContext {
    OperationContext::new("corr-test", "tester")
}
