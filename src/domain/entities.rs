//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::snapshots::{ReportType, SnapshotKey};
use crate::domain::types::SnapshotStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub bank_id: Uuid,
    pub period: OffsetDateTime,
    pub report_type: ReportType,
    pub status: SnapshotStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SnapshotRecord {
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.bank_id, self.period, self.report_type.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub correlation_id: Option<String>,
    pub payload_text: Option<String>,
    pub created_at: OffsetDateTime,
}
