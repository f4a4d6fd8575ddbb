use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::snapshots::ListSnapshotsRequest;
use crate::domain::entities::SnapshotRecord;
use crate::domain::types::SnapshotStatus;

#[derive(Debug, Deserialize, Serialize)]
pub struct SnapshotCreateRequest {
    pub bank_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub period: OffsetDateTime,
    pub report_type: String,
}

/// Query string for `GET /api/v1/snapshots`.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotListQuery {
    pub bank_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub period: Option<OffsetDateTime>,
    pub report_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

impl From<SnapshotListQuery> for ListSnapshotsRequest {
    fn from(query: SnapshotListQuery) -> Self {
        Self {
            bank_id: query.bank_id,
            period: query.period,
            report_type: query.report_type,
            status: query.status,
            limit: query.limit,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SnapshotCreatedResponse {
    pub id: Uuid,
}

/// Target status, given as a name (`"VALIDATED"`) or an ordinal (`3`).
#[derive(Debug, Deserialize, Serialize)]
pub struct SnapshotTransitionRequest {
    pub status: StatusInput,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusInput {
    Ordinal(i64),
    Name(String),
}

impl StatusInput {
    pub fn as_raw(&self) -> String {
        match self {
            StatusInput::Ordinal(value) => value.to_string(),
            StatusInput::Name(value) => value.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SnapshotResponse {
    pub id: Uuid,
    pub bank_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub period: OffsetDateTime,
    pub report_type: String,
    pub status: SnapshotStatus,
    pub status_ordinal: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<SnapshotRecord> for SnapshotResponse {
    fn from(record: SnapshotRecord) -> Self {
        Self {
            id: record.id,
            bank_id: record.bank_id,
            period: record.period,
            report_type: record.report_type.as_str().to_string(),
            status: record.status,
            status_ordinal: record.status.ordinal(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<SnapshotResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
