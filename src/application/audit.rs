use std::sync::Arc;

use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{error, info};
use uuid::Uuid;

use crate::application::context::OperationContext;
use crate::application::repos::{AuditRepo, RepoError};
use crate::domain::entities::{AuditLogRecord, SnapshotRecord};

pub const ACTION_CREATE_SNAPSHOT: &str = "CREATE_SNAPSHOT";
pub const ACTION_TRANSITION_SNAPSHOT: &str = "TRANSITION_SNAPSHOT";
pub const ENTITY_SNAPSHOT: &str = "snapshot";

#[derive(Debug, Serialize)]
struct SnapshotAuditPayload<'a> {
    snapshot_id: Uuid,
    bank_id: Uuid,
    period: String,
    report_type: &'a str,
    status: &'a str,
}

/// Append-only audit sink: a structured `regsnap::audit` event plus an `audit_logs` row.
#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepo>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    pub async fn record<S>(
        &self,
        ctx: &OperationContext,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        payload: Option<&S>,
    ) -> Result<(), RepoError>
    where
        S: Serialize,
    {
        let payload_text = match payload {
            Some(value) => Some(serde_json::to_string(value).map_err(RepoError::from_persistence)?),
            None => None,
        };

        let record = AuditLogRecord {
            id: Uuid::new_v4(),
            actor: ctx.actor.clone(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(|value| value.to_string()),
            correlation_id: Some(ctx.correlation_id.clone()),
            payload_text,
            created_at: OffsetDateTime::now_utc(),
        };

        self.repo.append_log(record).await
    }

    /// Record a snapshot event without letting sink failures reach the caller.
    ///
    /// The snapshot id is part of every entry, so a repeated emission is detectable downstream.
    pub async fn record_snapshot_event(
        &self,
        ctx: &OperationContext,
        action: &'static str,
        snapshot: &SnapshotRecord,
    ) {
        let period = snapshot
            .period
            .format(&Rfc3339)
            .unwrap_or_else(|_| snapshot.period.to_string());

        info!(
            target: "regsnap::audit",
            action,
            snapshot_id = %snapshot.id,
            bank_id = %snapshot.bank_id,
            period = %period,
            report_type = %snapshot.report_type,
            status = %snapshot.status,
            correlation_id = %ctx.correlation_id,
            actor = %ctx.actor,
            "{action}"
        );

        let payload = SnapshotAuditPayload {
            snapshot_id: snapshot.id,
            bank_id: snapshot.bank_id,
            period,
            report_type: snapshot.report_type.as_str(),
            status: snapshot.status.as_str(),
        };
        let entity_id = snapshot.id.to_string();

        if let Err(err) = self
            .record(ctx, action, ENTITY_SNAPSHOT, Some(&entity_id), Some(&payload))
            .await
        {
            error!(
                target: "regsnap::audit",
                action,
                snapshot_id = %snapshot.id,
                correlation_id = %ctx.correlation_id,
                error = %err,
                "failed to append audit log"
            );
        }
    }

    pub async fn list_for_snapshot(
        &self,
        snapshot_id: Uuid,
    ) -> Result<Vec<AuditLogRecord>, RepoError> {
        self.repo
            .list_for_entity(ENTITY_SNAPSHOT, &snapshot_id.to_string())
            .await
    }
}
