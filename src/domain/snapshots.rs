//! Snapshot lifecycle rules and key types.
//!
//! The transition table is the single source of truth for how a snapshot's
//! status may progress. It is keyed by [`SnapshotStatus`] variant, so there is
//! no way to look up successors for an out-of-range ordinal.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::types::SnapshotStatus;

const REPORT_TYPE_MAX_LEN: usize = 64;

/// Status every new snapshot starts in.
pub const INITIAL_STATUS: SnapshotStatus = SnapshotStatus::Draft;

/// Statuses a snapshot may move to from `from`.
pub fn successors(from: SnapshotStatus) -> &'static [SnapshotStatus] {
    match from {
        SnapshotStatus::Draft => &[SnapshotStatus::Validated, SnapshotStatus::FailedValidation],
        SnapshotStatus::Validated => &[SnapshotStatus::Calculating],
        SnapshotStatus::Calculating => &[SnapshotStatus::Calculated],
        SnapshotStatus::Calculated => &[SnapshotStatus::Approved],
        SnapshotStatus::Approved => &[SnapshotStatus::Exported],
        SnapshotStatus::FailedValidation | SnapshotStatus::Exported => &[],
    }
}

pub fn is_valid_transition(from: SnapshotStatus, to: SnapshotStatus) -> bool {
    successors(from).contains(&to)
}

pub fn is_terminal(status: SnapshotStatus) -> bool {
    successors(status).is_empty()
}

/// Whether a snapshot in `status` occupies its key for uniqueness purposes.
pub fn blocks_recreation(status: SnapshotStatus) -> bool {
    status != SnapshotStatus::FailedValidation
}

/// Validate a transition, producing a domain error for illegal edges.
pub fn ensure_transition(from: SnapshotStatus, to: SnapshotStatus) -> Result<(), DomainError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "transition from {from} to {to} is not allowed"
        )))
    }
}

/// Regulatory report tag, normalised to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportType(String);

impl ReportType {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("report type must not be empty"));
        }
        if trimmed.len() > REPORT_TYPE_MAX_LEN {
            return Err(DomainError::validation(format!(
                "report type must be at most {REPORT_TYPE_MAX_LEN} characters"
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(DomainError::validation(format!(
                "report type contains unsupported character `{bad}`"
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source datasets copied into snapshot-scoped storage for this report.
    pub fn source_datasets(&self) -> &'static [SourceDataset] {
        // Every report currently draws on the loan book.
        &[SourceDataset::LoanExposures]
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source tables that can be frozen into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDataset {
    LoanExposures,
}

impl SourceDataset {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceDataset::LoanExposures => "loan_exposures",
        }
    }
}

/// Identity a snapshot is unique under while it is not `FAILED_VALIDATION`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub bank_id: Uuid,
    pub period: OffsetDateTime,
    pub report_type: ReportType,
}

impl SnapshotKey {
    pub fn new(bank_id: Uuid, period: OffsetDateTime, report_type: ReportType) -> Self {
        Self {
            bank_id,
            period,
            report_type,
        }
    }
}
