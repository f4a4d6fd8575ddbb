//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a snapshot (mirrors Postgres enum `snapshot_status`).
///
/// Ordinals start at 1; 0 is reserved as the invalid value and has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "snapshot_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    Draft = 1,
    FailedValidation = 2,
    Validated = 3,
    Calculating = 4,
    Calculated = 5,
    Approved = 6,
    Exported = 7,
}

impl SnapshotStatus {
    pub const ALL: [SnapshotStatus; 7] = [
        SnapshotStatus::Draft,
        SnapshotStatus::FailedValidation,
        SnapshotStatus::Validated,
        SnapshotStatus::Calculating,
        SnapshotStatus::Calculated,
        SnapshotStatus::Approved,
        SnapshotStatus::Exported,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotStatus::Draft => "DRAFT",
            SnapshotStatus::FailedValidation => "FAILED_VALIDATION",
            SnapshotStatus::Validated => "VALIDATED",
            SnapshotStatus::Calculating => "CALCULATING",
            SnapshotStatus::Calculated => "CALCULATED",
            SnapshotStatus::Approved => "APPROVED",
            SnapshotStatus::Exported => "EXPORTED",
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            1 => Some(SnapshotStatus::Draft),
            2 => Some(SnapshotStatus::FailedValidation),
            3 => Some(SnapshotStatus::Validated),
            4 => Some(SnapshotStatus::Calculating),
            5 => Some(SnapshotStatus::Calculated),
            6 => Some(SnapshotStatus::Approved),
            7 => Some(SnapshotStatus::Exported),
            _ => None,
        }
    }
}

/// Label for a raw status ordinal; empty when the ordinal names no status.
pub fn status_label(ordinal: i64) -> &'static str {
    SnapshotStatus::from_ordinal(ordinal)
        .map(SnapshotStatus::as_str)
        .unwrap_or("")
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SnapshotStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        SnapshotStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or(())
    }
}
