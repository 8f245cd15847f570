use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{RawExamRecord, RecordFilters, RecordId};
use crate::dss::assessment::Assessment;

/// Storage abstraction over the records backend. Query filtering and
/// access-control scoping happen behind this trait; the engine only sees
/// already-materialized record batches.
pub trait RecordStore: Send + Sync {
    fn fetch_exam_records_for_school(
        &self,
        school_id: &str,
        filters: &RecordFilters,
    ) -> Result<Vec<RawExamRecord>, StoreError>;

    fn fetch_personnel_health_records(
        &self,
        scope_ids: &[String],
    ) -> Result<Vec<RawExamRecord>, StoreError>;

    /// Persist the assessment produced for a record, replacing any prior one.
    fn save_assessment(&self, id: &RecordId, assessment: &Assessment) -> Result<(), StoreError>;
}

/// Error enumeration for record-store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("school not found: {0}")]
    UnknownSchool(String),
    #[error("record not found")]
    NotFound,
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Trait describing outbound notification hooks (SMS/e-mail adapters live
/// outside this crate).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: HealthNotification) -> Result<(), NotifyError>;
}

/// Payload handed to the notification collaborator when an assessment
/// demands immediate attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthNotification {
    pub template: String,
    pub record_id: RecordId,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
