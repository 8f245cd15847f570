use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregate::{Aggregator, DssPipeline};
use super::assessment::{build_assessment, ApprovalState, Assessment, HealthStatus, RiskLevel};
use super::report::{build_report, SchoolHealthReport};
use super::rules::condition;
use crate::config::EngineConfig;
use crate::records::{
    HealthNotification, NotificationPublisher, NotifyError, RawExamRecord, RecordFilters,
    RecordStore, StoreError,
};

/// Listing buckets exposed to reporting controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentCategory {
    NotDewormed,
    ImmunizationIncomplete,
    VisionIssues,
    HearingIssues,
    PendingApproval,
    HighRisk,
    MediumRisk,
    LowRisk,
    Unclassified,
}

/// Service composing the record store, notification hook, and the DSS
/// pipeline.
pub struct DecisionSupportService<R, N> {
    store: Arc<R>,
    notifier: Arc<N>,
    pipeline: Arc<DssPipeline>,
    engine_config: EngineConfig,
}

impl<R, N> DecisionSupportService<R, N>
where
    R: RecordStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<R>, notifier: Arc<N>) -> Self {
        Self::with_pipeline(store, notifier, DssPipeline::standard(), EngineConfig::default())
    }

    pub fn with_pipeline(
        store: Arc<R>,
        notifier: Arc<N>,
        pipeline: DssPipeline,
        engine_config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            pipeline: Arc::new(pipeline),
            engine_config,
        }
    }

    /// Evaluate one record, persist the fresh assessment, and raise a
    /// notification when it demands immediate attention.
    pub fn assess_record(
        &self,
        record: &RawExamRecord,
        today: NaiveDate,
    ) -> Result<Assessment, DssServiceError> {
        let facts = self.pipeline.normalize(record);
        let events = self.pipeline.run(&facts);
        let assessment = build_assessment(&events, today);

        self.store.save_assessment(&record.record_id, &assessment)?;

        if assessment.overall_status == HealthStatus::Critical {
            let mut details = BTreeMap::new();
            details.insert(
                "overall_status".to_string(),
                assessment.overall_status.label().to_string(),
            );
            if let Some(alert) = assessment
                .alerts
                .iter()
                .find(|alert| alert.requires_immediate_attention)
            {
                details.insert("finding".to_string(), alert.description.clone());
            }
            self.notifier.publish(HealthNotification {
                template: "critical_assessment".to_string(),
                record_id: record.record_id.clone(),
                details,
            })?;
        }

        Ok(assessment)
    }

    /// Population report for one school. Scope is validated before any
    /// evaluation starts.
    pub async fn school_report(
        &self,
        school_id: &str,
        filters: &RecordFilters,
        today: NaiveDate,
    ) -> Result<SchoolHealthReport, DssServiceError> {
        let school_id = school_id.trim();
        if school_id.is_empty() {
            return Err(DssServiceError::InvalidScope(
                "school id must not be empty".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (filters.from, filters.to) {
            if from > to {
                return Err(DssServiceError::InvalidScope(format!(
                    "date range is inverted ({from} > {to})"
                )));
            }
        }

        let records = self
            .store
            .fetch_exam_records_for_school(school_id, filters)?;
        info!(school_id, records = records.len(), "aggregating school report");

        let aggregation = self.aggregator().aggregate(&records).await;
        Ok(build_report(Some(school_id), &aggregation, today))
    }

    /// Population report over personnel health records for a set of
    /// scope ids (schools or district offices).
    pub async fn personnel_report(
        &self,
        scope_ids: &[String],
        today: NaiveDate,
    ) -> Result<SchoolHealthReport, DssServiceError> {
        if scope_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(DssServiceError::InvalidScope(
                "at least one scope id is required".to_string(),
            ));
        }

        let records = self.store.fetch_personnel_health_records(scope_ids)?;
        let aggregation = self.aggregator().aggregate(&records).await;
        Ok(build_report(None, &aggregation, today))
    }

    /// Evaluate an ad-hoc batch that bypasses the store (e.g. a CSV
    /// import), producing the same report shape.
    pub async fn batch_report(
        &self,
        records: &[RawExamRecord],
        school_id: Option<&str>,
        today: NaiveDate,
    ) -> SchoolHealthReport {
        let aggregation = self.aggregator().aggregate(records).await;
        build_report(school_id, &aggregation, today)
    }

    fn aggregator(&self) -> Aggregator<DssPipeline> {
        Aggregator::new(Arc::clone(&self.pipeline), &self.engine_config)
    }
}

/// Select the assessments belonging to a listing bucket.
pub fn filter_by_category(
    assessments: &[Assessment],
    category: AssessmentCategory,
) -> Vec<Assessment> {
    assessments
        .iter()
        .filter(|assessment| matches_category(assessment, category))
        .cloned()
        .collect()
}

fn matches_category(assessment: &Assessment, category: AssessmentCategory) -> bool {
    let has_code = |code: &str| {
        assessment
            .flagged_conditions
            .iter()
            .any(|flagged| flagged.code == code)
    };

    match category {
        AssessmentCategory::NotDewormed => has_code(condition::NOT_DEWORMED),
        AssessmentCategory::ImmunizationIncomplete => has_code(condition::IMMUNIZATION_INCOMPLETE),
        AssessmentCategory::VisionIssues => has_code(condition::VISION),
        AssessmentCategory::HearingIssues => has_code(condition::HEARING),
        AssessmentCategory::PendingApproval => assessment.approval == ApprovalState::Pending,
        AssessmentCategory::HighRisk => assessment.risk_level >= Some(RiskLevel::High),
        AssessmentCategory::MediumRisk => assessment.risk_level == Some(RiskLevel::Medium),
        AssessmentCategory::LowRisk => assessment.risk_level == Some(RiskLevel::Low),
        AssessmentCategory::Unclassified => assessment.risk_level.is_none(),
    }
}

/// Error raised by the decision-support service.
#[derive(Debug, thiserror::Error)]
pub enum DssServiceError {
    #[error("invalid report scope: {0}")]
    InvalidScope(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}
