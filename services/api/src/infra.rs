use chrono::NaiveDate;
use health_dss::dss::assessment::Assessment;
use health_dss::records::{
    HealthNotification, NotificationPublisher, NotifyError, RawExamRecord, RecordFilters,
    RecordId, RecordStore, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory record store backing the service until the records backend
/// is attached. Schools must be seeded before they can be reported on.
#[derive(Default)]
pub(crate) struct InMemoryRecordStore {
    schools: Mutex<HashMap<String, Vec<RawExamRecord>>>,
    assessments: Mutex<HashMap<RecordId, Assessment>>,
}

impl RecordStore for InMemoryRecordStore {
    fn fetch_exam_records_for_school(
        &self,
        school_id: &str,
        filters: &RecordFilters,
    ) -> Result<Vec<RawExamRecord>, StoreError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        let records = guard
            .get(school_id)
            .ok_or_else(|| StoreError::UnknownSchool(school_id.to_string()))?;
        Ok(records
            .iter()
            .filter(|record| filters.matches(record))
            .cloned()
            .collect())
    }

    fn fetch_personnel_health_records(
        &self,
        scope_ids: &[String],
    ) -> Result<Vec<RawExamRecord>, StoreError> {
        let guard = self.schools.lock().expect("school mutex poisoned");
        Ok(scope_ids
            .iter()
            .filter_map(|scope| guard.get(scope))
            .flatten()
            .cloned()
            .collect())
    }

    fn save_assessment(&self, id: &RecordId, assessment: &Assessment) -> Result<(), StoreError> {
        self.assessments
            .lock()
            .expect("assessment mutex poisoned")
            .insert(id.clone(), assessment.clone());
        Ok(())
    }
}

/// Collects notifications in memory; a transport adapter replaces this in
/// deployment.
#[derive(Default)]
pub(crate) struct InMemoryNotificationPublisher {
    events: Mutex<Vec<HealthNotification>>,
}

impl InMemoryNotificationPublisher {
    pub(crate) fn events(&self) -> Vec<HealthNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, notification: HealthNotification) -> Result<(), NotifyError> {
        let mut guard = self.events.lock().expect("notifier mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
