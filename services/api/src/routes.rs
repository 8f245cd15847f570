use crate::infra::{deserialize_optional_date, AppState, InMemoryNotificationPublisher, InMemoryRecordStore};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{Local, NaiveDate};
use health_dss::dss::{dss_router, DecisionSupportService, SchoolHealthReport};
use health_dss::error::AppError;
use health_dss::records::ExamRecordImporter;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

pub(crate) type ApiService = DecisionSupportService<InMemoryRecordStore, InMemoryNotificationPublisher>;

#[derive(Debug, Deserialize)]
pub(crate) struct ImportReportRequest {
    #[serde(default)]
    pub(crate) school_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
    /// Inline CSV export from the health information system.
    pub(crate) exam_csv: String,
}

pub(crate) fn with_dss_routes(service: Arc<ApiService>) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/dss/reports/import",
            axum::routing::post(import_report_endpoint),
        )
        .with_state(service.clone())
        .merge(dss_router(service))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Aggregate an uploaded exam-record export without touching the store.
pub(crate) async fn import_report_endpoint(
    State(service): State<Arc<ApiService>>,
    Json(payload): Json<ImportReportRequest>,
) -> Result<Json<SchoolHealthReport>, AppError> {
    let ImportReportRequest {
        school_id,
        today,
        exam_csv,
    } = payload;

    let records = ExamRecordImporter::from_reader(Cursor::new(exam_csv.into_bytes()))?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let report = service
        .batch_report(&records, school_id.as_deref(), today)
        .await;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Arc<ApiService> {
        Arc::new(DecisionSupportService::new(
            Arc::new(InMemoryRecordStore::default()),
            Arc::new(InMemoryNotificationPublisher::default()),
        ))
    }

    #[tokio::test]
    async fn import_endpoint_builds_a_report_from_inline_csv() {
        let request = ImportReportRequest {
            school_id: Some("sch-1".to_string()),
            today: NaiveDate::from_ymd_opt(2026, 3, 2),
            exam_csv: "Record ID,Subject ID,Vision Screening,Risk Level\n\
                       rec-1,stu-1,Failed,High\n\
                       rec-2,stu-2,Passed,Low\n"
                .to_string(),
        };

        let Json(report) = import_report_endpoint(State(service()), Json(request))
            .await
            .expect("report builds");

        assert_eq!(report.valid_records, 2);
        assert_eq!(report.risk_analysis.distribution.high, 1);
        assert!(report
            .priority_areas
            .iter()
            .any(|area| area.condition == "vision"));
    }

    #[tokio::test]
    async fn import_endpoint_handles_an_empty_export() {
        let request = ImportReportRequest {
            school_id: None,
            today: NaiveDate::from_ymd_opt(2026, 3, 2),
            exam_csv: "Record ID,Subject ID\n".to_string(),
        };

        let Json(report) = import_report_endpoint(State(service()), Json(request))
            .await
            .expect("report builds");

        assert_eq!(report.total_records, 0);
        assert!(report.recommendations.is_empty());
    }
}
