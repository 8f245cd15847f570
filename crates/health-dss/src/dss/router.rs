use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::service::{DecisionSupportService, DssServiceError};
use crate::records::{
    NotificationPublisher, RawExamRecord, RecordFilters, RecordStore, StoreError,
};

/// Router builder exposing the assessment and reporting endpoints.
pub fn dss_router<R, N>(service: Arc<DecisionSupportService<R, N>>) -> Router
where
    R: RecordStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/dss/assessments", post(assess_handler::<R, N>))
        .route(
            "/api/v1/dss/reports/school",
            post(school_report_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct SchoolReportRequest {
    pub school_id: String,
    #[serde(flatten)]
    pub filters: RecordFilters,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

pub(crate) async fn assess_handler<R, N>(
    State(service): State<Arc<DecisionSupportService<R, N>>>,
    axum::Json(record): axum::Json<RawExamRecord>,
) -> Response
where
    R: RecordStore + 'static,
    N: NotificationPublisher + 'static,
{
    let today = Local::now().date_naive();
    match service.assess_record(&record, today) {
        Ok(assessment) => (StatusCode::OK, axum::Json(assessment)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn school_report_handler<R, N>(
    State(service): State<Arc<DecisionSupportService<R, N>>>,
    axum::Json(request): axum::Json<SchoolReportRequest>,
) -> Response
where
    R: RecordStore + 'static,
    N: NotificationPublisher + 'static,
{
    let today = request.today.unwrap_or_else(|| Local::now().date_naive());
    match service
        .school_report(&request.school_id, &request.filters, today)
        .await
    {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: DssServiceError) -> Response {
    let status = match &error {
        DssServiceError::InvalidScope(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DssServiceError::Store(StoreError::UnknownSchool(_))
        | DssServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        DssServiceError::Store(StoreError::Unavailable(_))
        | DssServiceError::Notify(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
