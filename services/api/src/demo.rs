use crate::infra::{parse_date, InMemoryNotificationPublisher, InMemoryRecordStore};
use chrono::{Local, NaiveDate};
use clap::Args;
use health_dss::dss::facts::source;
use health_dss::dss::{DecisionSupportService, SchoolHealthReport};
use health_dss::error::AppError;
use health_dss::records::{ExamRecordImporter, RawExamRecord};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct SchoolReportArgs {
    /// School identifier stamped on the report
    #[arg(long, default_value = "demo-school")]
    pub(crate) school_id: String,
    /// Exam-record CSV export to aggregate; a synthetic cohort is used
    /// when omitted
    #[arg(long)]
    pub(crate) exam_csv: Option<PathBuf>,
    /// Evaluation date for the report (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Include the full findings table in the output
    #[arg(long)]
    pub(crate) list_findings: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Optional exam-record CSV export for the population portion
    #[arg(long)]
    pub(crate) exam_csv: Option<PathBuf>,
    /// Size of the synthetic cohort when no export is supplied
    #[arg(long, default_value_t = 40)]
    pub(crate) cohort: usize,
}

fn build_service() -> (
    DecisionSupportService<InMemoryRecordStore, InMemoryNotificationPublisher>,
    Arc<InMemoryNotificationPublisher>,
) {
    let store = Arc::new(InMemoryRecordStore::default());
    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let service = DecisionSupportService::new(store, notifier.clone());
    (service, notifier)
}

pub(crate) async fn run_school_report(args: SchoolReportArgs) -> Result<(), AppError> {
    let SchoolReportArgs {
        school_id,
        exam_csv,
        today,
        list_findings,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let (records, imported) = load_records(exam_csv, 40)?;

    let (service, _notifier) = build_service();
    let report = service.batch_report(&records, Some(&school_id), today).await;

    if imported {
        println!("Data source: exam-record CSV export");
    } else {
        println!("Data source: synthetic cohort (no export provided)");
    }
    render_report(&report, list_findings);

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        exam_csv,
        cohort,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let (service, notifier) = build_service();

    println!("School health decision-support demo");

    // Single-record path: a cardiopulmonary finding escalates immediately.
    let critical = RawExamRecord::new("demo-rec-1", "demo-student-1")
        .with_finding(source::LUNGS_HEART, json!("Irregular heart rate"))
        .with_finding(source::DECLARED_RISK, json!("Medium"))
        .with_finding(source::DEWORMED, json!(true))
        .with_finding(source::IMMUNIZATION_COMPLETE, json!(true))
        .with_finding(source::IRON_SUPPLEMENTATION, json!(true));
    let assessment = service.assess_record(&critical, today)?;

    println!("\nSingle-record assessment (demo-rec-1)");
    println!("- overall status: {}", assessment.overall_status.label());
    for alert in &assessment.alerts {
        println!(
            "- [{}] {} -> {}",
            alert.severity.label(),
            alert.description,
            alert.recommended_action
        );
    }
    println!(
        "- notifications raised: {}",
        notifier.events().len()
    );

    // Population path over an export or a synthetic cohort.
    let (records, imported) = load_records(exam_csv, cohort)?;
    let report = service.batch_report(&records, Some("demo-school"), today).await;

    if imported {
        println!("\nPopulation data source: exam-record CSV export");
    } else {
        println!("\nPopulation data source: synthetic cohort of {cohort}");
    }
    render_report(&report, false);

    Ok(())
}

fn load_records(
    exam_csv: Option<PathBuf>,
    cohort: usize,
) -> Result<(Vec<RawExamRecord>, bool), AppError> {
    match exam_csv {
        Some(path) => Ok((ExamRecordImporter::from_path(path)?, true)),
        None => Ok((synthetic_cohort(cohort), false)),
    }
}

/// Deterministic synthetic cohort covering every rule domain.
fn synthetic_cohort(size: usize) -> Vec<RawExamRecord> {
    (0..size)
        .map(|index| {
            let mut record = RawExamRecord::new(
                format!("demo-rec-{index}"),
                format!("demo-student-{index}"),
            );
            record.grade_level = Some(format!("Grade {}", (index % 3) + 1));

            let bmi = match index % 10 {
                0 | 1 => "Wasted/Underweight",
                2 => "Severely Wasted/Underweight",
                3 => "Overweight",
                _ => "Normal",
            };
            record = record
                .with_finding(source::BMI_FOR_AGE, json!(bmi))
                .with_finding(
                    source::VISION,
                    json!(if index % 5 == 0 { "Failed" } else { "Passed" }),
                )
                .with_finding(
                    source::HEARING,
                    json!(if index % 8 == 0 { "Failed" } else { "Passed" }),
                )
                .with_finding(source::DEWORMED, json!(index % 4 != 0))
                .with_finding(source::IMMUNIZATION_COMPLETE, json!(index % 3 != 0))
                .with_finding(source::IRON_SUPPLEMENTATION, json!(true))
                .with_finding(
                    source::DECLARED_RISK,
                    json!(match index % 12 {
                        0 => "High",
                        1 | 2 => "Medium",
                        _ => "Low",
                    }),
                );
            if index % 7 == 0 {
                record = record.with_finding(source::SKIN_SCALP, json!("Lice infestation"));
            }
            record
        })
        .collect()
}

fn render_report(report: &SchoolHealthReport, list_findings: bool) {
    if let Some(school_id) = &report.school_id {
        println!("School: {school_id} (evaluated {})", report.generated_on);
    } else {
        println!("Evaluated {}", report.generated_on);
    }
    println!(
        "Records: {} total, {} valid, {} excluded",
        report.total_records, report.valid_records, report.excluded_records
    );

    let risk = &report.risk_analysis;
    println!("\nRisk distribution");
    println!(
        "- low {} | medium {} | high {} | urgent {} | unknown {}",
        risk.distribution.low,
        risk.distribution.medium,
        risk.distribution.high,
        risk.distribution.urgent,
        risk.distribution.unknown
    );

    if report.priority_areas.is_empty() {
        println!("\nPriority areas: none above the reporting threshold");
    } else {
        println!("\nPriority areas");
        for area in &report.priority_areas {
            println!(
                "- [{}] {}/{}: {} record(s), {}%",
                area.severity.label(),
                area.category,
                area.condition,
                area.count,
                area.percentage
            );
        }
    }

    if report.recommendations.is_empty() {
        println!("\nProgram recommendations: none");
    } else {
        println!("\nProgram recommendations");
        for recommendation in &report.recommendations {
            println!(
                "- [{}] {} (target {}, owner {})",
                recommendation.priority.label(),
                recommendation.description,
                recommendation.target_date,
                recommendation.assigned_to.label()
            );
            for action in &recommendation.actions {
                println!("    * {action}");
            }
        }
    }

    println!("\nGrade breakdown");
    for row in &report.grade_breakdown {
        println!("- {}: {} record(s)", row.grade, row.records);
    }

    if list_findings {
        println!("\nAll findings");
        for finding in &report.common_findings {
            println!(
                "- {}/{}: {} record(s), {}%",
                finding.category, finding.condition, finding.count, finding.percentage
            );
        }
    }
}
