use chrono::NaiveDate;
use serde::Serialize;

use super::aggregate::{percentage_of, PopulationAggregation, PriorityArea, RiskDistribution};
use super::recommend::{self, ProgramRecommendation};

/// One condition tally with its share of the cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingCountView {
    pub category: String,
    pub condition: String,
    pub count: u64,
    pub percentage: u8,
}

/// Risk distribution with the shares the recommendation thresholds read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAnalysisView {
    pub distribution: RiskDistribution,
    pub high_percentage: u8,
    pub urgent_percentage: u8,
    pub unknown_percentage: u8,
}

/// Per-grade counters scoped to that grade's record count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeBreakdownRow {
    pub grade: String,
    pub records: u64,
    pub findings: Vec<FindingCountView>,
}

/// Population report returned by the reporting endpoints. Always renders:
/// an empty cohort produces zeroed sections, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct SchoolHealthReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    pub generated_on: NaiveDate,
    pub total_records: usize,
    pub valid_records: usize,
    pub excluded_records: usize,
    pub common_findings: Vec<FindingCountView>,
    pub risk_analysis: RiskAnalysisView,
    pub grade_breakdown: Vec<GradeBreakdownRow>,
    pub priority_areas: Vec<PriorityArea>,
    pub recommendations: Vec<ProgramRecommendation>,
}

pub fn build_report(
    school_id: Option<&str>,
    aggregation: &PopulationAggregation,
    today: NaiveDate,
) -> SchoolHealthReport {
    let priority_areas = aggregation.priority_areas();
    let recommendations = recommend::generate(aggregation, &priority_areas, today);

    let mut common_findings = Vec::new();
    for (category, conditions) in &aggregation.counters.conditions {
        for (condition, count) in conditions {
            common_findings.push(FindingCountView {
                category: category.clone(),
                condition: condition.clone(),
                count: *count,
                percentage: aggregation.percentage(*count),
            });
        }
    }
    common_findings.sort_by(|a, b| b.count.cmp(&a.count));

    let risk = &aggregation.counters.risk;
    let risk_analysis = RiskAnalysisView {
        distribution: risk.clone(),
        high_percentage: aggregation.percentage(risk.high),
        urgent_percentage: aggregation.percentage(risk.urgent),
        unknown_percentage: aggregation.percentage(risk.unknown),
    };

    let grade_breakdown = aggregation
        .grade_breakdown
        .iter()
        .map(|(grade, counters)| {
            let records = counters.risk.total();
            let findings = counters
                .conditions
                .iter()
                .flat_map(|(category, conditions)| {
                    conditions.iter().map(move |(condition, count)| {
                        FindingCountView {
                            category: category.clone(),
                            condition: condition.clone(),
                            count: *count,
                            percentage: percentage_of(*count, records),
                        }
                    })
                })
                .collect();
            GradeBreakdownRow {
                grade: grade.clone(),
                records,
                findings,
            }
        })
        .collect();

    SchoolHealthReport {
        school_id: school_id.map(str::to_string),
        generated_on: today,
        total_records: aggregation.total_records,
        valid_records: aggregation.valid_records,
        excluded_records: aggregation.excluded_records,
        common_findings,
        risk_analysis,
        grade_breakdown,
        priority_areas,
        recommendations,
    }
}
