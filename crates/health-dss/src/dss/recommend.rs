use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::aggregate::{AreaSeverity, PopulationAggregation, PriorityArea};
use super::classify::{assign_role, CareRole, Priority};
use super::rules::{category, condition};

/// Structured, role-assignable program recommendation for a population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramRecommendation {
    pub category: String,
    pub description: String,
    pub priority: Priority,
    pub target_date: NaiveDate,
    pub assigned_to: CareRole,
    pub actions: Vec<String>,
}

const HIGH_RISK_TRIGGER_PCT: u8 = 5;
const PROGRAM_TRIGGER_PCT: u8 = 15;
const IMMUNIZATION_GAP_PCT: u8 = 20;
const DEWORMING_GAP_PCT: u8 = 15;

/// Turn aggregated priority areas and preventive coverage gaps into
/// program recommendations. Conditions without a program mapping are
/// skipped silently.
pub fn generate(
    aggregation: &PopulationAggregation,
    areas: &[PriorityArea],
    today: NaiveDate,
) -> Vec<ProgramRecommendation> {
    let mut recommendations = Vec::new();

    let high_risk_pct = aggregation.percentage(aggregation.counters.risk.high);
    if high_risk_pct > HIGH_RISK_TRIGGER_PCT {
        recommendations.push(build(
            "high_risk_management",
            format!(
                "{high_risk_pct}% of records are classified high risk; \
                 refer each case to the doctor and open individual care plans"
            ),
            Priority::Urgent,
            today,
        ));
    }

    for area in areas {
        if area.percentage < PROGRAM_TRIGGER_PCT {
            continue;
        }
        let Some((program, description)) = program_for(&area.condition) else {
            continue;
        };
        let priority = match area.severity {
            AreaSeverity::High => Priority::High,
            _ => Priority::Medium,
        };
        recommendations.push(build(
            program,
            format!("{description} ({}% of records affected)", area.percentage),
            priority,
            today,
        ));
    }

    let immunization_gap = aggregation.percentage(
        aggregation
            .counters
            .count(category::PREVENTIVE, condition::IMMUNIZATION_INCOMPLETE),
    );
    if immunization_gap > IMMUNIZATION_GAP_PCT {
        recommendations.push(build(
            "vaccination_campaign",
            format!(
                "{immunization_gap}% of records have incomplete immunization; \
                 organize a catch-up vaccination campaign with parent consent"
            ),
            Priority::High,
            today,
        ));
    }

    let deworming_gap = aggregation.percentage(
        aggregation
            .counters
            .count(category::PREVENTIVE, condition::NOT_DEWORMED),
    );
    if deworming_gap > DEWORMING_GAP_PCT {
        recommendations.push(build(
            "deworming_campaign",
            format!(
                "{deworming_gap}% of records missed deworming; \
                 schedule a mass deworming round with parent consent"
            ),
            Priority::Medium,
            today,
        ));
    }

    recommendations
}

fn build(
    category: &str,
    description: String,
    priority: Priority,
    today: NaiveDate,
) -> ProgramRecommendation {
    let target_date = match priority {
        Priority::Urgent => today + Duration::days(7),
        Priority::High => today + Duration::days(14),
        _ => today + Duration::days(30),
    };
    let assigned_to = assign_role(&description);
    ProgramRecommendation {
        category: category.to_string(),
        description,
        priority,
        target_date,
        assigned_to,
        actions: actions_for(category),
    }
}

/// Condition → program mapping. Preventive-care conditions are handled by
/// the dedicated gap thresholds, not this table.
fn program_for(condition_name: &str) -> Option<(&'static str, &'static str)> {
    match condition_name {
        condition::SEVERELY_UNDERWEIGHT | condition::UNDERWEIGHT => Some((
            "school_feeding_program",
            "Launch a supervised school feeding program for underweight learners",
        )),
        condition::OVERWEIGHT | condition::OBESE => Some((
            "nutrition_counseling",
            "Run nutrition counseling sessions on balanced diet and activity",
        )),
        condition::STUNTED | condition::SEVERELY_STUNTED => Some((
            "nutrition_program",
            "Expand the nutrition program with growth monitoring and feeding support",
        )),
        condition::VISION => Some((
            "vision_care_program",
            "Arrange refraction clinics and refer learners for corrective lenses",
        )),
        condition::HEARING => Some((
            "hearing_care_program",
            "Refer learners for audiometric evaluation and follow-up care",
        )),
        condition::SKIN_SCALP => Some((
            "hygiene_program",
            "Run a hygiene program covering handwashing and lice treatment for affected families",
        )),
        condition::MOUTH_THROAT_NECK => Some((
            "oral_health_program",
            "Schedule dental mission days and daily toothbrushing drills",
        )),
        _ => None,
    }
}

/// Fixed action-list template per recommendation category.
fn actions_for(category: &str) -> Vec<String> {
    let actions: &[&str] = match category {
        "high_risk_management" => &[
            "List all high-risk records and notify assigned staff",
            "Schedule physician review for each case",
            "Track follow-through weekly until resolved",
        ],
        "school_feeding_program" => &[
            "Identify eligible learners from the nutrition counters",
            "Secure feeding program budget and supplier",
            "Weigh and measure participants monthly",
        ],
        "nutrition_counseling" => &[
            "Book counseling slots with the nutritionist",
            "Send balanced-diet guidance to families",
        ],
        "nutrition_program" => &[
            "Enroll affected learners in growth monitoring",
            "Coordinate supplemental feeding with the nutritionist",
        ],
        "vision_care_program" => &[
            "Re-test flagged learners to confirm results",
            "Book ophthalmologic referrals",
            "Track corrective lens provision",
        ],
        "hearing_care_program" => &[
            "Re-test flagged learners to confirm results",
            "Book audiometric referrals",
        ],
        "hygiene_program" => &[
            "Hold classroom hygiene sessions",
            "Distribute treatment kits to affected families",
        ],
        "oral_health_program" => &[
            "Schedule a dental mission day",
            "Start supervised daily toothbrushing",
        ],
        "vaccination_campaign" => &[
            "Reconcile immunization cards against the registry",
            "Collect parent consent forms",
            "Run the catch-up vaccination day with the health office",
        ],
        "deworming_campaign" => &[
            "Collect parent consent forms",
            "Administer deworming doses and log completion",
        ],
        _ => &["Review affected records and plan follow-up"],
    };
    actions.iter().map(|action| action.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dss::aggregate::{Aggregator, DssPipeline};
    use crate::dss::facts::source;
    use crate::records::RawExamRecord;
    use serde_json::json;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    async fn aggregate(records: &[RawExamRecord]) -> PopulationAggregation {
        Aggregator::new(Arc::new(DssPipeline::standard()), &EngineConfig::default())
            .aggregate(records)
            .await
    }

    fn compliant_record(id: usize) -> RawExamRecord {
        RawExamRecord::new(format!("rec-{id}"), format!("student-{id}"))
            .with_finding(source::DEWORMED, json!(true))
            .with_finding(source::IMMUNIZATION_COMPLETE, json!(true))
            .with_finding(source::IRON_SUPPLEMENTATION, json!(true))
            .with_finding(source::DECLARED_RISK, json!("Low"))
    }

    #[tokio::test]
    async fn high_risk_share_triggers_urgent_case_management() {
        let mut records: Vec<_> = (0..9).map(compliant_record).collect();
        records.push(
            compliant_record(9).with_finding(source::DECLARED_RISK, json!("High")),
        );

        let aggregation = aggregate(&records).await;
        let areas = aggregation.priority_areas();
        let recommendations = generate(&aggregation, &areas, today());

        let urgent = recommendations
            .iter()
            .find(|rec| rec.category == "high_risk_management")
            .expect("high risk recommendation");
        assert_eq!(urgent.priority, Priority::Urgent);
        assert_eq!(urgent.target_date, today() + Duration::days(7));
        assert!(!urgent.actions.is_empty());
    }

    #[tokio::test]
    async fn prevalent_underweight_maps_to_feeding_program() {
        let mut records: Vec<_> = (0..7).map(compliant_record).collect();
        for id in 7..10 {
            records.push(
                compliant_record(id)
                    .with_finding(source::BMI_FOR_AGE, json!("Wasted/Underweight")),
            );
        }

        let aggregation = aggregate(&records).await;
        let areas = aggregation.priority_areas();
        let recommendations = generate(&aggregation, &areas, today());

        let feeding = recommendations
            .iter()
            .find(|rec| rec.category == "school_feeding_program")
            .expect("feeding program recommendation");
        assert_eq!(feeding.priority, Priority::High);
        assert_eq!(feeding.assigned_to, CareRole::Nutritionist);
    }

    #[tokio::test]
    async fn unmapped_conditions_are_skipped_silently() {
        let mut records: Vec<_> = (0..5).map(compliant_record).collect();
        for record in records.iter_mut() {
            *record = record
                .clone()
                .with_finding(source::ABDOMEN, json!("Tenderness"));
        }

        let aggregation = aggregate(&records).await;
        let areas = aggregation.priority_areas();
        assert!(areas.iter().any(|area| area.condition == "abdomen"));

        let recommendations = generate(&aggregation, &areas, today());
        assert!(recommendations
            .iter()
            .all(|rec| !rec.description.contains("abdomen")));
    }

    #[tokio::test]
    async fn coverage_gaps_trigger_campaigns() {
        // No preventive findings at all: both gaps read 100%.
        let records: Vec<_> = (0..4)
            .map(|id| RawExamRecord::new(format!("rec-{id}"), format!("student-{id}")))
            .collect();

        let aggregation = aggregate(&records).await;
        let recommendations = generate(&aggregation, &aggregation.priority_areas(), today());

        assert!(recommendations
            .iter()
            .any(|rec| rec.category == "vaccination_campaign"));
        assert!(recommendations
            .iter()
            .any(|rec| rec.category == "deworming_campaign"));
    }

    #[tokio::test]
    async fn healthy_cohort_needs_no_recommendations() {
        let records: Vec<_> = (0..6).map(compliant_record).collect();
        let aggregation = aggregate(&records).await;
        let recommendations = generate(&aggregation, &aggregation.priority_areas(), today());
        assert!(recommendations.is_empty());
    }
}
