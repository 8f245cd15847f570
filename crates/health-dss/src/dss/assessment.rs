use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::classify::{classify_flag, CareRole, Priority, Severity};
use super::rules::{category, condition, RuleDomain, RuleEvent};

/// Record-level risk classification, ordered by urgency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Urgent,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Urgent => "Urgent",
        }
    }
}

/// Overall health status derived from the alert multiset and risk level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    pub const fn label(self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Fair => "Fair",
            HealthStatus::Poor => "Poor",
            HealthStatus::Critical => "Critical",
        }
    }
}

/// Review state of a freshly built assessment. Transitions belong to the
/// records backend; new assessments always start pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
}

/// A classified, single-record finding with an action recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: String,
    pub severity: Severity,
    pub description: String,
    pub recommended_action: String,
    pub requires_immediate_attention: bool,
}

/// Role-assignable remediation step attached to an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub description: String,
    pub priority: Priority,
    pub target_date: NaiveDate,
    pub assigned_to: CareRole,
}

/// Longitudinal marker persisted with the record, distinct from one-off
/// alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedCondition {
    pub condition: String,
    pub code: String,
    pub description: String,
    pub requires_monitoring: bool,
}

/// The unit persisted back onto a record. Rebuilt from scratch on every
/// rule-engine run; never patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub overall_status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub flagged_conditions: Vec<FlaggedCondition>,
    pub approval: ApprovalState,
}

/// Build the record-level assessment from one evaluation's events.
///
/// Pure in all inputs including `today`; identical inputs produce equal
/// assessments.
pub fn build_assessment(events: &[RuleEvent], today: NaiveDate) -> Assessment {
    let risk_level = declared_risk(events);

    let mut alerts = Vec::new();
    let mut recommendations = Vec::new();
    let mut flagged_conditions = Vec::new();

    for event in events {
        let Some(flag) = event.flag.as_deref() else {
            continue;
        };
        let classified = classify_flag(flag, event.domain, today);

        alerts.push(Alert {
            alert_type: event.domain.label().to_string(),
            severity: classified.severity,
            description: flag.to_string(),
            recommended_action: classified.recommended_action.clone(),
            requires_immediate_attention: classified.requires_immediate_attention,
        });

        recommendations.push(Recommendation {
            category: event.domain.label().to_string(),
            description: classified.recommended_action.clone(),
            priority: classified.priority,
            target_date: classified.target_date,
            assigned_to: classified.assigned_to,
        });

        let code = event
            .counter
            .as_ref()
            .map(|key| key.condition.clone())
            .unwrap_or_else(|| event.rule.clone());
        flagged_conditions.push(FlaggedCondition {
            condition: event.rule.clone(),
            code,
            description: flag.to_string(),
            requires_monitoring: classified.severity >= Severity::Moderate
                || event.domain == RuleDomain::Nutrition,
        });
    }

    let overall_status = overall_status(risk_level, &alerts);

    Assessment {
        overall_status,
        risk_level,
        alerts,
        recommendations,
        flagged_conditions,
        approval: ApprovalState::Pending,
    }
}

fn declared_risk(events: &[RuleEvent]) -> Option<RiskLevel> {
    events
        .iter()
        .filter(|event| event.domain == RuleDomain::RiskLevel)
        .filter_map(|event| event.counter.as_ref())
        .filter(|key| key.category == category::RISK)
        .find_map(|key| match key.condition.as_str() {
            condition::RISK_LOW => Some(RiskLevel::Low),
            condition::RISK_MEDIUM => Some(RiskLevel::Medium),
            condition::RISK_HIGH => Some(RiskLevel::High),
            condition::RISK_URGENT => Some(RiskLevel::Urgent),
            _ => None,
        })
}

/// Total, order-independent function of the risk level and alert multiset.
fn overall_status(risk_level: Option<RiskLevel>, alerts: &[Alert]) -> HealthStatus {
    let severe = alerts
        .iter()
        .filter(|alert| alert.severity == Severity::Severe)
        .count();
    let moderate = alerts
        .iter()
        .filter(|alert| alert.severity == Severity::Moderate)
        .count();

    if risk_level == Some(RiskLevel::Urgent) || severe >= 1 {
        HealthStatus::Critical
    } else if risk_level == Some(RiskLevel::High) || severe > 1 {
        HealthStatus::Poor
    } else if risk_level == Some(RiskLevel::Medium) || moderate > 2 {
        HealthStatus::Fair
    } else if moderate >= 1 {
        HealthStatus::Good
    } else {
        HealthStatus::Excellent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dss::facts::{source, Codebook, FactNormalizer};
    use crate::dss::rules::RuleEngine;
    use crate::records::RawExamRecord;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    fn events_for(findings: &[(&str, serde_json::Value)]) -> Vec<RuleEvent> {
        let mut record = RawExamRecord::new("rec-1", "student-1");
        for (field, value) in findings {
            record = record.with_finding(*field, value.clone());
        }
        let facts = FactNormalizer::new(Codebook::default()).normalize(&record);
        RuleEngine::standard().run(&facts)
    }

    #[test]
    fn cardiopulmonary_finding_makes_the_record_critical() {
        let events = events_for(&[(source::LUNGS_HEART, json!("Irregular heart rate"))]);
        let assessment = build_assessment(&events, today());

        assert_eq!(assessment.overall_status, HealthStatus::Critical);
        let alert = assessment
            .alerts
            .iter()
            .find(|alert| alert.severity == Severity::Severe)
            .expect("severe alert");
        assert!(alert.requires_immediate_attention);
        assert!(alert.description.contains("Irregular heart rate"));
    }

    #[test]
    fn declared_high_risk_without_alerts_is_poor() {
        let events = events_for(&[
            (source::DECLARED_RISK, json!("High")),
            (source::DEWORMED, json!(true)),
            (source::IMMUNIZATION_COMPLETE, json!(true)),
            (source::IRON_SUPPLEMENTATION, json!(true)),
        ]);
        let assessment = build_assessment(&events, today());

        assert_eq!(assessment.risk_level, Some(RiskLevel::High));
        assert_eq!(assessment.overall_status, HealthStatus::Poor);
    }

    #[test]
    fn moderate_alert_lowers_status_to_good() {
        let events = events_for(&[
            (source::VISION, json!("Failed")),
            (source::DECLARED_RISK, json!("Low")),
            (source::DEWORMED, json!(true)),
            (source::IMMUNIZATION_COMPLETE, json!(true)),
            (source::IRON_SUPPLEMENTATION, json!(true)),
        ]);
        let assessment = build_assessment(&events, today());

        assert_eq!(assessment.overall_status, HealthStatus::Good);
    }

    #[test]
    fn clean_record_is_excellent_and_pending_review() {
        let events = events_for(&[
            (source::DECLARED_RISK, json!("Low")),
            (source::DEWORMED, json!(true)),
            (source::IMMUNIZATION_COMPLETE, json!(true)),
            (source::IRON_SUPPLEMENTATION, json!(true)),
        ]);
        let assessment = build_assessment(&events, today());

        assert_eq!(assessment.overall_status, HealthStatus::Excellent);
        assert!(assessment.alerts.is_empty());
        assert_eq!(assessment.approval, ApprovalState::Pending);
    }

    #[test]
    fn building_twice_from_the_same_events_is_idempotent() {
        let events = events_for(&[
            (source::BMI_FOR_AGE, json!("Severely Wasted/Underweight")),
            (source::VISION, json!("Failed")),
            (source::DECLARED_RISK, json!("Medium")),
        ]);

        let first = build_assessment(&events, today());
        let second = build_assessment(&events, today());
        assert_eq!(first, second);
    }

    #[test]
    fn immediate_attention_implies_severe() {
        let events = events_for(&[
            (source::BMI_FOR_AGE, json!("SW")),
            (source::LUNGS_HEART, json!("Murmur")),
            (source::VISION, json!("Failed")),
            (source::SKIN_SCALP, json!("Lice infestation")),
        ]);
        let assessment = build_assessment(&events, today());

        for alert in &assessment.alerts {
            if alert.requires_immediate_attention {
                assert_eq!(alert.severity, Severity::Severe);
            }
        }
    }

    #[test]
    fn flagged_conditions_carry_counter_codes() {
        let events = events_for(&[(source::DEWORMED, json!("No"))]);
        let assessment = build_assessment(&events, today());

        assert!(assessment
            .flagged_conditions
            .iter()
            .any(|flagged| flagged.code == condition::NOT_DEWORMED));
    }
}
