use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::rules::RuleDomain;

/// Severity of a single-record finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
        }
    }
}

/// Remediation priority attached to recommendations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

/// Role responsible for acting on a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareRole {
    Nurse,
    Doctor,
    Nutritionist,
    Parent,
}

impl CareRole {
    pub const fn label(self) -> &'static str {
        match self {
            CareRole::Nurse => "School Nurse",
            CareRole::Doctor => "School Physician",
            CareRole::Nutritionist => "Nutritionist",
            CareRole::Parent => "Parent/Guardian",
        }
    }
}

/// Classification of one flag through the keyword ladder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagClassification {
    pub severity: Severity,
    pub priority: Priority,
    pub target_date: NaiveDate,
    pub assigned_to: CareRole,
    pub requires_immediate_attention: bool,
    pub recommended_action: String,
}

// Ladder tiers, in authoritative order. The first tier containing any
// matching keyword wins, so a flag carrying both "Severely" and "Risk"
// classifies severe. Matching is literal and case-sensitive, mirroring
// the flag texts the rule tables emit.
const SEVERE_KEYWORDS: &[&str] = &["Severely", "Critical", "High Risk", "Cardiac", "Respiratory"];
const MODERATE_KEYWORDS: &[&str] = &["Risk", "Problem", "Disease", "Delay", "Failed"];

const SEVERE_TARGET_DAYS: i64 = 3;
const SEVERE_NUTRITION_TARGET_DAYS: i64 = 7;
const MODERATE_TARGET_DAYS: i64 = 14;
const MILD_TARGET_DAYS: i64 = 30;

/// Classify one flag. Deterministic: same flag, domain, and date always
/// produce the same classification.
pub fn classify_flag(flag: &str, domain: RuleDomain, today: NaiveDate) -> FlagClassification {
    let recommended_action = recommended_action(flag);
    let assigned_to = assign_role(&recommended_action);

    if SEVERE_KEYWORDS.iter().any(|keyword| flag.contains(keyword)) {
        let days = if domain == RuleDomain::Nutrition {
            SEVERE_NUTRITION_TARGET_DAYS
        } else {
            SEVERE_TARGET_DAYS
        };
        return FlagClassification {
            severity: Severity::Severe,
            priority: Priority::Urgent,
            target_date: today + Duration::days(days),
            assigned_to,
            requires_immediate_attention: true,
            recommended_action,
        };
    }

    if MODERATE_KEYWORDS.iter().any(|keyword| flag.contains(keyword)) {
        return FlagClassification {
            severity: Severity::Moderate,
            priority: Priority::High,
            target_date: today + Duration::days(MODERATE_TARGET_DAYS),
            assigned_to,
            requires_immediate_attention: false,
            recommended_action,
        };
    }

    FlagClassification {
        severity: Severity::Mild,
        priority: Priority::Medium,
        target_date: today + Duration::days(MILD_TARGET_DAYS),
        assigned_to,
        requires_immediate_attention: false,
        recommended_action,
    }
}

/// Action templates keyed by flag content, most specific first.
fn recommended_action(flag: &str) -> String {
    const TEMPLATES: &[(&str, &str)] = &[
        (
            "Severely Wasted",
            "Refer to doctor and enroll in the school feeding program",
        ),
        (
            "Wasted/Underweight",
            "Enroll in the school feeding program and monitor nutrition monthly",
        ),
        (
            "Severely Stunted",
            "Refer for medical and nutrition assessment",
        ),
        (
            "Stunted",
            "Provide feeding support and track height quarterly",
        ),
        (
            "Overweight",
            "Provide nutrition counseling and family guidance on balanced diet",
        ),
        (
            "Obese",
            "Provide nutrition counseling and family guidance on balanced diet",
        ),
        (
            "vision",
            "Refer to doctor for ophthalmologic evaluation",
        ),
        (
            "hearing",
            "Refer to doctor for audiometric evaluation",
        ),
        (
            "Cardiac",
            "Refer to doctor immediately for cardiopulmonary evaluation",
        ),
        (
            "Skin or scalp",
            "Treat per clinic protocol and send hygiene guidance to the parent",
        ),
        (
            "Eye, ear, or nose",
            "Refer to doctor for further evaluation",
        ),
        (
            "Mouth, throat, or neck",
            "Schedule dental and ENT follow-up at the school clinic",
        ),
        (
            "Abdominal",
            "Refer to doctor for abdominal evaluation",
        ),
        (
            "Deformity",
            "Monitor and discuss support options with the family",
        ),
        (
            "immunization",
            "Coordinate catch-up vaccination with parent consent",
        ),
        (
            "deworming",
            "Schedule deworming dose with parent consent",
        ),
        (
            "iron",
            "Provide iron supplementation through the nutrition program",
        ),
    ];

    TEMPLATES
        .iter()
        .find(|(needle, _)| flag.contains(needle))
        .map(|(_, action)| action.to_string())
        .unwrap_or_else(|| "Monitor at the next scheduled visit".to_string())
}

/// Derive the responsible role from the recommendation text.
pub fn assign_role(action: &str) -> CareRole {
    let lowered = action.to_ascii_lowercase();
    if lowered.contains("refer") || lowered.contains("doctor") {
        CareRole::Doctor
    } else if lowered.contains("nutrition") || lowered.contains("feeding") {
        CareRole::Nutritionist
    } else if lowered.contains("parent") || lowered.contains("family") {
        CareRole::Parent
    } else {
        CareRole::Nurse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    #[test]
    fn cardiac_flags_classify_severe_urgent() {
        let classified = classify_flag(
            "Cardiac or respiratory finding: Irregular heart rate",
            RuleDomain::Physical,
            today(),
        );

        assert_eq!(classified.severity, Severity::Severe);
        assert_eq!(classified.priority, Priority::Urgent);
        assert!(classified.requires_immediate_attention);
        assert_eq!(classified.target_date, today() + Duration::days(3));
        assert_eq!(classified.assigned_to, CareRole::Doctor);
    }

    #[test]
    fn nutrition_severe_flags_get_the_longer_target() {
        let classified = classify_flag(
            "Severely Wasted/Underweight nutritional status",
            RuleDomain::Nutrition,
            today(),
        );

        assert_eq!(classified.severity, Severity::Severe);
        assert_eq!(classified.target_date, today() + Duration::days(7));
        assert_eq!(classified.assigned_to, CareRole::Doctor);
    }

    #[test]
    fn failed_screenings_classify_moderate() {
        let classified = classify_flag("Failed vision screening", RuleDomain::Screening, today());

        assert_eq!(classified.severity, Severity::Moderate);
        assert_eq!(classified.priority, Priority::High);
        assert!(!classified.requires_immediate_attention);
        assert_eq!(classified.target_date, today() + Duration::days(14));
    }

    #[test]
    fn unmatched_flags_classify_mild() {
        let classified = classify_flag("Deformity observed", RuleDomain::Physical, today());

        assert_eq!(classified.severity, Severity::Mild);
        assert_eq!(classified.priority, Priority::Medium);
        assert_eq!(classified.target_date, today() + Duration::days(30));
    }

    #[test]
    fn severe_tier_wins_over_moderate_on_overlap() {
        // "Severely" and "Risk" both present: first tier is authoritative.
        let classified = classify_flag(
            "Severely Stunted growth with Risk of complications",
            RuleDomain::Nutrition,
            today(),
        );

        assert_eq!(classified.severity, Severity::Severe);
        assert!(classified.requires_immediate_attention);
    }

    #[test]
    fn role_derivation_reads_action_text() {
        assert_eq!(assign_role("Refer to doctor for evaluation"), CareRole::Doctor);
        assert_eq!(
            assign_role("Enroll in the school feeding program"),
            CareRole::Nutritionist
        );
        assert_eq!(
            assign_role("Coordinate catch-up vaccination with parent consent"),
            CareRole::Parent
        );
        assert_eq!(assign_role("Monitor at the next scheduled visit"), CareRole::Nurse);
    }
}
