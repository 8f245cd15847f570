mod nutrition;
mod physical;
mod preventive;
mod risk;
mod screening;

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::facts::FactMap;

/// Counter category names shared by the rule tables, the aggregator, and
/// the recommendation generator.
pub mod category {
    pub const NUTRITION: &str = "nutritional_issues";
    pub const SCREENING: &str = "screening_issues";
    pub const PHYSICAL: &str = "physical_findings";
    pub const PREVENTIVE: &str = "preventive_care";
    pub const RISK: &str = "risk";
}

/// Counter condition names referenced outside their rule tables.
pub mod condition {
    pub const SEVERELY_UNDERWEIGHT: &str = "severely_underweight";
    pub const UNDERWEIGHT: &str = "underweight";
    pub const OVERWEIGHT: &str = "overweight";
    pub const OBESE: &str = "obese";
    pub const STUNTED: &str = "stunted";
    pub const SEVERELY_STUNTED: &str = "severely_stunted";
    pub const VISION: &str = "vision";
    pub const HEARING: &str = "hearing";
    pub const SKIN_SCALP: &str = "skin_scalp";
    pub const MOUTH_THROAT_NECK: &str = "mouth_throat_neck";
    pub const IMMUNIZATION_INCOMPLETE: &str = "immunization_incomplete";
    pub const NOT_DEWORMED: &str = "not_dewormed";
    pub const NO_IRON_SUPPLEMENTATION: &str = "no_iron_supplementation";
    pub const RISK_LOW: &str = "low";
    pub const RISK_MEDIUM: &str = "medium";
    pub const RISK_HIGH: &str = "high";
    pub const RISK_URGENT: &str = "urgent";
    pub const RISK_UNKNOWN: &str = "unknown";
}

/// Clinical themes the rule set is partitioned by. Domains are evaluated
/// independently; a fault in one never blinds the others.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleDomain {
    Nutrition,
    Screening,
    Physical,
    PreventiveCare,
    RiskLevel,
}

impl RuleDomain {
    pub const fn label(self) -> &'static str {
        match self {
            RuleDomain::Nutrition => "nutrition",
            RuleDomain::Screening => "screening",
            RuleDomain::Physical => "physical",
            RuleDomain::PreventiveCare => "preventive_care",
            RuleDomain::RiskLevel => "risk_level",
        }
    }
}

/// Condition half of a rule. A small closed combinator set keeps the table
/// serializable, so rule sets can be loaded without touching the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    TextEquals { fact: String, value: String },
    TextIn { fact: String, values: Vec<String> },
    TextNotIn { fact: String, values: Vec<String> },
    FlagIs { fact: String, expected: bool },
    MeasureAtLeast { fact: String, threshold: f64 },
    AllOf { all: Vec<Predicate> },
}

impl Predicate {
    pub fn holds(&self, facts: &FactMap) -> bool {
        match self {
            Predicate::TextEquals { fact, value } => facts.text(fact) == value,
            Predicate::TextIn { fact, values } => {
                let actual = facts.text(fact);
                values.iter().any(|value| value == actual)
            }
            Predicate::TextNotIn { fact, values } => {
                let actual = facts.text(fact);
                values.iter().all(|value| value != actual)
            }
            Predicate::FlagIs { fact, expected } => facts.flag(fact) == *expected,
            Predicate::MeasureAtLeast { fact, threshold } => facts.measure(fact) >= *threshold,
            Predicate::AllOf { all } => all.iter().all(|predicate| predicate.holds(facts)),
        }
    }
}

/// Addresses one nested aggregation counter bucket.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CounterKey {
    pub category: String,
    pub condition: String,
}

impl CounterKey {
    pub fn new(category: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            condition: condition.into(),
        }
    }
}

/// Event half of a rule. `flag` feeds the severity classifier; `counter`
/// feeds population tallies. `detail_fact` names a fact whose value is
/// appended to the flag so alerts carry the actual finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<CounterKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_fact: Option<String>,
}

/// One declarative rule: when the predicate holds, the template is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub when: Predicate,
    pub then: EventTemplate,
}

/// Emitted when a rule's condition holds against a fact map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RuleEvent {
    pub domain: RuleDomain,
    pub rule: String,
    pub counter: Option<CounterKey>,
    pub flag: Option<String>,
}

/// A named domain exposing the single `evaluate` capability. The built-in
/// table-driven `DomainRules` is the common implementation; custom
/// evaluators can be slotted in for extension.
pub trait DomainEvaluator: Send + Sync {
    fn domain(&self) -> RuleDomain;
    fn evaluate(&self, facts: &FactMap) -> Vec<RuleEvent>;
}

/// Table-driven rule bundle for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRules {
    pub domain: RuleDomain,
    pub rules: Vec<RuleDef>,
}

impl DomainEvaluator for DomainRules {
    fn domain(&self) -> RuleDomain {
        self.domain
    }

    fn evaluate(&self, facts: &FactMap) -> Vec<RuleEvent> {
        let mut events = Vec::new();
        for rule in &self.rules {
            if !rule.when.holds(facts) {
                continue;
            }
            let flag = rule.then.flag.as_ref().map(|flag| {
                match rule.then.detail_fact.as_deref() {
                    Some(fact) if !facts.text(fact).is_empty() => {
                        format!("{}: {}", flag, facts.text(fact))
                    }
                    _ => flag.clone(),
                }
            });
            events.push(RuleEvent {
                domain: self.domain,
                rule: rule.name.clone(),
                counter: rule.then.counter.clone(),
                flag,
            });
        }
        events
    }
}

/// Serializable bundle of every domain's rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub domains: Vec<DomainRules>,
}

impl RuleSet {
    /// The built-in school health rule tables.
    pub fn standard() -> Self {
        Self {
            domains: vec![
                nutrition::rules(),
                screening::rules(),
                physical::rules(),
                preventive::rules(),
                risk::rules(),
            ],
        }
    }

    pub fn from_json<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }
}

/// Generic condition→event interpreter over a fixed set of domain
/// evaluators. Evaluation order is the evaluator order, fixed for a given
/// rule-table version; re-running on identical facts reproduces the same
/// event list.
pub struct RuleEngine {
    evaluators: Vec<Box<dyn DomainEvaluator>>,
}

impl RuleEngine {
    pub fn standard() -> Self {
        Self::from_rule_set(RuleSet::standard())
    }

    pub fn from_rule_set(rule_set: RuleSet) -> Self {
        let evaluators = rule_set
            .domains
            .into_iter()
            .map(|domain| Box::new(domain) as Box<dyn DomainEvaluator>)
            .collect();
        Self { evaluators }
    }

    pub fn with_evaluators(evaluators: Vec<Box<dyn DomainEvaluator>>) -> Self {
        Self { evaluators }
    }

    /// Evaluate every domain against the fact map. A panic inside one
    /// domain is caught and logged; the remaining domains still run.
    pub fn run(&self, facts: &FactMap) -> Vec<RuleEvent> {
        let mut events = Vec::new();
        for evaluator in &self.evaluators {
            match catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(facts))) {
                Ok(mut batch) => events.append(&mut batch),
                Err(_) => {
                    warn!(
                        domain = evaluator.domain().label(),
                        "rule domain evaluation panicked; skipping its events"
                    );
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dss::facts::{source, Codebook, FactNormalizer};
    use crate::records::RawExamRecord;
    use serde_json::json;

    fn facts_for(findings: &[(&str, serde_json::Value)]) -> FactMap {
        let mut record = RawExamRecord::new("rec-1", "student-1");
        for (field, value) in findings {
            record = record.with_finding(*field, value.clone());
        }
        FactNormalizer::new(Codebook::default()).normalize(&record)
    }

    #[test]
    fn evaluation_is_deterministic() {
        let engine = RuleEngine::standard();
        let facts = facts_for(&[
            (source::BMI_FOR_AGE, json!("Severely Wasted/Underweight")),
            (source::VISION, json!("Failed")),
            (source::LUNGS_HEART, json!("Irregular heart rate")),
            (source::DECLARED_RISK, json!("High")),
        ]);

        let mut first = engine.run(&facts);
        let mut second = engine.run(&facts);
        first.sort();
        second.sort();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn fully_compliant_record_yields_only_the_risk_bucket() {
        let engine = RuleEngine::standard();
        let facts = facts_for(&[
            (source::DEWORMED, json!(true)),
            (source::IMMUNIZATION_COMPLETE, json!(true)),
            (source::IRON_SUPPLEMENTATION, json!(true)),
            (source::DECLARED_RISK, json!("Low")),
        ]);

        let events = engine.run(&facts);
        assert_eq!(events.len(), 1, "only the risk bucket event: {events:?}");
        assert_eq!(events[0].domain, RuleDomain::RiskLevel);
        assert!(events[0].flag.is_none());
    }

    #[test]
    fn detail_fact_enriches_physical_flags() {
        let engine = RuleEngine::standard();
        let facts = facts_for(&[(source::LUNGS_HEART, json!("Irregular heart rate"))]);

        let events = engine.run(&facts);
        let cardiac = events
            .iter()
            .find(|event| event.domain == RuleDomain::Physical)
            .expect("cardiopulmonary event");
        assert_eq!(
            cardiac.flag.as_deref(),
            Some("Cardiac or respiratory finding: Irregular heart rate")
        );
    }

    #[test]
    fn panicking_domain_does_not_blind_the_others() {
        struct FaultyDomain;

        impl DomainEvaluator for FaultyDomain {
            fn domain(&self) -> RuleDomain {
                RuleDomain::Physical
            }

            fn evaluate(&self, _facts: &FactMap) -> Vec<RuleEvent> {
                panic!("malformed rule");
            }
        }

        let engine = RuleEngine::with_evaluators(vec![
            Box::new(FaultyDomain),
            Box::new(risk_domain_only()),
        ]);
        let facts = facts_for(&[(source::DECLARED_RISK, json!("Medium"))]);

        let events = engine.run(&facts);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].domain, RuleDomain::RiskLevel);
    }

    fn risk_domain_only() -> DomainRules {
        RuleSet::standard()
            .domains
            .into_iter()
            .find(|domain| domain.domain == RuleDomain::RiskLevel)
            .expect("risk domain present")
    }

    #[test]
    fn rule_set_round_trips_through_json() {
        let standard = RuleSet::standard();
        let json = serde_json::to_string(&standard).expect("rule set serializes");
        let loaded = RuleSet::from_json(json.as_bytes()).expect("rule set parses");
        assert_eq!(loaded.domains.len(), standard.domains.len());

        let engine = RuleEngine::from_rule_set(loaded);
        let facts = facts_for(&[(source::VISION, json!("Failed"))]);
        let events = engine.run(&facts);
        assert!(events
            .iter()
            .any(|event| event.domain == RuleDomain::Screening
                && event.flag.as_deref() == Some("Failed vision screening")));
    }

    #[test]
    fn unknown_risk_text_lands_in_unknown_bucket() {
        let engine = RuleEngine::standard();
        let facts = facts_for(&[(source::DECLARED_RISK, json!("whatever"))]);

        let events = engine.run(&facts);
        let risk = events
            .iter()
            .find(|event| event.domain == RuleDomain::RiskLevel)
            .expect("risk event");
        assert_eq!(
            risk.counter.as_ref().map(|key| key.condition.as_str()),
            Some("unknown")
        );
    }

}
