use super::{category, condition, CounterKey, DomainRules, EventTemplate, Predicate, RuleDef, RuleDomain};
use crate::dss::facts::{fact, RISK_VALUES};

fn bucket_rule(name: &str, declared: &str, counter_condition: &str) -> RuleDef {
    RuleDef {
        name: name.to_string(),
        when: Predicate::TextEquals {
            fact: fact::DECLARED_RISK.to_string(),
            value: declared.to_string(),
        },
        then: EventTemplate {
            counter: Some(CounterKey::new(category::RISK, counter_condition)),
            flag: None,
            detail_fact: None,
        },
    }
}

/// Risk classification drives population distribution counts and the
/// record-level risk bucket. It emits no flags: alerts belong to the
/// clinical domains.
pub(super) fn rules() -> DomainRules {
    DomainRules {
        domain: RuleDomain::RiskLevel,
        rules: vec![
            bucket_rule("risk_low", "Low", condition::RISK_LOW),
            bucket_rule("risk_medium", "Medium", condition::RISK_MEDIUM),
            bucket_rule("risk_high", "High", condition::RISK_HIGH),
            bucket_rule("risk_urgent", "Urgent", condition::RISK_URGENT),
            RuleDef {
                name: "risk_unclassified".to_string(),
                when: Predicate::TextNotIn {
                    fact: fact::DECLARED_RISK.to_string(),
                    values: RISK_VALUES.iter().map(|value| value.to_string()).collect(),
                },
                then: EventTemplate {
                    counter: Some(CounterKey::new(category::RISK, condition::RISK_UNKNOWN)),
                    flag: None,
                    detail_fact: None,
                },
            },
        ],
    }
}
