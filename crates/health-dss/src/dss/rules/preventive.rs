use super::{category, condition, CounterKey, DomainRules, EventTemplate, Predicate, RuleDef, RuleDomain};
use crate::dss::facts::fact;

fn gap_rule(name: &str, fact_name: &str, counter_condition: &str, flag: &str) -> RuleDef {
    RuleDef {
        name: name.to_string(),
        when: Predicate::FlagIs {
            fact: fact_name.to_string(),
            expected: false,
        },
        then: EventTemplate {
            counter: Some(CounterKey::new(category::PREVENTIVE, counter_condition)),
            flag: Some(flag.to_string()),
            detail_fact: None,
        },
    }
}

pub(super) fn rules() -> DomainRules {
    DomainRules {
        domain: RuleDomain::PreventiveCare,
        rules: vec![
            gap_rule(
                "immunization_incomplete",
                fact::IMMUNIZATION_COMPLETE,
                condition::IMMUNIZATION_INCOMPLETE,
                "Incomplete immunization",
            ),
            gap_rule(
                "not_dewormed",
                fact::DEWORMED,
                condition::NOT_DEWORMED,
                "Missed deworming",
            ),
            gap_rule(
                "no_iron_supplementation",
                fact::IRON_SUPPLEMENTATION,
                condition::NO_IRON_SUPPLEMENTATION,
                "No iron supplementation",
            ),
        ],
    }
}
