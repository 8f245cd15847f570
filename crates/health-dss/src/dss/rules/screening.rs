use super::{category, condition, CounterKey, DomainRules, EventTemplate, Predicate, RuleDef, RuleDomain};
use crate::dss::facts::fact;

pub(super) fn rules() -> DomainRules {
    DomainRules {
        domain: RuleDomain::Screening,
        rules: vec![
            RuleDef {
                name: "vision_failed".to_string(),
                when: Predicate::TextEquals {
                    fact: fact::VISION.to_string(),
                    value: "Failed".to_string(),
                },
                then: EventTemplate {
                    counter: Some(CounterKey::new(category::SCREENING, condition::VISION)),
                    flag: Some("Failed vision screening".to_string()),
                    detail_fact: None,
                },
            },
            RuleDef {
                name: "hearing_failed".to_string(),
                when: Predicate::TextEquals {
                    fact: fact::HEARING.to_string(),
                    value: "Failed".to_string(),
                },
                then: EventTemplate {
                    counter: Some(CounterKey::new(category::SCREENING, condition::HEARING)),
                    flag: Some("Failed hearing screening".to_string()),
                    detail_fact: None,
                },
            },
        ],
    }
}
