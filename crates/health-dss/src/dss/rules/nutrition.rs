use super::{category, condition, CounterKey, DomainRules, EventTemplate, Predicate, RuleDef, RuleDomain};
use crate::dss::facts::fact;

fn status_rule(
    name: &str,
    fact_name: &str,
    value: &str,
    counter_condition: &str,
    flag: &str,
) -> RuleDef {
    RuleDef {
        name: name.to_string(),
        when: Predicate::TextEquals {
            fact: fact_name.to_string(),
            value: value.to_string(),
        },
        then: EventTemplate {
            counter: Some(CounterKey::new(category::NUTRITION, counter_condition)),
            flag: Some(flag.to_string()),
            detail_fact: None,
        },
    }
}

pub(super) fn rules() -> DomainRules {
    DomainRules {
        domain: RuleDomain::Nutrition,
        rules: vec![
            status_rule(
                "severely_underweight",
                fact::BMI_FOR_AGE,
                "Severely Wasted/Underweight",
                condition::SEVERELY_UNDERWEIGHT,
                "Severely Wasted/Underweight nutritional status",
            ),
            status_rule(
                "underweight",
                fact::BMI_FOR_AGE,
                "Wasted/Underweight",
                condition::UNDERWEIGHT,
                "Wasted/Underweight nutritional status",
            ),
            status_rule(
                "overweight",
                fact::BMI_FOR_AGE,
                "Overweight",
                condition::OVERWEIGHT,
                "Overweight nutritional status",
            ),
            status_rule(
                "obese",
                fact::BMI_FOR_AGE,
                "Obese",
                condition::OBESE,
                "Obese nutritional status",
            ),
            status_rule(
                "severely_stunted",
                fact::HEIGHT_FOR_AGE,
                "Severely Stunted",
                condition::SEVERELY_STUNTED,
                "Severely Stunted growth",
            ),
            status_rule(
                "stunted",
                fact::HEIGHT_FOR_AGE,
                "Stunted",
                condition::STUNTED,
                "Stunted growth",
            ),
        ],
    }
}
