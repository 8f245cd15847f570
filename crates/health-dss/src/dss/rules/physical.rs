use super::{category, CounterKey, DomainRules, EventTemplate, Predicate, RuleDef, RuleDomain};
use crate::dss::facts::fact;

fn finding_rule(
    name: &str,
    fact_name: &str,
    normal_values: &[&str],
    counter_condition: &str,
    flag: &str,
) -> RuleDef {
    RuleDef {
        name: name.to_string(),
        when: Predicate::TextNotIn {
            fact: fact_name.to_string(),
            values: normal_values.iter().map(|value| value.to_string()).collect(),
        },
        then: EventTemplate {
            counter: Some(CounterKey::new(category::PHYSICAL, counter_condition)),
            flag: Some(flag.to_string()),
            detail_fact: Some(fact_name.to_string()),
        },
    }
}

pub(super) fn rules() -> DomainRules {
    DomainRules {
        domain: RuleDomain::Physical,
        rules: vec![
            finding_rule(
                "skin_scalp_finding",
                fact::SKIN_SCALP,
                &["Normal"],
                "skin_scalp",
                "Skin or scalp problem",
            ),
            finding_rule(
                "eyes_ears_nose_finding",
                fact::EYES_EARS_NOSE,
                &["Normal"],
                "eyes_ears_nose",
                "Eye, ear, or nose problem",
            ),
            finding_rule(
                "mouth_throat_neck_finding",
                fact::MOUTH_THROAT_NECK,
                &["Normal"],
                "mouth_throat_neck",
                "Mouth, throat, or neck problem",
            ),
            finding_rule(
                "cardiopulmonary_finding",
                fact::LUNGS_HEART,
                &["Normal"],
                "lungs_heart",
                "Cardiac or respiratory finding",
            ),
            finding_rule(
                "abdominal_finding",
                fact::ABDOMEN,
                &["Normal"],
                "abdomen",
                "Abdominal problem",
            ),
            finding_rule(
                "deformity_finding",
                fact::DEFORMITIES,
                &["None", "Normal"],
                "deformities",
                "Deformity observed",
            ),
        ],
    }
}
