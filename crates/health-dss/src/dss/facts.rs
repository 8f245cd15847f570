use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::RawExamRecord;

/// Canonical fact names. Every `FactMap` contains all of them.
pub mod fact {
    pub const BMI_FOR_AGE: &str = "nutrition.bmi_for_age";
    pub const HEIGHT_FOR_AGE: &str = "nutrition.height_for_age";
    pub const VISION: &str = "screening.vision";
    pub const HEARING: &str = "screening.hearing";
    pub const SKIN_SCALP: &str = "physical.skin_scalp";
    pub const EYES_EARS_NOSE: &str = "physical.eyes_ears_nose";
    pub const MOUTH_THROAT_NECK: &str = "physical.mouth_throat_neck";
    pub const LUNGS_HEART: &str = "physical.lungs_heart";
    pub const ABDOMEN: &str = "physical.abdomen";
    pub const DEFORMITIES: &str = "physical.deformities";
    pub const IMMUNIZATION_COMPLETE: &str = "preventive.immunization_complete";
    pub const DEWORMED: &str = "preventive.dewormed";
    pub const IRON_SUPPLEMENTATION: &str = "preventive.iron_supplementation";
    pub const DECLARED_RISK: &str = "risk.declared_level";
    pub const HEIGHT_CM: &str = "vitals.height_cm";
    pub const WEIGHT_KG: &str = "vitals.weight_kg";
    pub const TEMPERATURE_C: &str = "vitals.temperature_c";
}

/// Raw field names as the records backend stores them.
pub mod source {
    pub const BMI_FOR_AGE: &str = "nutritional_status_bmi";
    pub const HEIGHT_FOR_AGE: &str = "nutritional_status_height";
    pub const VISION: &str = "vision_screening";
    pub const HEARING: &str = "auditory_screening";
    pub const SKIN_SCALP: &str = "skin_scalp";
    pub const EYES_EARS_NOSE: &str = "eyes_ears_nose";
    pub const MOUTH_THROAT_NECK: &str = "mouth_throat_neck";
    pub const LUNGS_HEART: &str = "lungs_heart";
    pub const ABDOMEN: &str = "abdomen";
    pub const DEFORMITIES: &str = "deformities";
    pub const IMMUNIZATION_COMPLETE: &str = "immunization_complete";
    pub const DEWORMED: &str = "dewormed";
    pub const IRON_SUPPLEMENTATION: &str = "iron_supplementation";
    pub const DECLARED_RISK: &str = "risk_level";
    pub const HEIGHT_CM: &str = "height_cm";
    pub const WEIGHT_KG: &str = "weight_kg";
    pub const TEMPERATURE_C: &str = "temperature_c";
}

/// Value representation for one canonical fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FactValue {
    Text(String),
    Flag(bool),
    Measure(f64),
}

/// Total, immutable map of canonical facts derived from one record.
///
/// The accessors never fail: construction guarantees every canonical name
/// is present, so downstream rules never null-check.
#[derive(Debug, Clone, PartialEq)]
pub struct FactMap {
    values: BTreeMap<&'static str, FactValue>,
}

impl FactMap {
    pub fn text(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(FactValue::Text(value)) => value,
            _ => "",
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FactValue::Flag(true)))
    }

    pub fn measure(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(FactValue::Measure(value)) => *value,
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Categorical {
        neutral: &'static str,
        accepted: &'static [&'static str],
    },
    Boolean,
    Measure,
}

struct FieldSpec {
    name: &'static str,
    source: &'static str,
    kind: FieldKind,
}

pub(crate) const BMI_VALUES: &[&str] = &[
    "Normal",
    "Wasted/Underweight",
    "Severely Wasted/Underweight",
    "Overweight",
    "Obese",
];

pub(crate) const HEIGHT_VALUES: &[&str] = &["Normal", "Stunted", "Severely Stunted", "Tall"];

pub(crate) const SCREENING_VALUES: &[&str] = &["Passed", "Failed"];

pub(crate) const RISK_VALUES: &[&str] = &["Low", "Medium", "High", "Urgent"];

const EXAM_FINDING_LIMIT: usize = 120;

const NORMALISH: &[&str] = &["normal", "none", "n/a", "na", "-", "ok", "unremarkable"];

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: fact::BMI_FOR_AGE,
        source: source::BMI_FOR_AGE,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: BMI_VALUES,
        },
    },
    FieldSpec {
        name: fact::HEIGHT_FOR_AGE,
        source: source::HEIGHT_FOR_AGE,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: HEIGHT_VALUES,
        },
    },
    FieldSpec {
        name: fact::VISION,
        source: source::VISION,
        kind: FieldKind::Categorical {
            neutral: "Passed",
            accepted: SCREENING_VALUES,
        },
    },
    FieldSpec {
        name: fact::HEARING,
        source: source::HEARING,
        kind: FieldKind::Categorical {
            neutral: "Passed",
            accepted: SCREENING_VALUES,
        },
    },
    FieldSpec {
        name: fact::SKIN_SCALP,
        source: source::SKIN_SCALP,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::EYES_EARS_NOSE,
        source: source::EYES_EARS_NOSE,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::MOUTH_THROAT_NECK,
        source: source::MOUTH_THROAT_NECK,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::LUNGS_HEART,
        source: source::LUNGS_HEART,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::ABDOMEN,
        source: source::ABDOMEN,
        kind: FieldKind::Categorical {
            neutral: "Normal",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::DEFORMITIES,
        source: source::DEFORMITIES,
        kind: FieldKind::Categorical {
            neutral: "None",
            accepted: &[],
        },
    },
    FieldSpec {
        name: fact::IMMUNIZATION_COMPLETE,
        source: source::IMMUNIZATION_COMPLETE,
        kind: FieldKind::Boolean,
    },
    FieldSpec {
        name: fact::DEWORMED,
        source: source::DEWORMED,
        kind: FieldKind::Boolean,
    },
    FieldSpec {
        name: fact::IRON_SUPPLEMENTATION,
        source: source::IRON_SUPPLEMENTATION,
        kind: FieldKind::Boolean,
    },
    FieldSpec {
        name: fact::DECLARED_RISK,
        source: source::DECLARED_RISK,
        kind: FieldKind::Categorical {
            neutral: "",
            accepted: RISK_VALUES,
        },
    },
    FieldSpec {
        name: fact::HEIGHT_CM,
        source: source::HEIGHT_CM,
        kind: FieldKind::Measure,
    },
    FieldSpec {
        name: fact::WEIGHT_KG,
        source: source::WEIGHT_KG,
        kind: FieldKind::Measure,
    },
    FieldSpec {
        name: fact::TEMPERATURE_C,
        source: source::TEMPERATURE_C,
        kind: FieldKind::Measure,
    },
];

/// Lookup table mapping short upstream codes to canonical values, keyed by
/// raw field name. Supplied by the records backend; a built-in default
/// covers the standard code set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codebook {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl Codebook {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_json<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        canonical: impl Into<String>,
    ) {
        self.entries
            .entry(field.into())
            .or_default()
            .insert(code.into(), canonical.into());
    }

    fn resolve(&self, field: &str, code: &str) -> Option<&str> {
        self.entries
            .get(field)
            .and_then(|codes| codes.get(code))
            .map(String::as_str)
    }
}

impl Default for Codebook {
    fn default() -> Self {
        let mut book = Self::empty();
        for (code, canonical) in [
            ("N", "Normal"),
            ("W", "Wasted/Underweight"),
            ("SW", "Severely Wasted/Underweight"),
            ("OW", "Overweight"),
            ("OB", "Obese"),
        ] {
            book.insert(source::BMI_FOR_AGE, code, canonical);
        }
        for (code, canonical) in [
            ("N", "Normal"),
            ("St", "Stunted"),
            ("SSt", "Severely Stunted"),
            ("T", "Tall"),
        ] {
            book.insert(source::HEIGHT_FOR_AGE, code, canonical);
        }
        for field in [source::VISION, source::HEARING] {
            book.insert(field, "P", "Passed");
            book.insert(field, "F", "Failed");
        }
        for (code, canonical) in [
            ("L", "Low"),
            ("M", "Medium"),
            ("H", "High"),
            ("U", "Urgent"),
        ] {
            book.insert(source::DECLARED_RISK, code, canonical);
        }
        book
    }
}

/// Pure, total mapping from one raw record to the canonical fact set.
///
/// Absent or unrecognizable raw values become the field's neutral value,
/// so no downstream rule ever sees a missing fact.
#[derive(Debug, Clone, Default)]
pub struct FactNormalizer {
    codebook: Codebook,
}

impl FactNormalizer {
    pub fn new(codebook: Codebook) -> Self {
        Self { codebook }
    }

    pub fn normalize(&self, record: &RawExamRecord) -> FactMap {
        let mut values = BTreeMap::new();

        for field in FIELDS {
            let raw = record.findings.get(field.source);
            let value = match field.kind {
                FieldKind::Categorical { neutral, accepted } => {
                    FactValue::Text(self.categorical(field.source, raw, neutral, accepted))
                }
                FieldKind::Boolean => FactValue::Flag(boolean(raw)),
                FieldKind::Measure => FactValue::Measure(measure(raw)),
            };
            values.insert(field.name, value);
        }

        FactMap { values }
    }

    fn categorical(
        &self,
        source: &str,
        raw: Option<&Value>,
        neutral: &str,
        accepted: &[&str],
    ) -> String {
        let Some(text) = raw.and_then(value_as_text) else {
            return neutral.to_string();
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.len() > EXAM_FINDING_LIMIT {
            return neutral.to_string();
        }

        if let Some(canonical) = self.codebook.resolve(source, trimmed) {
            return canonical.to_string();
        }

        if accepted.is_empty() {
            // Free-text exam finding: normal-ish spellings collapse to the
            // neutral value, anything else is kept verbatim.
            if NORMALISH.iter().any(|norm| norm.eq_ignore_ascii_case(trimmed)) {
                return neutral.to_string();
            }
            return trimmed.to_string();
        }

        accepted
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
            .map(|candidate| candidate.to_string())
            .unwrap_or_else(|| neutral.to_string())
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn boolean(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => {
            matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "yes" | "y" | "true" | "1" | "complete" | "completed"
            )
        }
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn measure(raw: Option<&Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> FactNormalizer {
        FactNormalizer::new(Codebook::default())
    }

    #[test]
    fn empty_record_yields_all_neutral_facts() {
        let record = RawExamRecord::new("rec-1", "student-1");
        let facts = normalizer().normalize(&record);

        assert_eq!(facts.len(), FIELDS.len());
        assert_eq!(facts.text(fact::BMI_FOR_AGE), "Normal");
        assert_eq!(facts.text(fact::VISION), "Passed");
        assert_eq!(facts.text(fact::DEFORMITIES), "None");
        assert_eq!(facts.text(fact::DECLARED_RISK), "");
        assert!(!facts.flag(fact::DEWORMED));
        assert_eq!(facts.measure(fact::HEIGHT_CM), 0.0);
    }

    #[test]
    fn codebook_resolves_short_codes() {
        let record = RawExamRecord::new("rec-2", "student-2")
            .with_finding(source::BMI_FOR_AGE, json!("SW"))
            .with_finding(source::VISION, json!("F"))
            .with_finding(source::DECLARED_RISK, json!("H"));
        let facts = normalizer().normalize(&record);

        assert_eq!(
            facts.text(fact::BMI_FOR_AGE),
            "Severely Wasted/Underweight"
        );
        assert_eq!(facts.text(fact::VISION), "Failed");
        assert_eq!(facts.text(fact::DECLARED_RISK), "High");
    }

    #[test]
    fn garbage_values_degrade_to_neutral() {
        let record = RawExamRecord::new("rec-3", "student-3")
            .with_finding(source::BMI_FOR_AGE, json!("zzz-not-a-status"))
            .with_finding(source::HEARING, json!(42))
            .with_finding(source::DEWORMED, json!("maybe"))
            .with_finding(source::WEIGHT_KG, json!("heavy"));
        let facts = normalizer().normalize(&record);

        assert_eq!(facts.text(fact::BMI_FOR_AGE), "Normal");
        assert_eq!(facts.text(fact::HEARING), "Passed");
        assert!(!facts.flag(fact::DEWORMED));
        assert_eq!(facts.measure(fact::WEIGHT_KG), 0.0);
    }

    #[test]
    fn free_text_exam_findings_pass_through() {
        let record = RawExamRecord::new("rec-4", "student-4")
            .with_finding(source::LUNGS_HEART, json!("Irregular heart rate"))
            .with_finding(source::SKIN_SCALP, json!("  Lice infestation  "));
        let facts = normalizer().normalize(&record);

        assert_eq!(facts.text(fact::LUNGS_HEART), "Irregular heart rate");
        assert_eq!(facts.text(fact::SKIN_SCALP), "Lice infestation");
    }

    #[test]
    fn normalish_spellings_collapse_to_neutral() {
        let record = RawExamRecord::new("rec-7", "student-7")
            .with_finding(source::ABDOMEN, json!("unremarkable"))
            .with_finding(source::DEFORMITIES, json!("NONE"));
        let facts = normalizer().normalize(&record);

        assert_eq!(facts.text(fact::ABDOMEN), "Normal");
        assert_eq!(facts.text(fact::DEFORMITIES), "None");
    }

    #[test]
    fn boolean_fields_accept_common_spellings() {
        let record = RawExamRecord::new("rec-5", "student-5")
            .with_finding(source::DEWORMED, json!("Yes"))
            .with_finding(source::IMMUNIZATION_COMPLETE, json!(true))
            .with_finding(source::IRON_SUPPLEMENTATION, json!(1));
        let facts = normalizer().normalize(&record);

        assert!(facts.flag(fact::DEWORMED));
        assert!(facts.flag(fact::IMMUNIZATION_COMPLETE));
        assert!(facts.flag(fact::IRON_SUPPLEMENTATION));
    }

    #[test]
    fn custom_codebook_loads_from_json() {
        let json = r#"{ "entries": { "vision_screening": { "X": "Failed" } } }"#;
        let book = Codebook::from_json(json.as_bytes()).expect("codebook parses");
        let record = RawExamRecord::new("rec-6", "student-6")
            .with_finding(source::VISION, json!("X"));
        let facts = FactNormalizer::new(book).normalize(&record);

        assert_eq!(facts.text(fact::VISION), "Failed");
    }
}
