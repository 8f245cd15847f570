use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use super::domain::RawExamRecord;
use crate::dss::facts::source;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read exam export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid exam CSV data: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Importer for health-information-system CSV exports of exam records.
///
/// Field-level noise (blank cells, unparseable dates) is tolerated; the
/// normalizer downstream treats it as absent. Rows without a record id
/// are skipped.
pub struct ExamRecordImporter;

impl ExamRecordImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawExamRecord>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<RawExamRecord>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for row in csv_reader.deserialize::<ExamRow>() {
            let row = row?;
            let Some(record) = row.into_record() else {
                continue;
            };
            records.push(record);
        }

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ExamRow {
    #[serde(rename = "Record ID", default, deserialize_with = "empty_string_as_none")]
    record_id: Option<String>,
    #[serde(rename = "Subject ID", default, deserialize_with = "empty_string_as_none")]
    subject_id: Option<String>,
    #[serde(rename = "School ID", default, deserialize_with = "empty_string_as_none")]
    school_id: Option<String>,
    #[serde(rename = "Grade Level", default, deserialize_with = "empty_string_as_none")]
    grade_level: Option<String>,
    #[serde(rename = "Exam Date", default, deserialize_with = "empty_string_as_none")]
    exam_date: Option<String>,
    #[serde(
        rename = "Nutritional Status (BMI)",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    bmi_for_age: Option<String>,
    #[serde(
        rename = "Nutritional Status (Height)",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    height_for_age: Option<String>,
    #[serde(rename = "Vision Screening", default, deserialize_with = "empty_string_as_none")]
    vision: Option<String>,
    #[serde(
        rename = "Auditory Screening",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    hearing: Option<String>,
    #[serde(rename = "Skin/Scalp", default, deserialize_with = "empty_string_as_none")]
    skin_scalp: Option<String>,
    #[serde(rename = "Eyes/Ears/Nose", default, deserialize_with = "empty_string_as_none")]
    eyes_ears_nose: Option<String>,
    #[serde(
        rename = "Mouth/Throat/Neck",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    mouth_throat_neck: Option<String>,
    #[serde(rename = "Lungs/Heart", default, deserialize_with = "empty_string_as_none")]
    lungs_heart: Option<String>,
    #[serde(rename = "Abdomen", default, deserialize_with = "empty_string_as_none")]
    abdomen: Option<String>,
    #[serde(rename = "Deformities", default, deserialize_with = "empty_string_as_none")]
    deformities: Option<String>,
    #[serde(
        rename = "Immunization Complete",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    immunization_complete: Option<String>,
    #[serde(rename = "Dewormed", default, deserialize_with = "empty_string_as_none")]
    dewormed: Option<String>,
    #[serde(
        rename = "Iron Supplementation",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    iron_supplementation: Option<String>,
    #[serde(rename = "Risk Level", default, deserialize_with = "empty_string_as_none")]
    risk_level: Option<String>,
    #[serde(rename = "Height (cm)", default, deserialize_with = "empty_string_as_none")]
    height_cm: Option<String>,
    #[serde(rename = "Weight (kg)", default, deserialize_with = "empty_string_as_none")]
    weight_kg: Option<String>,
    #[serde(rename = "Temperature (C)", default, deserialize_with = "empty_string_as_none")]
    temperature_c: Option<String>,
}

impl ExamRow {
    fn into_record(self) -> Option<RawExamRecord> {
        let record_id = self.record_id?;
        let mut record = RawExamRecord::new(record_id, self.subject_id.unwrap_or_default());
        record.school_id = self.school_id.unwrap_or_default();
        record.grade_level = self.grade_level;
        record.exam_date = self
            .exam_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());

        let text_fields = [
            (source::BMI_FOR_AGE, self.bmi_for_age),
            (source::HEIGHT_FOR_AGE, self.height_for_age),
            (source::VISION, self.vision),
            (source::HEARING, self.hearing),
            (source::SKIN_SCALP, self.skin_scalp),
            (source::EYES_EARS_NOSE, self.eyes_ears_nose),
            (source::MOUTH_THROAT_NECK, self.mouth_throat_neck),
            (source::LUNGS_HEART, self.lungs_heart),
            (source::ABDOMEN, self.abdomen),
            (source::DEFORMITIES, self.deformities),
            (source::IMMUNIZATION_COMPLETE, self.immunization_complete),
            (source::DEWORMED, self.dewormed),
            (source::IRON_SUPPLEMENTATION, self.iron_supplementation),
            (source::DECLARED_RISK, self.risk_level),
            (source::HEIGHT_CM, self.height_cm),
            (source::WEIGHT_KG, self.weight_kg),
            (source::TEMPERATURE_C, self.temperature_c),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value {
                record.findings.insert(field.to_string(), json!(value));
            }
        }

        Some(record)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()))
}
