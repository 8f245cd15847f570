use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for persisted examination records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

/// One examination record as stored by the records backend.
///
/// Findings arrive loosely coded: values may be canonical strings, short
/// codes, booleans, numbers, or garbage. The fact normalizer is the only
/// component that reads this map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExamRecord {
    pub record_id: RecordId,
    pub subject_id: String,
    pub school_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub findings: BTreeMap<String, Value>,
}

impl RawExamRecord {
    pub fn new(record_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            record_id: RecordId(record_id.into()),
            subject_id: subject_id.into(),
            school_id: String::new(),
            grade_level: None,
            exam_date: None,
            findings: BTreeMap::new(),
        }
    }

    pub fn with_finding(mut self, field: impl Into<String>, value: Value) -> Self {
        self.findings.insert(field.into(), value);
        self
    }

    /// Grouping key used for sub-population breakdowns.
    pub fn grade_key(&self) -> String {
        self.grade_level
            .as_deref()
            .map(str::trim)
            .filter(|grade| !grade.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "Unspecified".to_string())
    }
}

/// Scoping filters for population queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
}

impl RecordFilters {
    pub fn matches(&self, record: &RawExamRecord) -> bool {
        if let Some(from) = self.from {
            match record.exam_date {
                Some(date) if date >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.to {
            match record.exam_date {
                Some(date) if date <= to => {}
                _ => return false,
            }
        }
        if let Some(grade) = self.grade_level.as_deref() {
            if !record
                .grade_level
                .as_deref()
                .map(|value| value.eq_ignore_ascii_case(grade))
                .unwrap_or(false)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(grade: Option<&str>, date: Option<(i32, u32, u32)>) -> RawExamRecord {
        let mut record = RawExamRecord::new("rec-1", "student-1");
        record.grade_level = grade.map(str::to_string);
        record.exam_date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        record
    }

    #[test]
    fn grade_key_falls_back_when_unset() {
        assert_eq!(record(None, None).grade_key(), "Unspecified");
        assert_eq!(record(Some("  "), None).grade_key(), "Unspecified");
        assert_eq!(record(Some("Grade 4"), None).grade_key(), "Grade 4");
    }

    #[test]
    fn filters_match_date_window_and_grade() {
        let filters = RecordFilters {
            from: NaiveDate::from_ymd_opt(2025, 6, 1),
            to: NaiveDate::from_ymd_opt(2025, 6, 30),
            grade_level: Some("grade 4".to_string()),
        };

        assert!(filters.matches(&record(Some("Grade 4"), Some((2025, 6, 15)))));
        assert!(!filters.matches(&record(Some("Grade 5"), Some((2025, 6, 15)))));
        assert!(!filters.matches(&record(Some("Grade 4"), Some((2025, 7, 1)))));
        assert!(!filters.matches(&record(Some("Grade 4"), None)));
    }
}
