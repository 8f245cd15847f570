use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use super::facts::{Codebook, FactMap, FactNormalizer};
use super::rules::{category, condition, RuleEngine, RuleEvent};
use crate::config::EngineConfig;
use crate::records::RawExamRecord;

/// Per-bucket counts of record-level risk classifications.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub urgent: u64,
    pub unknown: u64,
}

impl RiskDistribution {
    fn record(&mut self, bucket: &str) {
        match bucket {
            condition::RISK_LOW => self.low += 1,
            condition::RISK_MEDIUM => self.medium += 1,
            condition::RISK_HIGH => self.high += 1,
            condition::RISK_URGENT => self.urgent += 1,
            _ => self.unknown += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high + self.urgent + self.unknown
    }
}

/// Nested condition counters plus the risk distribution for one cohort.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AggregationCounters {
    pub conditions: BTreeMap<String, BTreeMap<String, u64>>,
    pub risk: RiskDistribution,
}

impl AggregationCounters {
    fn fold(&mut self, events: &[RuleEvent]) {
        for event in events {
            let Some(key) = event.counter.as_ref() else {
                continue;
            };
            if key.category == category::RISK {
                self.risk.record(&key.condition);
            } else {
                *self
                    .conditions
                    .entry(key.category.clone())
                    .or_default()
                    .entry(key.condition.clone())
                    .or_default() += 1;
            }
        }
    }

    pub fn count(&self, category: &str, condition: &str) -> u64 {
        self.conditions
            .get(category)
            .and_then(|conditions| conditions.get(condition))
            .copied()
            .unwrap_or(0)
    }
}

/// Result of one aggregation call. Derived fresh per call, never shared.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PopulationAggregation {
    pub total_records: usize,
    pub valid_records: usize,
    pub excluded_records: usize,
    pub counters: AggregationCounters,
    pub grade_breakdown: BTreeMap<String, AggregationCounters>,
}

impl PopulationAggregation {
    /// Rounded percentage over the valid record count. Zero when the
    /// cohort is empty; never divides by zero.
    pub fn percentage(&self, count: u64) -> u8 {
        percentage_of(count, self.valid_records as u64)
    }

    /// Every `(category, condition)` pair at or above the 10% reporting
    /// threshold, ranked by prevalence.
    pub fn priority_areas(&self) -> Vec<PriorityArea> {
        let mut areas = Vec::new();
        for (category, conditions) in &self.counters.conditions {
            for (condition, count) in conditions {
                let percentage = self.percentage(*count);
                if percentage < REPORTING_THRESHOLD_PCT {
                    continue;
                }
                areas.push(PriorityArea {
                    category: category.clone(),
                    condition: condition.clone(),
                    count: *count,
                    percentage,
                    severity: AreaSeverity::for_percentage(percentage),
                });
            }
        }
        // Stable sort: ties keep the deterministic category/condition
        // encounter order.
        areas.sort_by(|a, b| b.percentage.cmp(&a.percentage));
        areas
    }
}

pub(crate) fn percentage_of(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

const REPORTING_THRESHOLD_PCT: u8 = 10;

/// Population-level severity bucket for a prevalent condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaSeverity {
    Low,
    Medium,
    High,
}

impl AreaSeverity {
    pub fn for_percentage(percentage: u8) -> Self {
        if percentage >= 25 {
            AreaSeverity::High
        } else if percentage >= 15 {
            AreaSeverity::Medium
        } else {
            AreaSeverity::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AreaSeverity::Low => "Low",
            AreaSeverity::Medium => "Medium",
            AreaSeverity::High => "High",
        }
    }
}

/// A condition whose prevalence crossed the reporting threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityArea {
    pub category: String,
    pub condition: String,
    pub count: u64,
    pub percentage: u8,
    pub severity: AreaSeverity,
}

/// The normalize-then-evaluate step for one record, exposed as a trait so
/// population callers can swap evaluation strategies (and tests can inject
/// faults).
pub trait RecordEvaluator: Send + Sync {
    fn evaluate(&self, record: &RawExamRecord) -> Vec<RuleEvent>;
}

/// Standard pipeline: canonical fact normalization followed by the rule
/// engine.
pub struct DssPipeline {
    normalizer: FactNormalizer,
    engine: RuleEngine,
}

impl DssPipeline {
    pub fn standard() -> Self {
        Self {
            normalizer: FactNormalizer::new(Codebook::default()),
            engine: RuleEngine::standard(),
        }
    }

    pub fn new(normalizer: FactNormalizer, engine: RuleEngine) -> Self {
        Self { normalizer, engine }
    }

    pub fn normalize(&self, record: &RawExamRecord) -> FactMap {
        self.normalizer.normalize(record)
    }

    pub fn run(&self, facts: &FactMap) -> Vec<RuleEvent> {
        self.engine.run(facts)
    }
}

impl RecordEvaluator for DssPipeline {
    fn evaluate(&self, record: &RawExamRecord) -> Vec<RuleEvent> {
        let facts = self.normalize(record);
        self.run(&facts)
    }
}

/// Folds many records into one counters structure under an explicit
/// in-flight bound.
pub struct Aggregator<E: RecordEvaluator + 'static> {
    evaluator: Arc<E>,
    in_flight_limit: usize,
}

impl<E: RecordEvaluator + 'static> Aggregator<E> {
    pub fn new(evaluator: Arc<E>, config: &EngineConfig) -> Self {
        Self {
            evaluator,
            in_flight_limit: config.aggregation_limit.max(1),
        }
    }

    /// Evaluate the cohort and tally counters. A record whose evaluation
    /// panics is logged and excluded; the batch always completes.
    pub async fn aggregate(&self, records: &[RawExamRecord]) -> PopulationAggregation {
        let accumulator = Arc::new(Mutex::new(PopulationAggregation {
            total_records: records.len(),
            ..PopulationAggregation::default()
        }));
        let semaphore = Arc::new(Semaphore::new(self.in_flight_limit));
        let mut tasks = JoinSet::new();

        for record in records.iter().cloned() {
            let evaluator = Arc::clone(&self.evaluator);
            let accumulator = Arc::clone(&accumulator);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let evaluated =
                    catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&record)));

                let mut guard = accumulator
                    .lock()
                    .expect("aggregation accumulator mutex poisoned");
                match evaluated {
                    Ok(events) => {
                        guard.valid_records += 1;
                        guard.counters.fold(&events);
                        guard
                            .grade_breakdown
                            .entry(record.grade_key())
                            .or_default()
                            .fold(&events);
                    }
                    Err(_) => {
                        warn!(
                            record_id = %record.record_id.0,
                            "record evaluation panicked; excluding it from aggregation"
                        );
                        guard.excluded_records += 1;
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        match Arc::try_unwrap(accumulator) {
            Ok(mutex) => mutex
                .into_inner()
                .expect("aggregation accumulator mutex poisoned"),
            Err(shared) => shared
                .lock()
                .expect("aggregation accumulator mutex poisoned")
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dss::facts::source;
    use serde_json::json;

    fn record(id: usize, bmi: &str) -> RawExamRecord {
        RawExamRecord::new(format!("rec-{id}"), format!("student-{id}"))
            .with_finding(source::BMI_FOR_AGE, json!(bmi))
            .with_finding(source::DEWORMED, json!(true))
            .with_finding(source::IMMUNIZATION_COMPLETE, json!(true))
            .with_finding(source::IRON_SUPPLEMENTATION, json!(true))
            .with_finding(source::DECLARED_RISK, json!("Low"))
    }

    fn aggregator() -> Aggregator<DssPipeline> {
        Aggregator::new(Arc::new(DssPipeline::standard()), &EngineConfig::default())
    }

    #[tokio::test]
    async fn empty_cohort_produces_all_zero_aggregation() {
        let aggregation = aggregator().aggregate(&[]).await;

        assert_eq!(aggregation.total_records, 0);
        assert_eq!(aggregation.valid_records, 0);
        assert_eq!(aggregation.percentage(0), 0);
        assert!(aggregation.priority_areas().is_empty());
        assert_eq!(aggregation.counters.risk.total(), 0);
    }

    #[tokio::test]
    async fn severely_underweight_cohort_hits_high_priority() {
        let mut records = Vec::new();
        for id in 0..30 {
            records.push(record(id, "Severely Wasted/Underweight"));
        }
        for id in 30..100 {
            records.push(record(id, "Normal"));
        }

        let aggregation = aggregator().aggregate(&records).await;

        assert_eq!(aggregation.valid_records, 100);
        assert_eq!(
            aggregation
                .counters
                .count(category::NUTRITION, condition::SEVERELY_UNDERWEIGHT),
            30
        );

        let areas = aggregation.priority_areas();
        let area = areas
            .iter()
            .find(|area| area.condition == condition::SEVERELY_UNDERWEIGHT)
            .expect("severely underweight priority area");
        assert_eq!(area.percentage, 30);
        assert_eq!(area.severity, AreaSeverity::High);
    }

    #[tokio::test]
    async fn risk_distribution_accounts_for_every_valid_record() {
        let mut records = Vec::new();
        for (index, declared) in ["Low", "Medium", "High", "garbage", "Urgent", "Low"]
            .iter()
            .enumerate()
        {
            records.push(
                RawExamRecord::new(format!("rec-{index}"), format!("student-{index}"))
                    .with_finding(source::DECLARED_RISK, json!(declared)),
            );
        }

        let aggregation = aggregator().aggregate(&records).await;

        assert_eq!(aggregation.counters.risk.total(), 6);
        assert_eq!(aggregation.counters.risk.low, 2);
        assert_eq!(aggregation.counters.risk.unknown, 1);
        assert_eq!(
            aggregation.counters.risk.total(),
            aggregation.valid_records as u64
        );
    }

    #[tokio::test]
    async fn panicking_record_is_excluded_not_fatal() {
        struct FaultInjector {
            inner: DssPipeline,
        }

        impl RecordEvaluator for FaultInjector {
            fn evaluate(&self, record: &RawExamRecord) -> Vec<RuleEvent> {
                if record.record_id.0 == "rec-poison" {
                    panic!("malformed record");
                }
                self.inner.evaluate(record)
            }
        }

        let mut records: Vec<_> = (0..9).map(|id| record(id, "Normal")).collect();
        records.insert(4, RawExamRecord::new("rec-poison", "student-x"));

        let aggregator = Aggregator::new(
            Arc::new(FaultInjector {
                inner: DssPipeline::standard(),
            }),
            &EngineConfig::default(),
        );
        let aggregation = aggregator.aggregate(&records).await;

        assert_eq!(aggregation.total_records, 10);
        assert_eq!(aggregation.valid_records, 9);
        assert_eq!(aggregation.excluded_records, 1);
        assert_eq!(aggregation.counters.risk.total(), 9);
    }

    #[tokio::test]
    async fn grade_breakdown_mirrors_per_grade_counts() {
        let mut records = Vec::new();
        for id in 0..4 {
            let mut rec = record(id, "Wasted/Underweight");
            rec.grade_level = Some("Grade 1".to_string());
            records.push(rec);
        }
        for id in 4..6 {
            let mut rec = record(id, "Normal");
            rec.grade_level = Some("Grade 2".to_string());
            records.push(rec);
        }

        let aggregation = aggregator().aggregate(&records).await;

        let grade_one = aggregation
            .grade_breakdown
            .get("Grade 1")
            .expect("grade 1 counters");
        assert_eq!(
            grade_one.count(category::NUTRITION, condition::UNDERWEIGHT),
            4
        );
        assert_eq!(grade_one.risk.total(), 4);
        let grade_two = aggregation
            .grade_breakdown
            .get("Grade 2")
            .expect("grade 2 counters");
        assert_eq!(grade_two.count(category::NUTRITION, condition::UNDERWEIGHT), 0);
    }

    #[tokio::test]
    async fn priority_areas_are_sorted_by_percentage_descending() {
        let mut records = Vec::new();
        for id in 0..10 {
            let mut rec = record(id, "Normal");
            if id < 6 {
                rec = rec.with_finding(source::VISION, json!("Failed"));
            }
            if id < 3 {
                rec = rec.with_finding(source::SKIN_SCALP, json!("Lice infestation"));
            }
            records.push(rec);
        }

        let aggregation = aggregator().aggregate(&records).await;
        let areas = aggregation.priority_areas();

        assert!(areas.len() >= 2);
        for pair in areas.windows(2) {
            assert!(pair[0].percentage >= pair[1].percentage);
        }
    }
}
