pub mod aggregate;
pub mod assessment;
pub mod classify;
pub mod facts;
pub mod recommend;
pub mod report;
pub mod router;
pub mod rules;
pub mod service;

pub use aggregate::{Aggregator, DssPipeline, PopulationAggregation, PriorityArea};
pub use assessment::{build_assessment, Assessment, HealthStatus, RiskLevel};
pub use facts::{Codebook, FactMap, FactNormalizer};
pub use report::SchoolHealthReport;
pub use router::dss_router;
pub use rules::{RuleEngine, RuleEvent, RuleSet};
pub use service::{filter_by_category, AssessmentCategory, DecisionSupportService, DssServiceError};
