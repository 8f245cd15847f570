pub mod config;
pub mod dss;
pub mod error;
pub mod records;
pub mod telemetry;
