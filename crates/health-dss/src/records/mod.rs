pub mod domain;
pub mod import;
pub mod store;

pub use domain::{RawExamRecord, RecordFilters, RecordId};
pub use import::{ExamRecordImporter, ImportError};
pub use store::{
    HealthNotification, NotificationPublisher, NotifyError, RecordStore, StoreError,
};
