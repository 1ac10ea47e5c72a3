pub mod arbitrator;
pub mod assessment_api;
pub mod backup_store;
pub mod capture_sink;
pub mod observers;
pub mod state_token;

pub use arbitrator::Arbitrator;
pub use assessment_api::{AssessmentService, HttpAssessmentClient};
pub use backup_store::BackupStore;
pub use capture_sink::CaptureSink;
pub use state_token::{StateToken, StateTokenParser};
