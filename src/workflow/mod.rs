pub mod capture_orchestrator;
pub mod question_ctx;
pub mod question_session;
pub mod retry_policy;
pub mod runtime;
pub mod submission_pipeline;

pub use capture_orchestrator::CaptureOrchestrator;
pub use question_ctx::QuestionCtx;
pub use question_session::{QuestionSession, ServiceOutcome, SessionStatus};
pub use retry_policy::{Growth, RetryPolicy};
pub use runtime::CaptureRuntime;
pub use submission_pipeline::{SubmissionPipeline, SubmissionReceipt};
