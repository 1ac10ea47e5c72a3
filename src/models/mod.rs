pub mod capture;
pub mod message;
pub mod submission;

pub use capture::{CaptureMethod, CaptureRecord};
pub use message::{CaptureRequest, InboundMessage, Measurements};
pub use submission::{FallbackTier, GradingPayload, Submission};
