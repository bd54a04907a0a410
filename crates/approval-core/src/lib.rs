//! Maharat Approval Core
//!
//! Advances the approval chains linked to a reviewed task: records the review,
//! assigns the next step of every linked chain, and settles the task's status.

pub mod clients;
pub mod config;
pub mod error;
pub mod paths;
pub mod workflow;

pub use approval_types;

pub use clients::MaharatApiClient;
pub use config::{ApiConfig, InboxConfig, MaharatConfig, WorkflowConfig};
pub use error::{MaharatError, Result};

pub use workflow::{
    AdvanceReport,
    ApprovalBackend,
    ApprovalWorkflowAdvancer,
    ClaimRegistry,
    FamilyOutcome,
    FamilyReport,
    ReviewInbox,
    ReviewState,
    ReviewWorker,
    SkipReason,
};
