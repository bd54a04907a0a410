//! Approval workflow: chain advancement and the review inbox

pub mod advancer;
pub mod claims;
pub mod next_step;
pub mod report;
pub mod review_inbox;
pub mod review_worker;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use advancer::ApprovalWorkflowAdvancer;
pub use claims::ClaimRegistry;
pub use next_step::next_step;
pub use report::{AdvanceReport, FamilyOutcome, FamilyReport, SkipReason};
pub use review_inbox::{ReviewInbox, ReviewState, StateCountMap};
pub use review_worker::ReviewWorker;
pub use traits::ApprovalBackend;
