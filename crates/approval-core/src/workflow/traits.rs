//! Back-office operations the advancer depends on

use async_trait::async_trait;
use crate::error::Result;
use approval_types::{
    ApprovalTransaction, LinkedFamily, NewApprovalTransaction, NewTask, NewTaskDescription,
    Process, StepId, Task, TaskDescription, TaskId, TaskStatus, UserId,
};

/// Every read and write the approval workflow performs against the back office
///
/// Each method is one REST call. Implementations must not retry writes: a
/// duplicate transaction is a second claim on the same step.
#[async_trait]
pub trait ApprovalBackend: Send + Sync {
    /// Load a task with its linked-object keys
    async fn load_task(&self, task_id: TaskId) -> Result<Task>;

    /// Persist the reviewer's note and decision
    async fn create_task_description(&self, description: &NewTaskDescription) -> Result<TaskDescription>;

    /// Find the process with this title, steps included. `None` if there is none.
    async fn find_process(&self, title: &str) -> Result<Option<Process>>;

    /// All transactions recorded so far for one linked object
    async fn list_transactions(&self, family: LinkedFamily, object_id: u64) -> Result<Vec<ApprovalTransaction>>;

    /// Who approves `step` when `requester` is asking. `None` if nobody does.
    async fn resolve_approver(&self, step: StepId, requester: UserId) -> Result<Option<UserId>>;

    /// Conditional insert keyed on (object, order). Fails with
    /// `MaharatError::OrderClaimed` when that order already has a row.
    async fn create_transaction(&self, family: LinkedFamily, transaction: &NewApprovalTransaction) -> Result<u64>;

    /// Create the next assignment, returning its id
    async fn create_task(&self, task: &NewTask) -> Result<TaskId>;

    /// Move a task to its terminal status
    async fn update_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<()>;
}
