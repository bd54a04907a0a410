//! Approval workflow advancer
//!
//! Runs one review through the back office: records the reviewer's decision,
//! moves every linked approval chain forward by at most one step, then sets
//! the reviewed task's terminal status.

use super::claims::ClaimRegistry;
use super::next_step::{completed_orders, next_step, stray_orders};
use super::report::{AdvanceReport, FamilyOutcome, SkipReason};
use super::traits::ApprovalBackend;
use crate::config::WorkflowConfig;
use crate::error::{MaharatError, Result};
use approval_types::{
    LinkedFamily, LinkedObjects, NewApprovalTransaction, NewTask, NewTaskDescription, Review,
    ReviewAction, ReviewSubmission, Task, UserId,
};
use chrono::Utc;

pub struct ApprovalWorkflowAdvancer<B: ApprovalBackend> {
    backend: B,
    workflow: WorkflowConfig,
    claims: ClaimRegistry,
}

impl<B: ApprovalBackend> ApprovalWorkflowAdvancer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, WorkflowConfig::default())
    }

    pub fn with_config(backend: B, workflow: WorkflowConfig) -> Self {
        Self {
            backend,
            workflow,
            claims: ClaimRegistry::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Apply `submission` by `requester` to `task`
    ///
    /// Nothing is written when the submission fails validation. Writes are
    /// ordered: the task description, then each linked chain in family-table
    /// order, then the status update. A failing chain is reported in the
    /// returned report and does not stop the others. Nothing is rolled back.
    pub async fn advance(
        &self,
        task: &Task,
        submission: &ReviewSubmission,
        requester: UserId,
    ) -> Result<AdvanceReport> {
        let review = submission.validate()?;

        log::info!(
            "Advancing task {} with action {} requested by user {}",
            task.id, review.action, requester
        );

        let description = self.backend
            .create_task_description(&NewTaskDescription {
                task_id: task.id,
                description: review.description.clone(),
                action: review.action,
                user_id: requester,
                referred_to_user_id: review.referred_to_user_id,
            })
            .await?;

        log::debug!("Recorded description {} for task {}", description.id, task.id);

        let mut report = AdvanceReport::new(task.id, description.id, review.action);

        if task.links.is_empty() {
            log::info!("Task {} carries no linked objects", task.id);
        }

        for (family, object_id) in task.links.iter() {
            let outcome = match self.advance_chain(family, object_id, &review, requester).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Failed to advance {} {} for task {}: {}", family, object_id, task.id, e);
                    FamilyOutcome::Failed { error: e.to_string() }
                }
            };
            report.record(family, object_id, outcome);
        }

        let status = review.action.terminal_status();
        match self.backend.update_task_status(task.id, status).await {
            Ok(()) => {
                report.task_status = Some(status);
                log::info!("{}", report.summary());
                Ok(report)
            }
            Err(MaharatError::NoMainBudget { message, .. }) => {
                log::warn!("Task {} status update refused: {}", task.id, message);
                Err(MaharatError::NoMainBudget {
                    message,
                    partial: Some(Box::new(report)),
                })
            }
            Err(e) => {
                log::error!("Failed to update status of task {}: {} ({})", task.id, e, report.summary());
                Err(MaharatError::Workflow(format!(
                    "Failed to update status of task {} to {}: {}",
                    task.id, status, e
                )))
            }
        }
    }

    /// Move one linked object's chain forward by one step
    async fn advance_chain(
        &self,
        family: LinkedFamily,
        object_id: u64,
        review: &Review,
        requester: UserId,
    ) -> Result<FamilyOutcome> {
        // Referrals are recorded but never move the chain
        if review.action == ReviewAction::Refer {
            log::info!("Referral on {} {} leaves the chain in place", family, object_id);
            return Ok(FamilyOutcome::Skipped { reason: SkipReason::ReferralNotAdvanced });
        }

        let title = self.workflow.process_title(family);
        let process = match self.backend.find_process(title).await? {
            Some(process) => process,
            None => {
                log::warn!("No process titled '{}', skipping {} {}", title, family, object_id);
                return Ok(FamilyOutcome::Skipped { reason: SkipReason::NoProcess });
            }
        };

        if process.steps.is_empty() {
            log::warn!("Process '{}' has no steps, skipping {} {}", title, family, object_id);
            return Ok(FamilyOutcome::Skipped { reason: SkipReason::EmptyProcess });
        }

        // Held until the transaction for the chosen order is written
        let _claim = self.claims.acquire(family, object_id).await;

        let transactions = self.backend.list_transactions(family, object_id).await?;
        let completed = completed_orders(&transactions);

        let stray = stray_orders(&process.steps, &completed);
        if !stray.is_empty() {
            log::warn!(
                "{} {} has transactions for orders {:?} not defined by '{}'",
                family, object_id, stray, title
            );
        }

        let step = match next_step(&process.steps, &completed) {
            Some(step) => step,
            None => {
                log::info!("{} {} has completed all {} steps", family, object_id, process.steps.len());
                return Ok(FamilyOutcome::Skipped { reason: SkipReason::ChainComplete });
            }
        };

        let approver = match self.backend.resolve_approver(step.id, requester).await? {
            Some(approver) => approver,
            None => {
                log::warn!(
                    "No approver for step {} (order {}) of {} {}",
                    step.id, step.order, family, object_id
                );
                return Ok(FamilyOutcome::Skipped { reason: SkipReason::NoApprover });
            }
        };

        let transaction_id = self.backend
            .create_transaction(family, &NewApprovalTransaction {
                requester_id: requester,
                assigned_to: approver,
                order: step.order.to_string(),
                description: step.description.clone(),
                status: review.action,
                referred_to: review.referred_to_user_id,
                link: LinkedObjects::only(family, object_id),
            })
            .await?;

        log::info!(
            "Recorded transaction {} for {} {} order {}",
            transaction_id, family, object_id, step.order
        );

        let task_id = self.backend
            .create_task(&NewTask {
                process_step_id: step.id,
                process_id: step.process_id,
                assigned_at: Utc::now(),
                urgency: self.workflow.urgency.clone(),
                assigned_to_user_id: approver,
                assigned_from_user_id: requester,
                read_status: false,
                order_no: step.order.to_string(),
                link: LinkedObjects::only(family, object_id),
            })
            .await
            .map_err(|e| MaharatError::Workflow(format!(
                "transaction {} recorded for order {} but the next task was not created: {}",
                transaction_id, step.order, e
            )))?;

        log::info!("Assigned task {} to user {} for {} {}", task_id, approver, family, object_id);

        Ok(FamilyOutcome::Advanced {
            order: step.order,
            approver,
            transaction_id,
            task_id,
        })
    }
}
