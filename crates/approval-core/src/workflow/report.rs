//! Structured outcome of one advancement
//! Every family touched by a review is accounted for, including the ones that failed

use approval_types::{LinkedFamily, ReviewAction, TaskId, TaskStatus, UserId};
use serde::{Deserialize, Serialize};

/// Why a family's chain was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No process carries the family's title
    NoProcess,
    /// The process exists but defines no steps
    EmptyProcess,
    /// Every step order already has a transaction
    ChainComplete,
    /// Approver resolution named nobody
    NoApprover,
    /// Referrals are recorded but do not move the chain
    ReferralNotAdvanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FamilyOutcome {
    Advanced {
        order: u32,
        approver: UserId,
        transaction_id: u64,
        task_id: TaskId,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyReport {
    pub family: LinkedFamily,
    pub object_id: u64,
    #[serde(flatten)]
    pub outcome: FamilyOutcome,
}

/// Result of running one review through the advancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceReport {
    pub task_id: TaskId,
    pub description_id: u64,
    pub action: ReviewAction,
    pub families: Vec<FamilyReport>,
    /// Set once the reviewed task's status update went through
    pub task_status: Option<TaskStatus>,
}

impl AdvanceReport {
    pub fn new(task_id: TaskId, description_id: u64, action: ReviewAction) -> Self {
        Self {
            task_id,
            description_id,
            action,
            families: Vec::new(),
            task_status: None,
        }
    }

    pub fn record(&mut self, family: LinkedFamily, object_id: u64, outcome: FamilyOutcome) {
        self.families.push(FamilyReport {
            family,
            object_id,
            outcome,
        });
    }

    pub fn outcome_for(&self, family: LinkedFamily) -> Option<&FamilyOutcome> {
        self.families
            .iter()
            .find(|r| r.family == family)
            .map(|r| &r.outcome)
    }

    pub fn advanced_count(&self) -> usize {
        self.families
            .iter()
            .filter(|r| matches!(r.outcome, FamilyOutcome::Advanced { .. }))
            .count()
    }

    pub fn failed(&self) -> Vec<&FamilyReport> {
        self.families
            .iter()
            .filter(|r| matches!(r.outcome, FamilyOutcome::Failed { .. }))
            .collect()
    }

    /// One-line summary for logs and inbox results
    pub fn summary(&self) -> String {
        let skipped = self
            .families
            .iter()
            .filter(|r| matches!(r.outcome, FamilyOutcome::Skipped { .. }))
            .count();

        format!(
            "Task {} {}: {} advanced, {} skipped, {} failed, status {}",
            self.task_id,
            self.action,
            self.advanced_count(),
            skipped,
            self.failed().len(),
            self.task_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unchanged".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_and_summary() {
        let mut report = AdvanceReport::new(TaskId::new(7), 99, ReviewAction::Approve);
        report.record(
            LinkedFamily::PurchaseOrder,
            12,
            FamilyOutcome::Advanced {
                order: 2,
                approver: UserId::new(4),
                transaction_id: 501,
                task_id: TaskId::new(8),
            },
        );
        report.record(
            LinkedFamily::Invoice,
            3,
            FamilyOutcome::Failed {
                error: "HTTP 500".to_string(),
            },
        );
        report.record(
            LinkedFamily::Rfq,
            5,
            FamilyOutcome::Skipped {
                reason: SkipReason::ChainComplete,
            },
        );
        report.task_status = Some(TaskStatus::Approved);

        assert_eq!(report.advanced_count(), 1);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(
            report.outcome_for(LinkedFamily::Rfq),
            Some(&FamilyOutcome::Skipped {
                reason: SkipReason::ChainComplete
            })
        );
        assert_eq!(
            report.summary(),
            "Task 7 Approve: 1 advanced, 1 skipped, 1 failed, status Approved"
        );
    }

    #[test]
    fn test_family_report_serializes_flat() {
        let report = FamilyReport {
            family: LinkedFamily::MaterialRequest,
            object_id: 42,
            outcome: FamilyOutcome::Skipped {
                reason: SkipReason::NoApprover,
            },
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["family"], "material_request");
        assert_eq!(value["outcome"], "skipped");
        assert_eq!(value["reason"], "no_approver");
    }
}
