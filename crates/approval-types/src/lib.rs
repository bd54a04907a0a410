//! Shared types for the approval workflow
//!
//! Wire-level model of the procurement back office: tasks, processes and their
//! ordered steps, per-family approval transactions, and review submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Strongly typed TaskId
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed UserId
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(u64);

impl ProcessId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u64);

impl StepId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while parsing enum values received as free text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown review action: {0}")]
    UnknownAction(String),

    #[error("Unknown task status: {0}")]
    UnknownStatus(String),

    #[error("Unknown linked object family: {0}")]
    UnknownFamily(String),
}

/// The seven business-object families an approval chain can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedFamily {
    MaterialRequest,
    Rfq,
    PurchaseOrder,
    PaymentOrder,
    Invoice,
    BudgetRequest,
    TotalBudget,
}

/// One row of the family table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySpec {
    pub family: LinkedFamily,
    /// Foreign-key column carried by tasks and transactions
    pub id_field: &'static str,
    /// Collection holding this family's approval transactions
    pub transactions_endpoint: &'static str,
    /// Title of the process that defines this family's steps
    pub process_title: &'static str,
}

/// Indexed by `LinkedFamily` discriminant.
pub const FAMILY_TABLE: [FamilySpec; 7] = [
    FamilySpec {
        family: LinkedFamily::MaterialRequest,
        id_field: "material_request_id",
        transactions_endpoint: "mr-approval-transactions",
        process_title: "Material Request",
    },
    FamilySpec {
        family: LinkedFamily::Rfq,
        id_field: "rfq_id",
        transactions_endpoint: "rfq-approval-transactions",
        process_title: "RFQ Approval",
    },
    FamilySpec {
        family: LinkedFamily::PurchaseOrder,
        id_field: "purchase_order_id",
        transactions_endpoint: "po-approval-transactions",
        process_title: "Purchase Order Approval",
    },
    FamilySpec {
        family: LinkedFamily::PaymentOrder,
        id_field: "payment_order_id",
        transactions_endpoint: "payment-order-approval-transactions",
        process_title: "Payment Order Approval",
    },
    FamilySpec {
        family: LinkedFamily::Invoice,
        id_field: "invoice_id",
        transactions_endpoint: "invoice-approval-transactions",
        process_title: "Maharat Invoice Approval",
    },
    FamilySpec {
        family: LinkedFamily::BudgetRequest,
        id_field: "budget_request_id",
        transactions_endpoint: "budget-request-approval-transactions",
        process_title: "Budget Request Approval",
    },
    FamilySpec {
        family: LinkedFamily::TotalBudget,
        id_field: "total_budget_id",
        transactions_endpoint: "total-budget-approval-transactions",
        process_title: "Total Budget Approval",
    },
];

impl LinkedFamily {
    pub const ALL: [LinkedFamily; 7] = [
        LinkedFamily::MaterialRequest,
        LinkedFamily::Rfq,
        LinkedFamily::PurchaseOrder,
        LinkedFamily::PaymentOrder,
        LinkedFamily::Invoice,
        LinkedFamily::BudgetRequest,
        LinkedFamily::TotalBudget,
    ];

    pub fn spec(self) -> &'static FamilySpec {
        &FAMILY_TABLE[self as usize]
    }

    pub fn id_field(self) -> &'static str {
        self.spec().id_field
    }

    pub fn transactions_endpoint(self) -> &'static str {
        self.spec().transactions_endpoint
    }

    pub fn process_title(self) -> &'static str {
        self.spec().process_title
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaterialRequest => "material_request",
            Self::Rfq => "rfq",
            Self::PurchaseOrder => "purchase_order",
            Self::PaymentOrder => "payment_order",
            Self::Invoice => "invoice",
            Self::BudgetRequest => "budget_request",
            Self::TotalBudget => "total_budget",
        }
    }
}

impl fmt::Display for LinkedFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkedFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        LinkedFamily::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == needle || f.id_field() == needle)
            .ok_or_else(|| ParseError::UnknownFamily(s.to_string()))
    }
}

/// Foreign keys into the linked-object families
///
/// Serialised flat, so a task or transaction payload carries e.g.
/// `"purchase_order_id": 12` next to its own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedObjects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_request_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfq_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_order_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_order_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_request_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget_id: Option<u64>,
}

impl LinkedObjects {
    /// A link set carrying exactly one foreign key
    pub fn only(family: LinkedFamily, object_id: u64) -> Self {
        let mut links = Self::default();
        links.set(family, Some(object_id));
        links
    }

    pub fn get(&self, family: LinkedFamily) -> Option<u64> {
        match family {
            LinkedFamily::MaterialRequest => self.material_request_id,
            LinkedFamily::Rfq => self.rfq_id,
            LinkedFamily::PurchaseOrder => self.purchase_order_id,
            LinkedFamily::PaymentOrder => self.payment_order_id,
            LinkedFamily::Invoice => self.invoice_id,
            LinkedFamily::BudgetRequest => self.budget_request_id,
            LinkedFamily::TotalBudget => self.total_budget_id,
        }
    }

    pub fn set(&mut self, family: LinkedFamily, object_id: Option<u64>) {
        let slot = match family {
            LinkedFamily::MaterialRequest => &mut self.material_request_id,
            LinkedFamily::Rfq => &mut self.rfq_id,
            LinkedFamily::PurchaseOrder => &mut self.purchase_order_id,
            LinkedFamily::PaymentOrder => &mut self.payment_order_id,
            LinkedFamily::Invoice => &mut self.invoice_id,
            LinkedFamily::BudgetRequest => &mut self.budget_request_id,
            LinkedFamily::TotalBudget => &mut self.total_budget_id,
        };
        *slot = object_id;
    }

    /// Non-null links in family-table order
    pub fn iter(&self) -> impl Iterator<Item = (LinkedFamily, u64)> + '_ {
        LinkedFamily::ALL
            .iter()
            .filter_map(move |family| self.get(*family).map(|id| (*family, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Task status as stored by the back office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Referred,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Referred => "Referred",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Referred" => Ok(Self::Referred),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// Reviewer decision on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewAction {
    Approve,
    Reject,
    Refer,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Refer => "Refer",
        }
    }

    /// Status the reviewed task ends in
    pub fn terminal_status(&self) -> TaskStatus {
        match self {
            Self::Approve => TaskStatus::Approved,
            Self::Refer => TaskStatus::Referred,
            Self::Reject => TaskStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approve" => Ok(Self::Approve),
            "Reject" => Ok(Self::Reject),
            "Refer" => Ok(Self::Refer),
            other => Err(ParseError::UnknownAction(other.to_string())),
        }
    }
}

/// Why a review submission was refused before anything was written
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewValidationError {
    #[error("description is required")]
    MissingDescription,

    #[error("action is required")]
    MissingAction,

    #[error(transparent)]
    InvalidAction(#[from] ParseError),

    #[error("referred_to_user_id is required when action is Refer")]
    MissingReferralTarget,
}

/// Review form as submitted, not yet validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub referred_to_user_id: Option<UserId>,
}

impl ReviewSubmission {
    pub fn new(description: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            action: action.into(),
            referred_to_user_id: None,
        }
    }

    pub fn referred_to(mut self, user_id: UserId) -> Self {
        self.referred_to_user_id = Some(user_id);
        self
    }

    pub fn validate(&self) -> Result<Review, ReviewValidationError> {
        if self.description.trim().is_empty() {
            return Err(ReviewValidationError::MissingDescription);
        }
        if self.action.trim().is_empty() {
            return Err(ReviewValidationError::MissingAction);
        }

        let action: ReviewAction = self.action.trim().parse()?;
        if action == ReviewAction::Refer && self.referred_to_user_id.is_none() {
            return Err(ReviewValidationError::MissingReferralTarget);
        }

        Ok(Review {
            description: self.description.clone(),
            action,
            referred_to_user_id: self.referred_to_user_id,
        })
    }
}

/// A review that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub description: String,
    pub action: ReviewAction,
    pub referred_to_user_id: Option<UserId>,
}

/// Accepts step orders sent either as numbers or numeric strings
fn de_order<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid step order: {:?}", s))),
    }
}

/// One pending unit of work for one step of one process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub process_id: Option<ProcessId>,
    #[serde(default)]
    pub process_step_id: Option<StepId>,
    #[serde(default)]
    pub assigned_from_user_id: Option<UserId>,
    #[serde(default)]
    pub assigned_to_user_id: Option<UserId>,
    #[serde(default)]
    pub order_no: Option<String>,
    /// As reported by the back office
    #[serde(default)]
    pub assigned_at: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(flatten)]
    pub links: LinkedObjects,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaskDescription {
    pub task_id: TaskId,
    pub description: String,
    pub action: ReviewAction,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_to_user_id: Option<UserId>,
}

/// Audit record of a review, as echoed back by the back office
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub id: u64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub id: StepId,
    pub process_id: ProcessId,
    #[serde(deserialize_with = "de_order")]
    pub order: u32,
    #[serde(default)]
    pub description: String,
}

/// Ordered approval template for one family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub steps: Vec<ProcessStep>,
}

/// Log row recording that one step of a chain was acted upon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTransaction {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(deserialize_with = "de_order")]
    pub order: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub requester_id: Option<UserId>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub referred_to: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalTransaction {
    pub requester_id: UserId,
    pub assigned_to: UserId,
    pub order: String,
    pub description: String,
    pub status: ReviewAction,
    pub referred_to: Option<UserId>,
    #[serde(flatten)]
    pub link: LinkedObjects,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub process_step_id: StepId,
    pub process_id: ProcessId,
    pub assigned_at: DateTime<Utc>,
    pub urgency: String,
    pub assigned_to_user_id: UserId,
    pub assigned_from_user_id: UserId,
    pub read_status: bool,
    pub order_no: String,
    #[serde(flatten)]
    pub link: LinkedObjects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverAssignment {
    #[serde(default)]
    pub approver_id: Option<UserId>,
}

/// A review queued for asynchronous processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub request_id: Uuid,
    pub task_id: TaskId,
    pub requested_by: UserId,
    pub submission: ReviewSubmission,
    pub submitted_at: DateTime<Utc>,
    /// Result summary once the request has been handled
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    pub fn new(task_id: TaskId, requested_by: UserId, submission: ReviewSubmission) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            task_id,
            requested_by,
            submission,
            submitted_at: Utc::now(),
            result: None,
            error: None,
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_family_table_indexed_by_discriminant() {
        for family in LinkedFamily::ALL {
            assert_eq!(family.spec().family, family);
        }
        assert_eq!(LinkedFamily::PurchaseOrder.transactions_endpoint(), "po-approval-transactions");
        assert_eq!(LinkedFamily::Invoice.process_title(), "Maharat Invoice Approval");
        assert_eq!(LinkedFamily::MaterialRequest.process_title(), "Material Request");
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("rfq".parse::<LinkedFamily>().unwrap(), LinkedFamily::Rfq);
        assert_eq!("payment_order_id".parse::<LinkedFamily>().unwrap(), LinkedFamily::PaymentOrder);
        assert!("warehouse".parse::<LinkedFamily>().is_err());
    }

    #[test]
    fn test_status_mapping_is_total() {
        assert_eq!(ReviewAction::Approve.terminal_status(), TaskStatus::Approved);
        assert_eq!(ReviewAction::Refer.terminal_status(), TaskStatus::Referred);
        assert_eq!(ReviewAction::Reject.terminal_status(), TaskStatus::Rejected);
        assert!("Escalate".parse::<ReviewAction>().is_err());
        assert!("approve".parse::<ReviewAction>().is_err());
    }

    #[test]
    fn test_review_validation() {
        assert_eq!(
            ReviewSubmission::new("", "Approve").validate(),
            Err(ReviewValidationError::MissingDescription)
        );
        assert_eq!(
            ReviewSubmission::new("looks fine", "  ").validate(),
            Err(ReviewValidationError::MissingAction)
        );
        assert_eq!(
            ReviewSubmission::new("please check", "Refer").validate(),
            Err(ReviewValidationError::MissingReferralTarget)
        );
        assert!(matches!(
            ReviewSubmission::new("hm", "Escalate").validate(),
            Err(ReviewValidationError::InvalidAction(ParseError::UnknownAction(_)))
        ));

        let review = ReviewSubmission::new("please check", "Refer")
            .referred_to(UserId::new(9))
            .validate()
            .unwrap();
        assert_eq!(review.action, ReviewAction::Refer);
        assert_eq!(review.referred_to_user_id, Some(UserId::new(9)));
    }

    #[test]
    fn test_task_parses_flat_links() {
        let task: Task = serde_json::from_value(json!({
            "id": 5,
            "process_id": 2,
            "status": "Pending",
            "material_request_id": 42,
            "invoice_id": null,
            "urgency": "High"
        }))
        .unwrap();

        assert_eq!(task.id, TaskId::new(5));
        assert_eq!(task.links.get(LinkedFamily::MaterialRequest), Some(42));
        assert_eq!(task.links.get(LinkedFamily::Invoice), None);
        assert_eq!(task.links.iter().collect::<Vec<_>>(), vec![(LinkedFamily::MaterialRequest, 42)]);
    }

    #[test]
    fn test_transaction_order_accepts_strings() {
        let tx: ApprovalTransaction = serde_json::from_value(json!({"order": "2", "status": "Approve"})).unwrap();
        assert_eq!(tx.order, 2);

        let tx: ApprovalTransaction = serde_json::from_value(json!({"order": 3})).unwrap();
        assert_eq!(tx.order, 3);

        assert!(serde_json::from_value::<ApprovalTransaction>(json!({"order": "first"})).is_err());
    }

    #[test]
    fn test_new_transaction_carries_single_family_key() {
        let tx = NewApprovalTransaction {
            requester_id: UserId::new(1),
            assigned_to: UserId::new(2),
            order: "2".to_string(),
            description: "Finance".to_string(),
            status: ReviewAction::Approve,
            referred_to: None,
            link: LinkedObjects::only(LinkedFamily::PurchaseOrder, 12),
        };

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["purchase_order_id"], 12);
        assert_eq!(value["status"], "Approve");
        assert_eq!(value["order"], "2");
        assert!(value["referred_to"].is_null());
        assert!(value.get("invoice_id").is_none());
    }
}
