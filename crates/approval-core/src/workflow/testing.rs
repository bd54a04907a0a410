//! In-memory back office used by unit tests

use super::traits::ApprovalBackend;
use crate::error::{MaharatError, Result};
use approval_types::{
    ApprovalTransaction, LinkedFamily, LinkedObjects, NewApprovalTransaction, NewTask,
    NewTaskDescription, Process, ProcessId, ProcessStep, StepId, Task, TaskDescription, TaskId,
    TaskStatus, UserId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub enum StatusFailure {
    NoMainBudget(String),
    Generic,
}

#[derive(Default)]
struct State {
    tasks: HashMap<TaskId, Task>,
    processes: Vec<Process>,
    transactions: HashMap<(LinkedFamily, u64), Vec<ApprovalTransaction>>,
    hidden_claims: HashSet<(LinkedFamily, u64, u32)>,
    approvers: HashMap<StepId, UserId>,
    default_approver: Option<UserId>,
    failing_families: HashSet<LinkedFamily>,
    status_failure: Option<StatusFailure>,
    yield_on_reads: bool,

    descriptions: Vec<NewTaskDescription>,
    created_transactions: Vec<(LinkedFamily, NewApprovalTransaction)>,
    created_tasks: Vec<NewTask>,
    status_updates: Vec<(TaskId, TaskStatus)>,
    reads: usize,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_task(&self, task: Task) {
        self.state.lock().unwrap().tasks.insert(task.id, task);
    }

    pub fn add_process(&self, process: Process) {
        self.state.lock().unwrap().processes.push(process);
    }

    pub fn set_default_approver(&self, approver: UserId) {
        self.state.lock().unwrap().default_approver = Some(approver);
    }

    pub fn set_approver(&self, step: StepId, approver: UserId) {
        self.state.lock().unwrap().approvers.insert(step, approver);
    }

    pub fn seed_transactions(&self, family: LinkedFamily, object_id: u64, orders: &[u32]) {
        let mut state = self.state.lock().unwrap();
        let rows = state.transactions.entry((family, object_id)).or_default();
        for order in orders {
            rows.push(ApprovalTransaction {
                id: None,
                order: *order,
                status: Some("Approve".to_string()),
                requester_id: None,
                assigned_to: None,
                referred_to: None,
            });
        }
    }

    /// Another process claims `order` without it showing up in listings yet
    pub fn claim_behind_our_back(&self, family: LinkedFamily, object_id: u64, order: u32) {
        self.state.lock().unwrap().hidden_claims.insert((family, object_id, order));
    }

    pub fn fail_transactions_for(&self, family: LinkedFamily) {
        self.state.lock().unwrap().failing_families.insert(family);
    }

    pub fn fail_status_update(&self, failure: StatusFailure) {
        self.state.lock().unwrap().status_failure = Some(failure);
    }

    pub fn yield_on_reads(&self) {
        self.state.lock().unwrap().yield_on_reads = true;
    }

    pub fn descriptions(&self) -> Vec<NewTaskDescription> {
        self.state.lock().unwrap().descriptions.clone()
    }

    pub fn created_transactions(&self) -> Vec<(LinkedFamily, NewApprovalTransaction)> {
        self.state.lock().unwrap().created_transactions.clone()
    }

    pub fn created_tasks(&self) -> Vec<NewTask> {
        self.state.lock().unwrap().created_tasks.clone()
    }

    pub fn status_updates(&self) -> Vec<(TaskId, TaskStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn total_writes(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.descriptions.len()
            + state.created_transactions.len()
            + state.created_tasks.len()
            + state.status_updates.len()
    }

    pub fn total_reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    async fn read(&self) {
        let should_yield = {
            let mut state = self.state.lock().unwrap();
            state.reads += 1;
            state.yield_on_reads
        };
        if should_yield {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ApprovalBackend for FakeBackend {
    async fn load_task(&self, task_id: TaskId) -> Result<Task> {
        self.read().await;
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| MaharatError::NotFound(format!("task {}", task_id)))
    }

    async fn create_task_description(&self, description: &NewTaskDescription) -> Result<TaskDescription> {
        let mut state = self.state.lock().unwrap();
        state.descriptions.push(description.clone());
        Ok(TaskDescription {
            id: state.next_id(),
            action: Some(description.action.to_string()),
            user_id: Some(description.user_id),
        })
    }

    async fn find_process(&self, title: &str) -> Result<Option<Process>> {
        self.read().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .processes
            .iter()
            .find(|p| p.title.as_deref() == Some(title))
            .cloned())
    }

    async fn list_transactions(&self, family: LinkedFamily, object_id: u64) -> Result<Vec<ApprovalTransaction>> {
        self.read().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .get(&(family, object_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_approver(&self, step: StepId, _requester: UserId) -> Result<Option<UserId>> {
        self.read().await;
        let state = self.state.lock().unwrap();
        Ok(state.approvers.get(&step).copied().or(state.default_approver))
    }

    async fn create_transaction(&self, family: LinkedFamily, transaction: &NewApprovalTransaction) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if state.failing_families.contains(&family) {
            return Err(MaharatError::Api {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }

        let object_id = transaction
            .link
            .get(family)
            .ok_or_else(|| MaharatError::Workflow(format!("transaction without {}", family.id_field())))?;
        let order: u32 = transaction
            .order
            .parse()
            .map_err(|_| MaharatError::Workflow(format!("bad order {}", transaction.order)))?;

        let taken = state.hidden_claims.contains(&(family, object_id, order))
            || state
                .transactions
                .get(&(family, object_id))
                .map(|rows| rows.iter().any(|row| row.order == order))
                .unwrap_or(false);
        if taken {
            return Err(MaharatError::OrderClaimed { family, object_id, order });
        }

        let id = state.next_id();
        state
            .transactions
            .entry((family, object_id))
            .or_default()
            .push(ApprovalTransaction {
                id: Some(id),
                order,
                status: Some(transaction.status.to_string()),
                requester_id: Some(transaction.requester_id),
                assigned_to: Some(transaction.assigned_to),
                referred_to: transaction.referred_to,
            });
        state.created_transactions.push((family, transaction.clone()));
        Ok(id)
    }

    async fn create_task(&self, task: &NewTask) -> Result<TaskId> {
        let mut state = self.state.lock().unwrap();
        state.created_tasks.push(task.clone());
        Ok(TaskId::new(state.next_id()))
    }

    async fn update_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = &state.status_failure {
            return Err(match failure {
                StatusFailure::NoMainBudget(message) => MaharatError::NoMainBudget {
                    message: message.clone(),
                    partial: None,
                },
                StatusFailure::Generic => MaharatError::Api {
                    status: 500,
                    body: "Internal Server Error".to_string(),
                },
            });
        }

        state.status_updates.push((task_id, status));
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.status = status;
        }
        Ok(())
    }
}

pub fn process(id: u64, title: &str, steps: &[(u64, u32, &str)]) -> Process {
    Process {
        id: ProcessId::new(id),
        title: Some(title.to_string()),
        steps: steps
            .iter()
            .map(|(step_id, order, description)| ProcessStep {
                id: StepId::new(*step_id),
                process_id: ProcessId::new(id),
                order: *order,
                description: description.to_string(),
            })
            .collect(),
    }
}

pub fn task_linked_to(id: u64, family: LinkedFamily, object_id: u64) -> Task {
    Task {
        id: TaskId::new(id),
        process_id: None,
        process_step_id: None,
        assigned_from_user_id: None,
        assigned_to_user_id: None,
        order_no: Some("1".to_string()),
        assigned_at: None,
        urgency: Some("Normal".to_string()),
        status: TaskStatus::Pending,
        links: LinkedObjects::only(family, object_id),
    }
}
