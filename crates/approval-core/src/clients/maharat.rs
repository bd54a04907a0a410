//! REST client for the Maharat back office

use crate::config::ApiConfig;
use crate::error::{MaharatError, Result};
use crate::workflow::ApprovalBackend;
use approval_types::{
    ApprovalTransaction, ApproverAssignment, LinkedFamily, NewApprovalTransaction, NewTask,
    NewTaskDescription, Process, StepId, Task, TaskDescription, TaskId, TaskStatus,
    TaskStatusUpdate, UserId,
};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const NO_MAIN_BUDGET: &str = "NO_MAIN_BUDGET";

#[derive(Deserialize)]
struct Created {
    id: u64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct MaharatApiClient {
    config: ApiConfig,
    http_client: HttpClient,
}

impl MaharatApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http_client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client
            .get(self.url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(self.url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.http_client
            .put(self.url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
    }

    /// Body of a successful response, with any `{"data": ...}` envelope removed
    async fn read_data<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        let body: Value = response.json().await?;
        serde_json::from_value(unwrap_envelope(body)).map_err(|e| {
            MaharatError::Deserialization(format!("Unexpected {} response ({}): {}", what, status, e))
        })
    }

    async fn api_error(response: Response) -> MaharatError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        MaharatError::Api { status, body }
    }
}

/// Back-office responses come either bare or as `{"data": ...}`
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

/// `Some(message)` when the body is the back office's missing-main-budget refusal
pub fn no_main_budget_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    if parsed.error.as_deref() != Some(NO_MAIN_BUDGET) {
        return None;
    }
    Some(parsed.message.unwrap_or_else(|| NO_MAIN_BUDGET.to_string()))
}

#[async_trait]
impl ApprovalBackend for MaharatApiClient {
    async fn load_task(&self, task_id: TaskId) -> Result<Task> {
        let response = self.get(&format!("tasks/{}", task_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(MaharatError::NotFound(format!("task {}", task_id))),
            s if s.is_success() => Self::read_data(response, "task").await,
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn create_task_description(&self, description: &NewTaskDescription) -> Result<TaskDescription> {
        log::debug!("Recording {} description for task {}", description.action, description.task_id);

        let response = self.post("task-descriptions").json(description).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Self::read_data(response, "task description").await
    }

    async fn find_process(&self, title: &str) -> Result<Option<Process>> {
        let response = self
            .get("processes")
            .query(&[("filter[title]", title), ("include", "steps")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let processes: Vec<Process> = Self::read_data(response, "process list").await?;
        // An untitled row is trusted to match the filter; a row titled for another family never is
        let process = processes
            .iter()
            .find(|p| p.title.as_deref() == Some(title))
            .or_else(|| processes.iter().find(|p| p.title.is_none()))
            .cloned();

        if process.is_none() && !processes.is_empty() {
            log::warn!("No process among {} returned rows is titled '{}'", processes.len(), title);
        }
        Ok(process)
    }

    async fn list_transactions(&self, family: LinkedFamily, object_id: u64) -> Result<Vec<ApprovalTransaction>> {
        let filter = format!("filter[{}]", family.id_field());
        let response = self
            .get(family.transactions_endpoint())
            .query(&[(filter.as_str(), object_id.to_string().as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Self::read_data(response, "transaction list").await
    }

    async fn resolve_approver(&self, step: StepId, requester: UserId) -> Result<Option<UserId>> {
        let response = self
            .get(&format!("process-steps/{}/approver/{}", step, requester))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let assignment: ApproverAssignment = Self::read_data(response, "approver").await?;
                Ok(assignment.approver_id)
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn create_transaction(&self, family: LinkedFamily, transaction: &NewApprovalTransaction) -> Result<u64> {
        let response = self
            .post(family.transactions_endpoint())
            .json(transaction)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(MaharatError::OrderClaimed {
                family,
                object_id: transaction.link.get(family).unwrap_or_default(),
                order: transaction.order.parse().unwrap_or_default(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let created: Created = Self::read_data(response, "transaction").await?;
        Ok(created.id)
    }

    async fn create_task(&self, task: &NewTask) -> Result<TaskId> {
        let response = self.post("tasks").json(task).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let created: Created = Self::read_data(response, "task").await?;
        Ok(TaskId::new(created.id))
    }

    async fn update_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<()> {
        let response = self
            .put(&format!("tasks/{}", task_id))
            .json(&TaskStatusUpdate { status })
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Task {} set to {}", task_id, status);
            return Ok(());
        }

        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match no_main_budget_message(&body) {
            Some(message) => Err(MaharatError::NoMainBudget { message, partial: None }),
            None => Err(MaharatError::Api { status: code, body }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope() {
        assert_eq!(unwrap_envelope(json!({"data": [1, 2]})), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!({"id": 3})), json!({"id": 3}));
    }

    #[test]
    fn test_no_main_budget_message() {
        let body = r#"{"error":"NO_MAIN_BUDGET","message":"No main budget defined for 2025"}"#;
        assert_eq!(no_main_budget_message(body).as_deref(), Some("No main budget defined for 2025"));
        assert_eq!(no_main_budget_message(r#"{"error":"OTHER"}"#), None);
        assert_eq!(no_main_budget_message("<html>502</html>"), None);
    }

    #[test]
    fn test_url_joining() {
        let client = MaharatApiClient::new(ApiConfig {
            base_url: "https://erp.example.com/api/".to_string(),
            token: "t".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.url("tasks/7"), "https://erp.example.com/api/tasks/7");
    }
}
