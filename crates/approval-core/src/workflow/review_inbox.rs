//! File-backed inbox of review submissions
//! One JSON file per request, the directory it sits in is its state

use super::report::AdvanceReport;
use crate::error::{MaharatError, Result};
use crate::paths;
use approval_types::{ReviewRequest, ReviewSubmission, TaskId, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Processed,
    Failed,
}

impl ReviewState {
    pub const ALL: [ReviewState; 3] = [ReviewState::Pending, ReviewState::Processed, ReviewState::Failed];

    pub fn directory_name(&self) -> &'static str {
        match self {
            ReviewState::Pending => paths::PENDING_DIR_NAME,
            ReviewState::Processed => paths::PROCESSED_DIR_NAME,
            ReviewState::Failed => paths::FAILED_DIR_NAME,
        }
    }
}

pub type StateCountMap = BTreeMap<ReviewState, usize>;

pub struct ReviewInbox {
    root_path: PathBuf,
}

impl ReviewInbox {
    /// Open the inbox at `root_path`, creating the state directories
    pub fn new<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        for state in ReviewState::ALL {
            fs::create_dir_all(root_path.join(state.directory_name()))?;
        }

        Ok(Self { root_path })
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn state_dir(&self, state: ReviewState) -> PathBuf {
        self.root_path.join(state.directory_name())
    }

    fn request_path(&self, state: ReviewState, request_id: &Uuid) -> PathBuf {
        self.state_dir(state).join(paths::review_file_name(request_id))
    }

    fn find_request_path(&self, request_id: &Uuid) -> Option<(PathBuf, ReviewState)> {
        ReviewState::ALL.iter().find_map(|state| {
            let path = self.request_path(*state, request_id);
            path.exists().then_some((path, *state))
        })
    }

    fn write_request(&self, path: &Path, request: &ReviewRequest) -> Result<()> {
        let json = serde_json::to_string_pretty(request)
            .map_err(|e| MaharatError::Serialization(format!("Failed to serialize review request: {}", e)))?;

        // Write then rename so a watcher never sees a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read one request file, wherever it lives
    pub fn read_request(&self, path: &Path) -> Result<ReviewRequest> {
        let json = fs::read_to_string(path)?;

        serde_json::from_str(&json)
            .map_err(|e| MaharatError::Deserialization(format!("Failed to deserialize review request: {}", e)))
    }

    /// Queue a review; nothing is validated until the request is processed
    pub fn submit(&self, task_id: TaskId, requested_by: UserId, submission: ReviewSubmission) -> Result<Uuid> {
        let request = ReviewRequest::new(task_id, requested_by, submission);
        let path = self.request_path(ReviewState::Pending, &request.request_id);

        self.write_request(&path, &request)?;

        log::info!("Queued review {} for task {}", request.request_id, task_id);
        Ok(request.request_id)
    }

    pub fn get(&self, request_id: &Uuid) -> Result<Option<(ReviewRequest, ReviewState)>> {
        match self.find_request_path(request_id) {
            Some((path, state)) => Ok(Some((self.read_request(&path)?, state))),
            None => Ok(None),
        }
    }

    /// Pending requests, oldest first; unreadable files are skipped
    pub fn list_pending(&self) -> Result<Vec<ReviewRequest>> {
        let mut requests = Vec::new();

        for entry in fs::read_dir(self.state_dir(ReviewState::Pending))? {
            let path = entry?.path();
            if !is_request_file(&path) {
                continue;
            }
            match self.read_request(&path) {
                Ok(request) => requests.push(request),
                Err(e) => log::warn!("Skipping unreadable review file {:?}: {}", path, e),
            }
        }

        requests.sort_by_key(|r| r.submitted_at);
        Ok(requests)
    }

    pub fn mark_processed(&self, request_id: &Uuid, report: &AdvanceReport) -> Result<ReviewRequest> {
        let result = serde_json::to_value(report)?;
        self.finish(request_id, ReviewState::Processed, Some(result), None)
    }

    /// Move to failed; `partial` keeps whatever the advancer managed before giving up
    pub fn mark_failed(
        &self,
        request_id: &Uuid,
        error: &str,
        partial: Option<&AdvanceReport>,
    ) -> Result<ReviewRequest> {
        let result = partial.map(serde_json::to_value).transpose()?;
        self.finish(request_id, ReviewState::Failed, result, Some(error.to_string()))
    }

    fn finish(
        &self,
        request_id: &Uuid,
        target: ReviewState,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<ReviewRequest> {
        let path = self.request_path(ReviewState::Pending, request_id);
        if !path.exists() {
            return Err(MaharatError::NotFound(format!("pending review {}", request_id)));
        }

        let mut request = self.read_request(&path)?;
        request.result = result;
        request.error = error;
        request.processed_at = Some(Utc::now());

        let new_path = self.request_path(target, request_id);
        self.write_request(&new_path, &request)?;
        fs::remove_file(&path)?;

        log::info!("Moved review {} to {}", request_id, target.directory_name());
        Ok(request)
    }

    pub fn counts(&self) -> Result<StateCountMap> {
        let mut counts = StateCountMap::new();
        for state in ReviewState::ALL {
            let count = fs::read_dir(self.state_dir(state))?
                .filter_map(|entry| entry.ok())
                .filter(|entry| is_request_file(&entry.path()))
                .count();
            counts.insert(state, count);
        }
        Ok(counts)
    }
}

/// `review_*.json`, ignoring temporaries
pub fn is_request_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().and_then(|s| s.to_str()) == Some("json")
        && path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.starts_with("review_"))
            .unwrap_or(false)
}
