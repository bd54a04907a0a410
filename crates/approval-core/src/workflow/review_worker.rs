//! Drains the review inbox through the advancer

use super::advancer::ApprovalWorkflowAdvancer;
use super::report::AdvanceReport;
use super::review_inbox::{is_request_file, ReviewInbox, ReviewState};
use super::traits::ApprovalBackend;
use crate::error::{MaharatError, Result};
use approval_types::ReviewRequest;
use std::path::Path;
use std::sync::Arc;

pub struct ReviewWorker<B: ApprovalBackend> {
    inbox: Arc<ReviewInbox>,
    advancer: Arc<ApprovalWorkflowAdvancer<B>>,
}

impl<B: ApprovalBackend> ReviewWorker<B> {
    pub fn new(inbox: Arc<ReviewInbox>, advancer: Arc<ApprovalWorkflowAdvancer<B>>) -> Self {
        Self { inbox, advancer }
    }

    pub fn inbox(&self) -> &ReviewInbox {
        &self.inbox
    }

    /// Handle every pending request, oldest first
    ///
    /// A request that cannot be filed is logged and left in `pending/`; the
    /// rest are still handled. Returns how many were filed.
    pub async fn process_pending(&self) -> Result<usize> {
        let pending = self.inbox.list_pending()?;
        if pending.is_empty() {
            log::info!("No pending reviews");
            return Ok(0);
        }

        log::info!("Processing {} pending reviews", pending.len());
        let mut filed = 0;
        for request in &pending {
            match self.process_request(request).await {
                Ok(_) => filed += 1,
                Err(e) => log::error!("Failed to file review {}: {}", request.request_id, e),
            }
        }
        Ok(filed)
    }

    /// Handle the request stored at `path`
    ///
    /// Returns `None` when the file is gone or not a review request, which
    /// happens when the watcher reports a file that was already handled.
    pub async fn process_file(&self, path: &Path) -> Result<Option<ReviewState>> {
        if !is_request_file(path) {
            return Ok(None);
        }

        let request = match self.inbox.read_request(path) {
            Ok(request) => request,
            Err(MaharatError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                log::error!("Failed to read review file {:?}: {}", path, e);
                return Err(e);
            }
        };

        self.process_request(&request).await.map(Some)
    }

    /// Run one request through the advancer and file it as processed or failed
    pub async fn process_request(&self, request: &ReviewRequest) -> Result<ReviewState> {
        log::info!(
            "Processing review {} for task {} by user {}",
            request.request_id, request.task_id, request.requested_by
        );

        match self.run(request).await {
            Ok(report) => {
                self.inbox.mark_processed(&request.request_id, &report)?;
                Ok(ReviewState::Processed)
            }
            Err(MaharatError::NoMainBudget { message, partial }) => {
                log::warn!("Review {} stopped at the status update: {}", request.request_id, message);
                self.inbox.mark_failed(&request.request_id, &message, partial.as_deref())?;
                Ok(ReviewState::Failed)
            }
            Err(e) => {
                log::error!("Review {} failed: {}", request.request_id, e);
                self.inbox.mark_failed(&request.request_id, &e.to_string(), None)?;
                Ok(ReviewState::Failed)
            }
        }
    }

    async fn run(&self, request: &ReviewRequest) -> Result<AdvanceReport> {
        // Validate before any backend call so a bad submission costs nothing
        request.submission.validate()?;

        let task = self.advancer.backend().load_task(request.task_id).await?;
        self.advancer
            .advance(&task, &request.submission, request.requested_by)
            .await
    }
}
