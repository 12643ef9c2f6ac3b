//! Per-backend generation task

use std::sync::Arc;

use super::{BackendFailure, BackendId, GeneratedItem};
use crate::domain::specification::SpecificationRequest;

/// Lifecycle of a single backend invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One backend invocation within a fan-out episode
///
/// Terminal once `succeed` or `fail` has been called. Never persisted.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    backend_id: BackendId,
    spec: Arc<SpecificationRequest>,
    status: TaskStatus,
    items: Vec<GeneratedItem>,
    failure: Option<BackendFailure>,
    attempts: u32,
}

impl GenerationTask {
    pub fn new(backend_id: BackendId, spec: Arc<SpecificationRequest>) -> Self {
        Self {
            backend_id,
            spec,
            status: TaskStatus::Pending,
            items: Vec::new(),
            failure: None,
            attempts: 0,
        }
    }

    pub fn backend_id(&self) -> &BackendId {
        &self.backend_id
    }

    pub fn spec(&self) -> &SpecificationRequest {
        &self.spec
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn items(&self) -> &[GeneratedItem] {
        &self.items
    }

    pub fn failure(&self) -> Option<&BackendFailure> {
        self.failure.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TaskStatus::Pending
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn succeed(&mut self, items: Vec<GeneratedItem>) {
        self.status = TaskStatus::Succeeded;
        self.items = items;
        self.failure = None;
    }

    pub fn fail(&mut self, failure: BackendFailure) {
        self.status = TaskStatus::Failed;
        self.items.clear();
        self.failure = Some(failure);
    }

    /// Consumes a terminal task into its items or failure
    pub fn into_outcome(self) -> Result<Vec<GeneratedItem>, BackendFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fingerprint::FingerprintComputer;
    use crate::domain::generation::BackendErrorKind;

    fn task() -> GenerationTask {
        let spec = FingerprintComputer::default().request("login").unwrap();
        GenerationTask::new(BackendId::new("alpha").unwrap(), Arc::new(spec))
    }

    #[test]
    fn test_task_starts_pending() {
        let task = task();

        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(!task.is_terminal());
        assert_eq!(task.attempts(), 0);
        assert_eq!(task.spec().normalized(), "login");
    }

    #[test]
    fn test_task_success() {
        let mut task = task();
        task.record_attempt();
        task.succeed(vec![]);

        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert!(task.is_terminal());
        assert!(task.into_outcome().is_ok());
    }

    #[test]
    fn test_task_failure() {
        let mut task = task();
        task.record_attempt();
        task.record_attempt();
        task.fail(BackendFailure::new(
            BackendId::new("alpha").unwrap(),
            BackendErrorKind::Transient,
            "503",
        ));

        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.attempts(), 2);
        assert_eq!(
            task.into_outcome().unwrap_err().kind,
            BackendErrorKind::Transient
        );
    }
}
