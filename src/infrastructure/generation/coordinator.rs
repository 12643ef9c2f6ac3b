//! Concurrent fan-out to generator backends

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};

use crate::domain::fingerprint::Fingerprint;
use crate::domain::generation::{
    AggregatedResult, BackendErrorKind, BackendFailure, BackendId, DedupPolicy, GeneratedItem,
    GenerationConfig, GenerationTask, GeneratorBackend,
};
use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_backend_call, BackendCallOutcome};

/// Attempts per task: the first call plus at most one retry
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
struct AttemptPolicy {
    timeout: Duration,
    retry_transient: bool,
    retry_delay: Duration,
}

/// Aborts still-running backend tasks if the fan-out is dropped mid-join
struct TaskSet(Vec<JoinHandle<GenerationTask>>);

impl Drop for TaskSet {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Fans a specification out to every backend and joins all of them
///
/// Each backend runs as its own task with a timeout and at most one retry on
/// a transient failure. Concurrency is bounded by `max_parallelism`. The join
/// waits for every task to reach a terminal state; the call succeeds when at
/// least one backend succeeded.
#[derive(Debug, Clone)]
pub struct GenerationCoordinator {
    config: GenerationConfig,
}

impl GenerationCoordinator {
    pub fn new(config: GenerationConfig) -> Result<Self, DomainError> {
        if config.max_parallelism == 0 {
            return Err(DomainError::configuration(
                "generation.max_parallelism must be greater than 0",
            ));
        }
        if config.backend_timeout_ms == 0 {
            return Err(DomainError::configuration(
                "generation.backend_timeout_ms must be greater than 0",
            ));
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            timeout: self.config.backend_timeout(),
            retry_transient: self.config.retry_transient,
            retry_delay: self.config.retry_delay(),
        }
    }

    pub async fn fan_out(
        &self,
        spec: Arc<SpecificationRequest>,
        backends: &[Arc<dyn GeneratorBackend>],
    ) -> Result<AggregatedResult, DomainError> {
        if backends.is_empty() {
            return Err(DomainError::configuration(
                "No generator backends configured",
            ));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallelism));
        let policy = self.policy();
        let mut set = TaskSet(Vec::with_capacity(backends.len()));

        for backend in backends {
            let task = GenerationTask::new(backend.id().clone(), spec.clone());
            let span = info_span!("backend_task", backend = %backend.id());
            let backend = backend.clone();
            let semaphore = semaphore.clone();

            set.0.push(tokio::spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        let mut task = task;
                        let id = task.backend_id().clone();
                        task.fail(BackendFailure::new(
                            id,
                            BackendErrorKind::Internal,
                            "Concurrency limiter closed",
                        ));
                        return task;
                    };
                    run_task(task, backend, policy).await
                }
                .instrument(span),
            ));
        }

        let mut tasks = Vec::with_capacity(backends.len());
        for (handle, backend) in set.0.iter_mut().zip(backends) {
            match handle.await {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    let id = backend.id().clone();
                    warn!(backend = %id, error = %e, "Backend task did not complete");
                    record_backend_call(
                        id.as_str(),
                        BackendCallOutcome::Failure(BackendErrorKind::Internal),
                        1,
                    );

                    let mut task = GenerationTask::new(id.clone(), spec.clone());
                    task.fail(BackendFailure::new(
                        id,
                        BackendErrorKind::Internal,
                        format!("Backend task aborted: {}", e),
                    ));
                    tasks.push(task);
                }
            }
        }

        self.aggregate(*spec.fingerprint(), tasks)
    }

    fn aggregate(
        &self,
        fingerprint: Fingerprint,
        tasks: Vec<GenerationTask>,
    ) -> Result<AggregatedResult, DomainError> {
        let mut items = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded = 0usize;

        for task in tasks {
            match task.into_outcome() {
                Ok(mut produced) => {
                    succeeded += 1;
                    items.append(&mut produced);
                }
                Err(failure) => errors.push(failure),
            }
        }

        if succeeded == 0 {
            return Err(DomainError::generation_failed(errors));
        }

        if self.config.dedup == DedupPolicy::ExactPayload {
            let before = items.len();
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.payload_key()));
            debug!(dropped = before - items.len(), "Dropped duplicate items");
        }

        Ok(AggregatedResult::generated(fingerprint, items, errors))
    }
}

fn into_items(backend_id: &BackendId, values: Vec<serde_json::Value>) -> Result<Vec<GeneratedItem>, DomainError> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            GeneratedItem::from_value(backend_id.clone(), value)
                .map_err(|e| DomainError::validation(format!("item {}: {}", index, e)))
        })
        .collect()
}

async fn run_task(
    mut task: GenerationTask,
    backend: Arc<dyn GeneratorBackend>,
    policy: AttemptPolicy,
) -> GenerationTask {
    let backend_id = task.backend_id().clone();

    loop {
        task.record_attempt();

        let outcome = match tokio::time::timeout(policy.timeout, backend.generate(task.spec())).await {
            Ok(Ok(values)) => into_items(&backend_id, values),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DomainError::timeout(format!(
                "Backend {} timed out after {}ms",
                backend_id,
                policy.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(items) => {
                debug!(items = items.len(), attempts = task.attempts(), "Backend succeeded");
                task.succeed(items);
                break;
            }
            Err(e) => {
                let kind = e.backend_error_kind();

                if policy.retry_transient && kind.is_retryable() && task.attempts() < MAX_ATTEMPTS {
                    warn!(kind = %kind, error = %e, "Backend failed, retrying once");
                    tokio::time::sleep(policy.retry_delay).await;
                    continue;
                }

                warn!(kind = %kind, error = %e, attempts = task.attempts(), "Backend failed");
                task.fail(BackendFailure::new(backend_id.clone(), kind, e.to_string()));
                break;
            }
        }
    }

    let outcome = match task.failure() {
        Some(failure) => BackendCallOutcome::Failure(failure.kind),
        None => BackendCallOutcome::Success,
    };
    record_backend_call(backend_id.as_str(), outcome, task.attempts());

    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::domain::fingerprint::FingerprintComputer;
    use crate::domain::generation::mock::MockGeneratorBackend;
    use crate::domain::generation::ResultSource;

    fn spec() -> Arc<SpecificationRequest> {
        Arc::new(
            FingerprintComputer::default()
                .request("User login with email and password")
                .unwrap(),
        )
    }

    fn coordinator() -> GenerationCoordinator {
        GenerationCoordinator::new(
            GenerationConfig::default().with_retry_delay(Duration::from_millis(1)),
        )
        .unwrap()
    }

    fn backends(list: Vec<Arc<MockGeneratorBackend>>) -> Vec<Arc<dyn GeneratorBackend>> {
        list.into_iter()
            .map(|b| b as Arc<dyn GeneratorBackend>)
            .collect()
    }

    #[tokio::test]
    async fn test_all_backends_succeed() {
        let alpha = Arc::new(MockGeneratorBackend::new("alpha").with_items(10));
        let beta = Arc::new(MockGeneratorBackend::new("beta").with_items(10));

        let result = coordinator()
            .fan_out(spec(), &backends(vec![alpha.clone(), beta.clone()]))
            .await
            .unwrap();

        assert_eq!(result.source, ResultSource::Generated);
        assert_eq!(result.items.len(), 20);
        assert!(result.errors.is_empty());
        assert!(result.items[..10].iter().all(|i| i.backend_id.as_str() == "alpha"));
        assert!(result.items[10..].iter().all(|i| i.backend_id.as_str() == "beta"));
        assert_eq!(alpha.call_count(), 1);
        assert_eq!(beta.call_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let alpha = Arc::new(MockGeneratorBackend::new("alpha").with_items(10));
        let beta = Arc::new(MockGeneratorBackend::new("beta").with_error(DomainError::http(
            Some(401),
            "invalid api key",
        )));

        let result = coordinator()
            .fan_out(spec(), &backends(vec![alpha, beta.clone()]))
            .await
            .unwrap();

        assert_eq!(result.source, ResultSource::Generated);
        assert_eq!(result.items.len(), 10);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].backend_id.as_str(), "beta");
        assert_eq!(result.errors[0].kind, BackendErrorKind::Rejected);
        assert_eq!(beta.call_count(), 1);
    }

    #[tokio::test]
    async fn test_total_failure() {
        let alpha = Arc::new(
            MockGeneratorBackend::new("alpha").with_error(DomainError::http(Some(400), "bad")),
        );
        let beta = Arc::new(
            MockGeneratorBackend::new("beta").with_error(DomainError::internal("boom")),
        );

        let err = coordinator()
            .fan_out(spec(), &backends(vec![alpha, beta]))
            .await
            .unwrap_err();

        match err {
            DomainError::GenerationFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].backend_id.as_str(), "alpha");
                assert_eq!(failures[1].kind, BackendErrorKind::Internal);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let alpha = Arc::new(
            MockGeneratorBackend::new("alpha")
                .with_items(3)
                .with_transient_failures(1),
        );

        let result = coordinator()
            .fan_out(spec(), &backends(vec![alpha.clone()]))
            .await
            .unwrap();

        assert_eq!(result.items.len(), 3);
        assert_eq!(alpha.call_count(), 2);
    }

    #[tokio::test]
    async fn test_at_most_one_retry() {
        let alpha = Arc::new(
            MockGeneratorBackend::new("alpha")
                .with_items(3)
                .with_transient_failures(5),
        );

        let err = coordinator()
            .fan_out(spec(), &backends(vec![alpha.clone()]))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::GenerationFailed { .. }));
        assert_eq!(alpha.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let alpha = Arc::new(
            MockGeneratorBackend::new("alpha")
                .with_items(3)
                .with_transient_failures(1),
        );
        let coordinator =
            GenerationCoordinator::new(GenerationConfig::default().with_retry_transient(false))
                .unwrap();

        assert!(coordinator.fan_out(spec(), &backends(vec![alpha.clone()])).await.is_err());
        assert_eq!(alpha.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_output_not_retried() {
        let alpha = Arc::new(
            MockGeneratorBackend::new("alpha").with_raw_items(vec![json!({"ok": 1}), json!("text")]),
        );
        let beta = Arc::new(MockGeneratorBackend::new("beta").with_items(2));

        let result = coordinator()
            .fan_out(spec(), &backends(vec![alpha.clone(), beta]))
            .await
            .unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.errors[0].kind, BackendErrorKind::InvalidOutput);
        assert_eq!(alpha.call_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_timeout() {
        let slow = Arc::new(
            MockGeneratorBackend::new("slow")
                .with_items(1)
                .with_delay(Duration::from_millis(500)),
        );
        let fast = Arc::new(MockGeneratorBackend::new("fast").with_items(1));
        let coordinator = GenerationCoordinator::new(
            GenerationConfig::default()
                .with_backend_timeout(Duration::from_millis(20))
                .with_retry_delay(Duration::from_millis(1)),
        )
        .unwrap();

        let result = coordinator
            .fan_out(spec(), &backends(vec![slow.clone(), fast]))
            .await
            .unwrap();

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.errors[0].backend_id.as_str(), "slow");
        assert_eq!(result.errors[0].kind, BackendErrorKind::Timeout);
        assert_eq!(slow.call_count(), 2);
    }

    #[tokio::test]
    async fn test_join_waits_for_slow_backends() {
        let slow = Arc::new(
            MockGeneratorBackend::new("slow")
                .with_items(2)
                .with_delay(Duration::from_millis(50)),
        );
        let fast = Arc::new(MockGeneratorBackend::new("fast").with_items(2));

        let result = coordinator()
            .fan_out(spec(), &backends(vec![fast, slow]))
            .await
            .unwrap();

        assert_eq!(result.items.len(), 4);
        assert_eq!(result.items[2].backend_id.as_str(), "slow");
    }

    #[tokio::test]
    async fn test_no_backends_is_configuration_error() {
        let err = coordinator().fan_out(spec(), &[]).await.unwrap_err();

        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_exact_payload_dedup() {
        let items = vec![json!({"title": "same"}), json!({"title": "unique-a"})];
        let alpha = Arc::new(MockGeneratorBackend::new("alpha").with_raw_items(items));
        let beta = Arc::new(
            MockGeneratorBackend::new("beta").with_raw_items(vec![json!({"title": "same"})]),
        );
        let list = backends(vec![alpha, beta]);

        let plain = coordinator().fan_out(spec(), &list).await.unwrap();
        assert_eq!(plain.items.len(), 3);

        let dedup = GenerationCoordinator::new(
            GenerationConfig::default().with_dedup(DedupPolicy::ExactPayload),
        )
        .unwrap()
        .fan_out(spec(), &list)
        .await
        .unwrap();

        assert_eq!(dedup.items.len(), 2);
        assert_eq!(dedup.items[0].backend_id.as_str(), "alpha");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(GenerationCoordinator::new(GenerationConfig::default().with_max_parallelism(0)).is_err());
        assert!(GenerationCoordinator::new(
            GenerationConfig::default().with_backend_timeout(Duration::ZERO)
        )
        .is_err());
    }

    #[derive(Debug)]
    struct ConcurrencyGauge {
        id: BackendId,
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeneratorBackend for ConcurrencyGauge {
        fn id(&self) -> &BackendId {
            &self.id
        }

        async fn generate(&self, _spec: &SpecificationRequest) -> Result<Vec<Value>, DomainError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![json!({"gauge": self.id.as_str()})])
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallelism_is_bounded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let list: Vec<Arc<dyn GeneratorBackend>> = (0..6)
            .map(|i| {
                Arc::new(ConcurrencyGauge {
                    id: BackendId::new(format!("gauge-{}", i)).unwrap(),
                    current: current.clone(),
                    peak: peak.clone(),
                }) as Arc<dyn GeneratorBackend>
            })
            .collect();

        let coordinator =
            GenerationCoordinator::new(GenerationConfig::default().with_max_parallelism(2)).unwrap();
        let result = coordinator.fan_out(spec(), &list).await.unwrap();

        assert_eq!(result.items.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[derive(Debug)]
    struct PanickingBackend {
        id: BackendId,
    }

    #[async_trait]
    impl GeneratorBackend for PanickingBackend {
        fn id(&self) -> &BackendId {
            &self.id
        }

        async fn generate(&self, _spec: &SpecificationRequest) -> Result<Vec<Value>, DomainError> {
            panic!("backend bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_backend_is_isolated() {
        let list: Vec<Arc<dyn GeneratorBackend>> = vec![
            Arc::new(PanickingBackend {
                id: BackendId::new("broken").unwrap(),
            }),
            Arc::new(MockGeneratorBackend::new("alpha").with_items(2)),
        ];

        let result = coordinator().fan_out(spec(), &list).await.unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.errors[0].backend_id.as_str(), "broken");
        assert_eq!(result.errors[0].kind, BackendErrorKind::Internal);
    }
}
