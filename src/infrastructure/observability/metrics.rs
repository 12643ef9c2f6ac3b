//! Counters recorded through the `metrics` facade
//!
//! No exporter is installed here; the embedding application picks a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::domain::generation::BackendErrorKind;

/// Outcome of the cache lookup phase of a resolve call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Exact,
    Similar,
    Miss,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Similar => "similar",
            Self::Miss => "miss",
        }
    }
}

/// Terminal outcome of one backend task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCallOutcome {
    Success,
    Failure(BackendErrorKind),
}

impl BackendCallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure(kind) => kind.as_str(),
        }
    }
}

pub fn record_cache_lookup(outcome: LookupOutcome) {
    counter!("cache_lookups_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_single_flight_join() {
    counter!("single_flight_joins_total").increment(1);
}

pub fn record_generation_episode(success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };

    counter!("generation_episodes_total", "outcome" => outcome).increment(1);
    histogram!("generation_episode_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

pub fn record_backend_call(backend: &str, outcome: BackendCallOutcome, attempts: u32) {
    let labels = [
        ("backend", backend.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("backend_calls_total", &labels).increment(1);
    if attempts > 1 {
        counter!("backend_retries_total", "backend" => backend.to_string()).increment(1);
    }
}

pub fn record_cache_write_skipped(reason: &'static str) {
    counter!("cache_write_skipped_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(LookupOutcome::Similar.as_str(), "similar");
        assert_eq!(BackendCallOutcome::Success.as_str(), "success");
        assert_eq!(
            BackendCallOutcome::Failure(BackendErrorKind::InvalidOutput).as_str(),
            "invalid_output"
        );
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(LookupOutcome::Miss);
        record_single_flight_join();
        record_generation_episode(true, Duration::from_millis(5));
        record_backend_call("alpha", BackendCallOutcome::Success, 2);
        record_cache_write_skipped("embedding_failed");
    }
}
