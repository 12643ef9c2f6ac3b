//! Observability infrastructure - cache and generation metrics

mod metrics;

pub use metrics::{
    record_backend_call, record_cache_lookup, record_cache_write_skipped,
    record_generation_episode, record_single_flight_join, BackendCallOutcome, LookupOutcome,
};
