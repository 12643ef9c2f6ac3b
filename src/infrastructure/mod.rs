//! Infrastructure layer - External service implementations

pub mod cache;
pub mod embedding;
pub mod generation;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod services;
pub mod similarity;
