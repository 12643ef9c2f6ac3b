//! Fixed-output generator backend

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::generation::{BackendId, GeneratorBackend};
use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;

/// Returns the same configured items for every specification
///
/// Useful for offline runs and smoke-testing the cache without an LLM.
#[derive(Debug, Clone)]
pub struct StaticGeneratorBackend {
    id: BackendId,
    items: Vec<Value>,
}

impl StaticGeneratorBackend {
    pub fn new(id: BackendId, items: Vec<Value>) -> Self {
        Self { id, items }
    }
}

#[async_trait]
impl GeneratorBackend for StaticGeneratorBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn generate(&self, _spec: &SpecificationRequest) -> Result<Vec<Value>, DomainError> {
        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fingerprint::FingerprintComputer;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_backend_returns_items() {
        let backend = StaticGeneratorBackend::new(
            BackendId::new("fixture").unwrap(),
            vec![json!({"title": "smoke"})],
        );
        let spec = FingerprintComputer::default().request("anything").unwrap();

        let items = backend.generate(&spec).await.unwrap();

        assert_eq!(items, vec![json!({"title": "smoke"})]);
        assert_eq!(backend.id().as_str(), "fixture");
    }
}
