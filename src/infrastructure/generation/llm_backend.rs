//! Chat-completion generator backend

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::generation::{BackendErrorKind, BackendId, GeneratorBackend, TestCaseBatch};
use crate::domain::specification::SpecificationRequest;
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClientTrait;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// System instruction sent with every generation request
pub const DEFAULT_INSTRUCTION: &str = r#"You are a senior QA engineer who writes test cases from software specifications.

Respond with a single JSON object of this exact shape:
{"test_cases": [{"id": "TC-001", "title": "...", "steps": ["..."], "expected_result": "...", "tags": ["..."], "priority": "high|medium|low"}]}

Cover positive paths, negative paths, edge cases and security concerns.
Every test case needs a non-empty id, title, at least one step and an expected result.
Return only the JSON object with no commentary and no markdown."#;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

fn user_message(spec: &SpecificationRequest) -> String {
    format!(
        "SPECIFICATION:\n{}\n\nGenerate comprehensive test cases for this specification. Return only valid JSON.",
        spec.raw()
    )
}

/// Generator backend that asks an OpenAI-compatible chat endpoint for test cases
///
/// The first `{...}` span of the completion is parsed as a `{"test_cases": [...]}`
/// envelope and every case is validated. Anything unparseable is reported as
/// invalid output, which is never retried.
#[derive(Debug)]
pub struct LlmGeneratorBackend<C: HttpClientTrait> {
    id: BackendId,
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    instruction: String,
}

impl<C: HttpClientTrait> LlmGeneratorBackend<C> {
    pub fn new(id: BackendId, client: C, api_key: impl Into<String>) -> Self {
        Self {
            id,
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, spec: &SpecificationRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": self.instruction},
                {"role": "user", "content": user_message(spec)},
            ],
        })
    }

    fn invalid_output(&self, message: impl Into<String>) -> DomainError {
        DomainError::backend(self.id.as_str(), BackendErrorKind::InvalidOutput, message)
    }

    fn parse_response(&self, response: Value) -> Result<Vec<Value>, DomainError> {
        let completion: ChatCompletion = serde_json::from_value(response)
            .map_err(|e| self.invalid_output(format!("Malformed completion response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.invalid_output("Completion contained no message content"))?;

        let json_text = JSON_OBJECT
            .find(&content)
            .map(|m| m.as_str())
            .ok_or_else(|| self.invalid_output("No JSON object found in completion"))?;

        let batch: TestCaseBatch = serde_json::from_str(json_text)
            .map_err(|e| self.invalid_output(format!("Completion is not a test case batch: {}", e)))?;

        let cases = batch
            .into_validated()
            .map_err(|e| self.invalid_output(e.to_string()))?;

        cases
            .into_iter()
            .map(|case| {
                serde_json::to_value(case)
                    .map_err(|e| DomainError::internal(format!("Failed to encode test case: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl<C: HttpClientTrait> GeneratorBackend for LlmGeneratorBackend<C> {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn generate(&self, spec: &SpecificationRequest) -> Result<Vec<Value>, DomainError> {
        let url = self.completions_url();
        let body = self.build_request(spec);

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }
}

// OpenAI chat completion response types

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
