// Query request parsing
// Question payload sent by the request layer, with defaults and validation


use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MAX_TOP_K: usize = 50;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Answer the user's question clearly and concisely using the passages below as reference.";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Malformed query request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Question cannot be empty")]
    EmptyQuestion,
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl QueryRequest {
    #[inline]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: default_system_prompt(),
            session_id: None,
        }
    }

    /// Parse and validate a JSON request body
    #[inline]
    pub fn from_json(body: &str) -> Result<Self, QueryError> {
        let mut request: Self = serde_json::from_str(body)?;
        request.question = request.question.trim().to_string();
        if request.system_prompt.trim().is_empty() {
            request.system_prompt = default_system_prompt();
        }
        request.validate()?;
        Ok(request)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(QueryError::InvalidTopK(self.top_k));
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(QueryError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }

    /// Session named in the body, falling back to the `X-Session-Id` header
    /// value. Blank values select the default session.
    #[inline]
    pub fn effective_session<'a>(&'a self, header: Option<&'a str>) -> Option<&'a str> {
        self.session_id
            .as_deref()
            .or(header)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
