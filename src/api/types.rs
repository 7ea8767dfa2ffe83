use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    types::{opt_string_or_number, string_or_number},
    ChatMessage, SessionSummary, Source,
};

#[derive(Debug, Serialize)]
pub struct LoginForm<'a> {
    pub name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub nisn: String,
    pub grade: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub user_id: &'a str,
    pub question: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalculationRequest<'a> {
    pub problem: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculationResponse {
    pub problem: String,
    pub result: Value,
    pub expression: String,
}

impl CalculationResponse {
    /// Numbers print as JSON, strings without their quotes.
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizRequest<'a> {
    pub topic: &'a str,
    pub request_detail: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizResponse {
    pub quiz: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionsResponse {
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Only plain-text details are shown; structured validation errors fall
    /// back to the caller's message.
    pub fn message(self) -> Option<String> {
        match self.detail? {
            Value::String(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}
