use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::domain::{ChatMessage, SessionSummary, Source};

use super::{
    ApiError, CalculationResponse, ChatRequest, ChatResponse, LoginResponse, QuizRequest,
    QuizResponse, SignupRequest, TutorBackend,
};

/// In-memory backend that records every call as a short string.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub fail_with: Mutex<Option<String>>,
    pub new_session: Mutex<Option<(String, String)>>,
    pub sources: Mutex<Vec<Source>>,
    pub sessions: Mutex<Vec<SessionSummary>>,
    pub history: Mutex<Vec<ChatMessage>>,
    pub documents: Mutex<HashMap<String, Vec<u8>>>,
    pub calculation_gate: Option<Arc<Notify>>,
    pub chat_gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().push(call);
        match self.fail_with.lock().clone() {
            Some(message) => Err(ApiError::Backend {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TutorBackend for FakeBackend {
    async fn login(&self, name: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.record(format!("login:{name}"))?;
        Ok(LoginResponse {
            user_id: "42".to_string(),
        })
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError> {
        self.record(format!("signup:{}:{}", request.name, request.grade))
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, ApiError> {
        self.record(format!("sessions:{user_id}"))?;
        Ok(self.sessions.lock().clone())
    }

    async fn session_history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.record(format!("history:{session_id}"))?;
        Ok(self.history.lock().clone())
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.record(format!("delete:{session_id}:{user_id}"))
    }

    async fn send_chat(
        &self,
        session_id: Option<&str>,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, ApiError> {
        if let Some(gate) = &self.chat_gate {
            gate.notified().await;
        }
        self.record(format!(
            "chat:{}:{}:{}",
            session_id.unwrap_or("new"),
            request.user_id,
            request.question
        ))?;
        let new_session = self.new_session.lock().clone();
        Ok(ChatResponse {
            answer: format!("jawaban untuk {}", request.question),
            sources: self.sources.lock().clone(),
            session_id: new_session.as_ref().map(|(id, _)| id.clone()),
            session_name: new_session.map(|(_, name)| name),
        })
    }

    async fn calculate(&self, problem: &str) -> Result<CalculationResponse, ApiError> {
        if let Some(gate) = &self.calculation_gate {
            gate.notified().await;
        }
        self.record(format!("calculate:{problem}"))?;
        Ok(CalculationResponse {
            problem: problem.to_string(),
            result: Value::from(60),
            expression: problem.replace(' ', ""),
        })
    }

    async fn generate_quiz(&self, request: &QuizRequest<'_>) -> Result<QuizResponse, ApiError> {
        self.record(format!(
            "quiz:{}|{}|{}",
            request.topic, request.request_detail, request.user_id
        ))?;
        Ok(QuizResponse {
            quiz: format!("1. Soal tentang {}", request.topic),
        })
    }

    async fn fetch_pdf(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        self.record(format!("pdf:{path}"))?;
        self.documents
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::Backend {
                status: 404,
                message: "Gagal mengambil file PDF.".to_string(),
            })
    }
}
