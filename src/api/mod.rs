mod client;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

use async_trait::async_trait;

use crate::domain::{ChatMessage, SessionSummary};

pub use client::{ApiError, TutorApiClient};
pub use types::{
    CalculationResponse, ChatRequest, ChatResponse, LoginResponse, QuizRequest, QuizResponse,
    SignupRequest,
};

/// Every backend capability the client relies on.
#[async_trait]
pub trait TutorBackend: Send + Sync {
    async fn login(&self, name: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, ApiError>;

    async fn session_history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError>;

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError>;

    /// Posts to the given session, or opens a new one when `session_id` is `None`.
    async fn send_chat(
        &self,
        session_id: Option<&str>,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, ApiError>;

    async fn calculate(&self, problem: &str) -> Result<CalculationResponse, ApiError>;

    async fn generate_quiz(&self, request: &QuizRequest<'_>) -> Result<QuizResponse, ApiError>;

    async fn fetch_pdf(&self, path: &str) -> Result<Vec<u8>, ApiError>;
}
