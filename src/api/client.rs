use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::{
    config::ApiConfig,
    domain::{ChatMessage, SessionSummary},
};

use super::{
    types::{
        CalculationRequest, CalculationResponse, ChatRequest, ChatResponse, ErrorBody,
        HistoryResponse, LoginForm, LoginResponse, QuizRequest, QuizResponse, SessionsResponse,
        SignupRequest,
    },
    TutorBackend,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("gagal terhubung ke server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid API base URL: {0}")]
    InvalidBase(Url),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|status| status.as_u16()),
            ApiError::InvalidBase(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct TutorApiClient {
    http: Client,
    config: ApiConfig,
}

impl TutorApiClient {
    pub fn new(http: Client, config: ApiConfig) -> Self {
        Self { http, config }
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ApiError> {
        build_endpoint(&self.config.base_url, segments)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        Ok(request.timeout(self.config.request_timeout).send().await?)
    }
}

/// Appends each segment percent-encoded, so document paths keep their
/// directory structure without being able to escape it.
pub fn build_endpoint<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidBase(base.clone()))?
        .pop_if_empty()
        .extend(segments.into_iter().filter(|segment| !segment.is_empty()));
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    fallback: &str,
) -> Result<T, ApiError> {
    let response = ensure_success(response, fallback).await?;
    Ok(response.json::<T>().await?)
}

async fn ensure_success(response: Response, fallback: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::message)
        .unwrap_or_else(|| fallback.to_string());

    tracing::warn!(
        target: "api",
        status = status.as_u16(),
        %message,
        "backend rejected request"
    );
    Err(ApiError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TutorBackend for TutorApiClient {
    async fn login(&self, name: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(["login"])?;
        let response = self
            .send(self.http.post(url).form(&LoginForm { name, password }))
            .await?;
        read_json(response, "Login gagal.").await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError> {
        let url = self.endpoint(["signup"])?;
        let response = self.send(self.http.post(url).json(request)).await?;
        ensure_success(response, "Pendaftaran gagal.").await?;
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, ApiError> {
        let url = self.endpoint(["sessions", user_id])?;
        let response = self.send(self.http.get(url)).await?;
        let body: SessionsResponse = read_json(response, "Gagal mengambil sesi.").await?;
        Ok(body.sessions)
    }

    async fn session_history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.endpoint(["chat", session_id])?;
        let response = self.send(self.http.get(url)).await?;
        let body: HistoryResponse = read_json(response, "Gagal memuat pesan.").await?;
        Ok(body.messages)
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut url = self.endpoint(["chat", session_id])?;
        url.query_pairs_mut().append_pair("user_id", user_id);
        let response = self.send(self.http.delete(url)).await?;
        ensure_success(response, "Gagal menghapus sesi di server.").await?;
        Ok(())
    }

    async fn send_chat(
        &self,
        session_id: Option<&str>,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, ApiError> {
        let url = self.endpoint(["chat", session_id.unwrap_or("new")])?;
        let response = self.send(self.http.post(url).json(request)).await?;
        read_json(response, "Terjadi kesalahan pada server chat.").await
    }

    async fn calculate(&self, problem: &str) -> Result<CalculationResponse, ApiError> {
        let url = self.endpoint(["calculate"])?;
        let response = self
            .send(self.http.post(url).json(&CalculationRequest { problem }))
            .await?;
        read_json(response, "Gagal menghitung.").await
    }

    async fn generate_quiz(&self, request: &QuizRequest<'_>) -> Result<QuizResponse, ApiError> {
        let url = self.endpoint(["generate-quiz"])?;
        let response = self.send(self.http.post(url).json(request)).await?;
        read_json(response, "Gagal membuat kuis.").await
    }

    async fn fetch_pdf(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(std::iter::once("pdf").chain(path.split('/')))?;
        let response = self.send(self.http.get(url)).await?;
        let response = ensure_success(response, "Gagal mengambil file PDF.").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::ApiConfig;

    fn base() -> Url {
        Url::parse("https://studiva.site/api/").unwrap()
    }

    #[test]
    fn endpoint_appends_segments_under_base() {
        let url = build_endpoint(&base(), ["chat", "new"]).unwrap();
        assert_eq!(url.as_str(), "https://studiva.site/api/chat/new");
    }

    #[test]
    fn endpoint_encodes_document_paths() {
        let url = build_endpoint(
            &base(),
            std::iter::once("pdf").chain("materi/kelas 10/bab 1.pdf".split('/')),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://studiva.site/api/pdf/materi/kelas%2010/bab%201.pdf"
        );
    }

    #[test]
    fn endpoint_skips_empty_segments() {
        let url = build_endpoint(&base(), ["pdf", "", "a.pdf"]).unwrap();
        assert_eq!(url.as_str(), "https://studiva.site/api/pdf/a.pdf");
    }

    #[test]
    fn client_keeps_configured_base() {
        let config = ApiConfig {
            base_url: base(),
            request_timeout: std::time::Duration::from_secs(5),
        };
        let client = TutorApiClient::new(Client::new(), config);
        assert_eq!(client.base_url().as_str(), "https://studiva.site/api/");
    }
}
