use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    api::{ApiError, CalculationResponse, ChatRequest, QuizRequest, TutorBackend},
    db::credentials::CredentialStore,
    domain::{classify, ChatMessage, Intent, QuizMemory, Sender, SessionSummary, Source},
};

pub const GREETING_REPLY: &str = "Hai, saya Studiva.AI. Ada yang bisa saya bantu?";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("sesi login tidak ditemukan, silakan login kembali")]
    AuthRequired,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("penyimpanan lokal gagal: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// Another message is still waiting for its reply.
    Busy,
    Replied(ChatMessage),
}

#[derive(Default)]
struct ChatState {
    sessions: Vec<SessionSummary>,
    current_session: Option<String>,
    messages: Vec<ChatMessage>,
    quiz_memory: QuizMemory,
}

/// Owns one student's conversation and routes each message to the backend
/// capability chosen by the intent classifier.
pub struct ChatOrchestrator {
    backend: Arc<dyn TutorBackend>,
    credentials: Arc<CredentialStore>,
    state: Mutex<ChatState>,
    busy: AtomicBool,
    // Bumped whenever the visible conversation is replaced, so replies that
    // arrive for an abandoned conversation are not appended to the new one.
    epoch: AtomicU64,
}

struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn TutorBackend>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            backend,
            credentials,
            state: Mutex::new(ChatState::default()),
            busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.state.lock().sessions.clone()
    }

    pub fn current_session(&self) -> Option<String> {
        self.state.lock().current_session.clone()
    }

    #[cfg(test)]
    pub fn quiz_topic(&self) -> Option<String> {
        self.state.lock().quiz_memory.last_topic().map(str::to_string)
    }

    /// Sources cited by the latest bot reply.
    pub fn latest_sources(&self) -> Vec<Source> {
        self.state
            .lock()
            .messages
            .iter()
            .rev()
            .find(|message| message.sender == Sender::Bot)
            .map(|message| message.sources.clone())
            .unwrap_or_default()
    }

    /// Sends one message. Backend failures are turned into a bot reply in the
    /// transcript; only a missing login or a broken local store is an error.
    pub async fn send_message(&self, input: &str) -> Result<SendOutcome, ChatError> {
        if input.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::debug!(target: "chat", "send rejected while a reply is pending");
            return Ok(SendOutcome::Busy);
        };

        let user_id = self.require_user().await?;
        let epoch = self.epoch.load(Ordering::Acquire);
        self.state.lock().messages.push(ChatMessage::user(input));

        let reply = match self.dispatch(input, &user_id, epoch).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(
                    target: "chat",
                    error = %err,
                    status = err.status(),
                    "message dispatch failed"
                );
                ChatMessage::bot(format!("Terjadi kesalahan: {err}"))
            }
        };

        if self.epoch.load(Ordering::Acquire) == epoch {
            self.state.lock().messages.push(reply.clone());
        } else {
            tracing::info!(
                target: "chat",
                "conversation changed before the reply arrived; not appending"
            );
        }
        Ok(SendOutcome::Replied(reply))
    }

    async fn dispatch(
        &self,
        input: &str,
        user_id: &str,
        epoch: u64,
    ) -> Result<ChatMessage, ApiError> {
        let (intent, next_memory, session) = {
            let state = self.state.lock();
            let (intent, next_memory) = classify(input, &state.quiz_memory);
            (intent, next_memory, state.current_session.clone())
        };
        tracing::info!(
            target: "chat",
            intent = %intent.category(),
            topic = intent.topic(),
            "dispatching message"
        );
        if let Some(detail) = intent.request_detail() {
            tracing::debug!(target: "chat", detail, "quiz request detail");
        }

        match intent {
            Intent::Greeting => Ok(ChatMessage::bot(GREETING_REPLY)),
            Intent::MathExpression => {
                let calculation = self.backend.calculate(input).await?;
                Ok(ChatMessage::bot(format_calculation(&calculation)))
            }
            Intent::NewQuizRequest {
                topic,
                request_detail,
            }
            | Intent::FollowUpQuizRequest {
                topic,
                request_detail,
            } => {
                self.state.lock().quiz_memory = next_memory;
                let request = QuizRequest {
                    topic: &topic,
                    request_detail: &request_detail,
                    user_id,
                };
                let quiz = self.backend.generate_quiz(&request).await?;
                Ok(ChatMessage::bot(quiz.quiz))
            }
            Intent::GeneralChat => {
                let request = ChatRequest {
                    user_id,
                    question: input,
                };
                let response = self.backend.send_chat(session.as_deref(), &request).await?;

                if session.is_none() {
                    if let Some(session_id) = response.session_id {
                        self.adopt_new_session(
                            SessionSummary {
                                id: session_id,
                                name: response.session_name.unwrap_or_default(),
                            },
                            epoch,
                        );
                    }
                }
                Ok(ChatMessage::bot_with_sources(response.answer, response.sources))
            }
        }
    }

    fn adopt_new_session(&self, session: SessionSummary, epoch: u64) {
        let mut state = self.state.lock();
        if self.epoch.load(Ordering::Acquire) != epoch || state.current_session.is_some() {
            state.sessions.insert(0, session);
            return;
        }
        tracing::info!(target: "chat", session_id = %session.id, "new session created");
        state.current_session = Some(session.id.clone());
        state.sessions.insert(0, session);
    }

    pub async fn refresh_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        let user_id = self.require_user().await?;
        let sessions = self.backend.list_sessions(&user_id).await?;
        self.state.lock().sessions = sessions.clone();
        Ok(sessions)
    }

    /// Switches to a stored session and loads its history. Returns `false`
    /// when it was already the current one. The visible conversation is only
    /// replaced once the history has arrived.
    pub async fn select_session(&self, session_id: &str) -> Result<bool, ChatError> {
        let epoch = {
            let state = self.state.lock();
            if state.current_session.as_deref() == Some(session_id) {
                return Ok(false);
            }
            self.epoch.load(Ordering::Acquire)
        };

        let history = self.backend.session_history(session_id).await?;
        let mut state = self.state.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::info!(
                target: "chat",
                session_id,
                "conversation changed while loading history; not switching"
            );
            return Ok(false);
        }
        state.current_session = Some(session_id.to_string());
        state.messages = history
            .into_iter()
            .map(|mut message| {
                message.from_history = true;
                message
            })
            .collect();
        state.quiz_memory = QuizMemory::default();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(true)
    }

    pub fn new_chat(&self) {
        let mut state = self.state.lock();
        state.current_session = None;
        state.messages.clear();
        state.quiz_memory = QuizMemory::default();
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ChatError> {
        let user_id = self.require_user().await?;
        self.backend.delete_session(session_id, &user_id).await?;

        let mut state = self.state.lock();
        state.sessions.retain(|session| session.id != session_id);
        if state.current_session.as_deref() == Some(session_id) {
            state.current_session = None;
            state.messages.clear();
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
        tracing::info!(target: "chat", session_id, "session deleted");
        Ok(())
    }

    /// Forgets everything about the signed-out student.
    pub fn reset(&self) {
        *self.state.lock() = ChatState::default();
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    async fn require_user(&self) -> Result<String, ChatError> {
        match self.credentials.load().await? {
            Some(stored) => Ok(stored.user_id),
            None => Err(ChatError::AuthRequired),
        }
    }
}

pub fn format_calculation(calculation: &CalculationResponse) -> String {
    format!(
        "Hasil dari \"{}\" adalah: **{}**.\n(Ekspresi: `{}`)",
        calculation.problem,
        calculation.result_text(),
        calculation.expression
    )
}
