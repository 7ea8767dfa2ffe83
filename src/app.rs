use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono_tz::Tz;
use reqwest::Client;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::timeout,
};

use crate::{
    api::{ApiError, SignupRequest, TutorApiClient, TutorBackend},
    chat::{ChatError, ChatOrchestrator, SendOutcome},
    cli::{parse_line, render, resolve_session, Command, CommandError, HELP_TEXT},
    config::AppConfig,
    db::{self, credentials::CredentialStore},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    preview::{Completion, DocumentFetched, DocumentFetcher, PreviewController},
};

enum AppEvent {
    Reply(Result<SendOutcome, ChatError>),
    Document(DocumentFetched),
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct TutorApp {
    _paths: ResolvedPaths,
    backend: Arc<dyn TutorBackend>,
    credentials: Arc<CredentialStore>,
    chat: Arc<ChatOrchestrator>,
    fetcher: DocumentFetcher,
    shutdown: Shutdown,
    tz: Tz,
}

impl TutorApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;
        let credentials = Arc::new(CredentialStore::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("studiva-client/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api_client = TutorApiClient::new(http_client, config.api.clone());
        tracing::info!(
            api = %api_client.base_url(),
            data = %paths.data_dir.display(),
            "client initialized"
        );
        let backend: Arc<dyn TutorBackend> = Arc::new(api_client);

        let chat = Arc::new(ChatOrchestrator::new(backend.clone(), credentials.clone()));
        let fetcher = DocumentFetcher::new(backend.clone(), paths.pdf_cache_dir.clone());
        let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::Asia::Jakarta);
        Ok(Self {
            _paths: paths,
            backend,
            credentials,
            chat,
            fetcher,
            shutdown,
            tz,
        })
    }

    pub async fn run(self) -> Result<()> {
        println!("STUDIVA.AI  (ketik /help untuk bantuan)");
        self.greet_returning_user().await;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<AppEvent>();
        let mut preview = PreviewController::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut shutdown_listener = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_listener.notified() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line, &mut preview, &events_tx).await == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to read input");
                        break;
                    }
                },
                Some(event) = events_rx.recv() => {
                    self.handle_event(event, &mut preview).await;
                }
            }
        }

        self.shutdown.trigger();
        if timeout(Duration::from_secs(5), self.credentials.close())
            .await
            .is_err()
        {
            tracing::warn!(target: "db", "credential store did not close within 5s");
        }
        println!("Sampai jumpa!");
        tracing::info!("client stopped");
        Ok(())
    }

    async fn greet_returning_user(&self) {
        match self.credentials.load().await {
            Ok(Some(stored)) => {
                tracing::info!(target: "auth", since = %stored.logged_in_at, "resuming login");
                println!("Hi, {}", stored.username);
                self.show_sessions().await;
            }
            Ok(None) => println!("Silakan /login atau /signup terlebih dahulu."),
            Err(err) => tracing::error!(target: "db", error = %err, "failed to read credentials"),
        }
    }

    async fn handle_line(
        &self,
        line: &str,
        preview: &mut PreviewController,
        events: &mpsc::UnboundedSender<AppEvent>,
    ) -> Flow {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(err @ CommandError::Unknown(_)) => {
                println!("{err}\n{HELP_TEXT}");
                return Flow::Continue;
            }
            Err(err) => {
                println!("{err}");
                return Flow::Continue;
            }
        };

        match command {
            Command::Message(_) if self.chat.is_busy() => println!("Menunggu respons..."),
            Command::Message(text) => {
                let chat = self.chat.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let outcome = chat.send_message(&text).await;
                    let _ = events.send(AppEvent::Reply(outcome));
                });
            }
            Command::Login { name, password } => self.login(&name, &password, preview).await,
            Command::Signup {
                name,
                nisn,
                grade,
                password,
            } => {
                let request = SignupRequest {
                    name,
                    nisn,
                    grade,
                    password,
                };
                match self.backend.signup(&request).await {
                    Ok(()) => println!("Pendaftaran berhasil! Silakan login."),
                    Err(err) => println!("{}", describe_api_error(&err)),
                }
            }
            Command::Logout => self.logout(preview).await,
            Command::Sessions => self.show_sessions().await,
            Command::Open(target) => {
                let session_id = resolve_session(&target, &self.chat.sessions());
                match self.chat.select_session(&session_id).await {
                    Ok(_) => {
                        for message in self.chat.messages() {
                            println!("{}", render::render_message(&message, &self.tz));
                        }
                    }
                    Err(err) => self.report_chat_error(err, preview).await,
                }
            }
            Command::New => {
                self.chat.new_chat();
                println!("Chat baru dimulai.");
            }
            Command::Delete(target) => {
                let session_id = resolve_session(&target, &self.chat.sessions());
                match self.chat.delete_session(&session_id).await {
                    Ok(()) => println!("Sesi dihapus."),
                    Err(err) => {
                        tracing::error!(target: "chat", error = %err, "failed to delete session");
                        println!("Gagal menghapus riwayat chat. Silakan coba lagi.");
                        if matches!(err, ChatError::AuthRequired) {
                            self.report_chat_error(err, preview).await;
                        }
                    }
                }
            }
            Command::Source { index, page } => {
                let sources = self.chat.latest_sources();
                let Some(source) = sources.get(index - 1) else {
                    println!("Sumber nomor {index} tidak ditemukan pada jawaban terakhir.");
                    return Flow::Continue;
                };
                let ticket = preview.open(source, page);
                let fetcher = self.fetcher.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let fetched = fetcher.fetch(ticket).await;
                    let _ = events.send(AppEvent::Document(fetched));
                });
                show_preview(preview);
            }
            Command::Next => {
                preview.go_to_next();
                show_preview(preview);
            }
            Command::Prev => {
                preview.go_to_previous();
                show_preview(preview);
            }
            Command::Close => {
                if !preview.close() {
                    println!("Tidak ada pratinjau yang terbuka.");
                }
            }
            Command::Help => println!("{HELP_TEXT}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn handle_event(&self, event: AppEvent, preview: &mut PreviewController) {
        match event {
            AppEvent::Reply(Ok(SendOutcome::Replied(message))) => {
                println!("{}", render::render_message(&message, &self.tz));
            }
            AppEvent::Reply(Ok(SendOutcome::Busy)) => {
                println!("Menunggu respons...");
            }
            AppEvent::Reply(Ok(SendOutcome::Ignored)) => {}
            AppEvent::Reply(Err(err)) => self.report_chat_error(err, preview).await,
            AppEvent::Document(fetched) => match preview.complete(fetched) {
                Completion::Applied => show_preview(preview),
                Completion::Stale => {}
                Completion::Failed(reason) => println!("Gagal memuat PDF: {reason}"),
            },
        }
    }

    async fn login(&self, name: &str, password: &str, preview: &mut PreviewController) {
        let response = match self.backend.login(name, password).await {
            Ok(response) => response,
            Err(err) => {
                println!("{}", describe_api_error(&err));
                return;
            }
        };
        if let Err(err) = self.credentials.save(&response.user_id, name).await {
            tracing::error!(target: "db", error = %err, "failed to store credentials");
            println!("Login berhasil, tetapi sesi tidak dapat disimpan.");
            return;
        }

        tracing::info!(target: "auth", user_id = %response.user_id, "logged in");
        self.chat.reset();
        preview.close();
        println!("Login berhasil. Hi, {name}");
        self.show_sessions().await;
    }

    async fn logout(&self, preview: &mut PreviewController) {
        if let Err(err) = self.credentials.clear().await {
            tracing::error!(target: "db", error = %err, "failed to clear credentials");
        }
        self.chat.reset();
        preview.close();
        tracing::info!(target: "auth", "logged out");
        println!("Anda telah keluar.");
    }

    async fn show_sessions(&self) {
        match self.chat.refresh_sessions().await {
            Ok(sessions) => {
                let current = self.chat.current_session();
                println!("{}", render::render_sessions(&sessions, current.as_deref()));
            }
            Err(ChatError::AuthRequired) => {
                println!("Silakan /login terlebih dahulu.");
            }
            Err(err) => {
                tracing::error!(target: "chat", error = %err, "failed to fetch sessions");
                println!("Gagal mengambil sesi.");
            }
        }
    }

    /// A missing login ends the local session so the student signs in again.
    async fn report_chat_error(&self, err: ChatError, preview: &mut PreviewController) {
        match err {
            ChatError::AuthRequired => {
                self.logout(preview).await;
                println!("Sesi login tidak ditemukan. Silakan /login kembali.");
            }
            ChatError::Api(err) => println!("Terjadi kesalahan: {}", describe_api_error(&err)),
            ChatError::Storage(err) => {
                tracing::error!(target: "db", error = %err, "local storage failure");
                println!("Terjadi kesalahan pada penyimpanan lokal.");
            }
        }
    }
}

fn show_preview(preview: &PreviewController) {
    match preview.view() {
        Some(view) => println!("{}", render::render_preview(&view)),
        None => println!("Tidak ada pratinjau yang terbuka."),
    }
}

fn describe_api_error(err: &ApiError) -> String {
    match err {
        ApiError::Transport(_) => "Gagal terhubung ke server.".to_string(),
        other => other.to_string(),
    }
}
