use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::{
    api::TutorBackend,
    domain::{types::file_name_of, PageNavigator, Source},
};

/// Identifies one download request. Results are only applied when their
/// ticket still matches the open preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub path: String,
}

#[derive(Debug)]
pub struct DocumentFetched {
    pub ticket: FetchTicket,
    pub result: Result<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Loading,
    Ready(PathBuf),
}

#[derive(Debug, PartialEq)]
pub enum Completion {
    Applied,
    /// The preview was closed or moved on to another request.
    Stale,
    /// The current document could not be fetched and the preview was closed.
    Failed(String),
}

struct OpenPreview {
    path: String,
    navigator: PageNavigator,
    document: DocumentState,
    generation: u64,
}

/// What the terminal shows for the open preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewView {
    pub file_name: String,
    pub visible_page: Option<u32>,
    pub position: usize,
    pub total: usize,
    pub snippets: Vec<String>,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub document: DocumentState,
}

/// The page preview for one cited source at a time. Owned by the input loop;
/// downloads run elsewhere and report back through [`PreviewController::complete`].
#[derive(Default)]
pub struct PreviewController {
    current: Option<OpenPreview>,
    generation: u64,
}

impl PreviewController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Opens `source` at `page`, reusing the open preview if there is one.
    /// The returned ticket must accompany the document download.
    pub fn open(&mut self, source: &Source, page: u32) -> FetchTicket {
        self.generation += 1;
        let generation = self.generation;

        match self.current.as_mut() {
            Some(open) => {
                open.navigator.reinitialize(
                    source.relevant_pages.clone(),
                    page,
                    source.snippets.clone(),
                );
                open.path = source.path.clone();
                open.document = DocumentState::Loading;
                open.generation = generation;
            }
            None => {
                self.current = Some(OpenPreview {
                    path: source.path.clone(),
                    navigator: PageNavigator::new(
                        source.relevant_pages.clone(),
                        page,
                        source.snippets.clone(),
                    ),
                    document: DocumentState::Loading,
                    generation,
                });
            }
        }

        tracing::debug!(
            target: "preview",
            path = %source.path,
            page,
            generation,
            "preview opened"
        );
        FetchTicket {
            generation,
            path: source.path.clone(),
        }
    }

    pub fn complete(&mut self, fetched: DocumentFetched) -> Completion {
        let DocumentFetched { ticket, result } = fetched;
        let Some(open) = self.current.as_mut() else {
            return Completion::Stale;
        };
        if open.generation != ticket.generation || open.path != ticket.path {
            tracing::debug!(
                target: "preview",
                path = %ticket.path,
                generation = ticket.generation,
                "discarding stale document"
            );
            return Completion::Stale;
        }

        match result {
            Ok(file) => {
                open.document = DocumentState::Ready(file);
                Completion::Applied
            }
            Err(err) => {
                tracing::error!(
                    target: "preview",
                    path = %ticket.path,
                    error = %err,
                    "document fetch failed"
                );
                self.current = None;
                Completion::Failed(format!("{err:#}"))
            }
        }
    }

    pub fn go_to_next(&mut self) {
        if let Some(open) = self.current.as_mut() {
            open.navigator.go_to_next();
        }
    }

    pub fn go_to_previous(&mut self) {
        if let Some(open) = self.current.as_mut() {
            open.navigator.go_to_previous();
        }
    }

    pub fn close(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn view(&self) -> Option<PreviewView> {
        let open = self.current.as_ref()?;
        let navigator = &open.navigator;
        Some(PreviewView {
            file_name: file_name_of(&open.path).to_string(),
            visible_page: navigator.visible_page(),
            position: navigator.current_index() + 1,
            total: navigator.relevant_pages().len(),
            snippets: navigator
                .visible_snippets()
                .into_iter()
                .map(str::to_string)
                .collect(),
            can_go_previous: navigator.can_go_previous(),
            can_go_next: navigator.can_go_next(),
            document: open.document.clone(),
        })
    }
}

/// Downloads cited documents into the local cache directory.
#[derive(Clone)]
pub struct DocumentFetcher {
    backend: Arc<dyn TutorBackend>,
    cache_dir: PathBuf,
}

impl DocumentFetcher {
    pub fn new(backend: Arc<dyn TutorBackend>, cache_dir: PathBuf) -> Self {
        Self { backend, cache_dir }
    }

    pub async fn fetch(&self, ticket: FetchTicket) -> DocumentFetched {
        let result = self.download(&ticket.path).await;
        DocumentFetched { ticket, result }
    }

    async fn download(&self, path: &str) -> Result<PathBuf> {
        let bytes = self.backend.fetch_pdf(path).await?;
        let target = self.cache_dir.join(cache_file_name(path));
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        tracing::info!(target: "preview", path, bytes = bytes.len(), "document cached");
        Ok(target)
    }
}

fn cache_file_name(path: &str) -> String {
    match file_name_of(path).trim() {
        "" | "." | ".." => "document.pdf".to_string(),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::testing::FakeBackend, domain::types::Snippet};

    fn source(path: &str, pages: &[u32]) -> Source {
        Source {
            path: path.to_string(),
            relevant_pages: pages.to_vec(),
            snippets: vec![Snippet {
                text: format!("kutipan {path}"),
                pages: pages.iter().take(1).copied().collect(),
            }],
        }
    }

    fn ready(ticket: FetchTicket) -> DocumentFetched {
        DocumentFetched {
            result: Ok(PathBuf::from(format!("/cache/{}", ticket.path))),
            ticket,
        }
    }

    #[test]
    fn open_positions_navigator() {
        let mut preview = PreviewController::new();
        preview.open(&source("bab1.pdf", &[2, 5, 9]), 5);

        let view = preview.view().unwrap();
        assert_eq!(view.visible_page, Some(5));
        assert_eq!((view.position, view.total), (2, 3));
        assert!(view.snippets.is_empty());
        assert_eq!(view.document, DocumentState::Loading);
    }

    #[test]
    fn reopening_resets_position_for_new_source() {
        let mut preview = PreviewController::new();
        preview.open(&source("bab1.pdf", &[2, 5, 9]), 9);
        preview.open(&source("bab2.pdf", &[4, 6]), 1);

        let view = preview.view().unwrap();
        assert_eq!(view.file_name, "bab2.pdf");
        assert_eq!(view.visible_page, Some(4));
        assert_eq!(view.snippets, vec!["kutipan bab2.pdf".to_string()]);
    }

    #[test]
    fn stale_download_is_discarded() {
        let mut preview = PreviewController::new();
        let first = preview.open(&source("bab1.pdf", &[1]), 1);
        let second = preview.open(&source("bab2.pdf", &[1]), 1);

        assert_eq!(preview.complete(ready(first)), Completion::Stale);
        assert_eq!(preview.view().unwrap().document, DocumentState::Loading);

        assert_eq!(preview.complete(ready(second)), Completion::Applied);
        assert_eq!(
            preview.view().unwrap().document,
            DocumentState::Ready(PathBuf::from("/cache/bab2.pdf"))
        );
    }

    #[test]
    fn same_source_reopened_ignores_older_request() {
        let mut preview = PreviewController::new();
        let first = preview.open(&source("bab1.pdf", &[1, 2]), 1);
        let _second = preview.open(&source("bab1.pdf", &[1, 2]), 2);
        assert_eq!(preview.complete(ready(first)), Completion::Stale);
    }

    #[test]
    fn failed_download_closes_preview() {
        let mut preview = PreviewController::new();
        let ticket = preview.open(&source("bab1.pdf", &[1]), 1);
        let outcome = preview.complete(DocumentFetched {
            ticket,
            result: Err(anyhow::anyhow!("Gagal mengambil file PDF.")),
        });
        assert_eq!(outcome, Completion::Failed("Gagal mengambil file PDF.".to_string()));
        assert!(!preview.is_open());
    }

    #[test]
    fn results_after_close_are_stale() {
        let mut preview = PreviewController::new();
        let ticket = preview.open(&source("bab1.pdf", &[1]), 1);
        assert!(preview.close());
        assert!(!preview.close());
        assert_eq!(preview.complete(ready(ticket)), Completion::Stale);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut preview = PreviewController::new();
        preview.open(&source("bab1.pdf", &[3, 7]), 3);
        preview.go_to_previous();
        assert_eq!(preview.view().unwrap().visible_page, Some(3));
        preview.go_to_next();
        preview.go_to_next();
        let view = preview.view().unwrap();
        assert_eq!(view.visible_page, Some(7));
        assert!(!view.can_go_next);
        assert!(view.can_go_previous);
    }

    #[tokio::test]
    async fn fetcher_writes_cache_file() {
        let backend = FakeBackend::default();
        backend
            .documents
            .lock()
            .insert("materi/bab1.pdf".to_string(), b"%PDF-1.4".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let fetcher = DocumentFetcher::new(Arc::new(backend), dir.path().to_path_buf());

        let fetched = fetcher
            .fetch(FetchTicket {
                generation: 1,
                path: "materi/bab1.pdf".to_string(),
            })
            .await;
        let file = fetched.result.unwrap();
        assert_eq!(file, dir.path().join("bab1.pdf"));
        assert_eq!(std::fs::read(file).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn fetcher_reports_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher =
            DocumentFetcher::new(Arc::new(FakeBackend::default()), dir.path().to_path_buf());
        let fetched = fetcher
            .fetch(FetchTicket {
                generation: 3,
                path: "hilang.pdf".to_string(),
            })
            .await;
        assert_eq!(fetched.ticket.generation, 3);
        assert!(fetched.result.is_err());
    }

    #[test]
    fn cache_names_stay_inside_directory() {
        assert_eq!(cache_file_name("a/b/c.pdf"), "c.pdf");
        assert_eq!(cache_file_name("a/.."), "document.pdf");
        assert_eq!(cache_file_name("dir/"), "document.pdf");
    }
}
