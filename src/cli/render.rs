use std::fmt::Write;

use chrono_tz::Tz;

use crate::{
    domain::{ChatMessage, Sender, SessionSummary},
    preview::{DocumentState, PreviewView},
};

pub const NO_SNIPPET_TEXT: &str =
    "Tidak ada kutipan teks spesifik yang terkait dengan halaman ini.";

pub fn render_message(message: &ChatMessage, tz: &Tz) -> String {
    let speaker = match message.sender {
        Sender::User => "Anda",
        Sender::Bot => "Studiva",
    };
    let mut out = match message.sent_at.filter(|_| !message.from_history) {
        Some(sent_at) => format!(
            "[{}] {speaker}: ",
            sent_at.with_timezone(tz).format("%H:%M")
        ),
        None => format!("{speaker}: "),
    };
    out.push_str(&message.text);

    if message.sender == Sender::Bot && !message.sources.is_empty() {
        out.push_str("\nSumber:");
        for (index, source) in message.sources.iter().enumerate() {
            let pages = source
                .relevant_pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(out, "\n  [{}] {}", index + 1, source.file_name());
            if !pages.is_empty() {
                let _ = write!(out, "  Halaman: {pages}");
            }
        }
    }
    out
}

pub fn render_sessions(sessions: &[SessionSummary], current: Option<&str>) -> String {
    if sessions.is_empty() {
        return "Belum ada riwayat chat.".to_string();
    }
    let mut out = String::from("Riwayat Chat:");
    for (index, session) in sessions.iter().enumerate() {
        let marker = if current == Some(session.id.as_str()) {
            '*'
        } else {
            ' '
        };
        let name = if session.name.trim().is_empty() {
            "(tanpa judul)"
        } else {
            session.name.as_str()
        };
        let _ = write!(out, "\n{marker} {}. {name}", index + 1);
    }
    out
}

pub fn render_preview(view: &PreviewView) -> String {
    let mut out = format!("== {} ==", view.file_name);
    let Some(page) = view.visible_page else {
        out.push_str("\nDokumen ini tidak memiliki halaman relevan.");
        return out;
    };

    let _ = write!(out, "\nKonteks Relevan dari Halaman {page}");
    if view.snippets.is_empty() {
        let _ = write!(out, "\n  {NO_SNIPPET_TEXT}");
    } else {
        for snippet in &view.snippets {
            let _ = write!(out, "\n  \"{snippet}\"");
        }
    }

    let _ = write!(
        out,
        "\nHalaman {page} ({}/{} halaman relevan)",
        view.position, view.total
    );
    match &view.document {
        DocumentState::Loading => out.push_str("\nMemuat dokumen..."),
        DocumentState::Ready(file) => {
            let _ = write!(out, "\nBerkas: {}", file.display());
        }
    }

    let mut hints = Vec::new();
    if view.can_go_previous {
        hints.push("/prev");
    }
    if view.can_go_next {
        hints.push("/next");
    }
    hints.push("/close");
    let _ = write!(out, "\n{}", hints.join("  "));
    out
}
