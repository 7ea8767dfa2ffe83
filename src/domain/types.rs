use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A document the backend cited for an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub path: String,
    #[serde(default)]
    pub relevant_pages: Vec<u32>,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
}

impl Source {
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    #[serde(default)]
    pub pages: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(skip)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub from_history: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            sources: Vec::new(),
            sent_at: Some(Utc::now()),
            from_history: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::bot_with_sources(text, Vec::new())
    }

    pub fn bot_with_sources(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            sources,
            sent_at: Some(Utc::now()),
            from_history: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Last path segment, used as the display name of a cited document.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Backend identifiers arrive either as JSON strings or as integers.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(value) => value,
        Raw::Int(value) => value.to_string(),
        Raw::Uint(value) => value.to_string(),
    })
}

pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(value)| value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_parses_backend_shape() {
        let raw = r#"{
            "path": "materi/kelas10/biologi.pdf",
            "relevant_pages": [2, 5, 9],
            "snippets": [{"text": "Fotosintesis terjadi di kloroplas", "pages": [2, 5]}],
            "score": 0.82
        }"#;
        let source: Source = serde_json::from_str(raw).unwrap();
        assert_eq!(source.file_name(), "biologi.pdf");
        assert_eq!(source.relevant_pages, vec![2, 5, 9]);
        assert_eq!(source.snippets[0].pages, vec![2, 5]);
    }

    #[test]
    fn session_id_accepts_numbers() {
        let session: SessionSummary =
            serde_json::from_str(r#"{"id": 42, "name": "Fotosintesis"}"#).unwrap();
        assert_eq!(session.id, "42");
    }

    #[test]
    fn file_name_without_directory_is_itself() {
        assert_eq!(file_name_of("modul.pdf"), "modul.pdf");
    }
}
