use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static PURE_MATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\s+\-*/^().e]+$").expect("valid math regex"));

const GREETINGS: &[&str] = &[
    "hi",
    "hai",
    "halo",
    "hello",
    "hey",
    "selamat pagi",
    "selamat siang",
    "selamat sore",
    "selamat malam",
    "good morning",
    "good afternoon",
    "good evening",
];

const MATH_START_KEYWORDS: &[&str] = &[
    "hitung",
    "berapakah",
    "berapa hasil dari",
    "tentukan nilai dari",
    "calculate",
    "compute",
    "what is the result of",
    "determine the value of",
];

const QUIZ_KEYWORDS: &[&str] = &[
    "buatkan soal",
    "generate soal",
    "bikin kuis",
    "buatkan pertanyaan",
    "create a question",
    "create questions",
    "generate quiz",
    "make a quiz",
];

const FOLLOW_UP_KEYWORDS: &[&str] = &[
    "soal tambahan",
    "beri lagi",
    "soal lain",
    "tambah lagi soalnya",
    "generate lagi",
    "buatkan lagi",
    "more questions",
    "another question",
    "give me more",
    "generate more",
];

const TOPIC_DELIMITERS: &[&str] = &["tentang ", "about "];

const MATH_MAX_CHARS: usize = 100;
const MATH_KEYWORD_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentCategory {
    Greeting,
    MathExpression,
    NewQuizRequest,
    FollowUpQuizRequest,
    GeneralChat,
}

impl IntentCategory {
    pub fn label(&self) -> &'static str {
        match self {
            IntentCategory::Greeting => "greeting",
            IntentCategory::MathExpression => "math",
            IntentCategory::NewQuizRequest => "quiz",
            IntentCategory::FollowUpQuizRequest => "quiz_follow_up",
            IntentCategory::GeneralChat => "chat",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a typed message should be routed, with whatever the route needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    MathExpression,
    NewQuizRequest {
        topic: String,
        request_detail: String,
    },
    FollowUpQuizRequest {
        topic: String,
        request_detail: String,
    },
    GeneralChat,
}

impl Intent {
    pub fn category(&self) -> IntentCategory {
        match self {
            Intent::Greeting => IntentCategory::Greeting,
            Intent::MathExpression => IntentCategory::MathExpression,
            Intent::NewQuizRequest { .. } => IntentCategory::NewQuizRequest,
            Intent::FollowUpQuizRequest { .. } => IntentCategory::FollowUpQuizRequest,
            Intent::GeneralChat => IntentCategory::GeneralChat,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            Intent::NewQuizRequest { topic, .. } | Intent::FollowUpQuizRequest { topic, .. } => {
                Some(topic)
            }
            _ => None,
        }
    }

    pub fn request_detail(&self) -> Option<&str> {
        match self {
            Intent::NewQuizRequest { request_detail, .. }
            | Intent::FollowUpQuizRequest { request_detail, .. } => Some(request_detail),
            _ => None,
        }
    }
}

/// The most recently requested quiz topic of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizMemory {
    last_topic: Option<String>,
}

impl QuizMemory {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            last_topic: Some(topic.into()),
        }
    }

    /// Empty topics count as absent.
    pub fn last_topic(&self) -> Option<&str> {
        self.last_topic.as_deref().filter(|topic| !topic.is_empty())
    }
}

type Rule = fn(&str, &QuizMemory) -> Option<Intent>;

/// Evaluated top to bottom; the first rule that produces an intent wins.
const RULES: &[(IntentCategory, Rule)] = &[
    (IntentCategory::Greeting, greeting_rule),
    (IntentCategory::MathExpression, math_rule),
    (IntentCategory::NewQuizRequest, new_quiz_rule),
    (IntentCategory::FollowUpQuizRequest, follow_up_quiz_rule),
];

/// Classifies `input` and returns the quiz memory the conversation should
/// carry forward. New quiz requests replace the remembered topic; every other
/// intent leaves it as it was.
pub fn classify(input: &str, memory: &QuizMemory) -> (Intent, QuizMemory) {
    let intent = RULES
        .iter()
        .find_map(|(_, rule)| rule(input, memory))
        .unwrap_or(Intent::GeneralChat);

    let next_memory = match &intent {
        Intent::NewQuizRequest { topic, .. } => QuizMemory::with_topic(topic.clone()),
        _ => memory.clone(),
    };

    (intent, next_memory)
}

fn greeting_rule(input: &str, _memory: &QuizMemory) -> Option<Intent> {
    is_greeting(input).then_some(Intent::Greeting)
}

fn math_rule(input: &str, _memory: &QuizMemory) -> Option<Intent> {
    is_math_expression(input).then_some(Intent::MathExpression)
}

fn new_quiz_rule(input: &str, _memory: &QuizMemory) -> Option<Intent> {
    if !contains_any(input, QUIZ_KEYWORDS) {
        return None;
    }
    Some(Intent::NewQuizRequest {
        topic: extract_topic(input),
        request_detail: input.to_string(),
    })
}

fn follow_up_quiz_rule(input: &str, memory: &QuizMemory) -> Option<Intent> {
    let topic = memory.last_topic()?;
    if !contains_any(input, FOLLOW_UP_KEYWORDS) {
        return None;
    }
    Some(Intent::FollowUpQuizRequest {
        topic: topic.to_string(),
        request_detail: format!(
            "Beri saya beberapa soal tambahan tentang {topic} yang berbeda dari sebelumnya."
        ),
    })
}

pub(crate) fn is_greeting(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
}

/// Word problems tend to be long or multi-line, so only short single-line
/// inputs are ever treated as arithmetic.
pub(crate) fn is_math_expression(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    let length = normalized.chars().count();
    if length > MATH_MAX_CHARS || normalized.contains('\n') {
        return false;
    }

    if PURE_MATH_REGEX.is_match(&normalized) {
        return true;
    }

    length < MATH_KEYWORD_MAX_CHARS
        && MATH_START_KEYWORDS
            .iter()
            .any(|keyword| normalized.starts_with(keyword))
}

fn contains_any(input: &str, keywords: &[&str]) -> bool {
    let lowered = input.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Text after the earliest topic delimiter, or the whole input when there is
/// none. Delimiters are ASCII so byte offsets survive the case fold.
pub(crate) fn extract_topic(input: &str) -> String {
    let trimmed = input.trim();
    let folded = trimmed.to_ascii_lowercase();
    TOPIC_DELIMITERS
        .iter()
        .filter_map(|delimiter| folded.find(delimiter).map(|at| at + delimiter.len()))
        .min()
        .map(|start| trimmed[start..].trim())
        .filter(|topic| !topic.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}
