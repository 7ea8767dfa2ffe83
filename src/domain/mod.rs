pub mod intent;
pub mod navigator;
pub mod types;

pub use intent::{classify, Intent, QuizMemory};
pub use navigator::PageNavigator;
pub use types::{ChatMessage, Sender, SessionSummary, Source};
