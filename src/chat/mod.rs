pub mod orchestrator;

pub use orchestrator::{ChatError, ChatOrchestrator, SendOutcome};
