pub mod commands;
pub mod render;

pub use commands::{parse_line, resolve_session, Command, CommandError, HELP_TEXT};
