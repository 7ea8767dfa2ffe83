use thiserror::Error;

use crate::domain::SessionSummary;

pub const VALID_GRADES: &[&str] = &["10", "11", "12"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Login {
        name: String,
        password: String,
    },
    Signup {
        name: String,
        nisn: String,
        grade: String,
        password: String,
    },
    Logout,
    Sessions,
    Open(String),
    New,
    Delete(String),
    Source {
        index: usize,
        page: u32,
    },
    Next,
    Prev,
    Close,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("penggunaan: {0}")]
    Usage(&'static str),
    #[error("perintah tidak dikenal: /{0}")]
    Unknown(String),
    #[error("kelas harus 10, 11, atau 12 (diberikan: {0})")]
    InvalidGrade(String),
}

pub const HELP_TEXT: &str = "\
Ketik pertanyaan untuk mengobrol dengan Studiva.AI, atau gunakan perintah:
  /login <nama> <kata sandi>               masuk
  /signup <nama> <nisn> <kelas> <sandi>    daftar (kelas 10, 11, atau 12)
  /logout                                  keluar
  /sessions                                riwayat chat
  /open <nomor|id>                         buka sesi
  /new                                     chat baru
  /delete <nomor|id>                       hapus sesi
  /source <nomor sumber> <halaman>         pratinjau halaman sumber
  /next, /prev                             halaman relevan berikutnya/sebelumnya
  /close                                   tutup pratinjau
  /help                                    bantuan
  /quit                                    keluar dari aplikasi";

/// Parses one input line. Blank lines yield `None`; anything not starting
/// with `/` is a chat message.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Message(line.trim_end_matches(['\r', '\n']).to_string())));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match (name.as_str(), args.as_slice()) {
        ("login", [name, password]) => Command::Login {
            name: name.to_string(),
            password: password.to_string(),
        },
        ("login", _) => return Err(CommandError::Usage("/login <nama> <kata sandi>")),
        ("signup", [name, nisn, grade, password]) => {
            if !VALID_GRADES.contains(grade) {
                return Err(CommandError::InvalidGrade(grade.to_string()));
            }
            Command::Signup {
                name: name.to_string(),
                nisn: nisn.to_string(),
                grade: grade.to_string(),
                password: password.to_string(),
            }
        }
        ("signup", _) => {
            return Err(CommandError::Usage(
                "/signup <nama> <nisn> <kelas> <kata sandi>",
            ))
        }
        ("logout", []) => Command::Logout,
        ("sessions", []) => Command::Sessions,
        ("open", [target]) => Command::Open(target.to_string()),
        ("open", _) => return Err(CommandError::Usage("/open <nomor|id>")),
        ("new", []) => Command::New,
        ("delete", [target]) => Command::Delete(target.to_string()),
        ("delete", _) => return Err(CommandError::Usage("/delete <nomor|id>")),
        ("source", [index, page]) => match (index.parse::<usize>(), page.parse::<u32>()) {
            (Ok(index), Ok(page)) if index > 0 => Command::Source { index, page },
            _ => return Err(CommandError::Usage("/source <nomor sumber> <halaman>")),
        },
        ("source", _) => return Err(CommandError::Usage("/source <nomor sumber> <halaman>")),
        ("next", []) => Command::Next,
        ("prev", []) => Command::Prev,
        ("close", []) => Command::Close,
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// A 1-based position in the listed sessions, or a raw session id.
pub fn resolve_session(target: &str, sessions: &[SessionSummary]) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| sessions.get(index))
        .map(|session| session.id.clone())
        .unwrap_or_else(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_line("apa itu fotosintesis?\n").unwrap(),
            Some(Command::Message("apa itu fotosintesis?".to_string()))
        );
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn login_needs_two_arguments() {
        assert_eq!(
            parse_line("/login andi rahasia").unwrap(),
            Some(Command::Login {
                name: "andi".to_string(),
                password: "rahasia".to_string()
            })
        );
        assert!(matches!(parse_line("/login andi"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn signup_validates_grade() {
        assert!(matches!(
            parse_line("/signup andi 0051234567 11 rahasia").unwrap(),
            Some(Command::Signup { grade, .. }) if grade == "11"
        ));
        assert_eq!(
            parse_line("/signup andi 0051234567 9 rahasia"),
            Err(CommandError::InvalidGrade("9".to_string()))
        );
    }

    #[test]
    fn source_requires_positive_index() {
        assert_eq!(
            parse_line("/source 1 5").unwrap(),
            Some(Command::Source { index: 1, page: 5 })
        );
        assert!(parse_line("/source 0 5").is_err());
        assert!(parse_line("/source satu 5").is_err());
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_line("/NEXT").unwrap(), Some(Command::Next));
        assert_eq!(parse_line("/Quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            parse_line("/dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn session_targets_resolve_by_position_or_id() {
        let sessions = vec![
            SessionSummary {
                id: "abc".to_string(),
                name: "Biologi".to_string(),
            },
            SessionSummary {
                id: "def".to_string(),
                name: "Sejarah".to_string(),
            },
        ];
        assert_eq!(resolve_session("2", &sessions), "def");
        assert_eq!(resolve_session("abc", &sessions), "abc");
        assert_eq!(resolve_session("7", &sessions), "7");
        assert_eq!(resolve_session("0", &sessions), "0");
    }
}
