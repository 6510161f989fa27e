//! Service-specific error types

use thiserror::Error;

/// Process-level errors. Per-account failures never surface here; they are
/// logged by the supervisor and end only that account's task.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no sessions in {0}; add one with `pitch-farmer add-session PHONE URL`")]
    NoSessions(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = Error::NoSessions("sessions/sessions.json".into());
        assert!(err.to_string().contains("sessions/sessions.json"));
        assert!(err.to_string().contains("add-session"));
    }
}
