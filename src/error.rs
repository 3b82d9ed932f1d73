use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

/// Malformed SQL, as reported by the scanner or the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{}", position_prefix(.position), .message)]
pub struct SyntaxError {
    pub message: String,
    pub position: Option<Position>,
}

impl SyntaxError {
    pub fn at(line: u32, col: u32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: Some(Position { line, col }),
        }
    }
}

fn position_prefix(position: &Option<Position>) -> String {
    match position {
        Some(pos) => format!("[line {}, col {}] ", pos.line, pos.col),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote service responded with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Table reference extraction failed: {0}")]
    Extraction(String),

    #[error("Job failed: {}", .message.as_deref().unwrap_or("unspecified error"))]
    JobFailed { message: Option<String> },

    #[error("Query timed out after {elapsed_ms} ms: {sql}")]
    Timeout { elapsed_ms: u64, sql: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::at(2, 7, "Error at 'form': Expected `FROM`.");
        assert_eq!(
            err.to_string(),
            "[line 2, col 7] Error at 'form': Expected `FROM`."
        );
        let err = SyntaxError {
            message: "Empty SQL.".to_owned(),
            position: None,
        };
        assert_eq!(err.to_string(), "Empty SQL.");
    }

    #[test]
    fn test_job_failed_display() {
        let err = Error::JobFailed {
            message: Some("boom".to_owned()),
        };
        assert_eq!(err.to_string(), "Job failed: boom");
        let err = Error::JobFailed { message: None };
        assert_eq!(err.to_string(), "Job failed: unspecified error");
    }
}
