use std::path::PathBuf;

use crate::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum KilibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Project directory not found: {}", .0.display())]
    ProjectNotFound(PathBuf),
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Invalid replace pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ParseError> for KilibError {
    fn from(e: ParseError) -> Self {
        KilibError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for KilibError {
    fn from(e: serde_json::Error) -> Self {
        KilibError::Config(e.to_string())
    }
}
