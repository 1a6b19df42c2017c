use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Conditions that end the run. The session is released and the process
/// exits non-zero.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("login timed out waiting for {0}")]
    LoginTimeout(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("no post container appeared within {0:?}")]
    FeedTimeout(Duration),

    #[error("browser: {0}")]
    Browser(#[from] anyhow::Error),
}

/// A single post that could not be processed. The batch moves on.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("post #{index} html unavailable: {reason}")]
    Unreadable { index: usize, reason: String },
}
