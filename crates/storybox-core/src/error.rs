//! Error types for Storybox

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("experimental tool not enabled: {0}")]
    ExperimentalDisabled(String),

    #[error("no page loaded")]
    NoPage,

    #[error("settings error: {tool} - {message}")]
    Settings { tool: String, message: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn settings(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Settings {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
