#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Please enter a YouTube URL")]
    EmptyUrl,
    #[error("Please enter a valid YouTube URL")]
    InvalidUrl,
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered, but reported a failure.
    #[error("{0}")]
    Server(String),
    #[error("There is no previous request to retry")]
    NothingToRetry,
    #[error("Failed to save the file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to download file, it was not found: {0}")]
    ArtifactNotFound(String),
}

impl ClientError {
    /// Validation errors are caught before anything is sent to the backend.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::EmptyUrl | ClientError::InvalidUrl)
    }

    /// The text shown in the error panel.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(err) => format!("Server error: {}", err),
            other => other.to_string(),
        }
    }
}
