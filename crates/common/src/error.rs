use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubwatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("hub error: {0}")]
    Hub(String),

    #[error("tracker error: {0}")]
    Tracker(String),

    #[error("conversion error: {0}")]
    Conversion(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HubwatchError {
    /// Configuration errors abort a run before any mutation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HubwatchError::Config(_))
    }
}

pub type HubwatchResult<T> = Result<T, HubwatchError>;
