use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {exit_code:?}")]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("could not read media duration from {0:?}")]
    InvalidDuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Diagnostic output captured from the failed process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
