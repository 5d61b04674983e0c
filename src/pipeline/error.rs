//! Pipeline error types

/// Error type for pipeline start
#[derive(Debug)]
pub enum PipelineError {
    /// The slot already has an active pipeline session
    AlreadyStreaming,
    /// Filesystem or process-spawn failure while setting up the pipeline
    Io(std::io::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::AlreadyStreaming => write!(f, "slot already has an active stream"),
            PipelineError::Io(e) => write!(f, "pipeline I/O error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(e) => Some(e),
            PipelineError::AlreadyStreaming => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e)
    }
}
