//! Crate-level error types
//!
//! Subsystems with their own failure vocabulary (slot registry, stream
//! pipeline, archive upload) define local error enums; this module holds the
//! top-level error returned by server startup and the shared `Result` alias.

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error (bind failure, socket configuration)
    Io(std::io::Error),
    /// Invalid configuration (unparseable port, bad bind address)
    Config(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::Config("PORT must be a number".into());
        assert_eq!(err.to_string(), "Configuration error: PORT must be a number");
    }

    #[test]
    fn test_io_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
