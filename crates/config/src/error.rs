use std::path::PathBuf;

/// Crate-wide result type for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not in the expected format.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The content parsed but breaks a validation rule.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    /// A required credential is missing or empty.
    #[error("missing credential: {name} is not set")]
    MissingCredential { name: &'static str },
}

impl Error {
    #[must_use]
    pub fn invalid(message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
