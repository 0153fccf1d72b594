use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read game memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write game memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Effect registered twice: {0}")]
    DuplicateEffect(String),

    #[error("Conflict entry for {owner} references unknown effect {id}")]
    UnknownConflictId { owner: String, id: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if this error came from the memory connector
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::MemoryReadFailed { .. } | Error::MemoryWriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_memory_errors_are_transient() {
        let err = Error::MemoryWriteFailed {
            address: 0x2032DF70,
            message: "connector offline".to_string(),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("0x2032df70"));
        assert!(!Error::Config("bad".to_string()).is_transient());
    }
}
