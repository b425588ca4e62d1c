use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidConfiguration {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn protocol_violation(operation: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::ProtocolViolation {
                operation: operation.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn pool_shutdown() -> Error {
        Error(ErrorKind::PoolShutdown.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` for errors caused by bad construction arguments.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidConfiguration { .. })
    }

    /// Returns `true` for errors caused by misuse of a synchronization primitive.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ProtocolViolation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid configuration {name}: {message}")]
    InvalidConfiguration { name: String, message: String },

    #[error("protocol violation in {operation}: {message}")]
    ProtocolViolation { operation: String, message: String },

    #[error("thread pool is shut down and no longer accepts work")]
    PoolShutdown,

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let e = Error::invalid_config("concurrency", "concurrency > 0");
        assert!(e.is_invalid_config());
        assert!(!e.is_protocol_violation());
        assert_eq!(
            e.to_string(),
            "invalid configuration concurrency: concurrency > 0"
        );

        let e = Error::protocol_violation("release", "gate already open");
        assert!(e.is_protocol_violation());
        match e.into_kind() {
            ErrorKind::ProtocolViolation { operation, .. } => assert_eq!(operation, "release"),
            other => panic!("unexpected kind {other:?}"),
        }

        assert!(matches!(
            Error::pool_shutdown().kind(),
            ErrorKind::PoolShutdown
        ));
    }
}
