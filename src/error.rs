use std::fmt::Display;
use std::io;

use serde::ser;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("could not fetch property `{property}`: {reason}")]
    PropertyFetch { property: String, reason: String },
    #[error("enumeration failed: {0}")]
    Enumeration(String),
    #[error("string conversion failed: {0}")]
    StringConversion(String),
    #[error("the serialization was stopped")]
    Cancelled,
    #[error("output writer failed: {0}")]
    Writer(String),
    #[error("session cannot be used after a failed item")]
    SessionPoisoned,
    #[error("error serializing: {0}")]
    Serializing(String),
}

impl Error {
    /// Errors that abort the current top-level item. Everything else is
    /// recovered where it happens.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::Cancelled
                | Error::Writer(_)
                | Error::SessionPoisoned
                | Error::Serializing(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Writer(err.to_string())
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Serializing(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;
    use test_log::test;

    #[test]
    fn io_errors_become_writer_errors() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err, Error::Writer("pipe closed".to_owned()));
        assert!(err.is_fatal());
    }

    #[test]
    fn local_errors_are_not_fatal() {
        let fetch = Error::PropertyFetch {
            property: "Size".to_owned(),
            reason: "access denied".to_owned(),
        };
        assert!(!fetch.is_fatal());
        assert!(!Error::Enumeration("reset".to_owned()).is_fatal());
        assert!(!Error::StringConversion("overflow".to_owned()).is_fatal());
        assert_eq!(
            fetch.to_string(),
            "could not fetch property `Size`: access denied"
        );
    }
}
