use derive_more::Display;
use thiserror::Error;

use crate::{parser::ParseError, writer::WriteError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of an edit, mux or append operation.
#[derive(Debug, Error)]
#[error("{kind}{}", self.context.as_ref().map(|c| format!(": {c}")).unwrap_or_default())]
pub struct Error {
    kind: ErrorKind,
    /// Path, file or command the error relates to
    context: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("atom not found")]
    NotFound,
    #[display("atom is not a container")]
    NotAContainer,
    #[display("I/O failure")]
    Io,
    #[display("parse failure")]
    Parse,
    #[display("no codec configuration found")]
    MissingCodecConfig,
    #[display("invalid command")]
    InvalidCommand,
    #[display("no matching track")]
    MissingTrack,
    #[display("invalid movie")]
    InvalidMovie,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: Some(context.into()),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub(crate) fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Prefixes the context with `context`, e.g. the file an I/O error happened on.
    pub(crate) fn context_for(mut self, context: impl std::fmt::Display) -> Self {
        self.context = Some(match self.context.take() {
            Some(existing) => format!("{context}: {existing}"),
            None => context.to_string(),
        });
        self
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self {
            kind: ErrorKind::Parse,
            context: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<WriteError> for Error {
    fn from(err: WriteError) -> Self {
        Self {
            kind: ErrorKind::Io,
            context: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            context: None,
            source: Some(Box::new(err)),
        }
    }
}

/// Attaches a context (file name, atom path) to errors converted into [`Error`].
pub(crate) trait ResultExt<T> {
    fn context_for(self, context: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context_for(self, context: impl std::fmt::Display) -> Result<T> {
        self.map_err(|err| err.into().context_for(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = Error::new(ErrorKind::NotFound, "moov/trak[3]");
        assert_eq!(err.to_string(), "atom not found: moov/trak[3]");

        let io: Result<()> = Err(std::io::Error::other("denied")).context_for("in.mp4");
        let err = io.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "I/O failure: in.mp4");
    }
}
