/*!
 * H.264 Annex-B elementary streams.
 *
 * [`AvcFrameParser`] splits a start-code delimited byte stream into NAL units, groups them into
 * access units and derives each frame's display order from its picture order count.
 */

pub mod bitstream;
pub mod frame_parser;
pub mod nal;
pub mod sps;

use derive_more::Display;
use thiserror::Error;

pub use self::frame_parser::AvcFrameParser;

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AvcError {
    pub(crate) kind: AvcErrorKind,
    pub(crate) message: String,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AvcErrorKind {
    #[display("bitstream ended early")]
    Truncated,
    #[display("invalid syntax element")]
    InvalidValue,
    #[display("unknown parameter set")]
    MissingParameterSet,
}

impl AvcError {
    pub(crate) fn new(kind: AvcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> AvcErrorKind {
        self.kind
    }
}
