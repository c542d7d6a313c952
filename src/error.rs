// WHY: one error taxonomy for the container, the offset engine and the session
// Callers decide on retry/restart; nothing in here retries on its own

use std::time::Duration;

use thiserror::Error;

use crate::annotators::Annotator;

/// Errors produced while talking to the annotator or reading its output
#[derive(Error, Debug)]
pub enum Error {
    /// The annotator never printed its ready prompt after launch
    #[error("annotator did not become ready within {0:?}")]
    StartupTimeout(Duration),

    /// The ready prompt was not seen after a request was sent
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The response carried no structured payload, or it failed to parse
    #[error("malformed annotator response: {0}")]
    MalformedResponse(String),

    /// Request text that would break prompt-delimited turn-taking
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation attempted after `shutdown()`
    #[error("annotator session is closed")]
    SessionClosed,

    /// An earlier request failed mid-turn; the stream position is unknown
    #[error("annotator session is desynchronized and must be restarted")]
    Desynchronized,

    /// Slice bounds outside `[0, len]` or reversed
    #[error("slice [{start}, {end}) out of range for {len} tokens")]
    IndexOutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },

    /// Tag view requested for an annotator that was not part of the request
    #[error("annotation '{0}' was not computed")]
    UnavailableAnnotation(Annotator),

    /// Sentence split requested on a container without the full response
    #[error("no annotator response available for sentence splitting")]
    NoResponseAvailable,

    /// The annotator output stream ended before the prompt appeared
    #[error("annotator process exited")]
    ProcessExited,

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the failure leaves the session's turn-taking state unknown
    pub fn desynchronizes(&self) -> bool {
        matches!(
            self,
            Error::ProtocolError(_) | Error::ProcessExited | Error::Io(_)
        )
    }
}
