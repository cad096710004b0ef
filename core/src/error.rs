//! Error type for every client operation.
//!
//! # Design
//! Four families share one enum: transport failures (the exchange did not
//! complete), remote failures (the server answered `-1`), parse failures
//! (the reply did not fit its shape), and local precondition failures that
//! are detected before any request is sent. The enum is `Clone` so the
//! outcome of an asynchronous submission can be read more than once.

use std::io;
use std::sync::Arc;

use crate::parser::ParseError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The HTTP exchange failed: connection refused, reset, unreadable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local I/O failed, e.g. the CAPTCHA file could not be read.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The service answered with a failure document.
    #[error("server error: {message}")]
    Remote {
        message: String,
        status: Option<String>,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no job to respond to")]
    NoActiveJob,

    #[error("no enqueued job found")]
    NoEnqueuedJob,

    #[error("max 1 enqueue connection limit reached")]
    EnqueueLimit,

    #[error("last submitted job has not completed yet")]
    JobInProgress,

    #[error("task has already been submitted")]
    TaskAlreadyStarted,

    #[error("task has not been submitted")]
    NotStarted,

    #[error("timed out waiting for the job to complete")]
    Timeout,

    #[error("submission worker exited without a result")]
    WorkerLost,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for failures detected locally, before any request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::NoActiveJob
                | Error::NoEnqueuedJob
                | Error::EnqueueLimit
                | Error::JobInProgress
                | Error::TaskAlreadyStarted
        )
    }

    /// The server's error status attribute, when this is a remote failure.
    pub fn remote_status(&self) -> Option<&str> {
        match self {
            Error::Remote { status, .. } => status.as_deref(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
