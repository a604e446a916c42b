use anyhow::anyhow;

use crate::api::{self, CommentId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed fetching comments")]
    Fetch(#[source] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error(transparent)]
    Remote(#[from] anyhow::Error),

    #[error("comment {0} is not part of this thread")]
    UnknownComment(CommentId),

    #[error("no reply is being composed on comment {0}")]
    NotComposing(CommentId),

    #[error("an operation is already in flight for this comment")]
    InFlight,

    #[error("operation cancelled, the thread was closed")]
    Cancelled,
}

impl Error {
    pub fn login_required(action: &str) -> Error {
        Error::Auth(format!("Please login to {action}."))
    }

    /// Folds any failure of a listing request into a fetch error
    pub fn into_fetch(self) -> Error {
        match self {
            Error::Fetch(e) => Error::Fetch(e),
            Error::Remote(e) => Error::Fetch(e),
            Error::Cancelled => Error::Cancelled,
            e => Error::Fetch(anyhow!("{e}")),
        }
    }

    /// Message to show the user, `fallback` covering failures they cannot act on
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Error::Validation(msg) | Error::Auth(msg) => msg.clone(),
            Error::Fetch(_) => String::from("Failed to load comments."),
            _ => String::from(fallback),
        }
    }

    /// Whether the user should be told about this error at all
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::InFlight)
    }
}

impl From<api::Error> for Error {
    fn from(e: api::Error) -> Error {
        match e {
            api::Error::Unauthenticated => Error::Auth(String::from("Please login to continue.")),
            api::Error::PermissionDenied => {
                Error::Auth(String::from("You are not allowed to do that."))
            }
            api::Error::InvalidContent(msg) => Error::Validation(msg),
            api::Error::NullByteInString(_) => {
                Error::Validation(String::from("Text must not contain null characters."))
            }
            api::Error::NotFound(what) => Error::Remote(anyhow!("not found: {what}")),
            api::Error::Unknown(msg) => Error::Remote(anyhow!("server error: {msg}")),
        }
    }
}
