use async_trait::async_trait;

use crate::{
    api::{self, CommentId, DeleteOutcome, FetchOptions, IssueId, NewComment, NewFlag, UserId},
    Error,
};

/// The remote comment service, as consumed by a comment thread.
///
/// Every call is plain request/response. Implementations never retry.
#[async_trait]
pub trait CommentService: Send + Sync {
    /// Lists the comments of an issue, nested, top level sorted per `opts`
    async fn fetch_comments(
        &self,
        issue: &IssueId,
        opts: FetchOptions,
    ) -> Result<Vec<api::Comment>, Error>;

    /// Returns the canonical comment as stored by the server
    async fn create_comment(
        &self,
        issue: &IssueId,
        comment: NewComment,
    ) -> Result<api::Comment, Error>;

    /// Deletes the comment and, server-side, all of its replies
    async fn delete_comment(&self, comment: &CommentId) -> Result<DeleteOutcome, Error>;

    async fn flag_comment(&self, comment: &CommentId, flag: NewFlag) -> Result<(), Error>;
}

/// Whether the current user is signed in, checked before any mutation.
///
/// The bearer token itself travels with the service, out of band.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuthContext {
    authenticated: bool,
    user: Option<UserId>,
}

impl AuthContext {
    pub fn anonymous() -> AuthContext {
        AuthContext::default()
    }

    /// Signed in, without knowing as whom
    pub fn authenticated() -> AuthContext {
        AuthContext {
            authenticated: true,
            user: None,
        }
    }

    pub fn as_user(user: UserId) -> AuthContext {
        AuthContext {
            authenticated: true,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }
}
