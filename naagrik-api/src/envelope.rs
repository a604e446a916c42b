//! Response envelopes of the comment service.
//!
//! The backend is not consistent about where it puts payloads: a listing may
//! come back as `{"data": {"comments": [...]}}`, as `{"comments": [...]}` or
//! as a bare array. Bodies are parsed once here, in that order of preference.

use crate::{Comment, DeleteOutcome};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum CommentsBody {
    Keyed { comments: Vec<Comment> },
    List(Vec<Comment>),
}

impl CommentsBody {
    pub fn into_comments(self) -> Vec<Comment> {
        match self {
            CommentsBody::Keyed { comments } => comments,
            CommentsBody::List(comments) => comments,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum CommentBody {
    Keyed { comment: Comment },
    Plain(Comment),
}

impl CommentBody {
    pub fn into_comment(self) -> Comment {
        match self {
            CommentBody::Keyed { comment } => comment,
            CommentBody::Plain(comment) => comment,
        }
    }
}

pub fn parse_comments(body: &[u8]) -> serde_json::Result<Vec<Comment>> {
    serde_json::from_slice::<Envelope<CommentsBody>>(body)
        .map(|e| e.into_inner().into_comments())
}

pub fn parse_comment(body: &[u8]) -> serde_json::Result<Comment> {
    serde_json::from_slice::<Envelope<CommentBody>>(body).map(|e| e.into_inner().into_comment())
}

pub fn parse_delete_outcome(body: &[u8]) -> serde_json::Result<DeleteOutcome> {
    serde_json::from_slice::<Envelope<DeleteOutcome>>(body).map(Envelope::into_inner)
}
