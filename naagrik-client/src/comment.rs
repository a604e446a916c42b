use std::sync::Arc;

use crate::api::{self, CommentId, Time, UserId};

/// The data of a comment, independent of its position in the thread
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub created_at: Time,
    pub is_flagged: bool,
    pub vote_score: Option<i64>,
}

impl Comment {
    /// Splits a server comment into its own data and its nested replies
    pub fn split(c: api::Comment) -> (Comment, Vec<api::Comment>) {
        (
            Comment {
                id: c.id,
                content: c.content,
                author_id: c.author_id,
                author_name: c.author_name,
                author_avatar_url: c.author_avatar_url,
                created_at: c.created_at,
                is_flagged: c.is_flagged,
                vote_score: c.vote_score,
            },
            c.replies,
        )
    }
}

/// A comment placed in the arena of a `CommentTree`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Arc<Comment>,
    pub parent: Option<CommentId>,

    /// Direct replies, in submission order
    pub children: im::Vector<CommentId>,
}

impl CommentNode {
    pub fn id(&self) -> &CommentId {
        &self.comment.id
    }

    pub fn reply_count(&self) -> usize {
        self.children.len()
    }

    pub fn to_api(&self, replies: Vec<api::Comment>) -> api::Comment {
        let c = &*self.comment;
        api::Comment {
            id: c.id.clone(),
            content: c.content.clone(),
            author_id: c.author_id.clone(),
            author_name: c.author_name.clone(),
            author_avatar_url: c.author_avatar_url.clone(),
            created_at: c.created_at,
            parent_id: self.parent.clone(),
            reply_count: replies.len(),
            replies,
            is_flagged: c.is_flagged,
            vote_score: c.vote_score,
        }
    }
}
