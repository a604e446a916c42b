use std::{collections::HashMap, sync::Arc};

use crate::{
    api::{CommentId, SortBy},
    Comment, CommentTree, ReplyState,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient message for the user, i.e. a toast
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Notification {
        Notification {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Notification {
        Notification {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderedComment {
    /// 0 for a top-level comment
    pub depth: usize,

    /// Shared with the thread's tree: an unchanged comment keeps the same
    /// allocation across views, so `Arc::ptr_eq` tells what to re-render
    pub comment: Arc<Comment>,
    pub reply_count: usize,
    pub state: ReplyState,
}

/// Everything a view layer needs to draw one thread
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ThreadView {
    pub sort_by: SortBy,
    pub loaded: bool,

    /// Depth-first, replies right after their parent
    pub comments: Vec<RenderedComment>,

    /// Top-level composer
    pub draft: String,
    pub posting: bool,
}

/// Consumer of the recursive rendering contract: every comment is rendered
/// once, after all of its replies, which it receives in order.
pub trait CommentRenderer {
    type Output;

    fn render(&mut self, comment: &RenderedComment, replies: Vec<Self::Output>) -> Self::Output;
}

impl ThreadView {
    pub(crate) fn build(
        tree: &CommentTree,
        states: &HashMap<CommentId, ReplyState>,
        sort_by: SortBy,
        loaded: bool,
        draft: &str,
        posting: bool,
    ) -> ThreadView {
        ThreadView {
            sort_by,
            loaded,
            comments: tree
                .depth_first()
                .map(|(depth, node)| RenderedComment {
                    depth,
                    comment: node.comment.clone(),
                    reply_count: node.reply_count(),
                    state: states.get(node.id()).cloned().unwrap_or_default(),
                })
                .collect(),
            draft: String::from(draft),
            posting,
        }
    }

    pub fn find(&self, id: &CommentId) -> Option<&RenderedComment> {
        self.comments.iter().find(|c| c.comment.id == *id)
    }

    /// Renders the top-level comments, each with its rendered replies
    pub fn render_with<R: CommentRenderer>(&self, renderer: &mut R) -> Vec<R::Output> {
        // walking the preorder backwards, the replies of a comment are exactly
        // the entries one level deeper sitting on top of the stack
        let mut stack: Vec<(usize, R::Output)> = Vec::new();
        for c in self.comments.iter().rev() {
            let mut replies = Vec::new();
            while stack.last().map_or(false, |(d, _)| *d == c.depth + 1) {
                if let Some((_, out)) = stack.pop() {
                    replies.push(out);
                }
            }
            stack.push((c.depth, renderer.render(c, replies)));
        }
        stack.into_iter().rev().map(|(_, out)| out).collect()
    }
}
