mod comment;
pub use comment::{Comment, CommentNode};

mod error;
pub use error::Error;

mod http;
pub use http::HttpCommentService;

mod render;
pub use render::{CommentRenderer, Notification, NotificationKind, RenderedComment, ThreadView};

mod service;
pub use service::{AuthContext, CommentService};

mod thread;
pub use thread::{CommentThread, ReplyState};

mod tree;
pub use tree::{CommentTree, DepthFirst};

pub mod api {
    pub use naagrik_api::*;
}
