use std::{collections::HashMap, future::Future, str::FromStr, sync::Arc};

use futures::{
    channel::oneshot,
    future::{self, Either, Shared},
    FutureExt,
};
use parking_lot::Mutex;

use crate::{
    api::{
        CommentId, DeleteOutcome, FetchOptions, FlagReason, IssueId, NewComment, NewFlag, SortBy,
    },
    AuthContext, Comment, CommentService, CommentTree, Error, Notification, ThreadView,
};

/// Interaction state of one rendered comment. Absent from the thread means
/// `Viewing`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ReplyState {
    #[default]
    Viewing,
    ComposingReply {
        draft: String,
    },
    SubmittingReply {
        draft: String,
    },
}

impl ReplyState {
    pub fn draft(&self) -> Option<&str> {
        match self {
            ReplyState::Viewing => None,
            ReplyState::ComposingReply { draft } | ReplyState::SubmittingReply { draft } => {
                Some(draft)
            }
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ReplyState::SubmittingReply { .. })
    }
}

/// The comment thread of one issue, as displayed by a view.
///
/// Handles are cheap to clone and share one state, so actions on different
/// comments may be in flight at the same time. Their results are applied by
/// replacing the whole tree, one at a time. No lock is held across a remote
/// call.
pub struct CommentThread<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for CommentThread<S> {
    fn clone(&self) -> CommentThread<S> {
        CommentThread {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    issue: IssueId,
    service: S,
    state: Mutex<ThreadState>,
    lifetime: Lifetime,
}

#[derive(Default)]
struct ThreadState {
    tree: CommentTree,
    sort_by: SortBy,
    loaded: bool,
    replies: HashMap<CommentId, ReplyState>,
    draft: String,
    posting: bool,
    notifications: Vec<Notification>,
}

/// Resolves once the thread is closed, or once every handle is gone
struct Lifetime {
    closer: Mutex<Option<oneshot::Sender<()>>>,
    closed: Shared<oneshot::Receiver<()>>,
}

impl Lifetime {
    fn new() -> Lifetime {
        let (closer, closed) = oneshot::channel();
        Lifetime {
            closer: Mutex::new(Some(closer)),
            closed: closed.shared(),
        }
    }

    fn close(&self) {
        self.closer.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closer.lock().is_none()
    }

    /// Runs `fut` unless the thread gets closed first. `fut` is never polled
    /// once the thread is closed, so no request goes out.
    async fn scope<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        if self.is_closed() {
            return Err(Error::Cancelled);
        }
        let closed = self.closed.clone();
        futures::pin_mut!(fut);
        match future::select(fut, closed).await {
            Either::Left((res, _)) if !self.is_closed() => res,
            _ => Err(Error::Cancelled),
        }
    }
}

fn prepare_comment(
    auth: &AuthContext,
    draft: &str,
    parent: Option<CommentId>,
) -> Result<NewComment, Error> {
    if !auth.is_authenticated() {
        return Err(Error::login_required("comment"));
    }
    let new = NewComment {
        content: String::from(draft.trim()),
        parent_comment_id: parent,
    };
    new.validate()?;
    Ok(new)
}

fn prepare_flag(
    auth: &AuthContext,
    reason: &str,
    details: Option<String>,
) -> Result<NewFlag, Error> {
    if !auth.is_authenticated() {
        return Err(Error::login_required("flag comments"));
    }
    let flag = NewFlag {
        reason: FlagReason::from_str(reason)?,
        details: details
            .map(|d| String::from(d.trim()))
            .filter(|d| !d.is_empty()),
    };
    flag.validate()?;
    Ok(flag)
}

impl<S: CommentService> CommentThread<S> {
    pub fn new(issue: IssueId, service: S) -> CommentThread<S> {
        CommentThread {
            inner: Arc::new(Inner {
                issue,
                service,
                state: Mutex::new(ThreadState::default()),
                lifetime: Lifetime::new(),
            }),
        }
    }

    pub fn issue(&self) -> &IssueId {
        &self.inner.issue
    }

    pub fn service(&self) -> &S {
        &self.inner.service
    }

    /// The current tree; later mutations do not affect the returned value
    pub fn tree(&self) -> CommentTree {
        self.inner.state.lock().tree.clone()
    }

    pub fn sort_by(&self) -> SortBy {
        self.inner.state.lock().sort_by
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().loaded
    }

    pub fn reply_state(&self, id: &CommentId) -> ReplyState {
        self.inner
            .state
            .lock()
            .replies
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn comment_draft(&self) -> String {
        self.inner.state.lock().draft.clone()
    }

    pub fn view(&self) -> ThreadView {
        let st = self.inner.state.lock();
        ThreadView::build(
            &st.tree,
            &st.replies,
            st.sort_by,
            st.loaded,
            &st.draft,
            st.posting,
        )
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.inner.state.lock().notifications)
    }

    /// Ends the thread's lifetime: in-flight actions resolve to
    /// `Error::Cancelled` and leave the thread untouched
    pub fn close(&self) {
        tracing::debug!(issue = ?self.inner.issue, "closing comment thread");
        self.inner.lifetime.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lifetime.is_closed()
    }

    fn notify(&self, n: Notification) {
        self.inner.state.lock().notifications.push(n);
    }

    /// Tells the user about `err`, then hands it back
    fn report(&self, err: Error, fallback: &str) -> Error {
        if err.is_reportable() && !self.is_closed() {
            tracing::info!(issue = ?self.inner.issue, %err, "comment action failed");
            self.notify(Notification::error(err.user_message(fallback)));
        }
        err
    }

    /// Replaces the tree with the server's, sorted per `sort_by`.
    ///
    /// On failure the current tree, sort order included, stays as it was.
    pub async fn load(&self, sort_by: SortBy) -> Result<(), Error> {
        let res = self
            .inner
            .lifetime
            .scope(
                self.inner
                    .service
                    .fetch_comments(&self.inner.issue, FetchOptions::sorted(sort_by)),
            )
            .await;
        match res {
            Ok(forest) => {
                let tree = CommentTree::from_forest(forest);
                tracing::debug!(issue = ?self.inner.issue, num_comments = tree.len(), "loaded comments");
                let mut st = self.inner.state.lock();
                st.tree = tree;
                st.sort_by = sort_by;
                st.loaded = true;
                st.replies.clear();
                Ok(())
            }
            Err(e) => Err(self.report(e.into_fetch(), "Failed to load comments.")),
        }
    }

    pub async fn refresh(&self) -> Result<(), Error> {
        self.load(self.sort_by()).await
    }

    pub fn set_comment_draft(&self, draft: String) {
        self.inner.state.lock().draft = draft;
    }

    /// Posts the top-level composer's draft, and prepends it to the thread
    pub async fn add_comment(&self, auth: &AuthContext) -> Result<(), Error> {
        let new = {
            let mut st = self.inner.state.lock();
            if st.posting {
                return Err(Error::InFlight);
            }
            match prepare_comment(auth, &st.draft, None) {
                Ok(new) => {
                    st.posting = true;
                    new
                }
                Err(e) => {
                    drop(st);
                    return Err(self.report(e, "Failed to post comment."));
                }
            }
        };
        let res = self
            .inner
            .lifetime
            .scope(self.inner.service.create_comment(&self.inner.issue, new))
            .await;
        let mut st = self.inner.state.lock();
        st.posting = false;
        match res {
            Ok(c) => {
                tracing::debug!(comment = ?c.id, "comment posted");
                let tree = st.tree.insert_root(c);
                st.tree = tree;
                st.draft.clear();
                st.notifications.push(Notification::success("Comment posted."));
                Ok(())
            }
            Err(e) => {
                drop(st);
                Err(self.report(e, "Failed to post comment."))
            }
        }
    }

    /// Opens the reply box of comment `id`, if not already open
    pub fn open_reply(&self, id: &CommentId) -> Result<(), Error> {
        let mut st = self.inner.state.lock();
        if !st.tree.contains(id) {
            return Err(Error::UnknownComment(id.clone()));
        }
        st.replies
            .entry(id.clone())
            .or_insert_with(|| ReplyState::ComposingReply {
                draft: String::new(),
            });
        Ok(())
    }

    pub fn set_reply_draft(&self, id: &CommentId, new_draft: String) -> Result<(), Error> {
        match self.inner.state.lock().replies.get_mut(id) {
            Some(ReplyState::ComposingReply { draft }) => {
                *draft = new_draft;
                Ok(())
            }
            Some(_) => Err(Error::InFlight),
            None => Err(Error::NotComposing(id.clone())),
        }
    }

    /// Closes the reply box of comment `id`, discarding its draft
    pub fn cancel_reply(&self, id: &CommentId) -> Result<(), Error> {
        let mut st = self.inner.state.lock();
        match st.replies.get(id) {
            Some(ReplyState::SubmittingReply { .. }) => Err(Error::InFlight),
            _ => {
                st.replies.remove(id);
                Ok(())
            }
        }
    }

    /// Posts the reply being composed on comment `id`.
    ///
    /// On success the reply is appended to `id`'s replies and the box closes.
    /// On failure the box stays open with the draft, for the user to retry.
    pub async fn submit_reply(&self, auth: &AuthContext, id: &CommentId) -> Result<(), Error> {
        let new = {
            let mut st = self.inner.state.lock();
            let draft = match st.replies.get(id) {
                Some(ReplyState::ComposingReply { draft }) => draft.clone(),
                Some(ReplyState::SubmittingReply { .. }) => return Err(Error::InFlight),
                Some(ReplyState::Viewing) | None => return Err(Error::NotComposing(id.clone())),
            };
            match prepare_comment(auth, &draft, Some(id.clone())) {
                Ok(new) => {
                    st.replies
                        .insert(id.clone(), ReplyState::SubmittingReply { draft });
                    new
                }
                Err(e) => {
                    drop(st);
                    return Err(self.report(e, "Failed to post reply."));
                }
            }
        };
        let res = self
            .inner
            .lifetime
            .scope(self.inner.service.create_comment(&self.inner.issue, new))
            .await;
        let mut st = self.inner.state.lock();
        match res {
            Ok(reply) => {
                if st.replies.get(id).map_or(false, |s| s.is_submitting()) {
                    st.replies.remove(id);
                }
                if !st.tree.contains(id) {
                    tracing::warn!(parent = ?id, reply = ?reply.id, "replied-to comment was deleted before the reply got confirmed, dropping the reply");
                    st.notifications.push(Notification::error(
                        "The comment you replied to no longer exists.",
                    ));
                    return Ok(());
                }
                tracing::debug!(parent = ?id, reply = ?reply.id, "reply posted");
                let tree = st.tree.insert_reply(id, reply);
                st.tree = tree;
                st.notifications.push(Notification::success("Reply posted."));
                Ok(())
            }
            Err(e) => {
                if let Some(ReplyState::SubmittingReply { draft }) = st.replies.remove(id) {
                    st.replies
                        .insert(id.clone(), ReplyState::ComposingReply { draft });
                }
                drop(st);
                Err(self.report(e, "Failed to post reply."))
            }
        }
    }

    /// Deletes comment `id` and all of its replies, once `confirm` agreed.
    ///
    /// Returns `None` if `confirm` refused, in which case nothing was sent.
    pub async fn delete<F>(
        &self,
        auth: &AuthContext,
        id: &CommentId,
        confirm: F,
    ) -> Result<Option<DeleteOutcome>, Error>
    where
        F: FnOnce(&Comment) -> bool,
    {
        if !auth.is_authenticated() {
            return Err(self.report(Error::login_required("delete comments"), ""));
        }
        let comment = self.inner.state.lock().tree.comment(id).cloned();
        let comment = match comment {
            Some(c) => c,
            None => return Err(Error::UnknownComment(id.clone())),
        };
        if !confirm(comment.as_ref()) {
            tracing::debug!(?id, "deletion not confirmed");
            return Ok(None);
        }
        let res = self
            .inner
            .lifetime
            .scope(self.inner.service.delete_comment(id))
            .await;
        match res {
            Ok(outcome) => {
                tracing::debug!(?id, deleted_replies = outcome.deleted_replies_count, "comment deleted");
                let mut st = self.inner.state.lock();
                if let Some(gone) = st.tree.subtree_ids(id) {
                    for g in gone.iter() {
                        st.replies.remove(g);
                    }
                }
                let tree = st.tree.remove_subtree(id);
                st.tree = tree;
                st.notifications
                    .push(Notification::success(match outcome.deleted_replies_count {
                        0 => String::from("Comment deleted."),
                        1 => String::from("Comment and 1 reply deleted."),
                        n => format!("Comment and {n} replies deleted."),
                    }));
                Ok(Some(outcome))
            }
            Err(e) => Err(self.report(e, "Failed to delete comment.")),
        }
    }

    /// Reports comment `id` to the moderators, then reloads the thread as the
    /// moderation outcome is only known to the server.
    ///
    /// `reason` is the raw form value, one of the `FlagReason`s.
    pub async fn flag(
        &self,
        auth: &AuthContext,
        id: &CommentId,
        reason: &str,
        details: Option<String>,
    ) -> Result<(), Error> {
        let flag = match prepare_flag(auth, reason, details) {
            Ok(flag) => flag,
            Err(e) => return Err(self.report(e, "Failed to flag comment.")),
        };
        if !self.inner.state.lock().tree.contains(id) {
            return Err(Error::UnknownComment(id.clone()));
        }
        let res = self
            .inner
            .lifetime
            .scope(self.inner.service.flag_comment(id, flag))
            .await;
        match res {
            Ok(()) => {
                self.notify(Notification::success("Comment flagged for review."));
                if let Err(err) = self.refresh().await {
                    tracing::debug!(%err, "refresh after flagging failed");
                }
                Ok(())
            }
            Err(e) => Err(self.report(e, "Failed to flag comment.")),
        }
    }
}
