use std::sync::Arc;

use naagrik_client::{
    api::{AuthToken, CommentId, IssueId, Role, SortBy, UserId},
    AuthContext, CommentThread, CommentTree, Error, NotificationKind, ReplyState,
};
use naagrik_mock_server::{MockServer, MockService};
use tokio::sync::{Mutex, Semaphore};

struct Fixture {
    server: Arc<Mutex<MockServer>>,
    issue: IssueId,
    meera: UserId,
    token: AuthToken,
    /// a, a1, a2, a2x, b: a has replies a1 and a2, a2 has reply a2x
    ids: [CommentId; 5],
}

async fn fixture() -> Fixture {
    let mut s = MockServer::new();
    let issue = s.test_issue("streetlight-7");
    let meera = s.add_user("Meera", Role::Citizen);
    let token = s.login(&meera).unwrap();
    let a = s.seed(&issue, &meera, "Streetlight out since Monday", None).unwrap();
    let a1 = s.seed(&issue, &meera, "Same on 5th cross", Some(&a)).unwrap();
    let a2 = s.seed(&issue, &meera, "Reported to the ward office", Some(&a)).unwrap();
    let a2x = s.seed(&issue, &meera, "Any reference number?", Some(&a2)).unwrap();
    let b = s.seed(&issue, &meera, "Fixed on our side", None).unwrap();
    Fixture {
        server: Arc::new(Mutex::new(s)),
        issue,
        meera,
        token,
        ids: [a, a1, a2, a2x, b],
    }
}

impl Fixture {
    async fn thread(&self, token: Option<AuthToken>) -> CommentThread<MockService> {
        let thread = CommentThread::new(
            self.issue.clone(),
            MockService::new(self.server.clone(), token),
        );
        thread.load(SortBy::Newest).await.unwrap();
        thread
    }

    async fn server_tree(&self) -> CommentTree {
        let forest = self
            .server
            .lock()
            .await
            .fetch_comments(&self.issue, Default::default())
            .unwrap();
        CommentTree::from_forest(forest)
    }
}

fn messages(thread: &CommentThread<MockService>) -> Vec<String> {
    thread
        .take_notifications()
        .into_iter()
        .map(|n| n.message)
        .collect()
}

#[tokio::test]
async fn local_tree_tracks_the_server() {
    let f = fixture().await;
    let thread = f.thread(Some(f.token)).await;
    let auth = AuthContext::as_user(f.meera.clone());
    let [a, _, a2, _, b] = f.ids.clone();
    assert_eq!(
        thread.tree().roots().map(|n| n.id().clone()).collect::<Vec<_>>(),
        vec![b.clone(), a.clone()]
    );

    thread.open_reply(&a2).unwrap();
    thread.set_reply_draft(&a2, String::from("KA-2291")).unwrap();
    thread.submit_reply(&auth, &a2).await.unwrap();

    thread.set_comment_draft(String::from("Still dark tonight"));
    thread.add_comment(&auth).await.unwrap();

    assert_eq!(thread.tree(), f.server_tree().await);
    assert_eq!(thread.tree().reply_count(&a2), Some(2));
    assert_eq!(thread.tree().reply_count(&b), Some(0));
    assert_eq!(messages(&thread), vec!["Reply posted.", "Comment posted."]);
}

#[tokio::test]
async fn delete_removes_the_whole_subtree() {
    let f = fixture().await;
    let thread = f.thread(Some(f.token)).await;
    let auth = AuthContext::authenticated();
    let [a, a1, a2, a2x, b] = f.ids.clone();

    let outcome = thread.delete(&auth, &a, |_| true).await.unwrap();
    assert_eq!(outcome.unwrap().deleted_replies_count, 3);
    let tree = thread.tree();
    for gone in [&a, &a1, &a2, &a2x] {
        assert!(!tree.contains(gone));
    }
    assert!(tree.contains(&b));
    assert_eq!(tree, f.server_tree().await);
    assert_eq!(messages(&thread), vec!["Comment and 3 replies deleted."]);
}

#[tokio::test]
async fn deleting_someone_elses_comment_is_refused() {
    let f = fixture().await;
    let arjun_token = {
        let mut s = f.server.lock().await;
        let arjun = s.add_user("Arjun", Role::Citizen);
        s.login(&arjun).unwrap()
    };
    let thread = f.thread(Some(arjun_token)).await;
    let res = thread
        .delete(&AuthContext::authenticated(), &f.ids[4], |_| true)
        .await;
    assert!(matches!(res, Err(Error::Auth(_))));
    assert!(thread.tree().contains(&f.ids[4]));
    let notifications = thread.take_notifications();
    assert_eq!(notifications[0].kind, NotificationKind::Error);
    assert_eq!(notifications[0].message, "You are not allowed to do that.");
}

#[tokio::test]
async fn flagging_shows_up_after_the_refresh() {
    let f = fixture().await;
    let thread = f.thread(Some(f.token)).await;
    let a1 = &f.ids[1];
    thread
        .flag(
            &AuthContext::authenticated(),
            a1,
            "harassment",
            Some(String::from("  targets a neighbour by name ")),
        )
        .await
        .unwrap();
    assert!(thread.tree().comment(a1).unwrap().is_flagged);
    let s = f.server.lock().await;
    assert_eq!(s.calls().fetch, 2);
    assert_eq!(
        s.flags()[0].2.details.as_deref(),
        Some("targets a neighbour by name")
    );
}

#[tokio::test]
async fn local_checks_send_nothing() {
    let f = fixture().await;
    let anonymous = f.thread(None).await;
    anonymous.set_comment_draft(String::from("No light here either"));
    assert!(anonymous.add_comment(&AuthContext::anonymous()).await.is_err());
    assert!(anonymous
        .flag(&AuthContext::anonymous(), &f.ids[0], "SPAM", None)
        .await
        .is_err());
    assert!(anonymous
        .delete(&AuthContext::anonymous(), &f.ids[0], |_| true)
        .await
        .is_err());
    assert_eq!(
        messages(&anonymous),
        vec![
            "Please login to comment.",
            "Please login to flag comments.",
            "Please login to delete comments.",
        ]
    );

    let thread = f.thread(Some(f.token)).await;
    let auth = AuthContext::authenticated();
    assert!(thread.flag(&auth, &f.ids[0], "", None).await.is_err());
    let too_long = "x".repeat(501);
    assert!(thread
        .flag(&auth, &f.ids[0], "OTHER", Some(too_long))
        .await
        .is_err());
    assert_eq!(
        messages(&thread),
        vec![
            "Please select a reason for flagging.",
            "Flag details must be at most 500 characters.",
        ]
    );

    let calls = f.server.lock().await.calls();
    assert_eq!(calls.fetch, 2);
    assert_eq!(calls.total(), 2);
}

#[tokio::test]
async fn failed_fetch_keeps_what_is_displayed() {
    let f = fixture().await;
    let thread = f.thread(Some(f.token)).await;
    let before = thread.tree();
    f.server.lock().await.set_offline(true);
    assert!(matches!(
        thread.load(SortBy::Oldest).await,
        Err(Error::Fetch(_))
    ));
    assert_eq!(thread.tree(), before);
    assert_eq!(thread.sort_by(), SortBy::Newest);
    assert_eq!(messages(&thread), vec!["Failed to load comments."]);

    f.server.lock().await.set_offline(false);
    thread.load(SortBy::Oldest).await.unwrap();
    assert_eq!(thread.tree().roots().next().unwrap().id(), &f.ids[0]);
}

#[tokio::test]
async fn closing_cancels_pending_actions() {
    let f = fixture().await;
    let gate = Arc::new(Semaphore::new(0));
    let thread = CommentThread::new(
        f.issue.clone(),
        MockService::new(f.server.clone(), Some(f.token)).gate_creations(gate.clone()),
    );
    thread.load(SortBy::Newest).await.unwrap();
    let a = f.ids[0].clone();
    thread.open_reply(&a).unwrap();
    thread.set_reply_draft(&a, String::from("never shown")).unwrap();

    let pending = tokio::spawn({
        let thread = thread.clone();
        let a = a.clone();
        async move {
            thread
                .submit_reply(&AuthContext::authenticated(), &a)
                .await
        }
    });
    while f.server.lock().await.calls().create == 0 {
        tokio::task::yield_now().await;
    }
    assert!(thread.reply_state(&a).is_submitting());

    thread.close();
    assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(thread.tree().reply_count(&a), Some(2));
    assert!(thread.take_notifications().is_empty());
}

#[tokio::test]
async fn reply_to_a_comment_deleted_meanwhile_is_dropped() {
    let f = fixture().await;
    let gate = Arc::new(Semaphore::new(0));
    let thread = CommentThread::new(
        f.issue.clone(),
        MockService::new(f.server.clone(), Some(f.token)).gate_creations(gate.clone()),
    );
    thread.load(SortBy::Newest).await.unwrap();
    let auth = AuthContext::authenticated();
    let a1 = f.ids[1].clone();
    thread.open_reply(&a1).unwrap();
    thread.set_reply_draft(&a1, String::from("+1")).unwrap();

    let pending = tokio::spawn({
        let (thread, auth, a1) = (thread.clone(), auth.clone(), a1.clone());
        async move { thread.submit_reply(&auth, &a1).await }
    });
    while f.server.lock().await.calls().create == 0 {
        tokio::task::yield_now().await;
    }

    let outcome = thread.delete(&auth, &a1, |_| true).await.unwrap();
    assert_eq!(outcome.unwrap().deleted_replies_count, 1);
    assert_eq!(thread.reply_state(&a1), ReplyState::Viewing);

    gate.add_permits(1);
    pending.await.unwrap().unwrap();
    assert!(!thread.tree().contains(&a1));
    assert_eq!(thread.tree(), f.server_tree().await);
    assert_eq!(
        messages(&thread),
        vec![
            "Comment and 1 reply deleted.",
            "The comment you replied to no longer exists.",
        ]
    );
}
