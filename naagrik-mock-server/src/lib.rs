use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use anyhow::anyhow;
use async_trait::async_trait;
use naagrik_client::{
    api::{
        self, AuthToken, CommentId, DeleteOutcome, Error, FetchOptions, IssueId, NewComment,
        NewFlag, Role, SortBy, Time, UserId, Uuid,
    },
    CommentService,
};
use tokio::sync::{Mutex, Semaphore};

/// Number of requests received, per endpoint
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Calls {
    pub fetch: usize,
    pub create: usize,
    pub delete: usize,
    pub flag: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.fetch + self.create + self.delete + self.flag
    }
}

/// In-memory comment backend. Comments are stored flat, in creation order,
/// and nested on each listing like the real backend does.
#[derive(Default)]
pub struct MockServer {
    users: BTreeMap<UserId, api::User>,
    sessions: HashMap<AuthToken, UserId>,
    issues: BTreeMap<IssueId, Vec<api::Comment>>,
    flags: Vec<(CommentId, UserId, NewFlag)>,
    next_id: i64,
    calls: Calls,
    offline: bool,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn add_user(&mut self, name: &str, role: Role) -> UserId {
        let id = UserId(format!("user-{}", self.users.len() + 1));
        self.users.insert(
            id.clone(),
            api::User {
                id: id.clone(),
                name: String::from(name),
                avatar_url: None,
                role,
            },
        );
        id
    }

    pub fn login(&mut self, user: &UserId) -> Result<AuthToken, Error> {
        if !self.users.contains_key(user) {
            return Err(Error::PermissionDenied);
        }
        let tok = AuthToken(Uuid::new_v4());
        self.sessions.insert(tok, user.clone());
        Ok(tok)
    }

    pub fn logout(&mut self, tok: AuthToken) {
        self.sessions.remove(&tok);
    }

    pub fn add_issue(&mut self, issue: IssueId) {
        self.issues.entry(issue).or_default();
    }

    /// Makes every endpoint fail, as if the backend was unreachable
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn calls(&self) -> Calls {
        self.calls
    }

    pub fn flags(&self) -> &[(CommentId, UserId, NewFlag)] {
        &self.flags
    }

    pub fn num_comments(&self, issue: &IssueId) -> usize {
        self.issues.get(issue).map_or(0, |cs| cs.len())
    }

    pub fn set_vote_score(&mut self, comment: &CommentId, score: i64) -> Result<(), Error> {
        let (_, c) = self.find_mut(comment)?;
        c.vote_score = Some(score);
        Ok(())
    }

    /// Posts `content` as `user`, bypassing sessions
    pub fn seed(
        &mut self,
        issue: &IssueId,
        user: &UserId,
        content: &str,
        parent: Option<&CommentId>,
    ) -> Result<CommentId, Error> {
        let c = self.store(
            issue,
            user,
            NewComment {
                content: String::from(content),
                parent_comment_id: parent.cloned(),
            },
        )?;
        Ok(c.id)
    }

    fn check_online(&self) -> Result<(), Error> {
        match self.offline {
            true => Err(Error::Unknown(String::from("service unavailable"))),
            false => Ok(()),
        }
    }

    fn resolve(&self, tok: Option<AuthToken>) -> Result<&api::User, Error> {
        tok.and_then(|tok| self.sessions.get(&tok))
            .and_then(|uid| self.users.get(uid))
            .ok_or(Error::Unauthenticated)
    }

    fn find_mut(&mut self, comment: &CommentId) -> Result<(IssueId, &mut api::Comment), Error> {
        for (issue, comments) in self.issues.iter_mut() {
            if let Some(c) = comments.iter_mut().find(|c| c.id == *comment) {
                return Ok((issue.clone(), c));
            }
        }
        Err(Error::NotFound(format!("comment {comment}")))
    }

    fn store(
        &mut self,
        issue: &IssueId,
        user: &UserId,
        c: NewComment,
    ) -> Result<api::Comment, Error> {
        c.validate()?;
        let author = self
            .users
            .get(user)
            .cloned()
            .ok_or(Error::PermissionDenied)?;
        self.next_id += 1;
        let id = CommentId::from(format!("c{}", self.next_id));
        // creation order is what sorting relies on, so time is logical
        let created_at = Time::default() + chrono::Duration::seconds(self.next_id);
        let comments = self
            .issues
            .get_mut(issue)
            .ok_or_else(|| Error::NotFound(format!("issue {issue}")))?;
        if let Some(parent) = &c.parent_comment_id {
            if !comments.iter().any(|p| p.id == *parent) {
                return Err(Error::NotFound(format!("comment {parent}")));
            }
        }
        let comment = api::Comment {
            id,
            content: String::from(c.content.trim()),
            author_id: author.id,
            author_name: author.name,
            author_avatar_url: author.avatar_url,
            created_at,
            parent_id: c.parent_comment_id,
            replies: Vec::new(),
            reply_count: 0,
            is_flagged: false,
            vote_score: None,
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    pub fn fetch_comments(
        &mut self,
        issue: &IssueId,
        opts: FetchOptions,
    ) -> Result<Vec<api::Comment>, Error> {
        self.calls.fetch += 1;
        self.check_online()?;
        let comments = self
            .issues
            .get(issue)
            .ok_or_else(|| Error::NotFound(format!("issue {issue}")))?;
        let mut children: HashMap<&CommentId, Vec<&api::Comment>> = HashMap::new();
        let mut roots = Vec::new();
        for c in comments {
            match &c.parent_id {
                Some(p) => children.entry(p).or_default().push(c),
                None => roots.push(c),
            }
        }
        match opts.sort_by {
            SortBy::Newest => roots.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortBy::Oldest => roots.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortBy::MostVoted => roots.sort_by(|a, b| {
                b.vote_score
                    .unwrap_or(0)
                    .cmp(&a.vote_score.unwrap_or(0))
                    .then(b.created_at.cmp(&a.created_at))
            }),
        }
        if !opts.nested {
            return Ok(roots.into_iter().cloned().collect());
        }
        Ok(roots
            .into_iter()
            .map(|c| nest(c, &children))
            .collect())
    }

    pub fn create_comment(
        &mut self,
        tok: Option<AuthToken>,
        issue: &IssueId,
        c: NewComment,
    ) -> Result<api::Comment, Error> {
        self.calls.create += 1;
        self.check_online()?;
        let user = self.resolve(tok)?.id.clone();
        let comment = self.store(issue, &user, c)?;
        tracing::debug!(?issue, comment = ?comment.id, "mock server stored comment");
        Ok(comment)
    }

    pub fn delete_comment(
        &mut self,
        tok: Option<AuthToken>,
        comment: &CommentId,
    ) -> Result<DeleteOutcome, Error> {
        self.calls.delete += 1;
        self.check_online()?;
        let user = self.resolve(tok)?.clone();
        let (issue, target) = self.find_mut(comment)?;
        if target.author_id != user.id && !user.role.can_moderate() {
            return Err(Error::PermissionDenied);
        }
        let comments = self
            .issues
            .get_mut(&issue)
            .ok_or_else(|| Error::NotFound(format!("issue {issue}")))?;
        let mut gone = vec![comment.clone()];
        // children are always stored after their parent
        for c in comments.iter() {
            if c.parent_id.as_ref().map_or(false, |p| gone.contains(p)) {
                gone.push(c.id.clone());
            }
        }
        comments.retain(|c| !gone.contains(&c.id));
        self.flags.retain(|(c, _, _)| !gone.contains(c));
        Ok(DeleteOutcome {
            deleted_replies_count: gone.len() - 1,
        })
    }

    pub fn flag_comment(
        &mut self,
        tok: Option<AuthToken>,
        comment: &CommentId,
        flag: NewFlag,
    ) -> Result<(), Error> {
        self.calls.flag += 1;
        self.check_online()?;
        let user = self.resolve(tok)?.id.clone();
        flag.validate()?;
        let (_, c) = self.find_mut(comment)?;
        c.is_flagged = true;
        self.flags.push((comment.clone(), user, flag));
        Ok(())
    }
}

fn nest(c: &api::Comment, children: &HashMap<&CommentId, Vec<&api::Comment>>) -> api::Comment {
    let replies = children
        .get(&c.id)
        .map(|rs| rs.iter().map(|r| nest(r, children)).collect::<Vec<_>>())
        .unwrap_or_default();
    api::Comment {
        reply_count: replies.len(),
        replies,
        ..c.clone()
    }
}

/// `CommentService` talking to a shared `MockServer` with one session
#[derive(Clone)]
pub struct MockService {
    server: Arc<Mutex<MockServer>>,
    token: Option<AuthToken>,
    create_gate: Option<Arc<Semaphore>>,
}

impl MockService {
    pub fn new(server: Arc<Mutex<MockServer>>, token: Option<AuthToken>) -> MockService {
        MockService {
            server,
            token,
            create_gate: None,
        }
    }

    /// Holds back every creation response, after the server stored the
    /// comment, until a permit is added to `gate`
    pub fn gate_creations(self, gate: Arc<Semaphore>) -> MockService {
        MockService {
            create_gate: Some(gate),
            ..self
        }
    }

    pub fn server(&self) -> &Arc<Mutex<MockServer>> {
        &self.server
    }
}

#[async_trait]
impl CommentService for MockService {
    async fn fetch_comments(
        &self,
        issue: &IssueId,
        opts: FetchOptions,
    ) -> Result<Vec<api::Comment>, naagrik_client::Error> {
        let res = self.server.lock().await.fetch_comments(issue, opts);
        res.map_err(|e| naagrik_client::Error::from(e).into_fetch())
    }

    async fn create_comment(
        &self,
        issue: &IssueId,
        comment: NewComment,
    ) -> Result<api::Comment, naagrik_client::Error> {
        let res = self
            .server
            .lock()
            .await
            .create_comment(self.token, issue, comment);
        if let Some(gate) = &self.create_gate {
            gate.acquire()
                .await
                .map_err(|_| anyhow!("creation gate closed"))?
                .forget();
        }
        Ok(res?)
    }

    async fn delete_comment(
        &self,
        comment: &CommentId,
    ) -> Result<DeleteOutcome, naagrik_client::Error> {
        let res = self.server.lock().await.delete_comment(self.token, comment);
        Ok(res?)
    }

    async fn flag_comment(
        &self,
        comment: &CommentId,
        flag: NewFlag,
    ) -> Result<(), naagrik_client::Error> {
        let res = self.server.lock().await.flag_comment(self.token, comment, flag);
        Ok(res?)
    }
}

impl MockServer {
    /// Adds an issue and returns it, for tests
    pub fn test_issue(&mut self, name: &str) -> IssueId {
        let issue = IssueId::from(name);
        self.add_issue(issue.clone());
        issue
    }
}
