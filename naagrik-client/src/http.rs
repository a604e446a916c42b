use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};

use crate::{
    api::{
        self, envelope, AuthToken, CommentId, DeleteOutcome, FetchOptions, IssueId, NewComment,
        NewFlag,
    },
    CommentService, Error,
};

/// `CommentService` over the Naagrik REST API
#[derive(Clone, Debug)]
pub struct HttpCommentService {
    client: reqwest::Client,
    host: String,
    token: Option<AuthToken>,
}

impl HttpCommentService {
    pub fn new(host: String, token: Option<AuthToken>) -> HttpCommentService {
        HttpCommentService::with_client(reqwest::Client::new(), host, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        host: String,
        token: Option<AuthToken>,
    ) -> HttpCommentService {
        HttpCommentService {
            client,
            host: String::from(host.trim_end_matches('/')),
            token,
        }
    }

    /// Joins `segments` under `{host}/api`, each one percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.host)
            .with_context(|| format!("parsing comment service host {:?}", self.host))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("comment service host {:?} cannot be a base", self.host))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, Error> {
        let req = self.client.request(method, self.url(segments)?);
        Ok(match self.token {
            Some(tok) => req.bearer_auth(tok.0),
            None => req,
        })
    }

    fn fetch_request(&self, issue: &IssueId, opts: FetchOptions) -> Result<RequestBuilder, Error> {
        Ok(self
            .request(Method::GET, &["issues", issue.as_str(), "comments"])?
            .query(&opts))
    }

    fn create_request(&self, issue: &IssueId, comment: &NewComment) -> Result<RequestBuilder, Error> {
        Ok(self
            .request(Method::POST, &["issues", issue.as_str(), "comments"])?
            .json(comment))
    }

    fn delete_request(&self, comment: &CommentId) -> Result<RequestBuilder, Error> {
        self.request(Method::DELETE, &["comments", comment.as_str()])
    }

    fn flag_request(&self, comment: &CommentId, flag: &NewFlag) -> Result<RequestBuilder, Error> {
        Ok(self
            .request(Method::POST, &["comments", comment.as_str(), "flag"])?
            .json(flag))
    }

    async fn execute(&self, req: RequestBuilder, what: &str) -> Result<Vec<u8>, Error> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending {what} request"))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading {what} response"))?;
        if status.is_success() {
            return Ok(body.to_vec());
        }
        tracing::error!(?status, "comment service rejected {what} request");
        Err(error_from_response(status, &body))
    }
}

/// Prefers the typed error body, then falls back to the status code
fn error_from_response(status: StatusCode, body: &[u8]) -> Error {
    if let Ok(e) = api::Error::parse(body) {
        return Error::from(e);
    }
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| String::from(status.canonical_reason().unwrap_or("request failed")));
    match status {
        StatusCode::UNAUTHORIZED => Error::Auth(String::from("Please login to continue.")),
        StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(message),
        _ => Error::Remote(anyhow!("comment service answered {status}: {message}")),
    }
}

#[async_trait]
impl CommentService for HttpCommentService {
    async fn fetch_comments(
        &self,
        issue: &IssueId,
        opts: FetchOptions,
    ) -> Result<Vec<api::Comment>, Error> {
        tracing::debug!(?issue, sort_by = %opts.sort_by, "fetching comments");
        let req = self.fetch_request(issue, opts).map_err(Error::into_fetch)?;
        let body = self
            .execute(req, "comment listing")
            .await
            .map_err(Error::into_fetch)?;
        envelope::parse_comments(&body)
            .context("parsing comment listing")
            .map_err(Error::Fetch)
    }

    async fn create_comment(
        &self,
        issue: &IssueId,
        comment: NewComment,
    ) -> Result<api::Comment, Error> {
        tracing::debug!(?issue, parent = ?comment.parent_comment_id, "creating comment");
        let req = self.create_request(issue, &comment)?;
        let body = self.execute(req, "comment creation").await?;
        Ok(envelope::parse_comment(&body).context("parsing created comment")?)
    }

    async fn delete_comment(&self, comment: &CommentId) -> Result<DeleteOutcome, Error> {
        tracing::debug!(?comment, "deleting comment");
        let req = self.delete_request(comment)?;
        let body = self.execute(req, "comment deletion").await?;
        Ok(envelope::parse_delete_outcome(&body).unwrap_or_else(|err| {
            tracing::warn!(?err, "deletion response has no reply count, assuming none");
            DeleteOutcome::default()
        }))
    }

    async fn flag_comment(&self, comment: &CommentId, flag: NewFlag) -> Result<(), Error> {
        tracing::debug!(?comment, reason = %flag.reason, "flagging comment");
        let req = self.flag_request(comment, &flag)?;
        self.execute(req, "comment flag").await?;
        Ok(())
    }
}
