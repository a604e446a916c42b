use std::{fmt, str::FromStr};

use crate::{CommentId, Error, Time, UserId};

/// A comment as the server materializes it: replies are nested inline.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: CommentId,
    pub content: String,

    /// Author snapshot, taken when the comment was created or fetched
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default)]
    pub author_avatar_url: Option<String>,

    pub created_at: Time,

    #[serde(default, alias = "parentCommentId")]
    pub parent_id: Option<CommentId>,

    /// Child comments, in reply submission order
    #[serde(default)]
    pub replies: Vec<Comment>,
    #[serde(default)]
    pub reply_count: usize,

    #[serde(default)]
    pub is_flagged: bool,

    /// Display-only, the server is authoritative on votes
    #[serde(default)]
    pub vote_score: Option<i64>,
}

impl Comment {
    pub fn stub(id: impl Into<CommentId>, content: &str) -> Comment {
        Comment {
            id: id.into(),
            content: String::from(content),
            author_id: UserId::stub(),
            author_name: String::from("stub"),
            author_avatar_url: None,
            created_at: Time::default(),
            parent_id: None,
            replies: Vec::new(),
            reply_count: 0,
            is_flagged: false,
            vote_score: None,
        }
    }

    pub fn with_replies(mut self, mut replies: Vec<Comment>) -> Comment {
        for r in replies.iter_mut() {
            r.parent_id = Some(self.id.clone());
        }
        self.reply_count = replies.len();
        self.replies = replies;
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,

    /// None for a top-level comment
    pub parent_comment_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.content)?;
        if self.content.trim().is_empty() {
            return Err(Error::InvalidContent(String::from(
                "Comment cannot be empty.",
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Number of descendants deleted along with the target
    pub deleted_replies_count: usize,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    MostVoted,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Oldest => "oldest",
            SortBy::MostVoted => "most_voted",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<SortBy> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "newest" => Ok(SortBy::Newest),
            "oldest" => Ok(SortBy::Oldest),
            "most_voted" => Ok(SortBy::MostVoted),
            _ => Err(anyhow::anyhow!("unknown sort order {s:?}")),
        }
    }
}

/// Query parameters of a comment listing
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    pub sort_by: SortBy,
    pub nested: bool,
}

impl FetchOptions {
    pub fn sorted(sort_by: SortBy) -> FetchOptions {
        FetchOptions {
            sort_by,
            nested: true,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> FetchOptions {
        FetchOptions::sorted(SortBy::default())
    }
}
