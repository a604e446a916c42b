use std::io::{BufRead, Write};

use anyhow::Context;
use naagrik_client::{
    api::{AuthToken, CommentId, FlagReason, IssueId, SortBy},
    AuthContext, Comment, CommentRenderer, CommentThread, HttpCommentService, NotificationKind,
    RenderedComment,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "NAAGRIK_HOST")]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the comment thread of an issue
    List {
        issue: String,

        /// newest, oldest or most-voted
        #[structopt(short, long, default_value = "newest")]
        sort: SortBy,
    },

    /// Post a top-level comment
    Comment { issue: String, content: String },

    /// Reply to a comment
    Reply {
        issue: String,
        parent: String,
        content: String,
    },

    /// Delete a comment along with all its replies
    Delete {
        issue: String,
        comment: String,

        /// Do not ask for confirmation
        #[structopt(short, long)]
        yes: bool,
    },

    /// Report a comment to the moderators
    Flag {
        issue: String,
        comment: String,

        /// One of SPAM, INAPPROPRIATE, MISLEADING, HARASSMENT, OTHER
        reason: String,

        #[structopt(short, long)]
        details: Option<String>,
    },
}

fn user_token() -> anyhow::Result<Option<AuthToken>> {
    let tok = match std::env::var("NAAGRIK_TOKEN") {
        Ok(tok) => tok,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(e) => return Err(e).context("retrieving NAAGRIK_TOKEN environment variable"),
    };
    let tok = tok
        .parse::<AuthToken>()
        .context("parsing NAAGRIK_TOKEN as an auth token")?;
    Ok(Some(tok))
}

/// Indented plain-text outline of a thread
struct TextRenderer;

impl CommentRenderer for TextRenderer {
    type Output = Vec<String>;

    fn render(&mut self, c: &RenderedComment, replies: Vec<Vec<String>>) -> Vec<String> {
        let indent = "    ".repeat(c.depth);
        let flagged = match c.comment.is_flagged {
            true => " [flagged]",
            false => "",
        };
        let mut lines = vec![format!(
            "{indent}#{} {} ({}){flagged}",
            c.comment.id,
            c.comment.author_name,
            c.comment.created_at.format("%Y-%m-%d %H:%M"),
        )];
        lines.extend(
            c.comment
                .content
                .lines()
                .map(|l| format!("{indent}  {l}")),
        );
        if c.reply_count > 0 {
            lines.push(format!(
                "{indent}  {} {}",
                c.reply_count,
                match c.reply_count {
                    1 => "reply",
                    _ => "replies",
                }
            ));
        }
        lines.extend(replies.into_iter().flatten());
        lines
    }
}

fn confirm_delete(c: &Comment, replies: usize) -> bool {
    print!(
        "Delete comment #{} by {} and its {replies} replies? [y/N] ",
        c.id, c.author_name
    );
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

fn print_notifications(thread: &CommentThread<HttpCommentService>) {
    for n in thread.take_notifications() {
        match n.kind {
            NotificationKind::Success => println!("{}", n.message),
            NotificationKind::Error => eprintln!("error: {}", n.message),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let token = user_token()?;
    let auth = match token {
        Some(_) => AuthContext::authenticated(),
        None => AuthContext::anonymous(),
    };
    tracing::debug!(host = %opt.host, authenticated = auth.is_authenticated(), "starting");
    let service = HttpCommentService::new(opt.host.clone(), token);
    let open = |issue: String| CommentThread::new(IssueId::from(issue), service.clone());

    let res = match opt.cmd {
        Command::List { issue, sort } => {
            let thread = open(issue);
            let res = thread.load(sort).await;
            if res.is_ok() {
                let view = thread.view();
                if view.comments.is_empty() {
                    println!("No comments yet.");
                }
                for line in view.render_with(&mut TextRenderer).into_iter().flatten() {
                    println!("{line}");
                }
            }
            print_notifications(&thread);
            res
        }
        Command::Comment { issue, content } => {
            let thread = open(issue);
            thread.set_comment_draft(content);
            let res = thread.add_comment(&auth).await;
            print_notifications(&thread);
            res
        }
        Command::Reply {
            issue,
            parent,
            content,
        } => {
            let thread = open(issue);
            let parent = CommentId::from(parent);
            let mut res = thread.refresh().await;
            if res.is_ok() {
                res = thread
                    .open_reply(&parent)
                    .and_then(|()| thread.set_reply_draft(&parent, content));
            }
            if res.is_ok() {
                res = thread.submit_reply(&auth, &parent).await;
            }
            print_notifications(&thread);
            res
        }
        Command::Delete {
            issue,
            comment,
            yes,
        } => {
            let thread = open(issue);
            let comment = CommentId::from(comment);
            let mut res = thread.refresh().await.map(|()| None);
            if res.is_ok() {
                let replies = thread.tree().descendant_count(&comment).unwrap_or(0);
                res = thread
                    .delete(&auth, &comment, |c| yes || confirm_delete(c, replies))
                    .await;
            }
            if let Ok(None) = res {
                println!("Not deleted.");
            }
            print_notifications(&thread);
            res.map(|_| ())
        }
        Command::Flag {
            issue,
            comment,
            reason,
            details,
        } => {
            let thread = open(issue);
            let comment = CommentId::from(comment);
            let mut res = thread.refresh().await;
            if res.is_ok() {
                res = thread.flag(&auth, &comment, &reason, details).await;
            }
            print_notifications(&thread);
            if res.is_err() && reason.trim().is_empty() {
                eprintln!(
                    "reasons: {}",
                    FlagReason::ALL.map(|r| r.as_str()).join(", ")
                );
            }
            res
        }
    };

    res.context("running comment command")
}
