use anyhow::Context;
use chrono::{Duration, TimeZone, Utc};
use naagrik_api::{Comment, CommentId, Role, Time, User, UserId};
use rand::{seq::SliceRandom, Rng};

const NUM_USERS: usize = 8;
const NUM_STEWARDS: usize = 1;

const NUM_ROOTS: usize = 25;
const MAX_REPLIES: usize = 4;
const MAX_DEPTH: usize = 5;

const COMMENT_MIN_WORDS: usize = 4;
const COMMENT_MAX_WORDS: usize = 40;

const FLAG_PROBABILITY: f64 = 0.05;

struct Gen<R> {
    rng: R,
    users: Vec<User>,
    next_id: u64,
}

impl<R: Rng> Gen<R> {
    fn comment_text(&mut self) -> String {
        let words = self.rng.gen_range(COMMENT_MIN_WORDS..=COMMENT_MAX_WORDS);
        lipsum::lipsum_words_from_seed(words, self.rng.gen())
    }

    fn comment(&mut self, after: Time, depth: usize, parent: Option<&CommentId>) -> Comment {
        self.next_id += 1;
        let author = self
            .users
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| User {
                id: UserId::stub(),
                name: String::from("stub"),
                avatar_url: None,
                role: Role::Citizen,
            });
        let created_at = after + Duration::minutes(self.rng.gen_range(1..600));
        let mut c = Comment {
            id: CommentId::from(self.next_id),
            content: self.comment_text(),
            author_id: author.id,
            author_name: author.name,
            author_avatar_url: author.avatar_url,
            created_at,
            parent_id: parent.cloned(),
            replies: Vec::new(),
            reply_count: 0,
            is_flagged: self.rng.gen_bool(FLAG_PROBABILITY),
            vote_score: Some(self.rng.gen_range(-5..50)),
        };
        if depth < MAX_DEPTH {
            // replies get rarer the deeper the thread goes
            let max = MAX_REPLIES.saturating_sub(depth);
            let num_replies = self.rng.gen_range(0..=max);
            let mut last = created_at;
            for _ in 0..num_replies {
                let r = self.comment(last, depth + 1, Some(&c.id));
                last = r.created_at;
                c.replies.push(r);
            }
        }
        c.reply_count = c.replies.len();
        c
    }
}

fn main() -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();

    // Generate users, the first ones being stewards
    let users = (0..NUM_USERS)
        .map(|i| User {
            id: UserId(format!("user-{}", i + 1)),
            name: lipsum::lipsum_words_from_seed(1, rng.gen()),
            avatar_url: None,
            role: match i < NUM_STEWARDS {
                true => Role::Steward,
                false => Role::Citizen,
            },
        })
        .collect::<Vec<_>>();

    let mut gen = Gen {
        rng,
        users,
        next_id: 0,
    };

    // Generate the forest, newest root first like the default listing
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
        .single()
        .context("building the start date")?;
    let mut last = start;
    let mut roots = Vec::with_capacity(NUM_ROOTS);
    for _ in 0..NUM_ROOTS {
        let c = gen.comment(last, 0, None);
        last = c.created_at;
        roots.push(c);
    }
    roots.reverse();

    let body = serde_json::json!({
        "success": true,
        "data": { "comments": roots },
    });
    let out = serde_json::to_string_pretty(&body).context("serializing comment forest")?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn check(c: &Comment, depth: usize) {
        assert!(depth <= MAX_DEPTH);
        assert_eq!(c.reply_count, c.replies.len());
        let words = c.content.split_whitespace().count();
        assert!((COMMENT_MIN_WORDS..=COMMENT_MAX_WORDS).contains(&words), "{words} words");
        for r in c.replies.iter() {
            assert_eq!(r.parent_id.as_ref(), Some(&c.id));
            assert!(r.created_at > c.created_at);
            check(r, depth + 1);
        }
    }

    #[test]
    fn generated_threads_are_consistent() {
        let mut gen = Gen {
            rng: StdRng::seed_from_u64(42),
            users: Vec::new(),
            next_id: 0,
        };
        let start = Time::default();
        for _ in 0..20 {
            let c = gen.comment(start, 0, None);
            assert_eq!(c.parent_id, None);
            check(&c, 0);
        }
    }
}
