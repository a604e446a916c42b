use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{AuthToken, Role};

mod comment;
pub use comment::{Comment, DeleteOutcome, FetchOptions, NewComment, SortBy};

pub mod envelope;
pub use envelope::Envelope;

mod error;
pub use error::Error;

mod flag;
pub use flag::{FlagReason, NewFlag, MAX_FLAG_DETAILS_LEN};

mod user;
pub use user::User;

/// Declares an identifier that the backend may send either as a JSON string or
/// as a JSON integer. It is always kept (and re-serialized) as a string.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<$name, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                #[derive(serde::Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Str(String),
                    Signed(i64),
                    Unsigned(u64),
                }

                Ok($name(match Raw::deserialize(deserializer)? {
                    Raw::Str(s) => s,
                    Raw::Signed(i) => i.to_string(),
                    Raw::Unsigned(u) => u.to_string(),
                }))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> $name {
                $name(String::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> $name {
                $name(s)
            }
        }

        impl From<u64> for $name {
            fn from(i: u64) -> $name {
                $name(i.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of a comment, stable for the comment's whole lifetime
    CommentId
);

opaque_id!(
    /// Identifier of a reported civic issue
    IssueId
);

opaque_id!(
    /// Identifier of a Naagrik account
    UserId
);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID.to_string())
    }
}

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_strings_and_integers() {
        let from_str: CommentId = serde_json::from_str(r#""65f1c0ffee""#).unwrap();
        assert_eq!(from_str, CommentId::from("65f1c0ffee"));

        let from_int: CommentId = serde_json::from_str("42").unwrap();
        assert_eq!(from_int, CommentId::from(42));

        let from_negative: IssueId = serde_json::from_str("-3").unwrap();
        assert_eq!(from_negative.as_str(), "-3");

        assert!(serde_json::from_str::<CommentId>("1.5").is_err());
        assert!(serde_json::from_str::<CommentId>("null").is_err());
    }

    #[test]
    fn ids_serialize_as_strings() {
        assert_eq!(
            serde_json::to_string(&CommentId::from(7)).unwrap(),
            r#""7""#
        );
    }

    #[test]
    fn null_bytes_are_rejected() {
        assert!(validate_string("fine").is_ok());
        assert_eq!(
            validate_string("no\0pe"),
            Err(Error::NullByteInString(String::from("no\0pe")))
        );
    }
}
