use std::{fmt, str::FromStr};

use crate::Error;

pub const MAX_FLAG_DETAILS_LEN: usize = 500;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagReason {
    Spam,
    Inappropriate,
    Misleading,
    Harassment,
    Other,
}

impl FlagReason {
    pub const ALL: [FlagReason; 5] = [
        FlagReason::Spam,
        FlagReason::Inappropriate,
        FlagReason::Misleading,
        FlagReason::Harassment,
        FlagReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::Spam => "SPAM",
            FlagReason::Inappropriate => "INAPPROPRIATE",
            FlagReason::Misleading => "MISLEADING",
            FlagReason::Harassment => "HARASSMENT",
            FlagReason::Other => "OTHER",
        }
    }
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<FlagReason, Error> {
        let s = s.trim();
        FlagReason::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::InvalidContent(String::from("Please select a reason for flagging."))
            })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewFlag {
    pub reason: FlagReason,
    #[serde(default)]
    pub details: Option<String>,
}

impl NewFlag {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(details) = &self.details {
            crate::validate_string(details)?;
            if details.chars().count() > MAX_FLAG_DETAILS_LEN {
                return Err(Error::InvalidContent(format!(
                    "Flag details must be at most {MAX_FLAG_DETAILS_LEN} characters."
                )));
            }
        }
        Ok(())
    }
}
