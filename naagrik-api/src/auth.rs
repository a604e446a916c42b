use std::str::FromStr;

use uuid::Uuid;

use crate::STUB_UUID;

/// Bearer token attached out-of-band to every authenticated request
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

impl FromStr for AuthToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<AuthToken, uuid::Error> {
        Uuid::try_parse(s.trim()).map(AuthToken)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Steward,
    Admin,
}

impl Role {
    /// Stewards and admins may review flags and delete other users' comments
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Steward | Role::Admin)
    }
}
