use serde::{Deserialize, Serialize};

/// Credentials of the signed-in user. Issued and refreshed outside this
/// client; we only carry it to the calls that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
