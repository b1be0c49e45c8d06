use serde::{Deserialize, Serialize};

pub const DEFAULT_AVATAR: &str =
    "https://img.freepik.com/free-vector/blue-circle-with-white-user_78370-4707.jpg";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub user_id: String, // Cognito sub
    pub user_name: String,
    pub user_email: String,
    pub login_name: String, // Cognito username
    pub avatar: String,
    pub avatar_public_id: Option<String>,
    pub user_created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserPayload {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub password: Option<String>,
}

/// What other users may see: enough to contact a landlord.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UserContact {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub avatar: String,
}

impl From<&User> for UserContact {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            user_name: user.user_name.clone(),
            user_email: user.user_email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}
