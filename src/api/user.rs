use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::user::{Id, Role};

/// Wire representation of a user. Deliberately omits the password hash.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub company: Option<String>,
    pub team: Option<String>,
    pub permissions: Vec<String>,
}

/// Body of a successful update: an acknowledgment plus the new state.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Updated {
    pub message: String,
    pub user: User,
}

impl From<db::User> for User {
    fn from(user: db::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            company: user.company,
            team: user.team,
            permissions: user.permissions,
        }
    }
}
