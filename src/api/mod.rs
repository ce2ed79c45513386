pub mod user;

use serde::{Deserialize, Serialize};

pub use self::user::User;

/// JSON `{message}` body shared by acknowledgments and error responses.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
