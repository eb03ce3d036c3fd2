//! Party entity: a user known to the marketplace directory.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}
