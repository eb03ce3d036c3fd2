//! Participant entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub conversation_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    /// Read watermark; never moves backward once set.
    pub last_read_at: Option<DateTime<Utc>>,
}
