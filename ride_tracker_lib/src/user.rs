use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub join_date: DateTime<Utc>,
}
