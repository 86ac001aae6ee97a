use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// POST /v1/register body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// Token is only present when JWT auth is enabled
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}
