use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub avatar: Option<String>, // storage key
    pub is_staff: bool,
    pub created_at: OffsetDateTime,
}

/// User as seen by a (possibly anonymous) viewer.
#[derive(Debug, Clone, FromRow)]
pub struct UserProfileRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

/// Followed author with the number of recipes they published.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    #[sqlx(flatten)]
    pub author: UserProfileRow,
    pub recipes_count: i64,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
}
