use serde::{Deserialize, Serialize};

use crate::models::UserInfo;

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

// -- Reactions --

/// Raw reaction kind; parsed by the handler so a bad value is reported as
/// a caller error rather than a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub reaction_type: String,
}

// -- Catalog --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCatRequest {
    pub name: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub care_instructions: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCatRequest {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub description: Option<String>,
    pub care_instructions: Option<String>,
    pub image_url: Option<String>,
}

// -- Discussions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDiscussionRequest {
    pub cat_id: i64,
    pub parent_id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDiscussionRequest {
    pub message: String,
}

// -- Common --

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        let count = data.len();
        Self { data, count }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
