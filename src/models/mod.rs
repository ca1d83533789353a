use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User represents an account synced from Google OAuth or created through
/// the manual email/username flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// OAuth subject id. Absent for manually created users.
    #[serde(rename = "googleId", skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    /// Generated stable identity (`USER_xxxx`) usable in place of a google id.
    #[serde(rename = "customUserId")]
    pub custom_user_id: String,
    pub email: String,
    pub username: String,
    /// The name shown on this user's confessions. Defaults to empty,
    /// rendered as "Anonymous" when snapshotted onto a post.
    #[serde(rename = "anonymousName")]
    pub anonymous_name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub picture: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_PICTURE: &str = "https://cdn-icons-png.flaticon.com/512/149/149071.png";

/// The fixed set of reaction kinds a confession accepts.
///
/// This is the canonical vocabulary; the legacy stored-schema set
/// (`like/love/laugh`) is not emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Heart,
    Laugh,
    Cry,
    Dislike,
}

/// A reaction request: one of the fixed kinds, or the explicit remove
/// sentinel. `unlike` is accepted as a legacy alias of `remove`.
///
/// Unrecognized kinds fail deserialization, so they are rejected at the
/// boundary with a 400 before any state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedReaction {
    Like,
    Heart,
    Laugh,
    Cry,
    Dislike,
    #[serde(alias = "unlike")]
    Remove,
}

impl RequestedReaction {
    /// The concrete kind being requested, or `None` for the remove sentinel.
    pub fn kind(self) -> Option<ReactionKind> {
        match self {
            Self::Like => Some(ReactionKind::Like),
            Self::Heart => Some(ReactionKind::Heart),
            Self::Laugh => Some(ReactionKind::Laugh),
            Self::Cry => Some(ReactionKind::Cry),
            Self::Dislike => Some(ReactionKind::Dislike),
            Self::Remove => None,
        }
    }
}

/// A single user's reaction to a confession.
/// Invariant: at most one per `user_id` on any confession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

/// A comment on a confession. Mutable and removable only by its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "userImage")]
    pub user_image: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Confession is an anonymous text post guarded by a secret code.
///
/// The reaction, save, and comment lists live on the confession record
/// itself (stored as JSON columns) and are only ever mutated through the
/// engine, which enforces their invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confession {
    pub id: String,
    pub text: String,
    /// One-way hash of the secret code. Never serialized to clients.
    #[serde(skip_serializing, default)]
    pub secret_code_hash: String,
    #[serde(rename = "userId")]
    pub author_id: String,
    /// Anonymous name snapshotted at post time.
    #[serde(rename = "anonymousName")]
    pub display_name: String,
    pub category: String,
    pub reactions: Vec<Reaction>,
    #[serde(rename = "savedBy")]
    pub saved_by: Vec<String>,
    pub comments: Vec<Comment>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

pub const MAX_CONFESSION_LEN: usize = 1000;
pub const MIN_SECRET_CODE_LEN: usize = 4;
pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

// Request/Response types for API

#[derive(Debug, Deserialize)]
pub struct CreateConfessionRequest {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "secretCode", default)]
    pub secret_code: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfessionRequest {
    #[serde(rename = "secretCode", default)]
    pub secret_code: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteConfessionRequest {
    #[serde(rename = "secretCode", default)]
    pub secret_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub requested: RequestedReaction,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(rename = "userImage", default)]
    pub user_image: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    #[serde(rename = "googleId")]
    pub google_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub id: Option<String>,
    #[serde(rename = "googleId")]
    pub google_id: Option<String>,
    #[serde(rename = "anonymousName", default)]
    pub anonymous_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualAuthRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
