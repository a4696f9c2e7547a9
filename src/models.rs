use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Creator,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Creator => "CREATOR",
            UserRole::Admin => "ADMIN",
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Banned,
}

/// Closed set of ledger entry categories. Callers supply the variant
/// directly; nothing is parsed from strings at the mutation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Checkin,
    Invite,
    TaskLogin,
    TaskView,
    TaskLike,
    TaskDonate,
    MapSold,
    MapReward,
    SysGrant,
    MapDownloadPay,
    MapDonatePay,
    ReportReward,
}

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    pub level: i32,
    pub lightning: i32,
    pub drops: i32,
    pub invite_code: String,
    pub inviter_id: Option<i64>,
    pub status: UserStatus,
    pub ban_reason: Option<String>,
    pub registration_ip: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user per-day task state, unique on (user_id, date)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyTaskLog {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub view_count: i32,
    pub like_count: i32,
    pub donate_drops: i32,
    pub is_checked_in: bool,
    pub login_rewarded: bool,
}

/// Immutable ledger entry, one row per balance-changing event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub category: TransactionCategory,
    pub change_drops: i32,
    pub change_lightning: i32,
    pub related_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// System configuration key/value row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemConfig {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// Registration request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 50))]
    pub nickname: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 72))]
    pub password: String,
    pub invite_code: Option<String>,
}

/// Login request; accepts either username or email
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username_or_email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Successful authentication response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub role: UserRole,
}

/// Profile update request; absent fields are left unchanged
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub nickname: Option<String>,
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 6, max = 72))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct ChangeEmailRequest {
    #[validate(email)]
    pub new_email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Public view of a user account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    pub level: i32,
    pub lightning: i32,
    pub drops: i32,
    pub invite_code: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfileResponse {
    fn from(user: User) -> Self {
        UserProfileResponse {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            email: user.email,
            avatar: user.avatar,
            bio: user.bio,
            role: user.role,
            level: user.level,
            lightning: user.lightning,
            drops: user.drops,
            invite_code: user.invite_code,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

/// Check-in result
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub drops: i32,
    pub total_drops: i32,
    pub checked_in_today: bool,
    pub last_checkin_date: NaiveDate,
}

/// Read-only check-in status
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinStatusResponse {
    pub checked_in_today: bool,
    pub last_checkin_date: Option<NaiveDate>,
    pub can_checkin: bool,
}
