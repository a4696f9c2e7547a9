//! Registration and login.
//!
//! Registration runs as one transaction: inviter lookup, user insert and
//! invite rewards either all commit or none do. The unique constraints on
//! username/email/invite_code are the authoritative duplicate guards; the
//! `exists_*` pre-checks only produce friendlier errors for the common case.

use crate::database::{Database, NewUser};
use crate::errors::{Result, WorkshopError};
use crate::ledger::Ledger;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, TransactionCategory, User, UserStatus};
use crate::password;
use crate::security;
use crate::system_config::SystemConfigService;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

const INVITE_CODE_LEN: usize = 8;
const INVITE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Drops granted to a newly registered invitee.
const INVITEE_DROPS: i32 = 20;
/// Drops and lightning granted to the inviter, as two separate ledger rows.
const INVITER_DROPS: i32 = 10;
const INVITER_LIGHTNING: i32 = 10;

/// One planned ledger credit in the referral reward scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteRewardRow {
    pub user_id: i64,
    pub drops: i32,
    pub lightning: i32,
    pub counterparty: i64,
    pub description: &'static str,
}

/// Ledger rows produced by a successful referral: invitee +20 drops, inviter
/// +10 drops and +10 lightning. The inviter's two changes stay separate
/// entries so each row moves exactly one currency.
pub fn invite_reward_plan(invitee_id: i64, inviter_id: i64) -> [InviteRewardRow; 3] {
    [
        InviteRewardRow {
            user_id: invitee_id,
            drops: INVITEE_DROPS,
            lightning: 0,
            counterparty: inviter_id,
            description: "Referral sign-up reward",
        },
        InviteRewardRow {
            user_id: inviter_id,
            drops: INVITER_DROPS,
            lightning: 0,
            counterparty: invitee_id,
            description: "Invite reward",
        },
        InviteRewardRow {
            user_id: inviter_id,
            drops: 0,
            lightning: INVITER_LIGHTNING,
            counterparty: invitee_id,
            description: "Invite reward",
        },
    ]
}

pub struct AuthService {
    db: Arc<Database>,
    config: Arc<SystemConfigService>,
    jwt_secret: String,
    jwt_expiry_hours: i64,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        config: Arc<SystemConfigService>,
        jwt_secret: String,
        jwt_expiry_hours: i64,
    ) -> Self {
        AuthService {
            db,
            config,
            jwt_secret,
            jwt_expiry_hours,
        }
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
        client_ip: Option<String>,
    ) -> Result<AuthResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| WorkshopError::Validation(e.to_string()))?;

        if !self.config.is_registration_enabled().await? {
            return Err(WorkshopError::Conflict(
                "Registration is currently disabled".to_string(),
            ));
        }

        if self.db.exists_username(&request.username).await? {
            return Err(WorkshopError::Conflict("Username already taken".to_string()));
        }

        if self.db.exists_email(&request.email).await? {
            return Err(WorkshopError::Conflict(
                "Email already registered".to_string(),
            ));
        }

        let domain = email_domain(&request.email)
            .ok_or_else(|| WorkshopError::Validation("Malformed email address".to_string()))?;
        if !self.config.is_email_domain_allowed(domain).await? {
            return Err(WorkshopError::Conflict(
                "Email domain not allowed for registration".to_string(),
            ));
        }

        if let Some(ip) = client_ip.as_deref() {
            let today = Utc::now().date_naive();
            let count = self.db.count_registrations_from_ip(ip, today).await?;
            if count >= self.config.daily_ip_registration_limit().await? {
                return Err(WorkshopError::Conflict(
                    "Daily registration limit reached for this IP".to_string(),
                ));
            }
        }

        let password_hash = password::hash_password(&request.password)?;

        let mut invite_code = generate_invite_code(&mut rand::thread_rng());
        while self.db.exists_invite_code(&invite_code).await? {
            invite_code = generate_invite_code(&mut rand::thread_rng());
        }

        let mut tx = self.db.pool().begin().await?;

        let inviter = match request.invite_code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => Some(
                Database::find_user_by_invite_code_tx(&mut tx, code)
                    .await?
                    .ok_or(WorkshopError::InvalidInviteCode)?,
            ),
            None => None,
        };

        let new_user = NewUser {
            username: request.username.clone(),
            nickname: request.nickname.clone(),
            email: request.email.clone(),
            password_hash,
            invite_code,
            inviter_id: inviter.as_ref().map(|u| u.id),
            registration_ip: client_ip,
        };

        let user = Database::insert_user_tx(&mut tx, &new_user)
            .await
            .map_err(translate_registration_conflict)?;

        if let Some(inviter) = &inviter {
            Self::grant_invite_rewards(&mut tx, user.id, inviter.id).await?;
        }

        tx.commit().await?;

        info!(
            "Registered user {} (id {}, invited_by {:?})",
            user.username,
            user.id,
            inviter.as_ref().map(|u| u.id)
        );

        self.auth_response(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| WorkshopError::Validation(e.to_string()))?;

        if !self.config.is_login_enabled().await? {
            return Err(WorkshopError::Conflict(
                "Login is currently disabled".to_string(),
            ));
        }

        let user = match self
            .db
            .find_user_by_username(&request.username_or_email)
            .await?
        {
            Some(user) => Some(user),
            None => self.db.find_user_by_email(&request.username_or_email).await?,
        };

        // Same message for unknown account and wrong password.
        let user = user.ok_or_else(|| {
            WorkshopError::Unauthorized("Invalid username or password".to_string())
        })?;

        if !password::verify_password(&request.password, &user.password_hash)? {
            return Err(WorkshopError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        if user.status == UserStatus::Banned {
            let reason = user.ban_reason.as_deref().unwrap_or("unspecified");
            return Err(WorkshopError::Unauthorized(format!(
                "Account is banned: {}",
                reason
            )));
        }

        self.db.touch_last_login(user.id).await?;

        info!("User {} logged in", user.username);

        self.auth_response(&user)
    }

    /// Apply [`invite_reward_plan`] inside the registration transaction.
    async fn grant_invite_rewards(
        conn: &mut sqlx::PgConnection,
        invitee_id: i64,
        inviter_id: i64,
    ) -> Result<()> {
        for row in invite_reward_plan(invitee_id, inviter_id) {
            Ledger::credit_tx(
                &mut *conn,
                row.user_id,
                row.drops,
                row.lightning,
                TransactionCategory::Invite,
                Some(row.counterparty),
                row.description,
            )
            .await?;
        }

        Ok(())
    }

    fn auth_response(&self, user: &User) -> Result<AuthResponse> {
        let token = security::issue_token(&self.jwt_secret, self.jwt_expiry_hours, user)?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            user_id: user.id,
            username: user.username.clone(),
            nickname: user.nickname.clone(),
            role: user.role,
        })
    }
}

fn translate_registration_conflict(err: WorkshopError) -> WorkshopError {
    if err.is_unique_violation("users_username_key") {
        WorkshopError::Conflict("Username already taken".to_string())
    } else if err.is_unique_violation("users_email_key") {
        WorkshopError::Conflict("Email already registered".to_string())
    } else if err.is_unique_violation("users_invite_code_key") {
        WorkshopError::Conflict("Invite code collision, please retry".to_string())
    } else {
        err
    }
}

/// Domain part of an email, `None` when missing or empty. Shared by
/// registration and email change so the allowlist check cannot drift.
pub(crate) fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain).filter(|d| !d.is_empty())
}

fn generate_invite_code<R: Rng>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_CHARSET[rng.gen_range(0..INVITE_CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_invite_code_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let code = generate_invite_code(&mut rng);
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code
                .bytes()
                .all(|b| INVITE_CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_invite_codes_vary() {
        let mut rng = StdRng::seed_from_u64(2);
        let first = generate_invite_code(&mut rng);
        let second = generate_invite_code(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_email_domain_extraction() {
        assert_eq!(email_domain("user@example.com"), Some("example.com"));
        assert_eq!(email_domain("a@b@sub.example.org"), Some("sub.example.org"));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("trailing@"), None);
    }
}
