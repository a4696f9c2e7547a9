//! Profile management: view/update, credential changes, avatar storage.

use crate::database::Database;
use crate::errors::{Result, WorkshopError};
use crate::models::{
    ChangeEmailRequest, ChangePasswordRequest, UpdateProfileRequest, User, UserProfileResponse,
};
use crate::password;
use crate::storage::{avatar_object_key, content_type_for_key, BlobStore};
use crate::system_config::SystemConfigService;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const ALLOWED_AVATAR_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

pub struct UserService {
    db: Arc<Database>,
    config: Arc<SystemConfigService>,
    blobs: Arc<dyn BlobStore>,
}

impl UserService {
    pub fn new(
        db: Arc<Database>,
        config: Arc<SystemConfigService>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        UserService { db, config, blobs }
    }

    pub async fn profile(&self, user_id: i64) -> Result<UserProfileResponse> {
        let user = self.require_user(user_id).await?;
        Ok(user.into())
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserProfileResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| WorkshopError::Validation(e.to_string()))?;

        // Whitespace-only nicknames are treated as absent.
        let nickname = request
            .nickname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let avatar = request.avatar.as_deref().map(str::trim);
        let bio = request.bio.as_deref().map(str::trim);

        let user = self
            .db
            .update_profile(user_id, nickname, avatar, bio)
            .await?
            .ok_or(WorkshopError::UserNotFound)?;

        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        validator::Validate::validate(&request)
            .map_err(|e| WorkshopError::Validation(e.to_string()))?;

        let user = self.require_user(user_id).await?;

        if !password::verify_password(&request.old_password, &user.password_hash)? {
            return Err(WorkshopError::Unauthorized(
                "Old password is incorrect".to_string(),
            ));
        }

        if request.old_password == request.new_password {
            return Err(WorkshopError::Conflict(
                "New password must differ from the old one".to_string(),
            ));
        }

        let hash = password::hash_password(&request.new_password)?;
        self.db.update_password_hash(user_id, &hash).await?;

        info!("User {} changed password", user_id);
        Ok(())
    }

    pub async fn change_email(&self, user_id: i64, request: ChangeEmailRequest) -> Result<()> {
        validator::Validate::validate(&request)
            .map_err(|e| WorkshopError::Validation(e.to_string()))?;

        let user = self.require_user(user_id).await?;

        if !password::verify_password(&request.password, &user.password_hash)? {
            return Err(WorkshopError::Unauthorized("Password is incorrect".to_string()));
        }

        if user.email == request.new_email {
            return Err(WorkshopError::Conflict(
                "New email must differ from the current one".to_string(),
            ));
        }

        if self.db.exists_email(&request.new_email).await? {
            return Err(WorkshopError::Conflict("Email already in use".to_string()));
        }

        let domain = crate::auth::email_domain(&request.new_email)
            .ok_or_else(|| WorkshopError::Validation("Malformed email address".to_string()))?;
        if !self.config.is_email_domain_allowed(domain).await? {
            return Err(WorkshopError::Conflict(
                "Email domain not allowed".to_string(),
            ));
        }

        self.db.update_email(user_id, &request.new_email).await?;

        info!("User {} changed email", user_id);
        Ok(())
    }

    /// Store a new avatar under `avatars/{username}_{id}_{ts}.{ext}` and
    /// drop the previous object. Returns the stored object key.
    pub async fn upload_avatar(
        &self,
        user_id: i64,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let extension = extension.to_ascii_lowercase();
        if !ALLOWED_AVATAR_EXTENSIONS.contains(&extension.as_str()) {
            return Err(WorkshopError::Validation(format!(
                "Unsupported avatar format: {}",
                extension
            )));
        }

        if bytes.is_empty() {
            return Err(WorkshopError::Validation("Empty avatar upload".to_string()));
        }

        let user = self.require_user(user_id).await?;

        let key = avatar_object_key(&user.username, user.id, Utc::now().timestamp(), &extension);
        self.blobs.put(&key, &bytes).await?;
        self.db.update_avatar(user_id, Some(&key)).await?;

        if let Some(old_key) = user.avatar.as_deref().filter(|old| *old != key) {
            if let Err(err) = self.blobs.delete(old_key).await {
                warn!("Failed to delete replaced avatar {}: {}", old_key, err);
            }
        }

        info!("User {} uploaded avatar {}", user_id, key);
        Ok(key)
    }

    /// Avatar bytes plus the content type to serve them with.
    pub async fn fetch_avatar(&self, user_id: i64) -> Result<(Vec<u8>, &'static str)> {
        let user = self.require_user(user_id).await?;

        let key = user
            .avatar
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| WorkshopError::NotFound("User has no avatar".to_string()))?;

        let bytes = self
            .blobs
            .get(key)
            .await?
            .ok_or_else(|| WorkshopError::NotFound("Avatar object missing".to_string()))?;

        Ok((bytes, content_type_for_key(key)))
    }

    pub async fn remove_avatar(&self, user_id: i64) -> Result<()> {
        let user = self.require_user(user_id).await?;

        if let Some(key) = user.avatar.as_deref().filter(|k| !k.is_empty()) {
            if let Err(err) = self.blobs.delete(key).await {
                warn!("Failed to delete avatar {}: {}", key, err);
            }
        }

        self.db.update_avatar(user_id, None).await?;

        info!("User {} removed avatar", user_id);
        Ok(())
    }

    async fn require_user(&self, user_id: i64) -> Result<User> {
        self.db
            .find_user(user_id)
            .await?
            .ok_or(WorkshopError::UserNotFound)
    }
}
