//! Runtime feature flags and limits, read through from the
//! `system_configs` table with hardcoded defaults.

use crate::database::Database;
use crate::errors::Result;
use std::sync::Arc;

pub const KEY_REGISTRATION_ENABLED: &str = "registration_enabled";
pub const KEY_LOGIN_ENABLED: &str = "login_enabled";
pub const KEY_ALLOWED_EMAIL_DOMAINS: &str = "allowed_email_domains";
pub const KEY_DAILY_IP_REGISTRATION_LIMIT: &str = "daily_ip_registration_limit";
pub const KEY_CHECKIN_FIXED_DROPS: &str = "checkin_fixed_drops";
pub const KEY_CHECKIN_RANDOM_ENABLED: &str = "checkin_random_enabled";

pub struct SystemConfigService {
    db: Arc<Database>,
}

impl SystemConfigService {
    pub fn new(db: Arc<Database>) -> Self {
        SystemConfigService { db }
    }

    pub async fn is_registration_enabled(&self) -> Result<bool> {
        self.get_bool(KEY_REGISTRATION_ENABLED, true).await
    }

    pub async fn is_login_enabled(&self) -> Result<bool> {
        self.get_bool(KEY_LOGIN_ENABLED, true).await
    }

    /// Whether registrations with the given email domain are accepted.
    /// An unset or empty allowlist rejects every domain.
    pub async fn is_email_domain_allowed(&self, domain: &str) -> Result<bool> {
        let value = self
            .get_string(KEY_ALLOWED_EMAIL_DOMAINS, "")
            .await?;

        Ok(domain_in_list(&value, domain))
    }

    pub async fn daily_ip_registration_limit(&self) -> Result<i64> {
        self.get_int(KEY_DAILY_IP_REGISTRATION_LIMIT, 3).await
    }

    pub async fn checkin_fixed_drops(&self) -> Result<i64> {
        self.get_int(KEY_CHECKIN_FIXED_DROPS, 5).await
    }

    pub async fn is_checkin_random_enabled(&self) -> Result<bool> {
        self.get_bool(KEY_CHECKIN_RANDOM_ENABLED, true).await
    }

    async fn get_string(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .db
            .get_config_value(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let value = self.get_string(key, "").await?;
        Ok(parse_bool(&value, default))
    }

    async fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        let value = self.get_string(key, "").await?;
        Ok(value.trim().parse().unwrap_or(default))
    }
}

/// Malformed values fall back to the default rather than failing the caller.
fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => default,
    }
}

fn domain_in_list(list: &str, domain: &str) -> bool {
    if list.trim().is_empty() {
        return false;
    }

    list.split(',')
        .any(|entry| entry.trim().eq_ignore_ascii_case(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_falls_back_on_garbage() {
        assert!(parse_bool("", true));
        assert!(!parse_bool("", false));
        assert!(parse_bool("yes please", true));
        assert!(parse_bool("TRUE", false));
        assert!(!parse_bool(" false ", true));
    }

    #[test]
    fn test_empty_allowlist_rejects_everything() {
        assert!(!domain_in_list("", "example.com"));
        assert!(!domain_in_list("   ", "example.com"));
    }

    #[test]
    fn test_allowlist_matching() {
        let list = "gmail.com, outlook.com ,example.org";
        assert!(domain_in_list(list, "gmail.com"));
        assert!(domain_in_list(list, "OUTLOOK.COM"));
        assert!(domain_in_list(list, "example.org"));
        assert!(!domain_in_list(list, "example.com"));
        assert!(!domain_in_list(list, "mail.gmail.com"));
    }
}
