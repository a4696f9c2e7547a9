use crate::errors::Result;
use crate::models::{DailyTaskLog, User};
use chrono::{NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Pool, Postgres};
use std::time::Duration;

pub struct Database {
    pool: Pool<Postgres>,
}

/// Field set for a user insert; everything else takes its column default.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub invite_code: String,
    pub inviter_id: Option<i64>,
    pub registration_ip: Option<String>,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- users ----

    pub async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn exists_username(&self, username: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1::BIGINT FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn exists_email(&self, email: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1::BIGINT FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn exists_invite_code(&self, invite_code: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1::BIGINT FROM users WHERE invite_code = $1")
                .bind(invite_code)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Registrations recorded from an IP on a given calendar date.
    pub async fn count_registrations_from_ip(&self, ip: &str, date: NaiveDate) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users
            WHERE registration_ip = $1 AND created_at::date = $2
            "#,
        )
        .bind(ip)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Insert a new user within a caller-owned transaction. Unique
    /// violations surface as `sqlx::Error`; the caller translates them by
    /// constraint name.
    pub async fn insert_user_tx(conn: &mut PgConnection, new_user: &NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (username, nickname, email, password_hash, invite_code, inviter_id, registration_ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.nickname)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.invite_code)
        .bind(new_user.inviter_id)
        .bind(&new_user.registration_ip)
        .fetch_one(conn)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_invite_code_tx(
        conn: &mut PgConnection,
        invite_code: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE invite_code = $1")
            .bind(invite_code)
            .fetch_optional(conn)
            .await?;

        Ok(user)
    }

    pub async fn touch_last_login(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = NOW() WHERE id = $2")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Partial profile update; `None` fields keep their current value.
    pub async fn update_profile(
        &self,
        user_id: i64,
        nickname: Option<&str>,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET nickname = COALESCE($2, nickname),
                avatar = COALESCE($3, avatar),
                bio = COALESCE($4, bio),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(nickname)
        .bind(avatar)
        .bind(bio)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_email(&self, user_id: i64, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = $1, updated_at = NOW() WHERE id = $2")
            .bind(email)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_avatar(&self, user_id: i64, avatar: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET avatar = $1, updated_at = NOW() WHERE id = $2")
            .bind(avatar)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ---- daily task logs ----

    pub async fn get_daily_log(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyTaskLog>> {
        let log = sqlx::query_as::<_, DailyTaskLog>(
            "SELECT * FROM daily_task_logs WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    /// Lazily create today's log row. The unique constraint on
    /// (user_id, date) makes concurrent creation attempts converge on a
    /// single row.
    pub async fn ensure_daily_log_tx(
        conn: &mut PgConnection,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_task_logs (user_id, date)
            VALUES ($1, $2)
            ON CONFLICT (user_id, date) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(date)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Claim today's check-in flag. Returns false if it was already set,
    /// which is how a concurrent second check-in loses the race.
    pub async fn claim_checkin_tx(
        conn: &mut PgConnection,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE daily_task_logs
            SET is_checked_in = TRUE
            WHERE user_id = $1 AND date = $2 AND is_checked_in = FALSE
            "#,
        )
        .bind(user_id)
        .bind(date)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ---- system configuration ----

    pub async fn get_config_value(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM system_configs WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }
}
