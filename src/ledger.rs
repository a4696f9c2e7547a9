//! Balance mutator and transaction ledger.
//!
//! Every change to a user's `drops` or `lightning` goes through this module:
//! the balance update, the level recompute and the ledger append commit in a
//! single database transaction, or not at all. The ledger itself is
//! append-only; rows are never updated or deleted.

use crate::database::Database;
use crate::errors::{Result, WorkshopError};
use crate::models::{LedgerEntry, TransactionCategory, User};
use crate::progression::level_for_lightning;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::info;

pub struct Ledger {
    db: Arc<Database>,
}

/// Ledger-vs-balance reconciliation result for one user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Reconciliation {
    pub user_id: i64,
    pub drops: i32,
    pub lightning: i32,
    pub ledger_drops: i64,
    pub ledger_lightning: i64,
    pub balanced: bool,
}

impl Ledger {
    pub fn new(db: Arc<Database>) -> Self {
        Ledger { db }
    }

    /// Credit drops and/or lightning to a user, appending one ledger entry.
    pub async fn credit(
        &self,
        user_id: i64,
        drops_delta: i32,
        lightning_delta: i32,
        category: TransactionCategory,
        related_id: Option<i64>,
        description: &str,
    ) -> Result<User> {
        let mut tx = self.db.pool().begin().await?;
        let user = Self::credit_tx(
            &mut tx,
            user_id,
            drops_delta,
            lightning_delta,
            category,
            related_id,
            description,
        )
        .await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Deduct drops from a user, appending one ledger entry. Fails with
    /// `InsufficientFunds` when the balance cannot cover the amount.
    pub async fn debit(
        &self,
        user_id: i64,
        drops: i32,
        category: TransactionCategory,
        related_id: Option<i64>,
        description: &str,
    ) -> Result<User> {
        let mut tx = self.db.pool().begin().await?;
        let user =
            Self::debit_tx(&mut tx, user_id, drops, category, related_id, description).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Credit within a caller-owned transaction, so engines can bundle the
    /// balance change with their own writes (daily-log claim, user insert).
    pub(crate) async fn credit_tx(
        conn: &mut PgConnection,
        user_id: i64,
        drops_delta: i32,
        lightning_delta: i32,
        category: TransactionCategory,
        related_id: Option<i64>,
        description: &str,
    ) -> Result<User> {
        if drops_delta < 0 || lightning_delta < 0 {
            return Err(WorkshopError::Validation(
                "credit deltas must be non-negative".to_string(),
            ));
        }

        let mut user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET drops = drops + $2,
                lightning = lightning + $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(drops_delta)
        .bind(lightning_delta)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(WorkshopError::UserNotFound)?;

        if lightning_delta != 0 {
            let level = level_for_lightning(user.lightning);
            if level != user.level {
                sqlx::query("UPDATE users SET level = $2, updated_at = NOW() WHERE id = $1")
                    .bind(user_id)
                    .bind(level)
                    .execute(&mut *conn)
                    .await?;
                info!("User {} reached level {}", user_id, level);
                user.level = level;
            }
        }

        Self::append_entry_tx(
            conn,
            user_id,
            category,
            drops_delta,
            lightning_delta,
            related_id,
            description,
        )
        .await?;

        Ok(user)
    }

    pub(crate) async fn debit_tx(
        conn: &mut PgConnection,
        user_id: i64,
        drops: i32,
        category: TransactionCategory,
        related_id: Option<i64>,
        description: &str,
    ) -> Result<User> {
        if drops <= 0 {
            return Err(WorkshopError::Validation(
                "debit amount must be positive".to_string(),
            ));
        }

        // Conditional update is the balance guard; a plain read before the
        // write would race with concurrent debits.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET drops = drops - $2,
                updated_at = NOW()
            WHERE id = $1 AND drops >= $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(drops)
        .fetch_optional(&mut *conn)
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                let available: Option<(i32,)> =
                    sqlx::query_as("SELECT drops FROM users WHERE id = $1")
                        .bind(user_id)
                        .fetch_optional(&mut *conn)
                        .await?;

                return match available {
                    Some((available,)) => Err(WorkshopError::InsufficientFunds {
                        required: drops,
                        available,
                    }),
                    None => Err(WorkshopError::UserNotFound),
                };
            }
        };

        Self::append_entry_tx(conn, user_id, category, -drops, 0, related_id, description).await?;

        Ok(user)
    }

    async fn append_entry_tx(
        conn: &mut PgConnection,
        user_id: i64,
        category: TransactionCategory,
        change_drops: i32,
        change_lightning: i32,
        related_id: Option<i64>,
        description: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (user_id, category, change_drops, change_lightning, related_id, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(change_drops)
        .bind(change_lightning)
        .bind(related_id)
        .bind(description)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// All ledger entries for a user, oldest first.
    pub async fn entries_for_user(&self, user_id: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(entries)
    }

    /// Compare the per-user ledger sums against the current balances.
    /// Holds for any account that has only ever been mutated through this
    /// module; administrative overrides would show up as an imbalance.
    pub async fn reconcile(&self, user_id: i64) -> Result<Reconciliation> {
        let user = self
            .db
            .find_user(user_id)
            .await?
            .ok_or(WorkshopError::UserNotFound)?;

        let (ledger_drops, ledger_lightning): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(change_drops), 0)::BIGINT,
                   COALESCE(SUM(change_lightning), 0)::BIGINT
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        let balanced =
            ledger_drops == user.drops as i64 && ledger_lightning == user.lightning as i64;

        Ok(Reconciliation {
            user_id,
            drops: user.drops,
            lightning: user.lightning,
            ledger_drops,
            ledger_lightning,
            balanced,
        })
    }
}
