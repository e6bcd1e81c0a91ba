//! Postgres ledger backend
//!
//! Schema is bootstrapped lazily on first use. All sqlx errors are wrapped
//! into [`BackendError::Database`]; raw driver errors never cross the store
//! boundary.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Expense, NewUser, User, UserUpdate};
use crate::stats;
use crate::Result;

use super::LedgerStore;

pub struct PgLedgerStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgLedgerStore {
    /// Builds a lazily-connecting pool; the first query establishes the
    /// actual connection and creates the schema if needed.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| BackendError::Database(format!("invalid database URL: {}", e)))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS users (
                      id UUID PRIMARY KEY,
                      username TEXT NOT NULL,
                      email TEXT NOT NULL UNIQUE,
                      password_hash TEXT NOT NULL,
                      monthly_income DOUBLE PRECISION NOT NULL DEFAULT 0,
                      savings_goal DOUBLE PRECISION NOT NULL DEFAULT 0,
                      gemini_api_key TEXT,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS expenses (
                      id UUID PRIMARY KEY,
                      user_id UUID NOT NULL REFERENCES users(id),
                      name TEXT NOT NULL,
                      amount DOUBLE PRECISION NOT NULL,
                      category TEXT NOT NULL,
                      occurred_at TIMESTAMPTZ NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_expenses_user_time
                    ON expenses (user_id, occurred_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                BackendError::Database(format!("failed to initialize ledger schema: {}", e))
            })?;

        Ok(())
    }
}

fn db_err(context: &str, e: sqlx::Error) -> BackendError {
    BackendError::Database(format!("{}: {}", context, e))
}

fn user_from_row(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        monthly_income: row.try_get("monthly_income")?,
        savings_goal: row.try_get("savings_goal")?,
        gemini_api_key: row.try_get("gemini_api_key")?,
        created_at: row.try_get("created_at")?,
    })
}

fn expense_from_row(row: &PgRow) -> std::result::Result<Expense, sqlx::Error> {
    Ok(Expense {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        amount: row.try_get("amount")?,
        category: row.try_get("category")?,
        occurred_at: row.try_get("occurred_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, monthly_income, savings_goal, gemini_api_key, created_at";

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, monthly_income, savings_goal, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.monthly_income)
        .bind(new_user.savings_goal)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                BackendError::Conflict(format!("email already registered: {}", new_user.email))
            } else {
                db_err("failed to create user", e)
            }
        })?;

        user_from_row(&row).map_err(|e| db_err("failed to read created user", e))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("failed to look up user by email", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| db_err("failed to read user", e))
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("failed to load user", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| db_err("failed to read user", e))
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User> {
        self.ensure_schema().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
              username = COALESCE($2, username),
              monthly_income = COALESCE($3, monthly_income),
              savings_goal = COALESCE($4, savings_goal),
              gemini_api_key = COALESCE($5, gemini_api_key)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.username)
        .bind(update.monthly_income)
        .bind(update.savings_goal)
        .bind(update.gemini_api_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("failed to update user", e))?;

        let row = row.ok_or_else(|| BackendError::NotFound(format!("user {}", user_id)))?;
        user_from_row(&row).map_err(|e| db_err("failed to read updated user", e))
    }

    async fn insert_expense(&self, expense: Expense) -> Result<Expense> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, user_id, name, amount, category, occurred_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(&expense.name)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(expense.occurred_at)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("failed to insert expense", e))?;

        Ok(expense)
    }

    async fn list_expenses(&self, user_id: Uuid) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, amount, category, occurred_at, created_at
            FROM expenses
            WHERE user_id = $1
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("failed to list expenses", e))?;

        rows.iter()
            .map(expense_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("failed to read expense", e))
    }

    async fn expenses_in_current_month(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Expense>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, amount, category, occurred_at, created_at
            FROM expenses
            WHERE user_id = $1 AND occurred_at >= $2 AND occurred_at <= $3
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(user_id)
        .bind(stats::month_start(now))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("failed to list monthly expenses", e))?;

        rows.iter()
            .map(expense_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("failed to read expense", e))
    }

    async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(expense_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("failed to delete expense", e))?;

        Ok(result.rows_affected() > 0)
    }
}
