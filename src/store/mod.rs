//! Ledger persistence layer
//!
//! Users and their expense entries, behind a trait so handlers and the
//! chat path can be tested without a live database. Backends: in-memory
//! (development, tests) and Postgres (see `postgres`).

pub mod postgres;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{Expense, NewUser, User, UserUpdate};
use crate::stats;
use crate::Result;

pub use postgres::PgLedgerStore;

/// Trait for ledger persistence
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;
    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User>;

    async fn insert_expense(&self, expense: Expense) -> Result<Expense>;
    /// All of the user's expenses, newest first.
    async fn list_expenses(&self, user_id: Uuid) -> Result<Vec<Expense>>;
    /// Expenses dated within `[month_start(now), now]`, newest first.
    async fn expenses_in_current_month(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Expense>>;
    /// Owner-checked delete; false when the expense does not exist or
    /// belongs to someone else.
    async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<bool>;
}

/// In-memory ledger store for development and tests
pub struct InMemoryLedgerStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    expenses_by_user: Arc<RwLock<HashMap<Uuid, Vec<Expense>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            expenses_by_user: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(BackendError::Conflict(format!(
                "email already registered: {}",
                new_user.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            monthly_income: new_user.monthly_income,
            savings_goal: new_user.savings_goal,
            gemini_api_key: None,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).cloned())
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User> {
        let mut users = self.users.write().await;

        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| BackendError::NotFound(format!("user {}", user_id)))?;

        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(income) = update.monthly_income {
            user.monthly_income = income;
        }
        if let Some(goal) = update.savings_goal {
            user.savings_goal = goal;
        }
        if let Some(key) = update.gemini_api_key {
            user.gemini_api_key = Some(key);
        }

        Ok(user.clone())
    }

    async fn insert_expense(&self, expense: Expense) -> Result<Expense> {
        let mut expenses = self.expenses_by_user.write().await;
        expenses
            .entry(expense.user_id)
            .or_insert_with(Vec::new)
            .push(expense.clone());

        Ok(expense)
    }

    async fn list_expenses(&self, user_id: Uuid) -> Result<Vec<Expense>> {
        let expenses = self.expenses_by_user.read().await;

        let mut list = expenses.get(&user_id).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        Ok(list)
    }

    async fn expenses_in_current_month(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Expense>> {
        let expenses = self.expenses_by_user.read().await;

        let mut list: Vec<Expense> = expenses
            .get(&user_id)
            .map(|v| {
                v.iter()
                    .filter(|e| stats::in_current_month(e.occurred_at, now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        Ok(list)
    }

    async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<bool> {
        let mut expenses = self.expenses_by_user.write().await;

        let Some(list) = expenses.get_mut(&user_id) else {
            return Ok(false);
        };

        let before = list.len();
        list.retain(|e| e.id != expense_id);

        Ok(list.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "tester".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            monthly_income: 50000.0,
            savings_goal: 20000.0,
        }
    }

    fn expense_at(user_id: Uuid, amount: f64, occurred_at: DateTime<Utc>) -> Expense {
        Expense::new(
            user_id,
            "test".to_string(),
            amount,
            Some("misc".to_string()),
            Some(occurred_at),
        )
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryLedgerStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();

        let result = store.create_user(new_user("A@Example.com")).await;
        assert!(matches!(result, Err(BackendError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_and_update_user() {
        let store = InMemoryLedgerStore::new();
        let user = store.create_user(new_user("b@example.com")).await.unwrap();

        let found = store.find_user_by_email("b@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let updated = store
            .update_user(
                user.id,
                UserUpdate {
                    monthly_income: Some(60000.0),
                    gemini_api_key: Some("key".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.monthly_income, 60000.0);
        assert_eq!(updated.savings_goal, 20000.0);
        assert!(updated.gemini_api_key.is_some());
    }

    #[tokio::test]
    async fn test_month_filter_and_ordering() {
        let store = InMemoryLedgerStore::new();
        let user = store.create_user(new_user("c@example.com")).await.unwrap();
        let now = Utc::now();

        store
            .insert_expense(expense_at(user.id, 10.0, now - Duration::minutes(5)))
            .await
            .unwrap();
        store
            .insert_expense(expense_at(user.id, 20.0, now - Duration::minutes(1)))
            .await
            .unwrap();
        // Outside the window: before the month started.
        store
            .insert_expense(expense_at(
                user.id,
                30.0,
                stats::month_start(now) - Duration::hours(1),
            ))
            .await
            .unwrap();

        let in_month = store.expenses_in_current_month(user.id, now).await.unwrap();
        assert_eq!(in_month.len(), 2);
        // Newest first
        assert_eq!(in_month[0].amount, 20.0);
        assert_eq!(in_month[1].amount, 10.0);

        let all = store.list_expenses(user.id).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_is_owner_checked() {
        let store = InMemoryLedgerStore::new();
        let owner = store.create_user(new_user("d@example.com")).await.unwrap();
        let other = store.create_user(new_user("e@example.com")).await.unwrap();

        let expense = store
            .insert_expense(expense_at(owner.id, 10.0, Utc::now()))
            .await
            .unwrap();

        assert!(!store.delete_expense(other.id, expense.id).await.unwrap());
        assert!(store.delete_expense(owner.id, expense.id).await.unwrap());
        assert!(!store.delete_expense(owner.id, expense.id).await.unwrap());
    }
}
