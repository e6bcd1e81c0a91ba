//! Core data models for the finance backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Default category applied when an expense is submitted without one.
pub const DEFAULT_CATEGORY: &str = "other";

//
// ================= User =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub monthly_income: f64,
    pub savings_goal: f64,
    pub gemini_api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Client-facing view: no password hash, the API key only as a flag.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            monthly_income: self.monthly_income,
            savings_goal: self.savings_goal,
            has_gemini_key: self.gemini_api_key.is_some(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub monthly_income: f64,
    pub savings_goal: f64,
    pub has_gemini_key: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub monthly_income: f64,
    pub savings_goal: f64,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub monthly_income: Option<f64>,
    pub savings_goal: Option<f64>,
    pub gemini_api_key: Option<String>,
}

//
// ================= Expense =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub amount: f64,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Builds a new expense owned by `user_id`. The amount must already be
    /// validated (> 0, finite) at the API boundary.
    pub fn new(
        user_id: Uuid,
        name: String,
        amount: f64,
        category: Option<String>,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            amount,
            category: category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            occurred_at: occurred_at.unwrap_or(now),
            created_at: now,
        }
    }
}

//
// ================= Statistics =================
//

/// Derived monthly aggregate; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub monthly_income: f64,
    pub savings_goal: f64,
    pub total_expenses: f64,
    pub saved_amount: f64,
    pub goal_percentage: f64,
    pub category_totals: BTreeMap<String, f64>,
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub source: AdviceSource,
}

impl fmt::Display for AdviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdviceSource::Model => "model",
            AdviceSource::Fallback => "fallback",
        };
        write!(f, "{}", s)
    }
}
