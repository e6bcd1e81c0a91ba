//! Personal Finance Backend
//!
//! A finance-tracking service that:
//! - Manages user accounts with token-based auth
//! - Logs expenses and aggregates them into monthly statistics
//! - Answers chat questions via the Gemini API, with a deterministic
//!   rule-based advice engine as the fallback
//!
//! CHAT PATH:
//! REQUEST → AUTH → LEDGER READS → SNAPSHOT → (GEMINI | ADVICE ENGINE) → JSON

pub mod advice;
pub mod api;
pub mod auth;
pub mod chat;
pub mod error;
pub mod gemini;
pub mod models;
pub mod stats;
pub mod store;

pub use error::Result;

// Re-export common types
pub use models::*;
