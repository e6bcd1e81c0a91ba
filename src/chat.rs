//! Chat orchestration
//!
//! Bridges the live Gemini call and the rule-based advice engine. The model
//! gets one best-effort attempt; any failure routes to the deterministic
//! fallback so the user always receives an answer.

use tracing::{info, warn};

use crate::advice;
use crate::gemini::GeminiClient;
use crate::models::{AdviceSource, ChatReply, Expense, StatisticsSnapshot};

/// Returned when the model call succeeds but yields nothing usable.
pub const APOLOGY: &str =
    "Sorry, I could not come up with an answer to that just now. Please try rephrasing your question.";

/// How many of the most-recent expenses are shown to the model.
pub const CONTEXT_EXPENSE_LIMIT: usize = 5;

/// Seam for the external text-generation call, mockable in tests.
///
/// `Ok(Some(text))` = usable answer, `Ok(None)` = success but nothing
/// extractable, `Err(_)` = transport/status/parse failure.
#[async_trait::async_trait]
pub trait AdviceModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        api_key_override: Option<&str>,
    ) -> crate::Result<Option<String>>;
}

#[async_trait::async_trait]
impl AdviceModel for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        api_key_override: Option<&str>,
    ) -> crate::Result<Option<String>> {
        GeminiClient::generate(self, prompt, api_key_override).await
    }
}

/// Render the user's monthly finances into the fixed-format context block
/// sent ahead of the question. `recent` must already be sorted newest first;
/// only the first [`CONTEXT_EXPENSE_LIMIT`] entries are included.
pub fn build_financial_context(snapshot: &StatisticsSnapshot, recent: &[Expense]) -> String {
    let savings_rate = if snapshot.monthly_income > 0.0 {
        snapshot.saved_amount / snapshot.monthly_income * 100.0
    } else {
        0.0
    };

    let mut context = format!(
        "Financial summary:\n\
         - Monthly income: {}\n\
         - Savings goal: {}\n\
         - Expenses this month: {}\n\
         - Amount saved: {}\n\
         - Savings rate: {}%\n",
        snapshot.monthly_income,
        snapshot.savings_goal,
        snapshot.total_expenses,
        snapshot.saved_amount,
        savings_rate
    );

    if !recent.is_empty() {
        context.push_str("Recent expenses:\n");
        for expense in recent.iter().take(CONTEXT_EXPENSE_LIMIT) {
            context.push_str(&format!(
                "- {}: {} ({})\n",
                expense.name, expense.amount, expense.category
            ));
        }
    }

    context
}

/// Answer a chat question: one model attempt, then the deterministic
/// fallback. Errors never propagate to the caller.
pub async fn answer_question(
    model: &dyn AdviceModel,
    api_key_override: Option<&str>,
    question: &str,
    snapshot: &StatisticsSnapshot,
    recent: &[Expense],
) -> ChatReply {
    let context = build_financial_context(snapshot, recent);
    let prompt = format!("{}\nQuestion: {}", context, question);

    match model.generate(&prompt, api_key_override).await {
        Ok(Some(text)) => {
            info!("Chat answered by model");
            ChatReply {
                reply: text,
                source: AdviceSource::Model,
            }
        }
        Ok(None) => {
            warn!("Model response carried no usable text");
            ChatReply {
                reply: APOLOGY.to_string(),
                source: AdviceSource::Model,
            }
        }
        Err(e) => {
            warn!("Model call failed, using rule-based advice: {}", e);
            ChatReply {
                reply: advice::generate_advice(question, snapshot, recent),
                source: AdviceSource::Fallback,
            }
        }
    }
}
