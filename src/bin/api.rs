use finance_advisor_backend::{
    api::{start_server, ApiState},
    auth::TokenKeys,
    gemini::GeminiClient,
    store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        warn!("GEMINI_API_KEY not set; chat will use the rule-based fallback");
        String::new()
    });

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set; using an insecure development secret");
        "insecure-dev-secret".to_string()
    });

    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let store = build_store();

    info!("Finance Advisor Backend - API Server");
    info!("Port: {}", port);

    let state = ApiState {
        store,
        model: Arc::new(GeminiClient::new(gemini_api_key)?),
        tokens: TokenKeys::new(&jwt_secret),
    };

    start_server(state, port).await?;

    Ok(())
}

/// Postgres when DATABASE_URL is configured, in-memory otherwise.
fn build_store() -> Arc<dyn LedgerStore> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        match PgLedgerStore::connect_lazy(&url) {
            Ok(store) => {
                info!("Ledger backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres ledger, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Ledger backend: in-memory");
    Arc::new(InMemoryLedgerStore::new())
}
