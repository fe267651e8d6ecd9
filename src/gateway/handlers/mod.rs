//! HTTP handlers
//!
//! - [`health`]: liveness probe
//! - [`account`]: create / get / list the caller's accounts
//! - [`transfer`]: funds transfer between two accounts

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{create_account, get_account, list_accounts};
pub use health::{HealthResponse, health_check};
pub use transfer::create_transfer;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::gateway::state::AppState;
    use crate::ledger::Ledger;
    use crate::models::CreateUserParams;
    use crate::user_auth::Claims;

    pub fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Ledger::memory(),
            "test-secret".to_string(),
            24,
            Duration::from_secs(1),
        ))
    }

    /// Insert a user directly and return claims as the middleware would
    pub async fn login_as(state: &AppState, username: &str) -> Claims {
        let mut conn = state.ledger.acquire().await.unwrap();
        conn.create_user(CreateUserParams {
            username: username.to_string(),
            full_name: username.to_string(),
            email: format!("{}@example.com", username),
            hashed_password: "hash".to_string(),
        })
        .await
        .unwrap();
        let (_, claims) = state.user_auth.issue_token(username).unwrap();
        claims
    }
}
