use std::time::Duration;

use crate::account::AccountService;
use crate::ledger::Ledger;
use crate::transfer::TransferService;
use crate::user_auth::UserAuthService;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Ledger handle, also used by the health probe
    pub ledger: Ledger,
    pub accounts: AccountService,
    pub transfers: TransferService,
    pub user_auth: UserAuthService,
    /// Deadline applied to every transfer request
    pub transfer_timeout: Duration,
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        jwt_secret: String,
        token_ttl_hours: i64,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            accounts: AccountService::new(ledger.clone()),
            transfers: TransferService::new(ledger.clone()),
            user_auth: UserAuthService::new(ledger.clone(), jwt_secret, token_ttl_hours),
            ledger,
            transfer_timeout,
        }
    }
}
