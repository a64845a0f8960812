//! Application state.

use std::sync::Arc;

use inkpass_core::{Catalog, Clock};
use inkpass_store::Store;

use crate::auth::{JwksVerifier, TokenVerifier};
use crate::config::ServiceConfig;
use crate::ledger::{EntitlementLedger, Entitlements};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The entitlement authority.
    pub ledger: Arc<dyn Entitlements>,

    /// Packages on sale.
    pub catalog: Arc<Catalog>,

    /// Time source for payment records.
    pub clock: Arc<dyn Clock>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Bearer token verification.
    pub token_verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: ServiceConfig) -> Self {
        let catalog = Arc::new(Catalog::default());

        let ledger = EntitlementLedger::new(store, Arc::clone(&clock))
            .with_policy(config.premium_grant_policy)
            .with_commit_attempts(config.commit_attempts)
            .with_catalog(Arc::clone(&catalog));

        let token_verifier = Arc::new(JwksVerifier::new(
            config.auth_base_url.clone(),
            config.auth_audience.clone(),
        ));

        if config.payment_webhook_secret.is_none() {
            tracing::warn!(
                "Payment webhook secret not configured - callbacks will not be verified"
            );
        }

        Self {
            ledger: Arc::new(ledger),
            catalog,
            clock,
            config,
            token_verifier,
        }
    }

    /// Replace the bearer token verifier.
    #[must_use]
    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.token_verifier = verifier;
        self
    }
}
