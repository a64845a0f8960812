//! Inkpass HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use inkpass_core::WriterFeatureLimits;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, ChapterAccess, DebitRequest, DebitResult, EntitlementSnapshot,
    PackageList, PremiumStatus, TransactionPage, TransactionRecord, UnlockRequest, UnlockResult,
};

/// Inkpass API client.
///
/// Service methods authenticate with the service API key; reader methods take the
/// reader's bearer token per call.
#[derive(Debug, Clone)]
pub struct InkpassClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl InkpassClient {
    /// Create a new inkpass client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the inkpass service (e.g., `"http://inkpass:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new inkpass client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    // ------------------------------------------------------------------------
    // Public
    // ------------------------------------------------------------------------

    /// List the packages on sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_packages(&self) -> Result<PackageList, ClientError> {
        let url = format!("{}/v1/packages", self.base_url);
        self.send(self.client.get(&url)).await
    }

    // ------------------------------------------------------------------------
    // Reader (bearer token)
    // ------------------------------------------------------------------------

    /// Get the reader's entitlement snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_entitlements(&self, user_jwt: &str) -> Result<EntitlementSnapshot, ClientError> {
        let url = format!("{}/v1/entitlements/me", self.base_url);
        self.send(with_bearer(self.client.get(&url), user_jwt)).await
    }

    /// List the reader's purchase history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        user_jwt: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionPage, ClientError> {
        let url = format!("{}/v1/entitlements/me/transactions", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)]);
        self.send(with_bearer(request, user_jwt)).await
    }

    /// Get one of the reader's payments.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error. A payment
    /// owned by someone else is reported as not found.
    pub async fn get_payment(
        &self,
        user_jwt: &str,
        order_id: &str,
    ) -> Result<TransactionRecord, ClientError> {
        let url = format!("{}/v1/payments/{order_id}", self.base_url);
        self.send(with_bearer(self.client.get(&url), user_jwt)).await
    }

    /// Buy a chapter for the reader at the service's configured price.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCoins` if the reader cannot afford it.
    pub async fn unlock_chapter(
        &self,
        user_jwt: &str,
        chapter_id: &str,
    ) -> Result<UnlockResult, ClientError> {
        let url = format!("{}/v1/chapters/{chapter_id}/unlock", self.base_url);
        self.send(with_bearer(self.client.post(&url), user_jwt)).await
    }

    // ------------------------------------------------------------------------
    // Service (API key)
    // ------------------------------------------------------------------------

    /// Check whether a user may read a chapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check_chapter_access(
        &self,
        user_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterAccess, ClientError> {
        let url = format!(
            "{}/v1/internal/users/{user_id}/chapters/{chapter_id}/access",
            self.base_url
        );
        self.send(self.as_service(self.client.get(&url))).await
    }

    /// Buy a chapter on a user's behalf.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientCoins` if the user cannot afford it.
    pub async fn unlock_chapter_for_user(
        &self,
        user_id: &str,
        chapter_id: &str,
        cost: Option<i64>,
    ) -> Result<UnlockResult, ClientError> {
        let url = format!(
            "{}/v1/internal/users/{user_id}/chapters/{chapter_id}/unlock",
            self.base_url
        );
        let request = self.client.post(&url).json(&UnlockRequest { cost });
        self.send(self.as_service(request)).await
    }

    /// Get a user's writer capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn writer_limits(&self, user_id: &str) -> Result<WriterFeatureLimits, ClientError> {
        let url = format!("{}/v1/internal/users/{user_id}/writer-limits", self.base_url);
        self.send(self.as_service(self.client.get(&url))).await
    }

    /// Check whether a user's premium membership is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn is_premium_active(&self, user_id: &str) -> Result<bool, ClientError> {
        let url = format!("{}/v1/internal/users/{user_id}/premium", self.base_url);
        let status: PremiumStatus = self.send(self.as_service(self.client.get(&url))).await?;
        Ok(status.premium_active)
    }

    /// Take coins from a user. `debited` is false when the balance was too small.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn debit_coins(&self, user_id: &str, amount: i64) -> Result<DebitResult, ClientError> {
        let url = format!("{}/v1/internal/users/{user_id}/coins/debit", self.base_url);
        let request = self.client.post(&url).json(&DebitRequest { amount });
        self.send(self.as_service(request)).await
    }

    fn as_service(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let detail = |key: &str| {
                    api_error
                        .error
                        .details
                        .as_ref()
                        .and_then(|d| d.get(key))
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0)
                };

                if api_error.error.code == "insufficient_coins" {
                    return Err(ClientError::InsufficientCoins {
                        balance: detail("balance"),
                        required: detail("required"),
                    });
                }

                tracing::debug!(
                    status = status.as_u16(),
                    code = %api_error.error.code,
                    "Inkpass request failed"
                );

                Err(ClientError::Api {
                    code: api_error.error.code,
                    message: api_error.error.message,
                    status: status.as_u16(),
                })
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

fn with_bearer(request: RequestBuilder, user_jwt: &str) -> RequestBuilder {
    request.header("authorization", format!("Bearer {user_jwt}"))
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
