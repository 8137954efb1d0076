//! Hosted data service client for the `cart_items` collection.
//!
//! Talks to the service's PostgREST-style API under `/rest/v1/`:
//!
//! | Operation        | Request                                                        |
//! |------------------|----------------------------------------------------------------|
//! | fetch            | `GET cart_items?select=*,product:products(*)&user_id=eq.U`     |
//! | increment        | `POST rpc/increment_cart_item`                                 |
//! | update quantity  | `PATCH cart_items?user_id=eq.U&product_id=eq.P`                |
//! | delete one / all | `DELETE cart_items?user_id=eq.U[&product_id=eq.P]`             |

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use shopfront_core::{CartLine, ProductId, UserId};
use tracing::{debug, instrument};
use url::Url;

use super::{CartStore, StoreError};
use crate::config::DataServiceConfig;

const CART_ITEMS: &str = "cart_items";
const CART_SELECT: &str = "*,product:products(*)";
const INCREMENT_RPC: &str = "rpc/increment_cart_item";

/// Client for the hosted data service's REST API.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct RestCartStore {
    inner: Arc<RestCartStoreInner>,
}

struct RestCartStoreInner {
    client: reqwest::Client,
    rest_base: Url,
    api_key: SecretString,
}

#[derive(Serialize)]
struct QuantityPatch {
    quantity: i32,
}

#[derive(Serialize)]
struct IncrementArgs {
    p_user_id: UserId,
    p_product_id: ProductId,
    p_delta: i32,
}

impl RestCartStore {
    /// Create a new data service client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Http` if the HTTP client cannot be built, or
    /// `StoreError::Endpoint` if the base URL cannot be extended.
    pub fn new(config: &DataServiceConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        // Url::join drops the last path segment unless it ends in '/'
        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let rest_base = base.join("rest/v1/")?;

        Ok(Self {
            inner: Arc::new(RestCartStoreInner {
                client,
                rest_base,
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Build `{rest_base}{path}?{filters}`.
    fn endpoint(&self, path: &str, filters: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self.inner.rest_base.join(path)?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.inner.api_key.expose_secret();
        self.inner
            .client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
            .header("Content-Type", "application/json")
    }

    /// Send a request and return the response body.
    async fn execute(&self, request: RequestBuilder) -> Result<String, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(StoreError::RateLimited(retry_after));
        }

        // Read the body first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Data service returned non-success status"
            );
            return Err(status_error(status, &body));
        }

        Ok(body)
    }
}

/// Map a failed response to a store error.
///
/// `409` (unique/foreign key) and `400` with a check-violation code are row
/// rule violations; everything else is reported verbatim.
fn status_error(status: StatusCode, body: &str) -> StoreError {
    let truncated: String = body.chars().take(200).collect();
    let is_check_violation = body.contains("\"23514\"");
    if status == StatusCode::CONFLICT || is_check_violation {
        return StoreError::Constraint(truncated);
    }
    StoreError::Status {
        status: status.as_u16(),
        body: truncated,
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl CartStore for RestCartStore {
    #[instrument(skip(self))]
    async fn fetch_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let url = self.endpoint(
            CART_ITEMS,
            &[
                ("select", CART_SELECT.to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )?;
        let body = self.execute(self.request(Method::GET, url)).await?;

        let lines: Vec<CartLine> = serde_json::from_str(&body).inspect_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse cart rows"
            );
        })?;
        debug!(lines = lines.len(), "Fetched cart rows");
        Ok(lines)
    }

    #[instrument(skip(self))]
    async fn increment_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(INCREMENT_RPC, &[])?;
        let args = IncrementArgs {
            p_user_id: user_id,
            p_product_id: product_id,
            p_delta: delta,
        };
        self.execute(self.request(Method::POST, url).json(&args))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(
            CART_ITEMS,
            &[("user_id", eq(user_id)), ("product_id", eq(product_id))],
        )?;
        let request = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=minimal")
            .json(&QuantityPatch { quantity });
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(
            CART_ITEMS,
            &[("user_id", eq(user_id)), ("product_id", eq(product_id))],
        )?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, user_id: UserId) -> Result<(), StoreError> {
        let url = self.endpoint(CART_ITEMS, &[("user_id", eq(user_id))])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn store(base: &str) -> RestCartStore {
        RestCartStore::new(&DataServiceConfig {
            base_url: Url::parse(base).unwrap(),
            api_key: SecretString::from("k"),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_rest_base_without_trailing_slash() {
        let store = store("https://abc.data.test");
        assert_eq!(
            store.inner.rest_base.as_str(),
            "https://abc.data.test/rest/v1/"
        );
    }

    #[test]
    fn test_rest_base_keeps_path_prefix() {
        let store = store("https://gateway.test/tenant-a");
        assert_eq!(
            store.inner.rest_base.as_str(),
            "https://gateway.test/tenant-a/rest/v1/"
        );
    }

    #[test]
    fn test_fetch_endpoint_encodes_filters() {
        let store = store("https://abc.data.test/");
        let user_id: UserId = "7d9f1c2a-1b3c-4d5e-8f70-112233445566".parse().unwrap();
        let url = store
            .endpoint(
                CART_ITEMS,
                &[("select", CART_SELECT.to_string()), ("user_id", eq(user_id))],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.data.test/rest/v1/cart_items?select=*%2Cproduct%3Aproducts%28*%29&user_id=eq.7d9f1c2a-1b3c-4d5e-8f70-112233445566"
        );
    }

    #[test]
    fn test_rpc_endpoint() {
        let store = store("https://abc.data.test");
        let url = store.endpoint(INCREMENT_RPC, &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.data.test/rest/v1/rpc/increment_cart_item"
        );
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "duplicate key"),
            StoreError::Constraint(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, r#"{"code":"23514","message":"check"}"#),
            StoreError::Constraint(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            StoreError::Status { status: 500, .. }
        ));
    }
}
