//! HTTP remote store for PostgREST-style table APIs.
//!
//! Talks to a hosted table endpoint that exposes `cart_items` as
//! `/rest/v1/cart_items` with `column=eq.value` filters, authenticating with
//! an `apikey` header plus a bearer token.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use basket_core::{ItemId, UserId};

use super::{PersistedCartRow, RemoteCartStore, RemoteError};

const TABLE_PATH: &str = "rest/v1/cart_items";

/// Columns returned by the fetch query.
#[derive(Debug, Deserialize)]
struct FetchedRow {
    product_id: ItemId,
    quantity: i32,
}

/// [`RemoteCartStore`] over a PostgREST-style HTTP API.
#[derive(Clone)]
pub struct RestCartStore {
    client: Client,
    table_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for RestCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCartStore")
            .field("table_url", &self.table_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RestCartStore {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the table path cannot be joined onto
    /// `base_url`.
    pub fn new(base_url: &Url, api_key: SecretString) -> Result<Self, url::ParseError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self {
            client: Client::new(),
            table_url: base.join(TABLE_PATH)?,
            api_key,
        })
    }

    /// URL filtering the table down to one user's rows.
    fn user_url(&self, user_id: UserId, select: Option<&str>) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("user_id", &format!("eq.{user_id}"));
            if let Some(columns) = select {
                query.append_pair("select", columns);
            }
        }
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.api_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }
}

/// Turn a non-success response into `RemoteError::Status`.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteCartStore for RestCartStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_rows(&self, user_id: UserId) -> Result<Vec<PersistedCartRow>, RemoteError> {
        let url = self.user_url(user_id, Some("product_id,quantity"));
        let response = self.authorized(self.client.get(url)).send().await?;
        let fetched: Vec<FetchedRow> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        debug!(count = fetched.len(), "Fetched persisted cart rows");
        Ok(fetched
            .into_iter()
            .map(|row| PersistedCartRow {
                user_id,
                item_id: row.product_id,
                quantity: row.quantity,
                updated_at: None,
            })
            .collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_rows(&self, user_id: UserId) -> Result<(), RemoteError> {
        let url = self.user_url(user_id, None);
        let response = self.authorized(self.client.delete(url)).send().await?;
        check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_rows(&self, rows: &[PersistedCartRow]) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .authorized(self.client.post(self.table_url.clone()))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
