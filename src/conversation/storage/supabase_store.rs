//! Supabase (PostgREST) conversation store.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, warn};
use url::Url;

use crate::conversation::core::errors::{
    ConversationError, ConversationResult, PersistenceError, PersistenceResult,
};
use crate::conversation::core::ids::SessionId;
use crate::conversation::storage::record::ConversationRecord;
use crate::conversation::storage::store::{ConversationStore, StoreFuture};

/// HTTP I/O timeouts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Store writing to `{url}/rest/v1/{table}`.
pub struct SupabaseConversationStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SupabaseConversationStore {
    /// Create a store for a Supabase project.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str, api_key: &str, table: &str) -> ConversationResult<Self> {
        let base = Url::parse(url)?;
        let endpoint = format!("{}/rest/v1/{table}", base.as_str().trim_end_matches('/'));
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ConversationError::Persistence(PersistenceError::Http(err)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    /// `POST` merging on `session_id`, so a repeated write overwrites the row.
    fn upsert_request(&self, record: &ConversationRecord) -> RequestBuilder {
        self.authorized(self.client.post(&self.endpoint))
            .query(&[("on_conflict", "session_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
    }

    fn select_request(&self, query: &[(&str, String)]) -> RequestBuilder {
        self.authorized(self.client.get(&self.endpoint)).query(query)
    }

    async fn fetch(&self, query: &[(&str, String)]) -> PersistenceResult<Vec<ConversationRecord>> {
        let response = ensure_success(self.select_request(query).send().await?).await?;
        Ok(response.json().await?)
    }
}

impl ConversationStore for SupabaseConversationStore {
    fn upsert(&self, record: ConversationRecord) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            debug!("Upserting conversation {} to {}", record.session_id, self.endpoint);
            ensure_success(self.upsert_request(&record).send().await?).await?;
            info!("Stored conversation {} in Supabase", record.session_id);
            Ok(())
        })
    }

    fn get(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Option<ConversationRecord>>> {
        Box::pin(async move {
            let rows = self
                .fetch(&[
                    ("select", "*".to_string()),
                    ("session_id", format!("eq.{session_id}")),
                    ("limit", "1".to_string()),
                ])
                .await?;
            Ok(rows.into_iter().next())
        })
    }

    fn list_recent(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ConversationRecord>>> {
        Box::pin(async move {
            self.fetch(&[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .await
        })
    }
}

async fn ensure_success(response: Response) -> PersistenceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Supabase error: {} - {}", status, body);
    Err(PersistenceError::Status {
        status: status.as_u16(),
        body,
    })
}
