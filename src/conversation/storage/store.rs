//! Conversation store abstraction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::conversation::core::config::StorageConfig;
use crate::conversation::core::errors::{ConversationResult, PersistenceResult};
use crate::conversation::core::ids::SessionId;
use crate::conversation::storage::record::ConversationRecord;
use crate::conversation::storage::sqlite_store::SqliteConversationStore;
use crate::conversation::storage::supabase_store::SupabaseConversationStore;

/// Boxed future type for conversation store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable conversation storage keyed by session id.
pub trait ConversationStore: Send + Sync {
    /// Insert or overwrite the record for `record.session_id`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert(&self, record: ConversationRecord) -> StoreFuture<'_, PersistenceResult<()>>;
    /// Fetch the record of a session.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Option<ConversationRecord>>>;
    /// List records, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_recent(&self, limit: usize)
    -> StoreFuture<'_, PersistenceResult<Vec<ConversationRecord>>>;
}

/// Build the configured store: Supabase when credentials exist, `SQLite` otherwise.
///
/// # Errors
/// Returns an error if the backend cannot be initialized.
pub async fn from_config(config: &StorageConfig) -> ConversationResult<Arc<dyn ConversationStore>> {
    if let Some((url, key)) = config.supabase_credentials() {
        let store = SupabaseConversationStore::new(url, key, &config.table)?;
        return Ok(Arc::new(store));
    }

    warn!(
        "Supabase credentials not found; conversations are saved locally to {}",
        config.sqlite_path.display()
    );
    let store = SqliteConversationStore::open(&config.sqlite_path, &config.table).await?;
    Ok(Arc::new(store))
}
