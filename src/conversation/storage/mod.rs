//! Durable conversation storage backends.

pub mod record;
pub mod sqlite_store;
pub mod store;
pub mod supabase_store;

pub use record::ConversationRecord;
pub use sqlite_store::SqliteConversationStore;
pub use store::{ConversationStore, StoreFuture, from_config};
pub use supabase_store::SupabaseConversationStore;
