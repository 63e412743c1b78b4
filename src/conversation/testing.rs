//! In-memory model and store doubles for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::conversation::core::errors::{PersistenceError, PersistenceResult, UpstreamError, UpstreamResult};
use crate::conversation::core::ids::SessionId;
use crate::conversation::core::turn::Turn;
use crate::conversation::prompts::{Instruction, Purpose};
use crate::conversation::storage::record::ConversationRecord;
use crate::conversation::storage::store::{ConversationStore, StoreFuture};
use crate::llm::client::{GenerateFuture, LanguageModelClient};

const DEFAULT_EVALUATION: &str = r#"{"co_founder_potential": 7, "technical_depth": "solid"}"#;

/// Scripted model: chat replies are `reply N`, summary and evaluation are fixed.
pub struct FakeModel {
    calls: Mutex<Vec<Purpose>>,
    failing: Mutex<Vec<Purpose>>,
    fail_chat_call: Option<usize>,
    evaluation_reply: String,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            fail_chat_call: None,
            evaluation_reply: DEFAULT_EVALUATION.to_string(),
        }
    }
}

impl FakeModel {
    /// Fail only the `n`th chat call (1-based).
    #[must_use]
    pub fn failing_chat_call(n: usize) -> Self {
        Self {
            fail_chat_call: Some(n),
            ..Self::default()
        }
    }

    /// Return `reply` for evaluation requests.
    #[must_use]
    pub fn with_evaluation_reply(reply: &str) -> Self {
        Self {
            evaluation_reply: reply.to_string(),
            ..Self::default()
        }
    }

    /// Fail every call for `purpose` until [`Self::heal`].
    pub fn fail(&self, purpose: Purpose) {
        self.failing.lock().unwrap().push(purpose);
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Purposes of every call so far, in order.
    #[must_use]
    pub fn purposes(&self) -> Vec<Purpose> {
        self.calls.lock().unwrap().clone()
    }
}

impl LanguageModelClient for FakeModel {
    fn generate<'a>(
        &'a self,
        _turns: &'a [Turn],
        instruction: &'a Instruction,
    ) -> GenerateFuture<'a, UpstreamResult<String>> {
        let purpose = instruction.purpose();
        let chat_calls = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(purpose);
            calls.iter().filter(|p| **p == Purpose::Chat).count()
        };
        let scripted_failure = purpose == Purpose::Chat && self.fail_chat_call == Some(chat_calls);

        let result = if scripted_failure || self.failing.lock().unwrap().contains(&purpose) {
            Err(UpstreamError::Status {
                status: 503,
                body: "model unavailable".to_string(),
            })
        } else {
            Ok(match purpose {
                Purpose::Chat => format!("reply {chat_calls}"),
                Purpose::Summary => "Alex works in logistics and builds routing tools.".to_string(),
                Purpose::Evaluation => self.evaluation_reply.clone(),
            })
        };
        Box::pin(async move { result })
    }
}

/// Store keeping records in memory, with a failure toggle.
#[derive(Default)]
pub struct FakeStore {
    records: Mutex<Vec<ConversationRecord>>,
    failing: AtomicBool,
}

impl FakeStore {
    /// Toggle write failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every successful upsert, in order.
    #[must_use]
    pub fn records(&self) -> Vec<ConversationRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ConversationStore for FakeStore {
    fn upsert(&self, record: ConversationRecord) -> StoreFuture<'_, PersistenceResult<()>> {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Status {
                status: 503,
                body: "store unavailable".to_string(),
            })
        } else {
            self.records.lock().unwrap().push(record);
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn get(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Option<ConversationRecord>>> {
        let found = self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|record| record.session_id == session_id)
            .cloned();
        Box::pin(async move { Ok(found) })
    }

    fn list_recent(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ConversationRecord>>> {
        let mut records = self.records();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Box::pin(async move { Ok(records) })
    }
}
