//! Conversation session lifecycle.
//!
//! A session is `Active` from creation until the first successful call to
//! [`ConversationSession::end`], then `Ended` for good. Turns are only ever
//! appended. The summary and evaluation are generated at the end transition
//! and the record is written to the store once; if a step fails the session
//! stays ended and [`ConversationSession::retry_end`] redoes only what is
//! missing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conversation::core::errors::{ConversationError, ConversationResult, UpstreamError};
use crate::conversation::core::evaluation::Evaluation;
use crate::conversation::core::ids::SessionId;
use crate::conversation::core::turn::Turn;
use crate::conversation::prompts::InstructionSet;
use crate::conversation::storage::record::ConversationRecord;
use crate::conversation::storage::store::ConversationStore;
use crate::llm::client::LanguageModelClient;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionBackends {
    /// Language model client.
    pub llm: Arc<dyn LanguageModelClient>,
    /// Conversation store.
    pub store: Arc<dyn ConversationStore>,
    /// Instructions for the configured mode.
    pub instructions: Arc<InstructionSet>,
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting turns.
    Active,
    /// Terminal.
    Ended,
}

/// Artifacts produced by ending a conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EndResult {
    /// Free-text digest.
    pub summary: String,
    /// Structured evaluation.
    pub evaluation: Evaluation,
    /// End transition time.
    pub ended_at: DateTime<Utc>,
}

/// Read-only view of a session for the presentation layer.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Session id.
    pub session_id: SessionId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Ordered transcript.
    pub turns: Vec<Turn>,
    /// Summary, once generated.
    pub summary: Option<String>,
    /// Evaluation, once generated.
    pub evaluation: Option<Evaluation>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// End transition time.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whether the record reached the store.
    pub persisted: bool,
}

/// One user's conversation with the interviewer.
pub struct ConversationSession {
    id: SessionId,
    created_at: DateTime<Utc>,
    status: SessionStatus,
    turns: Vec<Turn>,
    summary: Option<String>,
    evaluation: Option<Evaluation>,
    ended_at: Option<DateTime<Utc>>,
    persisted: bool,
    backends: SessionBackends,
}

impl ConversationSession {
    /// Create an active session with no turns.
    #[must_use]
    pub fn new(id: SessionId, backends: SessionBackends) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            status: SessionStatus::Active,
            turns: Vec::new(),
            summary: None,
            evaluation: None,
            ended_at: None,
            persisted: false,
            backends,
        }
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Ordered transcript.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Summary, once generated.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Evaluation, once generated.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    /// End transition time.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether the record reached the store.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Serializable view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            status: self.status,
            turns: self.turns.clone(),
            summary: self.summary.clone(),
            evaluation: self.evaluation.clone(),
            created_at: self.created_at,
            ended_at: self.ended_at,
            persisted: self.persisted,
        }
    }

    /// Send a user message and return the agent's reply.
    ///
    /// The user turn is appended before the model call and stays appended if
    /// the call fails.
    ///
    /// # Errors
    /// `InvalidState` once ended, `InvalidInput` for blank text, `Upstream`
    /// if the model call fails.
    pub async fn submit_turn(&mut self, user_text: &str) -> ConversationResult<String> {
        self.ensure_active("submit a turn to")?;
        if user_text.trim().is_empty() {
            return Err(ConversationError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        self.turns.push(Turn::user(user_text));
        debug!("Session {} now has {} turns", self.id, self.turns.len());

        let reply = self
            .backends
            .llm
            .generate(&self.turns, &self.backends.instructions.chat)
            .await
            .inspect_err(|err| warn!("Model call failed for session {}: {err}", self.id))?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(UpstreamError::MalformedOutput("empty agent reply".to_string()).into());
        }

        self.turns.push(Turn::agent(reply));
        Ok(reply.to_string())
    }

    /// End the conversation, generate the summary and evaluation, and persist.
    ///
    /// The session is `Ended` as soon as this call passes its preconditions,
    /// whatever happens afterwards.
    ///
    /// # Errors
    /// `InvalidState` if already ended or if there are no turns, `Upstream`
    /// if generation fails, `Persistence` if the store write fails.
    pub async fn end(&mut self) -> ConversationResult<EndResult> {
        self.ensure_active("end")?;
        if self.turns.is_empty() {
            return Err(ConversationError::InvalidState(
                "cannot end a conversation with no turns".to_string(),
            ));
        }

        self.status = SessionStatus::Ended;
        self.ended_at = Some(Utc::now());
        info!("Session {} ended after {} turns", self.id, self.turns.len());

        self.finalize().await
    }

    /// Redo the failed steps of [`Self::end`].
    ///
    /// Generates the summary and evaluation only if missing, then persists.
    ///
    /// # Errors
    /// `InvalidState` if the session is active or already persisted, otherwise
    /// the same errors as [`Self::end`].
    pub async fn retry_end(&mut self) -> ConversationResult<EndResult> {
        if self.status == SessionStatus::Active {
            return Err(ConversationError::InvalidState(
                "conversation has not ended".to_string(),
            ));
        }
        if self.persisted {
            return Err(ConversationError::InvalidState(
                "conversation is already saved".to_string(),
            ));
        }
        info!("Retrying end steps for session {}", self.id);
        self.finalize().await
    }

    fn ensure_active(&self, action: &str) -> ConversationResult<()> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Ended => Err(ConversationError::InvalidState(format!(
                "cannot {action} an ended conversation"
            ))),
        }
    }

    async fn finalize(&mut self) -> ConversationResult<EndResult> {
        let ended_at = self.ended_at.ok_or_else(|| {
            ConversationError::InvalidState("ended session has no end time".to_string())
        })?;

        if self.summary.is_none() {
            self.summary = Some(self.generate_summary().await?);
        }
        if self.evaluation.is_none() {
            self.evaluation = Some(self.generate_evaluation().await?);
        }
        let (Some(summary), Some(evaluation)) = (self.summary.clone(), self.evaluation.clone())
        else {
            return Err(ConversationError::InvalidState(
                "end artifacts are missing".to_string(),
            ));
        };

        self.backends
            .store
            .upsert(self.record())
            .await
            .inspect_err(|err| warn!("Failed to store session {}: {err}", self.id))?;
        self.persisted = true;
        info!("Session {} saved with summary and evaluation", self.id);

        Ok(EndResult {
            summary,
            evaluation,
            ended_at,
        })
    }

    async fn generate_summary(&self) -> ConversationResult<String> {
        let reply = self
            .backends
            .llm
            .generate(&self.turns, &self.backends.instructions.summary)
            .await
            .inspect_err(|err| warn!("Summary failed for session {}: {err}", self.id))?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(UpstreamError::MalformedOutput("empty summary".to_string()).into());
        }
        Ok(summary.to_string())
    }

    async fn generate_evaluation(&self) -> ConversationResult<Evaluation> {
        let reply = self
            .backends
            .llm
            .generate(&self.turns, &self.backends.instructions.evaluation)
            .await?;
        Evaluation::parse(&reply)
            .inspect_err(|err| warn!("Evaluation failed for session {}: {err}", self.id))
            .map_err(ConversationError::from)
    }

    fn record(&self) -> ConversationRecord {
        ConversationRecord {
            session_id: self.id,
            turns: self.turns.clone(),
            summary: self.summary.clone(),
            evaluation: self.evaluation.clone(),
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::prompts::{AgentMode, Purpose};
    use crate::conversation::testing::{FakeModel, FakeStore};

    fn session_with(model: &Arc<FakeModel>, store: &Arc<FakeStore>) -> ConversationSession {
        let backends = SessionBackends {
            llm: model.clone(),
            store: store.clone(),
            instructions: Arc::new(InstructionSet::for_mode(AgentMode::Standard)),
        };
        ConversationSession::new(SessionId::new(), backends)
    }

    fn fixtures() -> (Arc<FakeModel>, Arc<FakeStore>) {
        (Arc::new(FakeModel::default()), Arc::new(FakeStore::default()))
    }

    #[tokio::test]
    async fn test_submit_turn_keeps_session_active() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);

        let reply = session.submit_turn("Hi, I'm Alex").await.unwrap();
        assert_eq!(reply, "reply 1");
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[1].text, "reply 1");
        assert!(session.summary().is_none());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_full_interview_persists_once() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        let id = session.id();

        session.submit_turn("Hi, I'm Alex").await.unwrap();
        session.submit_turn("I work in logistics").await.unwrap();
        let result = session.end().await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.session_id, id);
        assert_eq!(record.turns.len(), 4);
        assert_eq!(record.summary.as_deref(), Some(result.summary.as_str()));
        assert_eq!(record.evaluation.as_ref(), Some(&result.evaluation));
        assert_eq!(record.ended_at, Some(result.ended_at));

        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(session.is_persisted());
        assert_eq!(
            model.purposes(),
            vec![Purpose::Chat, Purpose::Chat, Purpose::Summary, Purpose::Evaluation]
        );
    }

    #[tokio::test]
    async fn test_second_end_is_rejected_without_upstream_calls() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi").await.unwrap();
        session.end().await.unwrap();
        let calls_before = model.purposes().len();

        let err = session.end().await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidState(_)));
        assert_eq!(model.purposes().len(), calls_before);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_end_is_rejected() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi").await.unwrap();
        session.end().await.unwrap();
        let turns_before = session.turns().to_vec();

        let err = session.submit_turn("one more thing").await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidState(_)));
        assert_eq!(session.turns(), turns_before.as_slice());
    }

    #[tokio::test]
    async fn test_turns_are_append_only() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);

        let mut previous: Vec<Turn> = Vec::new();
        for message in ["Hi, I'm Alex", "I work in logistics", "Mostly routing software"] {
            session.submit_turn(message).await.unwrap();
            assert!(session.turns().len() > previous.len());
            assert_eq!(&session.turns()[..previous.len()], previous.as_slice());
            previous = session.turns().to_vec();
        }
        session.end().await.unwrap();
        assert_eq!(session.turns(), previous.as_slice());
    }

    #[tokio::test]
    async fn test_end_without_turns_is_rejected() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);

        let err = session.end().await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidState(_)));
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(session.ended_at().is_none());
        assert!(model.purposes().is_empty());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);

        let err = session.submit_turn("   ").await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidInput(_)));
        assert!(session.turns().is_empty());
        assert!(model.purposes().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_unanswered_user_turn() {
        let model = Arc::new(FakeModel::failing_chat_call(2));
        let store = Arc::new(FakeStore::default());
        let mut session = session_with(&model, &store);

        session.submit_turn("Hi, I'm Alex").await.unwrap();
        let err = session.submit_turn("I work in logistics").await.unwrap_err();

        assert!(matches!(err, ConversationError::Upstream(_)));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.turns().len(), 3);
        let last = &session.turns()[2];
        assert_eq!(last.role, crate::conversation::core::turn::TurnRole::User);
        assert_eq!(last.text, "I work in logistics");
    }

    #[tokio::test]
    async fn test_store_failure_keeps_artifacts_until_retry() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi, I'm Alex").await.unwrap();
        store.set_failing(true);

        let err = session.end().await.unwrap_err();
        assert!(matches!(err, ConversationError::Persistence(_)));
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(session.summary().is_some());
        assert!(session.evaluation().is_some());
        assert!(!session.is_persisted());
        assert!(store.records().is_empty());

        store.set_failing(false);
        let calls_before = model.purposes().len();
        let result = session.retry_end().await.unwrap();

        assert_eq!(model.purposes().len(), calls_before);
        assert_eq!(store.records().len(), 1);
        assert_eq!(session.summary(), Some(result.summary.as_str()));
        assert!(session.is_persisted());
    }

    #[tokio::test]
    async fn test_evaluation_failure_retry_generates_only_missing() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi, I'm Alex").await.unwrap();
        model.fail(Purpose::Evaluation);

        let err = session.end().await.unwrap_err();
        assert!(matches!(err, ConversationError::Upstream(_)));
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(session.summary().is_some());
        assert!(session.evaluation().is_none());

        model.heal();
        session.retry_end().await.unwrap();
        let purposes = model.purposes();
        assert_eq!(purposes.iter().filter(|p| **p == Purpose::Summary).count(), 1);
        assert_eq!(purposes.iter().filter(|p| **p == Purpose::Evaluation).count(), 2);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_evaluation_is_upstream_error() {
        let model = Arc::new(FakeModel::with_evaluation_reply("Strong candidate overall."));
        let store = Arc::new(FakeStore::default());
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi").await.unwrap();

        let err = session.end().await.unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Upstream(UpstreamError::MalformedOutput(_))
        ));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_retry_end_preconditions() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);

        assert!(matches!(
            session.retry_end().await,
            Err(ConversationError::InvalidState(_))
        ));

        session.submit_turn("Hi").await.unwrap();
        session.end().await.unwrap();
        assert!(matches!(
            session.retry_end().await,
            Err(ConversationError::InvalidState(_))
        ));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_state() {
        let (model, store) = fixtures();
        let mut session = session_with(&model, &store);
        session.submit_turn("Hi").await.unwrap();
        session.end().await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.session_id, session.id());
        assert_eq!(snapshot.status, SessionStatus::Ended);
        assert_eq!(snapshot.turns.len(), 2);
        assert!(snapshot.persisted);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "ended");
    }
}
