//! Persisted conversation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::core::evaluation::Evaluation;
use crate::conversation::core::ids::SessionId;
use crate::conversation::core::turn::Turn;

/// One row of the conversations table, keyed by `session_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique session id.
    pub session_id: SessionId,
    /// Ordered transcript.
    #[serde(rename = "messages")]
    pub turns: Vec<Turn>,
    /// Free-text digest.
    pub summary: Option<String>,
    /// Structured evaluation.
    pub evaluation: Option<Evaluation>,
    /// Session start time.
    pub created_at: DateTime<Utc>,
    /// End transition time.
    pub ended_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = ConversationRecord {
            session_id: SessionId::new(),
            turns: vec![Turn::user("Hi"), Turn::agent("Hello")],
            summary: Some("Alex works in logistics.".to_string()),
            evaluation: None,
            created_at: Utc::now(),
            ended_at: Some(Utc::now()),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["messages"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert!(value["evaluation"].is_null());
        assert_eq!(value["session_id"], record.session_id.to_string());

        let back: ConversationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
