//! Transcript rendering for summary and evaluation prompts.

use std::fmt::Write;

use crate::conversation::core::turn::Turn;
use crate::conversation::prompts::CONVERSATION_PLACEHOLDER;

/// Format every turn, in order, as a `Role: text` line.
#[must_use]
pub fn format_transcript(turns: &[Turn]) -> String {
    turns.iter().fold(String::new(), |mut output, turn| {
        let _ = writeln!(output, "{}: {}", turn.role.label(), turn.text);
        output
    })
}

/// Substitute the transcript into a `{conversation}` template.
#[must_use]
pub fn render_template(template: &str, transcript: &str) -> String {
    template.replace(CONVERSATION_PLACEHOLDER, transcript.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_transcript() {
        let turns = vec![Turn::user("Hi, I'm Alex"), Turn::agent("Welcome, Alex.")];

        let formatted = format_transcript(&turns);
        assert_eq!(formatted, "User: Hi, I'm Alex\nAssistant: Welcome, Alex.\n");
    }

    #[test]
    fn test_format_transcript_keeps_long_interviews_whole() {
        let long_answer = "x".repeat(5_000);
        let mut turns = Vec::new();
        for _ in 0..6 {
            turns.push(Turn::user(long_answer.clone()));
            turns.push(Turn::agent("Tell me more."));
        }
        turns.push(Turn::user("THEME_SIX_ANSWER"));

        let formatted = format_transcript(&turns);
        assert!(formatted.chars().count() > 30_000);
        assert!(formatted.ends_with("User: THEME_SIX_ANSWER\n"));
        assert!(!formatted.contains("..."));
    }

    #[test]
    fn test_format_empty() {
        assert!(format_transcript(&[]).is_empty());
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template("Conversation:\n{conversation}\n\nSummary:", "User: hi\n");
        assert_eq!(rendered, "Conversation:\nUser: hi\n\nSummary:");
    }
}
