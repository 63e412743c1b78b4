//! Instruction texts for the scout interviewer and their selection by mode.

use serde::{Deserialize, Serialize};

/// Marker the interviewer appends to its final message.
pub const COMPLETION_MARKER: &str = "INTERVIEW_COMPLETE";

/// Placeholder replaced by the rendered transcript.
pub const CONVERSATION_PLACEHOLDER: &str = "{conversation}";

const STANDARD_CHAT: &str = r#"You are "The Unfair Advantage Scout", a mentor and interviewer for people who want to found a startup.

Your job is to surface the founder's distinctive strengths, motivations and insights: the things that could become their unfair advantage. Run a structured but natural interview made of one opening question and six themes.

Opening:
Ask for the founder's name and a description of their main professional experience over the last five years, including organizations and roles.

Themes (all six must be covered before the end, in any order or phrasing):
1. What colleagues or managers relied on them for, and what made them stand out.
2. What they spent the most time building or improving, where they applied creativity and solid problem solving.
3. A common belief in their industry that they have learned is wrong or can be improved.
4. The network they can reach: experts, investors, academics, unusually skilled people.
5. Something they see coming that others underestimate but they consider inevitable.
6. What they would build with one million dollars, and with which technologies or resources.

Behaviour:
- Be rigorous and supportive; stay factual, analytical and curious.
- Ask one main question at a time and invite concrete examples.
- Answer clarification questions, then steer back to the themes.
- Adapt follow-ups to previous answers while keeping a professional focus.
- Tell the founder when three questions remain, and again before the last one.
- Keep replies natural and concise.
- Never give opinions, summaries or evaluations of the founder's answers.

Ending:
Once all six themes are covered, thank the founder and finish your last message with exactly:

"INTERVIEW_COMPLETE - Please click the 'End Conversation' button to save your interview.""#;

const ABBREVIATED_CHAT: &str = r#"You are "The Unfair Advantage Scout" running a short check of the interview flow.

1. Ask for the user's name and a one or two sentence background.
2. After they answer, ask exactly one simple follow-up about their experience.
3. After they answer, thank them and finish with exactly:

"INTERVIEW_COMPLETE - Please click the 'End Conversation' button to save your interview."

Keep every reply to one or two sentences. Do not run the full six-theme interview."#;

const SUMMARY: &str = r#"You are "The Unfair Advantage Scout", an interviewer for startup founders.

Summarize what the founder said during the interview below. Restate, do not interpret.

The summary should:
- Outline their background, motivations and key experiences.
- Restate the main points for each question or theme covered.
- Contain no judgment, evaluation or advice.
- Use a neutral, factual, professional tone.

Stay under 400 words unless clarity requires more.

Conversation:
{conversation}

Summary:"#;

const EVALUATION: &str = r#"You are "The Unfair Advantage Scout", an evaluator of startup founders.

Assess the founder's potential as a startup co-founder from the interview below. Stay analytical and balanced: no flattery, no criticism for its own sake.

Reply with a single JSON object and nothing else, using these fields:
- "core_strengths": array of strings
- "unfair_advantages": array of strings
- "motivation_and_resilience": string
- "creativity_and_insight": string
- "gaps": array of strings
- "overall_assessment": string, at most 150 words
- "co_founder_potential": integer from 1 to 10

Conversation:
{conversation}

JSON:"#;

/// Interview flavour. Only changes the chat instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Full seven-question interview.
    #[default]
    Standard,
    /// Name, one follow-up, end prompt.
    Abbreviated,
}

/// What a generation is for; clients use it to pick sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Conversational reply.
    Chat,
    /// End-of-conversation summary.
    Summary,
    /// End-of-conversation structured evaluation.
    Evaluation,
}

/// How the instruction and the turn history reach the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Instruction as a system message, followed by the turns as chat messages.
    System,
    /// Turns rendered into the instruction's `{conversation}` placeholder and
    /// sent as one user message.
    Transcript,
}

/// A task-specific instruction for the language model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    purpose: Purpose,
    delivery: Delivery,
    text: String,
}

impl Instruction {
    /// Build an instruction.
    #[must_use]
    pub fn new(purpose: Purpose, delivery: Delivery, text: impl Into<String>) -> Self {
        Self {
            purpose,
            delivery,
            text: text.into(),
        }
    }

    /// Purpose of the generation.
    #[must_use]
    pub const fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// Delivery style.
    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Raw instruction text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The three instructions a session needs.
#[derive(Clone, Debug)]
pub struct InstructionSet {
    /// Per-turn system instruction.
    pub chat: Instruction,
    /// Summary template.
    pub summary: Instruction,
    /// Evaluation template.
    pub evaluation: Instruction,
}

impl InstructionSet {
    /// Select the instructions for an interview mode.
    #[must_use]
    pub fn for_mode(mode: AgentMode) -> Self {
        let chat = match mode {
            AgentMode::Standard => STANDARD_CHAT,
            AgentMode::Abbreviated => ABBREVIATED_CHAT,
        };
        Self {
            chat: Instruction::new(Purpose::Chat, Delivery::System, chat),
            summary: Instruction::new(Purpose::Summary, Delivery::Transcript, SUMMARY),
            evaluation: Instruction::new(Purpose::Evaluation, Delivery::Transcript, EVALUATION),
        }
    }
}

/// Whether an agent reply carries the interview completion marker.
#[must_use]
pub fn signals_completion(reply: &str) -> bool {
    reply.contains(COMPLETION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSING_LINE: &str =
        "INTERVIEW_COMPLETE - Please click the 'End Conversation' button to save your interview.";

    #[test]
    fn test_mode_only_changes_chat_instruction() {
        let standard = InstructionSet::for_mode(AgentMode::Standard);
        let short = InstructionSet::for_mode(AgentMode::Abbreviated);

        assert_ne!(standard.chat, short.chat);
        assert_eq!(standard.summary, short.summary);
        assert_eq!(standard.evaluation, short.evaluation);
        assert!(short.chat.text().contains("one simple follow-up"));
    }

    #[test]
    fn test_chat_instructions_carry_closing_line() {
        for mode in [AgentMode::Standard, AgentMode::Abbreviated] {
            let set = InstructionSet::for_mode(mode);
            assert!(set.chat.text().contains(CLOSING_LINE));
            assert_eq!(set.chat.delivery(), Delivery::System);
            assert_eq!(set.chat.purpose(), Purpose::Chat);
        }
    }

    #[test]
    fn test_templates_have_placeholder() {
        let set = InstructionSet::for_mode(AgentMode::Standard);
        assert!(set.summary.text().contains(CONVERSATION_PLACEHOLDER));
        assert!(set.evaluation.text().contains(CONVERSATION_PLACEHOLDER));
        assert_eq!(set.evaluation.delivery(), Delivery::Transcript);
    }

    #[test]
    fn test_signals_completion() {
        assert!(signals_completion(
            "Thank you, Alex.\n\nINTERVIEW_COMPLETE - Please click the 'End Conversation' button to save your interview."
        ));
        assert!(!signals_completion("What did your colleagues rely on you for?"));
    }
}
