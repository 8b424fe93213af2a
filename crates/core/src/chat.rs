use crate::models::{ConversationWindow, Entities, GlobalInsights, Intent, UserContext};
use crate::{entities, intent, responder, text};

/// Output of one full chat pipeline pass over a raw message.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply_text: String,
    pub intent: Intent,
    pub normalized_text: String,
    pub entities: Entities,
    /// Tokens the typo corrector changed while normalizing.
    pub corrected_tokens: usize,
}

/// The single chat entry point: normalize, classify, extract, compose.
/// Total over any input; the worst case is a topic-menu fallback.
pub fn get_response(
    raw: &str,
    window: &ConversationWindow,
    user: Option<&UserContext>,
    insights: Option<&GlobalInsights>,
) -> ChatOutcome {
    let (normalized_text, corrected_tokens) = text::normalize_with_stats(raw);
    let intent = intent::classify(&normalized_text);
    let entities = entities::extract(&normalized_text);
    let reply_text = responder::compose(intent, &entities, window, user, insights);

    ChatOutcome {
        reply_text,
        intent,
        normalized_text,
        entities,
        corrected_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_laden_recycling_question_end_to_end() {
        let outcome = get_response(
            "how do i recicle plastik botles",
            &ConversationWindow::new(),
            None,
            None,
        );
        assert_eq!(outcome.normalized_text, "how do i recycle plastic bottles");
        assert_eq!(outcome.intent, Intent::RecyclingHelp);
        assert_eq!(outcome.corrected_tokens, 3);
        assert!(outcome.reply_text.contains("recycling code"));
    }

    #[test]
    fn pipeline_is_deterministic() {
        let window = ConversationWindow::new();
        let first = get_response("compare my water usage", &window, None, None);
        let second = get_response("compare my water usage", &window, None, None);
        assert_eq!(first.intent, second.intent);
        assert_eq!(first.reply_text, second.reply_text);
    }

    #[test]
    fn gibberish_still_gets_an_answer() {
        let outcome = get_response("qwerty zxcvb 123", &ConversationWindow::new(), None, None);
        assert_eq!(outcome.intent, Intent::General);
        assert!(!outcome.reply_text.is_empty());
    }
}
