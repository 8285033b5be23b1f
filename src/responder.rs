//! Keyword-matched chat replies for the dashboard assistant.

use serde::{Deserialize, Serialize};

pub const COST_REPLY: &str = "Our automated CloudOps typically reduces infrastructure spend by 30-45%. We achieve this through real-time instance rightsizing and automated waste elimination.";

pub const HEALTH_REPLY: &str = "All systems are currently performing at 99.99% efficiency across US-East, EU-West, and APAC nodes. You can see live metrics in our dashboard.";

pub const AI_REPLY: &str = "We specialize in deploying GPU-optimized infrastructure for LLMs and deep learning. Our core currently processes over 1M AI-driven deployments monthly.";

pub const SECURITY_REPLY: &str = "Our architecture is built on Zero-Trust principles. We use real-time AI anomaly detection to block suspicious patterns before they reach your data layer.";

pub const FALLBACK_REPLY: &str = "I'm analyzing your request. Our specialized team handles complex cases—would you like to book a strategic audit?";

#[derive(Debug, Clone, Copy)]
enum Keyword {
    /// Matches anywhere in the query.
    Substring(&'static str),
    /// Matches only a whole word, so "ai" does not fire on "against".
    Word(&'static str),
}

impl Keyword {
    fn matches(self, query: &str, words: &[&str]) -> bool {
        match self {
            Keyword::Substring(k) => query.contains(k),
            Keyword::Word(k) => words.contains(&k),
        }
    }
}

use Keyword::{Substring, Word};

/// Ordered keyword rules; the first rule with a matching keyword wins.
const RULES: &[(&[Keyword], &str)] = &[
    (&[Substring("saving"), Substring("cost")], COST_REPLY),
    (
        &[Substring("health"), Substring("status"), Substring("up")],
        HEALTH_REPLY,
    ),
    (&[Word("ai"), Substring("model"), Substring("machine")], AI_REPLY),
    (
        &[Substring("security"), Substring("threat"), Substring("secure")],
        SECURITY_REPLY,
    ),
];

/// Inbound `chat_message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub query: String,
}

/// Outbound `ai_response` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
}

/// Pick the canned reply for `query`.
///
/// Keywords match as substrings of the lowercased query, except `ai`, which
/// must stand alone as a word.
pub fn respond(query: &str) -> &'static str {
    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| k.matches(&query, &words)))
        .map(|(_, reply)| *reply)
        .unwrap_or(FALLBACK_REPLY)
}

/// Something that can answer a chat query.
///
/// The push channel talks to this trait so the keyword matcher can be swapped
/// for a real language backend.
pub trait ChatResponder: Send + Sync {
    fn reply(&self, query: &ChatQuery) -> ChatReply;
}

/// The built-in responder backed by [`respond`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResponder;

impl ChatResponder for KeywordResponder {
    fn reply(&self, query: &ChatQuery) -> ChatReply {
        ChatReply {
            text: respond(&query.query).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("how much will I save on costs?", COST_REPLY)]
    #[case("is everything up and healthy?", HEALTH_REPLY)]
    #[case("tell me about your AI models", AI_REPLY)]
    #[case("how secure is this against threats?", SECURITY_REPLY)]
    #[case("what's the weather", FALLBACK_REPLY)]
    fn test_respond_routes_queries(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(respond(query), expected);
    }

    #[test]
    fn test_cost_beats_health() {
        assert_eq!(respond("what is the cost of a health check?"), COST_REPLY);
    }

    #[test]
    fn test_health_beats_ai() {
        assert_eq!(respond("status of the model"), HEALTH_REPLY);
    }

    #[test]
    fn test_ai_beats_security() {
        assert_eq!(respond("machine security"), AI_REPLY);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(respond("SAVINGS"), COST_REPLY);
        assert_eq!(respond("THREAT report"), SECURITY_REPLY);
    }

    #[test]
    fn test_empty_query_falls_back() {
        assert_eq!(respond(""), FALLBACK_REPLY);
    }

    #[test]
    fn test_ai_inside_word_does_not_match() {
        assert_eq!(respond("explain"), FALLBACK_REPLY);
        assert_eq!(respond("against"), FALLBACK_REPLY);
        assert_eq!(respond("email"), FALLBACK_REPLY);
    }

    #[rstest]
    #[case("are my servers unhealthy?", HEALTH_REPLY)]
    #[case("is it insecure?", SECURITY_REPLY)]
    #[case("lowcost plan", COST_REPLY)]
    #[case("uptime?", HEALTH_REPLY)]
    #[case("machines", AI_REPLY)]
    #[case("remodeling", AI_REPLY)]
    fn test_keyword_inside_word_matches(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(respond(query), expected);
    }

    #[test]
    fn test_punctuation_separates_words() {
        assert_eq!(respond("costs,savings!"), COST_REPLY);
        assert_eq!(respond("(ai)"), AI_REPLY);
    }

    #[test]
    fn test_keyword_responder_wraps_respond() {
        let reply = KeywordResponder.reply(&ChatQuery {
            query: "Any threat?".to_string(),
        });
        assert_eq!(reply.text, SECURITY_REPLY);
    }
}
