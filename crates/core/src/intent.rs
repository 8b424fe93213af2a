use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Intent;
use crate::text::{similarity_ratio, tokens};

const EXACT_HIT: f64 = 2.0;
const FUZZY_HIT: f64 = 0.8;
const FUZZY_FLOOR: f64 = 0.70;
/// Scores below this resolve to `Intent::General` instead of a weak guess.
const MIN_CONFIDENCE: f64 = 0.75;

/// High-precision patterns checked before any fuzzy scoring. A match here
/// short-circuits the keyword pass entirely.
static GREETING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(hi|hey|hello|howdy|greetings|good (morning|afternoon|evening))\b")
        .expect("valid greeting pattern")
});

static UTILITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(water|electricity|gas)\b.*\b(usage|bill|consumption|save|saving|reduce|lower|high|use)\b")
        .expect("valid utility pattern")
});

/// Intent keyword table. Order is the declaration order of the intents and
/// is the tie-break: on equal scores the first-declared intent wins, which
/// keeps classification reproducible.
static KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Greeting,
        &["hello", "hi there", "hey", "good morning", "good evening", "howdy", "greetings"],
    ),
    (
        Intent::UtilityHelp,
        &[
            "water",
            "electricity",
            "gas",
            "usage",
            "bill",
            "consumption",
            "meter",
            "kwh",
            "gallons",
            "save water",
            "save energy",
            "reduce usage",
            "shower",
            "heating",
            "appliance",
        ],
    ),
    (
        Intent::RecyclingHelp,
        &[
            "recycle",
            "recycling",
            "plastic",
            "glass",
            "paper",
            "metal",
            "aluminum",
            "cardboard",
            "bottle",
            "compost",
            "bin",
            "waste",
            "garbage",
            "trash",
        ],
    ),
    (
        Intent::Comparison,
        &[
            "compare",
            "comparison",
            "versus",
            "better than",
            "worse than",
            "average user",
            "how do i compare",
            "am i doing well",
            "rank",
            "my ranking",
        ],
    ),
    (
        Intent::Recommendations,
        &[
            "recommend",
            "recommendation",
            "recommendations",
            "suggestion",
            "tips",
            "advice",
            "improve",
            "how can i save",
            "what should i do",
        ],
    ),
    (
        Intent::EnvironmentalEducation,
        &[
            "climate",
            "carbon",
            "footprint",
            "emissions",
            "global warming",
            "greenhouse",
            "sustainability",
            "sustainable",
            "environment",
            "pollution",
            "renewable",
        ],
    ),
    (
        Intent::Troubleshooting,
        &[
            "problem",
            "error",
            "broken",
            "not working",
            "issue",
            "bug",
            "wrong",
            "failed",
            "cant log",
            "crash",
        ],
    ),
    (
        Intent::Fundamentals,
        &[
            "how does",
            "what is",
            "explain",
            "how it works",
            "getting started",
            "basics",
            "tutorial",
            "first time",
        ],
    ),
    (
        Intent::PointsScoring,
        &[
            "points",
            "score",
            "scoring",
            "earn",
            "efficiency score",
            "class a",
            "class b",
            "class c",
            "environmental class",
            "my class",
        ],
    ),
    (
        Intent::GlobalCommunity,
        &[
            "leaderboard",
            "community",
            "global",
            "top users",
            "worldwide",
            "everyone",
            "total users",
            "other households",
        ],
    ),
];

/// Picks a single intent for an already normalized message. Deterministic:
/// same input, same output, across repeated calls.
pub fn classify(normalized: &str) -> Intent {
    if normalized.trim().is_empty() {
        return Intent::General;
    }

    if GREETING_RE.is_match(normalized) {
        return Intent::Greeting;
    }
    if UTILITY_RE.is_match(normalized) {
        return Intent::UtilityHelp;
    }

    let message_tokens = tokens(normalized);
    let mut best = (Intent::General, 0.0_f64);

    for (intent, keywords) in KEYWORDS {
        let score = score_intent(normalized, &message_tokens, keywords);
        if score > best.1 {
            best = (*intent, score);
        }
    }

    if best.1 >= MIN_CONFIDENCE {
        best.0
    } else {
        Intent::General
    }
}

fn score_intent(normalized: &str, message_tokens: &[&str], keywords: &[&str]) -> f64 {
    let mut score = 0.0;

    for keyword in keywords {
        if normalized.contains(keyword) {
            score += EXACT_HIT;
            continue;
        }

        // Multi-word keywords only match as exact substrings.
        if keyword.contains(' ') {
            continue;
        }

        let fuzzy = message_tokens
            .iter()
            .any(|token| similarity_ratio(token, keyword) > FUZZY_FLOOR);
        if fuzzy {
            score += FUZZY_HIT;
        }
    }

    score
}
