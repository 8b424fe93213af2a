use std::collections::HashMap;

use once_cell::sync::Lazy;
use unicode_segmentation::UnicodeSegmentation;

/// Fuzzy correction is only accepted above this similarity ratio.
const MIN_SIMILARITY: f64 = 0.70;
/// And only when the token is within this many characters of the candidate.
const MAX_LENGTH_DELTA: usize = 2;

/// Known misspellings seen in real user traffic, mapped to canonical words.
/// Checked before any fuzzy matching so common typos resolve in O(1).
static TYPO_TABLE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // utilities
        ("watter", "water"),
        ("woter", "water"),
        ("wtaer", "water"),
        ("wather", "water"),
        ("electricty", "electricity"),
        ("electrisity", "electricity"),
        ("electricitiy", "electricity"),
        ("eletricity", "electricity"),
        ("electicity", "electricity"),
        ("elektricity", "electricity"),
        ("gaz", "gas"),
        ("gass", "gas"),
        ("enery", "energy"),
        ("energi", "energy"),
        ("enrgy", "energy"),
        ("usege", "usage"),
        ("ussage", "usage"),
        ("usgae", "usage"),
        ("consumtion", "consumption"),
        ("consuption", "consumption"),
        ("consumpton", "consumption"),
        // recycling / materials
        ("recicle", "recycle"),
        ("recylce", "recycle"),
        ("recyle", "recycle"),
        ("ricycle", "recycle"),
        ("recicling", "recycling"),
        ("recyling", "recycling"),
        ("recycing", "recycling"),
        ("plastik", "plastic"),
        ("plastick", "plastic"),
        ("plasic", "plastic"),
        ("palstic", "plastic"),
        ("glas", "glass"),
        ("glasse", "glass"),
        ("papper", "paper"),
        ("pappr", "paper"),
        ("cardbord", "cardboard"),
        ("cardboad", "cardboard"),
        ("aluminium", "aluminum"),
        ("alumnium", "aluminum"),
        ("botles", "bottles"),
        ("botle", "bottle"),
        ("bottel", "bottle"),
        ("bottels", "bottles"),
        ("compst", "compost"),
        ("composte", "compost"),
        ("garbge", "garbage"),
        ("garbadge", "garbage"),
        ("trassh", "trash"),
        ("wast", "waste"),
        // environment
        ("enviroment", "environment"),
        ("enviorment", "environment"),
        ("environent", "environment"),
        ("envirnment", "environment"),
        ("environmant", "environment"),
        ("climat", "climate"),
        ("cliamte", "climate"),
        ("carbn", "carbon"),
        ("carbone", "carbon"),
        ("fotprint", "footprint"),
        ("footprnt", "footprint"),
        ("emmissions", "emissions"),
        ("emisions", "emissions"),
        ("sustainble", "sustainable"),
        ("sustanable", "sustainable"),
        ("sustainabilty", "sustainability"),
        ("sustainablity", "sustainability"),
        ("polution", "pollution"),
        ("pollusion", "pollution"),
        ("greenhose", "greenhouse"),
        ("grenhouse", "greenhouse"),
        // app vocabulary
        ("pionts", "points"),
        ("poins", "points"),
        ("ponits", "points"),
        ("scor", "score"),
        ("scoer", "score"),
        ("leaderbord", "leaderboard"),
        ("leadboard", "leaderboard"),
        ("liderboard", "leaderboard"),
        ("comunity", "community"),
        ("communty", "community"),
        ("commuity", "community"),
        ("recomend", "recommend"),
        ("reccomend", "recommend"),
        ("recomendation", "recommendation"),
        ("reccommendations", "recommendations"),
        ("recomendations", "recommendations"),
        ("compair", "compare"),
        ("comparisson", "comparison"),
        ("avrage", "average"),
        ("averge", "average"),
        ("efficency", "efficiency"),
        ("eficiency", "efficiency"),
        ("efficiancy", "efficiency"),
        ("houshold", "household"),
        ("housold", "household"),
        ("houshould", "household"),
        ("thermostate", "thermostat"),
        ("termostat", "thermostat"),
        ("solr", "solar"),
        ("soler", "solar"),
        ("insolation", "insulation"),
        ("insulaton", "insulation"),
        // conversational
        ("helo", "hello"),
        ("hllo", "hello"),
        ("helllo", "hello"),
        ("thanx", "thanks"),
        ("thx", "thanks"),
        ("plz", "please"),
        ("pls", "please"),
        ("wat", "what"),
        ("whta", "what"),
        ("hwo", "how"),
        ("improove", "improve"),
        ("improv", "improve"),
        ("reduse", "reduce"),
        ("redcue", "reduce"),
        ("probelm", "problem"),
        ("problm", "problem"),
        ("brocken", "broken"),
        ("workng", "working"),
    ])
});

/// Curated vocabulary of domain and intent-keyword terms used for fuzzy
/// correction of tokens the typo table does not know.
static VOCABULARY: &[&str] = &[
    "water",
    "electricity",
    "gas",
    "energy",
    "usage",
    "consumption",
    "meter",
    "bill",
    "recycle",
    "recycling",
    "plastic",
    "glass",
    "paper",
    "metal",
    "aluminum",
    "cardboard",
    "bottle",
    "bottles",
    "compost",
    "garbage",
    "trash",
    "waste",
    "environment",
    "climate",
    "carbon",
    "footprint",
    "emissions",
    "sustainable",
    "sustainability",
    "pollution",
    "greenhouse",
    "points",
    "score",
    "scoring",
    "leaderboard",
    "community",
    "global",
    "ranking",
    "recommend",
    "recommendation",
    "recommendations",
    "compare",
    "comparison",
    "average",
    "efficiency",
    "household",
    "thermostat",
    "solar",
    "insulation",
    "hello",
    "thanks",
    "please",
    "what",
    "how",
    "help",
    "improve",
    "reduce",
    "save",
    "problem",
    "broken",
    "working",
    "status",
    "class",
];

/// Cleans raw user text: collapses whitespace, strips punctuation,
/// lower-cases, and corrects typos against the domain lexicon. Unknown
/// tokens pass through unchanged; this never fails. Deliberately lossy:
/// the occasional false correction is the accepted price of typo
/// tolerance.
pub fn normalize(raw: &str) -> String {
    normalize_with_stats(raw).0
}

/// `normalize` plus the number of tokens the corrector actually changed,
/// so callers can count typo corrections.
pub fn normalize_with_stats(raw: &str) -> (String, usize) {
    let mut corrected = 0;
    let normalized = raw
        .split_whitespace()
        .map(clean_token)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let fixed = correct_token(&token);
            if fixed != token {
                corrected += 1;
            }
            fixed
        })
        .collect::<Vec<_>>()
        .join(" ");

    (normalized, corrected)
}

fn clean_token(token: &str) -> String {
    token
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '.' || *ch == '-')
        .collect::<String>()
        .trim_matches(|ch| ch == '.' || ch == '-')
        .to_lowercase()
}

fn correct_token(token: &str) -> String {
    if token.chars().any(|ch| ch.is_ascii_digit()) {
        return token.to_string();
    }

    if let Some(fixed) = TYPO_TABLE.get(token) {
        return (*fixed).to_string();
    }

    // Already a known word: leave it alone.
    if VOCABULARY.contains(&token) {
        return token.to_string();
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in VOCABULARY {
        let delta = token.chars().count().abs_diff(candidate.chars().count());
        if delta > MAX_LENGTH_DELTA {
            continue;
        }

        let ratio = similarity_ratio(token, candidate);
        if ratio >= MIN_SIMILARITY && best.map_or(true, |(_, score)| ratio > score) {
            best = Some((candidate, ratio));
        }
    }

    match best {
        Some((candidate, _)) => candidate.to_string(),
        None => token.to_string(),
    }
}

/// Normalized edit-distance ratio in [0, 1]; 1.0 means identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let longest = a_len.max(b_len);
    if longest == 0 {
        return 1.0;
    }

    1.0 - (edit_distance(a, b) as f64 / longest as f64)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_ch != b_ch);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Word-level tokens of an already normalized string.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.unicode_words().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_lowercases() {
        assert_eq!(normalize("  How   MUCH Water  "), "how much water");
    }

    #[test]
    fn corrects_known_typos() {
        assert_eq!(
            normalize("how do i recicle plastik botles"),
            "how do i recycle plastic bottles"
        );
    }

    #[test]
    fn counts_corrected_tokens() {
        let (normalized, corrected) = normalize_with_stats("how do i recicle plastik botles");
        assert_eq!(normalized, "how do i recycle plastic bottles");
        assert_eq!(corrected, 3);

        let (_, corrected) = normalize_with_stats("how much water did i use");
        assert_eq!(corrected, 0);
    }

    #[test]
    fn fuzzy_corrects_near_misses() {
        // Not in the typo table, close enough to the vocabulary.
        assert_eq!(normalize("recycln"), "recycle");
        assert_eq!(normalize("electriciy usage"), "electricity usage");
    }

    #[test]
    fn keeps_unknown_tokens() {
        assert_eq!(normalize("xylophone zzz"), "xylophone zzz");
    }

    #[test]
    fn keeps_numbers_untouched() {
        assert_eq!(normalize("used 42.5 gallons"), "used 42.5 gallons");
    }

    #[test]
    fn rejects_distant_corrections() {
        // "water" is in the vocabulary but "wheel" is too far from it.
        assert_eq!(normalize("wheel"), "wheel");
    }

    #[test]
    fn similarity_ratio_bounds() {
        assert_eq!(similarity_ratio("water", "water"), 1.0);
        assert!(similarity_ratio("water", "watter") > 0.8);
        assert!(similarity_ratio("water", "xyz") < 0.3);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }
}
