use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Entities, Utility};
use crate::text::tokens;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?").expect("valid number pattern"));

static UTILITY_TERMS: &[(&str, Utility)] = &[
    ("water", Utility::Water),
    ("shower", Utility::Water),
    ("faucet", Utility::Water),
    ("electricity", Utility::Electricity),
    ("electric", Utility::Electricity),
    ("power", Utility::Electricity),
    ("kwh", Utility::Electricity),
    ("gas", Utility::Gas),
    ("heating", Utility::Gas),
];

static MATERIAL_TERMS: &[&str] = &[
    "plastic",
    "glass",
    "paper",
    "metal",
    "aluminum",
    "cardboard",
    "organic",
    "electronics",
    "batteries",
    "textiles",
    "bottle",
    "bottles",
    "can",
    "cans",
];

static TIME_TERMS: &[&str] = &[
    "today",
    "yesterday",
    "tomorrow",
    "week",
    "weekly",
    "month",
    "monthly",
    "year",
    "yearly",
    "annual",
    "daily",
    "morning",
    "evening",
];

static COMPARISON_TERMS: &[&str] = &[
    "more", "less", "better", "worse", "average", "compare", "versus", "than", "highest", "lowest",
];

/// Pure membership scans over fixed vocabularies. No model, no state;
/// empty input yields a value with empty containers.
pub fn extract(normalized: &str) -> Entities {
    let mut entities = Entities::default();
    let message_tokens = tokens(normalized);

    for (term, utility) in UTILITY_TERMS {
        if message_tokens.contains(term) {
            entities.utilities.insert(*utility);
        }
    }

    for material in MATERIAL_TERMS {
        if message_tokens.contains(material) {
            entities.materials.insert((*material).to_string());
        }
    }

    for capture in NUMBER_RE.find_iter(normalized) {
        if let Ok(value) = capture.as_str().parse::<f64>() {
            entities.numbers.push(value);
        }
    }

    for term in TIME_TERMS {
        if message_tokens.contains(term) {
            entities.time_references.push((*term).to_string());
        }
    }

    for term in COMPARISON_TERMS {
        if message_tokens.contains(term) {
            entities.comparison_terms.push((*term).to_string());
        }
    }

    entities
}
