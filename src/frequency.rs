/// Ordered rule table mapping frequency text to doses per day.
///
/// Matching is case-insensitive substring containment, first hit wins, so the
/// order of this table is the precedence. "every N hours" entries come after
/// the spelled-out counts so that e.g. "twice daily, every 12 hours" reads as
/// twice daily.
const FREQUENCY_RULES: &[(&str, u32)] = &[
    ("once", 1),
    ("twice", 2),
    ("thrice", 3),
    ("three times", 3),
    ("four times", 4),
    ("4 times", 4),
    ("every 6", 4),
    ("every 8", 3),
    ("every 12", 2),
];

/// Parse a free-text medication frequency into doses per day.
///
/// Supported formats:
/// - "once daily" -> 1
/// - "twice a day" -> 2
/// - "thrice daily", "three times a day" -> 3
/// - "four times daily", "4 times a day" -> 4
/// - "every 6 hours" -> 4, "every 8 hours" -> 3, "every 12 hours" -> 2
/// - "N times ..." -> N (e.g. "5 times daily" -> 5)
/// - anything else -> 1
///
/// Frequency text is authored by hand and inconsistently, so this is a
/// tolerant best-effort parse: it never fails and always returns at least 1.
pub fn parse_frequency(frequency: &str) -> u32 {
    let lower = frequency.trim().to_lowercase();

    for (needle, doses) in FREQUENCY_RULES {
        if lower.contains(needle) {
            return *doses;
        }
    }

    // Generic "N times ..." - take the number right before the "times" token.
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for pair in tokens.windows(2) {
        if pair[1].starts_with("times") {
            if let Ok(n) = pair[0].parse::<u32>() {
                if n >= 1 {
                    return n;
                }
            }
        }
    }

    // Default to one dose per day if we can't parse it
    1
}
