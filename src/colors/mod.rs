//! Color normalization and classification.
//!
//! Vendors ship colors as all-caps words, abbreviation codes, and slashed
//! combinations. Normalization cleans spacing, title-casing makes display
//! names, and two closed vocabularies decide what goes to the advisor:
//! recognized English color words never do; known abbreviation codes and
//! unknown values may, in batches.

pub mod advisor;

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// English color vocabulary, including the fashion terms vendors use.
    /// Anything fully covered by this set bypasses the advisor even in all
    /// caps.
    static ref VALID_COLOR_WORDS: HashSet<&'static str> = [
        "black", "white", "red", "blue", "green", "yellow", "orange", "purple", "pink", "brown",
        "gray", "grey", "silver", "gold", "beige", "ivory", "cream", "navy", "teal", "turquoise",
        "aqua", "cyan", "magenta", "maroon", "burgundy", "wine", "crimson", "scarlet", "cherry",
        "rose", "coral", "salmon", "peach", "apricot", "tan", "khaki", "olive", "lime", "mint",
        "sage", "emerald", "forest", "hunter", "kelly", "jade", "seafoam", "pistachio", "moss",
        "royal", "cobalt", "sapphire", "indigo", "periwinkle", "cornflower", "sky", "baby",
        "powder", "steel", "slate", "denim", "midnight", "lavender", "lilac", "violet", "plum",
        "eggplant", "orchid", "mauve", "amethyst", "grape", "fuchsia", "berry", "raspberry",
        "mulberry", "blush", "ballet", "bubblegum", "flamingo", "watermelon", "strawberry",
        "champagne", "nude", "taupe", "sand", "stone", "oatmeal", "mushroom", "mocha", "coffee",
        "espresso", "chocolate", "cocoa", "caramel", "toffee", "cognac", "camel", "chestnut",
        "mahogany", "rust", "copper", "bronze", "brass", "amber", "honey", "mustard", "marigold",
        "sunflower", "lemon", "canary", "butter", "banana", "citrus", "tangerine", "papaya",
        "melon", "cantaloupe", "terracotta", "brick", "clay", "cinnamon", "paprika", "tomato",
        "garnet", "ruby", "blood", "oxblood", "merlot", "sangria", "cabernet", "port", "currant",
        "peacock", "ocean", "marine", "lagoon", "cerulean", "azure", "ice", "frost", "glacier",
        "arctic", "storm", "charcoal", "graphite", "smoke", "ash", "pewter", "gunmetal", "onyx",
        "jet", "ebony", "raven", "pearl", "opal", "platinum", "chrome", "mercury", "titanium",
        "snow", "chalk", "eggshell", "vanilla", "linen", "bone", "porcelain", "alabaster",
        "magnolia", "gardenia", "jasmine", "lily", "daisy", "poppy", "tulip", "iris", "dahlia",
        "peony", "hydrangea", "wisteria", "freesia", "heather", "thistle", "fern", "basil",
        "eucalyptus", "spruce", "pine", "cedar", "juniper", "seagrass", "pistache", "celadon",
        "chartreuse", "citron", "pea", "apple", "pear", "kiwi", "avocado", "spearmint",
        "evergreen", "bottle", "racing", "neon", "electric", "hot", "pastel", "dusty", "dusted",
        "antique", "vintage", "deep", "dark", "light", "pale", "bright", "soft", "rich", "true",
        "multi", "rainbow", "ombre", "metallic", "iridescent", "holographic", "nova", "stardust",
        "galaxy", "cosmic", "aurora", "sunset", "sunrise", "dawn", "dusk", "twilight", "moonlight",
        "starlight",
    ]
    .into_iter()
    .collect();

    /// Abbreviation codes seen across vendor feeds; candidates for advisor
    /// suggestion.
    static ref ABBREVIATION_CODES: HashSet<&'static str> = [
        "BLK", "BK", "BLCK", "WHT", "WT", "WHTE", "OFFWHT", "IVY", "IVR", "IV", "CRM", "RD",
        "REDD", "CRMSN", "BRGNDY", "BURG", "BUR", "WN", "MRN", "NVY", "NV", "NAV", "RYL", "ROY",
        "CBLT", "BLU", "BL", "LTBL", "DKBL", "SKYBL", "TL", "TRQ", "AQ", "GRN", "GR", "EMRLD",
        "EMR", "HNTR", "KLLY", "OLV", "LM", "MNT", "SGE", "FRST", "YLW", "YW", "GLD", "GD",
        "MSTRD", "HNY", "ORG", "ORNG", "TNGRN", "CRL", "PCH", "SLMN", "PNK", "PK", "HTPK",
        "LTPK", "BLSH", "RSE", "FCHS", "FSH", "MGNTA", "PRPL", "PRP", "PLM", "LVNDR", "LAV",
        "LLC", "VLT", "MVE", "GRY", "GY", "CHRCL", "CHAR", "SLVR", "SLV", "GRPHT", "PLTNM",
        "BRWN", "BRN", "CHOC", "MOCH", "TPE", "CML", "TN", "BGE", "SND", "CHMPGN", "CHMP",
        "ND", "NDE",
    ]
    .into_iter()
    .collect();
}

/// Clean spacing: collapse internal whitespace, no space around `/` and
/// `-`, exactly one space around `&`.
pub fn normalize_color(raw: &str) -> String {
    let collapsed = raw.trim().split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        match ch {
            '/' | '-' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push(ch);
            }
            '&' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push(' ');
                out.push('&');
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    // Second pass: remove spaces directly after '/', '-' and collapse any
    // doubled spaces introduced around '&'.
    let mut cleaned = String::with_capacity(out.len());
    let mut prev: Option<char> = None;
    for ch in out.chars() {
        if ch == ' ' {
            if matches!(prev, Some('/') | Some('-') | Some(' ')) {
                continue;
            }
        }
        cleaned.push(ch);
        prev = Some(ch);
    }
    cleaned.trim().to_string()
}

/// Lowercase, then capitalize the first letter of every token. Tokens are
/// split on space, `-`, `/` and `&`, which are all preserved.
pub fn title_case_color(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut start_of_token = true;
    for ch in lower.chars() {
        if matches!(ch, ' ' | '-' | '/' | '&') {
            out.push(ch);
            start_of_token = true;
        } else if start_of_token {
            out.extend(ch.to_uppercase());
            start_of_token = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn tokens(color: &str) -> Vec<String> {
    color
        .split(|c: char| matches!(c, ' ' | '-' | '/' | '&'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Every token is a recognized English color word.
pub fn is_recognized_color(color: &str) -> bool {
    let toks = tokens(color);
    !toks.is_empty()
        && toks
            .iter()
            .all(|t| VALID_COLOR_WORDS.contains(t.to_lowercase().as_str()))
}

/// Known abbreviation code, eligible for advisor suggestion.
pub fn is_known_abbreviation(color: &str) -> bool {
    let toks = tokens(color);
    !toks.is_empty()
        && toks
            .iter()
            .any(|t| ABBREVIATION_CODES.contains(t.to_uppercase().as_str()))
}

/// Should this color be batched to the advisor? Recognized colors never go;
/// known abbreviations and unrecognized values do.
pub fn needs_suggestion(color: &str) -> bool {
    let c = color.trim();
    if c.is_empty() || is_recognized_color(c) {
        return false;
    }
    true
}

/// Apply the global (bad → good) mapping table, case-insensitively.
pub fn apply_mapping(color: &str, mappings: &HashMap<String, String>) -> Option<String> {
    let key = color.trim().to_uppercase();
    mappings.get(&key).cloned()
}

/// Build the case-insensitive lookup used by [`apply_mapping`].
pub fn mapping_index(pairs: &[(String, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(bad, good)| (bad.trim().to_uppercase(), good.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_color("  Red  /  White "), "Red/White");
        assert_eq!(normalize_color("Navy - Blue"), "Navy-Blue");
        assert_eq!(normalize_color("Black&White"), "Black & White");
        assert_eq!(normalize_color("Dusty   Rose"), "Dusty Rose");
    }

    #[test]
    fn title_casing() {
        assert_eq!(title_case_color("DUSTY ROSE"), "Dusty Rose");
        assert_eq!(title_case_color("red/white"), "Red/White");
        assert_eq!(title_case_color("BLACK & WHITE"), "Black & White");
        assert_eq!(title_case_color("navy-blue"), "Navy-Blue");
    }

    #[test]
    fn recognized_colors_bypass_suggestion() {
        assert!(is_recognized_color("BLUSH"));
        assert!(is_recognized_color("Dusty Rose"));
        assert!(is_recognized_color("Peacock/Terracotta"));
        assert!(!needs_suggestion("MAUVE"));
        assert!(needs_suggestion("BLK"));
        assert!(needs_suggestion("XQZ"));
        assert!(!needs_suggestion(""));
    }

    #[test]
    fn abbreviation_codes() {
        assert!(is_known_abbreviation("BLK"));
        assert!(is_known_abbreviation("nvy"));
        assert!(!is_known_abbreviation("Black"));
    }

    #[test]
    fn mapping_application() {
        let idx = mapping_index(&[("BLK".to_string(), "Black".to_string())]);
        assert_eq!(apply_mapping("blk", &idx), Some("Black".to_string()));
        assert_eq!(apply_mapping("Red", &idx), None);
    }
}
