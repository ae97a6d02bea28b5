//! Size token vocabulary and ordering.
//!
//! Three families: numeric (`000`–`36`), plus-sized (`16W`–`36W`, ranked
//! immediately after their plain counterparts), and letter
//! (`XXS`–`5XL`, with `2XL` aliasing `XXL`). Sizes are always strings —
//! `"0"` is a real size. Expansion steps stay within a family's own ladder;
//! ranking interleaves W sizes for bounds comparison.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::sources::SizeLimitBounds;

pub const PLAIN_NUMERIC: [&str; 21] = [
    "000", "00", "0", "2", "4", "6", "8", "10", "12", "14", "16", "18", "20", "22", "24", "26",
    "28", "30", "32", "34", "36",
];

pub const PLUS_NUMERIC: [&str; 11] = [
    "16W", "18W", "20W", "22W", "24W", "26W", "28W", "30W", "32W", "34W", "36W",
];

pub const LETTER: [&str; 10] = ["XXS", "XS", "S", "M", "L", "XL", "XXL", "3XL", "4XL", "5XL"];

/// Default positional size list for `ots1..otsN` columns: 2 through 18.
pub const DEFAULT_OTS_SIZES: [&str; 9] = ["2", "4", "6", "8", "10", "12", "14", "16", "18"];

lazy_static! {
    /// Interleaved rank for bounds comparison: each W size ranks just after
    /// its plain counterpart.
    static ref NUMERIC_RANK: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        for (i, s) in PLAIN_NUMERIC.iter().enumerate() {
            m.insert(*s, (i as u32) * 2);
        }
        for s in PLUS_NUMERIC.iter() {
            let plain = &s[..s.len() - 1];
            if let Some(base) = PLAIN_NUMERIC.iter().position(|p| *p == plain) {
                m.insert(*s, (base as u32) * 2 + 1);
            }
        }
        m
    };

    static ref LETTER_RANK: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        for (i, s) in LETTER.iter().enumerate() {
            m.insert(*s, i as u32);
        }
        // Aliases rank identically to their canonical form.
        m.insert("2XL", *m.get("XXL").unwrap());
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFamily {
    Numeric,
    Letter,
    Other,
}

/// Canonicalize a size token: uppercase, `OOO`/`OO` to `000`/`00`, leading
/// zeros stripped (`02` → `2`) without touching `0`, `00`, `000`.
pub fn normalize_size_token(raw: &str) -> String {
    let s = raw.trim().to_uppercase();
    match s.as_str() {
        "OOO" => return "000".to_string(),
        "OO" => return "00".to_string(),
        _ => {}
    }
    if s.len() >= 2
        && s.starts_with('0')
        && s.chars().all(|c| c.is_ascii_digit())
        && s.chars().any(|c| c != '0')
    {
        return s.trim_start_matches('0').to_string();
    }
    s
}

pub fn family(size: &str) -> SizeFamily {
    let s = normalize_size_token(size);
    if NUMERIC_RANK.contains_key(s.as_str()) {
        SizeFamily::Numeric
    } else if LETTER_RANK.contains_key(s.as_str()) {
        SizeFamily::Letter
    } else {
        SizeFamily::Other
    }
}

/// Is this token a recognized size in any family? Used by header-shape
/// detection to count size-pattern columns.
pub fn is_size_token(raw: &str) -> bool {
    family(raw) != SizeFamily::Other
}

pub fn numeric_rank(size: &str) -> Option<u32> {
    NUMERIC_RANK.get(normalize_size_token(size).as_str()).copied()
}

pub fn letter_rank(size: &str) -> Option<u32> {
    LETTER_RANK.get(normalize_size_token(size).as_str()).copied()
}

/// Bounds check against a size-limit block. Open-ended on a `None` bound;
/// sizes outside both families always pass (the filter never destroys data
/// it cannot order).
pub fn within_bounds(size: &str, bounds: &SizeLimitBounds) -> bool {
    match family(size) {
        SizeFamily::Numeric => {
            let rank = match numeric_rank(size) {
                Some(r) => r,
                None => return true,
            };
            if let Some(min) = bounds.min_numeric.as_deref().and_then(numeric_rank) {
                if rank < min {
                    return false;
                }
            }
            if let Some(max) = bounds.max_numeric.as_deref().and_then(numeric_rank) {
                if rank > max {
                    return false;
                }
            }
            true
        }
        SizeFamily::Letter => {
            let rank = match letter_rank(size) {
                Some(r) => r,
                None => return true,
            };
            if let Some(min) = bounds.min_letter.as_deref().and_then(letter_rank) {
                if rank < min {
                    return false;
                }
            }
            if let Some(max) = bounds.max_letter.as_deref().and_then(letter_rank) {
                if rank > max {
                    return false;
                }
            }
            true
        }
        SizeFamily::Other => true,
    }
}

fn ladder_for(size: &str) -> Option<&'static [&'static str]> {
    let s = normalize_size_token(size);
    if PLAIN_NUMERIC.contains(&s.as_str()) {
        Some(&PLAIN_NUMERIC)
    } else if PLUS_NUMERIC.contains(&s.as_str()) {
        Some(&PLUS_NUMERIC)
    } else {
        None
    }
}

/// Step `down` sizes smaller and `up` sizes larger along the variant's own
/// numeric ladder (plain sizes never step into W sizes or vice versa).
pub fn neighbors(size: &str, down: u32, up: u32) -> Vec<String> {
    let s = normalize_size_token(size);
    let Some(ladder) = ladder_for(&s) else {
        return Vec::new();
    };
    let Some(pos) = ladder.iter().position(|t| *t == s) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for step in 1..=down as usize {
        if let Some(idx) = pos.checked_sub(step) {
            out.push(ladder[idx].to_string());
        }
    }
    for step in 1..=up as usize {
        if let Some(t) = ladder.get(pos + step) {
            out.push(t.to_string());
        }
    }
    out
}
