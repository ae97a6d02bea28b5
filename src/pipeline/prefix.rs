//! Style prefixing (pipeline step 8).
//!
//! The prefix disambiguates identical raw style numbers across vendors:
//! a brand tag from the parser wins, then the source's custom prefix
//! rules matched against the raw style, then the source display name
//! (with a trailing "Sale"/"Sales" stripped for sale sources). Colors are
//! title-cased here and SKUs rebuilt.

use regex::Regex;

use crate::colors;
use crate::models::Variant;
use crate::sources::DataSource;

fn custom_prefix(source: &DataSource, raw_style: &str) -> Option<String> {
    let cleaning = source.config.cleaning_config.as_ref()?;
    if !cleaning.use_custom_prefixes {
        return None;
    }
    for rule in &cleaning.style_prefix_rules {
        if let Ok(re) = Regex::new(&rule.pattern) {
            if re.is_match(raw_style) {
                return Some(rule.prefix.clone());
            }
        }
    }
    None
}

/// Resolve the prefix for one variant.
pub fn resolve_prefix(source: &DataSource, variant: &Variant) -> String {
    if let Some(brand) = &variant.brand {
        return brand.clone();
    }
    if let Some(custom) = custom_prefix(source, &variant.style) {
        return custom;
    }
    source.default_prefix()
}

/// Apply `{prefix} {rawStyle}`, title-case the color, rebuild the SKU.
pub fn apply_prefixes(variants: &mut [Variant], source: &DataSource) {
    for v in variants.iter_mut() {
        let prefix = resolve_prefix(source, v);
        if !prefix.is_empty() && !v.style.starts_with(&prefix) {
            v.style = format!("{} {}", prefix, v.style.trim());
        }
        v.color = colors::title_case_color(&colors::normalize_color(&v.color));
        v.rebuild_sku();
    }
}
