//! Per-variant stock-info message rendering.
//!
//! Fixed priority: expanded-size message, in-stock message, future-date
//! message (with `{date}` substitution), out-of-stock message. The config
//! comes from the source's stock-info block, else the store-wide legacy
//! rule; with neither, no message is produced.

use chrono::{Duration, NaiveDate};

use crate::formats::dates;
use crate::models::Variant;
use crate::sources::StockInfoConfig;

pub fn render(variant: &Variant, cfg: &StockInfoConfig, today: NaiveDate) -> Option<String> {
    if variant.is_expanded_size {
        if let Some(msg) = &cfg.size_expansion_message {
            return Some(msg.clone());
        }
    }

    if variant.stock > cfg.stock_threshold {
        if let Some(msg) = &cfg.in_stock_message {
            return Some(msg.clone());
        }
        return None;
    }

    if let Some(date) = variant.parsed_ship_date() {
        let shifted = date + Duration::days(cfg.date_offset_days);
        if shifted > today {
            if let Some(template) = &cfg.future_date_message {
                return Some(template.replace("{date}", &dates::format_long(date)));
            }
        }
    }

    cfg.out_of_stock_message
        .as_ref()
        .map(|msg| msg.replace("{date}", "").trim().to_string())
}

/// Stamp messages across a stream.
pub fn render_all(variants: &mut [Variant], cfg: &StockInfoConfig, today: NaiveDate) {
    for v in variants.iter_mut() {
        v.stock_info = render(v, cfg, today);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> StockInfoConfig {
        StockInfoConfig {
            in_stock_message: Some("Ships today".into()),
            out_of_stock_message: Some("Sold out {date}".into()),
            future_date_message: Some("Ships by {date}".into()),
            size_expansion_message: Some("Made to order".into()),
            stock_threshold: 0,
            date_offset_days: 0,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn priority_order_resolves_top_down() {
        let mut v = Variant::new("A", "Red", "4", 5);
        v.is_expanded_size = true;
        v.ship_date = Some("2026-06-01".into());
        assert_eq!(render(&v, &cfg(), today()).as_deref(), Some("Made to order"));

        v.is_expanded_size = false;
        assert_eq!(render(&v, &cfg(), today()).as_deref(), Some("Ships today"));

        v.stock = 0;
        assert_eq!(
            render(&v, &cfg(), today()).as_deref(),
            Some("Ships by June 1, 2026")
        );

        v.ship_date = None;
        assert_eq!(render(&v, &cfg(), today()).as_deref(), Some("Sold out"));
    }

    #[test]
    fn date_offset_shifts_the_comparison() {
        let mut config = cfg();
        config.date_offset_days = -10;
        let mut v = Variant::new("A", "Red", "4", 0);
        // Five days out, but the offset pulls it into the past.
        v.ship_date = Some("2026-01-05".into());
        assert_eq!(render(&v, &config, today()).as_deref(), Some("Sold out"));
    }

    #[test]
    fn positive_stock_with_date_prefers_in_stock() {
        // Stock 1 with a special date still reads as in stock.
        let mut v = Variant::new("54321", "Ivory", "4", 1);
        v.ship_date = Some("2026-07-15".into());
        assert_eq!(render(&v, &cfg(), today()).as_deref(), Some("Ships today"));
    }

    #[test]
    fn no_config_message_means_no_output() {
        let empty = StockInfoConfig {
            in_stock_message: None,
            out_of_stock_message: None,
            future_date_message: None,
            size_expansion_message: None,
            stock_threshold: 0,
            date_offset_days: 0,
        };
        let v = Variant::new("A", "Red", "4", 3);
        assert_eq!(render(&v, &empty, today()), None);
    }
}
