//! Per-source configuration.
//!
//! A `DataSource` is the unit the user manages: where the feed comes from,
//! how it is parsed, and the chain of rule blocks the pipeline applies.
//! Every rule block is optional — an absent block means the rule is skipped,
//! never defaulted to something surprising. Config JSON uses camelCase keys
//! to stay compatible with the payloads the management frontend sends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::ImportStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Manual,
    Url,
    Email,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Manual => "manual",
            SourceKind::Url => "url",
            SourceKind::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "url" => Some(Self::Url),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Regular,
    Sale,
}

impl SourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Regular => "regular",
            SourceRole::Sale => "sale",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Self::Regular),
            "sale" => Some(Self::Sale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    FullSync,
    Upsert,
}

impl UpdateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStrategy::FullSync => "full_sync",
            UpdateStrategy::Upsert => "upsert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full_sync" => Some(Self::FullSync),
            "upsert" => Some(Self::Upsert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    Hourly,
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub auto: bool,
    pub frequency: ScheduleFrequency,
    /// Local wall-clock `HH:MM` for daily/weekly schedules.
    #[serde(default)]
    pub time: Option<String>,
    /// 0 = Monday .. 6 = Sunday, for weekly schedules.
    #[serde(default)]
    pub weekday: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_true")]
    pub secure: bool,
    pub username: String,
    pub password: String,
    #[serde(default = "default_inbox")]
    pub folder: String,
    #[serde(default)]
    pub sender_whitelist: Vec<String>,
    #[serde(default)]
    pub subject_filter: Option<String>,
    #[serde(default)]
    pub mark_as_read: bool,
    #[serde(default)]
    pub delete_after_download: bool,
    #[serde(default)]
    pub extract_links_from_body: bool,
    #[serde(default)]
    pub multi_file_mode: bool,
    #[serde(default)]
    pub expected_files: Option<u32>,
    #[serde(default)]
    pub retry_if_no_email: bool,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_minutes: u32,
    #[serde(default = "default_retry_cutoff")]
    pub retry_cutoff_hour: u32,
}

fn default_true() -> bool {
    true
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

fn default_retry_interval() -> u32 {
    30
}

fn default_retry_cutoff() -> u32 {
    18
}

/// Semantic field → source header name. Header matching is case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub stock: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub ship_date: Option<String>,
    #[serde(default)]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub future_stock: Option<String>,
    #[serde(default)]
    pub discontinued: Option<String>,
    /// "if column X = value V, use column Y as the ship date".
    #[serde(default)]
    pub conditional_ship_date: Option<ConditionalShipDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalShipDate {
    pub when_column: String,
    pub equals_value: String,
    pub date_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindReplaceRule {
    pub find: String,
    pub replace_with: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePrefixRule {
    /// Regex matched against the raw style.
    pub pattern: String,
    pub prefix: String,
}

/// Order of the parts inside a combined `STYLE{delim}COLOR{delim}SIZE` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinedVariantOrder {
    StyleColorSize,
    StyleSizeColor,
    ColorStyleSize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningConfig {
    #[serde(default)]
    pub find_replace_rules: Vec<FindReplaceRule>,
    #[serde(default)]
    pub remove_first_n: usize,
    #[serde(default)]
    pub remove_last_n: usize,
    /// Literal strings, escaped before regex removal.
    #[serde(default)]
    pub remove_patterns: Vec<String>,
    /// Defaults to on.
    #[serde(default)]
    pub trim_whitespace: Option<bool>,
    #[serde(default)]
    pub use_custom_prefixes: bool,
    #[serde(default)]
    pub style_prefix_rules: Vec<StylePrefixRule>,
    #[serde(default)]
    pub combined_variant_column: Option<String>,
    #[serde(default)]
    pub combined_variant_delimiter: Option<String>,
    #[serde(default)]
    pub combined_variant_order: Option<CombinedVariantOrder>,
    #[serde(default)]
    pub convert_yes_no: bool,
    #[serde(default)]
    pub yes_value: Option<u32>,
    #[serde(default)]
    pub no_value: Option<u32>,
}

impl CleaningConfig {
    pub fn trims_whitespace(&self) -> bool {
        self.trim_whitespace.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscontinuedConfig {
    /// Keywords matched (case-insensitive) against the configured column or
    /// the raw status text.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub column: Option<String>,
    /// Drop discontinued variants instead of flagging them.
    #[serde(default)]
    pub skip_discontinued: bool,
    /// Keep selling discontinued items; variants flagged
    /// skip-unless-continue-selling survive when this is on.
    #[serde(default)]
    pub continue_selling: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureStockConfig {
    /// A ship date alone counts as future stock.
    #[serde(default)]
    pub date_only_mode: bool,
    /// Copy the future-date column into the ship date.
    #[serde(default)]
    pub use_future_date_as_ship_date: bool,
    #[serde(default)]
    pub future_date_column: Option<String>,
}

/// Size-limit bounds. A `None` bound is open-ended on that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeLimitBounds {
    #[serde(default)]
    pub min_numeric: Option<String>,
    #[serde(default)]
    pub max_numeric: Option<String>,
    #[serde(default)]
    pub min_letter: Option<String>,
    #[serde(default)]
    pub max_letter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixSizeOverride {
    /// Regex matched against the already-prefixed style. First match wins.
    pub pattern: String,
    #[serde(flatten)]
    pub bounds: SizeLimitBounds,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeLimitConfig {
    #[serde(flatten)]
    pub bounds: SizeLimitBounds,
    #[serde(default)]
    pub prefix_overrides: Vec<PrefixSizeOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeExpansionRule {
    pub from_size: String,
    pub add_sizes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRulesConfig {
    #[serde(default)]
    pub expansions: Vec<SizeExpansionRule>,
    /// Drop zero-stock variants (future-stock variants are preserved).
    #[serde(default)]
    pub filter_zero_stock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    pub min_price: f64,
    #[serde(default)]
    pub max_price: Option<f64>,
    pub expand_down: u32,
    pub expand_up: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceExpansionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tiers: Vec<PriceTier>,
    #[serde(default)]
    pub default_expand_down: u32,
    #[serde(default)]
    pub default_expand_up: u32,
}

/// Column-driven sale pricing (rule 10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePriceConfig {
    /// Header of the per-row sale-price column.
    pub column: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Whole-feed sale pricing for sale-role sources (step 15).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesConfig {
    #[serde(default = "default_multiplier")]
    pub price_multiplier: f64,
    /// Look up the existing marketplace price by SKU and stash it in `cost`
    /// so downstream sync can show it struck through.
    #[serde(default)]
    pub use_compare_at_price: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTextMapping {
    pub text: String,
    pub stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexStockPattern {
    pub name: String,
    /// Regex applied to the raw stock cell text.
    pub pattern: String,
    /// Literal (`"0"`) or backreference (`"$1"`) template for the new stock.
    #[serde(default)]
    pub extract_stock: Option<String>,
    /// Backreference template for the ship date.
    #[serde(default)]
    pub extract_date: Option<String>,
    #[serde(default)]
    pub mark_discontinued: bool,
    #[serde(default)]
    pub mark_special_order: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexStockConfig {
    #[serde(default)]
    pub patterns: Vec<ComplexStockPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueReplacementRule {
    /// Semantic field: style, color, size, stock, shipDate.
    pub field: String,
    pub find: String,
    pub replace_with: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfoConfig {
    #[serde(default)]
    pub in_stock_message: Option<String>,
    #[serde(default)]
    pub out_of_stock_message: Option<String>,
    /// `{date}` is substituted with the formatted future date.
    #[serde(default)]
    pub future_date_message: Option<String>,
    #[serde(default)]
    pub size_expansion_message: Option<String>,
    #[serde(default)]
    pub stock_threshold: u32,
    #[serde(default)]
    pub date_offset_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularPriceConfig {
    #[serde(default)]
    pub skip_zero_price: bool,
    #[serde(default)]
    pub multiplier: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRangeAction {
    Clamp,
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFloorCeilingConfig {
    #[serde(default)]
    pub floor: Option<f64>,
    #[serde(default)]
    pub ceiling: Option<f64>,
    pub action: PriceRangeAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinStockConfig {
    pub threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateOrderConfig {
    /// Prefer day-first parsing for ambiguous dates. When in doubt, US.
    #[serde(default)]
    pub european: bool,
}

// --- validation config (five togglable check families + spot checks) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreImportChecks {
    #[serde(default)]
    pub min_row_count: Option<usize>,
    #[serde(default)]
    pub max_row_count: Option<usize>,
    /// Allowed drop vs. the previous import's row count, in percent.
    #[serde(default)]
    pub row_drop_tolerance_percent: Option<f64>,
    #[serde(default)]
    pub expected_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumChecks {
    /// 0 means exact match.
    #[serde(default)]
    pub tolerance_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionChecks {
    #[serde(default)]
    pub min_stocked_percent: Option<f64>,
    #[serde(default)]
    pub max_stocked_percent: Option<f64>,
    #[serde(default)]
    pub min_priced_percent: Option<f64>,
    #[serde(default)]
    pub max_priced_percent: Option<f64>,
    #[serde(default)]
    pub min_dated_percent: Option<f64>,
    #[serde(default)]
    pub max_dated_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaChecks {
    #[serde(default)]
    pub max_item_drop_percent: Option<f64>,
    #[serde(default)]
    pub max_stock_drop_percent: Option<f64>,
    #[serde(default)]
    pub max_style_drop_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountChecks {
    #[serde(default)]
    pub min_items: Option<usize>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub min_styles: Option<usize>,
    #[serde(default)]
    pub max_styles: Option<usize>,
    #[serde(default)]
    pub max_future_stock_items: Option<usize>,
    #[serde(default)]
    pub max_discontinued_items: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotExpectation {
    Exists,
    StockPositive,
    HasFutureDate,
    IsDiscontinued,
    HasPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotCheck {
    pub style: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub expect: SpotExpectation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default)]
    pub pre_import: Option<PreImportChecks>,
    #[serde(default)]
    pub checksum: Option<ChecksumChecks>,
    #[serde(default)]
    pub distribution: Option<DistributionChecks>,
    #[serde(default)]
    pub delta: Option<DeltaChecks>,
    #[serde(default)]
    pub count: Option<CountChecks>,
    #[serde(default)]
    pub spot_checks: Vec<SpotCheck>,
}

/// The optional rule blocks a source may carry. Absence means skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default)]
    pub column_mapping: Option<ColumnMapping>,
    #[serde(default)]
    pub cleaning_config: Option<CleaningConfig>,
    #[serde(default)]
    pub discontinued_config: Option<DiscontinuedConfig>,
    #[serde(default)]
    pub future_stock_config: Option<FutureStockConfig>,
    #[serde(default)]
    pub size_limit_config: Option<SizeLimitConfig>,
    #[serde(default)]
    pub variant_rules: Option<VariantRulesConfig>,
    #[serde(default)]
    pub price_based_expansion_config: Option<PriceExpansionConfig>,
    /// Preferred over `column_sale_config` when both are present.
    #[serde(default)]
    pub sale_price_config: Option<SalePriceConfig>,
    /// Legacy alias some frontends still send.
    #[serde(default)]
    pub column_sale_config: Option<SalePriceConfig>,
    #[serde(default)]
    pub sales_config: Option<SalesConfig>,
    #[serde(default)]
    pub stock_text_mappings: Vec<StockTextMapping>,
    #[serde(default)]
    pub complex_stock_config: Option<ComplexStockConfig>,
    #[serde(default)]
    pub value_replacement_rules: Vec<ValueReplacementRule>,
    #[serde(default)]
    pub stock_info_config: Option<StockInfoConfig>,
    #[serde(default)]
    pub regular_price_config: Option<RegularPriceConfig>,
    #[serde(default)]
    pub price_floor_ceiling: Option<PriceFloorCeilingConfig>,
    #[serde(default)]
    pub min_stock_config: Option<MinStockConfig>,
    #[serde(default)]
    pub date_order: Option<DateOrderConfig>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default, alias = "importValidationConfig")]
    pub validation_config: Option<ValidationConfig>,
    /// Advisor auto-apply threshold; suggestions below it queue for review.
    #[serde(default)]
    pub color_suggestion_min_confidence: Option<f64>,
    /// On upsert of a regular source, reset stale sale-ownership flags
    /// before applying the batch. Defaults to on.
    #[serde(default)]
    pub clear_sale_owns_on_upsert: Option<bool>,
    /// Sizes a parser should use when a pivoted layout needs an explicit
    /// list (e.g. configured Tarik Ediz size rows).
    #[serde(default)]
    pub configured_sizes: Vec<String>,
    /// Extra per-format knobs keyed by format name.
    #[serde(default)]
    pub format_options: HashMap<String, serde_json::Value>,
}

impl SourceConfig {
    /// `salePriceConfig` wins over the legacy `columnSaleConfig`.
    pub fn effective_sale_price(&self) -> Option<&SalePriceConfig> {
        self.sale_price_config
            .as_ref()
            .or(self.column_sale_config.as_ref())
    }

    pub fn european_dates(&self) -> bool {
        self.date_order.as_ref().map(|d| d.european).unwrap_or(false)
    }

    pub fn color_confidence_threshold(&self) -> f64 {
        self.color_suggestion_min_confidence.unwrap_or(0.9)
    }

    pub fn clears_sale_owns_on_upsert(&self) -> bool {
        self.clear_sale_owns_on_upsert.unwrap_or(true)
    }
}

/// A configured inventory feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub role: SourceRole,
    #[serde(default)]
    pub linked_sale_source_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    pub update_strategy: UpdateStrategy,
    /// Percent; 0 disables the drop-percent guard.
    #[serde(default = "default_safety_threshold")]
    pub safety_threshold: f64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default)]
    pub email: Option<EmailSettings>,
    /// Learned layout; set by format auto-detection after the first
    /// successful run.
    #[serde(default)]
    pub format_type: Option<String>,
    #[serde(default)]
    pub pivot_enabled: bool,
    #[serde(default)]
    pub config: SourceConfig,
    #[serde(default)]
    pub last_sync_at: Option<String>,
    #[serde(default)]
    pub last_import_stats: Option<ImportStats>,
}

fn default_safety_threshold() -> f64 {
    50.0
}

impl DataSource {
    pub fn new(id: &str, name: &str, kind: SourceKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            role: SourceRole::Regular,
            linked_sale_source_id: None,
            store_id: None,
            update_strategy: UpdateStrategy::FullSync,
            safety_threshold: default_safety_threshold(),
            url: None,
            schedule: None,
            email: None,
            format_type: None,
            pivot_enabled: false,
            config: SourceConfig::default(),
            last_sync_at: None,
            last_import_stats: None,
        }
    }

    /// Structural config validation: problems that make an import
    /// pointless to even start. Empty means usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("display name is empty".to_string());
        }
        if !(0.0..=100.0).contains(&self.safety_threshold) {
            problems.push(format!(
                "safety threshold {} is not a percentage",
                self.safety_threshold
            ));
        }
        if self.linked_sale_source_id.as_deref() == Some(self.id.as_str()) {
            problems.push("source links to itself as its sale source".to_string());
        }

        match self.kind {
            SourceKind::Url => match &self.url {
                None => problems.push("url sources need a feed URL".to_string()),
                Some(url) if !url.starts_with("http") => {
                    problems.push(format!("feed URL {} is not http(s)", url));
                }
                _ => {}
            },
            SourceKind::Email => match &self.email {
                None => problems.push("email sources need email settings".to_string()),
                Some(email) => {
                    if email.host.trim().is_empty() || email.username.trim().is_empty() {
                        problems.push("email settings are missing host or username".to_string());
                    }
                    if email.port == 0 {
                        problems.push("email port 0 is invalid".to_string());
                    }
                    if email.retry_cutoff_hour > 23 {
                        problems.push(format!(
                            "retry cutoff hour {} is out of range",
                            email.retry_cutoff_hour
                        ));
                    }
                    if email.multi_file_mode && email.expected_files == Some(0) {
                        problems.push("multi-file mode expects at least one file".to_string());
                    }
                }
            },
            SourceKind::Manual => {}
        }

        if let Some(schedule) = &self.schedule {
            if let Some(time) = &schedule.time {
                if chrono::NaiveTime::parse_from_str(time, "%H:%M").is_err() {
                    problems.push(format!("schedule time {:?} is not HH:MM", time));
                }
            }
        }

        problems
    }

    /// The style prefix when neither a brand tag nor a custom prefix rule
    /// applies: the display name, with a trailing "Sale"/"Sales" stripped for
    /// sale sources.
    pub fn default_prefix(&self) -> String {
        let name = self.name.trim();
        if self.role == SourceRole::Sale {
            for suffix in ["sales", "sale"] {
                let lower = name.to_lowercase();
                if lower.ends_with(suffix) {
                    let cut = name.len() - suffix.len();
                    return name[..cut].trim().to_string();
                }
            }
        }
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_price_config_precedence() {
        let mut cfg = SourceConfig::default();
        cfg.column_sale_config = Some(SalePriceConfig {
            column: "legacy".into(),
            multiplier: 1.0,
        });
        assert_eq!(cfg.effective_sale_price().unwrap().column, "legacy");

        cfg.sale_price_config = Some(SalePriceConfig {
            column: "preferred".into(),
            multiplier: 0.5,
        });
        assert_eq!(cfg.effective_sale_price().unwrap().column, "preferred");
    }

    #[test]
    fn sale_source_prefix_strips_trailing_sale() {
        let mut src = DataSource::new("s1", "Jovani Sale", SourceKind::Manual);
        src.role = SourceRole::Sale;
        assert_eq!(src.default_prefix(), "Jovani");

        src.name = "Jovani Sales".to_string();
        assert_eq!(src.default_prefix(), "Jovani");

        src.role = SourceRole::Regular;
        assert_eq!(src.default_prefix(), "Jovani Sales");
    }

    #[test]
    fn validation_catches_structural_problems() {
        let mut src = DataSource::new("s1", "Vendor", SourceKind::Url);
        assert!(!src.validate().is_empty(), "url source without URL");

        src.url = Some("https://example.com/feed.xlsx".into());
        assert!(src.validate().is_empty());

        src.url = Some("ftp://example.com/feed.xlsx".into());
        assert_eq!(src.validate().len(), 1);

        let mut email_src = DataSource::new("s2", "Mail", SourceKind::Email);
        assert!(!email_src.validate().is_empty());
        email_src.linked_sale_source_id = Some("s2".into());
        assert!(email_src
            .validate()
            .iter()
            .any(|p| p.contains("links to itself")));
    }

    #[test]
    fn config_roundtrips_camel_case() {
        let json = r#"{
            "cleaningConfig": {"removeFirstN": 2, "findReplaceRules": [{"find": "x", "replaceWith": "y"}]},
            "stockTextMappings": [{"text": "Last Piece", "stock": 1}],
            "salePriceConfig": {"column": "SALE", "multiplier": 0.9}
        }"#;
        let cfg: SourceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.cleaning_config.as_ref().unwrap().remove_first_n, 2);
        assert_eq!(cfg.stock_text_mappings[0].stock, 1);
        assert_eq!(cfg.effective_sale_price().unwrap().multiplier, 0.9);
    }
}
