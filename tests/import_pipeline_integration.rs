//! End-to-end pipeline tests.
//!
//! Each test drives a real source config through the full 20-step
//! sequence against an in-memory store, feeding raw CSV buffers exactly
//! as an acquisition adapter would.

use std::sync::Arc;

use stockflow::acquisition::{combine, email, manual};
use stockflow::acquisition::email::{MailAttachment, MailFetcher, MailMessage};
use stockflow::colors::advisor::NoopColorAdvisor;
use stockflow::coordinator::ImportCoordinator;
use stockflow::formats::grid::RawFile;
use stockflow::models::{ImportedItem, StagedFileStatus};
use stockflow::pipeline::{ImportPipeline, PipelineInput, RunOptions};
use stockflow::sources::{
    ChecksumChecks, DataSource, EmailSettings, PrefixSizeOverride, PriceExpansionConfig,
    PriceTier, SizeLimitBounds, SizeLimitConfig, SourceKind, SourceRole, StockInfoConfig,
    StockTextMapping, UpdateStrategy, ValidationConfig, VariantRulesConfig,
};
use stockflow::storage::InventoryDb;
use stockflow::Variant;

fn pipeline() -> ImportPipeline {
    ImportPipeline::new(InventoryDb::in_memory().unwrap(), Arc::new(NoopColorAdvisor))
}

fn csv(name: &str, text: &str) -> RawFile {
    RawFile::new(name, text.as_bytes().to_vec())
}

fn run_opts() -> RunOptions {
    RunOptions {
        trigger: "test".to_string(),
        multi_file: false,
        cancel: None,
    }
}

async fn run_files(
    pipeline: &ImportPipeline,
    source: &DataSource,
    files: Vec<RawFile>,
) -> stockflow::PipelineResult {
    pipeline
        .run(source, PipelineInput::Files(files), run_opts())
        .await
        .unwrap()
}

fn skus(items: &[ImportedItem]) -> Vec<String> {
    let mut skus: Vec<String> = items.iter().map(|i| i.variant.sku.clone()).collect();
    skus.sort();
    skus
}

/// The Tarik Ediz pivot. D-rows keep their positive sizes, zero-stock
/// rows drop, a stale delivery date survives on an in-stock variant.
#[tokio::test]
async fn tarik_ediz_pivot_end_to_end() {
    let pipeline = pipeline();
    let mut source = DataSource::new("tarik", "Tarik Ediz", SourceKind::Manual);
    source.config.variant_rules = Some(VariantRulesConfig {
        expansions: vec![],
        filter_zero_stock: true,
    });
    pipeline.db().upsert_source(&source).unwrap();

    // Column 0 / 7 / 11 / 13+ layout; the delivery date is already past.
    let sheet = "\
Up-to-Date Product Inventory Report
10001,,,,,,,Gown Name,,,,,,2,4,6,8
D,,,,,,,,,,,Purple,,0,2,1,0
24/03/2020,,,,,,,,,,,Navy,,0,0,1,0
";
    let result = run_files(&pipeline, &source, vec![csv("tarik.csv", sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let items = pipeline.db().get_items("tarik").unwrap();
    let got = skus(&items);
    assert_eq!(
        got,
        vec![
            "Tarik-Ediz-10001-Navy-6",
            "Tarik-Ediz-10001-Purple-4",
            "Tarik-Ediz-10001-Purple-6",
        ]
    );

    let purple4 = items
        .iter()
        .find(|i| i.variant.sku.ends_with("Purple-4"))
        .unwrap();
    assert_eq!(purple4.variant.stock, 2);
    assert!(purple4.variant.discontinued);

    let navy6 = items
        .iter()
        .find(|i| i.variant.sku.ends_with("Navy-6"))
        .unwrap();
    assert_eq!(navy6.variant.stock, 1);
    assert_eq!(navy6.variant.ship_date.as_deref(), Some("2020-03-24"));

    // The detection was learned back onto the source.
    let learned = pipeline.db().get_source("tarik").unwrap().unwrap();
    assert_eq!(learned.format_type.as_deref(), Some("tarik_ediz"));
    assert!(learned.pivot_enabled);
}

/// Text stock plus a future special date; in-stock wins the message.
#[tokio::test]
async fn sherri_hill_text_stock_and_future_date() {
    let pipeline = pipeline();
    let mut source = DataSource::new("sherri", "Sherri Hill", SourceKind::Manual);
    source.config.stock_text_mappings = vec![StockTextMapping {
        text: "Last Piece".into(),
        stock: 1,
    }];
    source.config.stock_info_config = Some(StockInfoConfig {
        in_stock_message: Some("In stock".into()),
        out_of_stock_message: Some("Out".into()),
        future_date_message: Some("Ships {date}".into()),
        size_expansion_message: None,
        stock_threshold: 0,
        date_offset_days: 0,
    });
    pipeline.db().upsert_source(&source).unwrap();

    let sheet = "\
Style,Color,,,4,Special Date
54321,Ivory,,,Last Piece,2030-07-15
";
    let result = run_files(&pipeline, &source, vec![csv("sherri.csv", sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let items = pipeline.db().get_items("sherri").unwrap();
    assert_eq!(items.len(), 1);
    let v = &items[0].variant;
    assert_eq!(v.stock, 1);
    assert_eq!(v.ship_date.as_deref(), Some("2030-07-15"));
    assert!(!v.has_future_stock, "positive stock is not future stock");
    assert_eq!(v.stock_info.as_deref(), Some("In stock"));
}

/// A collapsed feed never wipes the store.
#[tokio::test]
async fn safety_block_on_collapsed_feed() {
    let pipeline = pipeline();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    let existing: Vec<ImportedItem> = (0..1000)
        .map(|i| {
            ImportedItem::from_variant(
                "vendor",
                None,
                Variant::new(format!("Vendor {}", i), "Red", "4", 1),
            )
        })
        .collect();
    pipeline
        .db()
        .replace_source_inventory("vendor", &existing)
        .unwrap();

    let mut sheet = String::from("style,color,size,stock\n");
    for i in 0..20 {
        sheet.push_str(&format!("N{},Red,4,1\n", i));
    }
    let result = run_files(&pipeline, &source, vec![csv("tiny.csv", &sheet)]).await;

    assert!(!result.success);
    let block = result.safety_block.expect("safety block expected");
    assert!(block.drop_percent.unwrap() > 50.0);
    assert_eq!(pipeline.db().count_items("vendor").unwrap(), 1000);
    let after = pipeline.db().get_source("vendor").unwrap().unwrap();
    assert!(after.last_sync_at.is_none(), "last sync must not advance");
}

/// Sale styles supersede the linked regular source per style.
#[tokio::test]
async fn sale_regular_cross_reference() {
    let pipeline = pipeline();

    let mut sale = DataSource::new("jovani-sale", "Jovani Sale", SourceKind::Manual);
    sale.role = SourceRole::Sale;
    pipeline.db().upsert_source(&sale).unwrap();

    let mut regular = DataSource::new("jovani", "Jovani", SourceKind::Manual);
    regular.linked_sale_source_id = Some("jovani-sale".into());
    pipeline.db().upsert_source(&regular).unwrap();

    // Regular source already carries a 1012 row from an earlier run.
    pipeline
        .db()
        .replace_source_inventory(
            "jovani",
            &[ImportedItem::from_variant(
                "jovani",
                None,
                Variant::new("Jovani 1012", "Red", "4", 2),
            )],
        )
        .unwrap();

    let sale_sheet = "style,color,size,stock\n1012,Red,4,3\n1013,Navy,6,2\n";
    let result = run_files(&pipeline, &sale, vec![csv("sale.csv", sale_sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let reg_sheet = "style,color,size,stock\n1012,Black,8,5\n1014,Black,8,5\n";
    let result = run_files(&pipeline, &regular, vec![csv("reg.csv", reg_sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let items = pipeline.db().get_items("jovani").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].variant.style, "Jovani 1014");

    let active = pipeline.db().active_sale_styles("jovani-sale").unwrap();
    assert!(active.contains("JOVANI 1013"));
    assert!(active.contains("JOVANI 1012"));
}

/// Price-tier expansion honors the per-prefix size override.
#[tokio::test]
async fn price_expansion_with_prefix_override() {
    let pipeline = pipeline();
    let mut source = DataSource::new("jovani", "Jovani", SourceKind::Manual);
    source.store_id = Some("store1".into());
    source.config.size_limit_config = Some(SizeLimitConfig {
        bounds: SizeLimitBounds {
            min_numeric: Some("2".into()),
            max_numeric: Some("20".into()),
            min_letter: None,
            max_letter: None,
        },
        prefix_overrides: vec![PrefixSizeOverride {
            pattern: "^Jovani".into(),
            bounds: SizeLimitBounds {
                min_numeric: Some("2".into()),
                max_numeric: Some("30".into()),
                min_letter: None,
                max_letter: None,
            },
        }],
    });
    source.config.price_based_expansion_config = Some(PriceExpansionConfig {
        enabled: true,
        tiers: vec![PriceTier {
            min_price: 500.0,
            max_price: None,
            expand_down: 4,
            expand_up: 1,
        }],
        default_expand_down: 0,
        default_expand_up: 0,
    });
    pipeline.db().upsert_source(&source).unwrap();
    pipeline
        .db()
        .upsert_marketplace_price("store1", "Jovani-37001-Red-24", 600.0)
        .unwrap();

    let sheet = "style,color,size,stock\n37001,Red,24,2\n";
    let result = run_files(&pipeline, &source, vec![csv("jovani.csv", sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let items = pipeline.db().get_items("jovani").unwrap();
    let mut sizes: Vec<String> = items.iter().map(|i| i.variant.size.clone()).collect();
    sizes.sort_by_key(|s| s.parse::<u32>().unwrap());
    // 24 (real) plus 16/18/20/22 down and 26 up, all inside the override cap.
    assert_eq!(sizes, vec!["16", "18", "20", "22", "24", "26"]);
    assert!(items
        .iter()
        .filter(|i| i.variant.size != "24")
        .all(|i| i.variant.is_expanded_size));
}

/// The all-string cell policy keeps scientific-looking styles intact.
#[tokio::test]
async fn scientific_looking_style_survives() {
    let pipeline = pipeline();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    let sheet = "style,color,size,stock\n1921E0136,Red,4,1\n";
    let result = run_files(&pipeline, &source, vec![csv("sci.csv", sheet)]).await;
    assert!(result.success, "{:?}", result.error);

    let items = pipeline.db().get_items("vendor").unwrap();
    assert_eq!(items[0].variant.style, "Vendor 1921E0136");
    assert_eq!(items[0].variant.sku, "Vendor-1921E0136-Red-4");
}

/// Re-running the same feed is idempotent under full sync.
#[tokio::test]
async fn full_sync_reimport_is_idempotent() {
    let pipeline = pipeline();
    let mut source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    source.update_strategy = UpdateStrategy::FullSync;
    pipeline.db().upsert_source(&source).unwrap();

    let sheet = "style,color,size,stock,price\nA1,Red,4,2,100\nA1,Navy,6,1,100\nB2,Red,8,3,\n";
    let first = run_files(&pipeline, &source, vec![csv("feed.csv", sheet)]).await;
    let first_items = skus(&pipeline.db().get_items("vendor").unwrap());

    let second = run_files(&pipeline, &source, vec![csv("feed.csv", sheet)]).await;
    let second_items = skus(&pipeline.db().get_items("vendor").unwrap());

    assert_eq!(first.item_count, second.item_count);
    assert_eq!(first_items, second_items);

    let stats = pipeline.db().latest_import_stats("vendor").unwrap().unwrap();
    assert_eq!(stats.item_count, 3);
    assert_eq!(stats.unique_style_count, 2);
}

/// Upsert preserves rows the feed no longer mentions.
#[tokio::test]
async fn upsert_keeps_unseen_rows() {
    let pipeline = pipeline();
    let mut source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    source.update_strategy = UpdateStrategy::Upsert;
    pipeline.db().upsert_source(&source).unwrap();

    run_files(
        &pipeline,
        &source,
        vec![csv("a.csv", "style,color,size,stock\nA1,Red,4,2\nB2,Red,8,3\n")],
    )
    .await;
    run_files(
        &pipeline,
        &source,
        vec![csv("b.csv", "style,color,size,stock\nA1,Red,4,9\n")],
    )
    .await;

    let items = pipeline.db().get_items("vendor").unwrap();
    assert_eq!(items.len(), 2);
    let a1 = items
        .iter()
        .find(|i| i.variant.style == "Vendor A1")
        .unwrap();
    assert_eq!(a1.variant.stock, 9);
}

/// Multi-file manual upload consolidates under the first file's header.
#[tokio::test]
async fn manual_multi_file_consolidation() {
    let pipeline = pipeline();
    let coordinator = ImportCoordinator::new();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    let result = manual::import_upload(
        &pipeline,
        &coordinator,
        "vendor",
        vec![
            csv("one.csv", "style,color,size,stock\nA1,Red,4,1\n"),
            csv("two.csv", "style,color,size,stock\nB2,Navy,6,2\n"),
        ],
    )
    .await
    .unwrap();

    assert!(result.success, "{:?}", result.error);
    assert_eq!(pipeline.db().count_items("vendor").unwrap(), 2);
    assert!(!coordinator.is_active("vendor"));
}

/// Staged files combine into one run and flip to `imported`.
#[tokio::test]
async fn staged_combine_flow() {
    let pipeline = pipeline();
    let coordinator = ImportCoordinator::new();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    let staged = manual::stage_upload(
        &pipeline,
        "vendor",
        vec![
            csv("one.csv", "style,color,size,stock\nA1,Red,4,1\n"),
            csv("two.csv", "style,color,size,stock\nB2,Navy,6,2\n"),
        ],
    )
    .unwrap();
    assert_eq!(staged, 2);
    assert_eq!(pipeline.db().count_staged("vendor").unwrap(), 2);

    let result = combine::import_staged(&pipeline, &coordinator, "vendor")
        .await
        .unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(pipeline.db().count_items("vendor").unwrap(), 2);
    assert_eq!(pipeline.db().count_staged("vendor").unwrap(), 0);
    assert_eq!(
        pipeline
            .db()
            .staged_files("vendor", StagedFileStatus::Imported)
            .unwrap()
            .len(),
        2
    );

    // Prefixing happened at staging time, not twice.
    let items = pipeline.db().get_items("vendor").unwrap();
    assert!(items.iter().all(|i| i.variant.style.starts_with("Vendor ")));
    assert!(items.iter().all(|i| !i.variant.style.starts_with("Vendor Vendor")));
}

struct FixedMailbox {
    messages: Vec<MailMessage>,
}

#[async_trait::async_trait]
impl MailFetcher for FixedMailbox {
    async fn fetch_unread(&self, _settings: &EmailSettings) -> anyhow::Result<Vec<MailMessage>> {
        Ok(self.messages.clone())
    }
    async fn mark_read(&self, _settings: &EmailSettings, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn delete(&self, _settings: &EmailSettings, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

fn email_source() -> DataSource {
    let mut source = DataSource::new("mail", "Mail Vendor", SourceKind::Email);
    source.email = Some(EmailSettings {
        host: "imap.example.com".into(),
        port: 993,
        secure: true,
        username: "inv@example.com".into(),
        password: "secret".into(),
        folder: "INBOX".into(),
        sender_whitelist: vec!["vendor.example.com".into()],
        subject_filter: Some("inventory".into()),
        mark_as_read: true,
        delete_after_download: false,
        extract_links_from_body: false,
        multi_file_mode: false,
        expected_files: None,
        retry_if_no_email: true,
        retry_interval_minutes: 30,
        retry_cutoff_hour: 18,
    });
    source
}

#[tokio::test]
async fn email_pull_imports_matching_attachment_once() {
    let pipeline = pipeline();
    let coordinator = ImportCoordinator::new();
    pipeline.db().upsert_source(&email_source()).unwrap();

    let mailbox = FixedMailbox {
        messages: vec![
            MailMessage {
                message_id: "m1".into(),
                from: "stock@vendor.example.com".into(),
                subject: "Daily inventory feed".into(),
                body_text: None,
                body_html: None,
                attachments: vec![
                    MailAttachment {
                        file_name: "feed.csv".into(),
                        data: b"style,color,size,stock\nA1,Red,4,2\n".to_vec(),
                    },
                    MailAttachment {
                        file_name: "logo.png".into(),
                        data: vec![1, 2, 3],
                    },
                ],
            },
            MailMessage {
                message_id: "m2".into(),
                from: "spam@other.example.com".into(),
                subject: "Daily inventory feed".into(),
                body_text: None,
                body_html: None,
                attachments: vec![MailAttachment {
                    file_name: "feed.csv".into(),
                    data: b"style,color,size,stock\nZ9,Red,4,2\n".to_vec(),
                }],
            },
        ],
    };

    let http = reqwest::Client::new();
    let outcome =
        email::run_email_pull(&pipeline, &coordinator, &mailbox, &http, "mail", "sched-1")
            .await
            .unwrap();
    match outcome {
        email::EmailPullOutcome::Imported(result) => {
            assert!(result.success, "{:?}", result.error)
        }
        other => panic!("expected import, got {:?}", other),
    }

    let items = pipeline.db().get_items("mail").unwrap();
    assert_eq!(items.len(), 1, "whitelisted sender only");
    assert_eq!(items[0].variant.style, "Mail Vendor A1");

    // Same message again: deduped by (message id, content hash).
    let outcome =
        email::run_email_pull(&pipeline, &coordinator, &mailbox, &http, "mail", "sched-2")
            .await
            .unwrap();
    assert!(matches!(outcome, email::EmailPullOutcome::NoMatchingMail));
}

/// Multi-file email mode stages until the expected file count arrives,
/// then combines in one run.
#[tokio::test]
async fn email_multi_file_waits_for_expected_count() {
    let pipeline = pipeline();
    let coordinator = ImportCoordinator::new();
    let mut source = email_source();
    {
        let email = source.email.as_mut().unwrap();
        email.multi_file_mode = true;
        email.expected_files = Some(2);
        email.subject_filter = None;
        email.sender_whitelist = vec![];
    }
    pipeline.db().upsert_source(&source).unwrap();
    let http = reqwest::Client::new();

    let first = FixedMailbox {
        messages: vec![MailMessage {
            message_id: "m1".into(),
            from: "a@vendor.example.com".into(),
            subject: "part one".into(),
            body_text: None,
            body_html: None,
            attachments: vec![MailAttachment {
                file_name: "one.csv".into(),
                data: b"style,color,size,stock\nA1,Red,4,1\n".to_vec(),
            }],
        }],
    };
    let outcome = email::run_email_pull(&pipeline, &coordinator, &first, &http, "mail", "r1")
        .await
        .unwrap();
    match outcome {
        email::EmailPullOutcome::Staged { staged, combined } => {
            assert_eq!(staged, 1);
            assert!(combined.is_none(), "one of two files staged, no combine yet");
        }
        other => panic!("expected staged outcome, got {:?}", other),
    }
    assert_eq!(pipeline.db().count_items("mail").unwrap(), 0);

    let second = FixedMailbox {
        messages: vec![MailMessage {
            message_id: "m2".into(),
            from: "a@vendor.example.com".into(),
            subject: "part two".into(),
            body_text: None,
            body_html: None,
            attachments: vec![MailAttachment {
                file_name: "two.csv".into(),
                data: b"style,color,size,stock\nB2,Navy,6,2\n".to_vec(),
            }],
        }],
    };
    let outcome = email::run_email_pull(&pipeline, &coordinator, &second, &http, "mail", "r2")
        .await
        .unwrap();
    match outcome {
        email::EmailPullOutcome::Staged { combined, .. } => {
            let combined = combined.expect("second file completes the batch");
            assert!(combined.success, "{:?}", combined.error);
            assert_eq!(combined.item_count, 2);
        }
        other => panic!("expected combine, got {:?}", other),
    }
    assert_eq!(pipeline.db().count_items("mail").unwrap(), 2);
}

/// Validation failures are reported but never roll back a committed write.
#[tokio::test]
async fn post_import_validation_reports_without_rollback() {
    let pipeline = pipeline();
    let mut source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    source.config.min_stock_config = Some(stockflow::sources::MinStockConfig { threshold: 5 });
    source.config.validation_config = Some(ValidationConfig {
        checksum: Some(ChecksumChecks {
            tolerance_percent: 0.0,
        }),
        ..Default::default()
    });
    pipeline.db().upsert_source(&source).unwrap();

    // One row survives the min-stock rule, one is dropped, so the exact
    // checksum must fail while the write sticks.
    let sheet = "style,color,size,stock\nA1,Red,4,9\nB2,Red,6,1\n";
    let result = run_files(&pipeline, &source, vec![csv("feed.csv", sheet)]).await;

    assert!(result.success);
    assert_eq!(pipeline.db().count_items("vendor").unwrap(), 1);
    let report = result.validation.expect("validation report expected");
    assert!(!report.all_passed());
    assert!(report.accuracy < 1.0);
}
