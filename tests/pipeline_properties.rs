//! Invariant sweeps over deliberately messy feeds.
//!
//! Rather than asserting one scenario, these tests feed the pipeline
//! adversarial rows (duplicate identities, slashed colors, zero sizes,
//! blank sizes, future dates) and check the persisted set against the
//! universal invariants.

use std::collections::HashSet;
use std::sync::Arc;

use stockflow::colors::advisor::NoopColorAdvisor;
use stockflow::formats::grid::RawFile;
use stockflow::models::build_sku;
use stockflow::pipeline::{ImportPipeline, PipelineInput, RunOptions};
use stockflow::sources::{DataSource, SourceKind};
use stockflow::storage::InventoryDb;

fn pipeline() -> ImportPipeline {
    ImportPipeline::new(InventoryDb::in_memory().unwrap(), Arc::new(NoopColorAdvisor))
}

async fn import_csv(pipeline: &ImportPipeline, source: &DataSource, text: &str) {
    let result = pipeline
        .run(
            source,
            PipelineInput::Files(vec![RawFile::new("feed.csv", text.as_bytes().to_vec())]),
            RunOptions {
                trigger: "test".to_string(),
                multi_file: false,
                cancel: None,
            },
        )
        .await
        .unwrap();
    assert!(result.success, "{:?}", result.error);
}

fn messy_feed() -> String {
    let mut rows = String::from("style,color,size,stock,price,ship date\n");
    // Duplicate identity with different stock, case-varied.
    rows.push_str("A100,red,4,1,100,\n");
    rows.push_str("A100,RED,4,7,100,\n");
    // Slashed and ampersanded colors.
    rows.push_str("A100,red/white,6,2,100,\n");
    rows.push_str("A200,BLACK & WHITE,8,3,150,\n");
    // Literal zero size must survive.
    rows.push_str("A300,Navy,0,2,,\n");
    // Blank size must be culled.
    rows.push_str("A400,Navy,,5,,\n");
    // Zero stock with a future date becomes future stock.
    rows.push_str("A500,Ivory,10,0,,2030-06-01\n");
    // Zero stock, no date, kept (no zero-stock filter configured).
    rows.push_str("A600,Ivory,12,0,,\n");
    rows
}

#[tokio::test]
async fn persisted_set_honors_universal_invariants() {
    let pipeline = pipeline();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    import_csv(&pipeline, &source, &messy_feed()).await;
    let items = pipeline.db().get_items("vendor").unwrap();

    // Every persisted size is non-empty; "0" is acceptable.
    assert!(items.iter().all(|i| !i.variant.size.trim().is_empty()));
    assert!(items.iter().any(|i| i.variant.size == "0"));
    // The blank-size row is gone.
    assert!(!items.iter().any(|i| i.variant.style.contains("A400")));

    // No two rows share (style, color, size).
    let mut identities = HashSet::new();
    for item in &items {
        assert!(
            identities.insert(item.variant.identity_key()),
            "duplicate identity {:?}",
            item.variant.identity_key()
        );
    }

    // Dedupe kept the higher stock of the duplicated identity.
    let a100_4 = items
        .iter()
        .find(|i| i.variant.style == "Vendor A100" && i.variant.size == "4")
        .unwrap();
    assert_eq!(a100_4.variant.stock, 7);

    // The SKU is exactly the folded {style}-{color}-{size}.
    for item in &items {
        let v = &item.variant;
        assert_eq!(v.sku, build_sku(&v.style, &v.color, &v.size));
        assert!(!v.sku.contains('/'));
        assert!(!v.sku.contains(' '));
        assert!(!v.sku.contains("--"));
    }
    assert!(items
        .iter()
        .any(|i| i.variant.sku == "Vendor-A100-Red-White-6"));

    // Zero stock plus a future ship date implies the flag.
    let a500 = items
        .iter()
        .find(|i| i.variant.style == "Vendor A500")
        .unwrap();
    assert_eq!(a500.variant.stock, 0);
    assert!(a500.variant.has_future_stock);

    let a600 = items
        .iter()
        .find(|i| i.variant.style == "Vendor A600")
        .unwrap();
    assert!(!a600.variant.has_future_stock);

    // Colors were title-cased on the way through.
    assert!(items
        .iter()
        .any(|i| i.variant.color == "Black & White"));
}

#[tokio::test]
async fn global_color_mapping_rebuilds_skus_consistently() {
    let pipeline = pipeline();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();
    pipeline.db().upsert_color_mapping("BLK", "Black").unwrap();

    import_csv(
        &pipeline,
        &source,
        "style,color,size,stock\nA1,BLK,4,2\nA1,Black,6,1\n",
    )
    .await;

    let items = pipeline.db().get_items("vendor").unwrap();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item.variant.color, "Black");
        assert_eq!(
            item.variant.sku,
            build_sku(&item.variant.style, "Black", &item.variant.size)
        );
    }
}

#[tokio::test]
async fn reimport_after_mapping_change_converges() {
    // The same feed imported twice with a mapping added in
    // between converges to the mapped spelling without duplicating rows.
    let pipeline = pipeline();
    let source = DataSource::new("vendor", "Vendor", SourceKind::Manual);
    pipeline.db().upsert_source(&source).unwrap();

    let feed = "style,color,size,stock\nA1,WNE,4,2\n";
    import_csv(&pipeline, &source, feed).await;
    let before = pipeline.db().get_items("vendor").unwrap();
    assert_eq!(before[0].variant.color, "WNE");

    pipeline.db().upsert_color_mapping("WNE", "Wine").unwrap();
    import_csv(&pipeline, &source, feed).await;

    let after = pipeline.db().get_items("vendor").unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].variant.color, "Wine");
    assert_eq!(after[0].variant.sku, "Vendor-A1-Wine-4");
}
