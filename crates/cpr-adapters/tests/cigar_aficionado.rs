mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{http, FixtureTransport};
use cpr_adapters::{build_extractor, ListingTarget, PageToken};
use cpr_core::{assemble_record, AssemblyOptions, FieldKey, StockStatus};

const SEARCH: &str = "https://www.cigaraficionado.com/ratings/search?q=";
const PADRON: &str = "https://www.cigaraficionado.com/ratings/21457";

fn transport() -> Arc<FixtureTransport> {
    Arc::new(
        FixtureTransport::new()
            .route(&format!("{SEARCH}&page=1"), "cigar-aficionado", "search_p1.html")
            .route(&format!("{SEARCH}&page=2"), "cigar-aficionado", "search_p2.html")
            .route(PADRON, "cigar-aficionado", "detail_padron_1964.html"),
    )
}

#[tokio::test]
async fn rated_cigars_until_empty_page() {
    let extractor = build_extractor(
        "cigar-aficionado",
        "Cigar Aficionado",
        ListingTarget::new(SEARCH),
        http(transport()),
        None,
    )
    .expect("extractor");

    let first = extractor.list_page(&PageToken::Page(1)).await.expect("page 1");
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.next, Some(PageToken::Page(2)));
    assert_eq!(first.items[0].url, PADRON);
    assert_eq!(first.items[0].fields.first(FieldKey::Rating), Some("94"));
    assert_eq!(
        first.items[1].fields.first(FieldKey::ProductName),
        Some("Oliva Serie V Melanio Figurado")
    );
    assert_eq!(first.items[1].fields.first(FieldKey::Rating), Some("91"));

    let second = extractor.list_page(&PageToken::Page(2)).await.expect("page 2");
    assert!(second.items.is_empty());
    assert_eq!(second.next, None);
}

#[tokio::test]
async fn hundred_point_score_is_kept_as_is() {
    let extractor = build_extractor(
        "cigar-aficionado",
        "Cigar Aficionado",
        ListingTarget::new(SEARCH),
        http(transport()),
        None,
    )
    .expect("extractor");
    let page = extractor.list_page(&PageToken::Page(1)).await.expect("page 1");
    let listing = &page.items[0];
    let detail = extractor.detail(&listing.url).await.expect("detail");

    let assembled = assemble_record(
        extractor.source_name(),
        listing,
        &detail,
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
        &AssemblyOptions {
            brand_from_title_words: Some(1),
        },
    )
    .expect("assembled");
    let record = assembled.record;

    assert_eq!(record.rating, Some(94.0));
    assert_eq!(record.review_count, None);
    assert_eq!(record.brand.as_deref(), Some("Padrón"));
    assert_eq!(record.length_inches, Some(5.5));
    assert_eq!(record.ring_gauge, Some(50));
    assert_eq!(record.shape.as_deref(), Some("Robusto"));
    assert_eq!(record.strength_or_profile.as_deref(), Some("Full"));
    assert_eq!(record.wrapper_origin_country.as_deref(), Some("Nicaragua"));
    assert_eq!(record.wrapper_leaf.as_deref(), Some("Habano"));
    assert_eq!(record.wrapper_color.as_deref(), Some("Maduro"));
    assert_eq!(record.binder.as_deref(), Some("Nicaragua"));
    assert_eq!(record.filler.as_deref(), Some("Nicaragua"));
    assert_eq!(record.country_of_origin.as_deref(), Some("Nicaragua"));
    assert_eq!(record.price_per_unit, Some(16.8));
    assert_eq!(record.price_per_box, None);
    assert_eq!(record.stock_status, StockStatus::Unknown);
    assert_eq!(
        record.notes.as_deref(),
        Some("A dark, oily box-pressed smoke with notes of cocoa, espresso and sweet spice. Long, toasty finish.")
    );
    assert!(assembled.parse_failures.is_empty());
}
