use std::collections::HashMap;

use catalog_importer::db::SqliteCatalogStore;
use catalog_importer::normalizer::{FieldSource, PriceSource, SkuSequence};
use catalog_importer::parser::process_document;
use catalog_importer::{
    BatchImporter, DocumentFetcher, Estimator, FetchError, ImportItem, ProductLookup,
    ProductTypeClass, SourceDocument, UrlResolver,
};
use rusqlite::Connection;
use url::Url;

const BASE: &str = "https://loja.example.com";

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path, e))
}

fn page_url(slug: &str) -> String {
    format!("{}/produto/{}/", BASE, slug)
}

struct FixtureFetcher {
    pages: HashMap<String, String>,
}

impl DocumentFetcher for FixtureFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.pages.get(url.as_str()).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[test]
fn full_woocommerce_page() {
    let doc = SourceDocument::new(page_url("anel-solitario"), fixture("ring_full.html"));
    let record = process_document(&doc, None, &Estimator::default(), "261018120000001").unwrap();

    assert_eq!(record.name, "Anel Solitário Zircônia Dourado");
    assert_eq!(record.product_type, ProductTypeClass::Ring);
    assert_eq!(record.cost_price, 49.90);
    assert_eq!(record.sale_price, 210.0);
    assert_eq!(record.price_source, PriceSource::Extracted);
    assert_eq!(record.weight_grams, 2.8);
    assert_eq!(record.weight_source, FieldSource::Extracted);
    assert_eq!(
        record.images,
        vec![
            "https://loja.example.com/wp-content/uploads/2024/05/AN1234-1.jpg",
            "https://loja.example.com/wp-content/uploads/2024/05/AN1234-2.jpg",
            "https://cdn.loja.example.com/uploads/2024/05/AN1234-1.jpg",
        ]
    );
    assert_eq!(
        record.description,
        "Anel solitário com zircônia central, banhado a ouro 18k."
    );
    assert_eq!(record.slug, "anel-solitario-zirconia-dourado");
    assert_eq!(record.sku, "ANESOLZIRDOU-261018120000001");
}

#[test]
fn sparse_page_falls_back() {
    let estimator = Estimator::default();
    let doc = SourceDocument::new(page_url("br220"), fixture("sparse_earring.html"));
    let record = process_document(&doc, None, &estimator, "1").unwrap();

    assert_eq!(record.name, "Brinco Argola Coração Prata");
    assert_eq!(record.product_type, ProductTypeClass::Earring);
    assert_eq!(record.cost_price, 38.40);
    assert_eq!(record.price_source, PriceSource::Rescued);
    assert_eq!(
        record.weight_grams,
        estimator.estimate_defaults(ProductTypeClass::Earring).weight_grams
    );
    assert_eq!(record.weight_source, FieldSource::Estimated);
    assert_eq!(record.images, vec!["https://cdn.loja.example.com/br220.jpg"]);
    assert!(record.description.starts_with("Pair of earrings"));
    assert!(record.description.ends_with("designed for everyday elegance."));
}

#[tokio::test]
async fn batch_into_sqlite() {
    let fetcher = FixtureFetcher {
        pages: HashMap::from([
            (page_url("an1234"), fixture("ring_full.html")),
            (page_url("brinco-argola-coracao-prata"), fixture("sparse_earring.html")),
        ]),
    };
    let resolver = UrlResolver::new(Url::parse(BASE).unwrap(), None, "produto", None);
    let store = SqliteCatalogStore::new(Connection::open_in_memory().unwrap()).unwrap();
    let category = store.ensure_category("Semijoias").unwrap();

    let items: Vec<ImportItem> = vec![
        ProductLookup {
            code: Some("AN1234".into()),
            ..Default::default()
        }
        .into(),
        ProductLookup {
            name: Some("Brinco Argola Coração Prata".into()),
            ..Default::default()
        }
        .into(),
        ProductLookup {
            image_url: Some("https://cdn.loja.example.com/uploads/ZZ9999.jpg".into()),
            ..Default::default()
        }
        .into(),
    ];

    let mut importer = BatchImporter::new(
        fetcher,
        store.with_category(Some(category)),
        resolver,
        Estimator::default(),
    )
    .with_sku_sequence(SkuSequence::new("261018120000"));
    let result = importer.run(items).await.unwrap();

    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].identifier, "https://cdn.loja.example.com/uploads/ZZ9999.jpg");
    assert!(result.failed[0].reason.contains("/produto/zz9999/"));
    assert!(!result.cancelled);

    let store = importer.into_store();
    store.record_run(&result).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.products, 2);
    assert_eq!(stats.rescued_prices, 1);
    assert_eq!(stats.estimated_prices, 0);
    assert_eq!(stats.estimated_weights, 1);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.failures, 1);

    let earrings = store.list_products(Some(ProductTypeClass::Earring), 10).unwrap();
    assert_eq!(earrings.len(), 1);
    assert_eq!(earrings[0].sku, "BRIARGCORPRA-261018120000002");
    assert_eq!(earrings[0].price_source, "rescued");
}
