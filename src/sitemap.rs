use std::collections::HashSet;

use quick_xml::events::Event;
use tracing::{info, warn};
use url::Url;

use crate::error::FetchError;
use crate::fetcher::{DocumentFetcher, ProductLookup};

/// Top-level shape of a sitemap document.
#[derive(Debug, PartialEq, Eq)]
pub enum Sitemap {
    UrlSet(Vec<String>),
    Index(Vec<String>),
}

/// Fetch the catalog sitemap and return one lookup per product page.
/// Child sitemaps of an index are fetched one after another, and only
/// those whose location looks product-related.
pub async fn discover_products<F: DocumentFetcher>(
    fetcher: &F,
    sitemap_url: &Url,
    product_path: &str,
) -> Result<Vec<ProductLookup>, FetchError> {
    info!(url = %sitemap_url, "fetching sitemap");
    let locations = match parse_sitemap(&fetcher.fetch(sitemap_url).await?)? {
        Sitemap::UrlSet(urls) => urls,
        Sitemap::Index(children) => {
            let children: Vec<&String> = children
                .iter()
                .filter(|loc| is_product_sitemap(loc, product_path))
                .collect();
            info!(children = children.len(), "sitemap index");
            let mut urls = Vec::new();
            for child in children {
                let Ok(child_url) = Url::parse(child) else {
                    warn!(loc = %child, "skipping unparsable child sitemap");
                    continue;
                };
                match parse_sitemap(&fetcher.fetch(&child_url).await?)? {
                    Sitemap::UrlSet(found) => urls.extend(found),
                    Sitemap::Index(_) => warn!(url = %child_url, "nested sitemap index ignored"),
                }
            }
            urls
        }
    };
    info!(total = locations.len(), "urls in sitemap");

    let mut seen = HashSet::new();
    let lookups: Vec<ProductLookup> = locations
        .iter()
        .filter_map(|loc| product_slug(loc, product_path))
        .filter(|slug| seen.insert(slug.clone()))
        .map(|slug| ProductLookup {
            code: Some(slug),
            ..Default::default()
        })
        .collect();

    info!(products = lookups.len(), "product pages after filtering");
    Ok(lookups)
}

fn is_product_sitemap(loc: &str, product_path: &str) -> bool {
    let loc = loc.to_lowercase();
    loc.contains("product") || loc.contains(&product_path.trim_matches('/').to_lowercase())
}

/// Slug of a `/<product_path>/<slug>/` URL, `None` for anything else.
pub fn product_slug(loc: &str, product_path: &str) -> Option<String> {
    let url = Url::parse(loc.trim()).ok()?;
    let prefix = format!("{}/", product_path.trim_matches('/'));
    let rest = url.path().trim_matches('/').strip_prefix(&prefix)?;
    (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
}

/// Parse a `<urlset>` or `<sitemapindex>` and return every `<loc>`.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, FetchError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut locs = Vec::new();
    let mut is_index = None;
    let mut in_entry = false;
    let mut in_loc = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"urlset" => is_index = Some(false),
                b"sitemapindex" => is_index = Some(true),
                b"url" | b"sitemap" => in_entry = true,
                b"loc" if in_entry => in_loc = true,
                _ => {}
            },
            Event::Text(e) if in_loc => {
                let text = e.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    locs.push(text.to_string());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"url" | b"sitemap" => in_entry = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    match is_index {
        Some(true) => Ok(Sitemap::Index(locs)),
        Some(false) => Ok(Sitemap::UrlSet(locs)),
        None => Err(FetchError::Other(
            "document is neither a urlset nor a sitemapindex".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://loja.example.com/produto/anel-luna/</loc></url>
  <url><loc>https://loja.example.com/produto/brinco-gota/</loc><lastmod>2024-05-01</lastmod></url>
  <url><loc>https://loja.example.com/categoria/aneis/</loc></url>
  <url><loc>https://loja.example.com/produto/anel-luna/</loc></url>
  <url><loc>https://loja.example.com/produto/</loc></url>
</urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://loja.example.com/product-sitemap.xml</loc></sitemap>
  <sitemap><loc>https://loja.example.com/page-sitemap.xml</loc></sitemap>
</sitemapindex>"#;

    struct XmlFetcher(HashMap<&'static str, &'static str>);

    impl DocumentFetcher for XmlFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.0
                .get(url.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[test]
    fn parses_urlset_and_index() {
        match parse_sitemap(URLSET).unwrap() {
            Sitemap::UrlSet(urls) => assert_eq!(urls.len(), 5),
            other => panic!("expected urlset, got {:?}", other),
        }
        assert_eq!(
            parse_sitemap(INDEX).unwrap(),
            Sitemap::Index(vec![
                "https://loja.example.com/product-sitemap.xml".into(),
                "https://loja.example.com/page-sitemap.xml".into(),
            ])
        );
    }

    #[test]
    fn rejects_non_sitemap() {
        assert!(parse_sitemap("<html><body>oops</body></html>").is_err());
    }

    #[test]
    fn slug_only_for_product_pages() {
        assert_eq!(
            product_slug("https://loja.example.com/produto/anel-luna/", "produto").as_deref(),
            Some("anel-luna")
        );
        assert_eq!(product_slug("https://loja.example.com/produto/", "produto"), None);
        assert_eq!(product_slug("https://loja.example.com/produtos/x/", "produto"), None);
        assert_eq!(product_slug("https://loja.example.com/produto/a/b/", "/produto/"), None);
    }

    #[tokio::test]
    async fn discovers_through_index() {
        let fetcher = XmlFetcher(HashMap::from([
            ("https://loja.example.com/sitemap_index.xml", INDEX),
            ("https://loja.example.com/product-sitemap.xml", URLSET),
        ]));
        let url = Url::parse("https://loja.example.com/sitemap_index.xml").unwrap();
        let lookups = discover_products(&fetcher, &url, "produto").await.unwrap();
        let codes: Vec<_> = lookups.iter().filter_map(|l| l.code.as_deref()).collect();
        // page-sitemap.xml is never requested, so the 404 never surfaces
        assert_eq!(codes, vec!["anel-luna", "brinco-gota"]);
    }
}
