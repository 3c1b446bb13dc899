//! Jewelry catalog importer.
//!
//! Turns supplier product pages into normalized catalog records: ordered
//! extraction rules per field, a keyword classifier, estimated defaults for
//! whatever the page lacks, and a sequential batch runner that hands each
//! record to a [`importer::CatalogStore`].

pub mod config;
pub mod db;
pub mod error;
pub mod estimator;
pub mod fetcher;
pub mod importer;
pub mod normalizer;
pub mod parser;
pub mod sitemap;

pub use config::ImporterConfig;
pub use error::{ConfigError, FetchError, ImportError, StoreError};
pub use estimator::{CommercialDefaults, Estimator, EstimatorTable};
pub use fetcher::{DocumentFetcher, HttpFetcher, ProductLookup, UrlResolver};
pub use importer::{BatchImporter, CatalogStore, ImportBatchResult, ImportItem};
pub use normalizer::ImportedProductRecord;
pub use parser::classify::ProductTypeClass;
pub use parser::document::SourceDocument;
