use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::importer::{CatalogStore, ImportBatchResult};
use crate::normalizer::ImportedProductRecord;
use crate::parser::classify::ProductTypeClass;

type Result<T> = std::result::Result<T, StoreError>;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::Rejected(format!("cannot create {}: {}", dir.display(), e)))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id         INTEGER PRIMARY KEY,
            label      TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            sku           TEXT PRIMARY KEY,
            slug          TEXT NOT NULL,
            name          TEXT NOT NULL,
            product_type  TEXT NOT NULL
                CHECK(product_type IN ('ring','earring','necklace','bracelet','piercing','generic')),
            cost_price    REAL NOT NULL CHECK(cost_price > 0),
            sale_price    REAL NOT NULL,
            price_source  TEXT NOT NULL CHECK(price_source IN ('extracted','rescued','estimated')),
            weight_grams  REAL NOT NULL CHECK(weight_grams > 0 AND weight_grams < 50),
            weight_source TEXT NOT NULL CHECK(weight_source IN ('extracted','estimated')),
            description   TEXT NOT NULL,
            images        TEXT NOT NULL,
            source_url    TEXT NOT NULL,
            category_id   INTEGER REFERENCES categories(id),
            imported_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_slug ON products(slug);
        CREATE INDEX IF NOT EXISTS idx_products_type ON products(product_type);

        CREATE TABLE IF NOT EXISTS import_runs (
            id          INTEGER PRIMARY KEY,
            succeeded   INTEGER NOT NULL,
            failed      INTEGER NOT NULL,
            skipped     INTEGER NOT NULL,
            cancelled   BOOLEAN NOT NULL,
            finished_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS import_failures (
            id          INTEGER PRIMARY KEY,
            run_id      INTEGER NOT NULL REFERENCES import_runs(id),
            identifier  TEXT NOT NULL,
            reason      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_failures_run ON import_failures(run_id);
        ",
    )?;
    Ok(())
}

/// SQLite-backed catalog store. Records are keyed by SKU, so saving the
/// same record twice leaves one row.
pub struct SqliteCatalogStore {
    conn: Connection,
    category_id: Option<i64>,
}

impl SqliteCatalogStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn,
            category_id: None,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::new(connect(path)?)
    }

    /// Category attached to every record saved from now on.
    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn resolve_category_id(&self, label: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM categories WHERE label = ?1",
                params![label.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn ensure_category(&self, label: &str) -> Result<i64> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StoreError::Rejected("category label is empty".into()));
        }
        self.conn
            .execute("INSERT OR IGNORE INTO categories (label) VALUES (?1)", params![label])?;
        self.resolve_category_id(label)?
            .ok_or_else(|| StoreError::Rejected(format!("category {:?} not found after insert", label)))
    }

    /// Persist one batch summary and its failure reasons. Returns the run id.
    pub fn record_run(&self, result: &ImportBatchResult) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO import_runs (succeeded, failed, skipped, cancelled) VALUES (?1, ?2, ?3, ?4)",
            params![
                result.succeeded.len() as i64,
                result.failed.len() as i64,
                result.skipped as i64,
                result.cancelled,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO import_failures (run_id, identifier, reason) VALUES (?1, ?2, ?3)",
            )?;
            for f in &result.failed {
                stmt.execute(params![run_id, f.identifier, f.reason])?;
            }
        }
        tx.commit()?;
        Ok(run_id)
    }

    pub fn list_products(
        &self,
        product_type: Option<ProductTypeClass>,
        limit: usize,
    ) -> Result<Vec<ProductRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT sku, name, product_type, cost_price, sale_price, price_source,
                    weight_grams, weight_source, slug
             FROM products
             WHERE (?1 IS NULL OR product_type = ?1)
             ORDER BY imported_at DESC, sku
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(
                params![product_type.map(|c| c.as_str()), limit as i64],
                |row| {
                    Ok(ProductRow {
                        sku: row.get(0)?,
                        name: row.get(1)?,
                        product_type: row.get(2)?,
                        cost_price: row.get(3)?,
                        sale_price: row.get(4)?,
                        price_source: row.get(5)?,
                        weight_grams: row.get(6)?,
                        weight_source: row.get(7)?,
                        slug: row.get(8)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let (products, estimated_prices, rescued_prices, estimated_weights): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(price_source = 'estimated'), 0),
                        COALESCE(SUM(price_source = 'rescued'), 0),
                        COALESCE(SUM(weight_source = 'estimated'), 0)
                 FROM products",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let runs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM import_runs", [], |row| row.get(0))?;
        let failures: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM import_failures", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT product_type, COUNT(*) FROM products GROUP BY product_type ORDER BY COUNT(*) DESC",
        )?;
        let by_type: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CatalogStats {
            products,
            estimated_prices,
            rescued_prices,
            estimated_weights,
            runs,
            failures,
            by_type,
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn save_product(&mut self, record: &ImportedProductRecord) -> Result<()> {
        let images = serde_json::to_string(&record.images)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO products
             (sku, slug, name, product_type, cost_price, sale_price, price_source,
              weight_grams, weight_source, description, images, source_url, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.sku,
                record.slug,
                record.name,
                record.product_type.as_str(),
                record.cost_price,
                record.sale_price,
                record.price_source.as_str(),
                record.weight_grams,
                record.weight_source.as_str(),
                record.description,
                images,
                record.source_url,
                self.category_id,
            ],
        )?;
        Ok(())
    }
}

pub struct ProductRow {
    pub sku: String,
    pub name: String,
    pub product_type: String,
    pub cost_price: f64,
    pub sale_price: f64,
    pub price_source: String,
    pub weight_grams: f64,
    pub weight_source: String,
    pub slug: String,
}

pub struct CatalogStats {
    pub products: i64,
    pub estimated_prices: i64,
    pub rescued_prices: i64,
    pub estimated_weights: i64,
    pub runs: i64,
    pub failures: i64,
    pub by_type: Vec<(String, i64)>,
}
