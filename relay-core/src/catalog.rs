//! Product catalog repository: existence-checked writes keyed by the
//! integer primary key.
//!
//! Missing and duplicate products are reported as
//! [`RelayError::ProductNotFound`] and [`RelayError::ProductExists`] so the
//! HTTP layer can tell them apart from store failures.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use relay_protocol::catalog::Product;
use sqlx::FromRow;

use crate::db::DatabasePool;
use crate::errors::{RelayError, Result};

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>>;
    async fn find(&self, id: i32) -> Result<Option<Product>>;
    /// Fails with `ProductExists` when the id is taken.
    async fn insert(&self, product: &Product) -> Result<()>;
    /// Fails with `ProductNotFound` when the id is unknown.
    async fn update(&self, product: &Product) -> Result<()>;
    /// Fails with `ProductNotFound` when the id is unknown.
    async fn delete(&self, id: i32) -> Result<()>;
    /// Increments `like_count`; fails with `ProductNotFound` when the id is unknown.
    async fn like(&self, id: i32) -> Result<()>;
}

/// Postgres-backed catalog stored in the `products` table.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: DatabasePool,
}

impl PgProductRepository {
    /// Builds the repository and makes sure the `products` table exists.
    pub async fn from_pool(pool: DatabasePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                like_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool.inner())
        .await?;

        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    like_count: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            like_count: row.like_count,
        }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, like_count FROM products ORDER BY id",
        )
        .fetch_all(self.pool.inner())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, id: i32) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, like_count FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        if self.find(product.id).await?.is_some() {
            return Err(RelayError::ProductExists(product.id));
        }

        let result = sqlx::query("INSERT INTO products (id, name, like_count) VALUES ($1, $2, $3)")
            .bind(product.id)
            .bind(&product.name)
            .bind(product.like_count)
            .execute(self.pool.inner())
            .await;

        match result {
            Ok(_) => Ok(()),
            // Lost a race against a concurrent insert of the same id.
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(RelayError::ProductExists(product.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let result = sqlx::query("UPDATE products SET name = $1, like_count = $2 WHERE id = $3")
            .bind(&product.name)
            .bind(product.like_count)
            .bind(product.id)
            .execute(self.pool.inner())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::ProductNotFound(product.id));
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool.inner())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn like(&self, id: i32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET like_count = like_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool.inner())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::ProductNotFound(id));
        }
        Ok(())
    }
}

/// In-memory catalog used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryProductRepository {
    products: Arc<RwLock<BTreeMap<i32, Product>>>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().values().cloned().collect())
    }

    async fn find(&self, id: i32) -> Result<Option<Product>> {
        Ok(self.products.read().get(&id).cloned())
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write();
        if products.contains_key(&product.id) {
            return Err(RelayError::ProductExists(product.id));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write();
        match products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(RelayError::ProductNotFound(product.id)),
        }
    }

    async fn delete(&self, id: i32) -> Result<()> {
        self.products
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(RelayError::ProductNotFound(id))
    }

    async fn like(&self, id: i32) -> Result<()> {
        let mut products = self.products.write();
        let product = products.get_mut(&id).ok_or(RelayError::ProductNotFound(id))?;
        product.like_count = product.like_count.saturating_add(1);
        Ok(())
    }
}
