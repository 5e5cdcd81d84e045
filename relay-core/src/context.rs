use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{MemoryProductRepository, PgProductRepository, ProductRepository};
use crate::config::CoreConfig;
use crate::db::DatabasePool;
use crate::errors::Result;
use crate::queue::{MemoryQueueStore, QueueStore, RedisQueueStore};
use crate::trace::{SpanSink, Tracer};

/// Store clients and tracer built once at startup and passed explicitly to
/// each service's request context.
#[derive(Clone)]
pub struct SharedClients {
    pub tracer: Tracer,
    pub queues: Arc<dyn QueueStore>,
    pub products: Arc<dyn ProductRepository>,
}

impl SharedClients {
    /// Connects to Redis and, when configured, Postgres.
    pub async fn connect(config: &CoreConfig) -> Result<Self> {
        let tracer = Tracer::from_config(config)?;
        let queues = RedisQueueStore::connect(config.redis_url()).await?;
        info!(redis = %config.redis_url(), "queue store connected");

        let products: Arc<dyn ProductRepository> = match config.database_url() {
            Some(url) => {
                let pool = DatabasePool::connect_with_url(url).await?;
                Arc::new(PgProductRepository::from_pool(pool).await?)
            }
            None => {
                warn!("DATABASE_URL not set; product catalog is kept in memory");
                Arc::new(MemoryProductRepository::new())
            }
        };

        Ok(Self {
            tracer,
            queues: Arc::new(queues),
            products,
        })
    }

    /// Fully in-process clients exporting spans to `sink`.
    pub fn in_memory(service_name: &str, sink: Arc<dyn SpanSink>) -> Self {
        Self {
            tracer: Tracer::new(service_name, sink),
            queues: Arc::new(MemoryQueueStore::new()),
            products: Arc::new(MemoryProductRepository::new()),
        }
    }

    /// Same clients and sampling policy, with spans attributed to another
    /// service. Lets several in-process services share one queue store.
    pub fn for_service(&self, service_name: &str, sink: Arc<dyn SpanSink>) -> Self {
        Self {
            tracer: self.tracer.with_service(service_name, sink),
            queues: self.queues.clone(),
            products: self.products.clone(),
        }
    }
}
