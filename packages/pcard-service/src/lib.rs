pub mod admin;
pub mod cache;
pub mod context;
pub mod gateway;
pub mod lookup;
pub mod pg;
pub mod retrieval;
pub mod validator;

mod error;

pub use admin::{InvalidationReport, ProductStateReport};
pub use cache::{CacheEntry, CacheManager, MemoryCardCache};
pub use error::{Error, Result};
pub use lookup::{
	CardResponse, DebugInfo, LookupRequest, LookupResponse, NotFound, NotFoundReason,
	NotFoundResponse,
};
pub use retrieval::{Clause, Product, RetrievalCandidate, RetrievalResult};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use pcard_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use pcard_providers::{embedding, generation};
use pcard_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to the product catalog, plus the one administrative write the service performs.
pub trait ProductRegistry
where
	Self: Send + Sync,
{
	/// Active products in registry order.
	fn list_active(&self) -> BoxFuture<'_, Result<Vec<Product>>>;

	fn find_by_name_substring<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<Product>>>;

	fn clauses_for_products<'a>(
		&'a self,
		product_ids: &'a [i64],
	) -> BoxFuture<'a, Result<Vec<Clause>>>;

	fn set_active(&self, product_id: i64, active: bool) -> BoxFuture<'_, Result<Product>>;
}

pub trait ClauseVectorStore
where
	Self: Send + Sync,
{
	/// Clauses whose similarity to `embedding` exceeds `threshold`, most similar first.
	fn match_clauses<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		count: u32,
	) -> BoxFuture<'a, Result<Vec<Clause>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, Result<String>>;
}

/// Persistence for validated cards. Implementations only store and delete; expiry and versioning
/// are decided by [`CacheManager`].
pub trait CardCacheStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>>;

	fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<()>>;

	/// Increments the hit counter and returns the new value, or `None` when the entry is gone.
	fn record_hit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<i64>>>;

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64>>;

	fn remove_for_product<'a>(
		&'a self,
		product_key: &'a str,
		raw_fragments: &'a [String],
	) -> BoxFuture<'a, Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, generation }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider }
	}
}

/// Everything a lookup talks to besides the cache.
#[derive(Clone)]
pub struct Backends {
	pub registry: Arc<dyn ProductRegistry>,
	pub vectors: Arc<dyn ClauseVectorStore>,
	pub providers: Providers,
}

pub struct PcardService {
	pub cfg: Config,
	pub backends: Backends,
	pub cache: CacheManager,
}
impl PcardService {
	/// Wires the Postgres registry, vector store and cache with the HTTP providers.
	pub fn new(cfg: Config, db: Db) -> Self {
		let db = Arc::new(db);
		let backends = Backends {
			registry: Arc::new(pg::PgRegistry::new(db.clone())),
			vectors: Arc::new(pg::PgVectorStore::new(db.clone())),
			providers: Providers::default(),
		};

		Self::with_backends(cfg, backends, Arc::new(pg::PgCardCache::new(db)))
	}

	pub fn with_backends(
		cfg: Config,
		backends: Backends,
		cache_store: Arc<dyn CardCacheStore>,
	) -> Self {
		let cache = CacheManager::new(cache_store, &cfg.cache);

		Self { cfg, backends, cache }
	}

	/// Bounds a registry or vector store call by the configured RPC budget. Every failure,
	/// including the timeout itself, is reported as an upstream failure of `service`.
	pub(crate) async fn bounded<T>(
		&self,
		service: &'static str,
		fut: BoxFuture<'_, Result<T>>,
	) -> Result<T> {
		let budget = Duration::from_millis(self.cfg.retrieval.rpc_timeout_ms);

		match tokio::time::timeout(budget, fut).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err @ Error::Upstream { .. })) => Err(err),
			Ok(Err(err)) => Err(Error::upstream(service, err)),
			Err(_) => Err(Error::Upstream {
				service,
				message: format!("Timed out after {} ms.", budget.as_millis()),
			}),
		}
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			embedding::embed(cfg, text)
				.await
				.map_err(|err| provider_error("embedding", cfg.timeout_ms, err))
		})
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			generation::generate(cfg, system, user)
				.await
				.map_err(|err| provider_error("generation", cfg.timeout_ms, err))
		})
	}
}

fn provider_error(service: &'static str, timeout_ms: u64, err: pcard_providers::Error) -> Error {
	if err.is_timeout() {
		return Error::Upstream { service, message: format!("Timed out after {timeout_ms} ms.") };
	}

	Error::upstream(service, err)
}
