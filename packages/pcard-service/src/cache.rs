//! Name-keyed card cache with lazy expiry.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use time::{Duration, OffsetDateTime};

use pcard_domain::{
	card::StructuredCard,
	normalize::{NORMALIZER_VERSION, normalize},
};

use crate::{BoxFuture, CardCacheStore, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
	/// Normalized query.
	pub key: String,
	pub key_version: i32,
	/// Normalized names of every product whose clauses the card may cite, matched product first.
	pub product_keys: Vec<String>,
	pub raw_query: String,
	pub card: StructuredCard,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
	pub hit_count: i64,
}
impl CacheEntry {
	pub fn is_live(&self, now: OffsetDateTime) -> bool {
		self.key_version == NORMALIZER_VERSION && self.expires_at > now
	}
}

pub struct CacheManager {
	store: Arc<dyn CardCacheStore>,
	enabled: bool,
	ttl: Duration,
}
impl CacheManager {
	pub fn new(store: Arc<dyn CardCacheStore>, cfg: &pcard_config::Cache) -> Self {
		Self { store, enabled: cfg.enabled, ttl: Duration::hours(cfg.ttl_hours) }
	}

	pub fn enabled(&self) -> bool {
		self.enabled
	}

	/// Returns a live entry for `key` and counts the hit. Read failures, expired entries and
	/// entries written under another normalizer version are all misses.
	pub async fn lookup(&self, key: &str) -> Option<CacheEntry> {
		if !self.enabled {
			return None;
		}

		let mut entry = match self.store.get(key).await {
			Ok(Some(entry)) => entry,
			Ok(None) => return None,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key = key,
					"Cache read failed. Treating as a miss."
				);

				return None;
			},
		};

		if !entry.is_live(OffsetDateTime::now_utc()) {
			tracing::debug!(
				cache_key = key,
				key_version = entry.key_version,
				expires_at = %entry.expires_at,
				"Dropping stale cache entry."
			);

			if let Err(err) = self.store.remove(key).await {
				tracing::warn!(
					error = %err,
					cache_key = key,
					"Failed to delete stale cache entry."
				);
			}

			return None;
		}

		match self.store.record_hit(key).await {
			Ok(Some(hits)) => entry.hit_count = hits,
			Ok(None) => entry.hit_count += 1,
			Err(err) => {
				tracing::warn!(error = %err, cache_key = key, "Failed to record cache hit.");

				entry.hit_count += 1;
			},
		}

		Some(entry)
	}

	/// Upserts the card under `key`. Last writer wins.
	///
	/// `product_names` must cover every product that contributed evidence, so that invalidating
	/// any one of them drops the card.
	pub async fn store<S>(
		&self,
		key: &str,
		raw_query: &str,
		product_names: &[S],
		card: &StructuredCard,
	) -> Result<CacheEntry>
	where
		S: AsRef<str>,
	{
		let now = OffsetDateTime::now_utc();
		let mut card = card.clone();

		card.cached = false;

		let entry = CacheEntry {
			key: key.to_string(),
			key_version: NORMALIZER_VERSION,
			product_keys: product_keys(product_names),
			raw_query: raw_query.to_string(),
			card,
			created_at: now,
			expires_at: now + self.ttl,
			hit_count: 0,
		};

		self.store.put(entry.clone()).await?;

		Ok(entry)
	}

	/// Deletes every entry tied to `product_name`, including rows written before entries carried
	/// a product key. Runs even when the cache is disabled so stale rows never survive a toggle.
	pub async fn invalidate(&self, product_name: &str) -> Result<u64> {
		let trimmed = product_name.trim();

		if trimmed.is_empty() {
			return Err(Error::InvalidRequest {
				message: "productName must be non-empty.".to_string(),
			});
		}

		let key = normalize(trimmed);
		let mut fragments = vec![trimmed.to_string()];

		if !key.is_empty() && key != trimmed {
			fragments.push(key.clone());
		}

		let deleted = self.store.remove_for_product(&key, &fragments).await?;

		tracing::info!(
			product_name = trimmed,
			product_key = %key,
			deleted,
			"Invalidated card cache."
		);

		Ok(deleted)
	}
}

fn product_keys<S>(names: &[S]) -> Vec<String>
where
	S: AsRef<str>,
{
	let mut keys = Vec::with_capacity(names.len());

	for key in names.iter().map(|name| normalize(name.as_ref())) {
		if !key.is_empty() && !keys.contains(&key) {
			keys.push(key);
		}
	}

	keys
}

/// Process-local cache store for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryCardCache {
	entries: Mutex<HashMap<String, CacheEntry>>,
}
impl MemoryCardCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.with_entries(|entries| entries.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// A copy of the stored entry, without touching its hit counter.
	pub fn peek(&self, key: &str) -> Option<CacheEntry> {
		self.with_entries(|entries| entries.get(key).cloned()).ok().flatten()
	}

	/// Stores an entry verbatim, bypassing the manager.
	pub fn insert(&self, entry: CacheEntry) {
		let _ = self.with_entries(|entries| entries.insert(entry.key.clone(), entry));
	}

	fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, CacheEntry>) -> T) -> Result<T> {
		let mut entries = self.entries.lock().map_err(|_| Error::Storage {
			message: "In-memory card cache lock is poisoned.".to_string(),
		})?;

		Ok(f(&mut entries))
	}
}

impl CardCacheStore for MemoryCardCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
		Box::pin(async move { self.with_entries(|entries| entries.get(key).cloned()) })
	}

	fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.with_entries(|entries| {
				entries.insert(entry.key.clone(), entry);
			})
		})
	}

	fn record_hit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<i64>>> {
		Box::pin(async move {
			self.with_entries(|entries| {
				entries.get_mut(key).map(|entry| {
					entry.hit_count += 1;

					entry.hit_count
				})
			})
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			self.with_entries(|entries| u64::from(entries.remove(key).is_some()))
		})
	}

	fn remove_for_product<'a>(
		&'a self,
		product_key: &'a str,
		raw_fragments: &'a [String],
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			self.with_entries(|entries| {
				let before = entries.len();

				entries.retain(|key, entry| {
					let by_key = key == product_key
						|| entry.product_keys.iter().any(|value| value == product_key);
					let by_raw = raw_fragments.iter().any(|fragment| {
						!fragment.is_empty() && entry.raw_query.contains(fragment.as_str())
					});

					!(by_key || by_raw)
				});

				(before - entries.len()) as u64
			})
		})
	}
}
